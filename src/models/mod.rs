pub mod conversation;
pub mod last_recipient;
pub mod settings;
pub mod ws_frame;
