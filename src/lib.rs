pub mod client;
pub mod config;
pub mod handlers;
pub mod messengers;
pub mod models;
pub mod routes;
pub mod services;
