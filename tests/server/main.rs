mod http_api_tests;
mod support;
mod ws_session_tests;
