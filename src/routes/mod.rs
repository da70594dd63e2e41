pub mod api_routes;
pub mod app_state;
pub mod settings_routes;
pub mod ws_routes;

use actix_web::web;

/// Mounts every HTTP and WebSocket route. Static files are added by the caller.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/settings").configure(settings_routes::init_routes))
        .service(web::scope("/api").configure(api_routes::init_routes))
        .configure(ws_routes::init_routes);
}
