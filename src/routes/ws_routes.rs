use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use crate::handlers::ws_handler::{self, WsConnection};
use crate::routes::app_state::AppState;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(ws_upgrade);
}

#[get("/ws")]
async fn ws_upgrade(
    req: HttpRequest,
    body: web::Payload,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (response, session, stream) = actix_ws::handle(&req, body)?;
    let conn = WsConnection::new(data.get_ref().clone());
    actix_web::rt::spawn(ws_handler::run(conn, session, stream));
    Ok(response)
}
