use actix_web::{get, web, HttpResponse, Responder};
use serde::Deserialize;
use crate::handlers::api_handler;
use crate::routes::app_state::AppState;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(available_messengers)
        .service(contacts)
        .service(last_recipient)
        .service(messages)
        .service(folders)
        .service(folder_messages)
        .service(folder_message);
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<String>,
}

#[get("/available-messengers")]
async fn available_messengers(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(api_handler::available_messengers(&data))
}

#[get("/contacts")]
async fn contacts(data: web::Data<AppState>) -> impl Responder {
    match api_handler::contacts(&data).await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => e.to_response(),
    }
}

#[get("/last-recipient")]
async fn last_recipient(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(api_handler::last_recipient(&data))
}

#[get("/messages/{entity_id}")]
async fn messages(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match api_handler::messages(&data, &path).await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => e.to_response(),
    }
}

#[get("/folders")]
async fn folders(data: web::Data<AppState>) -> impl Responder {
    match api_handler::folders(&data).await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => e.to_response(),
    }
}

#[get("/folders/{folder_id}/messages")]
async fn folder_messages(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> impl Responder {
    let limit = api_handler::parse_limit(query.limit.as_deref());
    match api_handler::folder_messages(&data, &path, limit).await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => e.to_response(),
    }
}

#[get("/folders/{folder_id}/messages/{message_id}")]
async fn folder_message(data: web::Data<AppState>, path: web::Path<(String, String)>) -> impl Responder {
    let (folder_id, message_id) = path.into_inner();
    match api_handler::folder_message(&data, &folder_id, &message_id).await {
        Ok(message) => HttpResponse::Ok().json(message),
        Err(e) => e.to_response(),
    }
}
