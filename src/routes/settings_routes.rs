use actix_web::{delete, get, post, web, HttpResponse, Responder};
use log::error;
use serde::Deserialize;
use serde_json::{json, Value};
use crate::handlers::settings_handler;
use crate::routes::app_state::AppState;
use crate::services::settings_service::SettingsError;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(status)
        .service(auth_state)
        .service(auth_start)
        .service(auth_code)
        .service(auth_password)
        .service(auth_reset)
        .service(save_service)
        .service(remove_service);
}

#[derive(Debug, Default, Deserialize)]
struct PhoneBody {
    phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CodeBody {
    code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PasswordBody {
    password: Option<String>,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn settings_error(e: SettingsError) -> HttpResponse {
    match e {
        SettingsError::UnknownService(_) => {
            HttpResponse::BadRequest().json(json!({ "error": "Unknown service" }))
        }
        other => {
            error!("Settings write failed: {}", other);
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to save settings" }))
        }
    }
}

#[get("/status")]
async fn status(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(settings_handler::status(&data))
}

#[post("/{service}")]
async fn save_service(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<Value>>,
) -> impl Responder {
    let body = body.map(web::Json::into_inner).unwrap_or(Value::Null);
    match settings_handler::save(&data, &path, &body) {
        Ok(()) => HttpResponse::Ok().json(json!({ "ok": true })),
        Err(e) => settings_error(e),
    }
}

#[delete("/{service}")]
async fn remove_service(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match settings_handler::remove(&data, &path) {
        Ok(()) => HttpResponse::Ok().json(json!({ "ok": true })),
        Err(e) => settings_error(e),
    }
}

#[post("/telegram/auth/start")]
async fn auth_start(data: web::Data<AppState>, body: Option<web::Json<PhoneBody>>) -> impl Responder {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let Some(phone) = required(&body.phone) else {
        return HttpResponse::BadRequest().json(json!({ "error": "Phone number required" }));
    };
    HttpResponse::Ok().json(settings_handler::start_telegram_auth(&data, phone).await)
}

#[post("/telegram/auth/code")]
async fn auth_code(data: web::Data<AppState>, body: Option<web::Json<CodeBody>>) -> impl Responder {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let Some(code) = required(&body.code) else {
        return HttpResponse::BadRequest().json(json!({ "error": "Code required" }));
    };
    HttpResponse::Ok().json(settings_handler::submit_telegram_code(&data, code).await)
}

#[post("/telegram/auth/password")]
async fn auth_password(
    data: web::Data<AppState>,
    body: Option<web::Json<PasswordBody>>,
) -> impl Responder {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let Some(password) = body.password.as_deref().filter(|p| !p.is_empty()) else {
        return HttpResponse::BadRequest().json(json!({ "error": "Password required" }));
    };
    HttpResponse::Ok().json(settings_handler::submit_telegram_password(&data, password).await)
}

#[get("/telegram/auth/state")]
async fn auth_state(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.telegram_auth.snapshot())
}

#[post("/telegram/auth/reset")]
async fn auth_reset(data: web::Data<AppState>) -> impl Responder {
    data.telegram_auth.reset();
    HttpResponse::Ok().json(json!({ "ok": true }))
}
