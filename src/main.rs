use std::sync::Arc;
use actix_files::Files;
use actix_web::dev::Service;
use actix_web::http::header::{self, HeaderValue};
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{bail, Context};
use log::info;
use voice_bridge::config;
use voice_bridge::messengers::MessengerRegistry;
use voice_bridge::models::settings::CredentialKey;
use voice_bridge::routes::{self, app_state::AppState};
use voice_bridge::services::active_messenger::ActiveMessenger;
use voice_bridge::services::last_recipient_service::LastRecipientStore;
use voice_bridge::services::settings_service::CredentialStore;
use voice_bridge::services::telegram_auth::TelegramAuth;
use voice_bridge::services::transcription_service::WhisperTranscriber;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    config::load_env();
    config::init_logging();

    let credentials = CredentialStore::default();
    if credentials.credential(CredentialKey::OpenAiApiKey).is_none() {
        bail!(
            "Missing OpenAI API key: set {} or save it in {:?}",
            CredentialKey::OpenAiApiKey.env_var(),
            credentials.path()
        );
    }

    let transcriber = WhisperTranscriber::new(credentials.clone())
        .context("could not build transcription client")?;
    let state = AppState {
        active: ActiveMessenger::new(),
        registry: Arc::new(MessengerRegistry::default()),
        credentials: credentials.clone(),
        last_recipients: LastRecipientStore::default(),
        transcriber: Arc::new(transcriber),
        telegram_auth: TelegramAuth::with_grammers(credentials),
    };

    let public_dir = config::public_dir();
    let host = config::bind_host();
    let port = config::port();
    info!("Starting server on http://{}:{}", host, port);
    info!("Serving static files from {:?}", public_dir);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .wrap_fn(|req, srv| {
                let fut = srv.call(req);
                async move {
                    let mut res = fut.await?;
                    let is_html = res
                        .headers()
                        .get(header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map_or(false, |ct| ct.starts_with("text/html"));
                    if is_html {
                        res.headers_mut().insert(
                            header::CACHE_CONTROL,
                            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
                        );
                    }
                    Ok(res)
                }
            })
            .configure(routes::configure)
            .service(Files::new("/", public_dir.clone()).index_file("index.html"))
    })
    .bind((host, port))
    .with_context(|| format!("could not bind {}:{}", host, port))?
    .run()
    .await
    .context("server terminated")?;

    Ok(())
}
