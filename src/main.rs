// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

mod agent;
mod config;
mod errors;
mod handlers;
mod intent;
mod logging;
mod models;
mod orchestration;
mod services;
mod session;
mod tools;

use crate::agent::{AgentRegistry, HttpAgentBuilder};
use crate::config::ServerConfig;
use crate::handlers::{
    chat, clear_poster, index, poster, reset_config, setup_form, setup_submit,
};
use crate::intent::IntentRouter;
use crate::services::{ImageProcessor, RedisSessionStore, SecureConfigStore};
use crate::session::{InMemorySessionStore, SessionStore};

#[derive(Clone)]
pub struct AppState {
    settings: Arc<ServerConfig>,
    config_store: Arc<SecureConfigStore>,
    sessions: Arc<dyn SessionStore>,
    agents: Arc<AgentRegistry>,
    intent_router: Arc<IntentRouter>,
    image_processor: Arc<ImageProcessor>,
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .service(
            web::resource("/setup")
                .route(web::get().to(setup_form))
                .route(web::post().to(setup_submit)),
        )
        .route("/chat", web::post().to(chat))
        .route("/poster", web::post().to(poster))
        .route("/reset-config", web::post().to(reset_config))
        .route("/clear-poster", web::post().to(clear_poster))
        .route("/health", web::get().to(health_check));
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = ServerConfig::from_env()?;

    logging::init(&settings.log_dir, settings.log_max_files)
        .context("failed to initialize logging")?;
    info!("Starting movie agent web...");

    let sessions: Arc<dyn SessionStore> = match &settings.redis_url {
        Some(url) => {
            info!("Using Redis session store at {}", url);
            Arc::new(RedisSessionStore::new(url, settings.session_ttl_secs).await?)
        }
        None => {
            warn!("REDIS_URL not set, sessions are kept in memory");
            Arc::new(InMemorySessionStore::new(Duration::from_secs(
                settings.session_ttl_secs as u64,
            )))
        }
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
        .context("failed to build HTTP client")?;
    let builder = Arc::new(HttpAgentBuilder::new(
        settings.agent_service_url.clone(),
        settings.openai_base_url.clone(),
        settings.vision_model.clone(),
        settings.poster_search_k,
        client,
    ));

    let config_store = Arc::new(SecureConfigStore::new(
        settings.config_file.clone(),
        settings.master_key_file.clone(),
    ));
    let agents = Arc::new(AgentRegistry::new(builder));

    // Warm the agent up front when setup has already been done.
    if agents.ensure(&config_store).await.is_none() && !config_store.is_configured() {
        info!("No configuration found, waiting for first-time setup at /setup");
    }

    let bind_addr = settings.bind_addr();
    let static_dir = settings.static_dir.clone();
    let app_state = AppState {
        settings: Arc::new(settings),
        config_store,
        sessions,
        agents,
        intent_router: Arc::new(IntentRouter::new()),
        image_processor: Arc::new(ImageProcessor::new()),
    };

    info!("Starting HTTP server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes)
            .service(actix_files::Files::new("/static", static_dir.clone()))
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
