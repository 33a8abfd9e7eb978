use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use admin_console::auth::{AccessGate, HttpSessionStore, SessionStore};
use admin_console::center::NotificationCenter;
use admin_console::config::{Backend, Config};
use admin_console::handlers::{self, AppState};
use admin_console::middleware::CorrelationId;
use admin_console::service::{http_client, HttpNotificationService, MemoryNotificationService, NotificationService};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("invalid console configuration")?;

    // ---------- upstream services ----------
    let http = http_client(config.request_timeout())?;
    let service: Arc<dyn NotificationService> = match config.notification_backend {
        Backend::Http => Arc::new(HttpNotificationService::new(
            http.clone(),
            config.notification_api_url.clone(),
            config.api_token.clone(),
        )),
        Backend::Memory => Arc::new(MemoryNotificationService::new()),
    };
    let sessions: Arc<dyn SessionStore> =
        Arc::new(HttpSessionStore::new(http, config.notification_api_url.clone()));

    // ---------- notification center ----------
    let center = Arc::new(NotificationCenter::new(service, config.page_size));
    let poller = match config.poll_interval() {
        Some(every) => Some(center.spawn_poller(every)),
        None => {
            center.refresh().await;
            None
        }
    };

    let state = web::Data::new(AppState { center, gate: AccessGate::new(sessions) });

    info!(
        addr = %config.http_addr,
        backend = ?config.notification_backend,
        upstream = %config.notification_api_url,
        "admin console listening"
    );

    // ---------- HTTP server ----------
    let origin = config.console_origin.clone();
    HttpServer::new(move || {
        let cors = match &origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .expose_headers(["x-correlation-id"]),
            None => Cors::default(),
        };
        App::new()
            .wrap(Logger::default())
            .wrap(CorrelationId) // x-correlation-id
            .wrap(cors)
            .app_data(state.clone())
            .configure(handlers::routes)
    })
    .bind(&config.http_addr)?
    .workers(num_cpus::get().max(2))
    .run()
    .await?;

    if let Some(poller) = poller {
        poller.abort();
    }
    Ok(())
}
