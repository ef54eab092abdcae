use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod calendar;
mod config;
mod crypto;
mod error;
mod models;
mod routes;
mod scheduler;
mod server;
mod service;
mod store;

use config::AppConfig;
use crypto::FieldCipher;
use routes::{AppData, AppState};
use scheduler::ReminderJob;
use service::BirthdayService;
use store::PgBirthdayStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = AppConfig::from_env()?;
    config.log_configuration();

    let db = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(config.database.connect_options()?)
        .await?;
    log::info!("Connected to PostgreSQL");

    let store = PgBirthdayStore::new(db);
    store.ensure_schema().await?;

    let cipher = match (&config.secret_key, config.field_encryption) {
        (Some(secret), true) => Some(FieldCipher::new(secret)?),
        _ => None,
    };

    let birthdays = Arc::new(BirthdayService::new(Arc::new(store), cipher));

    let shutdown = CancellationToken::new();
    tokio::spawn(server::shutdown_signal(shutdown.clone()));

    let reminders = scheduler::spawn(
        ReminderJob::new(birthdays.clone(), config.schedule.calendar),
        config.schedule.clone(),
        shutdown.clone(),
    );

    let app_state = AppState::new(AppData { birthdays });
    let app = routes::router(app_state, server::create_cors_layer(&config.cors_origins));

    let served = match &config.tls {
        Some(tls) => server::start_https_server(app, config.port, tls, shutdown.clone()).await,
        None => server::start_http_server(app, config.port, shutdown.clone()).await,
    };

    shutdown.cancel();
    if let Err(e) = reminders.await {
        log::error!("Reminder task failed: {}", e);
    }
    log::info!("Server stopped");

    served
}
