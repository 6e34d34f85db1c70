use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use salestrail_attribution::AttributionConfig;
use salestrail_common::Config;
use salestrail_store::{NotificationStore, ReferralStore, TrackingStore, WebhookLog};
use telegram_client::TelegramClient;

mod notify;
mod pipeline;
mod webhook;

use notify::Notifier;
use pipeline::WebhookPipeline;

pub struct AppState {
    pub pipeline: WebhookPipeline,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("salestrail=info".parse()?))
        .init();

    info!("salestrail webhook server starting...");

    let config = Config::from_env();
    config.log_redacted();

    let pool = PgPool::connect(&config.database_url).await?;
    salestrail_store::migrate(&pool).await?;

    let telegram = TelegramClient::new(&config.telegram_bot_token)?;
    let notifier = Notifier::new(
        telegram,
        config.telegram_chat_ids.clone(),
        NotificationStore::new(pool.clone()),
    );

    let attribution = AttributionConfig::production();
    let pipeline = WebhookPipeline::new(
        attribution,
        TrackingStore::new(pool.clone()),
        ReferralStore::new(pool.clone()),
        NotificationStore::new(pool.clone()),
        WebhookLog::new(pool),
        notifier,
    );

    let state = Arc::new(AppState { pipeline });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // AmoCRM webhook
        .route("/webhook/amocrm", post(webhook::handle_webhook))
        .route("/webhook/amocrm/test", get(webhook::webhook_test))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!(addr = addr.as_str(), "Listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
