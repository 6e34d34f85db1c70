//! HTTP surface of the webhook pipeline.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::pipeline::DeliveryResults;
use crate::AppState;

#[derive(Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub results: DeliveryResults,
    pub timestamp: DateTime<Utc>,
}

/// POST /webhook/amocrm
///
/// Always answers 200, even on internal failure: a non-2xx would make the CRM
/// retry indefinitely, and by the time we answer the attempt is already in
/// the audit log for operators.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Json<WebhookResponse> {
    let delivery_id = Uuid::new_v4();

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(%delivery_id, error = %e, "Webhook payload is not valid JSON");
            return Json(WebhookResponse {
                success: false,
                error: Some(format!("invalid payload: {e}")),
                results: DeliveryResults::default(),
                timestamp: Utc::now(),
            });
        }
    };

    info!(%delivery_id, "Incoming AmoCRM webhook");
    let results = state.pipeline.process_delivery(&payload).await;
    info!(
        %delivery_id,
        total = results.total,
        referral = results.referral.processed,
        traffic = results.traffic.processed,
        unknown = results.unknown.processed,
        skipped = results.skipped,
        "Delivery processed"
    );

    Json(WebhookResponse {
        success: true,
        error: None,
        results,
        timestamp: Utc::now(),
    })
}

/// GET /webhook/amocrm/test: liveness probe for webhook configuration.
pub async fn webhook_test() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "AmoCRM webhook endpoint is active",
        "supported_routes": ["referral", "traffic", "both", "unknown"],
        "timestamp": Utc::now(),
    }))
}
