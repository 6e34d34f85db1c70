use serde_json::Value;
use sqlx::PgPool;
use tracing::warn;

use salestrail_common::{ProcessingStatus, RoutingDecision};

/// Append-only audit entry, written exactly once per admissible deal after
/// routing and upserts complete, whatever the outcome.
#[derive(Debug, Clone)]
pub struct WebhookLogEntry {
    pub lead_id: i64,
    pub pipeline_id: Option<i64>,
    pub deal_data: Value,
    pub utm_source: Option<String>,
    pub utm_campaign: Option<String>,
    pub routing_decision: RoutingDecision,
    pub processing_status: ProcessingStatus,
    pub error_message: Option<String>,
}

#[derive(Clone)]
pub struct WebhookLog {
    pool: PgPool,
}

impl WebhookLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Best-effort append. The audit log is diagnostic, not business-critical:
    /// a failed write is logged and swallowed so the webhook handler never
    /// returns an error to the CRM over it.
    pub async fn append(&self, entry: &WebhookLogEntry) {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_logs (
                lead_id, pipeline_id, deal_data, utm_source, utm_campaign,
                routing_decision, processing_status, error_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.lead_id)
        .bind(entry.pipeline_id)
        .bind(&entry.deal_data)
        .bind(&entry.utm_source)
        .bind(&entry.utm_campaign)
        .bind(entry.routing_decision.as_str())
        .bind(entry.processing_status.as_str())
        .bind(&entry.error_message)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(lead_id = entry.lead_id, error = %e, "Failed to write webhook log");
        }
    }
}
