use anyhow::Result;
use sqlx::PgPool;

use salestrail_common::UtmSet;

/// One row of `sales_notifications`: the per-sale alert ledger consumed by
/// the Telegram fan-out. Status moves `pending → sent` after delivery.
#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub lead_id: i64,
    pub lead_name: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub sale_amount: i64,
    pub product_name: Option<String>,
    pub targetologist: Option<String>,
    pub utm: UtmSet,
    pub pipeline_id: Option<i64>,
    pub status_id: Option<i64>,
    pub responsible_user_id: Option<i64>,
}

#[derive(Clone)]
pub struct NotificationStore {
    pool: PgPool,
}

impl NotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a pending alert. Redelivery keeps the first row (and its sent
    /// status). Re-announcing the same sale is exactly what we avoid.
    pub async fn record(&self, row: &NotificationRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sales_notifications (
                lead_id, lead_name, contact_name, contact_phone,
                sale_amount, product_name, targetologist,
                utm_source, utm_medium, utm_campaign, utm_content, utm_term,
                pipeline_id, status_id, responsible_user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (lead_id) DO NOTHING
            "#,
        )
        .bind(row.lead_id)
        .bind(&row.lead_name)
        .bind(&row.contact_name)
        .bind(&row.contact_phone)
        .bind(row.sale_amount)
        .bind(&row.product_name)
        .bind(&row.targetologist)
        .bind(&row.utm.source)
        .bind(&row.utm.medium)
        .bind(&row.utm.campaign)
        .bind(&row.utm.content)
        .bind(&row.utm.term)
        .bind(row.pipeline_id)
        .bind(row.status_id)
        .bind(row.responsible_user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark an alert as delivered.
    pub async fn mark_sent(&self, lead_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sales_notifications
            SET notification_status = 'sent', notified_at = now()
            WHERE lead_id = $1
            "#,
        )
        .bind(lead_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
