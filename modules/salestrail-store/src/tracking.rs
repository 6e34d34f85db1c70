use anyhow::Result;
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::PgPool;

use salestrail_common::{FunnelType, UpsertOutcome, UtmSet};

/// One row of `all_sales_tracking`: the traffic-analytics destination.
#[derive(Debug, Clone)]
pub struct TrackingSale {
    pub sale_id: i64,
    pub lead_name: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub sale_price: i64,
    pub currency: String,
    pub sale_date: NaiveDate,
    pub utm: UtmSet,
    pub funnel_type: Option<FunnelType>,
    pub targetologist: Option<String>,
    pub auto_detected: bool,
    pub detection_method: Option<String>,
    pub pipeline_id: Option<i64>,
    pub status_id: Option<i64>,
    pub responsible_user_id: Option<i64>,
    pub raw_payload: Value,
}

#[derive(Clone)]
pub struct TrackingStore {
    pool: PgPool,
}

impl TrackingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomic insert-or-update keyed by `sale_id`. The conflict clause only
    /// fires when the price or the UTM source actually changed, the cheap
    /// proxy for "did anything marketing-relevant change", so a redelivered
    /// identical event is a no-op `Skipped`.
    pub async fn upsert(&self, sale: &TrackingSale) -> Result<UpsertOutcome> {
        let row = sqlx::query_as::<_, (bool,)>(
            r#"
            INSERT INTO all_sales_tracking (
                sale_id, lead_name, contact_name, contact_phone, contact_email,
                sale_price, currency, sale_date,
                utm_source, utm_medium, utm_campaign, utm_content, utm_term,
                funnel_type, targetologist, auto_detected, detection_method,
                pipeline_id, status_id, responsible_user_id,
                raw_payload, webhook_received_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, now())
            ON CONFLICT (sale_id) DO UPDATE SET
                lead_name = EXCLUDED.lead_name,
                contact_name = EXCLUDED.contact_name,
                contact_phone = EXCLUDED.contact_phone,
                contact_email = EXCLUDED.contact_email,
                sale_price = EXCLUDED.sale_price,
                sale_date = EXCLUDED.sale_date,
                utm_source = EXCLUDED.utm_source,
                utm_medium = EXCLUDED.utm_medium,
                utm_campaign = EXCLUDED.utm_campaign,
                utm_content = EXCLUDED.utm_content,
                utm_term = EXCLUDED.utm_term,
                funnel_type = EXCLUDED.funnel_type,
                targetologist = EXCLUDED.targetologist,
                auto_detected = EXCLUDED.auto_detected,
                detection_method = EXCLUDED.detection_method,
                raw_payload = EXCLUDED.raw_payload,
                updated_at = now()
            WHERE all_sales_tracking.sale_price IS DISTINCT FROM EXCLUDED.sale_price
               OR all_sales_tracking.utm_source IS DISTINCT FROM EXCLUDED.utm_source
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(sale.sale_id)
        .bind(&sale.lead_name)
        .bind(&sale.contact_name)
        .bind(&sale.contact_phone)
        .bind(&sale.contact_email)
        .bind(sale.sale_price)
        .bind(&sale.currency)
        .bind(sale.sale_date)
        .bind(&sale.utm.source)
        .bind(&sale.utm.medium)
        .bind(&sale.utm.campaign)
        .bind(&sale.utm.content)
        .bind(&sale.utm.term)
        .bind(sale.funnel_type.map(|f| f.as_str()))
        .bind(&sale.targetologist)
        .bind(sale.auto_detected)
        .bind(&sale.detection_method)
        .bind(sale.pipeline_id)
        .bind(sale.status_id)
        .bind(sale.responsible_user_id)
        .bind(&sale.raw_payload)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some((true,)) => UpsertOutcome::Inserted,
            Some((false,)) => UpsertOutcome::Updated,
            None => UpsertOutcome::Skipped,
        })
    }
}
