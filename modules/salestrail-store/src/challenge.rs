use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use salestrail_common::{AttributionSource, UpsertOutcome, UtmSet};

/// One row of `challenge3d_sales`: Challenge3D purchases with first-touch
/// attribution alongside the current-deal UTM.
#[derive(Debug, Clone)]
pub struct ChallengeSale {
    pub deal_id: i64,
    pub pipeline_id: Option<i64>,
    pub status_id: Option<i64>,
    pub amount: i64,
    pub currency: String,
    pub package_type: String,
    pub prepaid: bool,
    pub utm: UtmSet,
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub original_utm_source: Option<String>,
    pub original_utm_campaign: Option<String>,
    pub original_utm_medium: Option<String>,
    pub attribution_source: AttributionSource,
    pub related_deal_id: Option<i64>,
    pub sale_date: DateTime<Utc>,
    pub product_type: String,
    pub targetologist: Option<String>,
    pub raw_payload: Value,
}

#[derive(Clone)]
pub struct ChallengeStore {
    pool: PgPool,
}

impl ChallengeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomic upsert keyed by `deal_id`; updates only when the amount or the
    /// UTM source changed.
    pub async fn upsert(&self, sale: &ChallengeSale) -> Result<UpsertOutcome> {
        let row = sqlx::query_as::<_, (bool,)>(
            r#"
            INSERT INTO challenge3d_sales (
                deal_id, pipeline_id, status_id, amount, currency,
                package_type, prepaid,
                utm_source, utm_medium, utm_campaign, utm_content, utm_term,
                utm_referrer, fbclid,
                customer_id, customer_name, phone, email,
                original_utm_source, original_utm_campaign, original_utm_medium,
                attribution_source, related_deal_id,
                sale_date, product_type, targetologist,
                raw_payload, webhook_received_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                    $27, now())
            ON CONFLICT (deal_id) DO UPDATE SET
                pipeline_id = EXCLUDED.pipeline_id,
                status_id = EXCLUDED.status_id,
                amount = EXCLUDED.amount,
                package_type = EXCLUDED.package_type,
                prepaid = EXCLUDED.prepaid,
                utm_source = EXCLUDED.utm_source,
                utm_medium = EXCLUDED.utm_medium,
                utm_campaign = EXCLUDED.utm_campaign,
                utm_content = EXCLUDED.utm_content,
                utm_term = EXCLUDED.utm_term,
                utm_referrer = EXCLUDED.utm_referrer,
                fbclid = EXCLUDED.fbclid,
                customer_id = EXCLUDED.customer_id,
                customer_name = EXCLUDED.customer_name,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                original_utm_source = EXCLUDED.original_utm_source,
                original_utm_campaign = EXCLUDED.original_utm_campaign,
                original_utm_medium = EXCLUDED.original_utm_medium,
                attribution_source = EXCLUDED.attribution_source,
                related_deal_id = EXCLUDED.related_deal_id,
                sale_date = EXCLUDED.sale_date,
                product_type = EXCLUDED.product_type,
                targetologist = EXCLUDED.targetologist,
                raw_payload = EXCLUDED.raw_payload,
                updated_at = now()
            WHERE challenge3d_sales.amount IS DISTINCT FROM EXCLUDED.amount
               OR challenge3d_sales.utm_source IS DISTINCT FROM EXCLUDED.utm_source
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(sale.deal_id)
        .bind(sale.pipeline_id)
        .bind(sale.status_id)
        .bind(sale.amount)
        .bind(&sale.currency)
        .bind(&sale.package_type)
        .bind(sale.prepaid)
        .bind(&sale.utm.source)
        .bind(&sale.utm.medium)
        .bind(&sale.utm.campaign)
        .bind(&sale.utm.content)
        .bind(&sale.utm.term)
        .bind(&sale.utm.referrer)
        .bind(&sale.utm.click_id)
        .bind(sale.customer_id)
        .bind(&sale.customer_name)
        .bind(&sale.phone)
        .bind(&sale.email)
        .bind(&sale.original_utm_source)
        .bind(&sale.original_utm_campaign)
        .bind(&sale.original_utm_medium)
        .bind(sale.attribution_source.as_str())
        .bind(sale.related_deal_id)
        .bind(sale.sale_date)
        .bind(&sale.product_type)
        .bind(&sale.targetologist)
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
