use anyhow::Result;
use sqlx::PgPool;

use salestrail_common::UpsertOutcome;

/// One row of `referral_conversions`: the referral-payout destination.
/// `referral_code` is the `ref_`-prefixed source that claimed the sale.
#[derive(Debug, Clone)]
pub struct ReferralConversion {
    pub deal_id: i64,
    pub referral_code: String,
    pub deal_name: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub amount: i64,
}

#[derive(Clone)]
pub struct ReferralStore {
    pool: PgPool,
}

impl ReferralStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomic upsert keyed by `deal_id`; updates only on a changed amount or
    /// referral code.
    pub async fn upsert(&self, conversion: &ReferralConversion) -> Result<UpsertOutcome> {
        let row = sqlx::query_as::<_, (bool,)>(
            r#"
            INSERT INTO referral_conversions (
                deal_id, referral_code, deal_name, customer_name, customer_email, amount
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (deal_id) DO UPDATE SET
                referral_code = EXCLUDED.referral_code,
                deal_name = EXCLUDED.deal_name,
                customer_name = EXCLUDED.customer_name,
                customer_email = EXCLUDED.customer_email,
                amount = EXCLUDED.amount,
                updated_at = now()
            WHERE referral_conversions.amount IS DISTINCT FROM EXCLUDED.amount
               OR referral_conversions.referral_code IS DISTINCT FROM EXCLUDED.referral_code
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(conversion.deal_id)
        .bind(&conversion.referral_code)
        .bind(&conversion.deal_name)
        .bind(&conversion.customer_name)
        .bind(&conversion.customer_email)
        .bind(conversion.amount)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some((true,)) => UpsertOutcome::Inserted,
            Some((false,)) => UpsertOutcome::Updated,
            None => UpsertOutcome::Skipped,
        })
    }
}
