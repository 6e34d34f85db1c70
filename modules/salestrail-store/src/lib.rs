//! Postgres persistence for the sale-routing pipeline.
//!
//! Each destination table gets its own store over a shared [`sqlx::PgPool`].
//! All sale writes are single-statement `INSERT .. ON CONFLICT` upserts keyed
//! by the CRM deal id, with change detection in the conflict clause so
//! webhook redelivery storms stay quiet.

pub mod challenge;
pub mod notifications;
pub mod referral;
pub mod tracking;
pub mod webhook_log;

pub use challenge::{ChallengeSale, ChallengeStore};
pub use notifications::{NotificationRow, NotificationStore};
pub use referral::{ReferralConversion, ReferralStore};
pub use tracking::{TrackingSale, TrackingStore};
pub use webhook_log::{WebhookLog, WebhookLogEntry};

use anyhow::Result;
use sqlx::PgPool;

/// Run pending schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
