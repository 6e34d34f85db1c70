//! Integration tests for the sale stores.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::{NaiveDate, Utc};
use serde_json::json;
use sqlx::PgPool;

use salestrail_common::{AttributionSource, FunnelType, UpsertOutcome, UtmSet};
use salestrail_store::{
    ChallengeSale, ChallengeStore, NotificationRow, NotificationStore, ReferralConversion,
    ReferralStore, TrackingSale, TrackingStore, WebhookLog, WebhookLogEntry,
};

/// Get a migrated test database pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    salestrail_store::migrate(&pool).await.ok()?;

    // Clean slate for each test
    sqlx::query(
        "TRUNCATE all_sales_tracking, challenge3d_sales, sales_notifications, \
         referral_conversions, webhook_logs RESTART IDENTITY",
    )
    .execute(&pool)
    .await
    .ok()?;

    Some(pool)
}

fn tracking_sale(sale_id: i64, price: i64, source: &str) -> TrackingSale {
    TrackingSale {
        sale_id,
        lead_name: Some("Express deal".into()),
        contact_name: Some("Dana".into()),
        contact_phone: Some("77011112233".into()),
        contact_email: None,
        sale_price: price,
        currency: "KZT".into(),
        sale_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        utm: UtmSet {
            source: Some(source.into()),
            campaign: Some("express_promo".into()),
            ..Default::default()
        },
        funnel_type: Some(FunnelType::Express),
        targetologist: Some("Kenesary".into()),
        auto_detected: true,
        detection_method: Some("utm_campaign_keyword".into()),
        pipeline_id: Some(10_350_882),
        status_id: Some(142),
        responsible_user_id: None,
        raw_payload: json!({"id": sale_id}),
    }
}

// =========================================================================
// Idempotence and change detection
// =========================================================================

#[tokio::test]
async fn identical_redelivery_is_skipped() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = TrackingStore::new(pool.clone());
    let sale = tracking_sale(555, 5_000, "kenjifb");

    assert_eq!(store.upsert(&sale).await.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(store.upsert(&sale).await.unwrap(), UpsertOutcome::Skipped);

    let (count,): (i64,) =
        sqlx::query_as("SELECT count(*) FROM all_sales_tracking WHERE sale_id = 555")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn changed_price_triggers_update() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = TrackingStore::new(pool.clone());

    assert_eq!(
        store.upsert(&tracking_sale(556, 5_000, "kenjifb")).await.unwrap(),
        UpsertOutcome::Inserted
    );
    assert_eq!(
        store.upsert(&tracking_sale(556, 7_500, "kenjifb")).await.unwrap(),
        UpsertOutcome::Updated
    );

    let (price,): (i64,) =
        sqlx::query_as("SELECT sale_price FROM all_sales_tracking WHERE sale_id = 556")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(price, 7_500);
}

#[tokio::test]
async fn changed_utm_source_triggers_update() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = TrackingStore::new(pool.clone());

    store.upsert(&tracking_sale(557, 5_000, "kenjifb")).await.unwrap();
    assert_eq!(
        store.upsert(&tracking_sale(557, 5_000, "fbarystan")).await.unwrap(),
        UpsertOutcome::Updated
    );
}

#[tokio::test]
async fn challenge_upsert_is_idempotent() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = ChallengeStore::new(pool.clone());
    let sale = ChallengeSale {
        deal_id: 900,
        pipeline_id: Some(9_777_626),
        status_id: Some(142),
        amount: 3_000,
        currency: "KZT".into(),
        package_type: "prepaid".into(),
        prepaid: true,
        utm: UtmSet {
            source: Some("fbarystan".into()),
            ..Default::default()
        },
        customer_id: Some(1),
        customer_name: Some("Aruzhan".into()),
        phone: Some("77770001122".into()),
        email: None,
        original_utm_source: Some("quiz_funnel".into()),
        original_utm_campaign: None,
        original_utm_medium: None,
        attribution_source: AttributionSource::RelatedDeal,
        related_deal_id: Some(800),
        sale_date: Utc::now(),
        product_type: "challenge3d".into(),
        targetologist: Some("Arystan".into()),
        raw_payload: json!({"id": 900}),
    };

    assert_eq!(store.upsert(&sale).await.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(store.upsert(&sale).await.unwrap(), UpsertOutcome::Skipped);

    let mut changed = sale.clone();
    changed.amount = 30_000;
    changed.prepaid = false;
    changed.package_type = "full".into();
    assert_eq!(store.upsert(&changed).await.unwrap(), UpsertOutcome::Updated);
}

#[tokio::test]
async fn referral_upsert_detects_amount_change() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = ReferralStore::new(pool.clone());
    let conversion = ReferralConversion {
        deal_id: 42,
        referral_code: "ref_abc123".into(),
        deal_name: Some("Main product".into()),
        customer_name: Some("Dana".into()),
        customer_email: Some("dana@example.kz".into()),
        amount: 150_000,
    };

    assert_eq!(store.upsert(&conversion).await.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(store.upsert(&conversion).await.unwrap(), UpsertOutcome::Skipped);

    let mut changed = conversion.clone();
    changed.amount = 200_000;
    assert_eq!(store.upsert(&changed).await.unwrap(), UpsertOutcome::Updated);
}

// =========================================================================
// Notifications and audit log
// =========================================================================

#[tokio::test]
async fn notification_redelivery_keeps_first_row() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = NotificationStore::new(pool.clone());
    let row = NotificationRow {
        lead_id: 77,
        lead_name: Some("Deal".into()),
        contact_name: Some("Dana".into()),
        contact_phone: None,
        sale_amount: 5_000,
        product_name: Some("Express Course".into()),
        targetologist: Some("Kenesary".into()),
        utm: UtmSet::default(),
        pipeline_id: None,
        status_id: None,
        responsible_user_id: None,
    };

    store.record(&row).await.unwrap();
    store.mark_sent(77).await.unwrap();
    store.record(&row).await.unwrap();

    let (status,): (String,) = sqlx::query_as(
        "SELECT notification_status FROM sales_notifications WHERE lead_id = 77",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "sent");
}

#[tokio::test]
async fn audit_log_appends_every_decision() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let log = WebhookLog::new(pool.clone());
    let entry = WebhookLogEntry {
        lead_id: 555,
        pipeline_id: Some(10_350_882),
        deal_data: json!({"id": 555}),
        utm_source: Some("kenjifb".into()),
        utm_campaign: Some("express_promo".into()),
        routing_decision: salestrail_common::RoutingDecision::Traffic,
        processing_status: salestrail_common::ProcessingStatus::Success,
        error_message: None,
    };

    log.append(&entry).await;
    log.append(&entry).await;

    let (count,): (i64,) =
        sqlx::query_as("SELECT count(*) FROM webhook_logs WHERE lead_id = 555")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 2);
}
