//! Historical import of Express Course sales into `all_sales_tracking`.
//!
//! Pages through every successfully-closed deal of the Express pipeline,
//! extracts UTM, resolves targetologist and funnel, and upserts with
//! deduplication so re-runs are safe.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use sqlx::PgPool;
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use amocrm_client::{AmoCrmClient, Lead};
use salestrail_attribution::{extract_contact_info, extract_utm, AttributionConfig};
use salestrail_common::Config;
use salestrail_import::{
    cancellation_flag, cancelled, fetch_closed_leads, ImportStats, ImportWindow, RecordError,
    DB_PAUSE, DB_PAUSE_EVERY,
};
use salestrail_store::{TrackingSale, TrackingStore};

#[derive(Parser)]
#[command(
    name = "import-sales",
    about = "Import historical Express Course sales from AmoCRM"
)]
struct Args {
    /// Start of the closed-at window (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// End of the closed-at window (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Shortcut: import only the last N days
    #[arg(long)]
    days: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("salestrail=info".parse()?))
        .init();

    let args = Args::parse();
    let config = Config::import_from_env();
    config.log_redacted();

    let attribution = AttributionConfig::production();
    let client = AmoCrmClient::new(&config.amocrm_domain, config.amocrm_access_token.clone())?;
    let pool = PgPool::connect(&config.database_url).await?;
    salestrail_store::migrate(&pool).await?;
    let store = TrackingStore::new(pool);

    let cancel = cancellation_flag();
    let window = ImportWindow::new(args.from, args.to, args.days);
    let run_id = Uuid::new_v4();
    info!(
        %run_id,
        pipeline_id = attribution.express_pipeline_id,
        window = window.describe().as_str(),
        "Starting Express historical import"
    );

    let leads = fetch_closed_leads(
        &client,
        attribution.express_pipeline_id,
        attribution.success_status_id,
        &window,
        false,
        &cancel,
    )
    .await?;

    let mut stats = ImportStats::default();
    stats.total_fetched = leads.len() as u64;

    for (i, lead) in leads.iter().enumerate() {
        if cancelled(&cancel) {
            warn!(processed = i, "Cancelled, stopping import loop");
            break;
        }

        let sale = tracking_sale_from_lead(lead, &attribution);
        match store.upsert(&sale).await {
            Ok(outcome) => {
                stats.record_outcome(outcome);
                let team = sale
                    .targetologist
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                stats.by_targetologist.entry(team).or_default().add(sale.sale_price);
                let funnel = sale
                    .funnel_type
                    .map(|f| f.as_str().to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                stats.by_funnel.entry(funnel).or_default().add(sale.sale_price);
                stats.by_date.entry(sale.sale_date).or_default().add(sale.sale_price);
            }
            Err(e) => {
                warn!(deal_id = lead.id, error = %e, "Upsert failed");
                stats.errors.push(RecordError {
                    deal_id: lead.id,
                    error: e.to_string(),
                });
            }
        }

        if i > 0 && i % DB_PAUSE_EVERY == 0 {
            sleep(DB_PAUSE).await;
        }
    }

    stats.print_summary("EXPRESS HISTORICAL SALES IMPORT");
    Ok(())
}

fn tracking_sale_from_lead(lead: &Lead, config: &AttributionConfig) -> TrackingSale {
    let utm = extract_utm(lead, &config.utm_field_ids);
    let attribution = config.resolve(&utm, lead.pipeline_id);
    let contact = extract_contact_info(lead);

    TrackingSale {
        sale_id: lead.id,
        lead_name: lead.name.clone(),
        contact_name: contact.name.or_else(|| lead.name.clone()),
        contact_phone: contact.phone,
        contact_email: contact.email,
        sale_price: lead.price.unwrap_or(0),
        currency: "KZT".to_string(),
        sale_date: sale_date(lead),
        utm,
        funnel_type: attribution.funnel_type,
        targetologist: attribution.targetologist,
        auto_detected: attribution.auto_detected,
        detection_method: attribution.detection_method,
        pipeline_id: lead.pipeline_id,
        status_id: lead.status_id,
        responsible_user_id: lead.responsible_user_id,
        raw_payload: serde_json::to_value(lead).unwrap_or(serde_json::Value::Null),
    }
}

fn sale_date(lead: &Lead) -> NaiveDate {
    lead.closed_at
        .or(lead.updated_at)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|| Utc::now().date_naive())
}
