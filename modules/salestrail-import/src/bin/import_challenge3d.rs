//! Historical import of Challenge3D sales into `challenge3d_sales`.
//!
//! Beyond the Express importer, this path fetches embedded contacts,
//! classifies prepaid vs full payment, excludes Express deals that leak into
//! the Challenge pipelines, and recovers first-touch attribution by walking
//! the customer's earlier deals (degrading to the current UTM on any lookup
//! failure).

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use sqlx::PgPool;
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use amocrm_client::{AmoCrmClient, Lead};
use salestrail_attribution::{
    determine_product_type, extract_contact_info, extract_utm, is_prepaid, resolve_original_utm,
    resolve_targetologist, AttributionConfig, ProductType,
};
use salestrail_common::Config;
use salestrail_import::{
    cancellation_flag, cancelled, fetch_closed_leads, ImportStats, ImportWindow, RecordError,
    DB_PAUSE, DB_PAUSE_EVERY,
};
use salestrail_store::{ChallengeSale, ChallengeStore};

#[derive(Parser)]
#[command(
    name = "import-challenge3d",
    about = "Import historical Challenge3D sales from AmoCRM"
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

/// Challenge3D tracking went live on this date; without flags there is
/// nothing meaningful to import before it.
const DEFAULT_FROM: &str = "2024-12-29";

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
    let store = ChallengeStore::new(pool);

    let cancel = cancellation_flag();
    let window = if args.from.is_none() && args.to.is_none() && args.days.is_none() {
        let from: NaiveDate = DEFAULT_FROM.parse().expect("valid default date");
        info!(%from, "No window flags given, using default start date");
        ImportWindow::new(Some(from), None, None)
    } else {
        ImportWindow::new(args.from, args.to, args.days)
    };

    let run_id = Uuid::new_v4();
    info!(
        %run_id,
        pipelines = ?attribution.challenge_pipeline_ids,
        window = window.describe().as_str(),
        "Starting Challenge3D historical import"
    );

    let mut leads = Vec::new();
    for &pipeline_id in &attribution.challenge_pipeline_ids {
        leads.extend(
            fetch_closed_leads(
                &client,
                pipeline_id,
                attribution.success_status_id,
                &window,
                true,
                &cancel,
            )
            .await?,
        );
    }

    let mut stats = ImportStats::default();
    stats.total_fetched = leads.len() as u64;

    for (i, lead) in leads.iter().enumerate() {
        if cancelled(&cancel) {
            warn!(processed = i, "Cancelled, stopping import loop");
            break;
        }

        match convert_lead(lead, &attribution, &client).await {
            None => stats.excluded += 1,
            Some(sale) => match store.upsert(&sale).await {
                Ok(outcome) => {
                    stats.record_outcome(outcome);
                    tally(&mut stats, &sale);
                }
                Err(e) => {
                    warn!(deal_id = lead.id, error = %e, "Upsert failed");
                    stats.errors.push(RecordError {
                        deal_id: lead.id,
                        error: e.to_string(),
                    });
                }
            },
        }

        if i > 0 && i % DB_PAUSE_EVERY == 0 {
            sleep(DB_PAUSE).await;
        }
    }

    stats.print_summary("CHALLENGE3D HISTORICAL SALES IMPORT");
    Ok(())
}

/// Build the sale record, or `None` for Express deals that must be excluded.
async fn convert_lead(
    lead: &Lead,
    config: &AttributionConfig,
    client: &AmoCrmClient,
) -> Option<ChallengeSale> {
    let utm = extract_utm(lead, &config.utm_field_ids);
    let product = determine_product_type(lead, &utm, config);
    if product == ProductType::Express {
        return None;
    }

    let contact = extract_contact_info(lead);
    let targetologist = resolve_targetologist(&utm, &config.targetologists).map(String::from);
    let amount = lead.price.unwrap_or(0);
    let prepaid = is_prepaid(amount, config.prepaid_threshold);

    // First-touch attribution; degrades to the current UTM on any failure.
    let origin = resolve_original_utm(lead, &config.utm_field_ids, client).await;
    let mut original = origin.original.clone();
    original.merge_missing_from(&utm);

    Some(ChallengeSale {
        deal_id: lead.id,
        pipeline_id: lead.pipeline_id,
        status_id: lead.status_id,
        amount,
        currency: "KZT".to_string(),
        package_type: if prepaid { "prepaid" } else { "full" }.to_string(),
        prepaid,
        utm: utm.clone(),
        customer_id: contact.contact_id,
        customer_name: contact.name.or_else(|| lead.name.clone()),
        phone: contact.phone,
        email: contact.email,
        original_utm_source: original.source,
        original_utm_campaign: original.campaign,
        original_utm_medium: original.medium,
        attribution_source: origin.source,
        related_deal_id: origin.related_deal_id,
        sale_date: sale_timestamp(lead),
        product_type: product.as_str().to_string(),
        targetologist,
        raw_payload: serde_json::to_value(lead).unwrap_or(serde_json::Value::Null),
    })
}

fn tally(stats: &mut ImportStats, sale: &ChallengeSale) {
    if let Some(pipeline_id) = sale.pipeline_id {
        stats.by_pipeline.entry(pipeline_id).or_default().add(sale.amount);
    }
    let team = sale
        .targetologist
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    stats.by_targetologist.entry(team).or_default().add(sale.amount);
    if sale.prepaid {
        stats.by_prepaid.prepaid.add(sale.amount);
    } else {
        stats.by_prepaid.full.add(sale.amount);
    }
    stats
        .by_date
        .entry(sale.sale_date.date_naive())
        .or_default()
        .add(sale.amount);
}

fn sale_timestamp(lead: &Lead) -> DateTime<Utc> {
    lead.closed_at
        .or(lead.updated_at)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now)
}
