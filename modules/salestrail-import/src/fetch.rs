use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tokio::time::sleep;
use tracing::{info, warn};

use amocrm_client::{AmoCrmClient, AmoCrmError, Lead, LeadQuery, PAGE_LIMIT};

use crate::window::ImportWindow;

/// Pause between CRM pages to stay inside upstream rate limits.
const PAGE_DELAY: Duration = Duration::from_millis(500);

/// Backoff after a 429 before retrying the same page. Jittered (0-1s) so
/// parallel import runs don't re-collide.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// Hard stop for runaway pagination on pathological inputs.
const PAGE_SAFETY_LIMIT: u32 = 100;

/// Destination writes pause for [`DB_PAUSE`] every this many records.
pub const DB_PAUSE_EVERY: usize = 50;
pub const DB_PAUSE: Duration = Duration::from_secs(1);

/// Flag set on ctrl-c. Import loops check it between pages and records, so a
/// cancelled run still prints a summary of the work it finished.
pub fn cancellation_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let inner = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested, finishing current step");
            inner.store(true, Ordering::SeqCst);
        }
    });
    flag
}

pub fn cancelled(flag: &AtomicBool) -> bool {
    flag.load(Ordering::SeqCst)
}

/// Page through every successfully-closed deal of one pipeline.
///
/// 429 backs off and retries the same page; 401 aborts the batch (not
/// recoverable by retry); any other error abandons the remaining pages and
/// returns what was fetched so far.
pub async fn fetch_closed_leads(
    client: &AmoCrmClient,
    pipeline_id: i64,
    status_id: i64,
    window: &ImportWindow,
    with_contacts: bool,
    cancel: &AtomicBool,
) -> Result<Vec<Lead>> {
    let query = LeadQuery {
        pipeline_id,
        status_id,
        closed_from: window.closed_from(),
        closed_to: window.closed_to(),
        with_contacts,
    };

    let mut all = Vec::new();
    let mut page = 1u32;

    loop {
        if cancelled(cancel) {
            warn!(pipeline_id, page, "Cancelled mid-fetch, returning partial result");
            break;
        }

        match client.list_leads(&query, page, PAGE_LIMIT).await {
            Ok(leads) => {
                if leads.is_empty() {
                    break;
                }
                let fetched = leads.len();
                all.extend(leads);
                info!(pipeline_id, page, fetched, total = all.len(), "Fetched leads page");

                if fetched < PAGE_LIMIT as usize {
                    break;
                }
                page += 1;
                if page > PAGE_SAFETY_LIMIT {
                    warn!(pipeline_id, "Reached page safety limit, stopping");
                    break;
                }
                sleep(PAGE_DELAY).await;
            }
            Err(AmoCrmError::RateLimited) => {
                let jitter = Duration::from_millis(rand::rng().random_range(0..1_000));
                warn!(pipeline_id, page, "Rate limited, backing off before retrying page");
                sleep(RATE_LIMIT_BACKOFF + jitter).await;
            }
            Err(e @ AmoCrmError::Unauthorized) => return Err(e.into()),
            Err(e) => {
                warn!(pipeline_id, page, error = %e, "Page fetch failed, abandoning remainder");
                break;
            }
        }
    }

    info!(pipeline_id, total = all.len(), "Pipeline fetch complete");
    Ok(all)
}
