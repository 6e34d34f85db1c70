//! First-touch attribution recovery.
//!
//! A payment deal (tripwire purchase, main-product upsell) often lives in a
//! different pipeline than the deal that originally captured marketing
//! attribution. This walks backward through the customer's earlier deals to
//! recover the acquisition UTM, so channel revenue reports credit the source
//! that actually acquired the customer.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use amocrm_client::{AmoCrmClient, Contact, Lead};
use salestrail_common::{AttributionSource, UtmSet};

use crate::config::UtmFieldIds;
use crate::extractor::{extract_contact_info, extract_utm};

/// CRM lookups needed by origin resolution. A trait seam so the resolver can
/// be tested without a live account.
#[async_trait]
pub trait DealLookup: Send + Sync {
    async fn leads_by_ids(&self, ids: &[i64]) -> Result<Vec<Lead>>;
    async fn contacts_by_phone(&self, phone: &str) -> Result<Vec<Contact>>;
}

#[async_trait]
impl DealLookup for AmoCrmClient {
    async fn leads_by_ids(&self, ids: &[i64]) -> Result<Vec<Lead>> {
        Ok(AmoCrmClient::leads_by_ids(self, ids).await?)
    }

    async fn contacts_by_phone(&self, phone: &str) -> Result<Vec<Contact>> {
        Ok(self.contacts_by_query(phone).await?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OriginalUtm {
    pub original: UtmSet,
    pub source: AttributionSource,
    pub related_deal_id: Option<i64>,
    pub phone: Option<String>,
}

/// Recover the first-touch UTM for a deal. Priority:
///
/// 1. the current deal already carries a usable source → `current_deal`;
/// 2. deals linked to the embedded contact, earliest first → `related_deal`;
/// 3. a contact search by normalized phone → `phone_match`;
/// 4. nothing found → `fallback` with the literal "unknown" source.
///
/// Never fails: attribution enrichment is best-effort, so every lookup error
/// degrades to the current deal's UTM with a warning.
pub async fn resolve_original_utm(
    lead: &Lead,
    ids: &UtmFieldIds,
    lookup: &dyn DealLookup,
) -> OriginalUtm {
    let current = extract_utm(lead, ids);
    let phone = extract_contact_info(lead).phone;

    match try_resolve(lead, &current, phone.as_deref(), ids, lookup).await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(deal_id = lead.id, error = %e, "Origin lookup failed, keeping current UTM");
            OriginalUtm {
                original: current,
                source: AttributionSource::CurrentDeal,
                related_deal_id: None,
                phone,
            }
        }
    }
}

async fn try_resolve(
    lead: &Lead,
    current: &UtmSet,
    phone: Option<&str>,
    ids: &UtmFieldIds,
    lookup: &dyn DealLookup,
) -> Result<OriginalUtm> {
    if current.has_usable_source() {
        debug!(deal_id = lead.id, "Using UTM from current deal");
        return Ok(OriginalUtm {
            original: current.clone(),
            source: AttributionSource::CurrentDeal,
            related_deal_id: None,
            phone: phone.map(String::from),
        });
    }

    let Some(phone) = phone else {
        return Ok(fallback(None, None));
    };

    // Deals already linked to the embedded contact.
    let linked_ids: Vec<i64> = lead
        .first_contact()
        .and_then(|c| c.embedded.as_ref())
        .map(|e| e.leads.iter().map(|l| l.id).collect())
        .unwrap_or_default();

    if let Some((deal_id, utm)) =
        earliest_with_utm(lookup.leads_by_ids(&linked_ids).await?, lead.id, ids)
    {
        debug!(deal_id = lead.id, related_deal_id = deal_id, "Using UTM from related deal");
        return Ok(OriginalUtm {
            original: utm,
            source: AttributionSource::RelatedDeal,
            related_deal_id: Some(deal_id),
            phone: Some(phone.to_string()),
        });
    }

    // Wider net: every deal of every contact matching the phone.
    let contacts = lookup.contacts_by_phone(phone).await?;
    let mut phone_deal_ids: Vec<i64> = contacts
        .iter()
        .filter_map(|c| c.embedded.as_ref())
        .flat_map(|e| e.leads.iter().map(|l| l.id))
        .filter(|id| !linked_ids.contains(id))
        .collect();
    phone_deal_ids.dedup();

    if let Some((deal_id, utm)) =
        earliest_with_utm(lookup.leads_by_ids(&phone_deal_ids).await?, lead.id, ids)
    {
        debug!(deal_id = lead.id, related_deal_id = deal_id, "Using UTM from phone-matched deal");
        return Ok(OriginalUtm {
            original: utm,
            source: AttributionSource::PhoneMatch,
            related_deal_id: Some(deal_id),
            phone: Some(phone.to_string()),
        });
    }

    debug!(deal_id = lead.id, "No UTM found in customer history");
    Ok(fallback(Some(phone), Some(phone)))
}

/// Sort by creation time (earliest = first touch), skip the current deal, and
/// return the first one carrying a usable UTM source.
fn earliest_with_utm(
    mut deals: Vec<Lead>,
    current_deal_id: i64,
    ids: &UtmFieldIds,
) -> Option<(i64, UtmSet)> {
    deals.sort_by_key(|d| d.created_at.unwrap_or(i64::MAX));
    deals
        .iter()
        .filter(|d| d.id != current_deal_id)
        .find_map(|d| {
            let utm = extract_utm(d, ids);
            utm.has_usable_source().then(|| (d.id, utm))
        })
}

fn fallback(campaign_phone: Option<&str>, phone: Option<&str>) -> OriginalUtm {
    OriginalUtm {
        original: UtmSet {
            source: Some("unknown".to_string()),
            // The phone lands in the campaign slot so an operator can trace
            // the customer from the fallback row.
            campaign: campaign_phone.map(String::from),
            ..Default::default()
        },
        source: AttributionSource::Fallback,
        related_deal_id: None,
        phone: phone.map(String::from),
    }
}
