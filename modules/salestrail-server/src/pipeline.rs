//! Per-delivery webhook processing: stage filter → UTM extraction → routing →
//! destination upserts → audit log, with deals handled sequentially in
//! delivery order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use amocrm_client::Lead;
use salestrail_attribution::{
    decide_route, extract_contact_info, extract_utm, normalize_phone, AttributionConfig,
    ContactInfo, StageFilter,
};
use salestrail_common::{ProcessingStatus, RoutingDecision, UpsertOutcome, UtmSet};
use salestrail_store::{
    NotificationRow, NotificationStore, ReferralConversion, ReferralStore, TrackingSale,
    TrackingStore, WebhookLog, WebhookLogEntry,
};

use crate::notify::{Notifier, SaleAlert};

const PRODUCT_NAME: &str = "Main Product";

#[derive(Debug, Default, Serialize)]
pub struct DestinationTally {
    pub processed: u32,
    pub errors: u32,
}

#[derive(Debug, Default, Serialize)]
pub struct UnknownTally {
    pub processed: u32,
}

/// Per-delivery outcome breakdown, returned verbatim in the webhook response.
#[derive(Debug, Default, Serialize)]
pub struct DeliveryResults {
    pub total: u32,
    pub referral: DestinationTally,
    pub traffic: DestinationTally,
    pub unknown: UnknownTally,
    pub skipped: u32,
}

/// Contact details some webhook variants carry at the lead-wrapper level
/// instead of embedding into the deal.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct InlineContact {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

pub struct WebhookPipeline {
    config: AttributionConfig,
    stage_filter: StageFilter,
    tracking: TrackingStore,
    referral: ReferralStore,
    notifications: NotificationStore,
    audit: WebhookLog,
    notifier: Notifier,
}

impl WebhookPipeline {
    pub fn new(
        config: AttributionConfig,
        tracking: TrackingStore,
        referral: ReferralStore,
        notifications: NotificationStore,
        audit: WebhookLog,
        notifier: Notifier,
    ) -> Self {
        let stage_filter = StageFilter {
            pipeline_ids: vec![config.main_pipeline_id],
            success_status_id: config.success_status_id,
        };
        Self {
            config,
            stage_filter,
            tracking,
            referral,
            notifications,
            audit,
            notifier,
        }
    }

    /// Process one webhook delivery. Never fails: per-deal errors land in the
    /// tallies and the audit log, not in the HTTP status.
    pub async fn process_delivery(&self, payload: &Value) -> DeliveryResults {
        let mut results = DeliveryResults::default();
        let Some(leads) = payload.get("leads").and_then(Value::as_array) else {
            info!("Webhook payload carries no leads");
            return results;
        };

        for wrapper in leads {
            self.process_lead(wrapper, &mut results).await;
        }
        results
    }

    async fn process_lead(&self, wrapper: &Value, results: &mut DeliveryResults) {
        let wrapper_pipeline = wrapper.get("pipeline_id").and_then(Value::as_i64);
        let inline: InlineContact = wrapper
            .get("contact")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        for raw_deal in deal_values(wrapper) {
            results.total += 1;
            let deal: Lead = match serde_json::from_value(raw_deal.clone()) {
                Ok(deal) => deal,
                Err(e) => {
                    warn!(error = %e, "Unparseable deal in webhook payload");
                    results.traffic.errors += 1;
                    continue;
                }
            };
            self.process_deal(&deal, raw_deal, wrapper_pipeline, &inline, results)
                .await;
        }
    }

    async fn process_deal(
        &self,
        deal: &Lead,
        raw: &Value,
        wrapper_pipeline: Option<i64>,
        inline: &InlineContact,
        results: &mut DeliveryResults,
    ) {
        let pipeline_id = deal.pipeline_id.or(wrapper_pipeline);

        if !self.stage_filter.admits(pipeline_id, deal.status_id) {
            info!(
                deal_id = deal.id,
                pipeline_id = ?pipeline_id,
                status_id = ?deal.status_id,
                "Skipping deal outside target stage"
            );
            results.skipped += 1;
            return;
        }

        let utm = extract_utm(deal, &self.config.utm_field_ids);
        let decision = decide_route(&utm, &self.config.targetologists);
        info!(
            deal_id = deal.id,
            decision = %decision,
            utm_source = ?utm.source,
            utm_campaign = ?utm.campaign,
            "Routing decision"
        );

        let contact = merge_contact(extract_contact_info(deal), deal, inline);

        let mut status = ProcessingStatus::Success;
        let mut error_message = None;

        match decision {
            RoutingDecision::Referral => match self.record_referral(deal, &utm, &contact).await {
                Ok(()) => results.referral.processed += 1,
                Err(e) => {
                    results.referral.errors += 1;
                    status = ProcessingStatus::Error;
                    error_message = Some(e.to_string());
                }
            },
            RoutingDecision::Traffic => {
                match self.record_traffic(deal, &utm, &contact, pipeline_id).await {
                    Ok(()) => results.traffic.processed += 1,
                    Err(e) => {
                        results.traffic.errors += 1;
                        status = ProcessingStatus::Error;
                        error_message = Some(e.to_string());
                    }
                }
            }
            RoutingDecision::Both => {
                // Zero-signal sale: attempt both destinations rather than
                // silently dropping it. Referral first, for deterministic logs.
                let referral = self.record_referral(deal, &utm, &contact).await;
                let traffic = self.record_traffic(deal, &utm, &contact, pipeline_id).await;

                match &referral {
                    Ok(()) => results.referral.processed += 1,
                    Err(_) => results.referral.errors += 1,
                }
                match &traffic {
                    Ok(()) => results.traffic.processed += 1,
                    Err(_) => results.traffic.errors += 1,
                }

                status = match (&referral, &traffic) {
                    (Ok(()), Ok(())) => ProcessingStatus::Success,
                    (Err(_), Err(_)) => ProcessingStatus::Error,
                    _ => ProcessingStatus::Partial,
                };
                let mut errors = Vec::new();
                if let Err(e) = &referral {
                    errors.push(format!("referral: {e}"));
                }
                if let Err(e) = &traffic {
                    errors.push(format!("traffic: {e}"));
                }
                if !errors.is_empty() {
                    error_message = Some(errors.join("; "));
                }
            }
            RoutingDecision::Unknown => {
                // Logged for manual review; not an error.
                info!(deal_id = deal.id, utm_source = ?utm.source, "Unmatched UTM pattern");
                results.unknown.processed += 1;
            }
        }

        self.audit
            .append(&WebhookLogEntry {
                lead_id: deal.id,
                pipeline_id,
                deal_data: raw.clone(),
                utm_source: utm.source.clone(),
                utm_campaign: utm.campaign.clone(),
                routing_decision: decision,
                processing_status: status,
                error_message,
            })
            .await;
    }

    async fn record_referral(
        &self,
        deal: &Lead,
        utm: &UtmSet,
        contact: &ContactInfo,
    ) -> anyhow::Result<()> {
        let referral_code = utm
            .source
            .clone()
            .unwrap_or_else(|| format!("deal_{}", deal.id));
        let conversion = ReferralConversion {
            deal_id: deal.id,
            referral_code,
            deal_name: deal.name.clone(),
            customer_name: contact.name.clone(),
            customer_email: contact.email.clone(),
            amount: deal.price.unwrap_or(0),
        };
        let outcome = self.referral.upsert(&conversion).await?;
        info!(deal_id = deal.id, outcome = ?outcome, "Referral conversion recorded");
        Ok(())
    }

    async fn record_traffic(
        &self,
        deal: &Lead,
        utm: &UtmSet,
        contact: &ContactInfo,
        pipeline_id: Option<i64>,
    ) -> anyhow::Result<()> {
        let attribution = self.config.resolve(utm, pipeline_id);
        let targetologist = attribution.targetologist.clone();

        let sale = TrackingSale {
            sale_id: deal.id,
            lead_name: deal.name.clone(),
            contact_name: contact.name.clone(),
            contact_phone: contact.phone.clone(),
            contact_email: contact.email.clone(),
            sale_price: deal.price.unwrap_or(0),
            currency: "KZT".to_string(),
            sale_date: sale_date(deal),
            utm: utm.clone(),
            funnel_type: attribution.funnel_type,
            targetologist: targetologist.clone(),
            auto_detected: attribution.auto_detected,
            detection_method: attribution.detection_method,
            pipeline_id,
            status_id: deal.status_id,
            responsible_user_id: deal.responsible_user_id,
            raw_payload: serde_json::to_value(deal).unwrap_or(Value::Null),
        };
        let outcome = self.tracking.upsert(&sale).await?;
        info!(deal_id = deal.id, outcome = ?outcome, "Traffic sale recorded");

        // A celebratory alert only on first insert; a redelivered or merely
        // updated sale must not re-announce itself.
        if outcome == UpsertOutcome::Inserted {
            let row = NotificationRow {
                lead_id: deal.id,
                lead_name: deal.name.clone(),
                contact_name: contact.name.clone(),
                contact_phone: contact.phone.clone(),
                sale_amount: sale.sale_price,
                product_name: Some(PRODUCT_NAME.to_string()),
                targetologist: targetologist.clone(),
                utm: utm.clone(),
                pipeline_id,
                status_id: deal.status_id,
                responsible_user_id: deal.responsible_user_id,
            };
            if let Err(e) = self.notifications.record(&row).await {
                warn!(deal_id = deal.id, error = %e, "Failed to record sales notification");
            }
            self.notifier.spawn_sale_alert(SaleAlert {
                lead_id: deal.id,
                targetologist,
                contact_name: contact.name.clone(),
                amount: sale.sale_price,
                product_name: PRODUCT_NAME.to_string(),
                campaign: utm.campaign.clone(),
            });
        }
        Ok(())
    }
}

/// The deal array of a webhook lead: `deals`, `update`, or the lead itself.
fn deal_values(wrapper: &Value) -> Vec<&Value> {
    for key in ["deals", "update"] {
        if let Some(deals) = wrapper.get(key).and_then(Value::as_array) {
            return deals.iter().collect();
        }
    }
    vec![wrapper]
}

fn merge_contact(mut contact: ContactInfo, deal: &Lead, inline: &InlineContact) -> ContactInfo {
    if contact.name.is_none() {
        contact.name = inline.name.clone().or_else(|| deal.name.clone());
    }
    if contact.phone.is_none() {
        contact.phone = inline
            .phone
            .as_deref()
            .map(normalize_phone)
            .filter(|p| !p.is_empty());
    }
    if contact.email.is_none() {
        contact.email = inline.email.clone();
    }
    contact
}

fn sale_date(deal: &Lead) -> chrono::NaiveDate {
    deal.closed_at
        .or(deal.updated_at)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|| Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deal_values_prefers_deals_array() {
        let wrapper = json!({"id": 1, "deals": [{"id": 2}, {"id": 3}], "update": [{"id": 4}]});
        let ids: Vec<i64> = deal_values(&wrapper)
            .iter()
            .map(|v| v["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn deal_values_falls_back_to_update_then_self() {
        let wrapper = json!({"id": 1, "update": [{"id": 4}]});
        assert_eq!(deal_values(&wrapper)[0]["id"].as_i64(), Some(4));

        let bare = json!({"id": 9, "status_id": 142});
        assert_eq!(deal_values(&bare)[0]["id"].as_i64(), Some(9));
    }

    #[test]
    fn inline_contact_fills_missing_fields_only() {
        let deal: Lead = serde_json::from_value(json!({"id": 1, "name": "Deal name"})).unwrap();
        let inline = InlineContact {
            name: Some("Dana".into()),
            phone: Some("+7 701 111-22-33".into()),
            email: Some("dana@example.kz".into()),
        };
        let merged = merge_contact(ContactInfo::default(), &deal, &inline);
        assert_eq!(merged.name.as_deref(), Some("Dana"));
        assert_eq!(merged.phone.as_deref(), Some("77011112233"));

        let already = ContactInfo {
            contact_id: Some(5),
            name: Some("Embedded".into()),
            phone: Some("87770001122".into()),
            email: None,
        };
        let merged = merge_contact(already, &deal, &inline);
        assert_eq!(merged.name.as_deref(), Some("Embedded"));
        assert_eq!(merged.phone.as_deref(), Some("87770001122"));
        assert_eq!(merged.email.as_deref(), Some("dana@example.kz"));
    }

    #[test]
    fn sale_date_prefers_closed_at() {
        let deal: Lead = serde_json::from_value(json!({
            "id": 1,
            "closed_at": 1736899200,   // 2025-01-15
            "updated_at": 1737072000,  // 2025-01-17
        }))
        .unwrap();
        assert_eq!(
            sale_date(&deal),
            chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
        );
    }
}
