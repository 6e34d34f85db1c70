//! Attribution configuration tables.
//!
//! All of these are immutable data loaded once at process start and passed
//! explicitly into the resolvers: tests supply synthetic tables, production
//! uses [`AttributionConfig::production`].

use salestrail_common::{AttributionResult, FunnelType, UtmSet};

use crate::funnel::resolve_funnel;
use crate::targetologist::resolve_targetologist;

/// Numeric custom-field ids that carry UTM values in the CRM account.
#[derive(Debug, Clone)]
pub struct UtmFieldIds {
    pub source: i64,
    pub medium: i64,
    pub campaign: i64,
    pub content: i64,
    pub term: i64,
    pub referrer: i64,
    pub click_id: i64,
}

/// One marketing team and the substring patterns that claim a deal for it.
/// Declaration order is load-bearing: earlier teams win on ambiguous overlap.
#[derive(Debug, Clone)]
pub struct TargetologistRule {
    pub name: String,
    /// Patterns tested against `utm_source` (primary signal).
    pub source_patterns: Vec<String>,
    /// Secondary signal patterns tested against `utm_medium`.
    pub medium_patterns: Vec<String>,
    /// Secondary signal patterns tested against `utm_campaign`.
    pub campaign_patterns: Vec<String>,
}

impl TargetologistRule {
    pub fn new(
        name: &str,
        source_patterns: &[&str],
        medium_patterns: &[&str],
        campaign_patterns: &[&str],
    ) -> Self {
        let lower = |ps: &[&str]| ps.iter().map(|p| p.to_lowercase()).collect();
        Self {
            name: name.to_string(),
            source_patterns: lower(source_patterns),
            medium_patterns: lower(medium_patterns),
            campaign_patterns: lower(campaign_patterns),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttributionConfig {
    pub utm_field_ids: UtmFieldIds,
    pub targetologists: Vec<TargetologistRule>,
    pub express_pipeline_id: i64,
    pub challenge_pipeline_ids: Vec<i64>,
    pub main_pipeline_id: i64,
    pub success_status_id: i64,
    /// Sales below this amount (KZT) are prepayments, not full purchases.
    pub prepaid_threshold: i64,
}

impl AttributionConfig {
    /// The production account's field ids, pipelines and team patterns.
    pub fn production() -> Self {
        Self {
            utm_field_ids: UtmFieldIds {
                source: 434731,
                medium: 434727,
                campaign: 434729,
                content: 434725,
                term: 434733,
                referrer: 434735,
                click_id: 434761,
            },
            targetologists: vec![
                TargetologistRule::new(
                    "Kenesary",
                    &[
                        "kenesary", "kenji", "kenjifb", "tripwire", "nutcab", "nutrients",
                        "kenes", "kab3", "1day",
                    ],
                    &["kenesary"],
                    &["kenesary"],
                ),
                TargetologistRule::new(
                    "Arystan",
                    &["arystan", "fbarystan", "ar_", "ast_"],
                    &["arystan"],
                    &["arystan"],
                ),
                TargetologistRule::new(
                    "Muha",
                    &[
                        "muha", "onai", "on ai", "facebook", "yourmarketolog", "запуск",
                        "maqtakyz", "residence", "yourteam", "tima",
                    ],
                    &["muha"],
                    &[],
                ),
                TargetologistRule::new(
                    "Traf4",
                    &["alex", "tf4", "traf4", "proftest", "pb_agency", "smmmcwin"],
                    &["alex"],
                    &[],
                ),
            ],
            express_pipeline_id: 10_350_882,
            challenge_pipeline_ids: vec![9_777_626, 9_430_994],
            main_pipeline_id: 10_418_746,
            success_status_id: 142,
            prepaid_threshold: 10_000,
        }
    }

    /// Funnel default when the campaign carries no keyword signal: deals in a
    /// Challenge3D pipeline default to challenge3d, everything else to express.
    pub fn pipeline_default_funnel(&self, pipeline_id: Option<i64>) -> FunnelType {
        match pipeline_id {
            Some(id) if self.challenge_pipeline_ids.contains(&id) => FunnelType::Challenge3d,
            _ => FunnelType::Express,
        }
    }

    /// Full attribution for one deal: responsible team plus funnel
    /// classification with its confidence marker.
    pub fn resolve(&self, utm: &UtmSet, pipeline_id: Option<i64>) -> AttributionResult {
        let funnel = resolve_funnel(
            utm.campaign.as_deref(),
            self.pipeline_default_funnel(pipeline_id),
        );
        AttributionResult {
            targetologist: resolve_targetologist(utm, &self.targetologists).map(String::from),
            funnel_type: Some(funnel.funnel_type),
            auto_detected: funnel.auto_detected,
            detection_method: Some(funnel.detection_method.to_string()),
        }
    }
}
