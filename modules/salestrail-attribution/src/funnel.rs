//! Product-funnel classification from campaign text.

use amocrm_client::Lead;
use salestrail_common::{FunnelType, UtmSet};

use crate::config::AttributionConfig;

/// Keyword groups are ordered; the first group with a hit wins.
const EXPRESS_KEYWORDS: &[&str] = &["express", "экспресс"];
const CHALLENGE_KEYWORDS: &[&str] = &["challenge", "трехдневник", "3дневник", "3d", "3х", "diary"];
const INTENSIVE_KEYWORDS: &[&str] = &["intensive", "однодневник", "1d"];

/// Express-specific markers used only by product-type classification (the
/// tripwire price points show up in campaign names).
const EXPRESS_PRODUCT_KEYWORDS: &[&str] = &["express", "экспресс", "5000", "5k"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelDetection {
    pub funnel_type: FunnelType,
    pub auto_detected: bool,
    pub detection_method: &'static str,
}

/// Classify a deal's funnel from its campaign text. A missing campaign takes
/// the pipeline default with `detection_method = "default"`; a present but
/// unmatched campaign takes the same default as `"pipeline_default"`. The
/// auto-detected/defaulted distinction is preserved for reconciliation.
pub fn resolve_funnel(campaign: Option<&str>, pipeline_default: FunnelType) -> FunnelDetection {
    let Some(campaign) = campaign.filter(|c| !c.is_empty()) else {
        return FunnelDetection {
            funnel_type: pipeline_default,
            auto_detected: false,
            detection_method: "default",
        };
    };

    let campaign = campaign.to_lowercase();
    let keyword_hit = |keywords: &[&str]| keywords.iter().any(|k| campaign.contains(k));

    let funnel_type = if keyword_hit(EXPRESS_KEYWORDS) {
        FunnelType::Express
    } else if keyword_hit(CHALLENGE_KEYWORDS) {
        FunnelType::Challenge3d
    } else if keyword_hit(INTENSIVE_KEYWORDS) {
        FunnelType::Intensive1d
    } else {
        return FunnelDetection {
            funnel_type: pipeline_default,
            auto_detected: false,
            detection_method: "pipeline_default",
        };
    };

    FunnelDetection {
        funnel_type,
        auto_detected: true,
        detection_method: "utm_campaign_keyword",
    }
}

/// Product classification for the Challenge3D import path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductType {
    Challenge3d,
    Express,
    Unknown,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Challenge3d => "challenge3d",
            ProductType::Express => "express",
            ProductType::Unknown => "unknown",
        }
    }
}

/// Pipeline id is the most reliable signal and beats campaign keywords;
/// keywords only decide for deals outside the known pipelines.
pub fn determine_product_type(lead: &Lead, utm: &UtmSet, config: &AttributionConfig) -> ProductType {
    if let Some(pipeline_id) = lead.pipeline_id {
        if config.challenge_pipeline_ids.contains(&pipeline_id) {
            return ProductType::Challenge3d;
        }
        if pipeline_id == config.express_pipeline_id {
            return ProductType::Express;
        }
    }

    let campaign = utm.campaign.as_deref().unwrap_or("").to_lowercase();
    if CHALLENGE_KEYWORDS.iter().any(|k| campaign.contains(k)) {
        return ProductType::Challenge3d;
    }
    if EXPRESS_PRODUCT_KEYWORDS.iter().any(|k| campaign.contains(k)) {
        return ProductType::Express;
    }
    ProductType::Unknown
}

/// Below-threshold amounts are prepayments for a later full purchase.
pub fn is_prepaid(amount: i64, threshold: i64) -> bool {
    amount < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_campaign_defaults_without_auto_flag() {
        let d = resolve_funnel(None, FunnelType::Express);
        assert_eq!(d.funnel_type, FunnelType::Express);
        assert!(!d.auto_detected);
        assert_eq!(d.detection_method, "default");
    }

    #[test]
    fn keyword_match_sets_auto_flag() {
        let d = resolve_funnel(Some("campaign_3dney"), FunnelType::Express);
        assert_eq!(d.funnel_type, FunnelType::Challenge3d);
        assert!(d.auto_detected);
        assert_eq!(d.detection_method, "utm_campaign_keyword");
    }

    #[test]
    fn cyrillic_keywords_match() {
        let d = resolve_funnel(Some("Запуск ЭКСПРЕСС октябрь"), FunnelType::Challenge3d);
        assert_eq!(d.funnel_type, FunnelType::Express);
        assert!(d.auto_detected);

        let d = resolve_funnel(Some("однодневник_тест"), FunnelType::Express);
        assert_eq!(d.funnel_type, FunnelType::Intensive1d);
    }

    #[test]
    fn unmatched_campaign_takes_pipeline_default() {
        let d = resolve_funnel(Some("brand_awareness"), FunnelType::Express);
        assert_eq!(d.funnel_type, FunnelType::Express);
        assert!(!d.auto_detected);
        assert_eq!(d.detection_method, "pipeline_default");
    }

    #[test]
    fn pipeline_beats_campaign_keywords() {
        let config = AttributionConfig::production();
        let lead = Lead {
            id: 1,
            pipeline_id: Some(config.challenge_pipeline_ids[0]),
            ..Default::default()
        };
        let utm = UtmSet {
            campaign: Some("express_promo".into()),
            ..Default::default()
        };
        assert_eq!(
            determine_product_type(&lead, &utm, &config),
            ProductType::Challenge3d
        );
    }

    #[test]
    fn unknown_pipeline_falls_back_to_keywords() {
        let config = AttributionConfig::production();
        let lead = Lead {
            id: 1,
            pipeline_id: Some(1),
            ..Default::default()
        };
        let utm = UtmSet {
            campaign: Some("challenge_december").map(String::from),
            ..Default::default()
        };
        assert_eq!(
            determine_product_type(&lead, &utm, &config),
            ProductType::Challenge3d
        );
        assert_eq!(
            determine_product_type(&lead, &UtmSet::default(), &config),
            ProductType::Unknown
        );
    }

    #[test]
    fn prepaid_threshold_is_exclusive() {
        assert!(is_prepaid(9_999, 10_000));
        assert!(!is_prepaid(10_000, 10_000));
    }
}
