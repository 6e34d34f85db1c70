use serde::{Deserialize, Serialize};

// --- UTM attribution ---

/// Marketing attribution at a single point in time. An all-`None` set is a
/// valid value meaning "no attribution available", never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmSet {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub content: Option<String>,
    pub term: Option<String>,
    pub referrer: Option<String>,
    pub click_id: Option<String>,
}

impl UtmSet {
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.medium.is_none()
            && self.campaign.is_none()
            && self.content.is_none()
            && self.term.is_none()
            && self.referrer.is_none()
            && self.click_id.is_none()
    }

    /// A set is usable for first-touch attribution when the source is present
    /// and not the literal "unknown" placeholder.
    pub fn has_usable_source(&self) -> bool {
        matches!(self.source.as_deref(), Some(s) if !s.is_empty() && s != "unknown")
    }

    /// Fill any `None` field from `other`, leaving existing values untouched.
    pub fn merge_missing_from(&mut self, other: &UtmSet) {
        fn fill(dst: &mut Option<String>, src: &Option<String>) {
            if dst.is_none() {
                dst.clone_from(src);
            }
        }
        fill(&mut self.source, &other.source);
        fill(&mut self.medium, &other.medium);
        fill(&mut self.campaign, &other.campaign);
        fill(&mut self.content, &other.content);
        fill(&mut self.term, &other.term);
        fill(&mut self.referrer, &other.referrer);
        fill(&mut self.click_id, &other.click_id);
    }
}

// --- Product funnels ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelType {
    Express,
    Challenge3d,
    Intensive1d,
}

impl FunnelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunnelType::Express => "express",
            FunnelType::Challenge3d => "challenge3d",
            FunnelType::Intensive1d => "intensive1d",
        }
    }
}

impl std::fmt::Display for FunnelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Funnel classification plus how confident we are in it. `auto_detected`
/// distinguishes a keyword hit from a pipeline default and is surfaced in
/// reports and reconciliation review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionResult {
    pub targetologist: Option<String>,
    pub funnel_type: Option<FunnelType>,
    pub auto_detected: bool,
    pub detection_method: Option<String>,
}

// --- Routing ---

/// Which downstream subsystem(s) receive a sale. A pure function of
/// `(utm.source, utm.campaign)`: same input always yields the same decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    Referral,
    Traffic,
    Both,
    Unknown,
}

impl RoutingDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingDecision::Referral => "referral",
            RoutingDecision::Traffic => "traffic",
            RoutingDecision::Both => "both",
            RoutingDecision::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Origin resolution ---

/// Where a sale's first-touch UTM was recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionSource {
    CurrentDeal,
    RelatedDeal,
    PhoneMatch,
    Fallback,
}

impl AttributionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionSource::CurrentDeal => "current_deal",
            AttributionSource::RelatedDeal => "related_deal",
            AttributionSource::PhoneMatch => "phone_match",
            AttributionSource::Fallback => "fallback",
        }
    }
}

// --- Persistence outcomes ---

/// Result of a dedup-aware upsert against a destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Skipped,
}

/// Overall outcome of processing one admissible deal, recorded in the audit
/// log. `Partial` means a `both` routing where exactly one destination failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    Error,
    Partial,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Success => "success",
            ProcessingStatus::Error => "error",
            ProcessingStatus::Partial => "partial",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_utm_set_is_valid() {
        let utm = UtmSet::default();
        assert!(utm.is_empty());
        assert!(!utm.has_usable_source());
    }

    #[test]
    fn unknown_source_is_not_usable() {
        let utm = UtmSet {
            source: Some("unknown".into()),
            ..Default::default()
        };
        assert!(!utm.has_usable_source());
        assert!(!utm.is_empty());
    }

    #[test]
    fn merge_fills_only_missing_fields() {
        let mut current = UtmSet {
            source: Some("kenjifb".into()),
            ..Default::default()
        };
        let original = UtmSet {
            source: Some("other".into()),
            campaign: Some("express_promo".into()),
            ..Default::default()
        };
        current.merge_missing_from(&original);
        assert_eq!(current.source.as_deref(), Some("kenjifb"));
        assert_eq!(current.campaign.as_deref(), Some("express_promo"));
    }
}
