//! Routing decision engine and the stage filter that gates it.

use salestrail_common::{RoutingDecision, UtmSet};

use crate::config::TargetologistRule;
use crate::targetologist::resolve_targetologist;

/// Decide which downstream subsystem(s) receive a sale. Ordered, first match
/// wins, total: every admissible deal gets exactly one of the four outcomes.
///
/// 1. `ref_`-prefixed source → referral (always wins, even over a team match);
/// 2. a resolvable targetologist → traffic;
/// 3. some UTM present but unmatched → unknown (kept for manual review);
/// 4. no UTM at all → both, so a zero-signal sale is never silently dropped.
pub fn decide_route(utm: &UtmSet, rules: &[TargetologistRule]) -> RoutingDecision {
    let source = utm.source.as_deref().unwrap_or("").to_lowercase();

    if source.starts_with("ref_") {
        return RoutingDecision::Referral;
    }

    if resolve_targetologist(utm, rules).is_some() {
        return RoutingDecision::Traffic;
    }

    let campaign = utm.campaign.as_deref().unwrap_or("");
    if !source.is_empty() || !campaign.is_empty() {
        return RoutingDecision::Unknown;
    }

    RoutingDecision::Both
}

/// Gate in front of routing: only deals in a target pipeline that reached the
/// "successfully completed" status are processed. Everything else is a no-op
/// counted as skipped, never routed, and never an error.
#[derive(Debug, Clone)]
pub struct StageFilter {
    pub pipeline_ids: Vec<i64>,
    pub success_status_id: i64,
}

impl StageFilter {
    pub fn admits(&self, pipeline_id: Option<i64>, status_id: Option<i64>) -> bool {
        // A payload without a pipeline id is admitted on status alone; some
        // webhook variants omit it for deals already scoped to the hook.
        if let Some(pipeline_id) = pipeline_id {
            if !self.pipeline_ids.contains(&pipeline_id) {
                return false;
            }
        }
        status_id == Some(self.success_status_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttributionConfig;

    fn rules() -> Vec<TargetologistRule> {
        AttributionConfig::production().targetologists
    }

    fn utm(source: Option<&str>, campaign: Option<&str>) -> UtmSet {
        UtmSet {
            source: source.map(String::from),
            campaign: campaign.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn ref_prefix_always_wins() {
        // Even a campaign that matches a team pattern loses to ref_.
        let decision = decide_route(&utm(Some("ref_abc123"), Some("kenesary_promo")), &rules());
        assert_eq!(decision, RoutingDecision::Referral);
    }

    #[test]
    fn team_match_routes_to_traffic() {
        assert_eq!(
            decide_route(&utm(Some("kenjifb"), Some("express_promo")), &rules()),
            RoutingDecision::Traffic
        );
        assert_eq!(
            decide_route(&utm(Some("kenesary_something"), None), &rules()),
            RoutingDecision::Traffic
        );
    }

    #[test]
    fn unmatched_signal_is_unknown_not_error() {
        assert_eq!(
            decide_route(&utm(Some("randomblog"), None), &rules()),
            RoutingDecision::Unknown
        );
        assert_eq!(
            decide_route(&utm(None, Some("obscure_campaign")), &rules()),
            RoutingDecision::Unknown
        );
    }

    #[test]
    fn zero_signal_falls_back_to_both() {
        assert_eq!(decide_route(&UtmSet::default(), &rules()), RoutingDecision::Both);
    }

    #[test]
    fn routing_is_deterministic() {
        let u = utm(Some("kenjifb"), Some("express_promo"));
        assert_eq!(decide_route(&u, &rules()), decide_route(&u, &rules()));
    }

    #[test]
    fn stage_filter_gates_on_pipeline_and_status() {
        let filter = StageFilter {
            pipeline_ids: vec![10],
            success_status_id: 142,
        };
        assert!(filter.admits(Some(10), Some(142)));
        assert!(filter.admits(None, Some(142)));
        assert!(!filter.admits(Some(11), Some(142)));
        assert!(!filter.admits(Some(10), Some(143)));
        assert!(!filter.admits(Some(10), None));
    }
}
