//! Responsible-team resolution from UTM signals.

use salestrail_common::UtmSet;

use crate::config::TargetologistRule;

/// Resolve the marketing team responsible for a deal. Rules are tried in
/// declaration order; within a rule, `utm_source` is the primary signal with
/// medium/campaign as secondary. `None` ("Unknown" team) is a legitimate
/// terminal state, not a failure.
pub fn resolve_targetologist<'a>(
    utm: &UtmSet,
    rules: &'a [TargetologistRule],
) -> Option<&'a str> {
    let source = utm.source.as_deref().unwrap_or("").to_lowercase();
    let medium = utm.medium.as_deref().unwrap_or("").to_lowercase();
    let campaign = utm.campaign.as_deref().unwrap_or("").to_lowercase();

    for rule in rules {
        let source_hit =
            !source.is_empty() && rule.source_patterns.iter().any(|p| source.contains(p));
        let medium_hit =
            !medium.is_empty() && rule.medium_patterns.iter().any(|p| medium.contains(p));
        let campaign_hit =
            !campaign.is_empty() && rule.campaign_patterns.iter().any(|p| campaign.contains(p));
        if source_hit || medium_hit || campaign_hit {
            return Some(&rule.name);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttributionConfig;

    fn utm(source: Option<&str>, medium: Option<&str>, campaign: Option<&str>) -> UtmSet {
        UtmSet {
            source: source.map(String::from),
            medium: medium.map(String::from),
            campaign: campaign.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn distinct_substrings_resolve_to_same_team() {
        let rules = AttributionConfig::production().targetologists;
        let a = resolve_targetologist(&utm(Some("kenjifb"), None, None), &rules);
        let b = resolve_targetologist(&utm(Some("kenesary_something"), None, None), &rules);
        assert_eq!(a, Some("Kenesary"));
        assert_eq!(a, b);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let rules = AttributionConfig::production().targetologists;
        assert_eq!(
            resolve_targetologist(&utm(Some("FBArystan"), None, None), &rules),
            Some("Arystan")
        );
    }

    #[test]
    fn medium_is_a_secondary_signal() {
        let rules = AttributionConfig::production().targetologists;
        assert_eq!(
            resolve_targetologist(&utm(Some("someblog"), Some("muha_retarget"), None), &rules),
            Some("Muha")
        );
    }

    #[test]
    fn declaration_order_breaks_pattern_overlap() {
        let rules = vec![
            TargetologistRule::new("First", &["shared"], &[], &[]),
            TargetologistRule::new("Second", &["shared", "own"], &[], &[]),
        ];
        assert_eq!(
            resolve_targetologist(&utm(Some("shared_campaign"), None, None), &rules),
            Some("First")
        );
        assert_eq!(
            resolve_targetologist(&utm(Some("own_thing"), None, None), &rules),
            Some("Second")
        );
    }

    #[test]
    fn no_signal_resolves_to_none() {
        let rules = AttributionConfig::production().targetologists;
        assert_eq!(resolve_targetologist(&UtmSet::default(), &rules), None);
        assert_eq!(
            resolve_targetologist(&utm(Some("randomblog"), None, None), &rules),
            None
        );
    }
}
