//! UTM extraction from heterogeneous deal payloads.
//!
//! AmoCRM delivers UTM values in at least five shapes depending on API
//! version and webhook configuration. Each shape gets its own extractor
//! strategy returning a partial [`UtmSet`]; the strategies are composed
//! left-to-right with first-non-empty-wins merge per field.

use amocrm_client::{Contact, Lead};
use salestrail_common::UtmSet;

use crate::config::UtmFieldIds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UtmKey {
    Source,
    Medium,
    Campaign,
    Content,
    Term,
    Referrer,
    ClickId,
}

fn set_key(utm: &mut UtmSet, key: UtmKey, value: String) {
    let slot = match key {
        UtmKey::Source => &mut utm.source,
        UtmKey::Medium => &mut utm.medium,
        UtmKey::Campaign => &mut utm.campaign,
        UtmKey::Content => &mut utm.content,
        UtmKey::Term => &mut utm.term,
        UtmKey::Referrer => &mut utm.referrer,
        UtmKey::ClickId => &mut utm.click_id,
    };
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value);
    }
}

/// Extract marketing tags from a deal. Pure; missing UTM yields an all-`None`
/// set, unknown fields are ignored.
pub fn extract_utm(lead: &Lead, ids: &UtmFieldIds) -> UtmSet {
    let mut utm = UtmSet::default();
    utm.merge_missing_from(&by_field_id(lead, ids));
    utm.merge_missing_from(&by_field_name(lead));
    utm.merge_missing_from(&by_legacy_fields(lead));
    utm.merge_missing_from(&by_ref_tag(lead));
    utm.merge_missing_from(&by_direct_fields(lead));
    utm
}

/// Strategy 1: numeric field-id match against the configured id map
/// (v4 `custom_fields_values`). The most reliable shape.
fn by_field_id(lead: &Lead, ids: &UtmFieldIds) -> UtmSet {
    let mut utm = UtmSet::default();
    let Some(fields) = &lead.custom_fields_values else {
        return utm;
    };
    for field in fields {
        let Some(field_id) = field.field_id else {
            continue;
        };
        let Some(value) = field.first_value() else {
            continue;
        };
        let key = if field_id == ids.source {
            UtmKey::Source
        } else if field_id == ids.medium {
            UtmKey::Medium
        } else if field_id == ids.campaign {
            UtmKey::Campaign
        } else if field_id == ids.content {
            UtmKey::Content
        } else if field_id == ids.term {
            UtmKey::Term
        } else if field_id == ids.referrer {
            UtmKey::Referrer
        } else if field_id == ids.click_id {
            UtmKey::ClickId
        } else {
            continue;
        };
        set_key(&mut utm, key, value);
    }
    utm
}

/// Map a free-text field label to a UTM key. Handles both English keys and
/// the localized labels some CRM accounts use.
fn key_for_label(label: &str) -> Option<UtmKey> {
    let l = label.to_lowercase();
    if l.contains("utm_source") || l.contains("источник") {
        Some(UtmKey::Source)
    } else if l.contains("utm_medium") || l.contains("канал") {
        Some(UtmKey::Medium)
    } else if l.contains("utm_campaign") || l.contains("кампания") {
        Some(UtmKey::Campaign)
    } else if l.contains("utm_content") || l.contains("контент") {
        Some(UtmKey::Content)
    } else if l.contains("utm_term") || l.contains("ключ") {
        Some(UtmKey::Term)
    } else if l.contains("referrer") || l.contains("реферер") {
        Some(UtmKey::Referrer)
    } else if l.contains("fbclid") || l.contains("utm_id") {
        Some(UtmKey::ClickId)
    } else {
        None
    }
}

/// Strategy 2: fuzzy field-name substring match on `custom_fields_values`,
/// for accounts where field ids differ but labels are recognizable.
fn by_field_name(lead: &Lead) -> UtmSet {
    let mut utm = UtmSet::default();
    let Some(fields) = &lead.custom_fields_values else {
        return utm;
    };
    for field in fields {
        let Some(name) = &field.field_name else {
            continue;
        };
        let Some(key) = key_for_label(name) else {
            continue;
        };
        if let Some(value) = field.first_value() {
            set_key(&mut utm, key, value);
        }
    }
    utm
}

/// Strategy 3: legacy flat `custom_fields` shape (`name`/`code` + `value`).
fn by_legacy_fields(lead: &Lead) -> UtmSet {
    let mut utm = UtmSet::default();
    let Some(fields) = &lead.custom_fields else {
        return utm;
    };
    for field in fields {
        let label = field.name.as_deref().or(field.code.as_deref());
        let Some(key) = label.and_then(key_for_label) else {
            continue;
        };
        if let Some(value) = field.first_value() {
            set_key(&mut utm, key, value);
        }
    }
    utm
}

/// Strategy 4: a `ref_`-prefixed tag is a referral-link marker and doubles as
/// the source identifier when nothing better is present.
fn by_ref_tag(lead: &Lead) -> UtmSet {
    let mut utm = UtmSet::default();
    let Some(tags) = &lead.tags else {
        return utm;
    };
    let ref_tag = tags
        .iter()
        .filter_map(|t| t.name.as_deref())
        .find(|name| name.starts_with("ref_"));
    if let Some(name) = ref_tag {
        set_key(&mut utm, UtmKey::Source, name.to_string());
    }
    utm
}

/// Strategy 5: top-level convenience fields, sent directly by some webhook
/// configurations.
fn by_direct_fields(lead: &Lead) -> UtmSet {
    UtmSet {
        source: lead.utm_source.clone().filter(|v| !v.is_empty()),
        medium: lead.utm_medium.clone().filter(|v| !v.is_empty()),
        campaign: lead.utm_campaign.clone().filter(|v| !v.is_empty()),
        content: lead.utm_content.clone().filter(|v| !v.is_empty()),
        term: lead.utm_term.clone().filter(|v| !v.is_empty()),
        referrer: None,
        click_id: None,
    }
}

// --- Contact info ---

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactInfo {
    pub contact_id: Option<i64>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Strip everything but digits. CRM phone fields mix "+7 (777) 123-45-67"
/// and "87771234567" freely; digits-only is the comparable form.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Pull the first embedded contact's name, phone and email. Phone is matched
/// by the PHONE field code or the localized "Телефон" label, and normalized.
pub fn extract_contact_info(lead: &Lead) -> ContactInfo {
    let Some(contact) = lead.first_contact() else {
        return ContactInfo::default();
    };
    ContactInfo {
        contact_id: Some(contact.id),
        name: contact.name.clone(),
        phone: contact_phone(contact),
        email: contact_field(contact, "EMAIL", &["email"]),
    }
}

fn contact_phone(contact: &Contact) -> Option<String> {
    contact_field(contact, "PHONE", &["телефон", "phone"])
        .map(|p| normalize_phone(&p))
        .filter(|p| !p.is_empty())
}

fn contact_field(contact: &Contact, code: &str, name_labels: &[&str]) -> Option<String> {
    let fields = contact.custom_fields_values.as_ref()?;
    for field in fields {
        let code_match = field.field_code.as_deref() == Some(code);
        let name_match = field
            .field_name
            .as_deref()
            .map(|n| {
                let n = n.to_lowercase();
                name_labels.iter().any(|l| n.contains(l))
            })
            .unwrap_or(false);
        if code_match || name_match {
            if let Some(value) = field.first_value() {
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttributionConfig;
    use serde_json::json;

    fn field_ids() -> UtmFieldIds {
        AttributionConfig::production().utm_field_ids
    }

    fn lead(value: serde_json::Value) -> Lead {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn field_id_match_wins_over_field_name() {
        let lead = lead(json!({
            "id": 1,
            "custom_fields_values": [
                {"field_id": 434731, "field_name": "whatever", "values": [{"value": "by_id"}]},
                {"field_id": 999, "field_name": "utm_source", "values": [{"value": "by_name"}]}
            ]
        }));
        let utm = extract_utm(&lead, &field_ids());
        assert_eq!(utm.source.as_deref(), Some("by_id"));
    }

    #[test]
    fn localized_field_names_are_recognized() {
        let lead = lead(json!({
            "id": 1,
            "custom_fields_values": [
                {"field_id": 1, "field_name": "Источник трафика", "values": [{"value": "insta"}]},
                {"field_id": 2, "field_name": "Кампания", "values": [{"value": "express_promo"}]}
            ]
        }));
        let utm = extract_utm(&lead, &field_ids());
        assert_eq!(utm.source.as_deref(), Some("insta"));
        assert_eq!(utm.campaign.as_deref(), Some("express_promo"));
    }

    #[test]
    fn legacy_shape_fills_gaps_only() {
        let lead = lead(json!({
            "id": 1,
            "custom_fields_values": [
                {"field_id": 434731, "values": [{"value": "primary"}]}
            ],
            "custom_fields": [
                {"code": "utm_source", "value": "legacy"},
                {"name": "utm_medium", "value": "cpc"}
            ]
        }));
        let utm = extract_utm(&lead, &field_ids());
        assert_eq!(utm.source.as_deref(), Some("primary"));
        assert_eq!(utm.medium.as_deref(), Some("cpc"));
    }

    #[test]
    fn ref_tag_is_source_fallback() {
        let lead = lead(json!({
            "id": 1,
            "tags": [{"name": "hot"}, {"name": "ref_abc123"}]
        }));
        let utm = extract_utm(&lead, &field_ids());
        assert_eq!(utm.source.as_deref(), Some("ref_abc123"));
    }

    #[test]
    fn direct_fields_are_last_resort() {
        let lead = lead(json!({
            "id": 1,
            "utm_source": "direct",
            "utm_campaign": "c1"
        }));
        let utm = extract_utm(&lead, &field_ids());
        assert_eq!(utm.source.as_deref(), Some("direct"));
        assert_eq!(utm.campaign.as_deref(), Some("c1"));
    }

    #[test]
    fn missing_utm_is_all_none_not_error() {
        let lead = lead(json!({"id": 1, "name": "no utm at all"}));
        let utm = extract_utm(&lead, &field_ids());
        assert!(utm.is_empty());
    }

    #[test]
    fn contact_phone_is_normalized() {
        let lead = lead(json!({
            "id": 1,
            "_embedded": {"contacts": [{
                "id": 7,
                "name": "Aruzhan",
                "custom_fields_values": [
                    {"field_code": "PHONE", "values": [{"value": "+7 (777) 123-45-67"}]},
                    {"field_name": "Email", "values": [{"value": "a@example.kz"}]}
                ]
            }]}
        }));
        let info = extract_contact_info(&lead);
        assert_eq!(info.contact_id, Some(7));
        assert_eq!(info.phone.as_deref(), Some("77771234567"));
        assert_eq!(info.email.as_deref(), Some("a@example.kz"));
    }

    #[test]
    fn localized_phone_label_works_without_code() {
        let lead = lead(json!({
            "id": 1,
            "_embedded": {"contacts": [{
                "id": 7,
                "custom_fields_values": [
                    {"field_name": "Телефон", "values": [{"value": "8777 000 11 22"}]}
                ]
            }]}
        }));
        assert_eq!(
            extract_contact_info(&lead).phone.as_deref(),
            Some("87770001122")
        );
    }
}
