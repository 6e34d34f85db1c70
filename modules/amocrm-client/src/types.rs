use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Custom fields ---

/// One entry of the v4 `custom_fields_values` array. Values arrive as
/// strings, numbers or booleans depending on the field type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomFieldValue {
    #[serde(default)]
    pub field_id: Option<i64>,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub field_code: Option<String>,
    #[serde(default)]
    pub values: Vec<FieldValue>,
}

impl CustomFieldValue {
    /// First value of the field rendered as text, if any.
    pub fn first_value(&self) -> Option<String> {
        self.values.first().and_then(FieldValue::as_text)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldValue {
    #[serde(default)]
    pub value: Value,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<String> {
        match &self.value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Legacy flat custom-field shape (`custom_fields` on older webhook payloads):
/// `name`/`code` plus either a bare `value` or a `values` array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyCustomField {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub values: Vec<FieldValue>,
}

impl LegacyCustomField {
    pub fn first_value(&self) -> Option<String> {
        self.values
            .first()
            .and_then(FieldValue::as_text)
            .or_else(|| self.value.clone().filter(|v| !v.is_empty()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub name: Option<String>,
}

// --- Contacts ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub custom_fields_values: Option<Vec<CustomFieldValue>>,
    #[serde(default, rename = "_embedded")]
    pub embedded: Option<ContactEmbedded>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactEmbedded {
    #[serde(default)]
    pub leads: Vec<LeadRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadRef {
    pub id: i64,
}

// --- Leads ---

/// An AmoCRM deal ("lead" in v4 terminology). Immutable snapshot per webhook
/// delivery or per historical-export page. The optional top-level `utm_*`
/// fields cover payload variants where AmoCRM sends UTM directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub status_id: Option<i64>,
    #[serde(default)]
    pub pipeline_id: Option<i64>,
    #[serde(default)]
    pub responsible_user_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub closed_at: Option<i64>,
    #[serde(default)]
    pub custom_fields_values: Option<Vec<CustomFieldValue>>,
    #[serde(default)]
    pub custom_fields: Option<Vec<LegacyCustomField>>,
    #[serde(default)]
    pub tags: Option<Vec<Tag>>,
    #[serde(default, rename = "_embedded")]
    pub embedded: Option<LeadEmbedded>,

    // Direct passthrough fields, seen on some webhook variants.
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_content: Option<String>,
    #[serde(default)]
    pub utm_term: Option<String>,
}

impl Lead {
    pub fn first_contact(&self) -> Option<&Contact> {
        self.embedded.as_ref()?.contacts.first()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadEmbedded {
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

// --- API envelopes ---

#[derive(Debug, Deserialize)]
pub struct LeadsPage {
    #[serde(rename = "_embedded")]
    pub embedded: LeadsEmbedded,
}

#[derive(Debug, Deserialize)]
pub struct LeadsEmbedded {
    #[serde(default)]
    pub leads: Vec<Lead>,
}

#[derive(Debug, Deserialize)]
pub struct ContactsPage {
    #[serde(rename = "_embedded")]
    pub embedded: ContactsEmbedded,
}

#[derive(Debug, Deserialize)]
pub struct ContactsEmbedded {
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

// --- Queries ---

/// Filter for the paginated leads listing.
#[derive(Debug, Clone)]
pub struct LeadQuery {
    pub pipeline_id: i64,
    pub status_id: i64,
    pub closed_from: Option<i64>,
    pub closed_to: Option<i64>,
    pub with_contacts: bool,
}
