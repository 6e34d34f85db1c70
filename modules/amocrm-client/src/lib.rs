pub mod error;
pub mod types;

pub use error::{AmoCrmError, Result};
pub use types::{
    Contact, ContactsPage, CustomFieldValue, FieldValue, Lead, LeadQuery, LeadRef,
    LegacyCustomField, LeadsPage, Tag,
};

use std::time::Duration;

/// Page size used for historical exports. AmoCRM caps the leads listing at
/// 250 entities per page.
pub const PAGE_LIMIT: u32 = 250;

/// CRM reads are slow on large accounts; a generous timeout keeps deep
/// pagination from flaking while still bounding every call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct AmoCrmClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl AmoCrmClient {
    pub fn new(domain: &str, token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AmoCrmError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: format!("https://{domain}.amocrm.ru/api/v4"),
            token,
        })
    }

    /// Fetch one page of closed leads matching the query. Returns an empty
    /// vec on AmoCRM's 204 No Content (past the last page).
    pub async fn list_leads(&self, query: &LeadQuery, page: u32, limit: u32) -> Result<Vec<Lead>> {
        let mut params: Vec<(String, String)> = vec![
            ("filter[pipeline_id]".into(), query.pipeline_id.to_string()),
            (
                "filter[statuses][0][pipeline_id]".into(),
                query.pipeline_id.to_string(),
            ),
            (
                "filter[statuses][0][status_id]".into(),
                query.status_id.to_string(),
            ),
            ("page".into(), page.to_string()),
            ("limit".into(), limit.to_string()),
        ];
        if let Some(from) = query.closed_from {
            params.push(("filter[closed_at][from]".into(), from.to_string()));
        }
        if let Some(to) = query.closed_to {
            params.push(("filter[closed_at][to]".into(), to.to_string()));
        }
        if query.with_contacts {
            params.push(("with".into(), "contacts".into()));
        }

        let page_data: Option<LeadsPage> = self.get("/leads", &params).await?;
        Ok(page_data.map(|p| p.embedded.leads).unwrap_or_default())
    }

    /// Fetch full lead records (with contacts) for a set of ids.
    pub async fn leads_by_ids(&self, ids: &[i64]) -> Result<Vec<Lead>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let params = vec![
            ("filter[id]".to_string(), joined),
            ("with".to_string(), "contacts".to_string()),
        ];
        let page: Option<LeadsPage> = self.get("/leads", &params).await?;
        Ok(page.map(|p| p.embedded.leads).unwrap_or_default())
    }

    /// Search contacts by free-text query (typically a normalized phone
    /// number), including their linked lead ids.
    pub async fn contacts_by_query(&self, query: &str) -> Result<Vec<Contact>> {
        let params = vec![
            ("query".to_string(), query.to_string()),
            ("with".to_string(), "leads".to_string()),
        ];
        let page: Option<ContactsPage> = self.get("/contacts", &params).await?;
        Ok(page.map(|p| p.embedded.contacts).unwrap_or_default())
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 204 {
            return Ok(None);
        }
        if status.as_u16() == 429 {
            return Err(AmoCrmError::RateLimited);
        }
        if status.as_u16() == 401 {
            return Err(AmoCrmError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AmoCrmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed = resp.json::<T>().await?;
        Ok(Some(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::types::*;
    use serde_json::json;

    #[test]
    fn lead_parses_v4_custom_fields() {
        let lead: Lead = serde_json::from_value(json!({
            "id": 555,
            "name": "Test deal",
            "price": 5000,
            "status_id": 142,
            "pipeline_id": 10350882,
            "custom_fields_values": [
                {"field_id": 434731, "field_name": "utm_source", "values": [{"value": "kenjifb"}]},
                {"field_id": 434729, "field_name": "utm_campaign", "values": [{"value": "express_promo"}]}
            ]
        }))
        .unwrap();

        let fields = lead.custom_fields_values.unwrap();
        assert_eq!(fields[0].field_id, Some(434731));
        assert_eq!(fields[0].first_value().as_deref(), Some("kenjifb"));
    }

    #[test]
    fn numeric_field_values_render_as_text() {
        let field: CustomFieldValue = serde_json::from_value(json!({
            "field_id": 1,
            "values": [{"value": 42}]
        }))
        .unwrap();
        assert_eq!(field.first_value().as_deref(), Some("42"));
    }

    #[test]
    fn legacy_custom_field_prefers_values_array() {
        let field: LegacyCustomField = serde_json::from_value(json!({
            "name": "UTM Source",
            "values": [{"value": "from_array"}],
            "value": "bare"
        }))
        .unwrap();
        assert_eq!(field.first_value().as_deref(), Some("from_array"));

        let bare: LegacyCustomField = serde_json::from_value(json!({
            "code": "utm_source",
            "value": "bare"
        }))
        .unwrap();
        assert_eq!(bare.first_value().as_deref(), Some("bare"));
    }

    #[test]
    fn contact_embeds_linked_leads() {
        let contact: Contact = serde_json::from_value(json!({
            "id": 9,
            "name": "Aruzhan",
            "_embedded": {"leads": [{"id": 100}, {"id": 200}]}
        }))
        .unwrap();
        let leads = contact.embedded.unwrap().leads;
        assert_eq!(leads.iter().map(|l| l.id).collect::<Vec<_>>(), vec![100, 200]);
    }
}
