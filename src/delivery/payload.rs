//! The JSON body posted to the intake webhook.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::config::BotConfig;
use crate::lead::LeadRecord;

/// Lead fields that change on every delivery and must not affect the hash.
const VOLATILE_LEAD_KEYS: [&str; 3] = ["sent", "lastSentHash", "lastSentAt"];

/// Outbound webhook body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub lead: LeadRecord,
    pub extra: Map<String, Value>,
}

impl WebhookPayload {
    /// Snapshot the lead together with the forwarding metadata the intake
    /// flow expects.
    pub fn build(lead: &LeadRecord, config: &BotConfig) -> Self {
        let mut extra = Map::new();
        extra.insert(
            "emailCopyTo".into(),
            config
                .email_copy_to
                .as_ref()
                .map_or(Value::Null, |to| Value::String(to.clone())),
        );
        extra.insert("formsOfPayment".into(), json!(config.forms_of_payment));
        extra.insert(
            "wantsPresentation".into(),
            Value::Bool(lead.interest_level == "yes"),
        );
        extra.insert("schedule".into(), Value::String(lead.schedule()));
        extra.insert("emailCaptured".into(), Value::Bool(!lead.email.is_empty()));

        Self {
            session_id: lead.session_id().to_string(),
            timestamp: Utc::now(),
            lead: lead.clone(),
            extra,
        }
    }

    /// Stable hash of the payload's content.
    ///
    /// Covers the session id, every lead field, the response log and the
    /// extra map. The timestamp and delivery bookkeeping are left out, so two
    /// snapshots of an unchanged lead hash the same.
    pub fn content_hash(&self) -> Result<String, serde_json::Error> {
        let mut lead = serde_json::to_value(&self.lead)?;
        if let Value::Object(fields) = &mut lead {
            for key in VOLATILE_LEAD_KEYS {
                fields.remove(key);
            }
        }
        let canonical = json!({
            "sessionId": self.session_id,
            "lead": lead,
            "extra": self.extra,
        });

        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&canonical)?);
        Ok(format!("{:x}", hasher.finalize()))
    }
}
