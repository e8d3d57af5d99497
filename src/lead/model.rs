//! Lead record and response log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::SessionId;

/// A structured field of the lead that a menu option or extractor can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeadField {
    FullName,
    GivenName,
    Surname,
    Title,
    Industry,
    Subcategory,
    Phone,
    Email,
    PreferredDay,
    PreferredTime,
    DecisionPower,
    InterestLevel,
}

impl std::fmt::Display for LeadField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FullName => "fullName",
            Self::GivenName => "givenName",
            Self::Surname => "surname",
            Self::Title => "title",
            Self::Industry => "industry",
            Self::Subcategory => "subcategory",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::PreferredDay => "preferredDay",
            Self::PreferredTime => "preferredTime",
            Self::DecisionPower => "decisionPower",
            Self::InterestLevel => "interestLevel",
        };
        write!(f, "{s}")
    }
}

/// One accepted user turn: a button click or a typed line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub ts: DateTime<Utc>,
}

/// Everything learned about one visitor during one session.
///
/// Unknown fields stay as empty strings, matching the intake endpoint's
/// expectations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    #[serde(skip)]
    session_id: SessionId,
    pub full_name: String,
    pub given_name: String,
    pub surname: String,
    pub title: String,
    pub industry: String,
    pub subcategory: String,
    pub phone: String,
    pub email: String,
    pub preferred_day: String,
    pub preferred_time: String,
    pub decision_power: String,
    pub interest_level: String,
    /// Append-only; see [`LeadRecord::record_response`].
    responses: Vec<ResponseEntry>,
    sent: bool,
    last_sent_hash: Option<String>,
    last_sent_at: Option<DateTime<Utc>>,
}

impl LeadRecord {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            full_name: String::new(),
            given_name: String::new(),
            surname: String::new(),
            title: String::new(),
            industry: String::new(),
            subcategory: String::new(),
            phone: String::new(),
            email: String::new(),
            preferred_day: String::new(),
            preferred_time: String::new(),
            decision_power: String::new(),
            interest_level: String::new(),
            responses: Vec::new(),
            sent: false,
            last_sent_hash: None,
            last_sent_at: None,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn responses(&self) -> &[ResponseEntry] {
        &self.responses
    }

    pub fn sent(&self) -> bool {
        self.sent
    }

    pub fn last_sent_hash(&self) -> Option<&str> {
        self.last_sent_hash.as_deref()
    }

    pub fn last_sent_at(&self) -> Option<DateTime<Utc>> {
        self.last_sent_at
    }

    /// Append one user turn to the response log.
    pub fn record_response(&mut self, value: impl Into<String>, label: Option<String>) {
        self.responses.push(ResponseEntry {
            value: value.into(),
            label,
            ts: Utc::now(),
        });
    }

    /// Write a value into a structured field.
    pub fn set(&mut self, field: LeadField, value: impl Into<String>) {
        let value = value.into();
        let slot = match field {
            LeadField::FullName => &mut self.full_name,
            LeadField::GivenName => &mut self.given_name,
            LeadField::Surname => &mut self.surname,
            LeadField::Title => &mut self.title,
            LeadField::Industry => &mut self.industry,
            LeadField::Subcategory => &mut self.subcategory,
            LeadField::Phone => &mut self.phone,
            LeadField::Email => &mut self.email,
            LeadField::PreferredDay => &mut self.preferred_day,
            LeadField::PreferredTime => &mut self.preferred_time,
            LeadField::DecisionPower => &mut self.decision_power,
            LeadField::InterestLevel => &mut self.interest_level,
        };
        *slot = value;
    }

    pub fn get(&self, field: LeadField) -> &str {
        match field {
            LeadField::FullName => &self.full_name,
            LeadField::GivenName => &self.given_name,
            LeadField::Surname => &self.surname,
            LeadField::Title => &self.title,
            LeadField::Industry => &self.industry,
            LeadField::Subcategory => &self.subcategory,
            LeadField::Phone => &self.phone,
            LeadField::Email => &self.email,
            LeadField::PreferredDay => &self.preferred_day,
            LeadField::PreferredTime => &self.preferred_time,
            LeadField::DecisionPower => &self.decision_power,
            LeadField::InterestLevel => &self.interest_level,
        }
    }

    /// Record a successful delivery of the payload with the given hash.
    pub fn mark_sent(&mut self, hash: String, at: DateTime<Utc>) {
        self.sent = true;
        self.last_sent_hash = Some(hash);
        self.last_sent_at = Some(at);
    }

    /// Whether a payload with this hash was already delivered.
    pub fn already_delivered(&self, hash: &str) -> bool {
        self.sent && self.last_sent_hash.as_deref() == Some(hash)
    }

    /// Preferred day and time joined for display, empty when neither is known.
    pub fn schedule(&self) -> String {
        [self.preferred_day.as_str(), self.preferred_time.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead() -> LeadRecord {
        LeadRecord::new(SessionId::from_raw("sess_1_abc"))
    }

    #[test]
    fn new_lead_is_empty() {
        let lead = lead();
        assert!(lead.full_name.is_empty());
        assert!(lead.responses().is_empty());
        assert!(!lead.sent());
        assert!(lead.last_sent_hash().is_none());
        assert_eq!(lead.session_id().as_str(), "sess_1_abc");
    }

    #[test]
    fn responses_append_in_order() {
        let mut lead = lead();
        for i in 0..5 {
            lead.record_response(format!("v{i}"), None);
            assert_eq!(lead.responses().len(), i + 1);
        }
        let values: Vec<_> = lead.responses().iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, ["v0", "v1", "v2", "v3", "v4"]);
        assert!(lead.responses().windows(2).all(|w| w[0].ts <= w[1].ts));
    }

    #[test]
    fn set_and_get_every_field() {
        let fields = [
            LeadField::FullName,
            LeadField::GivenName,
            LeadField::Surname,
            LeadField::Title,
            LeadField::Industry,
            LeadField::Subcategory,
            LeadField::Phone,
            LeadField::Email,
            LeadField::PreferredDay,
            LeadField::PreferredTime,
            LeadField::DecisionPower,
            LeadField::InterestLevel,
        ];
        let mut lead = lead();
        for field in fields {
            lead.set(field, field.to_string());
        }
        for field in fields {
            assert_eq!(lead.get(field), field.to_string());
        }
    }

    #[test]
    fn already_delivered_requires_sent_and_matching_hash() {
        let mut lead = lead();
        assert!(!lead.already_delivered("h1"));
        lead.mark_sent("h1".into(), Utc::now());
        assert!(lead.already_delivered("h1"));
        assert!(!lead.already_delivered("h2"));
        assert!(lead.last_sent_at().is_some());
    }

    #[test]
    fn serializes_camel_case_without_session_id() {
        let mut lead = lead();
        lead.set(LeadField::PreferredDay, "viernes");
        lead.record_response("A", Some("Menú".into()));
        lead.record_response("hola", None);
        let json = serde_json::to_value(&lead).unwrap();
        assert_eq!(json["preferredDay"], "viernes");
        assert_eq!(json["sent"], false);
        assert!(json["lastSentHash"].is_null());
        assert!(json.get("sessionId").is_none());
        assert_eq!(json["responses"][0]["label"], "Menú");
        assert!(json["responses"][1].get("label").is_none());
    }

    #[test]
    fn schedule_joins_known_parts() {
        let mut lead = lead();
        assert_eq!(lead.schedule(), "");
        lead.set(LeadField::PreferredTime, "3pm");
        assert_eq!(lead.schedule(), "3pm");
        lead.set(LeadField::PreferredDay, "viernes");
        assert_eq!(lead.schedule(), "viernes 3pm");
    }
}
