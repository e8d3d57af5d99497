//! Dialog nodes: the steps of the sales script.

use serde::{Deserialize, Serialize};

use crate::lead::LeadField;

/// Identifier of a step in the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Greeting,
    TitleSelect,
    MainMenu,
    HowItWorks,
    CompanyInfo,
    WhyNow,
    Roi,
    Everything,
    Industry,
    OtherIndustry,
    Pitch,
    Authority,
    ContactCapture,
    LeadSubmit,
    DeliveryFailed,
    ShareWhatsapp,
    Farewell,
}

impl NodeId {
    pub const ALL: [NodeId; 17] = [
        Self::Greeting,
        Self::TitleSelect,
        Self::MainMenu,
        Self::HowItWorks,
        Self::CompanyInfo,
        Self::WhyNow,
        Self::Roi,
        Self::Everything,
        Self::Industry,
        Self::OtherIndustry,
        Self::Pitch,
        Self::Authority,
        Self::ContactCapture,
        Self::LeadSubmit,
        Self::DeliveryFailed,
        Self::ShareWhatsapp,
        Self::Farewell,
    ];
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Greeting => "greeting",
            Self::TitleSelect => "title_select",
            Self::MainMenu => "main_menu",
            Self::HowItWorks => "how_it_works",
            Self::CompanyInfo => "company_info",
            Self::WhyNow => "why_now",
            Self::Roi => "roi",
            Self::Everything => "everything",
            Self::Industry => "industry",
            Self::OtherIndustry => "other_industry",
            Self::Pitch => "pitch",
            Self::Authority => "authority",
            Self::ContactCapture => "contact_capture",
            Self::LeadSubmit => "lead_submit",
            Self::DeliveryFailed => "delivery_failed",
            Self::ShareWhatsapp => "share_whatsapp",
            Self::Farewell => "farewell",
        };
        write!(f, "{s}")
    }
}

/// A button on a menu node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogOption {
    pub label: String,
    pub value: String,
    pub next: NodeId,
    /// Lead field the chosen value is written to.
    pub sets: Option<LeadField>,
}

impl DialogOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>, next: NodeId) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            next,
            sets: None,
        }
    }

    pub fn sets(mut self, field: LeadField) -> Self {
        self.sets = Some(field);
        self
    }
}

/// How a free-text answer is turned into lead fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Greeting line → full/given/surname plus a candidate title.
    Name,
    /// Contact line → phone, email, preferred day and time.
    Contact,
    /// The trimmed text is stored as-is.
    Verbatim(LeadField),
}

/// What a node does once its prompt is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Menu {
        options: Vec<DialogOption>,
    },
    FreeText {
        extractor: ExtractorKind,
        next: NodeId,
    },
    /// Narrate each step's prompt back-to-back (their options suppressed),
    /// then enter `then` normally.
    Sequence {
        steps: Vec<NodeId>,
        then: NodeId,
    },
    /// Send the lead and branch on the outcome.
    Deliver {
        on_success: NodeId,
        on_failure: NodeId,
    },
    /// The conversation is over.
    End,
}

/// One step of the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogNode {
    pub id: NodeId,
    /// Template; see [`crate::flow::template`] for placeholders.
    pub prompt: String,
    pub kind: NodeKind,
}

impl DialogNode {
    pub fn menu(id: NodeId, prompt: impl Into<String>, options: Vec<DialogOption>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            kind: NodeKind::Menu { options },
        }
    }

    pub fn free_text(
        id: NodeId,
        prompt: impl Into<String>,
        extractor: ExtractorKind,
        next: NodeId,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            kind: NodeKind::FreeText { extractor, next },
        }
    }

    pub fn sequence(id: NodeId, prompt: impl Into<String>, steps: Vec<NodeId>, then: NodeId) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            kind: NodeKind::Sequence { steps, then },
        }
    }

    pub fn deliver(
        id: NodeId,
        prompt: impl Into<String>,
        on_success: NodeId,
        on_failure: NodeId,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            kind: NodeKind::Deliver {
                on_success,
                on_failure,
            },
        }
    }

    pub fn end(id: NodeId, prompt: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            kind: NodeKind::End,
        }
    }

    pub fn expects_free_text(&self) -> bool {
        matches!(self.kind, NodeKind::FreeText { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::End)
    }

    /// Find a menu option by value.
    pub fn option(&self, value: &str) -> Option<&DialogOption> {
        match &self.kind {
            NodeKind::Menu { options } => options.iter().find(|o| o.value == value),
            _ => None,
        }
    }

    /// Every node this one can lead to. Sequence steps are narrated rather
    /// than entered, but they still must exist.
    pub fn targets(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Menu { options } => options.iter().map(|o| o.next).collect(),
            NodeKind::FreeText { next, .. } => vec![*next],
            NodeKind::Sequence { steps, then } => {
                let mut targets = steps.clone();
                targets.push(*then);
                targets
            }
            NodeKind::Deliver {
                on_success,
                on_failure,
            } => vec![*on_success, *on_failure],
            NodeKind::End => Vec::new(),
        }
    }
}
