//! Prompt interpolation.
//!
//! Placeholders: `{title}`, `{surname}`, `{givenName}`, `{industryPitch}`,
//! `{fallbackPhone}`. Unknown placeholders are left untouched. Missing
//! values collapse cleanly ("Perfecto {title} {surname}," with neither known
//! renders as "Perfecto,").

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::lead::LeadRecord;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([A-Za-z]+)\}").unwrap());
static REPEATED_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([,.!?;:])").unwrap());

/// Title value that means "no title".
const NO_TITLE: &str = "Otro";

/// Values available to a prompt template.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub lead: &'a LeadRecord,
    pub industry_pitch: Option<&'a str>,
    pub fallback_phone: &'a str,
}

/// Whether a template needs the industry pitch resolved.
pub fn needs_pitch(template: &str) -> bool {
    template.contains("{industryPitch}")
}

pub fn render(template: &str, ctx: &PromptContext<'_>) -> String {
    let filled = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| match &caps[1] {
        "title" if ctx.lead.title == NO_TITLE => String::new(),
        "title" => ctx.lead.title.clone(),
        "surname" => ctx.lead.surname.clone(),
        "givenName" => ctx.lead.given_name.clone(),
        "industryPitch" => ctx.industry_pitch.unwrap_or_default().to_string(),
        "fallbackPhone" => ctx.fallback_phone.to_string(),
        _ => caps[0].to_string(),
    });
    let collapsed = REPEATED_SPACES.replace_all(&filled, " ");
    let tidied = SPACE_BEFORE_PUNCT.replace_all(&collapsed, "$1");
    tidied.trim().to_string()
}
