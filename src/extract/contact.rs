//! Phone / email / preferred day and time extraction from one line.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+\-]+@[a-z0-9\-]+(?:\.[a-z0-9\-]+)*\.[a-z]{2,}").unwrap()
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\+?\(?\d[\d\s().\-]*\d").unwrap());

/// Clock times ("3pm", "10:30", "a las 5"). The digits land in `at` or `hour`.
static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:a\s+las?\s+)?(?P<at>\d{1,2}(?::\d{2})?\s*(?:am|pm|hrs|hr)\b|\d{1,2}:\d{2}\b)|\ba\s+las?\s+(?P<hour>\d{1,2})\b",
    )
    .unwrap()
});

/// Parts of the day ("por la mañana"). Consumed before weekdays so the
/// "mañana" in them is never read as tomorrow.
static DAYPART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(?:por|en|de)\s+)?la\s+(?:mañana|tarde|noche)\b").unwrap()
});

static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:lunes|martes|mi[eé]rcoles|jueves|viernes|s[aá]bado|domingo|hoy|pasado\s+mañana|mañana|fin\s+de\s+semana)\b",
    )
    .unwrap()
});

/// Labels and leading articles that carry no data ("mi correo es", "el").
/// Removed in place; they never split a value.
static FILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:mi\s+)?(?:correo(?:\s+electr[oó]nico)?|e-?mail|mail|tel[eé]fono|tel|cel(?:ular)?|whats?app|n[uú]mero|horario|d[ií]a|hora)\b(?:\s+es)?\s*:?|\b(?:el|los|las)\b",
    )
    .unwrap()
});

static SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)[,;\n/|]+|\by\b").unwrap());

const MIN_PHONE_DIGITS: usize = 7;
const LOCAL_NUMBER_DIGITS: usize = 10;

/// Contact fields recovered from one line. Anything not confidently present
/// stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub preferred_day: Option<String>,
    pub preferred_time: Option<String>,
}

impl ContactInfo {
    /// Whether at least one channel (phone or email) was found.
    pub fn is_reachable(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }
}

/// Pull email, phone, preferred day and time out of one free-text line.
///
/// Bare 10-digit numbers get `country_code` prepended. Never fails; fields
/// that cannot be found are left empty.
pub fn extract_contact(raw: &str, country_code: &str) -> ContactInfo {
    let mut rest = raw.to_string();
    let mut info = ContactInfo::default();

    if let Some(m) = EMAIL.find(&rest) {
        let range = m.range();
        info.email = Some(m.as_str().to_string());
        blank_out(&mut rest, range);
    }

    let time = TIME.captures(&rest).and_then(|caps| {
        let value = caps.name("at").or_else(|| caps.name("hour"))?;
        Some((collapse_spaces(value.as_str()), caps.get(0)?.range()))
    });
    if let Some((time, range)) = time {
        info.preferred_time = Some(time);
        blank_out(&mut rest, range);
    }

    if let Some(m) = DAYPART.find(&rest) {
        let range = m.range();
        if info.preferred_time.is_none() {
            info.preferred_time = Some(collapse_spaces(m.as_str()));
        }
        blank_out(&mut rest, range);
    }

    let phone = PHONE
        .find_iter(&rest)
        .find(|m| m.as_str().chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS)
        .map(|m| (normalize_phone(m.as_str(), country_code), m.range()));
    if let Some((phone, range)) = phone {
        info.phone = Some(phone);
        blank_out(&mut rest, range);
    }

    if let Some(m) = WEEKDAY.find(&rest) {
        let range = m.range();
        info.preferred_day = Some(collapse_spaces(m.as_str()));
        blank_out(&mut rest, range);
    }

    let stripped = FILLER.replace_all(&rest, " ");
    let mut leftovers = SEPARATOR
        .split(&stripped)
        .map(collapse_spaces)
        .filter(|t| t.chars().any(char::is_alphanumeric));

    if info.preferred_day.is_none() {
        info.preferred_day = leftovers.next();
    }
    if info.preferred_time.is_none() {
        info.preferred_time = leftovers.next();
    }

    info
}

/// Keep digits and a leading `+`; prefix bare local numbers with the
/// country code.
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if raw.trim_start().starts_with('+') {
        format!("+{digits}")
    } else if digits.len() == LOCAL_NUMBER_DIGITS {
        format!("{country_code}{digits}")
    } else {
        digits
    }
}

fn blank_out(text: &mut String, range: Range<usize>) {
    text.replace_range(range, ",");
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_line_in_any_order() {
        let info = extract_contact("correo@ejemplo.com, +52 771 123 4567, viernes, 3pm", "+52");
        assert_eq!(info.email.as_deref(), Some("correo@ejemplo.com"));
        assert_eq!(info.phone.as_deref(), Some("+527711234567"));
        assert_eq!(info.preferred_day.as_deref(), Some("viernes"));
        assert_eq!(info.preferred_time.as_deref(), Some("3pm"));

        let shuffled = extract_contact("3pm y viernes; 771-123-4567 correo@ejemplo.com", "+52");
        assert_eq!(shuffled, info);
    }

    #[test]
    fn bare_local_number_gets_country_code() {
        let info = extract_contact("7711234567", "+52");
        assert_eq!(info.phone.as_deref(), Some("+527711234567"));
        assert!(info.email.is_none());
        assert!(info.preferred_day.is_none());
        assert!(info.preferred_time.is_none());
        assert!(info.is_reachable());
    }

    #[test]
    fn phone_with_parentheses_and_dots() {
        let info = extract_contact("mi cel es (771) 123.45.67", "+52");
        assert_eq!(info.phone.as_deref(), Some("+527711234567"));
        assert!(info.preferred_day.is_none());
    }

    #[test]
    fn short_digit_runs_are_not_phones() {
        let info = extract_contact("ana@x.mx el martes a las 10:30", "+52");
        assert!(info.phone.is_none());
        assert_eq!(info.email.as_deref(), Some("ana@x.mx"));
        assert_eq!(info.preferred_day.as_deref(), Some("martes"));
        assert_eq!(info.preferred_time.as_deref(), Some("10:30"));
    }

    #[test]
    fn labels_are_not_mistaken_for_schedule() {
        let info = extract_contact("Mi correo es Ana.Perez@Empresa.com.mx", "+52");
        assert_eq!(info.email.as_deref(), Some("Ana.Perez@Empresa.com.mx"));
        assert!(info.preferred_day.is_none());
        assert!(info.preferred_time.is_none());
    }

    #[test]
    fn leftover_tokens_fill_slots_in_order() {
        let info = extract_contact("7711234567, la próxima semana, temprano", "+52");
        assert_eq!(info.preferred_day.as_deref(), Some("la próxima semana"));
        assert_eq!(info.preferred_time.as_deref(), Some("temprano"));
    }

    #[test]
    fn date_phrase_stays_in_one_slot() {
        let info = extract_contact("correo@ejemplo.com, 15 de mayo", "+52");
        assert_eq!(info.preferred_day.as_deref(), Some("15 de mayo"));
        assert!(info.preferred_time.is_none());
    }

    #[test]
    fn part_of_day_is_a_time_not_tomorrow() {
        let info = extract_contact("ana@x.mx, el 20 de junio por la mañana", "+52");
        assert_eq!(info.preferred_day.as_deref(), Some("20 de junio"));
        assert_eq!(info.preferred_time.as_deref(), Some("por la mañana"));

        let info = extract_contact("mañana por la tarde", "+52");
        assert_eq!(info.preferred_day.as_deref(), Some("mañana"));
        assert_eq!(info.preferred_time.as_deref(), Some("por la tarde"));
    }

    #[test]
    fn bare_hour_after_a_las_is_a_time() {
        let info = extract_contact("7711234567 el jueves a las 5", "+52");
        assert_eq!(info.preferred_day.as_deref(), Some("jueves"));
        assert_eq!(info.preferred_time.as_deref(), Some("5"));
    }

    #[test]
    fn international_number_keeps_plus() {
        assert_eq!(normalize_phone("+1 (415) 555-0100", "+52"), "+14155550100");
        assert_eq!(normalize_phone("0445511223344", "+52"), "0445511223344");
    }

    #[test]
    fn nothing_found_is_unreachable() {
        let info = extract_contact("no sé", "+52");
        assert!(!info.is_reachable());
    }

    #[test]
    fn degenerate_inputs_never_panic() {
        for raw in ["", " ", "🙂", "@@@", "+", "((()))", ",,,;;;", "ñandú@", "1234567890123456789012"] {
            let info = extract_contact(raw, "+52");
            if let Some(phone) = &info.phone {
                assert!(phone.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS);
            }
        }
    }
}
