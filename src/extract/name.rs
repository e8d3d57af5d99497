//! Name and honorific extraction from a greeting line.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Greetings that commonly open the first message.
static GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:hola|holi|buen[oa]s?\s+(?:d[ií]as|tardes|noches)|buen\s+d[ií]a|buenas|qu[eé]\s+tal|saludos|hi|hello|hey)(?:\s+(?:cordiales|cordialmente|a\s+tod[oa]s|a\s+usted(?:es)?|a\s+todo\s+el\s+equipo))?\b[\s,.!¡?¿:;\-]*",
    )
    .unwrap()
});

/// Self-introductions, optionally followed by an article ("soy la ...").
static INTRODUCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:soy|me\s+llamo|mi\s+nombre\s+es|habla|le\s+saluda|te\s+saluda|con)\b[\s,:]*(?:(?:el|la)\s+)?",
    )
    .unwrap()
});

/// Articles that may sit in front of an honorific ("la Dra. Ana").
const ARTICLES: &[&str] = &["el", "la"];

/// Connectors that belong to a compound surname ("de la Cruz").
const SURNAME_CONNECTORS: &[&str] = &["de", "del", "la", "las", "los", "y"];

/// Name fields recovered from one line of free text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameParts {
    pub full_name: String,
    pub given_name: String,
    pub surname: String,
    /// Honorific found in the text. Only a suggestion: the flow still asks
    /// the visitor to pick a title.
    pub candidate_title: Option<String>,
}

impl NameParts {
    /// Whether any name token was recovered.
    pub fn has_name(&self) -> bool {
        !self.given_name.is_empty()
    }
}

/// Canonical form of a leading honorific, if `token` is one.
pub fn canonical_honorific(token: &str) -> Option<&'static str> {
    let key = token
        .trim_end_matches([',', ':'])
        .trim_end_matches('.')
        .to_lowercase();
    let canonical = match key.as_str() {
        "dr" | "doctor" => "Dr.",
        "dra" | "doctora" => "Dra.",
        "lic" | "licenciado" | "licenciada" => "Lic.",
        "ing" | "ingeniero" | "ingeniera" => "Ing.",
        "arq" | "arquitecto" | "arquitecta" => "Arq.",
        "c.p" | "cp" => "C.P.",
        "mtro" | "maestro" => "Mtro.",
        "mtra" | "maestra" => "Mtra.",
        "sr" | "señor" => "Sr.",
        "sra" | "señora" => "Sra.",
        "don" => "Sr.",
        "doña" => "Sra.",
        "prof" | "profe" | "profesor" | "profesora" => "Prof.",
        "coach" => "Coach",
        "chef" => "Chef",
        _ => return None,
    };
    Some(canonical)
}

/// Split a greeting/name line into given name, surname, and a candidate
/// honorific. Never fails; unrecoverable input yields empty name fields with
/// the trimmed original kept as `full_name`.
pub fn extract_name(raw: &str) -> NameParts {
    let original = raw.trim();
    let mut rest = strip_introductions(original);

    // Anything after a clause break is chatter, not name.
    if let Some(cut) = rest.find([',', ';', '!', '?', '\n']) {
        rest = &rest[..cut];
    }

    let mut words: Vec<&str> = rest.split_whitespace().collect();

    if let [article, next, ..] = words.as_slice() {
        if ARTICLES.contains(&article.to_lowercase().as_str())
            && canonical_honorific(next).is_some()
        {
            words.remove(0);
        }
    }

    let mut candidate_title = None;
    if let Some(first) = words.first() {
        if let Some(title) = canonical_honorific(first) {
            candidate_title = Some(title.to_string());
            words.remove(0);
        }
    }

    let tokens: Vec<&str> = words
        .into_iter()
        .map(|w| w.trim_matches(|c: char| !(c.is_alphabetic() || c == '-' || c == '\'')))
        .filter(|w| w.chars().any(char::is_alphabetic))
        .collect();

    let (given_name, surname) = split_given_and_surname(&tokens);

    let full_name = if tokens.is_empty() {
        original.to_string()
    } else {
        tokens.join(" ")
    };

    NameParts {
        full_name,
        given_name,
        surname,
        candidate_title,
    }
}

fn strip_introductions(text: &str) -> &str {
    let mut rest = text.trim_start_matches(|c: char| !c.is_alphanumeric());
    loop {
        let before = rest.len();
        for pattern in [&*GREETING, &*INTRODUCTION] {
            if let Some(m) = pattern.find(rest) {
                rest = &rest[m.end()..];
            }
        }
        rest = rest.trim_start_matches(|c: char| !c.is_alphanumeric());
        if rest.len() == before {
            return rest;
        }
    }
}

fn split_given_and_surname(tokens: &[&str]) -> (String, String) {
    match tokens {
        [] => (String::new(), String::new()),
        [only] => (only.to_string(), only.to_string()),
        _ => {
            let mut start = tokens.len() - 1;
            while start > 1 && SURNAME_CONNECTORS.contains(&tokens[start - 1].to_lowercase().as_str())
            {
                start -= 1;
            }
            (tokens[..start].join(" "), tokens[start..].join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_article_and_honorific_are_stripped() {
        let parts = extract_name("Hola, soy la Dra. Ana Pérez");
        assert_eq!(parts.given_name, "Ana");
        assert_eq!(parts.surname, "Pérez");
        assert_eq!(parts.full_name, "Ana Pérez");
        assert_eq!(parts.candidate_title.as_deref(), Some("Dra."));
    }

    #[test]
    fn stacked_greetings_are_stripped() {
        let parts = extract_name("¡Hola! Buenas tardes, me llamo Luis Hernández");
        assert_eq!(parts.given_name, "Luis");
        assert_eq!(parts.surname, "Hernández");
        assert!(parts.candidate_title.is_none());
    }

    #[test]
    fn compound_surname_keeps_connectors() {
        let parts = extract_name("mi nombre es María José de la Cruz");
        assert_eq!(parts.given_name, "María José");
        assert_eq!(parts.surname, "de la Cruz");
    }

    #[test]
    fn single_token_is_both_given_and_surname() {
        let parts = extract_name("Soy Ana");
        assert_eq!(parts.given_name, "Ana");
        assert_eq!(parts.surname, "Ana");
    }

    #[test]
    fn honorific_without_dot_and_case_insensitive() {
        let parts = extract_name("ING juan lópez");
        assert_eq!(parts.candidate_title.as_deref(), Some("Ing."));
        assert_eq!(parts.given_name, "juan");
        assert_eq!(parts.surname, "lópez");

        let parts = extract_name("Doña Carmen Ruiz");
        assert_eq!(parts.candidate_title.as_deref(), Some("Sra."));
        assert_eq!(parts.given_name, "Carmen");
    }

    #[test]
    fn greeting_tail_is_not_a_name() {
        let parts = extract_name("Saludos cordiales, Juan Pérez");
        assert_eq!(parts.given_name, "Juan");
        assert_eq!(parts.surname, "Pérez");

        let parts = extract_name("Hola a todos, soy Marta Ríos");
        assert_eq!(parts.given_name, "Marta");
        assert_eq!(parts.surname, "Ríos");
    }

    #[test]
    fn article_before_honorific_without_introduction() {
        let parts = extract_name("Hola, la Dra. Ana Pérez");
        assert_eq!(parts.candidate_title.as_deref(), Some("Dra."));
        assert_eq!(parts.given_name, "Ana");
        assert_eq!(parts.surname, "Pérez");

        // A bare article with no honorific after it is left alone.
        let parts = extract_name("La Torre");
        assert!(parts.candidate_title.is_none());
        assert_eq!(parts.full_name, "La Torre");
    }

    #[test]
    fn trailing_chatter_is_ignored() {
        let parts = extract_name("Pedro Gómez, mucho gusto!");
        assert_eq!(parts.given_name, "Pedro");
        assert_eq!(parts.surname, "Gómez");
    }

    #[test]
    fn greeting_only_yields_no_name() {
        let parts = extract_name("Hola");
        assert!(!parts.has_name());
        assert!(parts.surname.is_empty());
        assert_eq!(parts.full_name, "Hola");
    }

    #[test]
    fn honorific_only_keeps_title_but_no_name() {
        let parts = extract_name("Chef");
        assert_eq!(parts.candidate_title.as_deref(), Some("Chef"));
        assert!(!parts.has_name());
    }

    #[test]
    fn degenerate_inputs_never_panic() {
        for raw in ["", "   ", "🙂🙂", "?!.,;", "¡¡¡", "\n\n", "ñ", "--", "soy", "la"] {
            let parts = extract_name(raw);
            assert!(parts.given_name.is_empty() || parts.has_name());
            if parts.given_name.is_empty() {
                assert!(parts.surname.is_empty(), "surname invented for {raw:?}");
                assert_eq!(parts.full_name, raw.trim());
            }
        }
    }

    #[test]
    fn canonical_honorific_table() {
        assert_eq!(canonical_honorific("C.P."), Some("C.P."));
        assert_eq!(canonical_honorific("mtra."), Some("Mtra."));
        assert_eq!(canonical_honorific("Profesora"), Some("Prof."));
        assert_eq!(canonical_honorific("Don"), Some("Sr."));
        assert_eq!(canonical_honorific("Ana"), None);
    }
}
