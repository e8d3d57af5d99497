//! Free-text field extractors.
//!
//! Pure functions turning one line of visitor text into partial structured
//! fields. They never fail and never invent data: anything not clearly
//! present is left empty and the calling node decides whether to re-prompt.

pub mod contact;
pub mod name;

pub use contact::{ContactInfo, extract_contact, normalize_phone};
pub use name::{NameParts, canonical_honorific, extract_name};
