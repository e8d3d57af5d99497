//! Lead accumulation: the structured record, its response log, and the
//! session identity it is keyed by.

pub mod identity;
pub mod model;

pub use identity::{JsonFileStore, MemoryStore, SESSION_KEY, SessionId, SessionStore};
pub use model::{LeadField, LeadRecord, ResponseEntry};
