//! Domain model for family welfare records, accounts, sessions and
//! attachments.
//!
//! # Responsibility
//! - Define canonical persisted shapes (camelCase JSON) shared by every
//!   storage backend.
//! - Own field-level validation rules used before any write.
//!
//! # Invariants
//! - Every persisted family and user carries a unique string `id`.
//! - Drafts never carry an id; ids are assigned by the repository.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod attachment;
pub mod family;
pub mod session;
pub mod user;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// A record type that can be stored through a `Repository`.
///
/// The associated constants fix where the record lives in each backend, so a
/// repository implementation needs no per-entity branching.
pub trait Entity: Clone + Serialize + DeserializeOwned {
    /// Creation input without id or audit timestamps.
    type Draft;
    /// Partial update merged into an existing record.
    type Patch;

    /// Short name used in log events.
    const KIND: &'static str;
    /// Key holding the JSON array in the local key-value store.
    const LOCAL_KEY: &'static str;
    /// Collection name in the hosted document store.
    const COLLECTION: &'static str;
    /// Prefix of locally generated identifiers.
    const ID_PREFIX: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn created_at(&self) -> i64;
    /// Builds a stored record from a draft, stamping creation audit fields.
    fn from_draft(id: String, draft: Self::Draft, now_ms: i64) -> Self;
    /// Merges `patch` into this record and bumps the update timestamp.
    fn apply_patch(&mut self, patch: &Self::Patch, now_ms: i64);
    /// Case-insensitive substring match; `needle` is already lowercased.
    fn matches(&self, needle: &str) -> bool;
}

/// Returns whether `value` looks like `local@domain.tld`.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
