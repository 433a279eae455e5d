//! Name indexes: find KB candidates for a name string.
//!
//! Two strategies share one contract. [`ExactMatchIndex`] is a
//! case-insensitive hash lookup; [`NgramIndex`] is an IDF-weighted fuzzy
//! match that tolerates spelling variants and transliteration noise without
//! an edit-distance scan over the KB.

pub mod cache;
mod exact;
mod ngram;

pub use exact::ExactMatchIndex;
pub use ngram::NgramIndex;

use crate::entity::{Entity, EntityType};
use std::sync::Arc;

/// Default bound on candidates returned by a find.
pub const DEFAULT_LIMIT: usize = 25;

/// Find candidate entities for a name and type pair.
pub trait NameIndex {
    /// Find entities that possibly match this name and type.
    ///
    /// Deterministic for a fixed index build, bounded to at most `limit`
    /// results. An unknown name returns an empty list, never an error.
    fn find(&self, name: &str, entity_type: EntityType, limit: usize) -> Vec<Arc<Entity>>;
}
