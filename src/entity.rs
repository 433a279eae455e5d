//! Knowledge base entity records.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Entity type classification.
///
/// The KB and mention tag set is closed: person, organization,
/// geo-political entity, and location. Parsing any other label is an
/// error so that bad ground truth cannot silently corrupt scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// Person name (PER)
    Per,
    /// Organization name (ORG)
    Org,
    /// Geo-political entity (GPE)
    Gpe,
    /// Location (LOC)
    Loc,
}

impl EntityType {
    /// All entity types, in canonical report order.
    pub const ALL: [EntityType; 4] = [
        EntityType::Per,
        EntityType::Org,
        EntityType::Gpe,
        EntityType::Loc,
    ];

    /// Convert to the standard label string.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            EntityType::Per => "PER",
            EntityType::Org => "ORG",
            EntityType::Gpe => "GPE",
            EntityType::Loc => "LOC",
        }
    }

    /// Parse from a label string (case insensitive).
    pub fn from_label(label: &str) -> Result<Self> {
        match label.to_uppercase().as_str() {
            "PER" => Ok(EntityType::Per),
            "ORG" => Ok(EntityType::Org),
            "GPE" => Ok(EntityType::Gpe),
            "LOC" => Ok(EntityType::Loc),
            other => Err(Error::UnknownEntityType(other.to_string())),
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// Type-specific structured context loaded with an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityContext {
    /// Gazetteer context for GPE and LOC entities.
    Geo {
        /// Latitude in decimal degrees
        latitude: Option<f64>,
        /// Longitude in decimal degrees
        longitude: Option<f64>,
        /// Two-letter country code
        country: Option<String>,
        /// Population count
        population: Option<u64>,
    },
    /// Context for PER entities.
    Per {
        /// Titles or positions held
        titles: Vec<String>,
        /// Associated organization
        org: Option<String>,
        /// Year of birth
        year_of_birth: Option<i32>,
    },
    /// Context for ORG entities.
    Org {
        /// Organization website
        website: Option<String>,
        /// Parent organization
        parent_org: Option<String>,
    },
}

/// A knowledge base record.
///
/// Created once at KB load time and immutable afterward; shared across
/// indexes and candidate lists as `Arc<Entity>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique entity id within one KB instance
    pub id: String,
    /// Entity type
    pub entity_type: EntityType,
    /// Canonical name
    pub name: String,
    /// All known names, always including the canonical name
    pub names: BTreeSet<String>,
    /// Provenance tag (gazetteer, curated list, augmented, ...)
    pub origin: String,
    /// External reference links (encyclopedia articles etc.)
    pub urls: Vec<String>,
    /// Optional structured context; shape depends on type
    pub context: Option<EntityContext>,
}

impl Entity {
    /// Create a new entity. The canonical name seeds the name set.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        entity_type: EntityType,
        name: impl Into<String>,
        origin: impl Into<String>,
        urls: Vec<String>,
    ) -> Self {
        let name = name.into();
        let mut names = BTreeSet::new();
        names.insert(name.clone());
        Self {
            id: id.into(),
            entity_type,
            name,
            names,
            origin: origin.into(),
            urls,
            context: None,
        }
    }

    /// Attach structured context.
    #[must_use]
    pub fn with_context(mut self, context: EntityContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Add an alternate name. Duplicates are ignored (set semantics).
    pub fn add_name(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_labels() {
        for t in EntityType::ALL {
            assert_eq!(EntityType::from_label(t.as_label()).unwrap(), t);
        }
        assert_eq!(EntityType::from_label("gpe").unwrap(), EntityType::Gpe);
        assert!(EntityType::from_label("DOG").is_err());
    }

    #[test]
    fn names_contain_canonical() {
        let e = Entity::new("1", EntityType::Per, "John Smith", "APB", vec![]);
        assert!(e.names.contains("John Smith"));
    }

    #[test]
    fn add_name_is_set() {
        let mut e = Entity::new("1", EntityType::Gpe, "Addis Ababa", "GEO", vec![]);
        e.add_name("Addis");
        e.add_name("Addis");
        assert_eq!(e.names.len(), 2);
    }
}
