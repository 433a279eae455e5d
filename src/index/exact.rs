//! Exact-match name index.

use super::{cache, NameIndex};
use crate::entity::{Entity, EntityType};
use crate::error::Result;
use crate::kb::MemoryKb;
use crate::strings;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Per-type case-insensitive map from name string to entity ids.
type ExactData = HashMap<EntityType, HashMap<String, Vec<String>>>;

/// In-memory exact-match index.
///
/// Build cost is O(total names); lookup is O(1) amortized. Entities
/// sharing one name are all returned, ordered by entity id.
pub struct ExactMatchIndex {
    kb: Arc<MemoryKb>,
    data: ExactData,
}

const CACHE_NAME: &str = "exact-match.index.cache.json";

impl ExactMatchIndex {
    /// Build the index from a KB, or load it from a valid cache in
    /// `cache_dir`. A freshly built index is persisted when a cache
    /// directory is given.
    pub fn new(kb: Arc<MemoryKb>, cache_dir: Option<&Path>) -> Result<Self> {
        let fingerprint = cache::kb_fingerprint(&kb);
        if let Some(dir) = cache_dir {
            if let Some(data) = cache::load::<ExactData>(&dir.join(CACHE_NAME), &fingerprint) {
                return Ok(Self { kb, data });
            }
        }
        let data = Self::build(&kb);
        if let Some(dir) = cache_dir {
            cache::store(&dir.join(CACHE_NAME), &fingerprint, &data)?;
        }
        Ok(Self { kb, data })
    }

    fn build(kb: &MemoryKb) -> ExactData {
        let mut data: ExactData = EntityType::ALL
            .iter()
            .map(|t| (*t, HashMap::new()))
            .collect();
        for entity in kb.iter() {
            let per_type = data.entry(entity.entity_type).or_default();
            for name in &entity.names {
                per_type
                    .entry(strings::fold_case(name))
                    .or_default()
                    .push(entity.id.clone());
            }
        }
        // sort for deterministic result order; an entity can reach the same
        // key through two names that fold together
        for per_type in data.values_mut() {
            for ids in per_type.values_mut() {
                ids.sort();
                ids.dedup();
            }
        }
        data
    }
}

impl NameIndex for ExactMatchIndex {
    fn find(&self, name: &str, entity_type: EntityType, limit: usize) -> Vec<Arc<Entity>> {
        let Some(ids) = self
            .data
            .get(&entity_type)
            .and_then(|per_type| per_type.get(&strings::fold_case(name)))
        else {
            return Vec::new();
        };
        let mut entities = self.kb.get_all(ids);
        entities.truncate(limit);
        entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DEFAULT_LIMIT;

    fn kb() -> Arc<MemoryKb> {
        let mut dupe = Entity::new("124", EntityType::Per, "John Smith", "APB", vec![]);
        dupe.add_name("Johnny Smith");
        Arc::new(MemoryKb::from_entities(vec![
            Entity::new("122", EntityType::Per, "John Smith", "APB", vec![]),
            dupe,
            Entity::new("125", EntityType::Per, "Jake Smith", "APB", vec![]),
            Entity::new("300", EntityType::Gpe, "Smith", "GEO", vec![]),
        ]))
    }

    #[test]
    fn finds_every_entity_bearing_the_name() {
        let index = ExactMatchIndex::new(kb(), None).unwrap();
        let found = index.find("john smith", EntityType::Per, DEFAULT_LIMIT);
        let mut ids: Vec<&str> = found.iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["122", "124"]);
    }

    #[test]
    fn alternate_names_are_indexed() {
        let index = ExactMatchIndex::new(kb(), None).unwrap();
        let found = index.find("JOHNNY SMITH", EntityType::Per, DEFAULT_LIMIT);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "124");
    }

    #[test]
    fn type_scoping() {
        let index = ExactMatchIndex::new(kb(), None).unwrap();
        assert_eq!(index.find("Smith", EntityType::Per, DEFAULT_LIMIT).len(), 0);
        assert_eq!(index.find("Smith", EntityType::Gpe, DEFAULT_LIMIT).len(), 1);
    }

    #[test]
    fn unknown_name_is_empty_not_error() {
        let index = ExactMatchIndex::new(kb(), None).unwrap();
        assert!(index.find("Nobody", EntityType::Per, DEFAULT_LIMIT).is_empty());
    }

    #[test]
    fn limit_is_respected() {
        let index = ExactMatchIndex::new(kb(), None).unwrap();
        assert_eq!(index.find("John Smith", EntityType::Per, 1).len(), 1);
    }

    #[test]
    fn cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let kb = kb();
        {
            let _ = ExactMatchIndex::new(kb.clone(), Some(dir.path())).unwrap();
        }
        assert!(dir.path().join(CACHE_NAME).exists());
        let reloaded = ExactMatchIndex::new(kb, Some(dir.path())).unwrap();
        assert_eq!(
            reloaded
                .find("John Smith", EntityType::Per, DEFAULT_LIMIT)
                .len(),
            2
        );
    }
}
