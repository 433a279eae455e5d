//! Approximate n-gram name index.

use super::{cache, NameIndex};
use crate::entity::{Entity, EntityType};
use crate::error::Result;
use crate::kb::MemoryKb;
use crate::strings;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Default n-gram width.
pub const DEFAULT_NGRAM_SIZE: usize = 4;

/// One indexed name instance: entity id plus name ordinal within the entity.
type NameId = (String, u32);

#[derive(Serialize, Deserialize)]
struct NgramData {
    num_unique_names: usize,
    index: HashMap<EntityType, HashMap<String, Vec<NameId>>>,
}

/// In-memory n-gram index with IDF-weighted retrieval.
///
/// Names are lower-cased, punctuation is folded to the token join
/// character, and the result is padded with a boundary marker before
/// n-gram extraction. At query time every name instance sharing an
/// n-gram with the query accumulates `ln(1 + U/f)` per shared n-gram,
/// where `U` is the number of distinct names in the KB and `f` is the
/// number of name instances containing that n-gram. Candidates at or
/// below half the maximum observed mass are discarded; the relative
/// threshold adapts to query length and match quality.
pub struct NgramIndex {
    kb: Arc<MemoryKb>,
    ngram_size: usize,
    data: NgramData,
}

const CACHE_NAME: &str = "ngram.index.cache.json";

impl NgramIndex {
    /// Build an index with the default n-gram width.
    pub fn new(kb: Arc<MemoryKb>, cache_dir: Option<&Path>) -> Result<Self> {
        Self::with_ngram_size(kb, DEFAULT_NGRAM_SIZE, cache_dir)
    }

    /// Build the index from a KB, or load it from a valid cache in
    /// `cache_dir`. A freshly built index is persisted when a cache
    /// directory is given.
    pub fn with_ngram_size(
        kb: Arc<MemoryKb>,
        ngram_size: usize,
        cache_dir: Option<&Path>,
    ) -> Result<Self> {
        let fingerprint = format!("{}:n{}", cache::kb_fingerprint(&kb), ngram_size);
        if let Some(dir) = cache_dir {
            if let Some(data) = cache::load::<NgramData>(&dir.join(CACHE_NAME), &fingerprint) {
                return Ok(Self { kb, ngram_size, data });
            }
        }
        let data = Self::build(&kb, ngram_size);
        if let Some(dir) = cache_dir {
            cache::store(&dir.join(CACHE_NAME), &fingerprint, &data)?;
        }
        Ok(Self { kb, ngram_size, data })
    }

    fn build(kb: &MemoryKb, ngram_size: usize) -> NgramData {
        let mut index: HashMap<EntityType, HashMap<String, Vec<NameId>>> = EntityType::ALL
            .iter()
            .map(|t| (*t, HashMap::new()))
            .collect();
        let mut all_names: HashSet<String> = HashSet::new();
        for entity in kb.iter() {
            let per_type = index.entry(entity.entity_type).or_default();
            for (ordinal, name) in entity.names.iter().enumerate() {
                all_names.insert(strings::fold_case(name));
                let formatted = format_name(name);
                for ngram in strings::ngrams(&formatted, ngram_size) {
                    per_type
                        .entry(ngram)
                        .or_default()
                        .push((entity.id.clone(), ordinal as u32));
                }
            }
        }
        NgramData {
            num_unique_names: all_names.len(),
            index,
        }
    }
}

/// Canonical form fed to n-gram extraction: punctuation folded,
/// lower-cased, tokens joined and padded with the boundary marker.
fn format_name(name: &str) -> String {
    let folded = strings::replace_punct(name).to_lowercase();
    let joined: Vec<&str> = folded.split_whitespace().collect();
    format!("_{}_", joined.join("_"))
}

impl NameIndex for NgramIndex {
    fn find(&self, name: &str, entity_type: EntityType, limit: usize) -> Vec<Arc<Entity>> {
        let Some(per_type) = self.data.index.get(&entity_type) else {
            return Vec::new();
        };
        let query_ngrams = strings::ngrams(&format_name(name), self.ngram_size);

        // accumulate IDF mass per name instance
        let mut mass: HashMap<&NameId, f64> = HashMap::new();
        for ngram in &query_ngrams {
            let Some(name_ids) = per_type.get(ngram) else {
                continue;
            };
            if name_ids.is_empty() {
                continue;
            }
            let idf = (self.data.num_unique_names as f64 / name_ids.len() as f64).ln_1p();
            for name_id in name_ids {
                *mass.entry(name_id).or_insert(0.0) += idf;
            }
        }
        if mass.is_empty() {
            return Vec::new();
        }

        // prune everything at or below half of the best mass
        let max_mass = mass.values().cloned().fold(f64::MIN, f64::max);
        let threshold = max_mass / 2.0;
        let mut top: Vec<(&NameId, f64)> =
            mass.into_iter().filter(|(_, m)| *m > threshold).collect();
        // descending mass, entity id then ordinal as the deterministic tie-break
        top.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        let mut seen: HashSet<&str> = HashSet::new();
        let mut entities = Vec::new();
        for ((entity_id, _), _) in top {
            if entities.len() >= limit {
                break;
            }
            if !seen.insert(entity_id) {
                continue;
            }
            if let Some(entity) = self.kb.get(entity_id) {
                entities.push(entity);
            }
        }
        entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DEFAULT_LIMIT;
    use proptest::prelude::*;

    fn kb() -> Arc<MemoryKb> {
        Arc::new(MemoryKb::from_entities(vec![
            Entity::new("1", EntityType::Gpe, "Springfield", "GEO", vec![]),
            Entity::new("2", EntityType::Gpe, "Spring Valley", "GEO", vec![]),
            Entity::new("3", EntityType::Gpe, "Shelbyville", "GEO", vec![]),
            Entity::new("4", EntityType::Per, "John Smith", "APB", vec![]),
        ]))
    }

    #[test]
    fn self_retrieval() {
        let index = NgramIndex::new(kb(), None).unwrap();
        let found = index.find("Springfield", EntityType::Gpe, DEFAULT_LIMIT);
        assert!(found.iter().any(|e| e.id == "1"));
        // the best-scoring candidate is the exact name
        assert_eq!(found[0].id, "1");
    }

    #[test]
    fn tolerates_spelling_variants() {
        let index = NgramIndex::new(kb(), None).unwrap();
        let found = index.find("Springfeld", EntityType::Gpe, DEFAULT_LIMIT);
        assert!(found.iter().any(|e| e.id == "1"));
    }

    #[test]
    fn type_scoping() {
        let index = NgramIndex::new(kb(), None).unwrap();
        assert!(index
            .find("John Smith", EntityType::Gpe, DEFAULT_LIMIT)
            .iter()
            .all(|e| e.id != "4"));
    }

    #[test]
    fn unrelated_query_is_empty() {
        let index = NgramIndex::new(kb(), None).unwrap();
        assert!(index.find("zzzzqqqq", EntityType::Gpe, DEFAULT_LIMIT).is_empty());
    }

    #[test]
    fn limit_bounds_results() {
        let index = NgramIndex::new(kb(), None).unwrap();
        assert!(index.find("Spring", EntityType::Gpe, 1).len() <= 1);
    }

    #[test]
    fn results_are_deduplicated_by_entity() {
        let mut e = Entity::new("9", EntityType::Gpe, "Blue River", "GEO", vec![]);
        e.add_name("Blue River Valley");
        let kb = Arc::new(MemoryKb::from_entities(vec![e]));
        let index = NgramIndex::new(kb, None).unwrap();
        let found = index.find("Blue River", EntityType::Gpe, DEFAULT_LIMIT);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn cache_roundtrip_and_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _ = NgramIndex::new(kb(), Some(dir.path())).unwrap();
        }
        let reloaded = NgramIndex::new(kb(), Some(dir.path())).unwrap();
        assert!(!reloaded
            .find("Springfield", EntityType::Gpe, DEFAULT_LIMIT)
            .is_empty());
        // a different KB snapshot invalidates the cache instead of serving it
        let other = Arc::new(MemoryKb::from_entities(vec![Entity::new(
            "9",
            EntityType::Gpe,
            "Ogdenville",
            "GEO",
            vec![],
        )]));
        let rebuilt = NgramIndex::new(other, Some(dir.path())).unwrap();
        assert!(rebuilt
            .find("Ogdenville", EntityType::Gpe, DEFAULT_LIMIT)
            .iter()
            .any(|e| e.id == "9"));
    }

    proptest! {
        // self-retrieval holds for any ASCII name at least as long as the
        // n-gram width
        #[test]
        fn self_retrieval_property(name in "[a-z]{4,12}( [a-z]{4,12})?") {
            let kb = Arc::new(MemoryKb::from_entities(vec![
                Entity::new("t1", EntityType::Loc, name.clone(), "GEO", vec![]),
            ]));
            let index = NgramIndex::new(kb, None).unwrap();
            let found = index.find(&name, EntityType::Loc, DEFAULT_LIMIT);
            prop_assert!(found.iter().any(|e| e.id == "t1"));
        }
    }
}
