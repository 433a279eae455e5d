//! Candidate generation: propose KB entities for each mention chain.

mod scorer;

pub use scorer::{CandidatesReport, CandidatesScorer};

use crate::document::{Document, MentionChain};
use crate::entity::{Entity, EntityType};
use crate::index::{NameIndex, DEFAULT_LIMIT};
use crate::strings;
use std::collections::HashMap;
use std::sync::Arc;

/// Finds reasonable KB candidates for mention chains.
pub trait CandidateGenerator {
    /// Find candidates for a mention chain.
    fn find(&mut self, chain: &MentionChain) -> Vec<Arc<Entity>>;

    /// Attach candidates to every chain of a document.
    fn process(&mut self, document: &mut Document) {
        let mut results = Vec::with_capacity(document.mention_chains.len());
        for chain in &document.mention_chains {
            results.push(self.find(chain));
        }
        for (chain, candidates) in document.mention_chains.iter_mut().zip(results) {
            chain.candidates = candidates;
        }
    }
}

/// Queries a name index with the chain's best name.
pub struct IndexBasedGenerator {
    index: Box<dyn NameIndex>,
    limit: usize,
}

impl IndexBasedGenerator {
    /// Create a generator with the default candidate limit.
    #[must_use]
    pub fn new(index: Box<dyn NameIndex>) -> Self {
        Self::with_limit(index, DEFAULT_LIMIT)
    }

    /// Create a generator with a custom candidate limit.
    #[must_use]
    pub fn with_limit(index: Box<dyn NameIndex>, limit: usize) -> Self {
        Self { index, limit }
    }
}

impl CandidateGenerator for IndexBasedGenerator {
    fn find(&mut self, chain: &MentionChain) -> Vec<Arc<Entity>> {
        let candidates = self.index.find(chain.name(), chain.entity_type(), self.limit);
        log::debug!(
            "{}({}): {} candidates from index",
            chain.name(),
            chain.entity_type(),
            candidates.len()
        );
        candidates
    }
}

/// Queries a name index with the chain's transliterated name.
///
/// Chains without a transliteration yield no candidates.
pub struct TranslitIndexBasedGenerator {
    index: Box<dyn NameIndex>,
    limit: usize,
}

impl TranslitIndexBasedGenerator {
    /// Create a generator with the default candidate limit.
    #[must_use]
    pub fn new(index: Box<dyn NameIndex>) -> Self {
        Self {
            index,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl CandidateGenerator for TranslitIndexBasedGenerator {
    fn find(&mut self, chain: &MentionChain) -> Vec<Arc<Entity>> {
        match chain.translit_name() {
            Some(name) => self.index.find(name, chain.entity_type(), self.limit),
            None => Vec::new(),
        }
    }
}

/// Runs all child generators and unions their candidates.
///
/// De-duplicates by entity id; a later generator's entity wins on an id
/// collision. Order matters only for that tie-break.
pub struct CombiningGenerator {
    generators: Vec<Box<dyn CandidateGenerator>>,
}

impl CombiningGenerator {
    /// Create a combining generator.
    #[must_use]
    pub fn new(generators: Vec<Box<dyn CandidateGenerator>>) -> Self {
        Self { generators }
    }
}

impl CombiningGenerator {
    fn union(
        generators: &mut [Box<dyn CandidateGenerator>],
        chain: &MentionChain,
        stop_at: Option<usize>,
    ) -> Vec<Arc<Entity>> {
        // insertion-ordered union so earlier generators rank first
        let mut order: Vec<String> = Vec::new();
        let mut by_id: HashMap<String, Arc<Entity>> = HashMap::new();
        for generator in generators {
            for entity in generator.find(chain) {
                if !by_id.contains_key(&entity.id) {
                    order.push(entity.id.clone());
                }
                by_id.insert(entity.id.clone(), entity);
            }
            if let Some(threshold) = stop_at {
                if by_id.len() >= threshold {
                    break;
                }
            }
        }
        order
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect()
    }
}

impl CandidateGenerator for CombiningGenerator {
    fn find(&mut self, chain: &MentionChain) -> Vec<Arc<Entity>> {
        let candidates = Self::union(&mut self.generators, chain, None);
        log::debug!(
            "{}({}): {} total candidates",
            chain.name(),
            chain.entity_type(),
            candidates.len()
        );
        candidates
    }
}

/// Runs child generators in order until enough candidates accumulate.
///
/// Stops querying once the unique-candidate count reaches the threshold,
/// so expensive generators are skipped when cheap ones already supplied
/// enough. Results gathered before the stop are always included.
pub struct CascadeGenerator {
    generators: Vec<Box<dyn CandidateGenerator>>,
    threshold: usize,
}

impl CascadeGenerator {
    /// Create a cascade with the default threshold.
    #[must_use]
    pub fn new(generators: Vec<Box<dyn CandidateGenerator>>) -> Self {
        Self::with_threshold(generators, DEFAULT_LIMIT)
    }

    /// Create a cascade stopping past `threshold` unique candidates.
    #[must_use]
    pub fn with_threshold(generators: Vec<Box<dyn CandidateGenerator>>, threshold: usize) -> Self {
        Self {
            generators,
            threshold,
        }
    }
}

impl CandidateGenerator for CascadeGenerator {
    fn find(&mut self, chain: &MentionChain) -> Vec<Arc<Entity>> {
        CombiningGenerator::union(&mut self.generators, chain, Some(self.threshold))
    }
}

/// Memoizes candidates by lower-cased best name and entity type.
///
/// A cache hit returns the previously computed list; callers must not
/// mutate returned lists in place.
pub struct CachingGenerator {
    generator: Box<dyn CandidateGenerator>,
    cache: HashMap<(String, EntityType), Vec<Arc<Entity>>>,
}

impl CachingGenerator {
    /// Wrap a generator with an in-memory cache.
    #[must_use]
    pub fn new(generator: Box<dyn CandidateGenerator>) -> Self {
        Self {
            generator,
            cache: HashMap::new(),
        }
    }
}

impl CandidateGenerator for CachingGenerator {
    fn find(&mut self, chain: &MentionChain) -> Vec<Arc<Entity>> {
        let key = (strings::fold_case(chain.name()), chain.entity_type());
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let candidates = self.generator.find(chain);
        self.cache.insert(key, candidates.clone());
        candidates
    }
}
