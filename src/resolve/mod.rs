//! Entity resolution: select one KB entity per mention chain, or NIL.

mod scorer;

pub use scorer::{ResolverReport, ResolverScorer};

use crate::document::{Document, MentionChain};
use crate::entity::{Entity, EntityType};
use crate::strings;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashSet;
use std::sync::Arc;

/// Selects entities for the mention chains of a document.
///
/// A resolver may set `entity` on a chain, narrow its candidate list, or
/// leave it untouched. Chains left without an entity are NIL.
pub trait Resolver {
    /// Resolve the unresolved chains of a document.
    fn resolve(&self, document: &mut Document);
}

/// Baseline: pick the first candidate of every unresolved chain.
pub struct FirstResolver;

impl Resolver for FirstResolver {
    fn resolve(&self, document: &mut Document) {
        for chain in &mut document.mention_chains {
            if chain.entity.is_none() {
                chain.entity = chain.candidates.first().cloned();
            }
        }
    }
}

/// Outcome of matching a chain against its candidates.
///
/// Exactly one match resolves the chain, several narrow the candidate
/// list, and none leaves the chain for a later resolver.
fn apply_matches(chain: &mut MentionChain, matches: Vec<Arc<Entity>>) {
    match matches.len() {
        0 => {}
        1 => {
            log::debug!("resolved {} -> {}", chain.name(), matches[0].id);
            chain.entity = matches.into_iter().next();
        }
        _ => chain.candidates = matches,
    }
}

/// Resolves chains whose name matches a candidate name exactly,
/// ignoring case.
pub struct ExactNameResolver;

impl ExactNameResolver {
    fn matches(chain: &MentionChain) -> Vec<Arc<Entity>> {
        let chain_names: HashSet<String> = chain.names().map(strings::fold_case).collect();
        chain
            .candidates
            .iter()
            .filter(|candidate| {
                candidate
                    .names
                    .iter()
                    .any(|name| chain_names.contains(&strings::fold_case(name)))
            })
            .cloned()
            .collect()
    }
}

impl Resolver for ExactNameResolver {
    fn resolve(&self, document: &mut Document) {
        for chain in &mut document.mention_chains {
            if chain.entity.is_some() || chain.candidates.is_empty() {
                continue;
            }
            let matches = Self::matches(chain);
            apply_matches(chain, matches);
        }
    }
}

// matches python's urllib quote: alphanumerics and these stay verbatim
const URL_QUOTE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Resolves chains through encyclopedia URLs attached to candidates.
///
/// Builds the article URL each chain name would have and matches it
/// against the candidates' external links, ignoring case.
pub struct WikipediaResolver;

impl WikipediaResolver {
    /// Deterministic article URL for a name.
    #[must_use]
    pub fn url_for(name: &str) -> String {
        let title = name.replace(' ', "_").replace('\u{2019}', "'");
        format!(
            "http://en.wikipedia.org/wiki/{}",
            utf8_percent_encode(&title, URL_QUOTE)
        )
    }

    fn matches(chain: &MentionChain) -> Vec<Arc<Entity>> {
        let chain_urls: HashSet<String> = chain
            .names()
            .map(|name| Self::url_for(name).to_lowercase())
            .collect();
        chain
            .candidates
            .iter()
            .filter(|candidate| {
                candidate
                    .urls
                    .iter()
                    .any(|url| chain_urls.contains(&url.to_lowercase()))
            })
            .cloned()
            .collect()
    }
}

impl Resolver for WikipediaResolver {
    fn resolve(&self, document: &mut Document) {
        for chain in &mut document.mention_chains {
            if chain.entity.is_some() || chain.candidates.is_empty() {
                continue;
            }
            let matches = Self::matches(chain);
            apply_matches(chain, matches);
        }
    }
}

/// Resolves a chain to the candidate closest in edit distance,
/// normalized by the longer of the two strings.
///
/// Unlike the name and URL resolvers, this one never narrows: the
/// single best candidate over all chain/candidate name pairs wins, and
/// only when its distance is under the threshold. Ties keep the
/// earlier candidate.
pub struct EditDistanceResolver {
    threshold: f64,
}

impl EditDistanceResolver {
    const DEFAULT_THRESHOLD: f64 = 0.1;

    /// Resolver with the default distance threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }

    /// Resolver with a custom normalized distance threshold.
    #[must_use]
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    fn distance(a: &str, b: &str) -> f64 {
        let longest = a.chars().count().max(b.chars().count());
        if longest == 0 {
            return 0.0;
        }
        strsim::levenshtein(a, b) as f64 / longest as f64
    }

    fn best_match(&self, chain: &MentionChain) -> Option<Arc<Entity>> {
        let chain_names: Vec<String> = chain.names().map(strings::fold_case).collect();
        let mut distance = f64::INFINITY;
        let mut best: Option<&Arc<Entity>> = None;
        for candidate in &chain.candidates {
            for name in &candidate.names {
                let folded = strings::fold_case(name);
                for chain_name in &chain_names {
                    let d = Self::distance(chain_name, &folded);
                    if d < distance {
                        distance = d;
                        best = Some(candidate);
                    }
                }
            }
        }
        if distance < self.threshold {
            best.cloned()
        } else {
            None
        }
    }
}

impl Default for EditDistanceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for EditDistanceResolver {
    fn resolve(&self, document: &mut Document) {
        for chain in &mut document.mention_chains {
            if chain.entity.is_some() || chain.candidates.is_empty() {
                continue;
            }
            if let Some(entity) = self.best_match(chain) {
                log::debug!("resolved {} -> {} by distance", chain.name(), entity.id);
                chain.entity = Some(entity);
            }
        }
    }
}

/// Turns a chain/candidate pair into a feature vector.
pub trait FeatureExtractor {
    /// Extract features for scoring one candidate of a chain.
    fn extract(&self, document: &Document, chain: &MentionChain, candidate: &Entity) -> Vec<f64>;
}

/// Scores a feature vector; positive scores indicate a plausible link.
pub trait MarginClassifier {
    /// Classification margin for a feature vector.
    fn score(&self, features: &[f64]) -> f64;
}

/// Dot-product classifier over a fixed weight vector.
pub struct LinearMarginClassifier {
    weights: Vec<f64>,
    bias: f64,
}

impl LinearMarginClassifier {
    /// Classifier from trained weights and bias.
    #[must_use]
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }
}

impl MarginClassifier for LinearMarginClassifier {
    fn score(&self, features: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(features)
            .map(|(w, f)| w * f)
            .sum::<f64>()
            + self.bias
    }
}

/// Picks the best-scoring candidate under a margin classifier.
///
/// Resolves only when the best score is non-negative; an all-negative
/// candidate set leaves the chain NIL.
pub struct StatisticalResolver {
    extractor: Box<dyn FeatureExtractor>,
    classifier: Box<dyn MarginClassifier>,
}

impl StatisticalResolver {
    /// Resolver from a feature extractor and a trained classifier.
    #[must_use]
    pub fn new(extractor: Box<dyn FeatureExtractor>, classifier: Box<dyn MarginClassifier>) -> Self {
        Self {
            extractor,
            classifier,
        }
    }
}

impl Resolver for StatisticalResolver {
    fn resolve(&self, document: &mut Document) {
        for index in 0..document.mention_chains.len() {
            let chain = &document.mention_chains[index];
            if chain.entity.is_some() || chain.candidates.is_empty() {
                continue;
            }
            let mut best: Option<(f64, Arc<Entity>)> = None;
            for candidate in &chain.candidates {
                let features = self.extractor.extract(document, chain, candidate);
                let score = self.classifier.score(&features);
                if best.as_ref().map_or(true, |(b, _)| score > *b) {
                    best = Some((score, candidate.clone()));
                }
            }
            if let Some((score, entity)) = best {
                if score >= 0.0 {
                    document.mention_chains[index].entity = Some(entity);
                }
            }
        }
    }
}

/// Runs resolvers in order over a shrinking set of unresolved chains.
///
/// Chains resolved by a stage are set aside so later stages never see
/// them; everything is recombined once the cascade finishes.
pub struct CascadeResolver {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl CascadeResolver {
    /// Create a cascade.
    #[must_use]
    pub fn new(resolvers: Vec<Box<dyn Resolver>>) -> Self {
        Self { resolvers }
    }
}

impl Resolver for CascadeResolver {
    fn resolve(&self, document: &mut Document) {
        let mut resolved: Vec<MentionChain> = Vec::new();
        for resolver in &self.resolvers {
            resolver.resolve(document);
            let remaining = std::mem::take(&mut document.mention_chains);
            for chain in remaining {
                if chain.entity.is_some() {
                    resolved.push(chain);
                } else {
                    document.mention_chains.push(chain);
                }
            }
            if document.mention_chains.is_empty() {
                break;
            }
        }
        document.mention_chains.append(&mut resolved);
    }
}

/// Applies a resolver only to documents in one language.
pub struct LanguageSpecificResolver {
    lang: String,
    resolver: Box<dyn Resolver>,
}

impl LanguageSpecificResolver {
    /// Wrap a resolver behind a 3-letter language code.
    #[must_use]
    pub fn new(lang: impl Into<String>, resolver: Box<dyn Resolver>) -> Self {
        Self {
            lang: lang.into(),
            resolver,
        }
    }
}

impl Resolver for LanguageSpecificResolver {
    fn resolve(&self, document: &mut Document) {
        if document.lang == self.lang {
            self.resolver.resolve(document);
        }
    }
}

/// Applies a resolver only to chains of one entity type.
pub struct TypeSpecificResolver {
    entity_type: EntityType,
    resolver: Box<dyn Resolver>,
}

impl TypeSpecificResolver {
    /// Wrap a resolver behind an entity type.
    #[must_use]
    pub fn new(entity_type: EntityType, resolver: Box<dyn Resolver>) -> Self {
        Self {
            entity_type,
            resolver,
        }
    }
}

impl Resolver for TypeSpecificResolver {
    fn resolve(&self, document: &mut Document) {
        let all = std::mem::take(&mut document.mention_chains);
        let (matching, others): (Vec<_>, Vec<_>) = all
            .into_iter()
            .partition(|chain| chain.entity_type() == self.entity_type);
        document.mention_chains = matching;
        self.resolver.resolve(document);
        document.mention_chains.extend(others);
    }
}
