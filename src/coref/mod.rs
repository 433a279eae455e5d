//! In-document coreference: turning a flat mention list into mention chains.
//!
//! The cascade starts with one singleton chain per mention and lets each
//! configured stage merge chains, sieve style. High-precision stages go
//! first. A merge replaces two or more chains with one new chain holding
//! the union of their mentions; originals are dropped and mentions are
//! never mutated in place.

mod scorer;

pub use scorer::{CorefMetric, CorefReport, CorefScorer};

use crate::document::{Document, MentionChain};
use crate::entity::EntityType;
use crate::strings;
use std::collections::{HashMap, HashSet};

/// A coreference stage: merges (or otherwise updates) the current chains.
pub trait CorefStage {
    /// Stage name used in reports.
    fn name(&self) -> &'static str;

    /// Process the current mention chains of the document.
    fn update(&self, document: &mut Document);
}

/// Merge the chains at `indices` into one chain.
///
/// Duplicate indices are ignored; fewer than two distinct chains is a
/// no-op. The merged chain keeps the mentions' order of first appearance
/// and lands at the smallest merged index. Returns the merged chain's
/// index, or `None` when nothing was merged.
pub fn merge_chains(document: &mut Document, indices: &[usize]) -> Option<usize> {
    let mut idx: Vec<usize> = indices.to_vec();
    idx.sort_unstable();
    idx.dedup();
    if idx.len() < 2 || idx.last().copied()? >= document.mention_chains.len() {
        return None;
    }

    let mut mentions = Vec::new();
    let mut seen = HashSet::new();
    for &i in &idx {
        for mention in &document.mention_chains[i].mentions {
            if seen.insert(mention.id.clone()) {
                mentions.push(mention.clone());
            }
        }
    }
    let merged = match MentionChain::new(mentions) {
        Ok(chain) => chain,
        Err(err) => {
            log::warn!("Refusing cross-type merge: {err}");
            return None;
        }
    };

    let target = idx[0];
    for &i in idx.iter().skip(1).rev() {
        document.mention_chains.remove(i);
    }
    document.mention_chains[target] = merged;
    Some(target)
}

/// Per-stage merge statistics recorded by [`CascadeCoref`].
#[derive(Debug, Default, Clone)]
pub struct CorefReporter {
    stages: Vec<(&'static str, StageStats)>,
}

/// Counts for one stage across all documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct StageStats {
    /// Number of times the stage ran
    pub runs: usize,
    /// Chains removed by merges
    pub merges: usize,
}

impl CorefReporter {
    fn record(&mut self, name: &'static str, before: usize, after: usize) {
        let index = match self.stages.iter().position(|(n, _)| *n == name) {
            Some(index) => index,
            None => {
                self.stages.push((name, StageStats::default()));
                self.stages.len() - 1
            }
        };
        let stats = &mut self.stages[index].1;
        stats.runs += 1;
        stats.merges += before.saturating_sub(after);
    }

    /// Stats per stage, in cascade order.
    #[must_use]
    pub fn stages(&self) -> &[(&'static str, StageStats)] {
        &self.stages
    }
}

impl std::fmt::Display for CorefReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Coref Stages")?;
        writeln!(f, "------------")?;
        for (name, stats) in &self.stages {
            writeln!(f, "{: <24} runs: {: >6}  merges: {: >6}", name, stats.runs, stats.merges)?;
        }
        Ok(())
    }
}

/// Sieve-style coreference cascade.
///
/// Initializes one singleton chain per mention, then runs the stages
/// in order. The chain list after the last stage becomes
/// `document.mention_chains`.
pub struct CascadeCoref {
    stages: Vec<Box<dyn CorefStage>>,
    reporter: Option<CorefReporter>,
}

impl CascadeCoref {
    /// Create a cascade from ordered stages.
    #[must_use]
    pub fn new(stages: Vec<Box<dyn CorefStage>>) -> Self {
        Self {
            stages,
            reporter: None,
        }
    }

    /// Enable per-stage merge reporting.
    #[must_use]
    pub fn with_reporting(mut self) -> Self {
        self.reporter = Some(CorefReporter::default());
        self
    }

    /// Process the mentions of a document into mention chains.
    pub fn run(&mut self, document: &mut Document) {
        document.mention_chains = document
            .mentions
            .iter()
            .cloned()
            .map(MentionChain::singleton)
            .collect();
        for stage in &self.stages {
            let before = document.mention_chains.len();
            stage.update(document);
            if let Some(reporter) = &mut self.reporter {
                reporter.record(stage.name(), before, document.mention_chains.len());
            }
        }
    }

    /// Accumulated stage report, if reporting was enabled.
    #[must_use]
    pub fn reporter(&self) -> Option<&CorefReporter> {
        self.reporter.as_ref()
    }
}

/// Merges chains that share a mention string (case insensitive),
/// scoped by entity type.
pub struct ExactMatchStage;

impl CorefStage for ExactMatchStage {
    fn name(&self) -> &'static str {
        "exact-match"
    }

    fn update(&self, document: &mut Document) {
        // group chain indices by (type, folded mention string)
        let mut groups: HashMap<(EntityType, String), Vec<usize>> = HashMap::new();
        for (i, chain) in document.mention_chains.iter().enumerate() {
            for mention in &chain.mentions {
                let key = (chain.entity_type(), strings::fold_case(&mention.string));
                let members = groups.entry(key).or_default();
                if members.last() != Some(&i) {
                    members.push(i);
                }
            }
        }

        // a chain can appear in several groups; union-find joins them
        let n = document.mention_chains.len();
        let mut parent: Vec<usize> = (0..n).collect();
        fn find(parent: &mut [usize], i: usize) -> usize {
            if parent[i] != i {
                parent[i] = find(parent, parent[i]);
            }
            parent[i]
        }
        for members in groups.values() {
            for window in members.windows(2) {
                let a = find(&mut parent, window[0]);
                let b = find(&mut parent, window[1]);
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }

        let mut clusters: HashMap<usize, Vec<usize>> = HashMap::new();
        for i in 0..n {
            let root = find(&mut parent, i);
            clusters.entry(root).or_default().push(i);
        }

        // rebuild the chain list wholesale; clusters are disjoint and each
        // merged chain lands at its first member's position
        let mut taken: Vec<Option<MentionChain>> =
            std::mem::take(&mut document.mention_chains)
                .into_iter()
                .map(Some)
                .collect();
        let mut rebuilt = Vec::new();
        for i in 0..n {
            let root = find(&mut parent, i);
            let members = &clusters[&root];
            if members[0] != i {
                continue;
            }
            if members.len() == 1 {
                if let Some(chain) = taken[i].take() {
                    rebuilt.push(chain);
                }
                continue;
            }
            let mut mentions = Vec::new();
            let mut seen = HashSet::new();
            for &j in members {
                if let Some(chain) = taken[j].take() {
                    for mention in chain.mentions {
                        if seen.insert(mention.id.clone()) {
                            mentions.push(mention);
                        }
                    }
                }
            }
            match MentionChain::new(mentions) {
                Ok(chain) => rebuilt.push(chain),
                Err(err) => log::warn!("Dropping invalid merge: {err}"),
            }
        }
        document.mention_chains = rebuilt;
    }
}

/// Merges acronym mentions with chains whose name initials match.
///
/// Only works for scripts that support case; words like "of" are not
/// dropped before initialing, and only the first matching chain is
/// merged, not the closest one.
pub struct AcronymStage {
    min_length: usize,
}

impl AcronymStage {
    /// Create a stage; acronyms shorter than `min_length` characters
    /// are ignored.
    #[must_use]
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    fn acronym<'a>(&self, chain: &'a MentionChain) -> Option<&'a str> {
        chain.mentions.iter().find_map(|m| {
            let s = m.string.as_str();
            if s.chars().count() >= self.min_length && s.to_uppercase() == s {
                Some(s)
            } else {
                None
            }
        })
    }

    fn initials_match(acronym: &str, chain: &MentionChain) -> bool {
        chain.mentions.iter().any(|m| {
            let initials: String = m
                .string
                .split_whitespace()
                .filter_map(|word| word.chars().next())
                .flat_map(char::to_uppercase)
                .collect();
            initials == acronym
        })
    }
}

impl CorefStage for AcronymStage {
    fn name(&self) -> &'static str {
        "acronym"
    }

    fn update(&self, document: &mut Document) {
        // each chain joins at most one merge per pass
        let mut consumed: HashSet<usize> = HashSet::new();
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for i in 0..document.mention_chains.len() {
            if consumed.contains(&i) {
                continue;
            }
            let Some(acronym) = self.acronym(&document.mention_chains[i]) else {
                continue;
            };
            let acronym = acronym.to_string();
            let ty = document.mention_chains[i].entity_type();
            let matched = document.mention_chains.iter().enumerate().find(|(j, other)| {
                *j != i
                    && !consumed.contains(j)
                    && other.entity_type() == ty
                    && Self::initials_match(&acronym, other)
            });
            if let Some((j, _)) = matched {
                consumed.insert(i);
                consumed.insert(j);
                pairs.push((i, j));
            }
        }
        // pairs are disjoint; merging in descending order of the larger
        // index keeps the remaining indices valid
        pairs.sort_by_key(|&(i, j)| std::cmp::Reverse(i.max(j)));
        for (i, j) in pairs {
            merge_chains(document, &[i, j]);
        }
    }
}

/// Which token of a longer name a single-token mention matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPosition {
    /// First token (given-name matching)
    First,
    /// Last token (surname matching)
    Last,
}

/// Merges single-token mentions into chains whose longer names carry the
/// same token at a designated position.
///
/// Intentionally aggressive: any single-token mention matching the
/// designated slot is treated as coreferent, which accepts false merges
/// in documents where distinct people share a surname. Combine with
/// [`TypeSpecificStage`] to restrict to persons.
pub struct SingleTokenMatchStage {
    position: TokenPosition,
}

impl SingleTokenMatchStage {
    /// Create a stage matching on the given token position.
    #[must_use]
    pub fn new(position: TokenPosition) -> Self {
        Self { position }
    }

    fn single_token_name(chain: &MentionChain) -> Option<&str> {
        chain
            .mentions
            .iter()
            .map(|m| m.string.as_str())
            .find(|s| !s.contains(' '))
    }

    fn is_match(&self, single_name: &str, chain: &MentionChain) -> bool {
        chain.mentions.iter().any(|m| {
            if !m.string.contains(' ') {
                return false;
            }
            let token = match self.position {
                TokenPosition::First => m.string.split_whitespace().next(),
                TokenPosition::Last => m.string.split_whitespace().last(),
            };
            token.is_some_and(|t| strings::fold_case(t) == strings::fold_case(single_name))
        })
    }
}

impl CorefStage for SingleTokenMatchStage {
    fn name(&self) -> &'static str {
        "single-token"
    }

    fn update(&self, document: &mut Document) {
        // snapshot the single-token chains up front; locate them by mention
        // id afterward since merges replace chains
        let singles: Vec<(String, String)> = document
            .mention_chains
            .iter()
            .filter_map(|chain| {
                Self::single_token_name(chain)
                    .map(|name| (chain.mentions[0].id.clone(), name.to_string()))
            })
            .collect();

        for (mention_id, single_name) in singles {
            let Some(i) = document
                .mention_chains
                .iter()
                .position(|c| c.mentions.iter().any(|m| m.id == mention_id))
            else {
                continue;
            };
            let ty = document.mention_chains[i].entity_type();
            let mut group: Vec<usize> = document
                .mention_chains
                .iter()
                .enumerate()
                .filter(|(j, chain)| {
                    *j != i && chain.entity_type() == ty && self.is_match(&single_name, chain)
                })
                .map(|(j, _)| j)
                .collect();
            if group.is_empty() {
                continue;
            }
            group.push(i);
            merge_chains(document, &group);
        }
    }
}

/// Runs an inner stage only for documents in particular languages.
pub struct LanguageSpecificStage {
    stage: Box<dyn CorefStage>,
    langs: Vec<String>,
}

impl LanguageSpecificStage {
    /// Wrap a stage with a language restriction.
    #[must_use]
    pub fn new(stage: Box<dyn CorefStage>, langs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            stage,
            langs: langs.into_iter().map(Into::into).collect(),
        }
    }
}

impl CorefStage for LanguageSpecificStage {
    fn name(&self) -> &'static str {
        "language-specific"
    }

    fn update(&self, document: &mut Document) {
        if self.langs.iter().any(|l| *l == document.lang) {
            self.stage.update(document);
        }
    }
}

/// Runs an inner stage only on chains of particular entity types.
///
/// Non-matching chains pass through untouched and are re-merged into the
/// full chain list afterward.
pub struct TypeSpecificStage {
    stage: Box<dyn CorefStage>,
    types: Vec<EntityType>,
}

impl TypeSpecificStage {
    /// Wrap a stage with an entity type restriction.
    #[must_use]
    pub fn new(stage: Box<dyn CorefStage>, types: impl IntoIterator<Item = EntityType>) -> Self {
        Self {
            stage,
            types: types.into_iter().collect(),
        }
    }
}

impl CorefStage for TypeSpecificStage {
    fn name(&self) -> &'static str {
        "type-specific"
    }

    fn update(&self, document: &mut Document) {
        let chains = std::mem::take(&mut document.mention_chains);
        let (matching, other): (Vec<_>, Vec<_>) = chains
            .into_iter()
            .partition(|c| self.types.contains(&c.entity_type()));
        document.mention_chains = matching;
        self.stage.update(document);
        document.mention_chains.extend(other);
    }
}
