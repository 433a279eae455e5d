//! Candidate recall scoring against ground truth.

use crate::document::{Document, GroundTruth, LinkType};
use crate::entity::EntityType;
use std::collections::{HashMap, HashSet};

/// Per-type candidate recall summary.
///
/// Recall counts a mention as covered when the candidate list of its
/// chain contains at least one ground-truth entity. NIL mentions are
/// excluded; no candidate list can be right or wrong for them.
#[derive(Debug, Clone, Default)]
pub struct CandidatesReport {
    mentions_with_links: HashMap<EntityType, usize>,
    mentions_covered: HashMap<EntityType, usize>,
}

impl CandidatesReport {
    /// Overall recall across entity types.
    #[must_use]
    pub fn recall(&self) -> f64 {
        let total: usize = self.mentions_with_links.values().sum();
        let covered: usize = self.mentions_covered.values().sum();
        if total > 0 {
            covered as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Recall for one entity type.
    #[must_use]
    pub fn recall_for(&self, entity_type: EntityType) -> f64 {
        let total = self.mentions_with_links.get(&entity_type).copied().unwrap_or(0);
        let covered = self.mentions_covered.get(&entity_type).copied().unwrap_or(0);
        if total > 0 {
            covered as f64 / total as f64
        } else {
            0.0
        }
    }

    fn record(&mut self, entity_type: EntityType, covered: bool) {
        *self.mentions_with_links.entry(entity_type).or_insert(0) += 1;
        if covered {
            *self.mentions_covered.entry(entity_type).or_insert(0) += 1;
        }
    }
}

impl std::fmt::Display for CandidatesReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Candidate Generation")?;
        writeln!(f, "--------------------")?;
        writeln!(f, "R: {:.3}", self.recall())?;
        for entity_type in EntityType::ALL {
            if self.mentions_with_links.contains_key(&entity_type) {
                writeln!(f, "  {}: {:.3}", entity_type, self.recall_for(entity_type))?;
            }
        }
        Ok(())
    }
}

/// Incremental candidate-recall scorer.
pub struct CandidatesScorer {
    gt: GroundTruth,
    report: CandidatesReport,
}

impl CandidatesScorer {
    /// Create a scorer from ground truth.
    #[must_use]
    pub fn new(gt: GroundTruth) -> Self {
        Self {
            gt,
            report: CandidatesReport::default(),
        }
    }

    /// Update recall counts with a document's chains and candidates.
    ///
    /// Documents without ground truth are skipped.
    pub fn update(&mut self, document: &Document) {
        let Some(links) = self.gt.get(&document.doc_id) else {
            return;
        };
        for chain in &document.mention_chains {
            let candidate_ids: HashSet<&str> =
                chain.candidates.iter().map(|e| e.id.as_str()).collect();
            for mention in &chain.mentions {
                let Some(link) = links.get(&mention.offsets) else {
                    continue;
                };
                if link.link_type != LinkType::Link {
                    continue;
                }
                let covered = link.links.iter().any(|id| candidate_ids.contains(id.as_str()));
                if !covered {
                    log::debug!(
                        "candidates missed {} ({}) in {}",
                        mention.string,
                        link.links.join("|"),
                        document.doc_id
                    );
                }
                self.report.record(link.entity_type, covered);
            }
        }
    }

    /// Summary report.
    #[must_use]
    pub fn report(&self) -> CandidatesReport {
        self.report.clone()
    }
}
