//! Linking accuracy scoring against ground truth.

use crate::document::{Document, GroundTruth, LinkType};
use crate::entity::EntityType;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    correct: usize,
    precision_denominator: usize,
    recall_denominator: usize,
    wrong_entity: usize,
    false_alarm: usize,
}

impl Counts {
    fn precision(&self) -> f64 {
        if self.precision_denominator > 0 {
            self.correct as f64 / self.precision_denominator as f64
        } else {
            0.0
        }
    }

    fn recall(&self) -> f64 {
        if self.recall_denominator > 0 {
            self.correct as f64 / self.recall_denominator as f64
        } else {
            0.0
        }
    }

    fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    fn add(&mut self, other: &Counts) {
        self.correct += other.correct;
        self.precision_denominator += other.precision_denominator;
        self.recall_denominator += other.recall_denominator;
        self.wrong_entity += other.wrong_entity;
        self.false_alarm += other.false_alarm;
    }
}

/// Linking precision/recall summary, overall and per entity type.
///
/// Precision counts every mention whose chain selected an entity.
/// Recall counts mentions whose candidate list contained a correct
/// entity, so it measures resolution quality independent of candidate
/// generation misses. Errors split into wrong-entity (linked, but to the
/// wrong KB record) and false-alarm (ground truth says NIL).
#[derive(Debug, Clone, Default)]
pub struct ResolverReport {
    per_type: HashMap<EntityType, Counts>,
}

impl ResolverReport {
    fn overall(&self) -> Counts {
        let mut total = Counts::default();
        for counts in self.per_type.values() {
            total.add(counts);
        }
        total
    }

    /// Overall precision.
    #[must_use]
    pub fn precision(&self) -> f64 {
        self.overall().precision()
    }

    /// Overall recall.
    #[must_use]
    pub fn recall(&self) -> f64 {
        self.overall().recall()
    }

    /// Overall F1.
    #[must_use]
    pub fn f1(&self) -> f64 {
        self.overall().f1()
    }

    /// Precision for one entity type.
    #[must_use]
    pub fn precision_for(&self, entity_type: EntityType) -> f64 {
        self.per_type.get(&entity_type).copied().unwrap_or_default().precision()
    }

    /// Recall for one entity type.
    #[must_use]
    pub fn recall_for(&self, entity_type: EntityType) -> f64 {
        self.per_type.get(&entity_type).copied().unwrap_or_default().recall()
    }

    /// Mentions linked to the wrong entity.
    #[must_use]
    pub fn wrong_entity(&self) -> usize {
        self.overall().wrong_entity
    }

    /// Mentions linked although ground truth says NIL.
    #[must_use]
    pub fn false_alarm(&self) -> usize {
        self.overall().false_alarm
    }
}

impl std::fmt::Display for ResolverReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let overall = self.overall();
        writeln!(f, "Entity Linking")?;
        writeln!(f, "--------------")?;
        writeln!(
            f,
            "P: {:.3}  R: {:.3}  F1: {:.3}",
            overall.precision(),
            overall.recall(),
            overall.f1()
        )?;
        for entity_type in EntityType::ALL {
            if let Some(counts) = self.per_type.get(&entity_type) {
                writeln!(
                    f,
                    "  {}: P {:.3}  R {:.3}  F1 {:.3}",
                    entity_type,
                    counts.precision(),
                    counts.recall(),
                    counts.f1()
                )?;
            }
        }
        writeln!(
            f,
            "errors: {} wrong entity, {} false alarm",
            overall.wrong_entity, overall.false_alarm
        )
    }
}

/// Incremental linking scorer.
pub struct ResolverScorer {
    gt: GroundTruth,
    report: ResolverReport,
}

impl ResolverScorer {
    /// Create a scorer from ground truth.
    #[must_use]
    pub fn new(gt: GroundTruth) -> Self {
        Self {
            gt,
            report: ResolverReport::default(),
        }
    }

    /// Update counts with a resolved document.
    ///
    /// Documents without ground truth are skipped.
    pub fn update(&mut self, document: &Document) {
        let Some(links) = self.gt.get(&document.doc_id) else {
            return;
        };
        for chain in &document.mention_chains {
            let selected = chain.entity.as_ref().map(|e| e.id.as_str());
            let candidate_ids: HashSet<&str> =
                chain.candidates.iter().map(|e| e.id.as_str()).collect();
            for mention in &chain.mentions {
                // every system-linked mention counts against precision,
                // whether or not ground truth covers it
                if selected.is_some() {
                    self.report
                        .per_type
                        .entry(mention.entity_type)
                        .or_default()
                        .precision_denominator += 1;
                }
                let Some(link) = links.get(&mention.offsets) else {
                    continue;
                };
                let counts = self.report.per_type.entry(link.entity_type).or_default();
                match link.link_type {
                    LinkType::Link => {
                        if link.links.iter().any(|id| candidate_ids.contains(id.as_str())) {
                            counts.recall_denominator += 1;
                        }
                        if let Some(id) = selected {
                            if link.links.iter().any(|l| l == id) {
                                counts.correct += 1;
                            } else {
                                counts.wrong_entity += 1;
                                log::debug!(
                                    "wrong entity for {} in {}: {} not in {}",
                                    mention.string,
                                    document.doc_id,
                                    id,
                                    link.links.join("|")
                                );
                            }
                        }
                    }
                    LinkType::Nil => {
                        if selected.is_some() {
                            counts.false_alarm += 1;
                        }
                    }
                }
            }
        }
    }

    /// Summary report.
    #[must_use]
    pub fn report(&self) -> ResolverReport {
        self.report.clone()
    }
}
