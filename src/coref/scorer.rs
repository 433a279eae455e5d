//! Coreference scoring against ground-truth clusters (MUC and B³).

use crate::document::{Document, GroundTruth, LinkType, Offsets};
use std::collections::HashMap;

/// Which cluster metric the scorer accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorefMetric {
    /// Link-based metric (Vilain et al., 1995)
    Muc,
    /// Mention-based metric (Bagga & Baldwin, 1998)
    B3,
}

/// Precision/recall/F1 summary for in-document coreference.
#[derive(Debug, Clone, Copy)]
pub struct CorefReport {
    /// Precision
    pub precision: f64,
    /// Recall
    pub recall: f64,
    /// F1 score
    pub f1: f64,
}

impl std::fmt::Display for CorefReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Indoc Coref")?;
        writeln!(f, "-----------")?;
        writeln!(
            f,
            "P: {:.3}  R: {:.3}  F1: {:.3}",
            self.precision, self.recall, self.f1
        )
    }
}

/// Incremental coreference scorer.
///
/// Side-effect free with respect to the pipeline: consumes ground truth
/// and predicted chains, accumulates numerators/denominators across
/// documents. Not required for production linking.
pub struct CorefScorer {
    metric: CorefMetric,
    gt_clusters: HashMap<String, Vec<Vec<Offsets>>>,
    gt_mention_map: HashMap<String, HashMap<Offsets, String>>,
    precision_numerator: f64,
    precision_denominator: f64,
    recall_numerator: f64,
    recall_denominator: f64,
}

impl CorefScorer {
    /// Create a scorer from ground truth.
    #[must_use]
    pub fn new(gt: &GroundTruth, metric: CorefMetric) -> Self {
        let mut gt_clusters = HashMap::new();
        let mut gt_mention_map = HashMap::new();
        for (doc_id, links) in gt {
            // group ground-truth mentions into clusters: linked mentions by
            // their entity id set, NIL mentions by their NIL cluster id
            let mut clusters: HashMap<String, Vec<Offsets>> = HashMap::new();
            for (offsets, link) in links {
                let cluster_id = match link.link_type {
                    LinkType::Nil => link.cluster_id.clone().unwrap_or_else(|| "NIL".to_string()),
                    LinkType::Link => link.links.join("|"),
                };
                clusters.entry(cluster_id).or_default().push(*offsets);
            }
            let mut cluster_list: Vec<Vec<Offsets>> = clusters.into_values().collect();
            for cluster in &mut cluster_list {
                cluster.sort_unstable();
            }
            cluster_list.sort();
            gt_mention_map.insert(doc_id.clone(), mention_map(&cluster_list));
            gt_clusters.insert(doc_id.clone(), cluster_list);
        }
        Self {
            metric,
            gt_clusters,
            gt_mention_map,
            precision_numerator: 0.0,
            precision_denominator: 0.0,
            recall_numerator: 0.0,
            recall_denominator: 0.0,
        }
    }

    /// Update the metrics with the mention chains of a document.
    ///
    /// Documents without ground truth are skipped.
    pub fn update(&mut self, document: &Document) {
        let (Some(gt_clusters), Some(gt_map)) = (
            self.gt_clusters.get(&document.doc_id),
            self.gt_mention_map.get(&document.doc_id),
        ) else {
            return;
        };
        let predicted: Vec<Vec<Offsets>> = document
            .mention_chains
            .iter()
            .map(|chain| chain.mentions.iter().map(|m| m.offsets).collect())
            .collect();
        let predicted_map = mention_map(&predicted);

        let metric = match self.metric {
            CorefMetric::Muc => muc,
            CorefMetric::B3 => b3,
        };
        let (p_num, p_den) = metric(&predicted, gt_map);
        let (r_num, r_den) = metric(gt_clusters, &predicted_map);
        self.precision_numerator += p_num;
        self.precision_denominator += p_den;
        self.recall_numerator += r_num;
        self.recall_denominator += r_den;
    }

    /// Accumulated precision.
    #[must_use]
    pub fn precision(&self) -> f64 {
        if self.precision_denominator > 0.0 {
            self.precision_numerator / self.precision_denominator
        } else {
            0.0
        }
    }

    /// Accumulated recall.
    #[must_use]
    pub fn recall(&self) -> f64 {
        if self.recall_denominator > 0.0 {
            self.recall_numerator / self.recall_denominator
        } else {
            0.0
        }
    }

    /// F1 of the accumulated precision and recall.
    #[must_use]
    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    /// Summary report.
    #[must_use]
    pub fn report(&self) -> CorefReport {
        CorefReport {
            precision: self.precision(),
            recall: self.recall(),
            f1: self.f1(),
        }
    }
}

/// Map each mention to a synthetic cluster id.
fn mention_map(clusters: &[Vec<Offsets>]) -> HashMap<Offsets, String> {
    let mut map = HashMap::new();
    for (counter, cluster) in clusters.iter().enumerate() {
        let cluster_id = format!("C{}", counter + 1);
        for offsets in cluster {
            map.insert(*offsets, cluster_id.clone());
        }
    }
    map
}

/// MUC: a cluster of size n asserts n-1 links. Correct links are the
/// cluster size minus mentions unknown to the other side minus the number
/// of distinct clusters the members map into.
fn muc(clusters: &[Vec<Offsets>], mention_map: &HashMap<Offsets, String>) -> (f64, f64) {
    let mut tp = 0i64;
    let mut p = 0i64;
    for cluster in clusters {
        p += cluster.len() as i64 - 1;
        tp += cluster.len() as i64;
        let mut linked: Vec<&String> = Vec::new();
        for mention in cluster {
            match mention_map.get(mention) {
                Some(cluster_id) => {
                    if !linked.contains(&cluster_id) {
                        linked.push(cluster_id);
                    }
                }
                None => tp -= 1,
            }
        }
        tp -= linked.len() as i64;
    }
    (tp as f64, p as f64)
}

/// B³ over non-singleton clusters: per cluster, the sum of squared
/// overlaps with the other side's clusters, divided by cluster size.
fn b3(clusters: &[Vec<Offsets>], mention_map: &HashMap<Offsets, String>) -> (f64, f64) {
    let mut num = 0.0;
    let mut den = 0.0;
    for cluster in clusters {
        if cluster.len() == 1 {
            continue;
        }
        let mut counts: HashMap<&String, usize> = HashMap::new();
        for mention in cluster {
            if let Some(cluster_id) = mention_map.get(mention) {
                *counts.entry(cluster_id).or_insert(0) += 1;
            }
        }
        let correct: usize = counts.values().map(|c| c * c).sum();
        num += correct as f64 / cluster.len() as f64;
        den += cluster.len() as f64;
    }
    (num, den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Link, Mention, MentionChain};
    use crate::entity::EntityType;

    const DOC: &str = "doc1_NW_1";

    fn gt_with_one_cluster(offsets: &[Offsets]) -> GroundTruth {
        let mut links = HashMap::new();
        for o in offsets {
            links.insert(
                *o,
                Link {
                    entity_type: EntityType::Per,
                    link_type: LinkType::Link,
                    links: vec!["E1".to_string()],
                    cluster_id: None,
                    name: "x".to_string(),
                },
            );
        }
        let mut gt = GroundTruth::new();
        gt.insert(DOC.to_string(), links);
        gt
    }

    fn doc_with_chains(clusters: &[&[Offsets]]) -> Document {
        let mut mentions = Vec::new();
        let mut chains = Vec::new();
        for (ci, cluster) in clusters.iter().enumerate() {
            let ms: Vec<Mention> = cluster
                .iter()
                .enumerate()
                .map(|(mi, o)| {
                    Mention::new(
                        format!("m-{ci}-{mi}"),
                        "x",
                        DOC,
                        *o,
                        (0, 1),
                        EntityType::Per,
                    )
                })
                .collect();
            mentions.extend(ms.clone());
            chains.push(MentionChain::new(ms).unwrap());
        }
        let mut d = Document::new(mentions, vec![], "eng").unwrap();
        d.mention_chains = chains;
        d
    }

    #[test]
    fn muc_split_cluster_recall() {
        // ground truth {m1,m2,m3,m4}; predicted {m1,m2} and {m3,m4}:
        // recall numerator 2, denominator 3
        let spans: Vec<Offsets> = vec![(1, 2), (10, 11), (20, 21), (30, 31)];
        let gt = gt_with_one_cluster(&spans);
        let mut scorer = CorefScorer::new(&gt, CorefMetric::Muc);
        let d = doc_with_chains(&[&spans[..2], &spans[2..]]);
        scorer.update(&d);
        assert_eq!(scorer.recall_numerator, 2.0);
        assert_eq!(scorer.recall_denominator, 3.0);
        // predicted clusters assert 2 links, both inside the gold cluster
        assert_eq!(scorer.precision(), 1.0);
    }

    #[test]
    fn muc_perfect_prediction() {
        let spans: Vec<Offsets> = vec![(1, 2), (10, 11), (20, 21)];
        let gt = gt_with_one_cluster(&spans);
        let mut scorer = CorefScorer::new(&gt, CorefMetric::Muc);
        scorer.update(&doc_with_chains(&[&spans]));
        assert_eq!(scorer.precision(), 1.0);
        assert_eq!(scorer.recall(), 1.0);
        assert_eq!(scorer.f1(), 1.0);
    }

    #[test]
    fn b3_perfect_prediction() {
        let spans: Vec<Offsets> = vec![(1, 2), (10, 11)];
        let gt = gt_with_one_cluster(&spans);
        let mut scorer = CorefScorer::new(&gt, CorefMetric::B3);
        scorer.update(&doc_with_chains(&[&spans]));
        assert_eq!(scorer.precision(), 1.0);
        assert_eq!(scorer.recall(), 1.0);
    }

    #[test]
    fn b3_split_prediction() {
        let spans: Vec<Offsets> = vec![(1, 2), (10, 11), (20, 21), (30, 31)];
        let gt = gt_with_one_cluster(&spans);
        let mut scorer = CorefScorer::new(&gt, CorefMetric::B3);
        scorer.update(&doc_with_chains(&[&spans[..2], &spans[2..]]));
        // each predicted cluster maps fully into the gold cluster
        assert_eq!(scorer.precision(), 1.0);
        // gold cluster of 4 splits 2/2: (4+4)/4 mentions credited out of 4
        assert!((scorer.recall() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_document_is_skipped() {
        let gt = GroundTruth::new();
        let mut scorer = CorefScorer::new(&gt, CorefMetric::Muc);
        scorer.update(&doc_with_chains(&[&[(1, 2), (3, 4)]]));
        assert_eq!(scorer.precision(), 0.0);
    }

    #[test]
    fn nil_mentions_cluster_by_nil_id() {
        let mut links = HashMap::new();
        for o in [(1, 2), (10, 11)] {
            links.insert(
                o,
                Link {
                    entity_type: EntityType::Per,
                    link_type: LinkType::Nil,
                    links: vec![],
                    cluster_id: Some("NIL001".to_string()),
                    name: "x".to_string(),
                },
            );
        }
        let mut gt = GroundTruth::new();
        gt.insert(DOC.to_string(), links);
        let mut scorer = CorefScorer::new(&gt, CorefMetric::Muc);
        scorer.update(&doc_with_chains(&[&[(1, 2), (10, 11)]]));
        assert_eq!(scorer.recall(), 1.0);
    }
}
