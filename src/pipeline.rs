//! End-to-end linking pipeline: coref, candidates, resolution, output.

use crate::candidates::{CandidateGenerator, CandidatesReport, CandidatesScorer};
use crate::coref::{CascadeCoref, CorefMetric, CorefReport, CorefScorer};
use crate::document::{Document, GroundTruth};
use crate::error::Result;
use crate::io::OutputWriter;
use crate::resolve::{Resolver, ResolverReport, ResolverScorer};
use std::io::Write;

/// Scoring reports gathered across every processed document.
#[derive(Debug, Clone)]
pub struct Report {
    /// In-document coreference quality
    pub coref: CorefReport,
    /// Candidate recall
    pub candidates: CandidatesReport,
    /// Linking quality
    pub resolver: ResolverReport,
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.coref)?;
        writeln!(f, "{}", self.candidates)?;
        write!(f, "{}", self.resolver)
    }
}

struct Scoring {
    coref: CorefScorer,
    candidates: CandidatesScorer,
    resolver: ResolverScorer,
}

/// Runs documents through coreference, candidate generation, and
/// resolution, then writes submission rows.
///
/// Scoring is optional and off the critical path; when ground truth is
/// supplied, each stage's scorer observes the document right after the
/// stage runs.
pub struct Pipeline<W: Write> {
    coref: CascadeCoref,
    generator: Box<dyn CandidateGenerator>,
    resolver: Box<dyn Resolver>,
    writer: OutputWriter<W>,
    scoring: Option<Scoring>,
    documents: usize,
}

impl<W: Write> Pipeline<W> {
    /// Create a pipeline.
    #[must_use]
    pub fn new(
        coref: CascadeCoref,
        generator: Box<dyn CandidateGenerator>,
        resolver: Box<dyn Resolver>,
        writer: OutputWriter<W>,
    ) -> Self {
        Self {
            coref,
            generator,
            resolver,
            writer,
            scoring: None,
            documents: 0,
        }
    }

    /// Enable scoring against ground truth.
    #[must_use]
    pub fn with_scoring(mut self, gt: GroundTruth, metric: CorefMetric) -> Self {
        self.scoring = Some(Scoring {
            coref: CorefScorer::new(&gt, metric),
            candidates: CandidatesScorer::new(gt.clone()),
            resolver: ResolverScorer::new(gt),
        });
        self
    }

    /// Process one document and write its rows.
    pub fn process(&mut self, document: &mut Document) -> Result<()> {
        self.coref.run(document);
        if let Some(scoring) = &mut self.scoring {
            scoring.coref.update(document);
        }
        self.generator.process(document);
        if let Some(scoring) = &mut self.scoring {
            scoring.candidates.update(document);
        }
        self.resolver.resolve(document);
        if let Some(scoring) = &mut self.scoring {
            scoring.resolver.update(document);
        }
        self.writer.write(document)?;
        self.documents += 1;
        log::debug!(
            "processed {}: {} chains",
            document.doc_id,
            document.mention_chains.len()
        );
        Ok(())
    }

    /// Number of documents processed so far.
    #[must_use]
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Flush output and return the accumulated report, if scoring was
    /// enabled.
    pub fn finish(mut self) -> Result<Option<Report>> {
        self.writer.flush()?;
        if let Some(reporter) = self.coref.reporter() {
            log::info!("{reporter}");
        }
        Ok(self.scoring.map(|scoring| Report {
            coref: scoring.coref.report(),
            candidates: scoring.candidates.report(),
            resolver: scoring.resolver.report(),
        }))
    }
}
