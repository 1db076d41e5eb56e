//! Documents → processed texts → contributors → task records.

use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::Settings;
use crate::document::{concat_sources, load_document};
use crate::error::IngestError;
use crate::metrics::RuleTracker;
use crate::normalize::{assemble_normalized, normalize_sections, NormalizedContributor, Normalizer};
use crate::parser::segment::Segmentation;
use crate::parser::tasks::TaskExtraction;
use crate::parser::{ProcessedDocument, TextPipeline};

#[derive(Debug)]
pub enum DocumentOutcome {
    Processed(ProcessedDocument),
    Failed { path: PathBuf, error: IngestError },
}

impl DocumentOutcome {
    pub fn path(&self) -> &Path {
        match self {
            DocumentOutcome::Processed(doc) => &doc.path,
            DocumentOutcome::Failed { path, .. } => path,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, DocumentOutcome::Processed(_))
    }
}

/// Extract, denoise and reconstruct every document in parallel. Output order
/// matches `paths`; a failed document never stops the others.
pub fn process_documents(
    paths: &[PathBuf],
    settings: &Settings,
    text: &TextPipeline,
    progress: Option<&ProgressBar>,
) -> Vec<DocumentOutcome> {
    let outcomes: Vec<DocumentOutcome> = paths
        .par_iter()
        .map(|path| {
            let outcome = match load_document(path, &settings.extraction) {
                Ok(doc) => DocumentOutcome::Processed(text.process_document(&doc)),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "document skipped");
                    DocumentOutcome::Failed {
                        path: path.clone(),
                        error,
                    }
                }
            };
            if let Some(pb) = progress {
                pb.inc(1);
            }
            outcome
        })
        .collect();
    let ok = outcomes.iter().filter(|o| o.is_ok()).count();
    info!(documents = outcomes.len(), ok, failed = outcomes.len() - ok, "documents processed");
    outcomes
}

/// Wrapped concatenation of every successfully processed document.
pub fn combine(outcomes: &[DocumentOutcome]) -> String {
    concat_sources(outcomes.iter().filter_map(|o| match o {
        DocumentOutcome::Processed(doc) => {
            Some((doc.path.as_path(), doc.reconstruction.text.as_str()))
        }
        DocumentOutcome::Failed { .. } => None,
    }))
}

#[derive(Debug)]
pub struct RunReport {
    pub outcomes: Vec<DocumentOutcome>,
    pub combined: String,
    pub segmentation: Segmentation,
    pub contributors: Vec<NormalizedContributor>,
    pub normalized: String,
    pub tasks: TaskExtraction,
    pub rules: RuleTracker,
}

/// The whole pipeline over already-processed documents.
pub fn finish_run<N: Normalizer + ?Sized>(
    outcomes: Vec<DocumentOutcome>,
    text: &TextPipeline,
    normalizer: &N,
) -> RunReport {
    let mut rules = RuleTracker::new();
    for o in &outcomes {
        if let DocumentOutcome::Processed(doc) = o {
            rules.merge(&doc.rules);
        }
    }
    let combined = combine(&outcomes);
    let segmentation = text.segmenter.segment(&combined);
    let contributors = normalize_sections(normalizer, &segmentation.sections);
    let normalized = assemble_normalized(&contributors);
    let tasks = text.tasks.extract(&normalized);
    RunReport {
        outcomes,
        combined,
        segmentation,
        contributors,
        normalized,
        tasks,
        rules,
    }
}

pub fn run<N: Normalizer + ?Sized>(
    paths: &[PathBuf],
    settings: &Settings,
    normalizer: &N,
    progress: Option<&ProgressBar>,
) -> crate::error::Result<RunReport> {
    let text = TextPipeline::new(settings)?;
    let outcomes = process_documents(paths, settings, &text, progress);
    Ok(finish_run(outcomes, &text, normalizer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::PassthroughNormalizer;
    use crate::parser::segment::Strategy;

    #[test]
    fn failures_are_reported_per_document() {
        let settings = Settings::default();
        let paths = vec![PathBuf::from("/nonexistent/a.pdf"), PathBuf::from("notes.txt")];
        let report = run(&paths, &settings, &PassthroughNormalizer, None).unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|o| !o.is_ok()));
        assert!(matches!(
            &report.outcomes[1],
            DocumentOutcome::Failed { error: IngestError::Unsupported { .. }, .. }
        ));
        assert_eq!(report.outcomes[0].path(), Path::new("/nonexistent/a.pdf"));
        assert!(report.combined.is_empty());
        assert_eq!(report.segmentation.strategy, Strategy::WholeInput);
        assert!(report.tasks.records.is_empty());
    }
}
