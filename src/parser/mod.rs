pub mod denoise;
pub mod restructure;
pub mod segment;
pub mod tasks;

use std::path::PathBuf;

use crate::config::Settings;
use crate::document::ExtractedDocument;
use crate::error::Result;
use crate::metrics::RuleTracker;
use denoise::Denoiser;
use restructure::{Reconstruction, Reconstructor};
use segment::Segmenter;
use tasks::TaskExtractor;

/// One document after denoising and reconstruction.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub path: PathBuf,
    pub pages: usize,
    pub denoised: String,
    pub reconstruction: Reconstruction,
    pub rules: RuleTracker,
}

/// Every text stage, built once from [`Settings`] and shared across threads.
pub struct TextPipeline {
    pub denoiser: Denoiser,
    pub reconstructor: Reconstructor,
    pub segmenter: Segmenter,
    pub tasks: TaskExtractor,
}

impl TextPipeline {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(TextPipeline {
            denoiser: Denoiser::new(&settings.denoise),
            reconstructor: Reconstructor::new(&settings.structure)?,
            segmenter: Segmenter::new(&settings.segment)?,
            tasks: TaskExtractor::new(&settings.tasks),
        })
    }

    /// Two passes per page set: denoise → reconstruct.
    pub fn process_document(&self, doc: &ExtractedDocument) -> ProcessedDocument {
        let mut rules = RuleTracker::new();
        let denoised = self.denoiser.denoise_tracked(&doc.text(), &mut rules);
        let reconstruction = self.reconstructor.reconstruct_tracked(&denoised, &mut rules);
        ProcessedDocument {
            path: doc.path.clone(),
            pages: doc.pages.len(),
            denoised,
            reconstruction,
            rules,
        }
    }
}
