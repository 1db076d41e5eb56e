//! Daily work-log ingestion: page text extraction, layout-noise removal,
//! structure recovery, per-contributor segmentation and task records.

pub mod config;
pub mod dates;
pub mod db;
pub mod document;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod text;
#[cfg(test)]
mod testing;
pub mod utils;

pub use config::Settings;
pub use error::{IngestError, Result};
