//! Per-contributor normalization seam.
//!
//! The real normalizer (a language model behind HTTP) lives outside this
//! crate; the pipeline only needs text in, text out, once per contributor.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::dates;
use crate::parser::segment::ContributorSection;
use crate::parser::tasks::FAILED_BODY;

pub const ROSTER_HEADER: &str = "##### 팀원 목록 #####";

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("normalizer unavailable: {0}")]
    Unavailable(String),
    #[error("normalizer rejected section of {name}: {message}")]
    Rejected { name: String, message: String },
    #[error("normalizer returned nothing for {0}")]
    Empty(String),
}

pub trait Normalizer: Sync {
    fn normalize(&self, name: &str, body: &str) -> Result<String, NormalizeError>;
}

/// Hands the reconstructed body through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughNormalizer;

impl Normalizer for PassthroughNormalizer {
    fn normalize(&self, name: &str, body: &str) -> Result<String, NormalizeError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(NormalizeError::Empty(name.to_string()));
        }
        Ok(body.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedContributor {
    pub name: String,
    pub work_date: Option<NaiveDate>,
    pub text: String,
    pub ok: bool,
}

impl NormalizedContributor {
    pub fn header(&self) -> String {
        match (self.ok, self.work_date) {
            (true, Some(date)) => format!("##### {} ({}) #####", self.name, dates::format_dotted(date)),
            _ => format!("##### {} #####", self.name),
        }
    }
}

pub fn normalize_sections<N: Normalizer + ?Sized>(
    normalizer: &N,
    sections: &[ContributorSection],
) -> Vec<NormalizedContributor> {
    let out: Vec<NormalizedContributor> = sections
        .iter()
        .map(|s| match normalizer.normalize(&s.name, &s.body) {
            Ok(text) => NormalizedContributor {
                name: s.name.clone(),
                work_date: s.work_date,
                text,
                ok: true,
            },
            Err(e) => {
                warn!(member = %s.name, error = %e, "normalization failed, emitting placeholder");
                NormalizedContributor {
                    name: s.name.clone(),
                    work_date: s.work_date,
                    text: FAILED_BODY.to_string(),
                    ok: false,
                }
            }
        })
        .collect();
    let failed = out.iter().filter(|c| !c.ok).count();
    info!(contributors = out.len(), failed, "normalized");
    out
}

/// Roster block followed by one `#####` section per contributor.
pub fn assemble_normalized(contributors: &[NormalizedContributor]) -> String {
    let mut out = String::new();
    if !contributors.is_empty() {
        out.push_str(ROSTER_HEADER);
        out.push('\n');
        let names: Vec<&str> = contributors.iter().map(|c| c.name.as_str()).collect();
        out.push_str(&names.join(", "));
        out.push_str("\n\n");
    }
    for c in contributors {
        out.push_str(&c.header());
        out.push('\n');
        out.push_str(c.text.trim());
        out.push_str("\n\n");
    }
    out.trim_end().to_string()
}
