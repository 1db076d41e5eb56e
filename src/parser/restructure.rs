//! Rewrites denoised text into explicit contributor, section and project markers.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::denoise::numeric_row_annotation;
use super::segment::{contributor_sections, ContributorSection};
use crate::config::StructureSettings;
use crate::error::Result;
use crate::metrics::RuleTracker;
use crate::utils::compact;

static CONTRIBUTOR_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+(\S+)\s+일\s*자\s*:?\s*(\d{4})\s*[./-]\s*(\d{1,2})\s*[./-]\s*(\d{1,2})").unwrap()
});
static SUB_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*\.\s*(\d+)\s*(목\s*적|Action)\s*:?\s*(.*)$").unwrap()
});
// numeric-row annotations the denoiser may already have appended
const ANNOTATIONS: &str = r"(?:\s*\[계획:[^\]]*\])*";

pub const TITLE: &str = "일일업무일지";
pub const TODAY_HEADING: &str = "[금일 업무]";
pub const TOMORROW_HEADING: &str = "[명일 업무]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rewrite {
    MergeNumericRow,
    ContributorHeader,
    DropTitle,
    DropTableHeader,
    SectionCue,
    ProjectStart,
    SubItem,
}

impl Rewrite {
    const ALL: [Rewrite; 7] = [
        Rewrite::MergeNumericRow,
        Rewrite::ContributorHeader,
        Rewrite::DropTitle,
        Rewrite::DropTableHeader,
        Rewrite::SectionCue,
        Rewrite::ProjectStart,
        Rewrite::SubItem,
    ];

    fn name(self) -> &'static str {
        match self {
            Rewrite::MergeNumericRow => "merge_numeric_row",
            Rewrite::ContributorHeader => "contributor_header",
            Rewrite::DropTitle => "drop_title",
            Rewrite::DropTableHeader => "drop_table_header",
            Rewrite::SectionCue => "section_cue",
            Rewrite::ProjectStart => "project_start",
            Rewrite::SubItem => "sub_item",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub text: String,
    pub preamble_span: Range<usize>,
    pub sections: Vec<ContributorSection>,
}

impl Reconstruction {
    /// Text before the first contributor marker.
    pub fn preamble(&self) -> &str {
        &self.text[self.preamble_span.clone()]
    }

    /// Preamble plus every marker and body, in order. Equals `text`.
    pub fn reassemble(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        out.push_str(self.preamble());
        for s in &self.sections {
            out.push_str(&self.text[s.marker_span.clone()]);
            out.push_str(&self.text[s.body_span.clone()]);
        }
        out
    }
}

pub struct Reconstructor {
    project_start: Regex,
    header_terms: Vec<String>,
    header_anchors: Vec<String>,
    today_cues: Vec<String>,
    tomorrow_cues: Vec<String>,
    cue_slack: usize,
}

impl Reconstructor {
    pub fn new(settings: &StructureSettings) -> Result<Self> {
        let keywords = settings
            .project_keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let project_start = Regex::new(&format!(r"^\d+[.)]?\s+\S.*?(?:{keywords}){ANNOTATIONS}$"))?;

        // longest first so the greedy split prefers 세부내용 over 세부
        let mut header_terms: Vec<String> = settings.table_header_terms.iter().map(|t| compact(t)).collect();
        header_terms.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));

        Ok(Reconstructor {
            project_start,
            header_terms,
            header_anchors: settings.table_header_anchors.clone(),
            today_cues: settings.today_cues.iter().map(|c| compact(c)).collect(),
            tomorrow_cues: settings.tomorrow_cues.iter().map(|c| compact(c)).collect(),
            cue_slack: settings.cue_slack,
        })
    }

    pub fn reconstruct(&self, denoised: &str) -> Reconstruction {
        self.reconstruct_tracked(denoised, &mut RuleTracker::new())
    }

    pub fn reconstruct_tracked(&self, denoised: &str, tracker: &mut RuleTracker) -> Reconstruction {
        let mut counts = [0usize; Rewrite::ALL.len()];
        let mut out: Vec<String> = Vec::new();
        let mut contributors = 0usize;
        let input_lines = denoised.lines().count();

        for line in denoised.lines() {
            let (rewrite, emitted) = self.rewrite(line, !out.is_empty());
            if let Some(r) = rewrite {
                counts[r as usize] += 1;
            }
            match emitted {
                Emit::AppendToPrevious(suffix) => {
                    if let Some(prev) = out.last_mut() {
                        prev.push_str(&suffix);
                    }
                }
                Emit::Drop => {}
                Emit::Lines(lines) => {
                    if rewrite == Some(Rewrite::ContributorHeader) {
                        contributors += 1;
                    }
                    out.extend(lines);
                }
            }
        }

        for r in Rewrite::ALL {
            tracker.record(r.name(), input_lines, out.len(), counts[r as usize]);
        }
        let text = out.join("\n");
        let (preamble_span, sections) = contributor_sections(&text);
        debug!(contributors, sections = sections.len(), lines = out.len(), "reconstructed");
        Reconstruction {
            text,
            preamble_span,
            sections,
        }
    }

    fn rewrite(&self, line: &str, has_previous: bool) -> (Option<Rewrite>, Emit) {
        let trimmed = line.trim();
        if has_previous {
            if let Some(suffix) = numeric_row_annotation(trimmed) {
                return (Some(Rewrite::MergeNumericRow), Emit::AppendToPrevious(suffix));
            }
        }
        if let Some(marker) = contributor_marker(trimmed) {
            return (Some(Rewrite::ContributorHeader), Emit::Lines(vec![marker]));
        }
        let squeezed = compact(trimmed);
        if squeezed == TITLE {
            return (Some(Rewrite::DropTitle), Emit::Drop);
        }
        if self.is_table_header(&squeezed) {
            return (Some(Rewrite::DropTableHeader), Emit::Drop);
        }
        if let Some(heading) = self.section_heading(&squeezed) {
            return (
                Some(Rewrite::SectionCue),
                Emit::Lines(vec![String::new(), heading.to_string()]),
            );
        }
        if self.project_start.is_match(trimmed) {
            return (
                Some(Rewrite::ProjectStart),
                Emit::Lines(vec![format!("• 프로젝트: {trimmed}")]),
            );
        }
        if let Some(item) = sub_item(trimmed) {
            return (Some(Rewrite::SubItem), Emit::Lines(vec![item]));
        }
        (None, Emit::Lines(vec![line.to_string()]))
    }

    /// A line made only of column terms, one of them an anchor.
    fn is_table_header(&self, squeezed: &str) -> bool {
        if squeezed.is_empty() || !self.header_anchors.iter().any(|a| squeezed.contains(a.as_str())) {
            return false;
        }
        let mut rest = squeezed.trim_start_matches(is_header_punct);
        while !rest.is_empty() {
            match self.header_terms.iter().find(|t| rest.starts_with(t.as_str())) {
                Some(term) => rest = rest[term.len()..].trim_start_matches(is_header_punct),
                None => return false,
            }
        }
        true
    }

    fn section_heading(&self, squeezed: &str) -> Option<&'static str> {
        let len = squeezed.chars().count();
        let hit = |cues: &[String]| {
            cues.iter()
                .any(|c| squeezed.contains(c.as_str()) && len <= c.chars().count() + self.cue_slack)
        };
        if hit(&self.today_cues) {
            Some(TODAY_HEADING)
        } else if hit(&self.tomorrow_cues) {
            Some(TOMORROW_HEADING)
        } else {
            None
        }
    }
}

enum Emit {
    AppendToPrevious(String),
    Drop,
    Lines(Vec<String>),
}

fn is_header_punct(c: char) -> bool {
    matches!(c, '|' | '/' | '(' | ')' | '[' | ']' | '·' | ',' | ':' | '-' | '%')
}

/// `FW팀 김상일 일자: 2025.11.25` → `==== 김상일 (2025.11.25) ====`.
pub fn contributor_marker(line: &str) -> Option<String> {
    let c = CONTRIBUTOR_HEADER.captures(line)?;
    let month: u32 = c[4].parse().ok()?;
    let day: u32 = c[5].parse().ok()?;
    Some(format!("==== {} ({}.{:02}.{:02}) ====", &c[2], &c[3], month, day))
}

fn sub_item(line: &str) -> Option<String> {
    let c = SUB_ITEM.captures(line)?;
    let label = compact(&c[3]);
    let rest = c[4].split_whitespace().collect::<Vec<_>>().join(" ");
    Some(format!("  {}.{} {}: {}", &c[1], &c[2], label, rest).trim_end().to_string())
}
