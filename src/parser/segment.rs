//! Splits a concatenation of wrapped documents into per-contributor sections.
//!
//! Three strategies, tried in order of decreasing specificity:
//!
//! 1. wrapper lines whose path names a team, a person and the daily-log suffix
//! 2. every `=== 파일: … ===` wrapper line, names recovered best-effort
//! 3. reconstructed `==== name (date) ====` markers, else the whole input
//!
//! Sections keep byte spans into the source so the split is lossless.

use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SegmentSettings;
use crate::dates;
use crate::error::Result;

static WRAPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^===[ \t]*파일[ \t]*:[ \t]*(.+?)[ \t]*===[ \t]*\r?$").unwrap());
static CONTRIBUTOR_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^={4,}[ \t]*(.+?)[ \t]*\((\d{4}\.\d{1,2}\.\d{1,2})\)[ \t]*={4,}[ \t]*\r?$").unwrap()
});

const DAILY_LOG_SUFFIX: &str = r"일[ _]*일[ _]*업[ _]*무[ _]*일[ _]*지";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributorSection {
    pub name: String,
    pub work_date: Option<NaiveDate>,
    /// Trimmed body text; always a substring of `source[body_span]`.
    pub body: String,
    #[serde(skip)]
    pub marker_span: Range<usize>,
    #[serde(skip)]
    pub body_span: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Primary,
    WrapperFallback,
    MarkerFallback,
    WholeInput,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::Primary => "primary",
            Strategy::WrapperFallback => "wrapper_fallback",
            Strategy::MarkerFallback => "marker_fallback",
            Strategy::WholeInput => "whole_input",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub strategy: Strategy,
    pub preamble_span: Range<usize>,
    pub sections: Vec<ContributorSection>,
}

impl Segmentation {
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.sections
            .iter()
            .map(|s| (s.name.as_str(), s.body.as_str()))
            .collect()
    }

    /// Preamble plus every marker and body, in order. Equals the segmented source.
    pub fn reassemble(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        out.push_str(&source[self.preamble_span.clone()]);
        for s in &self.sections {
            out.push_str(&source[s.marker_span.clone()]);
            out.push_str(&source[s.body_span.clone()]);
        }
        out
    }
}

struct Boundary {
    span: Range<usize>,
    name: Option<String>,
    date: Option<NaiveDate>,
}

/// Cut `text` at `boundaries` (sorted, non-overlapping).
fn cut(text: &str, boundaries: Vec<Boundary>) -> (Range<usize>, Vec<(Boundary, Range<usize>)>) {
    let preamble_end = boundaries.first().map(|b| b.span.start).unwrap_or(text.len());
    let ends: Vec<usize> = boundaries
        .iter()
        .skip(1)
        .map(|b| b.span.start)
        .chain(std::iter::once(text.len()))
        .collect();
    let pieces = boundaries
        .into_iter()
        .zip(ends)
        .map(|(b, end)| {
            let body = b.span.end..end;
            (b, body)
        })
        .collect();
    (0..preamble_end, pieces)
}

fn contributor_boundaries(text: &str) -> Vec<Boundary> {
    CONTRIBUTOR_MARKER
        .captures_iter(text)
        .filter_map(|c| {
            let whole = c.get(0)?;
            Some(Boundary {
                span: whole.start()..whole.end(),
                name: Some(c[1].trim().to_string()),
                date: dates::parse_dotted(&c[2]),
            })
        })
        .collect()
}

/// Sections delimited by `==== name (date) ====` markers, plus the preamble span.
pub fn contributor_sections(text: &str) -> (Range<usize>, Vec<ContributorSection>) {
    let (preamble, pieces) = cut(text, contributor_boundaries(text));
    let sections = pieces
        .into_iter()
        .map(|(b, body)| ContributorSection {
            name: b.name.unwrap_or_default(),
            work_date: b.date,
            body: text[body.clone()].trim().to_string(),
            marker_span: b.span,
            body_span: body,
        })
        .collect();
    (preamble, sections)
}

pub struct Segmenter {
    primary: Regex,
    team_name: Regex,
    settings: SegmentSettings,
}

impl Segmenter {
    pub fn new(settings: &SegmentSettings) -> Result<Self> {
        let team = &settings.team_pattern;
        let primary = Regex::new(&format!(
            r"(?:{team})[ _]*([^\s_/\\]+?)[ _]*{DAILY_LOG_SUFFIX}"
        ))?;
        let team_name = Regex::new(&format!(r"(?:{team})[ _]*([가-힣]{{2,5}})"))?;
        Ok(Segmenter {
            primary,
            team_name,
            settings: settings.clone(),
        })
    }

    pub fn segment(&self, text: &str) -> Segmentation {
        let wrappers: Vec<(Range<usize>, &str)> = WRAPPER
            .captures_iter(text)
            .filter_map(|c| {
                let whole = c.get(0)?;
                Some((whole.start()..whole.end(), c.get(1)?.as_str()))
            })
            .collect();

        let primary: Vec<Boundary> = wrappers
            .iter()
            .filter_map(|(span, path)| {
                let name = self.primary.captures(path)?.get(1)?.as_str().to_string();
                Some(Boundary {
                    span: span.clone(),
                    name: Some(name),
                    date: None,
                })
            })
            .collect();

        let (strategy, boundaries) = if !primary.is_empty() {
            (Strategy::Primary, primary)
        } else if !wrappers.is_empty() {
            let generic = wrappers
                .iter()
                .map(|(span, path)| Boundary {
                    span: span.clone(),
                    name: self.name_from_path(path),
                    date: None,
                })
                .collect();
            (Strategy::WrapperFallback, generic)
        } else {
            let markers = contributor_boundaries(text);
            if markers.is_empty() {
                return self.whole_input(text);
            }
            (Strategy::MarkerFallback, markers)
        };

        let (preamble_span, pieces) = cut(text, boundaries);
        let sections: Vec<ContributorSection> = pieces
            .into_iter()
            .enumerate()
            .map(|(i, (b, body_span))| {
                let raw_body = &text[body_span.clone()];
                let path = &text[b.span.clone()];
                let embedded = contributor_boundaries(raw_body).into_iter().next();
                let name = b
                    .name
                    .or_else(|| embedded.as_ref().and_then(|m| m.name.clone()))
                    .unwrap_or_else(|| {
                        let placeholder = self.settings.placeholder_name(i + 1);
                        warn!(index = i + 1, name = %placeholder, "no contributor name found, using placeholder");
                        placeholder
                    });
                let work_date = b
                    .date
                    .or_else(|| embedded.as_ref().and_then(|m| m.date))
                    .or_else(|| dates::find_date(path));
                debug!(index = i + 1, name = %name, bytes = raw_body.len(), "contributor section");
                ContributorSection {
                    name,
                    work_date,
                    body: raw_body.trim().to_string(),
                    marker_span: b.span,
                    body_span,
                }
            })
            .collect();

        if strategy == Strategy::Primary {
            info!(strategy = %strategy, sections = sections.len(), "segmented input");
        } else {
            warn!(strategy = %strategy, sections = sections.len(), "no named wrappers, segmented by fallback");
        }
        Segmentation {
            strategy,
            preamble_span,
            sections,
        }
    }

    fn name_from_path(&self, path: &str) -> Option<String> {
        self.team_name
            .captures_iter(path)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .find(|name| !name.starts_with("일일"))
            .map(str::to_string)
    }

    fn whole_input(&self, text: &str) -> Segmentation {
        let sections = if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![ContributorSection {
                name: self.settings.placeholder_name(1),
                work_date: None,
                body: text.trim().to_string(),
                marker_span: 0..0,
                body_span: 0..text.len(),
            }]
        };
        if !sections.is_empty() {
            warn!(strategy = %Strategy::WholeInput, "no boundaries found, input kept as one section");
        }
        Segmentation {
            strategy: Strategy::WholeInput,
            preamble_span: 0..0,
            sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::count_warnings;
    use pretty_assertions::assert_eq;

    fn segmenter() -> Segmenter {
        Segmenter::new(&SegmentSettings::default()).unwrap()
    }

    fn assert_lossless(text: &str, seg: &Segmentation) {
        assert_eq!(seg.reassemble(text), text);
        for s in &seg.sections {
            assert!(text[s.body_span.clone()].contains(&s.body));
            assert!(text.contains(&s.body));
        }
        for pair in seg.sections.windows(2) {
            assert!(pair[0].body_span.end <= pair[1].marker_span.start);
        }
    }

    #[test]
    fn primary_uses_named_wrappers() {
        let text = "=== 파일: /logs/FW팀_김상일_일일업무일지_251125.pdf ===\n회로 설계\n\n=== 파일: /logs/FW팀 전상민 일일업무 일지.docx ===\n보드 검증";
        let (seg, warnings) = count_warnings(|| segmenter().segment(text));
        assert_eq!(warnings, 0);
        assert_eq!(seg.strategy, Strategy::Primary);
        assert_eq!(seg.pairs(), vec![("김상일", "회로 설계"), ("전상민", "보드 검증")]);
        assert_eq!(seg.sections[0].work_date, NaiveDate::from_ymd_opt(2025, 11, 25));
        assert_lossless(text, &seg);

        let text = "=== 파일: FW팀 김상일 일일업무일지.pdf ===\nA\n\n=== 파일: FW팀_전상민_일일업무_일지.docx ===\nB";
        let seg = segmenter().segment(text);
        assert_eq!(seg.strategy, Strategy::Primary);
        assert_eq!(seg.pairs(), vec![("김상일", "A"), ("전상민", "B")]);
        assert_lossless(text, &seg);
    }

    #[test]
    fn primary_swallows_unnamed_wrappers() {
        let text = "머리말\n=== 파일: FW팀_김상일_일일업무일지.pdf ===\nA 업무\n=== 파일: 첨부.pdf ===\nB 업무";
        let seg = segmenter().segment(text);
        assert_eq!(seg.strategy, Strategy::Primary);
        assert_eq!(seg.sections.len(), 1);
        assert!(seg.sections[0].body.contains("B 업무"));
        assert_eq!(&text[seg.preamble_span.clone()], "머리말\n");
        assert_lossless(text, &seg);
    }

    #[test]
    fn generic_wrappers_fall_back_to_positions() {
        let text = "=== 파일: scan_001.pdf ===\n회로 설계\n\n=== 파일: scan_002.pdf ===\n보드 검증";
        let (seg, warnings) = count_warnings(|| segmenter().segment(text));
        // one per placeholder, one for the strategy
        assert_eq!(warnings, 3);
        assert_eq!(seg.strategy, Strategy::WrapperFallback);
        assert_eq!(seg.pairs(), vec![("팀원1", "회로 설계"), ("팀원2", "보드 검증")]);
        assert_lossless(text, &seg);
    }

    #[test]
    fn wrapper_fallback_recovers_names() {
        let text = "=== 파일: HW팀_박지훈.pdf ===\n업무 A\n=== 파일: scan.pdf ===\n==== 이수진 (2025.11.25) ====\n업무 B";
        let seg = segmenter().segment(text);
        assert_eq!(seg.strategy, Strategy::WrapperFallback);
        assert_eq!(seg.sections[0].name, "박지훈");
        assert_eq!(seg.sections[1].name, "이수진");
        assert_eq!(seg.sections[1].work_date, NaiveDate::from_ymd_opt(2025, 11, 25));
        assert_lossless(text, &seg);
    }

    #[test]
    fn markers_without_wrappers() {
        let text = "서두\n==== 김종민 (2025.11.25) ====\n업무 A\n==== 전상민 (2025.11.25) ====\n업무 B\n";
        let seg = segmenter().segment(text);
        assert_eq!(seg.strategy, Strategy::MarkerFallback);
        assert_eq!(seg.pairs(), vec![("김종민", "업무 A"), ("전상민", "업무 B")]);
        assert_lossless(text, &seg);
    }

    #[test]
    fn whole_input_is_one_section() {
        let text = "\n업무 내용만 있음\n";
        let (seg, warnings) = count_warnings(|| segmenter().segment(text));
        assert_eq!(warnings, 1);
        assert_eq!(seg.strategy, Strategy::WholeInput);
        assert_eq!(seg.pairs(), vec![("팀원1", "업무 내용만 있음")]);
        assert_lossless(text, &seg);

        assert!(segmenter().segment("  \n").sections.is_empty());
    }

    #[test]
    fn bad_team_pattern_is_config_error() {
        let settings = SegmentSettings {
            team_pattern: "(".to_string(),
            ..SegmentSettings::default()
        };
        assert!(Segmenter::new(&settings).is_err());
    }
}
