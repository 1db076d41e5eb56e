//! Page text assembly from positioned spans.
//!
//! A [`PageSource`] hands out the spans of one page in content-stream order;
//! the three [`ExtractionMode`]s differ only in how those spans are ordered
//! and joined.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ExtractionSettings;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Content-stream (reading) order.
    Simple,
    /// Geometric blocks sorted top-to-bottom, left-to-right. Suits tabular work logs.
    #[default]
    Smart,
    /// Row-wise lines across the whole page, spans joined by x position.
    Layout,
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtractionMode::Simple => "simple",
            ExtractionMode::Smart => "smart",
            ExtractionMode::Layout => "layout",
        };
        f.write_str(s)
    }
}

impl FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(ExtractionMode::Simple),
            "smart" => Ok(ExtractionMode::Smart),
            "layout" => Ok(ExtractionMode::Layout),
            other => Err(format!("unknown extraction mode: {other}")),
        }
    }
}

/// A run of text drawn at one position. Coordinates are PDF user space
/// (origin bottom-left, y grows upward); `y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
    pub text: String,
}

impl TextSpan {
    fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// An opened, paginated document.
pub trait PageSource {
    fn page_count(&self) -> u32;

    /// Spans of page `page_index` (1-based) in content-stream order.
    fn text_spans(&self, page_index: u32) -> Result<Vec<TextSpan>>;
}

/// Extract the text of one page. Failures are logged and yield an empty page.
pub fn extract<S: PageSource + ?Sized>(
    source: &S,
    page_index: u32,
    mode: ExtractionMode,
    params: &ExtractionSettings,
) -> String {
    let spans = match source.text_spans(page_index) {
        Ok(spans) => spans,
        Err(e) => {
            warn!(page = page_index, error = %e, "page extraction failed, recording empty page");
            return String::new();
        }
    };
    if spans.iter().all(|s| s.text.trim().is_empty()) {
        return String::new();
    }
    match mode {
        ExtractionMode::Simple => simple_text(&spans, params),
        ExtractionMode::Smart => smart_text(&spans, params),
        ExtractionMode::Layout => layout_text(&spans, params),
    }
}

#[derive(Debug)]
struct Line<'a> {
    y: f32,
    font_size: f32,
    x_min: f32,
    x_max: f32,
    spans: Vec<&'a TextSpan>,
}

impl<'a> Line<'a> {
    fn new(span: &'a TextSpan) -> Self {
        Line {
            y: span.y,
            font_size: span.font_size.max(1.0),
            x_min: span.x,
            x_max: span.right(),
            spans: vec![span],
        }
    }

    fn accepts(&self, span: &TextSpan, tolerance: f32) -> bool {
        (self.y - span.y).abs() <= tolerance * self.font_size.max(span.font_size)
    }

    fn push(&mut self, span: &'a TextSpan) {
        self.font_size = self.font_size.max(span.font_size);
        self.x_min = self.x_min.min(span.x);
        self.x_max = self.x_max.max(span.right());
        self.spans.push(span);
    }

    fn text(&self, space_gap_factor: f32) -> String {
        let mut spans = self.spans.clone();
        spans.sort_by(|a, b| a.x.total_cmp(&b.x));
        join_spans(&spans, space_gap_factor)
    }
}

fn join_spans(spans: &[&TextSpan], space_gap_factor: f32) -> String {
    let mut out = String::new();
    let mut prev: Option<&TextSpan> = None;
    for span in spans {
        if let Some(p) = prev {
            let gap = span.x - p.right();
            let threshold = space_gap_factor * p.font_size.max(span.font_size).max(1.0);
            let has_space = out.ends_with(' ') || span.text.starts_with(' ');
            if gap > threshold && !has_space {
                out.push(' ');
            }
        }
        out.push_str(&span.text);
        prev = Some(span);
    }
    out.trim().to_string()
}

/// Group spans into lines, top of page first.
fn group_lines<'a>(spans: &'a [TextSpan], tolerance: f32) -> Vec<Line<'a>> {
    let mut sorted: Vec<&TextSpan> = spans.iter().filter(|s| !s.text.is_empty()).collect();
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<Line> = Vec::new();
    for span in sorted {
        match lines.last_mut() {
            Some(line) if line.accepts(span, tolerance) => line.push(span),
            _ => lines.push(Line::new(span)),
        }
    }
    lines
}

fn simple_text(spans: &[TextSpan], params: &ExtractionSettings) -> String {
    let mut lines: Vec<Vec<&TextSpan>> = Vec::new();
    for span in spans.iter().filter(|s| !s.text.is_empty()) {
        let same_line = lines.last().and_then(|l| l.last()).is_some_and(|prev: &&TextSpan| {
            (prev.y - span.y).abs() <= params.line_tolerance * prev.font_size.max(1.0)
        });
        if same_line {
            if let Some(line) = lines.last_mut() {
                line.push(span);
            }
        } else {
            lines.push(vec![span]);
        }
    }
    lines
        .iter()
        .map(|l| join_spans(l, params.space_gap_factor))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn layout_text(spans: &[TextSpan], params: &ExtractionSettings) -> String {
    group_lines(spans, params.line_tolerance)
        .iter()
        .map(|l| l.text(params.space_gap_factor))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug)]
struct Block<'a> {
    top: f32,
    bottom: f32,
    x_min: f32,
    x_max: f32,
    lines: Vec<Line<'a>>,
}

impl<'a> Block<'a> {
    fn continues_with(&self, line: &Line, gap_factor: f32) -> bool {
        let gap = self.bottom - line.y;
        let slack = line.font_size;
        gap >= 0.0
            && gap <= gap_factor * line.font_size
            && line.x_min <= self.x_max + slack
            && line.x_max >= self.x_min - slack
    }
}

fn smart_text(spans: &[TextSpan], params: &ExtractionSettings) -> String {
    let lines = group_lines(spans, params.line_tolerance);

    // Cells on one table row share a baseline but not a column; split them
    // into separate line fragments before building blocks.
    let mut fragments: Vec<Line> = Vec::new();
    for line in lines {
        fragments.extend(split_columns(line, params.block_gap_factor));
    }

    let mut blocks: Vec<Block> = Vec::new();
    for line in fragments {
        let target = blocks
            .iter_mut()
            .rev()
            .find(|b| b.continues_with(&line, params.block_gap_factor));
        match target {
            Some(block) => {
                block.bottom = line.y;
                block.x_min = block.x_min.min(line.x_min);
                block.x_max = block.x_max.max(line.x_max);
                block.lines.push(line);
            }
            None => blocks.push(Block {
                top: line.y,
                bottom: line.y,
                x_min: line.x_min,
                x_max: line.x_max,
                lines: vec![line],
            }),
        }
    }

    blocks.sort_by(|a, b| b.top.total_cmp(&a.top).then(a.x_min.total_cmp(&b.x_min)));
    blocks
        .iter()
        .map(|b| {
            b.lines
                .iter()
                .map(|l| l.text(params.space_gap_factor))
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a line wherever two neighbouring spans are further apart than a column gap.
fn split_columns(line: Line<'_>, gap_factor: f32) -> Vec<Line<'_>> {
    let mut spans = line.spans;
    spans.sort_by(|a, b| a.x.total_cmp(&b.x));

    let mut out: Vec<Line> = Vec::new();
    for span in spans {
        match out.last_mut() {
            Some(current) if span.x - current.x_max <= gap_factor * current.font_size => {
                current.push(span)
            }
            _ => {
                let mut fragment = Line::new(span);
                fragment.y = line.y;
                out.push(fragment);
            }
        }
    }
    out
}
