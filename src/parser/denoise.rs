//! Layout-artifact removal for raw page text.
//!
//! Each [`Rule`] is a pure line filter (plus the numeric-row merge) and the
//! whole pipeline is idempotent. Lines are never reordered.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::DenoiseSettings;
use crate::metrics::RuleTracker;
use crate::text::WorkingText;
use crate::utils::{compact, is_cjk, is_latin_letter, is_number_token};

static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{3000}\u{00A0}]+").unwrap());
static PAGE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:-\s*\d+\s*-|\d+\s*/\s*\d+|(?i:page)\s*\d+(?:\s*/\s*\d+)?|페이지\s*\d+(?:\s*/\s*\d+)?)$")
        .unwrap()
});
static NUMBER_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?\d+(?:[.,]\d+)?\s*%?(?:\s+[-+]?\d+(?:[.,]\d+)?\s*%?)*$").unwrap()
});
static APPROVAL_CHAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"작\s*성.*검\s*토.*승\s*인").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    CollapseWhitespace,
    DropBlankLines,
    DropSingleLetters,
    DropCjkPairs,
    DropNoiseLines,
    DropApprovalHeaders,
    MergeNumericRows,
    DropStrayNumbers,
}

impl Rule {
    /// The merge runs after every drop rule: a number row attaches to the
    /// nearest surviving line above it.
    pub const PIPELINE: [Rule; 8] = [
        Rule::CollapseWhitespace,
        Rule::DropBlankLines,
        Rule::DropSingleLetters,
        Rule::DropCjkPairs,
        Rule::DropNoiseLines,
        Rule::DropApprovalHeaders,
        Rule::MergeNumericRows,
        Rule::DropStrayNumbers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Rule::CollapseWhitespace => "collapse_whitespace",
            Rule::DropBlankLines => "drop_blank_lines",
            Rule::MergeNumericRows => "merge_numeric_rows",
            Rule::DropSingleLetters => "drop_single_letters",
            Rule::DropCjkPairs => "drop_cjk_pairs",
            Rule::DropNoiseLines => "drop_noise_lines",
            Rule::DropApprovalHeaders => "drop_approval_headers",
            Rule::DropStrayNumbers => "drop_stray_numbers",
        }
    }
}

/// Collapse space runs to one space and trim.
pub fn collapse_spaces(line: &str) -> String {
    SPACE_RUN.replace_all(line, " ").trim().to_string()
}

/// `" [계획: aH, 달성: bH, 진행률: d%]"` for a row of exactly four numbers
/// (planned hours, actual hours, planned %, actual %).
pub fn numeric_row_annotation(line: &str) -> Option<String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 4 || !tokens.iter().all(|t| is_number_token(t)) {
        return None;
    }
    let bare: Vec<&str> = tokens.iter().map(|t| t.trim_end_matches('%')).collect();
    Some(format!(
        " [계획: {}H, 달성: {}H, 진행률: {}%]",
        bare[0], bare[1], bare[3]
    ))
}

pub struct Denoiser {
    allow_list: HashSet<String>,
    noise_tokens: HashSet<String>,
}

impl Denoiser {
    pub fn new(settings: &DenoiseSettings) -> Self {
        Denoiser {
            allow_list: settings.allow_list.iter().cloned().collect(),
            noise_tokens: settings.noise_tokens.iter().map(|t| compact(t)).collect(),
        }
    }

    pub fn denoise(&self, raw: &str) -> String {
        self.denoise_tracked(raw, &mut RuleTracker::new())
    }

    pub fn denoise_tracked(&self, raw: &str, tracker: &mut RuleTracker) -> String {
        let mut text = WorkingText::from_raw(raw);
        for rule in Rule::PIPELINE {
            let before = text.line_count();
            let touched = self.apply(rule, &mut text);
            tracker.record(rule.name(), before, text.line_count(), touched);
        }
        text.into_text()
    }

    /// Run one rule; returns the number of lines it changed or removed.
    pub fn apply(&self, rule: Rule, text: &mut WorkingText) -> usize {
        match rule {
            Rule::CollapseWhitespace => {
                text.map_lines(collapse_spaces) + text.squeeze_blank_runs(3)
            }
            Rule::DropBlankLines => text.remove_where(|l| l.trim().is_empty()).len(),
            Rule::MergeNumericRows => text.fold_into_previous(numeric_row_annotation),
            Rule::DropSingleLetters => text.remove_where(is_single_letter).len(),
            Rule::DropCjkPairs => text.remove_where(|l| self.is_cjk_pair(l)).len(),
            Rule::DropNoiseLines => text.remove_where(|l| self.is_noise(l)).len(),
            Rule::DropApprovalHeaders => text.remove_where(|l| APPROVAL_CHAIN.is_match(l)).len(),
            // number rows with no label above them
            Rule::DropStrayNumbers => text.remove_where(|l| NUMBER_ONLY.is_match(l.trim())).len(),
        }
    }

    fn is_cjk_pair(&self, line: &str) -> bool {
        let line = line.trim();
        line.chars().count() == 2 && line.chars().all(is_cjk) && !self.allow_list.contains(line)
    }

    fn is_noise(&self, line: &str) -> bool {
        let line = line.trim();
        self.noise_tokens.contains(&compact(line))
            || PAGE_NUMBER.is_match(line)
            || (NUMBER_ONLY.is_match(line) && numeric_row_annotation(line).is_none())
    }
}

fn is_single_letter(line: &str) -> bool {
    let mut chars = line.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => is_cjk(c) || is_latin_letter(c),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn denoiser() -> Denoiser {
        Denoiser::new(&DenoiseSettings::default())
    }

    #[test]
    fn allow_list_survives() {
        let out = denoiser().denoise("완료\n금일\n회로 설계");
        assert_eq!(out, "완료\n회로 설계");
    }

    #[test]
    fn merges_numeric_row_into_label() {
        let out = denoiser().denoise("프로젝트 A 진행\n10 10 50 50");
        assert_eq!(out, "프로젝트 A 진행 [계획: 10H, 달성: 10H, 진행률: 50%]");
    }

    #[test]
    fn numeric_row_skips_noise_between_it_and_its_label() {
        let d = denoiser();
        let merged = "1 회로 개발 [계획: 10H, 달성: 10H, 진행률: 50%]";
        for noise in ["결", "- 2 -", "A", "é", "결 재", "Unit"] {
            let raw = format!("1 회로 개발\n{noise}\n10 10 50 50");
            assert_eq!(d.denoise(&raw), merged, "noise line {noise:?}");
        }
    }

    #[test]
    fn number_row_without_label_is_dropped() {
        let d = denoiser();
        assert_eq!(d.denoise("10 10 50 50\n회로 설계"), "회로 설계");
        assert_eq!(d.denoise("결\n- 1 -\n10 10 50 50\n회로 설계"), "회로 설계");
    }

    #[test]
    fn percent_tokens_are_stripped() {
        assert_eq!(
            numeric_row_annotation("8 6.5 100% 80%").as_deref(),
            Some(" [계획: 8H, 달성: 6.5H, 진행률: 80%]")
        );
        assert_eq!(numeric_row_annotation("10 10 50"), None);
        assert_eq!(numeric_row_annotation("10 10 50 A"), None);
    }

    #[test]
    fn drops_stamps_and_page_numbers() {
        let raw = "결\n재\n결 재\n작성 검토 승인\n작  성   검 토   승 인\n- 3 -\n3 / 10\nPage 2\n페이지 4\n75%\nUnit\nChair\nA\nÉ\nＢ\n김\n보드 검증 완료";
        assert_eq!(denoiser().denoise(raw), "보드 검증 완료");
    }

    #[test]
    fn collapses_whitespace_and_blank_lines() {
        let raw = "  회로\u{3000}\u{3000}설계\t검토 \n\n\n\n보드  검증 ";
        assert_eq!(denoiser().denoise(raw), "회로 설계 검토\n보드 검증");
    }

    #[test]
    fn idempotent() {
        let raw = "FW팀 김상일 일자: 2025.11.25\n결 재\n1 회로 개발\n10 10 50 50\n10 8 40 30\n진행\n\n\n\n- 2 -\n목적";
        let d = denoiser();
        let once = d.denoise(raw);
        assert_eq!(d.denoise(&once), once);
        assert_eq!(
            once,
            "FW팀 김상일 일자: 2025.11.25\n1 회로 개발 [계획: 10H, 달성: 10H, 진행률: 50%] [계획: 10H, 달성: 8H, 진행률: 30%]\n진행\n목적"
        );
    }

    #[test]
    fn single_rule_is_addressable() {
        let d = denoiser();
        let mut text = WorkingText::from_raw("a\n\n b");
        assert_eq!(d.apply(Rule::DropBlankLines, &mut text), 1);
        assert_eq!(d.apply(Rule::DropSingleLetters, &mut text), 2);
        assert_eq!(text.line_count(), 0);
    }

    #[test]
    fn tracker_counts_removals() {
        let mut tracker = RuleTracker::new();
        denoiser().denoise_tracked("결\n재\n본문 내용", &mut tracker);
        let noise = tracker.get("drop_single_letters").unwrap();
        assert_eq!(noise.touched, 2);
        assert_eq!(tracker.metrics().len(), Rule::PIPELINE.len());
    }
}
