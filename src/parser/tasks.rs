//! Task records from contributor-normalized text.
//!
//! Expected shape, every part optional:
//!
//! ```text
//! ##### 팀원 목록 #####
//! 김종민, 전상민
//!
//! ##### 김종민 (2025.11.25) #####
//! [프로젝트 대분류: bright Simple]
//! 내용 설명
//! 진행률: 계획 90% / 달성 85%
//! (완료)
//! ```
//!
//! Pattern misses degrade to coarser records; nothing here fails.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TaskSettings;
use crate::dates;
use crate::utils::{compact, truncate_chars};

static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*#{5,}[ \t]*(.+?)[ \t]*(?:\(([^()\n]*)\))?[ \t]*#{5,}[ \t]*\r?$").unwrap()
});
static ROSTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)#{5,}\s*팀원\s*목록\s*#{5,}[ \t]*\r?\n(.+?)(?:\n\s*\n|#{5,}|\z)").unwrap()
});
static PROJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[프로젝트 대분류:\s*(.+?)\]").unwrap());
static PROGRESS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"진행률:.*?달성\s*(\d+)%").unwrap());
static STATUS_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((완료|진행중|대기|예정)\)").unwrap());
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

const ROSTER_TITLE: &str = "팀원목록";
pub const FAILED_BODY: &str = "(정리 실패)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "완료")]
    Done,
    #[default]
    #[serde(rename = "진행중")]
    InProgress,
    #[serde(rename = "대기")]
    Pending,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Done => "완료",
            TaskStatus::InProgress => "진행중",
            TaskStatus::Pending => "대기",
        }
    }

    /// Explicit `(완료)`-style tag first, then keywords anywhere in the block.
    pub fn infer(block: &str) -> Self {
        if let Some(status) = STATUS_TAG
            .captures(block)
            .and_then(|c| c[1].parse::<TaskStatus>().ok())
        {
            return status;
        }
        if block.contains("완료") {
            TaskStatus::Done
        } else if block.contains("예정") || block.contains("대기") {
            TaskStatus::Pending
        } else {
            TaskStatus::InProgress
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "완료" => Ok(TaskStatus::Done),
            "진행중" => Ok(TaskStatus::InProgress),
            "대기" | "예정" => Ok(TaskStatus::Pending),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub member_name: String,
    pub work_date: NaiveDate,
    pub project_name: Option<String>,
    pub content: String,
    pub progress_percent: u8,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectBlock {
    pub project_name: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberSection {
    pub name: String,
    pub work_date: NaiveDate,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskExtraction {
    pub roster: Vec<String>,
    pub records: Vec<TaskRecord>,
}

pub struct TaskExtractor {
    settings: TaskSettings,
}

impl TaskExtractor {
    pub fn new(settings: &TaskSettings) -> Self {
        TaskExtractor {
            settings: settings.clone(),
        }
    }

    pub fn extract(&self, text: &str) -> TaskExtraction {
        self.extract_on(text, dates::today())
    }

    /// As [`extract`](Self::extract), with `today` standing in for unparseable dates.
    pub fn extract_on(&self, text: &str, today: NaiveDate) -> TaskExtraction {
        if text.trim().is_empty() {
            return TaskExtraction::default();
        }
        let sections = split_sections(text, today);
        let roster = roster(text).unwrap_or_else(|| {
            sections.iter().map(|s| s.name.clone()).unique().collect()
        });
        debug!(members = ?roster, "roster");

        let records: Vec<TaskRecord> = sections
            .iter()
            .flat_map(|section| self.section_records(section))
            .collect();
        info!(sections = sections.len(), records = records.len(), "tasks extracted");
        TaskExtraction { roster, records }
    }

    fn section_records(&self, section: &MemberSection) -> Vec<TaskRecord> {
        let blocks = split_projects(&section.body);
        let unmarked = blocks.len() == 1 && blocks[0].project_name.is_none();
        let limit = if unmarked {
            self.settings.section_content_limit
        } else {
            self.settings.block_content_limit
        };

        let mut records: Vec<TaskRecord> = blocks
            .iter()
            .filter_map(|block| {
                let content = task_content(&block.body, limit);
                if content.is_empty() {
                    return None;
                }
                Some(TaskRecord {
                    member_name: section.name.clone(),
                    work_date: section.work_date,
                    project_name: block.project_name.clone(),
                    content,
                    progress_percent: progress(&block.body),
                    status: TaskStatus::infer(&block.body),
                })
            })
            .collect();

        if records.is_empty() && !section.body.trim().is_empty() {
            warn!(member = %section.name, "no project records, keeping whole section");
            records.push(TaskRecord {
                member_name: section.name.clone(),
                work_date: section.work_date,
                project_name: None,
                content: truncate_chars(section.body.trim(), self.settings.section_content_limit),
                progress_percent: 0,
                status: TaskStatus::InProgress,
            });
        }
        records
    }
}

/// Names listed under `##### 팀원 목록 #####`, comma- or newline-separated.
pub fn roster(text: &str) -> Option<Vec<String>> {
    let caps = ROSTER.captures(text)?;
    let names: Vec<String> = caps[1]
        .split([',', '\n'])
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    Some(names)
}

/// Member sections between `#####` markers. The roster block is not a section.
pub fn split_sections(text: &str, today: NaiveDate) -> Vec<MemberSection> {
    let markers: Vec<_> = SECTION_MARKER
        .captures_iter(text)
        .filter(|c| compact(&c[1]) != ROSTER_TITLE)
        .collect();
    let mut sections = Vec::with_capacity(markers.len());
    for (i, caps) in markers.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let name = caps[1].trim().to_string();
        let work_date = match caps.get(2).map(|m| m.as_str()) {
            Some(raw) => dates::parse_dotted(raw).unwrap_or_else(|| {
                warn!(member = %name, date = raw, "unparseable section date, using today");
                today
            }),
            None => {
                debug!(member = %name, "section without date, using today");
                today
            }
        };
        let end = markers
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        // a roster header between two sections ends the first one
        let body = &text[whole.end()..end];
        let body = match body.find("#####") {
            Some(cut) if ROSTER.is_match(&body[cut..]) => &body[..cut],
            _ => body,
        };
        sections.push(MemberSection {
            name,
            work_date,
            body: body.trim().to_string(),
        });
    }
    sections
}

/// Project blocks on `[프로젝트 대분류: name]`; no marker means one uncategorized block.
pub fn split_projects(body: &str) -> Vec<ProjectBlock> {
    let matches: Vec<_> = PROJECT.captures_iter(body).collect();
    if matches.is_empty() {
        return vec![ProjectBlock {
            project_name: None,
            body: body.to_string(),
        }];
    }
    matches
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let end = matches
                .get(i + 1)
                .and_then(|c| c.get(0))
                .map(|m| m.start())
                .unwrap_or(body.len());
            Some(ProjectBlock {
                project_name: Some(caps[1].trim().to_string()),
                body: body[whole.end()..end].trim().to_string(),
            })
        })
        .collect()
}

/// Number after 달성 on a `진행률:` line, capped at 100.
pub fn progress(block: &str) -> u8 {
    PROGRESS
        .captures(block)
        .and_then(|c| c[1].parse::<u64>().ok())
        .map(|p| p.min(100) as u8)
        .unwrap_or(0)
}

/// Block text without progress lines, blank runs squeezed, trimmed and truncated.
pub fn task_content(block: &str, limit: usize) -> String {
    let kept = block
        .lines()
        .filter_map(|line| {
            let lead = line.trim_start().trim_start_matches('•').trim_start();
            if lead.starts_with("진행률:") {
                return None;
            }
            Some(match line.find("진행률:") {
                Some(idx) => line[..idx].trim_end_matches(['•', ' ', '\t']),
                None => line,
            })
        })
        .join("\n");
    let squeezed = BLANK_RUN.replace_all(&kept, "\n\n");
    truncate_chars(squeezed.trim(), limit)
}
