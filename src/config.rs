//! Runtime settings.
//!
//! Every heuristic table the pipeline relies on (allow-list, noise tokens,
//! team pattern, cue phrases, limits) lives here so an organization can tune
//! it without touching code. Sources, lowest priority first: built-in
//! defaults, an optional TOML file, `WORKLOG__*` environment variables.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::document::ExtractionMode;
use crate::error::{IngestError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "worklog.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub extraction: ExtractionSettings,
    pub denoise: DenoiseSettings,
    pub structure: StructureSettings,
    pub segment: SegmentSettings,
    pub tasks: TaskSettings,
    pub db: DbSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub mode: ExtractionMode,
    /// Max baseline distance, as a fraction of font size, for two spans to share a line.
    pub line_tolerance: f32,
    /// Max vertical gap, in font sizes, between lines of the same block.
    pub block_gap_factor: f32,
    /// Horizontal gap, in font sizes, above which a space is inserted between spans.
    pub space_gap_factor: f32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        ExtractionSettings {
            mode: ExtractionMode::Smart,
            line_tolerance: 0.5,
            block_gap_factor: 1.6,
            space_gap_factor: 0.25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DenoiseSettings {
    /// Two-character CJK lines that carry meaning and must survive denoising.
    pub allow_list: Vec<String>,
    /// Approval-stamp fragments dropped when they stand alone on a line.
    pub noise_tokens: Vec<String>,
}

impl Default for DenoiseSettings {
    fn default() -> Self {
        DenoiseSettings {
            allow_list: strings(&["목적", "완료", "진행", "예정", "시작", "종료", "계획", "달성"]),
            noise_tokens: strings(&["결", "재", "결재", "작성", "검토", "승인", "Unit", "Chair"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StructureSettings {
    pub table_header_terms: Vec<String>,
    /// Terms that make a table-header line; a line without one is kept.
    pub table_header_anchors: Vec<String>,
    pub project_keywords: Vec<String>,
    pub today_cues: Vec<String>,
    pub tomorrow_cues: Vec<String>,
    /// Extra characters a cue line may carry besides the cue itself.
    pub cue_slack: usize,
}

impl Default for StructureSettings {
    fn default() -> Self {
        StructureSettings {
            table_header_terms: strings(&[
                "대분류", "중분류", "소분류", "구분", "분류", "세부내용", "세부업무", "세부사항",
                "상세내용", "상세업무", "업무내용", "계획", "실적", "진행률", "달성률", "비고",
                "시간", "목표", "내용",
            ]),
            table_header_anchors: strings(&["구분", "분류", "세부", "상세"]),
            project_keywords: strings(&["목표", "개발", "개선", "준비", "지원"]),
            today_cues: strings(&["금일업무", "금일실적", "금일진행", "오늘업무"]),
            tomorrow_cues: strings(&["명일업무", "명일계획", "익일업무", "내일업무"]),
            cue_slack: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmentSettings {
    /// Regex fragment matching a team name inside a source path, e.g. `FW팀`.
    pub team_pattern: String,
    /// Positional fallback name; `{index}` is replaced with the 1-based position.
    pub member_placeholder: String,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        SegmentSettings {
            team_pattern: r"[A-Za-z0-9가-힣]*팀".to_string(),
            member_placeholder: "팀원{index}".to_string(),
        }
    }
}

impl SegmentSettings {
    pub fn placeholder_name(&self, index: usize) -> String {
        self.member_placeholder.replace("{index}", &index.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub block_content_limit: usize,
    pub section_content_limit: usize,
}

impl Default for TaskSettings {
    fn default() -> Self {
        TaskSettings {
            block_content_limit: 1000,
            section_content_limit: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbSettings {
    pub path: String,
}

impl Default for DbSettings {
    fn default() -> Self {
        DbSettings {
            path: "data/worklog.sqlite".to_string(),
        }
    }
}

impl Settings {
    /// Load defaults, then `file` (or `worklog.toml` when present), then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        match file {
            Some(path) => builder = builder.add_source(File::from(path).required(true)),
            None => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false))
            }
        }
        builder = builder.add_source(Environment::with_prefix("WORKLOG").separator("__"));
        builder
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .map_err(|e| IngestError::Config(e.to_string()))
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .map_err(|e| IngestError::Config(e.to_string()))
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
