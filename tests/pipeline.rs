use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use pretty_assertions::assert_eq;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use worklog_ingest::config::Settings;
use worklog_ingest::db::SqliteStore;
use worklog_ingest::document::{self, find_files_by_date, load_document};
use worklog_ingest::normalize::PassthroughNormalizer;
use worklog_ingest::parser::segment::Strategy;
use worklog_ingest::parser::tasks::{TaskExtractor, TaskStatus};
use worklog_ingest::parser::TextPipeline;
use worklog_ingest::pipeline;

const RAW_KIM: &str = include_str!("fixtures/fw_kim_raw.txt");
const RECONSTRUCTED_KIM: &str = include_str!("fixtures/fw_kim_reconstructed.txt");
const NORMALIZED: &str = include_str!("fixtures/normalized_tasks.txt");

const JEON_LINES: &[&str] = &[
    "FW팀 전상민 일자: 2025.11.25",
    "금일 업무",
    "1 회로 검증 지원",
    "4 4 100 100",
    "완료",
];

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn write_docx(path: &Path, lines: &[&str]) {
    let paragraphs: String = lines
        .iter()
        .map(|l| format!("<w:p><w:r><w:t xml:space=\"preserve\">{l}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{paragraphs}</w:body></w:document>"
    );
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    std::fs::write(path, zip.finish().unwrap().into_inner()).unwrap();
}

fn utf16_string(s: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// One page, one line per entry, 14pt apart.
fn write_pdf(path: &Path, lines: &[&str]) {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 10.into()]),
        Operation::new("Td", vec![50.into(), 700.into()]),
    ];
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            ops.push(Operation::new("Td", vec![0.into(), (-14).into()]));
        }
        ops.push(Operation::new("Tj", vec![utf16_string(line)]));
    }
    ops.push(Operation::new("ET", vec![]));

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = Content { operations: ops };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    std::fs::write(path, out).unwrap();
}

/// Two contributors for 2025-11-25 plus an unrelated file.
fn seed_dir(dir: &Path) -> (PathBuf, PathBuf) {
    let kim = dir.join("FW팀_김상일_일일업무일지_251125.docx");
    let raw: Vec<&str> = RAW_KIM.lines().collect();
    write_docx(&kim, &raw);
    let jeon = dir.join("FW팀_전상민_일일업무일지_251125.pdf");
    write_pdf(&jeon, JEON_LINES);
    std::fs::write(dir.join("FW팀_전상민_일일업무일지_251124.pdf"), b"not today").unwrap();
    std::fs::write(dir.join("memo_251125.txt"), b"unsupported").unwrap();
    (kim, jeon)
}

#[test]
fn raw_page_text_reconstructs_to_fixture() {
    let text = TextPipeline::new(&Settings::default()).unwrap();
    let denoised = text.denoiser.denoise(RAW_KIM);
    let reconstruction = text.reconstructor.reconstruct(&denoised);
    assert_eq!(reconstruction.text, RECONSTRUCTED_KIM.trim_end());
    assert_eq!(reconstruction.sections.len(), 1);
    assert_eq!(reconstruction.sections[0].name, "김상일");
    assert_eq!(reconstruction.sections[0].work_date, Some(date(2025, 11, 25)));
    assert!(reconstruction.preamble().is_empty());
}

#[test]
fn normalized_fixture_yields_task_records() {
    let extractor = TaskExtractor::new(&Settings::default().tasks);
    let out = extractor.extract_on(NORMALIZED, date(2026, 1, 1));
    assert_eq!(out.roster, vec!["김종민", "전상민"]);

    let summary: Vec<_> = out
        .records
        .iter()
        .map(|r| {
            (
                r.member_name.as_str(),
                r.project_name.as_deref(),
                r.content.as_str(),
                r.progress_percent,
                r.status,
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("김종민", Some("bright Simple"), "부트로더 안정화 작업\n(완료)", 85, TaskStatus::Done),
            ("김종민", Some("신규 보드"), "샘플 검증 준비 (예정)", 0, TaskStatus::Pending),
            ("전상민", None, "회로도 검토 및 수정", 0, TaskStatus::InProgress),
        ]
    );
    assert!(out.records.iter().all(|r| r.work_date == date(2025, 11, 25)));
}

#[test]
fn files_are_picked_by_date_token() {
    let dir = tempfile::tempdir().unwrap();
    let (kim, jeon) = seed_dir(dir.path());
    let found = find_files_by_date(dir.path(), "251125").unwrap();
    assert_eq!(found, vec![kim, jeon]);
}

#[test]
fn pdf_and_docx_sources_load() {
    let dir = tempfile::tempdir().unwrap();
    let (kim, jeon) = seed_dir(dir.path());
    let settings = Settings::default();

    let docx = load_document(&kim, &settings.extraction).unwrap();
    assert_eq!(docx.text(), RAW_KIM.trim_end());

    let pdf = load_document(&jeon, &settings.extraction).unwrap();
    assert_eq!(pdf.pages.len(), 1);
    assert_eq!(pdf.text(), JEON_LINES.join("\n"));

    let junk = dir.path().join("FW팀_전상민_일일업무일지_251124.pdf");
    assert!(load_document(&junk, &settings.extraction).is_err());
    assert!(!document::is_supported(&dir.path().join("memo_251125.txt")));
}

#[test]
fn directory_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (kim, jeon) = seed_dir(dir.path());
    let settings = Settings::default();

    let files = find_files_by_date(dir.path(), "251125").unwrap();
    let report = pipeline::run(&files, &settings, &PassthroughNormalizer, None).unwrap();

    assert!(report.outcomes.iter().all(|o| o.is_ok()));
    assert_eq!(report.outcomes[0].path(), kim.as_path());
    assert_eq!(report.outcomes[1].path(), jeon.as_path());
    assert!(report.combined.starts_with(&document::wrap_source(&kim, "")));

    assert_eq!(report.segmentation.strategy, Strategy::Primary);
    let names: Vec<_> = report.segmentation.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["김상일", "전상민"]);
    assert!(report
        .segmentation
        .sections
        .iter()
        .all(|s| s.work_date == Some(date(2025, 11, 25))));
    assert_eq!(report.segmentation.reassemble(&report.combined), report.combined);

    assert!(report.contributors.iter().all(|c| c.ok));
    assert!(report.normalized.starts_with("##### 팀원 목록 #####\n김상일, 전상민\n"));

    let tasks = &report.tasks.records;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].member_name, "김상일");
    assert_eq!(tasks[1].member_name, "전상민");
    assert!(tasks.iter().all(|t| t.work_date == date(2025, 11, 25)));
    assert!(tasks.iter().all(|t| t.project_name.is_none()));
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Done));
    assert!(tasks[0].content.contains("1.1 목적: 부트로더 안정화"));
    assert!(tasks[1].content.contains("회로 검증 지원"));

    assert_eq!(report.rules.get("merge_numeric_rows").unwrap().touched, 2);
    assert_eq!(report.rules.get("contributor_header").unwrap().touched, 2);

    let mut store = SqliteStore::open(&dir.path().join("db").join("tasks.db")).unwrap();
    assert_eq!(store.save_tasks(tasks).unwrap(), 2);
    // same run again updates in place
    store.save_tasks(tasks).unwrap();
    assert_eq!(store.count().unwrap(), 2);
    let stored = store
        .fetch_tasks(Some(date(2025, 11, 25)), Some(date(2025, 11, 25)))
        .unwrap();
    assert_eq!(stored.len(), 2);
}
