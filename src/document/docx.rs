//! DOCX body text: paragraphs in document order, tables as `[표]` blocks.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::{IngestError, Result};

pub const TABLE_LABEL: &str = "[표]";

pub fn read_docx(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    docx_text(path, file)
}

pub fn docx_from_bytes(label: &Path, bytes: &[u8]) -> Result<String> {
    docx_text(label, Cursor::new(bytes))
}

fn docx_text<R: Read + Seek>(label: &Path, reader: R) -> Result<String> {
    let mut archive = ZipArchive::new(reader).map_err(|e| IngestError::docx(label, e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| IngestError::docx(label, e))?
        .read_to_string(&mut xml)
        .map_err(|e| IngestError::docx(label, e))?;
    body_text(&xml).map_err(|e| IngestError::docx(label, e))
}

#[derive(Default)]
struct TableState {
    rows: Vec<String>,
    cells: Vec<String>,
    cell: String,
}

/// Render `word/document.xml` to plain text.
fn body_text(xml: &str) -> std::result::Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut paragraph = String::new();
    // nested tables are flattened into the outermost one
    let mut table: Option<TableState> = None;
    let mut depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => {
                    depth += 1;
                    if depth == 1 {
                        table = Some(TableState::default());
                    }
                }
                b"p" => paragraph.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => paragraph.push('\t'),
                b"br" | b"cr" => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => paragraph.push_str(&e.unescape()?),
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => match table.as_mut() {
                    Some(t) => {
                        let text = paragraph.replace('\n', " ");
                        let text = text.trim();
                        if !text.is_empty() {
                            if !t.cell.is_empty() {
                                t.cell.push(' ');
                            }
                            t.cell.push_str(text);
                        }
                    }
                    None => {
                        out.push_str(&paragraph);
                        out.push('\n');
                    }
                },
                b"tc" => {
                    if let Some(t) = table.as_mut() {
                        let cell = std::mem::take(&mut t.cell);
                        if depth == 1 {
                            t.cells.push(cell);
                        } else {
                            t.cell = cell;
                        }
                    }
                }
                b"tr" if depth == 1 => {
                    if let Some(t) = table.as_mut() {
                        let cells = std::mem::take(&mut t.cells);
                        if cells.iter().any(|c| !c.is_empty()) {
                            t.rows.push(cells.join(" | "));
                        }
                    }
                }
                b"tbl" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        if let Some(t) = table.take() {
                            out.push('\n');
                            out.push_str(TABLE_LABEL);
                            out.push('\n');
                            for row in t.rows {
                                out.push_str(&row);
                                out.push('\n');
                            }
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}
