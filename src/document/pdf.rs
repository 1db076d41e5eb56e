//! PDF page source over `lopdf`.
//!
//! Spans are recovered by replaying the text operators of each page's
//! content stream. Glyph widths are estimated from the character class
//! rather than read from the font's width tables; the estimate only feeds
//! spacing and column heuristics.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::cmap::{utf16_be, ToUnicode};
use super::layout::{PageSource, TextSpan};
use crate::error::{IngestError, Result};
use crate::utils::is_wide;

pub struct PdfDocument {
    path: PathBuf,
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self> {
        let doc = Document::load(path).map_err(|e| IngestError::pdf(path, e))?;
        Self::from_document(path, doc)
    }

    pub fn from_bytes(label: &Path, bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).map_err(|e| IngestError::pdf(label, e))?;
        Self::from_document(label, doc)
    }

    fn from_document(path: &Path, doc: Document) -> Result<Self> {
        if doc.is_encrypted() {
            return Err(IngestError::pdf(path, "encrypted document"));
        }
        let pages = doc.get_pages();
        debug!(path = %path.display(), pages = pages.len(), "opened PDF");
        Ok(PdfDocument {
            path: path.to_path_buf(),
            doc,
            pages,
        })
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn text_spans(&self, page_index: u32) -> Result<Vec<TextSpan>> {
        let page_id = *self
            .pages
            .get(&page_index)
            .ok_or_else(|| IngestError::pdf(&self.path, format!("no page {page_index}")))?;
        let data = self
            .doc
            .get_page_content(page_id)
            .map_err(|e| IngestError::pdf(&self.path, e))?;
        let content = Content::decode(&data).map_err(|e| IngestError::pdf(&self.path, e))?;
        let fonts = load_fonts(&self.doc, page_id);

        let mut collector = SpanCollector::new(&fonts);
        for op in &content.operations {
            collector.apply(op);
        }
        Ok(collector.spans)
    }
}

#[derive(Debug, Clone, Default)]
struct FontDecoder {
    two_byte: bool,
    cmap: Option<ToUnicode>,
}

impl FontDecoder {
    fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let two_byte = font
            .get(b"Subtype")
            .and_then(|o| o.as_name())
            .map(|n| n == b"Type0")
            .unwrap_or(false);
        let cmap = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_stream().ok())
            .map(|s| s.decompressed_content().unwrap_or_else(|_| s.content.clone()))
            .map(|data| ToUnicode::parse(&data));
        FontDecoder { two_byte, cmap }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
            return utf16_be(rest);
        }
        if let Some(cmap) = &self.cmap {
            let text = cmap.decode(bytes);
            if !text.is_empty() || self.two_byte {
                return text;
            }
        }
        if self.two_byte {
            utf16_be(bytes)
        } else {
            bytes.iter().map(|&b| char::from(b)).collect()
        }
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Resources of a page, following inheritance up the page tree.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..32 {
        if let Ok(res) = node.get(b"Resources") {
            return resolve(doc, res)?.as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

fn load_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontDecoder> {
    let mut fonts = HashMap::new();
    let Some(dict) = page_resources(doc, page_id)
        .and_then(|res| res.get(b"Font").ok())
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
    else {
        return fonts;
    };
    for (name, obj) in dict.iter() {
        if let Some(font) = resolve(doc, obj).and_then(|o| o.as_dict().ok()) {
            fonts.insert(name.clone(), FontDecoder::from_dict(doc, font));
        }
    }
    fonts
}

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn translate(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

struct SpanCollector<'a> {
    fonts: &'a HashMap<Vec<u8>, FontDecoder>,
    fallback: FontDecoder,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    leading: f32,
    spans: Vec<TextSpan>,
}

impl<'a> SpanCollector<'a> {
    fn new(fonts: &'a HashMap<Vec<u8>, FontDecoder>) -> Self {
        SpanCollector {
            fonts,
            fallback: FontDecoder::default(),
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            font: None,
            font_size: 12.0,
            leading: 0.0,
            spans: Vec::new(),
        }
    }

    fn nums(op: &Operation) -> Vec<f32> {
        op.operands.iter().filter_map(number).collect()
    }

    fn apply(&mut self, op: &Operation) {
        match op.operator.as_str() {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(m) = self.ctm_stack.pop() {
                    self.ctm = m;
                }
            }
            "cm" => {
                if let [a, b, c, d, e, f] = Self::nums(op)[..] {
                    self.ctm = multiply(&[a, b, c, d, e, f], &self.ctm);
                }
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
            }
            "Tf" => {
                self.font = op
                    .operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .map(|n| n.to_vec());
                if let Some(size) = op.operands.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(l) = op.operands.first().and_then(number) {
                    self.leading = l;
                }
            }
            "Td" => {
                if let [tx, ty] = Self::nums(op)[..] {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty] = Self::nums(op)[..] {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let [a, b, c, d, e, f] = Self::nums(op)[..] {
                    self.tm = [a, b, c, d, e, f];
                    self.tlm = self.tm;
                }
            }
            "T*" => self.move_line(0.0, -self.leading),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.move_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.move_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let tx = -adjust / 1000.0 * self.font_size;
                                    self.tm = multiply(&translate(tx, 0.0), &self.tm);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = multiply(&translate(tx, ty), &self.tlm);
        self.tm = self.tlm;
    }

    fn show(&mut self, bytes: &[u8]) {
        let decoder = self
            .font
            .as_ref()
            .and_then(|name| self.fonts.get(name))
            .unwrap_or(&self.fallback);
        let text = decoder.decode(bytes);
        if text.is_empty() {
            return;
        }

        let trm = multiply(&self.tm, &self.ctm);
        let h_scale = (trm[0] * trm[0] + trm[1] * trm[1]).sqrt();
        let v_scale = (trm[2] * trm[2] + trm[3] * trm[3]).sqrt();
        let advance: f32 = text
            .chars()
            .map(|c| if is_wide(c) { 1.0 } else { 0.5 })
            .sum::<f32>()
            * self.font_size;

        self.spans.push(TextSpan {
            x: trm[4],
            y: trm[5],
            width: advance * h_scale,
            font_size: (self.font_size * v_scale).abs().max(1.0),
            text,
        });
        self.tm = multiply(&translate(advance, 0.0), &self.tm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionSettings;
    use crate::document::layout::{extract, ExtractionMode};
    use lopdf::{dictionary, Stream};

    fn build_pdf(ops: Vec<Operation>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn two_line_page() -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![50.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("Unit")]),
            Operation::new("Td", vec![0.into(), (-14).into()]),
            Operation::new("Tj", vec![Object::string_literal("Daily log")]),
            Operation::new("ET", vec![]),
        ]
    }

    #[test]
    fn spans_follow_text_matrix() {
        let bytes = build_pdf(two_line_page());
        let pdf = PdfDocument::from_bytes(Path::new("mem.pdf"), &bytes).unwrap();
        assert_eq!(pdf.page_count(), 1);

        let spans = pdf.text_spans(1).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "Unit");
        assert_eq!(spans[0].x, 50.0);
        assert_eq!(spans[0].y, 700.0);
        assert_eq!(spans[1].text, "Daily log");
        assert_eq!(spans[1].y, 686.0);
    }

    #[test]
    fn inherited_resources_and_modes() {
        let bytes = build_pdf(two_line_page());
        let pdf = PdfDocument::from_bytes(Path::new("mem.pdf"), &bytes).unwrap();
        let params = ExtractionSettings::default();
        for mode in [ExtractionMode::Simple, ExtractionMode::Smart, ExtractionMode::Layout] {
            assert_eq!(extract(&pdf, 1, mode, &params), "Unit\nDaily log", "mode {mode}");
        }
    }

    #[test]
    fn tj_array_gap_becomes_space() {
        let bytes = build_pdf(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![50.into(), 700.into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Plan"),
                    (-400).into(),
                    Object::string_literal("Done"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ]);
        let pdf = PdfDocument::from_bytes(Path::new("mem.pdf"), &bytes).unwrap();
        let text = extract(&pdf, 1, ExtractionMode::Layout, &ExtractionSettings::default());
        assert_eq!(text, "Plan Done");
    }

    #[test]
    fn missing_page_is_an_error() {
        let bytes = build_pdf(two_line_page());
        let pdf = PdfDocument::from_bytes(Path::new("mem.pdf"), &bytes).unwrap();
        assert!(pdf.text_spans(3).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(PdfDocument::from_bytes(Path::new("bad.pdf"), b"not a pdf").is_err());
    }
}
