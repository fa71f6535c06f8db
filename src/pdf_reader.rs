use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::Path;

use encoding_rs::UTF_16BE;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use crate::error::ExtractError;
use crate::geometry::{PAGE_HEIGHT, ROW_HEIGHT, Region};
use crate::model::{Grid, TextLine};
use crate::provider::PageGridProvider;
use crate::table_parse::{guessed_grid, raw_grid, region_grid};

/// Fragments whose baselines differ by less than this share a line.
const BASELINE_TOLERANCE: f32 = 2.0;

fn looks_decoding_broken(text: &str) -> bool {
    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }

    let total = text.chars().count();
    if total == 0 {
        return false;
    }

    let replacement = text.matches('\u{FFFD}').count();
    let control = text
        .chars()
        .filter(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t'))
        .count();
    replacement * 8 > total || control * 5 > total
}

fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    let lower = encoding.map(str::to_ascii_lowercase).unwrap_or_default();
    let has_bom = bytes.starts_with(&[0xFE, 0xFF]);
    if has_bom || lower.contains("utf16") || lower.contains("identity-h") {
        let body = if has_bom { &bytes[2..] } else { bytes };
        let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(body);
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    for (slot, operand) in out.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    (operands.len() >= N).then_some(out)
}

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn then(self, other: Self) -> Self {
        let [a, b, c, d, e, f] = self.0;
        let [oa, ob, oc, od, oe, of] = other.0;
        Self([
            a * oa + b * oc,
            a * ob + b * od,
            c * oa + d * oc,
            c * ob + d * od,
            e * oa + f * oc + oe,
            e * ob + f * od + of,
        ])
    }
}

#[derive(Debug)]
struct Fragment {
    x: f32,
    y: f32,
    text: String,
}

/// Tracks the graphics and text state needed to place shown strings.
struct TextCursor {
    ctm: Matrix,
    saved: Vec<Matrix>,
    line_matrix: Matrix,
    text_matrix: Matrix,
    leading: f32,
}

impl TextCursor {
    fn new() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            line_matrix: Matrix::IDENTITY,
            text_matrix: Matrix::IDENTITY,
            leading: 0.0,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).then(self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn position(&self) -> (f32, f32) {
        let [_, _, _, _, x, y] = self.text_matrix.then(self.ctm).0;
        (x, y)
    }
}

fn collect_text(text: &mut String, encoding: Option<&str>, operands: &[Object]) {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&decode_pdf_bytes(encoding, bytes)),
            Object::Array(items) => collect_text(text, encoding, items),
            Object::Integer(value) if *value < -100 => text.push(' '),
            Object::Real(value) if (*value as f32) < -100.0 => text.push(' '),
            _ => {}
        }
    }
}

fn push_fragment(fragments: &mut Vec<Fragment>, (x, y): (f32, f32), text: String) {
    if text.trim().is_empty() {
        return;
    }
    if let Some(last) = fragments.last_mut() {
        if (last.x - x).abs() < f32::EPSILON && (last.y - y).abs() < f32::EPSILON {
            last.text.push_str(&text);
            return;
        }
    }
    fragments.push(Fragment { x, y, text });
}

fn page_fragments(document: &Document, page_id: ObjectId) -> Result<Vec<Fragment>, String> {
    let raw_content = document
        .get_page_content(page_id)
        .map_err(|error| error.to_string())?;
    let content = Content::decode(&raw_content).map_err(|error| error.to_string())?;
    let encodings = document
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, font.get_font_encoding()))
        .collect::<BTreeMap<Vec<u8>, &str>>();

    let mut cursor = TextCursor::new();
    let mut encoding = None;
    let mut fragments = Vec::new();

    for operation in content.operations {
        let operands = operation.operands.as_slice();
        match operation.operator.as_str() {
            "q" => cursor.saved.push(cursor.ctm),
            "Q" => cursor.ctm = cursor.saved.pop().unwrap_or(Matrix::IDENTITY),
            "cm" => {
                if let Some(values) = numbers::<6>(operands) {
                    cursor.ctm = Matrix(values).then(cursor.ctm);
                }
            }
            "BT" => {
                cursor.line_matrix = Matrix::IDENTITY;
                cursor.text_matrix = Matrix::IDENTITY;
            }
            "Tm" => {
                if let Some(values) = numbers::<6>(operands) {
                    cursor.line_matrix = Matrix(values);
                    cursor.text_matrix = cursor.line_matrix;
                }
            }
            "TL" => {
                if let Some([leading]) = numbers::<1>(operands) {
                    cursor.leading = leading;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    cursor.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    cursor.leading = -ty;
                    cursor.move_line(tx, ty);
                }
            }
            "T*" => cursor.next_line(),
            "Tf" => {
                encoding = operands
                    .first()
                    .and_then(|operand| operand.as_name().ok())
                    .and_then(|name| encodings.get(name).copied());
            }
            "Tj" | "TJ" => {
                let mut text = String::new();
                collect_text(&mut text, encoding, operands);
                push_fragment(&mut fragments, cursor.position(), text);
            }
            "'" => {
                cursor.next_line();
                let mut text = String::new();
                collect_text(&mut text, encoding, operands);
                push_fragment(&mut fragments, cursor.position(), text);
            }
            "\"" => {
                cursor.next_line();
                let mut text = String::new();
                collect_text(&mut text, encoding, operands.get(2..).unwrap_or_default());
                push_fragment(&mut fragments, cursor.position(), text);
            }
            _ => {}
        }
    }

    Ok(fragments)
}

/// Groups fragments into lines, top of the page first. Fragments on one line
/// are joined with tabs so they split into separate cells.
fn assemble_lines(mut fragments: Vec<Fragment>, page_height: f32) -> Vec<TextLine> {
    fragments.sort_by(|left, right| right.y.total_cmp(&left.y).then(left.x.total_cmp(&right.x)));

    let mut grouped: Vec<(f32, Vec<Fragment>)> = Vec::new();
    for fragment in fragments {
        match grouped.last_mut() {
            Some((baseline, members)) if (*baseline - fragment.y).abs() <= BASELINE_TOLERANCE => {
                members.push(fragment);
            }
            _ => grouped.push((fragment.y, vec![fragment])),
        }
    }

    grouped
        .into_iter()
        .map(|(baseline, mut members)| {
            members.sort_by(|left, right| left.x.total_cmp(&right.x));
            TextLine {
                offset: page_height - baseline,
                x: members.first().map_or(0.0, |member| member.x),
                text: members
                    .iter()
                    .map(|member| member.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\t"),
            }
        })
        .collect()
}

fn media_box_height(document: &Document, page_id: ObjectId) -> f32 {
    let mut current = Some(page_id);
    // MediaBox is inheritable; walk up the page tree.
    for _ in 0..32 {
        let Some(id) = current else { break };
        let Ok(dictionary) = document.get_dictionary(id) else {
            break;
        };
        if let Ok(media_box) = dictionary.get(b"MediaBox").and_then(Object::as_array) {
            if let [_, y0, _, y1] = media_box.as_slice() {
                if let (Some(y0), Some(y1)) = (number(y0), number(y1)) {
                    return (y1 - y0).abs();
                }
            }
        }
        current = dictionary.get(b"Parent").and_then(Object::as_reference).ok();
    }
    PAGE_HEIGHT
}

fn split_text_into_pages(raw_text: &str) -> Vec<String> {
    let mut pages = raw_text
        .split('\u{000C}')
        .map(str::to_string)
        .collect::<Vec<_>>();
    if pages.last().is_some_and(String::is_empty) {
        pages.pop();
    }
    pages
}

/// Grid provider backed by the text layer of a PDF.
pub struct PdfGridProvider {
    bytes: Vec<u8>,
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
    plain_text_pages: OnceCell<Option<Vec<String>>>,
}

impl PdfGridProvider {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        Self::from_bytes(std::fs::read(path)?)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ExtractError> {
        let document = Document::load_mem(&bytes)?;
        let pages = document.get_pages();
        Ok(Self {
            bytes,
            document,
            pages,
            plain_text_pages: OnceCell::new(),
        })
    }

    fn positioned_lines(&self, page: u32) -> Result<Vec<TextLine>, ExtractError> {
        let page_id = *self
            .pages
            .get(&page)
            .ok_or_else(|| ExtractError::PageUnreadable {
                page,
                reason: format!("document has {} pages", self.pages.len()),
            })?;

        let fragments = page_fragments(&self.document, page_id)
            .map_err(|reason| ExtractError::PageUnreadable { page, reason })?;
        Ok(assemble_lines(
            fragments,
            media_box_height(&self.document, page_id),
        ))
    }

    /// Page text from `pdf-extract`, for pages whose content stream yields
    /// nothing positionable. Offsets are synthetic, one row height apart.
    fn plain_text_lines(&self, page: u32) -> Vec<TextLine> {
        let pages = self.plain_text_pages.get_or_init(|| {
            pdf_extract::extract_text_from_mem(&self.bytes)
                .ok()
                .map(|text| split_text_into_pages(&text))
        });
        let Some(text) = pages
            .as_ref()
            .and_then(|pages| pages.get(page.saturating_sub(1) as usize))
        else {
            return Vec::new();
        };

        text.lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(index, line)| TextLine {
                offset: (index + 1) as f32 * ROW_HEIGHT,
                x: 0.0,
                text: line.to_string(),
            })
            .collect()
    }
}

impl PageGridProvider for PdfGridProvider {
    fn grid(
        &self,
        page: u32,
        region: Option<Region>,
        guess_layout: bool,
    ) -> Result<Grid, ExtractError> {
        let mut lines = self.positioned_lines(page)?;
        if lines.is_empty() && region.is_none() {
            lines = self.plain_text_lines(page);
        }
        if lines.is_empty() {
            return Err(ExtractError::PageUnreadable {
                page,
                reason: "no text found".to_string(),
            });
        }

        let grid = match (region, guess_layout) {
            (Some(region), _) => region_grid(&lines, &region),
            (None, true) => guessed_grid(&lines).ok_or_else(|| ExtractError::PageUnreadable {
                page,
                reason: "no table detected".to_string(),
            })?,
            (None, false) => raw_grid(&lines),
        };
        debug!(
            page,
            ?region,
            guess_layout,
            columns = grid.columns.len(),
            rows = grid.row_count(),
            "read page grid"
        );
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::{Fragment, Matrix, assemble_lines, decode_pdf_bytes, split_text_into_pages};

    #[test]
    fn splits_form_feed_delimited_pages() {
        let pages = split_text_into_pages("p1\u{000C}p2\u{000C}");
        assert_eq!(pages, vec!["p1", "p2"]);
    }

    #[test]
    fn decodes_utf16_strings_with_byte_order_mark() {
        let bytes = [0xFE, 0xFF, 0x00, 0x44, 0x00, 0x61, 0x00, 0x74, 0x00, 0x65];
        assert_eq!(decode_pdf_bytes(Some("Identity-H"), &bytes), "Date");
    }

    #[test]
    fn translation_composes_with_scaled_ctm() {
        let ctm = Matrix([2.0, 0.0, 0.0, 2.0, 10.0, 20.0]);
        let [_, _, _, _, x, y] = Matrix::translate(5.0, 7.0).then(ctm).0;
        assert!((x - 20.0).abs() < f32::EPSILON);
        assert!((y - 34.0).abs() < f32::EPSILON);
    }

    #[test]
    fn groups_fragments_on_shared_baseline() {
        let fragments = vec![
            Fragment { x: 200.0, y: 700.0, text: "555-201-0001".to_string() },
            Fragment { x: 50.0, y: 701.0, text: "01/05".to_string() },
            Fragment { x: 50.0, y: 720.0, text: "Date".to_string() },
        ];
        let lines = assemble_lines(fragments, 792.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Date");
        assert!((lines[0].offset - 72.0).abs() < f32::EPSILON);
        assert_eq!(lines[1].text, "01/05\t555-201-0001");
    }
}
