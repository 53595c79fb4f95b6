//! Content stream interpreter producing positioned text runs
//!
//! Tracks the graphics and text state needed to place glyphs: the CTM,
//! text and line matrices, and the text state parameters. Form XObjects
//! are followed recursively.

use super::font::FontInfo;
use crate::error::PdfError;
use crate::parser::{dict_get, inherited_attribute, object_to_f64, resolve, resolve_dict};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use tracing::debug;

/// Nested form XObjects deeper than this are not entered
const MAX_FORM_DEPTH: usize = 8;

/// TJ adjustments wider than this fraction of the font size read as a space
const TJ_SPACE_THRESHOLD: f64 = 0.25;

/// Affine matrix `[a b c d e f]` in PDF row-vector convention
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// `self × other`: apply `self` first, then `other`
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        let v = numbers(operands);
        match v.as_slice() {
            [a, b, c, d, e, f, ..] => Some(Matrix {
                a: *a,
                b: *b,
                c: *c,
                d: *d,
                e: *e,
                f: *f,
            }),
            _ => None,
        }
    }
}

/// A shown string, positioned in PDF user space
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font: String,
    /// Effective size after text and graphics scaling
    pub size: f64,
    /// `[x0, y0, x1, y1]` in user space, y up
    pub bbox: [f64; 4],
    pub baseline: f64,
    pub start_x: f64,
    pub end_x: f64,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Decode a page's content streams into text runs
pub fn page_runs(doc: &Document, page_id: ObjectId) -> Result<Vec<TextRun>, PdfError> {
    let content = doc
        .get_page_content(page_id)
        .map_err(|e| PdfError::ParseError(format!("page content: {}", e)))?;
    let resources = inherited_attribute(doc, page_id, b"Resources").and_then(|o| resolve_dict(doc, o));

    let mut interpreter = Interpreter {
        doc,
        runs: Vec::new(),
    };
    interpreter.run(&content, resources, GraphicsState::new(Matrix::IDENTITY), 0)?;
    Ok(interpreter.runs)
}

struct Interpreter<'a> {
    doc: &'a Document,
    runs: Vec<TextRun>,
}

impl<'a> Interpreter<'a> {
    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) -> Result<(), PdfError> {
        let content =
            Content::decode(content).map_err(|e| PdfError::ParseError(format!("content stream: {}", e)))?;
        let fonts = self.load_fonts(resources);

        let mut state = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for Operation { operator, operands } in &content.operations {
            match operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let [name, size, ..] = operands.as_slice() {
                        state.font = name.as_name().ok().map(<[u8]>::to_vec);
                        state.font_size = object_to_f64(size).unwrap_or(state.font_size);
                    }
                }
                "Tc" => set_number(&mut state.char_spacing, operands),
                "Tw" => set_number(&mut state.word_spacing, operands),
                "Tz" => {
                    if let Some(scale) = first_number(operands) {
                        state.horizontal_scale = scale / 100.0;
                    }
                }
                "TL" => set_number(&mut state.leading, operands),
                "Ts" => set_number(&mut state.rise, operands),
                "Td" | "TD" => {
                    if let [tx, ty, ..] = numbers(operands).as_slice() {
                        if operator == "TD" {
                            state.leading = -ty;
                        }
                        tlm = Matrix::translate(*tx, *ty).then(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        let parts = [TextPart::Bytes(bytes)];
                        self.show(&parts, &state, &fonts, &mut tm);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let parts: Vec<TextPart> = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(TextPart::Bytes(bytes)),
                                other => object_to_f64(other).map(TextPart::Adjust),
                            })
                            .collect();
                        self.show(&parts, &state, &fonts, &mut tm);
                    }
                }
                "'" | "\"" => {
                    let string_operand = if operator == "\"" {
                        if let [aw, ac, ..] = numbers(operands).as_slice() {
                            state.word_spacing = *aw;
                            state.char_spacing = *ac;
                        }
                        operands.get(2)
                    } else {
                        operands.first()
                    };
                    tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = string_operand {
                        let parts = [TextPart::Bytes(bytes)];
                        self.show(&parts, &state, &fonts, &mut tm);
                    }
                }
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.run_form(name, resources, &state, depth);
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn load_fonts(&self, resources: Option<&'a Dictionary>) -> HashMap<Vec<u8>, FontInfo> {
        let mut fonts = HashMap::new();
        let Some(font_dict) = resources
            .and_then(|r| dict_get(self.doc, r, b"Font"))
            .and_then(|o| resolve_dict(self.doc, o))
        else {
            return fonts;
        };

        for (name, value) in font_dict.iter() {
            if let Some(dict) = resolve_dict(self.doc, value) {
                fonts.insert(name.clone(), FontInfo::from_dict(self.doc, dict));
            }
        }
        fonts
    }

    fn run_form(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        state: &GraphicsState,
        depth: usize,
    ) {
        if depth >= MAX_FORM_DEPTH {
            debug!(depth, "form XObject nesting limit reached");
            return;
        }
        let doc = self.doc;
        let stream = resources
            .and_then(|r| dict_get(doc, r, b"XObject"))
            .and_then(|o| resolve_dict(doc, o))
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_stream().ok());
        let Some(stream) = stream else {
            return;
        };
        let is_form = matches!(
            stream.dict.get(b"Subtype").and_then(|o| o.as_name()),
            Ok(b"Form")
        );
        if !is_form {
            return;
        }

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| Matrix::from_operands(arr))
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = dict_get(doc, &stream.dict, b"Resources")
            .and_then(|o| resolve_dict(doc, o))
            .or(resources);
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let mut inner = state.clone();
        inner.ctm = matrix.then(&state.ctm);
        if let Err(e) = self.run(&content, form_resources, inner, depth + 1) {
            debug!(error = %e, "skipping undecodable form XObject");
        }
    }

    fn show(
        &mut self,
        parts: &[TextPart<'_>],
        state: &GraphicsState,
        fonts: &HashMap<Vec<u8>, FontInfo>,
        tm: &mut Matrix,
    ) {
        let fallback;
        let font = match state.font.as_ref().and_then(|key| fonts.get(key)) {
            Some(font) => font,
            None => {
                let name = state
                    .font
                    .as_deref()
                    .map(String::from_utf8_lossy)
                    .unwrap_or_default();
                fallback = FontInfo::fallback(&name);
                &fallback
            }
        };

        let tfs = state.font_size;
        let th = state.horizontal_scale;
        let mut text = String::new();
        let mut advance = 0.0;

        for part in parts {
            match part {
                TextPart::Bytes(bytes) => {
                    for glyph in font.decode(bytes) {
                        text.push_str(&glyph.text);
                        let word = if glyph.is_word_space {
                            state.word_spacing
                        } else {
                            0.0
                        };
                        advance += ((glyph.width / 1000.0) * tfs + state.char_spacing + word) * th;
                    }
                }
                TextPart::Adjust(n) => {
                    let shift = -(n / 1000.0) * tfs * th;
                    if shift > TJ_SPACE_THRESHOLD * tfs.abs() && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                    advance += shift;
                }
            }
        }

        let start = tm.then(&state.ctm);
        *tm = Matrix::translate(advance, 0.0).then(tm);

        if text.is_empty() {
            return;
        }

        let low = font.descent * tfs + state.rise;
        let high = font.ascent * tfs + state.rise;
        let corners = [
            start.apply(0.0, low),
            start.apply(advance, low),
            start.apply(0.0, high),
            start.apply(advance, high),
        ];
        let x0 = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let x1 = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let y0 = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let y1 = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

        let (start_x, baseline) = start.apply(0.0, state.rise);
        let (end_x, _) = start.apply(advance, state.rise);

        self.runs.push(TextRun {
            text,
            font: font.name.clone(),
            size: (tfs * start.c.hypot(start.d)).abs(),
            bbox: [x0, y0, x1, y1],
            baseline,
            start_x,
            end_x,
        });
    }
}

enum TextPart<'b> {
    Bytes(&'b [u8]),
    Adjust(f64),
}

fn numbers(operands: &[Object]) -> Vec<f64> {
    operands.iter().filter_map(object_to_f64).collect()
}

fn first_number(operands: &[Object]) -> Option<f64> {
    operands.first().and_then(object_to_f64)
}

fn set_number(slot: &mut f64, operands: &[Object]) {
    if let Some(v) = first_number(operands) {
        *slot = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_pdf, TestPage};
    use crate::PdfDocument;

    fn runs_for(content: &str) -> Vec<TextRun> {
        let bytes = build_pdf(&[TestPage::a4().with_content(content)]);
        let pdf = PdfDocument::from_bytes(&bytes).unwrap();
        let page_id = pdf.page_id(0).unwrap();
        page_runs(pdf.doc(), page_id).unwrap()
    }

    #[test]
    fn test_matrix_composition_order() {
        let scale = Matrix {
            a: 2.0,
            d: 2.0,
            ..Matrix::IDENTITY
        };
        let shift = Matrix::translate(10.0, 0.0);
        // Scale first, then translate
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (12.0, 2.0));
        // Translate first, then scale
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (22.0, 2.0));
    }

    #[test]
    fn test_td_positions_run() {
        let runs = runs_for("BT /F1 12 Tf 100 700 Td (Hi) Tj ET");
        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.text, "Hi");
        assert_eq!(run.font, "Helvetica");
        assert!((run.size - 12.0).abs() < 1e-9);
        assert!((run.start_x - 100.0).abs() < 1e-9);
        assert!((run.baseline - 700.0).abs() < 1e-9);
        // Two glyphs at the 500 default width
        assert!((run.end_x - 112.0).abs() < 1e-9);
        // Descent -0.2, ascent 0.8
        assert!((run.bbox[1] - 697.6).abs() < 1e-9);
        assert!((run.bbox[3] - 709.6).abs() < 1e-9);
    }

    #[test]
    fn test_cm_scales_effective_size() {
        let runs = runs_for("q 2 0 0 2 0 0 cm BT /F1 10 Tf 10 10 Td (A) Tj ET Q");
        assert_eq!(runs.len(), 1);
        assert!((runs[0].size - 20.0).abs() < 1e-9);
        assert!((runs[0].start_x - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_tm_sets_size_and_origin() {
        let runs = runs_for("BT /F1 1 Tf 14 0 0 14 72 500 Tm (X) Tj ET");
        assert!((runs[0].size - 14.0).abs() < 1e-9);
        assert!((runs[0].start_x - 72.0).abs() < 1e-9);
        assert!((runs[0].baseline - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_successive_tj_advances() {
        let runs = runs_for("BT /F2 10 Tf 50 400 Td <0001> Tj <0002> Tj ET");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "甲");
        assert_eq!(runs[1].text, "方");
        assert!((runs[1].start_x - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_tj_array_kerning_inserts_space() {
        let runs = runs_for("BT /F1 10 Tf 0 0 Td [(a) -400 (b) 20 (c)] TJ ET");
        assert_eq!(runs[0].text, "a bc");
    }

    #[test]
    fn test_t_star_uses_leading() {
        let runs = runs_for("BT /F1 10 Tf 14 TL 50 600 Td (one) Tj T* (two) Tj ET");
        assert_eq!(runs.len(), 2);
        assert!((runs[1].baseline - 586.0).abs() < 1e-9);
        assert!((runs[1].start_x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_q_restores_ctm() {
        let runs = runs_for("q 1 0 0 1 100 0 cm Q BT /F1 10 Tf 5 5 Td (A) Tj ET");
        assert!((runs[0].start_x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_font_still_produces_text() {
        let runs = runs_for("BT /F9 10 Tf 5 5 Td (ok) Tj ET");
        assert_eq!(runs[0].text, "ok");
        assert_eq!(runs[0].font, "F9");
    }
}
