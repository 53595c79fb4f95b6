//! Text layout extraction
//!
//! Every page is turned into a [`PageLayout`]: the page size plus a list of
//! text spans with bounding boxes in top-left page space. Adjacent runs that
//! share font, size and baseline are joined so that a line of CJK text shown
//! one glyph at a time comes out as a single span.

mod cmap;
mod font;
mod interpreter;

use crate::coords::{pdf_to_top_left, MediaBox};
use crate::error::PdfError;
use crate::parser::PdfDocument;
use interpreter::TextRun;
use shared_types::{PageLayout, Rect, TextSpan};
use std::path::Path;
use tracing::{debug, error, warn};

/// Runs further apart than this (in font sizes) start a new span
const MAX_JOIN_GAP: f64 = 0.3;
/// Overlap tolerated when joining runs, in font sizes
const MAX_JOIN_OVERLAP: f64 = 0.5;
/// Gaps wider than this (in font sizes) become a space when joining
const SPACE_GAP: f64 = 0.15;

/// Extract the layout of every page of a PDF file.
///
/// Returns an empty list when the file cannot be opened or parsed. Pages
/// whose content cannot be decoded come back with no spans.
pub fn extract_layout(path: impl AsRef<Path>) -> Vec<PageLayout> {
    let path = path.as_ref();
    match try_extract_layout(path) {
        Ok(layouts) => layouts,
        Err(e) => {
            error!(path = %path.display(), error = %e, "layout extraction failed");
            Vec::new()
        }
    }
}

/// Like [`extract_layout`], but reports why the document could not be read
pub fn try_extract_layout(path: impl AsRef<Path>) -> Result<Vec<PageLayout>, PdfError> {
    let pdf = PdfDocument::open(path)?;
    Ok(extract_layout_from_document(&pdf))
}

/// Extract the layout of every page of an already loaded document
pub fn extract_layout_from_document(pdf: &PdfDocument) -> Vec<PageLayout> {
    let layouts: Vec<PageLayout> = pdf
        .page_ids()
        .into_iter()
        .enumerate()
        .map(|(index, page_id)| {
            let media_box = pdf.media_box(page_id);
            let mut layout = PageLayout::new(index, media_box.width, media_box.height);
            match interpreter::page_runs(pdf.doc(), page_id) {
                Ok(runs) => layout.spans = build_spans(runs, media_box),
                Err(e) => warn!(page = index, error = %e, "could not decode page content"),
            }
            layout
        })
        .collect();

    debug!(
        pages = layouts.len(),
        spans = layouts.iter().map(|l| l.spans.len()).sum::<usize>(),
        "layout extracted"
    );
    layouts
}

fn build_spans(runs: Vec<TextRun>, media_box: MediaBox) -> Vec<TextSpan> {
    coalesce(runs)
        .into_iter()
        .filter_map(|run| {
            let text = run.text.trim();
            if text.is_empty() {
                return None;
            }
            let [x0, y0, x1, y1] = run.bbox;
            let (left, top) = pdf_to_top_left(x0, y1, media_box);
            let (right, bottom) = pdf_to_top_left(x1, y0, media_box);
            Some(TextSpan {
                text: text.to_string(),
                bbox: Rect::new(left, top, right, bottom),
                font: run.font,
                size: run.size,
            })
        })
        .collect()
}

/// Join consecutive runs that continue each other on the same line
fn coalesce(runs: Vec<TextRun>) -> Vec<TextRun> {
    let mut out: Vec<TextRun> = Vec::with_capacity(runs.len());

    for run in runs {
        if let Some(prev) = out.last_mut() {
            if continues(prev, &run) {
                let gap = run.start_x - prev.end_x;
                if gap > SPACE_GAP * prev.size && !prev.text.ends_with(' ') && !run.text.starts_with(' ') {
                    prev.text.push(' ');
                }
                prev.text.push_str(&run.text);
                prev.bbox = [
                    prev.bbox[0].min(run.bbox[0]),
                    prev.bbox[1].min(run.bbox[1]),
                    prev.bbox[2].max(run.bbox[2]),
                    prev.bbox[3].max(run.bbox[3]),
                ];
                prev.end_x = run.end_x;
                continue;
            }
        }
        out.push(run);
    }

    out
}

fn continues(prev: &TextRun, next: &TextRun) -> bool {
    if prev.font != next.font || (prev.size - next.size).abs() > 0.01 {
        return false;
    }
    let size = prev.size;
    if (prev.baseline - next.baseline).abs() > (0.1 * size).max(1.0) {
        return false;
    }
    let gap = next.start_x - prev.end_x;
    gap >= -MAX_JOIN_OVERLAP * size && gap <= MAX_JOIN_GAP * size
}
