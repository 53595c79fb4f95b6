//! Seal stamping
//!
//! The seal is embedded once per document as an RGB image XObject with a
//! DeviceGray soft mask carrying its transparency, then drawn on each
//! requested page at the configured physical size.

use crate::config::RendererConfig;
use crate::error::SealError;
use crate::page::{add_xobject, append_content};
use crate::straddle::{part_width, slice_seal, strip_rect};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbaImage;
use lopdf::{dictionary, ObjectId, Stream};
use serde::Serialize;
use shared_pdf::coords::rect_to_pdf;
use shared_pdf::PdfDocument;
use shared_types::{Rect, StampPosition, StampRequest};
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

/// What a stamping run did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StampReport {
    pub page_count: usize,
    /// Positions stamped
    pub stamped: usize,
    /// Positions whose page does not exist
    pub skipped: usize,
    /// Pages that received a straddle strip
    pub straddle_pages: usize,
}

/// Draws seals onto PDF pages
#[derive(Debug, Clone, Default)]
pub struct StampRenderer {
    config: RendererConfig,
}

impl StampRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Stamp every position, then add the straddle seal, and write `output`
    pub fn stamp_file(
        &self,
        source: &Path,
        output: &Path,
        seal_image: &Path,
        positions: &[StampPosition],
    ) -> Result<StampReport, SealError> {
        let mut pdf = PdfDocument::open(source)?;
        let seal = load_seal_image(seal_image)?;

        let report = self.stamp_document(&mut pdf, &seal, positions)?;
        pdf.doc_mut().compress();
        pdf.save(output)?;

        info!(
            output = %output.display(),
            stamped = report.stamped,
            skipped = report.skipped,
            straddle_pages = report.straddle_pages,
            "stamped contract"
        );
        Ok(report)
    }

    /// Stamp an in-memory document
    pub fn stamp_document(
        &self,
        pdf: &mut PdfDocument,
        seal: &RgbaImage,
        positions: &[StampPosition],
    ) -> Result<StampReport, SealError> {
        let page_count = pdf.page_count();
        let size = f64::from(self.config.seal_size_px());
        let mut report = StampReport {
            page_count,
            ..StampReport::default()
        };

        let mut seal_id = None;
        for position in positions {
            let Some(page_id) = pdf.page_id(position.page) else {
                debug!(page = position.page, page_count, "stamp page out of range, skipped");
                report.skipped += 1;
                continue;
            };
            let image_id = match seal_id {
                Some(id) => id,
                None => {
                    let id = embed_image(pdf, seal)?;
                    seal_id = Some(id);
                    id
                }
            };
            let rect = Rect::from_origin(position.x, position.y, size, size);
            draw_image(pdf, page_id, image_id, &rect)?;
            report.stamped += 1;
        }

        if self.config.straddle_enabled {
            report.straddle_pages = self.straddle(pdf, seal)?;
        }
        Ok(report)
    }

    /// Put one strip of the seal on every page; returns the number of pages
    /// touched, 0 for single-page documents
    pub fn straddle(&self, pdf: &mut PdfDocument, seal: &RgbaImage) -> Result<usize, SealError> {
        let page_count = pdf.page_count();
        if page_count < 2 {
            return Ok(0);
        }

        let total_px = self.config.seal_size_px();
        let part = part_width(total_px, page_count);
        let strips = slice_seal(seal, page_count, total_px)?;

        for (index, (page_id, strip)) in pdf.page_ids().into_iter().zip(&strips).enumerate() {
            let media_box = pdf.media_box(page_id);
            let rect = strip_rect(
                media_box.width,
                media_box.height,
                part,
                total_px,
                self.config.straddle_margin,
            );
            let image_id = embed_image(pdf, strip)?;
            draw_image(pdf, page_id, image_id, &rect)?;
            debug!(page = index, x = rect.x0, y = rect.y0, "straddle strip placed");
        }
        Ok(strips.len())
    }
}

/// Stamp the seal at each position and add the straddle seal.
///
/// Positions on pages that do not exist are skipped. Returns false when the
/// PDF or seal cannot be read, the seal is too narrow to slice, or the
/// output cannot be written; the cause is logged.
pub fn stamp_positions(
    pdf: impl AsRef<Path>,
    output: impl AsRef<Path>,
    seal_image: impl AsRef<Path>,
    positions: &[StampPosition],
) -> bool {
    match try_stamp_positions(pdf, output, seal_image, positions) {
        Ok(_) => true,
        Err(e) => {
            error!(error = %e, "stamping failed");
            false
        }
    }
}

pub fn try_stamp_positions(
    pdf: impl AsRef<Path>,
    output: impl AsRef<Path>,
    seal_image: impl AsRef<Path>,
    positions: &[StampPosition],
) -> Result<StampReport, SealError> {
    StampRenderer::default().stamp_file(
        pdf.as_ref(),
        output.as_ref(),
        seal_image.as_ref(),
        positions,
    )
}

/// Run a [`StampRequest`] with the given renderer
pub fn stamp_request(renderer: &StampRenderer, request: &StampRequest) -> Result<StampReport, SealError> {
    renderer.stamp_file(
        &request.source_pdf,
        &request.output_pdf,
        &request.seal_image,
        &request.positions,
    )
}

pub fn load_seal_image(path: &Path) -> Result<RgbaImage, SealError> {
    let image = image::open(path)
        .map_err(|e| SealError::Image(format!("{}: {}", path.display(), e)))?;
    Ok(image.to_rgba8())
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, SealError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Add an RGBA image to the document as an image XObject with soft mask
pub(crate) fn embed_image(pdf: &mut PdfDocument, image: &RgbaImage) -> Result<ObjectId, SealError> {
    let (width, height) = image.dimensions();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in image.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let doc = pdf.doc_mut();
    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        deflate(&alpha)?,
    ));
    Ok(doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
            "SMask" => smask_id,
        },
        deflate(&rgb)?,
    )))
}

/// Draw an embedded image into `rect` (top-left page coordinates)
pub(crate) fn draw_image(
    pdf: &mut PdfDocument,
    page_id: ObjectId,
    image_id: ObjectId,
    rect: &Rect,
) -> Result<(), SealError> {
    let media_box = pdf.media_box(page_id);
    let [x, y, w, h] = rect_to_pdf(rect, media_box);

    let doc = pdf.doc_mut();
    let name = add_xobject(doc, page_id, "Seal", image_id)?;
    let ops = format!("q {:.3} 0 0 {:.3} {:.3} {:.3} cm /{} Do Q\n", w, h, x, y, name);
    append_content(doc, page_id, ops.into_bytes())
}
