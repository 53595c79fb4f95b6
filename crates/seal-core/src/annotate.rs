//! Contract number and date on the first page

use crate::config::AnnotationConfig;
use crate::error::SealError;
use crate::page::add_annotation;
use lopdf::{dictionary, Dictionary, Object, StringFormat};
use shared_pdf::coords::rect_to_pdf;
use shared_pdf::PdfDocument;
use shared_types::Rect;
use std::path::Path;
use tracing::{debug, error, info};

const BOX_WIDTH: f64 = 200.0;
const RIGHT_MARGIN: f64 = 20.0;
const TOP_MARGIN: f64 = 30.0;
/// Vertical distance between the number line and the date line
const LINE_STEP: f64 = 25.0;

/// Today's date in the configured format
pub fn today(config: &AnnotationConfig) -> String {
    chrono::Local::now().format(&config.date_format).to_string()
}

/// Write the contract number and date into `output`.
///
/// When annotation is disabled the source is copied unchanged. Returns
/// false on failure; the cause is logged.
pub fn annotate_contract(
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    contract_number: &str,
    date: &str,
    config: &AnnotationConfig,
) -> bool {
    match try_annotate_contract(source, output, contract_number, date, config) {
        Ok(_) => true,
        Err(e) => {
            error!(error = %e, "annotation failed");
            false
        }
    }
}

/// Returns whether annotations were added (false when disabled)
pub fn try_annotate_contract(
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    contract_number: &str,
    date: &str,
    config: &AnnotationConfig,
) -> Result<bool, SealError> {
    let (source, output) = (source.as_ref(), output.as_ref());
    if !config.enabled {
        debug!("annotation disabled, copying contract unchanged");
        std::fs::copy(source, output)?;
        return Ok(false);
    }

    let mut pdf = PdfDocument::open(source)?;
    annotate_document(&mut pdf, contract_number, date, config)?;
    pdf.save(output)?;
    info!(output = %output.display(), contract_number, "annotated contract");
    Ok(true)
}

/// Add the two FreeText annotations to the first page
pub fn annotate_document(
    pdf: &mut PdfDocument,
    contract_number: &str,
    date: &str,
    config: &AnnotationConfig,
) -> Result<(), SealError> {
    let page_id = pdf
        .page_id(0)
        .ok_or_else(|| SealError::Pdf("document has no pages".into()))?;
    let media_box = pdf.media_box(page_id);

    let lines = [
        format!("合同编号: {}", contract_number),
        format!("日期: {}", date),
    ];
    for (i, line) in lines.iter().enumerate() {
        let top = TOP_MARGIN + i as f64 * LINE_STEP;
        let rect = Rect::from_origin(
            media_box.width - BOX_WIDTH - RIGHT_MARGIN,
            top,
            BOX_WIDTH,
            config.font_size * 2.0,
        );
        let [x, y, w, h] = rect_to_pdf(&rect, media_box);
        let annot = free_text(line, [x, y, x + w, y + h], config.font_size);
        let annot_id = pdf.doc_mut().add_object(Object::Dictionary(annot));
        add_annotation(pdf.doc_mut(), page_id, annot_id)?;
    }
    Ok(())
}

fn free_text(text: &str, rect: [f64; 4], font_size: f64) -> Dictionary {
    let da = format!("/Helv {} Tf 0 0 0 rg", font_size);
    dictionary! {
        "Type" => "Annot",
        "Subtype" => "FreeText",
        "Rect" => rect.iter().map(|v| Object::Real(*v as f32)).collect::<Vec<_>>(),
        "Contents" => Object::String(utf16be(text), StringFormat::Hexadecimal),
        "DA" => Object::String(da.into_bytes(), StringFormat::Literal),
        "F" => 4,
    }
}

/// PDF text string: UTF-16BE with byte order mark
fn utf16be(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Document;
    use pretty_assertions::assert_eq;

    fn one_page_pdf() -> PdfDocument {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        PdfDocument::from_document(doc)
    }

    fn enabled() -> AnnotationConfig {
        AnnotationConfig {
            enabled: true,
            ..AnnotationConfig::default()
        }
    }

    #[test]
    fn test_utf16be_has_bom() {
        assert_eq!(utf16be("合"), vec![0xFE, 0xFF, 0x54, 0x08]);
    }

    #[test]
    fn test_annotations_land_top_right() {
        let mut pdf = one_page_pdf();
        annotate_document(&mut pdf, "HT-001", "2024年03月01日", &enabled()).unwrap();

        let page_id = pdf.page_id(0).unwrap();
        let page = pdf.doc().get_object(page_id).unwrap().as_dict().unwrap();
        let annots = page.get(b"Annots").unwrap().as_array().unwrap();
        assert_eq!(annots.len(), 2);

        let first = pdf
            .doc()
            .get_object(annots[0].as_reference().unwrap())
            .unwrap()
            .as_dict()
            .unwrap();
        assert_eq!(first.get(b"Subtype").unwrap().as_name().unwrap(), b"FreeText");
        let rect = first.get(b"Rect").unwrap().as_array().unwrap();
        let x0 = rect[0].as_float().unwrap();
        let y1 = rect[3].as_float().unwrap();
        assert_eq!(x0, 375.0);
        assert_eq!(y1, 812.0);

        let contents = match first.get(b"Contents").unwrap() {
            Object::String(bytes, _) => bytes.clone(),
            other => panic!("unexpected contents {:?}", other),
        };
        assert_eq!(contents, utf16be("合同编号: HT-001"));
    }

    #[test]
    fn test_disabled_copies_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        one_page_pdf().save(&source).unwrap();

        let annotated =
            try_annotate_contract(&source, &output, "HT-001", "today", &AnnotationConfig::default())
                .unwrap();
        assert!(!annotated);
        assert_eq!(std::fs::read(&source).unwrap(), std::fs::read(&output).unwrap());
    }

    #[test]
    fn test_enabled_writes_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        one_page_pdf().save(&source).unwrap();

        assert!(annotate_contract(&source, &output, "HT-001", "today", &enabled()));
        let doc = PdfDocument::open(&output).unwrap();
        let page = doc.doc().get_object(doc.page_id(0).unwrap()).unwrap().as_dict().unwrap();
        assert!(page.has(b"Annots"));
    }

    #[test]
    fn test_today_uses_format() {
        let config = AnnotationConfig {
            date_format: "%Y".to_string(),
            ..AnnotationConfig::default()
        };
        assert_eq!(today(&config).len(), 4);
    }
}
