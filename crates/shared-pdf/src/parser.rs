//! PDF parsing and page access using lopdf

use crate::coords::MediaBox;
use crate::error::PdfError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;

/// Reference chains longer than this are treated as broken
const MAX_REFERENCE_DEPTH: usize = 32;

/// Wrapper around lopdf::Document with page-indexed access.
///
/// Page indices are 0-based throughout; lopdf's own page numbers start at 1.
pub struct PdfDocument {
    doc: Document,
}

impl PdfDocument {
    /// Load a PDF from disk. The file handle is closed before this returns.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        let path = path.as_ref();
        let doc = Document::load(path)
            .map_err(|e| PdfError::ParseError(format!("{}: {}", path.display(), e)))?;
        Ok(Self { doc })
    }

    /// Load a PDF from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfError::ParseError(e.to_string()))?;
        Ok(Self { doc })
    }

    pub fn from_document(doc: Document) -> Self {
        Self { doc }
    }

    /// Get the number of pages
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Page object ids in page order
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().values().copied().collect()
    }

    /// Get page object ID for a 0-based page index
    pub fn page_id(&self, index: usize) -> Option<ObjectId> {
        let number = u32::try_from(index + 1).ok()?;
        self.doc.get_pages().get(&number).copied()
    }

    /// MediaBox of a page, inherited from the page tree when the page has none.
    /// Falls back to US Letter when no usable box exists anywhere.
    pub fn media_box(&self, page_id: ObjectId) -> MediaBox {
        self.inherited_attribute(page_id, b"MediaBox")
            .and_then(|obj| parse_rect(&self.doc, obj))
            .unwrap_or(MediaBox::LETTER)
    }

    /// MediaBox of a page by 0-based index
    pub fn page_media_box(&self, index: usize) -> Result<MediaBox, PdfError> {
        let page_id = self.page_id(index).ok_or(PdfError::PageNotFound(index))?;
        Ok(self.media_box(page_id))
    }

    /// Look up a page attribute, walking up `Parent` links for inheritable keys
    pub fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        inherited_attribute(&self.doc, page_id, key)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// Get mutable access to the internal document
    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn into_inner(self) -> Document {
        self.doc
    }

    /// Save the document to bytes
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(buffer)
    }

    /// Save the document to a file
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), PdfError> {
        let bytes = self.save_to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// Follow indirect references until a direct object is reached
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_REFERENCE_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Resolve an object and view it as a dictionary (stream dictionaries included)
pub fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Look up `key` in a dictionary and resolve the value
pub fn dict_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|obj| resolve(doc, obj))
}

/// Extract a number from a PDF object
pub fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Look up a page attribute, walking up `Parent` links
pub fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);
    for _ in 0..MAX_REFERENCE_DEPTH {
        let id = current?;
        let dict = doc.get_object(id).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

/// Parse a PDF rectangle array into a normalised MediaBox
fn parse_rect(doc: &Document, obj: &Object) -> Option<MediaBox> {
    let arr = resolve(doc, obj)?.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut values = [0.0f64; 4];
    for (slot, item) in values.iter_mut().zip(arr) {
        *slot = object_to_f64(resolve(doc, item)?)?;
    }
    let mb = MediaBox::from_corners(values[0], values[1], values[2], values[3]);
    (mb.width > 0.0 && mb.height > 0.0).then_some(mb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_pdf, TestPage};
    use lopdf::dictionary;

    #[test]
    fn test_from_bytes_html_fails() {
        let html_bytes = b"<!DOCTYPE html><html><head></head><body>Not a PDF</body></html>";
        let result = PdfDocument::from_bytes(html_bytes);
        assert!(matches!(result, Err(PdfError::ParseError(_))));
    }

    #[test]
    fn test_from_bytes_empty_fails() {
        assert!(PdfDocument::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_open_missing_file_fails() {
        let result = PdfDocument::open("/nonexistent/contract.pdf");
        assert!(result.is_err());
    }

    #[test]
    fn test_page_ids_are_zero_indexed() {
        let bytes = build_pdf(&[TestPage::a4(), TestPage::a4(), TestPage::letter()]);
        let pdf = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(pdf.page_count(), 3);
        assert!(pdf.page_id(0).is_some());
        assert!(pdf.page_id(2).is_some());
        assert!(pdf.page_id(3).is_none());
        assert_eq!(pdf.page_ids().len(), 3);
    }

    #[test]
    fn test_page_media_box() {
        let bytes = build_pdf(&[TestPage::a4(), TestPage::letter()]);
        let pdf = PdfDocument::from_bytes(&bytes).unwrap();
        let a4 = pdf.page_media_box(0).unwrap();
        assert_eq!((a4.width, a4.height), (595.0, 842.0));
        let letter = pdf.page_media_box(1).unwrap();
        assert_eq!((letter.width, letter.height), (612.0, 792.0));
        assert!(matches!(
            pdf.page_media_box(5),
            Err(PdfError::PageNotFound(5))
        ));
    }

    #[test]
    fn test_media_box_inherited_from_parent() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 420.into(), 595.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let pdf = PdfDocument::from_document(doc);
        let mb = pdf.page_media_box(0).unwrap();
        assert_eq!((mb.width, mb.height), (420.0, 595.0));
    }

    #[test]
    fn test_missing_media_box_defaults_to_letter() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let pdf = PdfDocument::from_document(doc);
        assert_eq!(pdf.media_box(page_id), MediaBox::LETTER);
    }

    #[test]
    fn test_object_to_f64() {
        assert_eq!(object_to_f64(&Object::Integer(42)), Some(42.0));
        let real = object_to_f64(&Object::Real(1.25)).unwrap();
        assert!((real - 1.25).abs() < 0.001);
        assert_eq!(object_to_f64(&Object::Boolean(true)), None);
    }

    #[test]
    fn test_save_round_trip() {
        let bytes = build_pdf(&[TestPage::a4()]);
        let mut pdf = PdfDocument::from_bytes(&bytes).unwrap();
        let saved = pdf.save_to_bytes().unwrap();
        assert!(saved.starts_with(b"%PDF-"));
        assert_eq!(PdfDocument::from_bytes(&saved).unwrap().page_count(), 1);
    }
}
