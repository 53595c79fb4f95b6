//! Contract merge
//!
//! Appends attachment PDFs to the main contract.

use crate::error::SealError;
use crate::page::materialize_inherited;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, error, info};

/// Merge the main contract and its attachments into `output`.
///
/// Attachment paths that do not exist are skipped. Returns false when
/// anything else goes wrong; the cause is logged.
pub fn merge_pdfs(
    main: impl AsRef<Path>,
    attachments: &[impl AsRef<Path>],
    output: impl AsRef<Path>,
) -> bool {
    match try_merge_pdfs(main, attachments, output) {
        Ok(_) => true,
        Err(e) => {
            error!(error = %e, "merge failed");
            false
        }
    }
}

/// Merge into `output` and return the merged page count
pub fn try_merge_pdfs(
    main: impl AsRef<Path>,
    attachments: &[impl AsRef<Path>],
    output: impl AsRef<Path>,
) -> Result<usize, SealError> {
    let main = main.as_ref();
    let mut documents = vec![load(main)?];

    for attachment in attachments {
        let path = attachment.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "attachment missing, skipped");
            continue;
        }
        documents.push(load(path)?);
    }

    let mut merged = merge_documents(documents)?;
    let page_count = merged.get_pages().len();
    merged
        .save(output.as_ref())
        .map_err(|e| SealError::Pdf(format!("Failed to save merged PDF: {}", e)))?;

    info!(
        main = %main.display(),
        output = %output.as_ref().display(),
        pages = page_count,
        "merged contract"
    );
    Ok(page_count)
}

fn load(path: &Path) -> Result<Document, SealError> {
    Document::load(path).map_err(|e| SealError::Parse(format!("{}: {}", path.display(), e)))
}

/// Merge loaded documents in order into one.
///
/// The first document is the destination. Every other document's objects
/// are imported with ids shifted past the destination's highest id, and
/// its pages are appended to the destination's page tree root.
pub fn merge_documents(documents: Vec<Document>) -> Result<Document, SealError> {
    let mut documents = documents.into_iter();
    let Some(mut dest) = documents.next() else {
        return Err(SealError::Pdf("No documents to merge".into()));
    };

    let mut dest_page_refs = prepare_pages(&mut dest)?;
    let mut dest_max_id = dest.max_id;

    for mut source in documents {
        let source_pages = prepare_pages(&mut source)?;
        let id_offset = dest_max_id;

        let mut remapped_objects = BTreeMap::new();
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            remapped_objects.insert(new_id, remap_object_refs(object, id_offset));
        }
        dest.objects.extend(remapped_objects);

        dest_page_refs.extend(
            source_pages
                .into_iter()
                .map(|(number, generation)| (number + id_offset, generation)),
        );
        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    dest.max_id = dest_max_id;
    update_page_tree(&mut dest, &dest_page_refs)?;
    // Catalogs and page tree nodes of the attachments are now unreachable
    dest.prune_objects();

    Ok(dest)
}

/// Page ids in order, with inherited attributes copied onto each page so
/// they survive being moved to another page tree
fn prepare_pages(doc: &mut Document) -> Result<Vec<ObjectId>, SealError> {
    let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    for page_id in &pages {
        materialize_inherited(doc, *page_id)?;
    }
    Ok(pages)
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Point the destination's page tree root at `page_refs` and re-parent
/// every page under it
fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<(), SealError> {
    let pages_id = doc
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(|pages| pages.as_reference())
        .map_err(|e| SealError::Pdf(format!("No page tree root: {}", e)))?;

    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages_dict)) => {
            let kids = page_refs.iter().map(|&id| Object::Reference(id)).collect();
            pages_dict.set("Kids", Object::Array(kids));
            pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
        }
        _ => return Err(SealError::Pdf("Invalid pages dictionary".into())),
    }

    for page_id in page_refs {
        if let Some(Object::Dictionary(page)) = doc.objects.get_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Dictionary, Stream};
    use pretty_assertions::assert_eq;

    /// A PDF with `num_pages` pages showing "<prefix>-Page-<n>"
    fn create_test_pdf(num_pages: u32, prefix: &str) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for page_num in 0..num_pages {
            let content = format!("BT /F1 12 Tf 50 700 Td ({}-Page-{}) Tj ET", prefix, page_num + 1);
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => num_pages as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn page_texts(doc: &Document) -> Vec<String> {
        doc.get_pages()
            .values()
            .map(|id| {
                let content = doc.get_page_content(*id).unwrap();
                let text = String::from_utf8_lossy(&content);
                let start = text.find('(').unwrap() + 1;
                let end = text.find(')').unwrap();
                text[start..end].to_string()
            })
            .collect()
    }

    #[test]
    fn test_merge_keeps_page_order() {
        let merged = merge_documents(vec![
            create_test_pdf(3, "Main"),
            create_test_pdf(2, "Att1"),
            create_test_pdf(1, "Att2"),
        ])
        .unwrap();

        assert_eq!(
            page_texts(&merged),
            vec![
                "Main-Page-1",
                "Main-Page-2",
                "Main-Page-3",
                "Att1-Page-1",
                "Att1-Page-2",
                "Att2-Page-1",
            ]
        );
    }

    #[test]
    fn test_merged_pages_keep_inherited_attributes() {
        let merged =
            merge_documents(vec![create_test_pdf(1, "Main"), create_test_pdf(1, "Att")]).unwrap();
        let root = merged
            .catalog()
            .unwrap()
            .get(b"Pages")
            .unwrap()
            .as_reference()
            .unwrap();

        for page_id in merged.get_pages().values() {
            let page = merged.get_object(*page_id).unwrap().as_dict().unwrap();
            assert!(page.has(b"MediaBox"));
            assert!(page.has(b"Resources"));
            assert_eq!(page.get(b"Parent").unwrap().as_reference().unwrap(), root);
        }
    }

    #[test]
    fn test_merge_single_document() {
        let merged = merge_documents(vec![create_test_pdf(2, "Only")]).unwrap();
        assert_eq!(merged.get_pages().len(), 2);
    }

    #[test]
    fn test_merge_nothing_fails() {
        assert!(matches!(merge_documents(vec![]), Err(SealError::Pdf(_))));
    }

    #[test]
    fn test_remap_object_refs() {
        let obj = Object::Array(vec![
            Object::Reference((3, 0)),
            Object::Dictionary(dictionary! { "Kid" => Object::Reference((7, 0)) }),
        ]);
        let remapped = remap_object_refs(obj, 10);
        let arr = remapped.as_array().unwrap();
        assert_eq!(arr[0].as_reference().unwrap(), (13, 0));
        let dict = arr[1].as_dict().unwrap();
        assert_eq!(dict.get(b"Kid").unwrap().as_reference().unwrap(), (17, 0));
    }

    #[test]
    fn test_merge_files_skips_missing_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.pdf");
        let att = dir.path().join("att.pdf");
        let out = dir.path().join("merged.pdf");
        create_test_pdf(2, "Main").save(&main).unwrap();
        create_test_pdf(1, "Att").save(&att).unwrap();

        let attachments = vec![att.clone(), dir.path().join("gone.pdf")];
        let pages = try_merge_pdfs(&main, &attachments, &out).unwrap();
        assert_eq!(pages, 3);
        assert_eq!(Document::load(&out).unwrap().get_pages().len(), 3);
    }

    #[test]
    fn test_merge_files_reports_unreadable_main() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.pdf");
        std::fs::write(&main, b"not a pdf").unwrap();
        let no_attachments: [&Path; 0] = [];
        assert!(!merge_pdfs(&main, &no_attachments, dir.path().join("out.pdf")));
        assert!(!dir.path().join("out.pdf").exists());
    }
}
