//! Page dictionary surgery shared by merging, stamping and annotation

use crate::error::SealError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

const MAX_TREE_DEPTH: usize = 32;

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, SealError> {
    doc.get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| SealError::Pdf(format!("page {:?} is not a dictionary: {}", page_id, e)))
}

/// Nearest ancestor's raw value for `key`, references left unresolved
fn ancestor_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let page = doc.get_object(page_id).ok()?.as_dict().ok()?;
    let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_object(parent?).ok()?.as_dict().ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

/// Copy inherited attributes onto the page itself so it no longer depends
/// on its position in the page tree
pub(crate) fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> Result<(), SealError> {
    let missing: Vec<(&[u8], Object)> = {
        let page = doc
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| SealError::Pdf(e.to_string()))?;
        INHERITABLE
            .iter()
            .filter(|key| !page.has(key))
            .filter_map(|key| ancestor_attribute(doc, page_id, key).map(|value| (*key, value)))
            .collect()
    };

    if missing.is_empty() {
        return Ok(());
    }
    let page = page_dict_mut(doc, page_id)?;
    for (key, value) in missing {
        page.set(key.to_vec(), value);
    }
    Ok(())
}

/// The page's own Resources dictionary, created or copied inline as needed.
///
/// Shared resource dictionaries are copied so that registering a stamp on
/// one page never touches the others.
pub(crate) fn page_resources_mut(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<&mut Dictionary, SealError> {
    materialize_inherited(doc, page_id)?;

    let current = page_dict_mut(doc, page_id)?.get(b"Resources").ok().cloned();
    let inline = match current {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc
            .get_object(id)
            .and_then(|o| o.as_dict())
            .cloned()
            .unwrap_or_default(),
        _ => Dictionary::new(),
    };

    let page = page_dict_mut(doc, page_id)?;
    page.set("Resources", Object::Dictionary(inline));
    match page.get_mut(b"Resources") {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        _ => Err(SealError::Pdf("page resources are not a dictionary".into())),
    }
}

/// Register an XObject on a page under a fresh name and return that name
pub(crate) fn add_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    prefix: &str,
    xobject_id: ObjectId,
) -> Result<String, SealError> {
    // A referenced XObject dictionary is copied inline; its entries are
    // references themselves, so nothing is lost
    let referenced = match page_resources_mut(doc, page_id)?.get(b"XObject") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    let copied = referenced.and_then(|id| doc.get_object(id).and_then(|o| o.as_dict()).ok().cloned());

    let resources = page_resources_mut(doc, page_id)?;
    if let Some(dict) = copied {
        resources.set("XObject", Object::Dictionary(dict));
    }
    if !matches!(resources.get(b"XObject"), Ok(Object::Dictionary(_))) {
        resources.set("XObject", Object::Dictionary(Dictionary::new()));
    }
    let Ok(Object::Dictionary(xobjects)) = resources.get_mut(b"XObject") else {
        return Err(SealError::Pdf("XObject resources are not a dictionary".into()));
    };

    let name = (0..)
        .map(|i| format!("{}{}", prefix, i))
        .find(|candidate| !xobjects.has(candidate.as_bytes()))
        .unwrap_or_else(|| prefix.to_string());
    xobjects.set(name.clone(), Object::Reference(xobject_id));
    Ok(name)
}

/// Append drawing operators after the page's existing content.
///
/// The existing content is wrapped in `q … Q` the first time so that a
/// transform it leaves behind cannot displace what is drawn on top.
pub(crate) fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> Result<(), SealError> {
    let existing = match page_dict_mut(doc, page_id)?.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    // Streams are concatenated when read; keep a token boundary between them
    let mut tail = b"\n".to_vec();
    if !existing.is_empty() && !is_wrapped(doc, &existing) {
        let open = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        contents.push(Object::Reference(open));
        contents.extend(existing);
        tail.extend_from_slice(b"Q\n");
    } else {
        contents.extend(existing);
    }
    tail.extend_from_slice(&content);

    let mut stream = Stream::new(dictionary! {}, tail);
    // Compression is best effort, an uncompressed stream is still valid
    let _ = stream.compress();
    let stamp = doc.add_object(stream);
    contents.push(Object::Reference(stamp));

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// True when the first content stream is exactly the `q` this module adds
fn is_wrapped(doc: &Document, contents: &[Object]) -> bool {
    let Some(Object::Reference(id)) = contents.first() else {
        return false;
    };
    match doc.get_object(*id) {
        Ok(Object::Stream(stream)) => stream.content == b"q\n" && contents.len() > 1,
        _ => false,
    }
}

/// Attach an annotation to a page's `/Annots` array
pub(crate) fn add_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), SealError> {
    let referenced = match page_dict_mut(doc, page_id)?.get(b"Annots") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    if let Some(id) = referenced {
        if let Ok(Object::Array(arr)) = doc.get_object_mut(id) {
            arr.push(Object::Reference(annot_id));
            return Ok(());
        }
    }

    let page = page_dict_mut(doc, page_id)?;
    if let Ok(Object::Array(ref mut arr)) = page.get_mut(b"Annots") {
        arr.push(Object::Reference(annot_id));
    } else {
        page.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
    }
    Ok(())
}
