//! Merge operation
//!
//! Combines multiple source documents into one, preserving source order.
//! An unreadable constituent is skipped and reported, not fatal; the
//! merge aborts only when nothing is readable at all.

use std::collections::BTreeMap;

use lopdf::{Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::error::{DocForgeError, Result};
use crate::operations::Skipped;

/// Merge source documents in order.
///
/// The algorithm:
/// 1. Load every source, collecting unreadable, encrypted, or empty
///    ones as skipped entries.
/// 2. Use the first readable document as the destination.
/// 3. For each remaining source, offset its object IDs past the
///    destination's maximum, import the remapped objects, and append its
///    pages to the destination page list.
/// 4. Rebuild the page tree, compress, and serialize.
///
/// `on_page` is invoked once per output page as pages are appended.
pub fn merge_documents(
    documents: &[Vec<u8>],
    on_page: &mut dyn FnMut(usize, usize),
) -> Result<(Vec<u8>, Vec<Skipped>)> {
    if documents.is_empty() {
        return Err(DocForgeError::Input("no documents to merge".into()));
    }

    let mut skipped = Vec::new();
    let mut loaded: Vec<(usize, Document)> = Vec::new();
    for (i, bytes) in documents.iter().enumerate() {
        match Document::load_mem(bytes) {
            Ok(doc) if doc.trailer.get(b"Encrypt").is_ok() => {
                warn!(source = i, "merge source is encrypted, skipping");
                skipped.push(Skipped::new(i, "document is encrypted"));
            }
            Ok(doc) if doc.get_pages().is_empty() => {
                warn!(source = i, "merge source has no pages, skipping");
                skipped.push(Skipped::new(i, "document has no pages"));
            }
            Ok(doc) => loaded.push((i, doc)),
            Err(e) => {
                warn!(source = i, error = %e, "merge source unreadable, skipping");
                skipped.push(Skipped::new(i, format!("failed to parse: {}", e)));
            }
        }
    }

    if loaded.is_empty() {
        return Err(DocForgeError::Input(format!(
            "none of the {} source documents could be read",
            documents.len()
        )));
    }

    let total_pages: usize = loaded.iter().map(|(_, d)| d.get_pages().len()).sum();

    // Single readable source: pass it through unchanged.
    if loaded.len() == 1 {
        let (index, _) = loaded[0];
        for done in 1..=total_pages {
            on_page(done, total_pages);
        }
        return Ok((documents[index].clone(), skipped));
    }

    let mut sources = loaded.into_iter();
    let (_, mut dest) = sources.next().unwrap();
    let mut dest_max_id = dest.max_id;
    let mut dest_page_refs = page_references(&dest);

    let mut done = dest_page_refs.len();
    for i in 1..=done {
        on_page(i, total_pages);
    }

    for (_, source) in sources {
        let source_pages = page_references(&source);
        let id_offset = dest_max_id;

        // Remap all object IDs in the source so they cannot collide.
        let mut remapped: BTreeMap<ObjectId, Object> = BTreeMap::new();
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            remapped.insert(new_id, remap_object_refs(object, id_offset));
        }
        for (id, object) in remapped {
            dest.objects.insert(id, object);
        }

        for old_page_ref in source_pages {
            dest_page_refs.push((old_page_ref.0 + id_offset, old_page_ref.1));
            done += 1;
            on_page(done, total_pages);
        }

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    update_page_tree(&mut dest, dest_page_refs)?;
    dest.max_id = dest_max_id;
    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer)
        .map_err(|e| DocForgeError::Assembly(format!("failed to save merged output: {}", e)))?;

    debug!(
        pages = total_pages,
        skipped = skipped.len(),
        bytes = buffer.len(),
        "merge complete"
    );
    Ok((buffer, skipped))
}

fn page_references(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Recursively shift every object reference by `offset`.
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
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Point the destination's page tree at the combined page list.
pub(crate) fn update_page_tree(doc: &mut Document, page_refs: Vec<ObjectId>) -> Result<()> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .map_err(|_| DocForgeError::Assembly("no Root in trailer".into()))?
        .as_reference()
        .map_err(|_| DocForgeError::Assembly("Root is not a reference".into()))?;

    let pages_id = doc
        .objects
        .get(&catalog_id)
        .ok_or_else(|| DocForgeError::Assembly("catalog object missing".into()))?
        .as_dict()
        .map_err(|_| DocForgeError::Assembly("catalog is not a dictionary".into()))?
        .get(b"Pages")
        .map_err(|_| DocForgeError::Assembly("no Pages in catalog".into()))?
        .as_reference()
        .map_err(|_| DocForgeError::Assembly("Pages is not a reference".into()))?;

    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages_dict)) => {
            let kids: Vec<Object> = page_refs.iter().map(|&id| Object::Reference(id)).collect();
            pages_dict.set("Kids", Object::Array(kids));
            pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
            Ok(())
        }
        _ => Err(DocForgeError::Assembly(
            "page tree root is not a dictionary".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::create_labeled_pdf;
    use pretty_assertions::assert_eq;

    fn no_progress() -> impl FnMut(usize, usize) {
        |_, _| {}
    }

    #[test]
    fn merge_empty_input_fails() {
        let err = merge_documents(&[], &mut no_progress()).unwrap_err();
        assert!(matches!(err, DocForgeError::Input(_)));
    }

    #[test]
    fn merge_three_single_page_documents_preserves_order() {
        let docs = vec![
            create_labeled_pdf(1, "First"),
            create_labeled_pdf(1, "Second"),
            create_labeled_pdf(1, "Third"),
        ];

        let (merged, skipped) = merge_documents(&docs, &mut no_progress()).unwrap();
        assert!(skipped.is_empty());

        let doc = Document::load_mem(&merged).unwrap();
        let pages: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(pages.len(), 3);

        // Source order must survive: page content carries the labels.
        let labels: Vec<String> = pages
            .iter()
            .map(|&id| String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).to_string())
            .collect();
        assert!(labels[0].contains("First-1"));
        assert!(labels[1].contains("Second-1"));
        assert!(labels[2].contains("Third-1"));
    }

    #[test]
    fn merge_combines_page_counts() {
        let docs = vec![create_labeled_pdf(2, "A"), create_labeled_pdf(3, "B")];
        let (merged, _) = merge_documents(&docs, &mut no_progress()).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 5);
    }

    #[test]
    fn merge_skips_unreadable_constituent_and_continues() {
        let docs = vec![
            create_labeled_pdf(2, "Good"),
            b"garbage bytes".to_vec(),
            create_labeled_pdf(1, "AlsoGood"),
        ];

        let (merged, skipped) = merge_documents(&docs, &mut no_progress()).unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].index, 1);
        assert!(skipped[0].reason.contains("failed to parse"));

        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn merge_skips_encrypted_constituent_and_continues() {
        let mut doc = Document::load_mem(&create_labeled_pdf(1, "Locked")).unwrap();
        let enc_id = doc.add_object(lopdf::dictionary! { "Filter" => "Standard" });
        doc.trailer.set("Encrypt", Object::Reference(enc_id));
        let mut encrypted = Vec::new();
        doc.save_to(&mut encrypted).unwrap();

        let docs = vec![
            create_labeled_pdf(2, "Plain"),
            encrypted,
            create_labeled_pdf(1, "AlsoPlain"),
        ];

        let (merged, skipped) = merge_documents(&docs, &mut no_progress()).unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].index, 1);
        assert!(skipped[0].reason.contains("encrypted"));

        let out = Document::load_mem(&merged).unwrap();
        assert_eq!(out.get_pages().len(), 3);
    }

    #[test]
    fn merge_fails_when_nothing_is_readable() {
        let docs = vec![b"nope".to_vec(), b"also nope".to_vec()];
        let err = merge_documents(&docs, &mut no_progress()).unwrap_err();
        assert!(matches!(err, DocForgeError::Input(_)));
    }

    #[test]
    fn merge_single_readable_source_passes_through() {
        let original = create_labeled_pdf(2, "Solo");
        let docs = vec![b"bad".to_vec(), original.clone()];
        let (merged, skipped) = merge_documents(&docs, &mut no_progress()).unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(merged, original);
    }

    #[test]
    fn merge_emits_monotonic_per_page_progress() {
        let docs = vec![create_labeled_pdf(2, "A"), create_labeled_pdf(2, "B")];
        let mut seen = Vec::new();
        let (_, _) = merge_documents(&docs, &mut |done, total| seen.push((done, total))).unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(seen.last().unwrap(), &(4, 4));
    }
}
