//! Page-sequence transforms: reorder, delete, rotate
//!
//! Each transform clones the source document and produces fresh bytes.
//! Invariants: the output always retains at least one page, and rotation
//! stays a multiple of 90 reduced mod 360.

use std::collections::BTreeSet;

use lopdf::{Document, Object};
use tracing::{debug, warn};

use crate::error::{DocForgeError, Result};
use crate::merge::update_page_tree;
use crate::operations::Skipped;

/// Emit pages in the requested order.
///
/// `new_order` is a permutation-like list of original zero-based indices;
/// entries referencing out-of-range indices are skipped and reported. An
/// order that would produce an empty document is rejected.
pub fn reorder_pages(
    bytes: &[u8],
    new_order: &[usize],
    on_page: &mut dyn FnMut(usize, usize),
) -> Result<(Vec<u8>, Vec<Skipped>)> {
    if new_order.is_empty() {
        return Err(DocForgeError::InvalidOperation(
            "no page order specified".into(),
        ));
    }

    let mut doc = Document::load_mem(bytes)
        .map_err(|e| DocForgeError::Input(format!("failed to parse PDF: {}", e)))?;
    let page_ids: Vec<_> = doc.get_pages().into_values().collect();

    let mut skipped = Vec::new();
    let mut reordered = Vec::with_capacity(new_order.len());
    for (pos, &index) in new_order.iter().enumerate() {
        match page_ids.get(index) {
            Some(&id) => reordered.push(id),
            None => {
                warn!(position = pos, index, "reorder entry out of range, skipping");
                skipped.push(Skipped::new(
                    pos,
                    format!(
                        "index {} exceeds last page index {}",
                        index,
                        page_ids.len() - 1
                    ),
                ));
            }
        }
    }

    if reordered.is_empty() {
        return Err(DocForgeError::InvalidOperation(
            "requested order references no existing pages".into(),
        ));
    }

    let total = reordered.len();
    update_page_tree(&mut doc, reordered)?;
    doc.prune_objects();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| DocForgeError::Assembly(format!("failed to save reordered output: {}", e)))?;

    for i in 1..=total {
        on_page(i, total);
    }
    debug!(pages = total, skipped = skipped.len(), "reorder complete");
    Ok((buffer, skipped))
}

/// Remove the given zero-based pages.
///
/// Fails if `indices` is empty, references a page outside the document,
/// or would remove every page.
pub fn delete_pages(
    bytes: &[u8],
    indices: &BTreeSet<usize>,
    on_page: &mut dyn FnMut(usize, usize),
) -> Result<Vec<u8>> {
    if indices.is_empty() {
        return Err(DocForgeError::InvalidOperation(
            "no pages selected for deletion".into(),
        ));
    }

    let mut doc = Document::load_mem(bytes)
        .map_err(|e| DocForgeError::Input(format!("failed to parse PDF: {}", e)))?;
    let page_count = doc.get_pages().len();

    if let Some(&max) = indices.iter().next_back() {
        if max >= page_count {
            return Err(DocForgeError::InvalidOperation(format!(
                "page index {} exceeds last page index {}",
                max,
                page_count - 1
            )));
        }
    }
    if indices.len() == page_count {
        return Err(DocForgeError::InvalidOperation(
            "cannot delete every page; documents must retain at least one".into(),
        ));
    }

    // Highest first so earlier deletions do not shift remaining numbers.
    let total = indices.len();
    for (i, &index) in indices.iter().rev().enumerate() {
        doc.delete_pages(&[(index + 1) as u32]);
        on_page(i + 1, total);
    }

    doc.prune_objects();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| DocForgeError::Assembly(format!("failed to save output: {}", e)))?;
    debug!(deleted = total, remaining = page_count - total, "delete complete");
    Ok(buffer)
}

/// Rotate the given zero-based pages by `angle` degrees.
///
/// `angle` must be a multiple of 90 (negative allowed). Each targeted
/// page gets `(current + angle) mod 360`; untouched pages pass through
/// unchanged.
pub fn rotate_pages(
    bytes: &[u8],
    indices: &BTreeSet<usize>,
    angle: i64,
    on_page: &mut dyn FnMut(usize, usize),
) -> Result<Vec<u8>> {
    if angle % 90 != 0 {
        return Err(DocForgeError::InvalidOperation(format!(
            "rotation angle {} is not a multiple of 90",
            angle
        )));
    }
    if indices.is_empty() {
        return Err(DocForgeError::InvalidOperation(
            "no pages selected for rotation".into(),
        ));
    }

    let mut doc = Document::load_mem(bytes)
        .map_err(|e| DocForgeError::Input(format!("failed to parse PDF: {}", e)))?;
    let page_ids: Vec<_> = doc.get_pages().into_values().collect();

    if let Some(&max) = indices.iter().next_back() {
        if max >= page_ids.len() {
            return Err(DocForgeError::InvalidOperation(format!(
                "page index {} exceeds last page index {}",
                max,
                page_ids.len() - 1
            )));
        }
    }

    let total = indices.len();
    for (i, &index) in indices.iter().enumerate() {
        let page_id = page_ids[index];
        let dict = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| DocForgeError::Assembly(format!("page {} unreadable: {}", index, e)))?;

        let current = dict
            .get(b"Rotate")
            .and_then(Object::as_i64)
            .unwrap_or(0);
        dict.set("Rotate", Object::Integer((current + angle).rem_euclid(360)));
        on_page(i + 1, total);
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| DocForgeError::Assembly(format!("failed to save output: {}", e)))?;
    debug!(rotated = total, angle, "rotate complete");
    Ok(buffer)
}
