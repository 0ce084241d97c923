//! Split operation
//!
//! Extracts page ranges into separate documents by deleting the
//! complement of each range and pruning what is no longer referenced.

use lopdf::Document;
use tracing::{debug, warn};

use crate::error::{DocForgeError, Result};
use crate::operations::Skipped;

/// Split a document into one output per range.
///
/// Ranges are zero-based inclusive `(start, end)` pairs; each valid range
/// becomes one output document with its pages in original order. A range
/// that falls outside the document is skipped and reported. `on_page` is
/// invoked once per extracted page.
pub fn split_document(
    bytes: &[u8],
    ranges: &[(usize, usize)],
    on_page: &mut dyn FnMut(usize, usize),
) -> Result<(Vec<Vec<u8>>, Vec<Skipped>)> {
    if ranges.is_empty() {
        return Err(DocForgeError::InvalidOperation(
            "no page ranges specified".into(),
        ));
    }

    let doc = Document::load_mem(bytes)
        .map_err(|e| DocForgeError::Input(format!("failed to parse PDF: {}", e)))?;
    let page_count = doc.get_pages().len();

    let mut skipped = Vec::new();
    let mut valid: Vec<(usize, usize)> = Vec::new();
    for (i, &(start, end)) in ranges.iter().enumerate() {
        if start > end {
            warn!(range = i, start, end, "descending split range, skipping");
            skipped.push(Skipped::new(
                i,
                format!("range start {} is after end {}", start, end),
            ));
        } else if end >= page_count {
            warn!(range = i, end, page_count, "split range out of bounds, skipping");
            skipped.push(Skipped::new(
                i,
                format!(
                    "range end {} exceeds last page index {}",
                    end,
                    page_count - 1
                ),
            ));
        } else {
            valid.push((start, end));
        }
    }

    if valid.is_empty() {
        return Err(DocForgeError::InvalidOperation(
            "no range falls inside the document".into(),
        ));
    }

    let total_pages: usize = valid.iter().map(|(s, e)| e - s + 1).sum();
    let mut done = 0;

    let mut outputs = Vec::with_capacity(valid.len());
    for (start, end) in valid {
        let mut part = doc.clone();

        // Delete the complement, highest page number first so earlier
        // deletions do not shift the remaining indices. lopdf page
        // numbers are 1-based.
        let to_delete: Vec<u32> = (0..page_count)
            .filter(|p| *p < start || *p > end)
            .map(|p| (p + 1) as u32)
            .rev()
            .collect();
        for page_num in to_delete {
            part.delete_pages(&[page_num]);
        }

        part.prune_objects();
        part.compress();

        let mut buffer = Vec::new();
        part.save_to(&mut buffer)
            .map_err(|e| DocForgeError::Assembly(format!("failed to save split part: {}", e)))?;
        outputs.push(buffer);

        for _ in start..=end {
            done += 1;
            on_page(done, total_pages);
        }
    }

    debug!(
        parts = outputs.len(),
        skipped = skipped.len(),
        "split complete"
    );
    Ok((outputs, skipped))
}
