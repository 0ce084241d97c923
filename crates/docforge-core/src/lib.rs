//! On-device document assembly engine
//!
//! This crate provides client-side PDF manipulation using lopdf: merge,
//! split, page transforms (reorder, delete, rotate), size-targeted
//! compression, and overlay stamping. Rasterization is behind the
//! [`PageRenderer`] trait so the engine stays renderer-agnostic.
//!
//! All operations go through [`DocForge`], which validates inputs,
//! verifies outputs, and reports progress as a monotonic fraction.
//! Placement and coordinate math live in the `shared-geom` crate.

pub mod assemble;
pub mod compress;
pub mod document;
pub mod error;
pub mod merge;
pub mod operations;
pub mod overlay;
pub mod render;
pub mod split;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use assemble::{DocForge, EngineConfig, OperationReport, ProgressSink};
pub use compress::{
    compress_document, CompressionMethod, CompressionRequest, CompressionResult, QualityPreset,
};
pub use document::{DocumentHandle, PageInfo};
pub use error::{DocForgeError, Result};
pub use merge::merge_documents;
pub use operations::{
    DetectedCandidate, NormRegion, OverlayContent, OverlayPosition, PageSelection, PlacementSpec,
    Skipped,
};
pub use overlay::place_overlay;
pub use render::PageRenderer;
pub use split::split_document;
pub use transform::{delete_pages, reorder_pages, rotate_pages};

/// Parse PDF bytes and return the page count.
pub fn get_page_count(bytes: &[u8]) -> Result<usize> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| DocForgeError::Input(format!("failed to parse PDF: {}", e)))?;
    Ok(doc.get_pages().len())
}

/// Parse a page range string like "1-3, 5, 8-10" into zero-based
/// inclusive spans, preserving input order.
///
/// Page numbers in the input are 1-based, the way users write them.
pub fn parse_ranges(input: &str) -> Result<Vec<(usize, usize)>> {
    let mut ranges = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start.trim().parse().map_err(|_| {
                DocForgeError::InvalidOperation(format!("invalid range start: {}", start))
            })?;
            let end: usize = end.trim().parse().map_err(|_| {
                DocForgeError::InvalidOperation(format!("invalid range end: {}", end))
            })?;

            if start == 0 || end == 0 {
                return Err(DocForgeError::InvalidOperation(
                    "page numbers start at 1".into(),
                ));
            }
            if start > end {
                return Err(DocForgeError::InvalidOperation(format!(
                    "range start {} is after end {}",
                    start, end
                )));
            }
            ranges.push((start - 1, end - 1));
        } else {
            let page: usize = part.parse().map_err(|_| {
                DocForgeError::InvalidOperation(format!("invalid page number: {}", part))
            })?;
            if page == 0 {
                return Err(DocForgeError::InvalidOperation(
                    "page numbers start at 1".into(),
                ));
            }
            ranges.push((page - 1, page - 1));
        }
    }

    if ranges.is_empty() {
        return Err(DocForgeError::InvalidOperation(
            "no page ranges specified".into(),
        ));
    }
    Ok(ranges)
}
