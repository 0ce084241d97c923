//! Operation facade and output verification
//!
//! [`DocForge`] runs every operation through the same pipeline: validate
//! inputs, check storage headroom, execute the per-page work, verify the
//! assembled output parses with the expected page count, and report.
//! Progress reaches the caller as a monotonic fraction in [0, 1].

use std::collections::BTreeSet;
use std::time::Instant;

use lopdf::Document;
use tracing::info;

use crate::compress::{self, CompressionRequest, CompressionResult};
use crate::document::DocumentHandle;
use crate::error::{DocForgeError, Result};
use crate::operations::{PlacementSpec, Skipped};
use crate::render::PageRenderer;
use crate::{merge, overlay, split, transform};

/// Engine-wide knobs, injected rather than read from globals.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Margin in points applied to edge overlay positions.
    pub margin: f64,
    /// Storage headroom in bytes; `None` disables the preflight check.
    pub available_space: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            margin: 20.0,
            available_space: None,
        }
    }
}

/// What an operation did, for callers that surface results to users.
#[derive(Debug, Clone)]
pub struct OperationReport {
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub page_count: usize,
    pub elapsed_ms: u64,
    pub skipped: Vec<Skipped>,
}

/// Forwards progress fractions to an optional callback, clamped to
/// [0, 1] and never moving backwards.
pub struct ProgressSink<'a> {
    callback: Option<&'a mut dyn FnMut(f64)>,
    last: f64,
}

impl<'a> ProgressSink<'a> {
    pub fn new(callback: Option<&'a mut dyn FnMut(f64)>) -> Self {
        ProgressSink {
            callback,
            last: 0.0,
        }
    }

    pub fn emit(&mut self, fraction: f64) {
        let clamped = fraction.clamp(0.0, 1.0);
        if clamped > self.last {
            self.last = clamped;
            if let Some(cb) = self.callback.as_mut() {
                cb(clamped);
            }
        }
    }

    pub fn finish(&mut self) {
        self.emit(1.0);
    }
}

/// The document engine. Stateless apart from configuration; every method
/// takes input bytes and returns fresh output bytes plus a report.
#[derive(Debug, Clone, Default)]
pub struct DocForge {
    config: EngineConfig,
}

impl DocForge {
    pub fn new(config: EngineConfig) -> Self {
        DocForge { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Merge documents in order. Unreadable constituents are skipped and
    /// reported; the merge fails only when nothing is readable.
    pub fn merge(
        &self,
        documents: &[Vec<u8>],
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<(Vec<u8>, OperationReport)> {
        let started = Instant::now();
        let input_bytes: u64 = documents.iter().map(|d| d.len() as u64).sum();
        self.preflight(input_bytes)?;

        let mut sink = ProgressSink::new(progress);
        let (output, skipped) = {
            let mut on_page = |done: usize, total: usize| {
                sink.emit(done as f64 / total.max(1) as f64);
            };
            merge::merge_documents(documents, &mut on_page)?
        };

        let page_count = verify_output(&output, None)?;
        sink.finish();

        let report = self.report(started, input_bytes, output.len() as u64, page_count, skipped);
        info!(
            sources = documents.len(),
            pages = page_count,
            skipped = report.skipped.len(),
            "merge finished"
        );
        Ok((output, report))
    }

    /// Extract one output document per page range.
    pub fn split(
        &self,
        bytes: &[u8],
        ranges: &[(usize, usize)],
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<(Vec<Vec<u8>>, OperationReport)> {
        let started = Instant::now();
        self.preflight(bytes.len() as u64)?;
        let handle = DocumentHandle::load(bytes)?;

        let mut sink = ProgressSink::new(progress);
        let (parts, skipped) = {
            let mut on_page = |done: usize, total: usize| {
                sink.emit(done as f64 / total.max(1) as f64);
            };
            split::split_document(bytes, ranges, &mut on_page)?
        };

        let mut page_count = 0;
        for part in &parts {
            page_count += verify_output(part, None)?;
        }
        sink.finish();

        let output_bytes: u64 = parts.iter().map(|p| p.len() as u64).sum();
        let report = self.report(started, bytes.len() as u64, output_bytes, page_count, skipped);
        info!(
            source_pages = handle.page_count(),
            parts = parts.len(),
            pages = page_count,
            "split finished"
        );
        Ok((parts, report))
    }

    /// Re-encode the document toward a preset or byte target.
    pub fn compress(
        &self,
        bytes: &[u8],
        request: &CompressionRequest,
        renderer: &dyn PageRenderer,
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<(Vec<u8>, CompressionResult, OperationReport)> {
        let started = Instant::now();
        self.preflight(bytes.len() as u64)?;
        let expected_pages = DocumentHandle::load(bytes)?.page_count();

        let mut sink = ProgressSink::new(progress);
        let (output, result) = {
            let mut on_page = |done: usize, total: usize| {
                sink.emit(done as f64 / total.max(1) as f64);
            };
            compress::compress_document(bytes, request, renderer, &mut on_page)?
        };

        let page_count = verify_output(&output, Some(expected_pages))?;
        sink.finish();

        let report = self.report(
            started,
            bytes.len() as u64,
            output.len() as u64,
            page_count,
            Vec::new(),
        );
        info!(
            pages = page_count,
            quality = result.quality_used,
            scale = result.resolution_scale_used,
            method = ?result.method,
            "compress finished"
        );
        Ok((output, result, report))
    }

    /// Stamp a text or image overlay onto the selected pages.
    pub fn place_overlay(
        &self,
        bytes: &[u8],
        spec: &PlacementSpec,
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<(Vec<u8>, OperationReport)> {
        let started = Instant::now();
        self.preflight(bytes.len() as u64)?;
        let expected_pages = DocumentHandle::load(bytes)?.page_count();

        let mut sink = ProgressSink::new(progress);
        let (output, skipped) = {
            let mut on_page = |done: usize, total: usize| {
                sink.emit(done as f64 / total.max(1) as f64);
            };
            overlay::place_overlay(bytes, spec, self.config.margin, &mut on_page)?
        };

        let page_count = verify_output(&output, Some(expected_pages))?;
        sink.finish();

        let report = self.report(started, bytes.len() as u64, output.len() as u64, page_count, skipped);
        info!(
            pages = page_count,
            skipped = report.skipped.len(),
            "overlay finished"
        );
        Ok((output, report))
    }

    /// Emit pages in the requested order.
    pub fn reorder_pages(
        &self,
        bytes: &[u8],
        new_order: &[usize],
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<(Vec<u8>, OperationReport)> {
        let started = Instant::now();
        self.preflight(bytes.len() as u64)?;
        DocumentHandle::load(bytes)?;

        let mut sink = ProgressSink::new(progress);
        let (output, skipped) = {
            let mut on_page = |done: usize, total: usize| {
                sink.emit(done as f64 / total.max(1) as f64);
            };
            transform::reorder_pages(bytes, new_order, &mut on_page)?
        };

        let expected = new_order.len() - skipped.len();
        let page_count = verify_output(&output, Some(expected))?;
        sink.finish();

        let report = self.report(started, bytes.len() as u64, output.len() as u64, page_count, skipped);
        info!(pages = page_count, "reorder finished");
        Ok((output, report))
    }

    /// Delete the given zero-based pages.
    pub fn delete_pages(
        &self,
        bytes: &[u8],
        indices: &BTreeSet<usize>,
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<(Vec<u8>, OperationReport)> {
        let started = Instant::now();
        self.preflight(bytes.len() as u64)?;
        let before = DocumentHandle::load(bytes)?.page_count();

        let mut sink = ProgressSink::new(progress);
        let output = {
            let mut on_page = |done: usize, total: usize| {
                sink.emit(done as f64 / total.max(1) as f64);
            };
            transform::delete_pages(bytes, indices, &mut on_page)?
        };

        let page_count = verify_output(&output, Some(before - indices.len()))?;
        sink.finish();

        let report = self.report(
            started,
            bytes.len() as u64,
            output.len() as u64,
            page_count,
            Vec::new(),
        );
        info!(deleted = indices.len(), pages = page_count, "delete finished");
        Ok((output, report))
    }

    /// Rotate the given zero-based pages by a multiple of 90 degrees.
    pub fn rotate_pages(
        &self,
        bytes: &[u8],
        indices: &BTreeSet<usize>,
        angle: i64,
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<(Vec<u8>, OperationReport)> {
        let started = Instant::now();
        self.preflight(bytes.len() as u64)?;
        let before = DocumentHandle::load(bytes)?.page_count();

        let mut sink = ProgressSink::new(progress);
        let output = {
            let mut on_page = |done: usize, total: usize| {
                sink.emit(done as f64 / total.max(1) as f64);
            };
            transform::rotate_pages(bytes, indices, angle, &mut on_page)?
        };

        let page_count = verify_output(&output, Some(before))?;
        sink.finish();

        let report = self.report(
            started,
            bytes.len() as u64,
            output.len() as u64,
            page_count,
            Vec::new(),
        );
        info!(rotated = indices.len(), angle, "rotate finished");
        Ok((output, report))
    }

    /// Fail early when the inputs alone exceed the configured headroom.
    /// Output size is unknown before assembly; input size is the floor.
    fn preflight(&self, needed: u64) -> Result<()> {
        if let Some(available) = self.config.available_space {
            if needed > available {
                return Err(DocForgeError::Resource { needed, available });
            }
        }
        Ok(())
    }

    fn report(
        &self,
        started: Instant,
        input_bytes: u64,
        output_bytes: u64,
        page_count: usize,
        skipped: Vec<Skipped>,
    ) -> OperationReport {
        OperationReport {
            input_bytes,
            output_bytes,
            page_count,
            elapsed_ms: started.elapsed().as_millis() as u64,
            skipped,
        }
    }
}

/// Reload the assembled bytes and confirm they parse with pages intact.
fn verify_output(bytes: &[u8], expected_pages: Option<usize>) -> Result<usize> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| DocForgeError::Assembly(format!("output failed verification: {}", e)))?;
    let pages = doc.get_pages().len();
    if pages == 0 {
        return Err(DocForgeError::Assembly(
            "output has no pages after assembly".into(),
        ));
    }
    if let Some(expected) = expected_pages {
        if pages != expected {
            return Err(DocForgeError::Assembly(format!(
                "output has {} pages, expected {}",
                pages, expected
            )));
        }
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::{CompressionMethod, QualityPreset};
    use crate::operations::{OverlayContent, OverlayPosition, PageSelection};
    use crate::test_fixtures::{create_labeled_pdf, create_test_pdf, GradientRenderer};
    use pretty_assertions::assert_eq;
    use shared_geom::{GridPosition, NormPoint};

    fn engine() -> DocForge {
        DocForge::default()
    }

    #[test]
    fn merge_three_documents_reports_three_pages() {
        let docs = vec![
            create_labeled_pdf(1, "A"),
            create_labeled_pdf(1, "B"),
            create_labeled_pdf(1, "C"),
        ];

        let mut fractions = Vec::new();
        let mut progress = |f: f64| fractions.push(f);
        let (output, report) = engine().merge(&docs, Some(&mut progress)).unwrap();

        assert_eq!(report.page_count, 3);
        assert!(report.skipped.is_empty());
        assert_eq!(report.output_bytes, output.len() as u64);

        // Progress is monotonic and ends at completion.
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*fractions.last().unwrap(), 1.0);
        assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));

        let doc = Document::load_mem(&output).unwrap();
        let pages: Vec<_> = doc.get_pages().into_values().collect();
        let first = String::from_utf8_lossy(&doc.get_page_content(pages[0]).unwrap()).to_string();
        let last = String::from_utf8_lossy(&doc.get_page_content(pages[2]).unwrap()).to_string();
        assert!(first.contains("A-1"));
        assert!(last.contains("C-1"));
    }

    #[test]
    fn split_reports_combined_part_sizes() {
        let pdf = create_test_pdf(10);
        let (parts, report) = engine().split(&pdf, &[(0, 4), (5, 9)], None).unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(report.page_count, 10);
        let total: u64 = parts.iter().map(|p| p.len() as u64).sum();
        assert_eq!(report.output_bytes, total);
    }

    #[test]
    fn compress_preset_preserves_page_count() {
        let pdf = create_test_pdf(5);
        let request = CompressionRequest::Preset {
            preset: QualityPreset::Medium,
        };
        let (output, result, report) = engine()
            .compress(&pdf, &request, &GradientRenderer, None)
            .unwrap();

        assert_eq!(report.page_count, 5);
        assert_eq!(result.method, CompressionMethod::Exact);
        assert_eq!(report.output_bytes, output.len() as u64);
        assert_eq!(result.output_bytes, output.len() as u64);
    }

    #[test]
    fn overlay_on_one_page_leaves_others_untouched() {
        let pdf = create_test_pdf(3);
        let spec = PlacementSpec {
            content: OverlayContent::Text {
                content: "SIGNED".into(),
            },
            position: OverlayPosition::Single {
                position: GridPosition::Custom {
                    point: NormPoint::new(0.5, 0.9),
                },
            },
            opacity: 0.8,
            size_ratio: 0.2,
            pages: PageSelection::Only { indices: vec![1] },
        };

        let (output, report) = engine().place_overlay(&pdf, &spec, None).unwrap();
        assert_eq!(report.page_count, 3);

        let before = Document::load_mem(&pdf).unwrap();
        let after = Document::load_mem(&output).unwrap();
        let before_pages: Vec<_> = before.get_pages().into_values().collect();
        let after_pages: Vec<_> = after.get_pages().into_values().collect();
        for i in [0usize, 2] {
            assert_eq!(
                before.get_page_content(before_pages[i]).unwrap(),
                after.get_page_content(after_pages[i]).unwrap(),
            );
        }
    }

    #[test]
    fn reorder_through_facade_verifies_page_count() {
        let pdf = create_test_pdf(3);
        let (output, report) = engine().reorder_pages(&pdf, &[2, 0, 1], None).unwrap();
        assert_eq!(report.page_count, 3);
        assert!(Document::load_mem(&output).is_ok());
    }

    #[test]
    fn delete_through_facade_reports_remaining_pages() {
        let pdf = create_test_pdf(4);
        let indices: BTreeSet<usize> = [1, 2].into_iter().collect();
        let (_, report) = engine().delete_pages(&pdf, &indices, None).unwrap();
        assert_eq!(report.page_count, 2);
    }

    #[test]
    fn rotate_through_facade_preserves_page_count() {
        let pdf = create_test_pdf(2);
        let indices: BTreeSet<usize> = [0, 1].into_iter().collect();
        let (output, report) = engine().rotate_pages(&pdf, &indices, 90, None).unwrap();
        assert_eq!(report.page_count, 2);

        let handle = DocumentHandle::load(&output).unwrap();
        assert_eq!(handle.page(0).unwrap().rotation, 90);
    }

    #[test]
    fn preflight_rejects_inputs_larger_than_available_space() {
        let pdf = create_test_pdf(2);
        let forge = DocForge::new(EngineConfig {
            available_space: Some(16),
            ..EngineConfig::default()
        });

        let err = forge.merge(&[pdf], None).unwrap_err();
        match err {
            DocForgeError::Resource { needed, available } => {
                assert_eq!(available, 16);
                assert!(needed > 16);
            }
            other => panic!("expected resource error, got {:?}", other),
        }
    }

    #[test]
    fn progress_sink_never_moves_backwards() {
        let mut seen = Vec::new();
        let mut cb = |f: f64| seen.push(f);
        let mut sink = ProgressSink::new(Some(&mut cb));
        sink.emit(0.4);
        sink.emit(0.2);
        sink.emit(0.9);
        sink.emit(2.0);
        sink.finish();
        assert_eq!(seen, vec![0.4, 0.9, 1.0]);
    }

    #[test]
    fn invalid_input_bytes_surface_as_input_error() {
        let err = engine().split(b"not a pdf", &[(0, 0)], None).unwrap_err();
        assert!(matches!(err, DocForgeError::Input(_)));
    }
}
