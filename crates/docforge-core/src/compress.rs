//! Target-size compression search
//!
//! Re-encodes every page as a JPEG at a searched (quality, resolution
//! scale) pair. A coarse resolution tier is picked up front from how
//! aggressive the required ratio is, then encoding quality is
//! binary-searched within a fixed probe budget. The best at-or-under
//! target result across all probes wins; an infeasible target degrades to
//! the smallest artifact produced rather than an error.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::DocumentHandle;
use crate::error::{DocForgeError, Result};
use crate::render::PageRenderer;

const MAX_PROBES: u32 = 10;
const MIN_QUALITY: f64 = 0.05;
const MAX_QUALITY: f64 = 0.95;
/// Stop bisecting once the quality bracket is this narrow.
const BRACKET_EPSILON: f64 = 0.02;

/// Fixed quality tiers for callers that do not need a byte target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityPreset {
    Low,
    Medium,
    High,
}

impl QualityPreset {
    /// (encoding quality, resolution scale) for the preset.
    pub fn parameters(self) -> (f64, f64) {
        match self {
            QualityPreset::Low => (0.35, 0.5),
            QualityPreset::Medium => (0.6, 0.75),
            QualityPreset::High => (0.85, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompressionRequest {
    Preset { preset: QualityPreset },
    TargetBytes { target: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionMethod {
    /// Output meets the requested target.
    Exact,
    /// Target was unreachable; this is the smallest artifact achieved.
    Fallback,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompressionResult {
    pub output_bytes: u64,
    pub quality_used: f64,
    pub resolution_scale_used: f64,
    pub method: CompressionMethod,
}

/// One size measurement at a (quality, scale) pair. Abstracted so the
/// search loop can be exercised without a renderer.
pub(crate) trait SizeProbe {
    fn probe(&mut self, quality: f64, scale: f64) -> Result<Vec<u8>>;
}

/// Pick a raster scale from how much the document must shrink. Bounds the
/// per-probe rendering cost before any quality search happens.
pub(crate) fn resolution_tier(target: u64, original_size: u64) -> f64 {
    let ratio = target as f64 / original_size.max(1) as f64;
    if ratio < 0.15 {
        0.5
    } else if ratio < 0.30 {
        0.65
    } else if ratio < 0.50 {
        0.8
    } else {
        1.0
    }
}

/// Binary-search encoding quality for the largest quality at or under
/// `target` bytes.
///
/// A failed probe lowers the upper bound and the search continues with
/// the remaining budget. The result is the best at-or-under-target probe
/// seen across the whole run; if none met the target, the smallest
/// artifact produced is returned tagged [`CompressionMethod::Fallback`].
/// Only a run where every probe failed outright raises
/// [`DocForgeError::UnattainableTarget`].
pub(crate) fn search_target_size(
    probe: &mut dyn SizeProbe,
    target: u64,
    original_size: u64,
) -> Result<(Vec<u8>, CompressionResult)> {
    let scale = resolution_tier(target, original_size);
    let mut lo = MIN_QUALITY;
    let mut hi = MAX_QUALITY;

    let mut best_under: Option<(Vec<u8>, f64)> = None;
    let mut smallest: Option<(Vec<u8>, f64)> = None;

    for iteration in 0..MAX_PROBES {
        if hi - lo < BRACKET_EPSILON {
            break;
        }
        let quality = (lo + hi) / 2.0;

        let bytes = match probe.probe(quality, scale) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(iteration, quality, error = %e, "probe failed, reducing quality");
                hi = quality;
                continue;
            }
        };

        let size = bytes.len() as u64;
        debug!(iteration, quality, scale, size, target, "probe measured");

        if smallest
            .as_ref()
            .map_or(true, |(b, _)| size < b.len() as u64)
        {
            smallest = Some((bytes.clone(), quality));
        }

        if size <= target {
            if best_under.as_ref().map_or(true, |(_, q)| quality > *q) {
                best_under = Some((bytes, quality));
            }
            // Close enough: within 95-100% of the budget.
            if size >= target - target / 20 {
                let (bytes, quality) = best_under.unwrap();
                return Ok((
                    bytes,
                    CompressionResult {
                        output_bytes: size,
                        quality_used: quality,
                        resolution_scale_used: scale,
                        method: CompressionMethod::Exact,
                    },
                ));
            }
            lo = quality;
        } else {
            hi = quality;
        }
    }

    if let Some((bytes, quality)) = best_under {
        let output_bytes = bytes.len() as u64;
        return Ok((
            bytes,
            CompressionResult {
                output_bytes,
                quality_used: quality,
                resolution_scale_used: scale,
                method: CompressionMethod::Exact,
            },
        ));
    }
    if let Some((bytes, quality)) = smallest {
        let output_bytes = bytes.len() as u64;
        return Ok((
            bytes,
            CompressionResult {
                output_bytes,
                quality_used: quality,
                resolution_scale_used: scale,
                method: CompressionMethod::Fallback,
            },
        ));
    }
    Err(DocForgeError::UnattainableTarget { target })
}

/// Compress a document per `request`, rendering through `renderer`.
///
/// `on_page` receives (work units done, total budgeted units); target
/// searches budget one unit per page per probe.
pub fn compress_document(
    bytes: &[u8],
    request: &CompressionRequest,
    renderer: &dyn PageRenderer,
    on_page: &mut dyn FnMut(usize, usize),
) -> Result<(Vec<u8>, CompressionResult)> {
    let handle = DocumentHandle::load(bytes)?;

    match *request {
        CompressionRequest::Preset { preset } => {
            let (quality, scale) = preset.parameters();
            let total = handle.page_count();
            let mut done = 0;
            let output = rebuild_raster_pdf(&handle, renderer, quality, scale, &mut |_| {
                done += 1;
                on_page(done, total);
            })?;
            let output_bytes = output.len() as u64;
            Ok((
                output,
                CompressionResult {
                    output_bytes,
                    quality_used: quality,
                    resolution_scale_used: scale,
                    method: CompressionMethod::Exact,
                },
            ))
        }
        CompressionRequest::TargetBytes { target } => {
            let mut probe = RenderProbe {
                handle: &handle,
                renderer,
                units_done: 0,
                units_total: handle.page_count() * MAX_PROBES as usize,
                on_page,
            };
            search_target_size(&mut probe, target, bytes.len() as u64)
        }
    }
}

struct RenderProbe<'a> {
    handle: &'a DocumentHandle,
    renderer: &'a dyn PageRenderer,
    units_done: usize,
    units_total: usize,
    on_page: &'a mut dyn FnMut(usize, usize),
}

impl SizeProbe for RenderProbe<'_> {
    fn probe(&mut self, quality: f64, scale: f64) -> Result<Vec<u8>> {
        let units_total = self.units_total;
        let units_done = &mut self.units_done;
        let on_page = &mut *self.on_page;
        rebuild_raster_pdf(self.handle, self.renderer, quality, scale, &mut |_| {
            *units_done += 1;
            on_page(*units_done, units_total);
        })
    }
}

/// Rebuild the document with every page replaced by one full-page JPEG.
///
/// A page whose render fails is left unmodified rather than dropped, so
/// the output page count always matches the input. Errors only when not
/// a single page could be rendered.
pub(crate) fn rebuild_raster_pdf(
    handle: &DocumentHandle,
    renderer: &dyn PageRenderer,
    quality: f64,
    scale: f64,
    on_page: &mut dyn FnMut(usize),
) -> Result<Vec<u8>> {
    let mut doc = handle.doc.clone();
    let mut rendered = 0usize;
    let mut last_error = None;

    for index in 0..handle.page_count() {
        match renderer.render_page(handle, index, scale) {
            Ok(img) => {
                replace_page_with_jpeg(&mut doc, handle, index, img, quality)?;
                rendered += 1;
            }
            Err(e) => {
                warn!(page = index, error = %e, "render failed, keeping page unmodified");
                last_error = Some(e);
            }
        }
        on_page(index);
    }

    if rendered == 0 {
        return Err(last_error.unwrap_or(DocForgeError::Render {
            page: 0,
            reason: "document has no pages".into(),
        }));
    }

    doc.prune_objects();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| DocForgeError::Assembly(format!("failed to save compressed output: {}", e)))?;
    Ok(buffer)
}

fn replace_page_with_jpeg(
    doc: &mut lopdf::Document,
    handle: &DocumentHandle,
    index: usize,
    img: image::RgbaImage,
    quality: f64,
) -> Result<()> {
    let info = handle.page(index).ok_or(DocForgeError::Render {
        page: index,
        reason: "page index out of range".into(),
    })?;
    let page_id = handle.page_id(index).ok_or(DocForgeError::Render {
        page: index,
        reason: "page object missing".into(),
    })?;

    let (px_w, px_h) = img.dimensions();
    let rgb = DynamicImage::ImageRgba8(img).to_rgb8();

    let jpeg_quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality)
        .encode(rgb.as_raw(), px_w, px_h, ExtendedColorType::Rgb8)
        .map_err(|e| DocForgeError::Render {
            page: index,
            reason: format!("JPEG encoding failed: {}", e),
        })?;

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => px_w as i64,
            "Height" => px_h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    // Draw the image across the page's full point extent.
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(info.width as f32),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(info.height as f32),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_bytes = content.encode().map_err(|e| DocForgeError::Assembly(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| DocForgeError::Assembly(format!("page {} unreadable: {}", index, e)))?;
    page.set("Contents", Object::Reference(content_id));
    page.set(
        "Resources",
        Object::Dictionary(dictionary! {
            "XObject" => dictionary! { "Im0" => Object::Reference(image_id) },
        }),
    );
    Ok(())
}
