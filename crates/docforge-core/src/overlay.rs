//! Overlay stamping (watermarks, signatures)
//!
//! Draws text or image overlays into page content streams at positions
//! computed by shared-geom. The original content is wrapped in a saved
//! graphics state so an unbalanced source stream cannot displace the
//! overlay. A page that fails to stamp is left unmodified and reported;
//! the output page count always matches the input.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use shared_geom::{compute_single, compute_tiled, PageBounds, Size, TileSpacing};
use tracing::{debug, warn};

use crate::document::{inherited_entry, DocumentHandle};
use crate::error::{DocForgeError, Result};
use crate::operations::{OverlayContent, OverlayPosition, PageSelection, PlacementSpec, Skipped};

/// JPEG quality for embedded overlay images; overlays are small, so this
/// stays fixed rather than searched.
const OVERLAY_JPEG_QUALITY: u8 = 90;

/// Approximate Helvetica advance width as a fraction of the font size.
const TEXT_ADVANCE_RATIO: f64 = 0.55;

/// Stamp an overlay onto the selected pages.
///
/// `opacity` is clamped to [0,1] and `size_ratio` to (0,1]; a selection
/// referencing a page outside the document fails before any page work.
/// `on_page` is invoked once per targeted page.
pub fn place_overlay(
    bytes: &[u8],
    spec: &PlacementSpec,
    margin: f64,
    on_page: &mut dyn FnMut(usize, usize),
) -> Result<(Vec<u8>, Vec<Skipped>)> {
    let handle = DocumentHandle::load(bytes)?;
    let page_count = handle.page_count();

    let targets: Vec<usize> = match &spec.pages {
        PageSelection::All => (0..page_count).collect(),
        PageSelection::Only { indices } => {
            for &index in indices {
                if index >= page_count {
                    return Err(DocForgeError::InvalidOperation(format!(
                        "page index {} exceeds last page index {}",
                        index,
                        page_count - 1
                    )));
                }
            }
            indices.clone()
        }
    };
    if targets.is_empty() {
        return Err(DocForgeError::InvalidOperation(
            "no pages selected for overlay".into(),
        ));
    }

    let opacity = spec.opacity.clamp(0.0, 1.0);
    let size_ratio = spec.size_ratio.clamp(0.01, 1.0);

    let mut doc = handle.doc.clone();

    // Shared resources, added once and referenced from every stamped page.
    let gs_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(opacity as f32),
        "CA" => Object::Real(opacity as f32),
    });

    let prepared = match &spec.content {
        OverlayContent::Text { content } => {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
            });
            Prepared::Text {
                font_id,
                content: content.clone(),
            }
        }
        OverlayContent::Image { data } => {
            let decoded = image::load_from_memory(data).map_err(|e| {
                DocForgeError::Input(format!("overlay image is not a valid image: {}", e))
            })?;
            let rgb = decoded.to_rgb8();
            let (px_w, px_h) = rgb.dimensions();

            let mut jpeg = Vec::new();
            JpegEncoder::new_with_quality(&mut jpeg, OVERLAY_JPEG_QUALITY)
                .encode(rgb.as_raw(), px_w, px_h, ExtendedColorType::Rgb8)
                .map_err(|e| {
                    DocForgeError::Input(format!("failed to re-encode overlay image: {}", e))
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
            Prepared::Image {
                image_id,
                aspect: f64::from(px_h) / f64::from(px_w.max(1)),
            }
        }
    };

    let mut skipped = Vec::new();
    let total = targets.len();
    for (done, &index) in targets.iter().enumerate() {
        let result = stamp_page(
            &mut doc,
            &handle,
            index,
            &prepared,
            &spec.position,
            size_ratio,
            margin,
            gs_id,
        );
        if let Err(e) = result {
            warn!(page = index, error = %e, "overlay failed, leaving page unmodified");
            skipped.push(Skipped::new(index, e.to_string()));
        }
        on_page(done + 1, total);
    }

    if skipped.len() == targets.len() {
        return Err(DocForgeError::Assembly(
            "overlay could not be applied to any selected page".into(),
        ));
    }

    doc.compress();
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| DocForgeError::Assembly(format!("failed to save output: {}", e)))?;

    debug!(
        pages = total,
        skipped = skipped.len(),
        "overlay complete"
    );
    Ok((buffer, skipped))
}

enum Prepared {
    Text { font_id: ObjectId, content: String },
    Image { image_id: ObjectId, aspect: f64 },
}

#[allow(clippy::too_many_arguments)]
fn stamp_page(
    doc: &mut Document,
    handle: &DocumentHandle,
    index: usize,
    prepared: &Prepared,
    position: &OverlayPosition,
    size_ratio: f64,
    margin: f64,
    gs_id: ObjectId,
) -> Result<()> {
    let info = handle.page(index).ok_or_else(|| {
        DocForgeError::InvalidOperation(format!("page index {} out of range", index))
    })?;
    let page_id = handle
        .page_id(index)
        .ok_or_else(|| DocForgeError::Assembly(format!("page {} object missing", index)))?;
    let bounds = info.bounds();

    let (element, font_size) = element_size(prepared, bounds, size_ratio);
    let origins = match *position {
        OverlayPosition::Single { position } => {
            vec![compute_single(position, element, bounds, margin)]
        }
        OverlayPosition::Tiled => {
            // Text tiles tighter (1.5x/3x the element size) than images
            // (2x/4x); both live in shared-geom next to the grid math.
            let spacing = match prepared {
                Prepared::Text { .. } => TileSpacing::TEXT,
                Prepared::Image { .. } => TileSpacing::IMAGE,
            };
            compute_tiled(element, bounds, spacing)
        }
    };

    add_resource(doc, page_id, b"ExtGState", "GSov", Object::Reference(gs_id))?;
    let mut operations = vec![
        // Pop the wrapper state pushed ahead of the original content,
        // then open a clean state for the overlay itself.
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(b"GSov".to_vec())]),
    ];

    match prepared {
        Prepared::Text { font_id, content } => {
            add_resource(doc, page_id, b"Font", "Fov", Object::Reference(*font_id))?;
            operations.push(Operation::new(
                "rg",
                vec![
                    Object::Real(0.5),
                    Object::Real(0.5),
                    Object::Real(0.5),
                ],
            ));
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![
                    Object::Name(b"Fov".to_vec()),
                    Object::Real(font_size as f32),
                ],
            ));
            for origin in &origins {
                operations.push(Operation::new(
                    "Tm",
                    vec![
                        Object::Integer(1),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(1),
                        Object::Real(origin.x as f32),
                        Object::Real(origin.y as f32),
                    ],
                ));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(
                        content.as_bytes().to_vec(),
                        lopdf::StringFormat::Literal,
                    )],
                ));
            }
            operations.push(Operation::new("ET", vec![]));
        }
        Prepared::Image { image_id, .. } => {
            add_resource(doc, page_id, b"XObject", "ImOv", Object::Reference(*image_id))?;
            for origin in &origins {
                operations.push(Operation::new("q", vec![]));
                operations.push(Operation::new(
                    "cm",
                    vec![
                        Object::Real(element.width as f32),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(element.height as f32),
                        Object::Real(origin.x as f32),
                        Object::Real(origin.y as f32),
                    ],
                ));
                operations.push(Operation::new("Do", vec![Object::Name(b"ImOv".to_vec())]));
                operations.push(Operation::new("Q", vec![]));
            }
        }
    }
    operations.push(Operation::new("Q", vec![]));

    let overlay_bytes = Content { operations }
        .encode()
        .map_err(|e| DocForgeError::Assembly(e.to_string()))?;
    append_page_content(doc, page_id, overlay_bytes)
}

/// Element size in points for this page, plus the text font size.
fn element_size(prepared: &Prepared, bounds: PageBounds, size_ratio: f64) -> (Size, f64) {
    let width = bounds.width * size_ratio;
    match prepared {
        Prepared::Text { content, .. } => {
            let chars = content.chars().count().max(1) as f64;
            let font_size = width / (TEXT_ADVANCE_RATIO * chars);
            (Size::new(width, font_size), font_size)
        }
        Prepared::Image { aspect, .. } => (Size::new(width, width * aspect), 0.0),
    }
}

/// Register `name` under a resource category on the page, resolving
/// indirect Resources/category dictionaries rather than clobbering them.
fn add_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    name: &str,
    value: Object,
) -> Result<()> {
    let resources_ref: Option<ObjectId> = {
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| DocForgeError::Assembly(format!("page dictionary unreadable: {}", e)))?;
        match page.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };

    let category_ref: Option<ObjectId>;
    {
        let resources: &mut Dictionary = match resources_ref {
            Some(id) => doc
                .get_object_mut(id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| {
                    DocForgeError::Assembly(format!("resources dictionary unreadable: {}", e))
                })?,
            None => {
                // A page without its own entry may inherit Resources
                // from the page tree; copy the inherited dictionary down
                // so the original content's font/XObject names survive.
                let inherited = inherited_entry(doc, page_id, b"Resources");
                let page = doc
                    .get_object_mut(page_id)
                    .and_then(Object::as_dict_mut)
                    .map_err(|e| {
                        DocForgeError::Assembly(format!("page dictionary unreadable: {}", e))
                    })?;
                if page.get(b"Resources").is_err() {
                    let seed = match inherited {
                        Some(Object::Dictionary(d)) => d,
                        _ => Dictionary::new(),
                    };
                    page.set("Resources", Object::Dictionary(seed));
                }
                match page.get_mut(b"Resources") {
                    Ok(Object::Dictionary(d)) => d,
                    _ => {
                        return Err(DocForgeError::Assembly(
                            "page Resources is neither dictionary nor reference".into(),
                        ))
                    }
                }
            }
        };

        category_ref = match resources.get(category) {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        if category_ref.is_none() {
            if let Ok(Object::Dictionary(existing)) = resources.get_mut(category) {
                existing.set(name, value);
                return Ok(());
            }
            let mut fresh = Dictionary::new();
            fresh.set(name, value);
            resources.set(category, Object::Dictionary(fresh));
            return Ok(());
        }
    }

    doc.get_object_mut(category_ref.unwrap())
        .and_then(Object::as_dict_mut)
        .map_err(|e| DocForgeError::Assembly(format!("resource category unreadable: {}", e)))?
        .set(name, value);
    Ok(())
}

/// Append overlay content, wrapping the original stream in q/Q so its
/// final graphics state cannot leak into the overlay.
fn append_page_content(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> Result<()> {
    let wrapper_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| DocForgeError::Assembly(format!("page dictionary unreadable: {}", e)))?;

    let contents = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![
            Object::Reference(wrapper_id),
            Object::Reference(*id),
            Object::Reference(overlay_id),
        ],
        Ok(Object::Array(existing)) => {
            let mut arr = Vec::with_capacity(existing.len() + 2);
            arr.push(Object::Reference(wrapper_id));
            arr.extend(existing.iter().cloned());
            arr.push(Object::Reference(overlay_id));
            arr
        }
        _ => vec![
            Object::Reference(wrapper_id),
            Object::Reference(overlay_id),
        ],
    };
    page.set("Contents", Object::Array(contents));
    Ok(())
}
