//! Shared test fixtures: synthetic PDFs and a deterministic renderer.

use image::{Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

use crate::document::DocumentHandle;
use crate::error::{DocForgeError, Result};
use crate::render::PageRenderer;

/// Build a simple letter-sized PDF with `num_pages` pages of labeled text.
pub(crate) fn create_labeled_pdf(num_pages: u32, label: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::new();
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                ),
                Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("{}-{}", label, i + 1).into_bytes(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub(crate) fn create_test_pdf(num_pages: u32) -> Vec<u8> {
    create_labeled_pdf(num_pages, "Page")
}

/// Deterministic renderer producing a gradient with per-pixel texture, so
/// JPEG output size responds to both quality and resolution scale.
pub(crate) struct GradientRenderer;

impl PageRenderer for GradientRenderer {
    fn render_page(
        &self,
        doc: &DocumentHandle,
        page_index: usize,
        scale: f64,
    ) -> Result<RgbaImage> {
        let info = doc.page(page_index).ok_or(DocForgeError::Render {
            page: page_index,
            reason: "page index out of range".into(),
        })?;

        let w = (info.width * scale).round().max(1.0) as u32;
        let h = (info.height * scale).round().max(1.0) as u32;

        let mut img = RgbaImage::new(w, h);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let noise = ((x.wrapping_mul(31).wrapping_add(y.wrapping_mul(17))) % 64) as u8;
            let r = ((x * 255) / w.max(1)) as u8;
            let g = ((y * 255) / h.max(1)) as u8;
            *px = Rgba([r ^ noise, g, noise, 255]);
        }
        Ok(img)
    }
}

/// Renderer that always fails, for exercising fallback paths.
pub(crate) struct FailingRenderer;

impl PageRenderer for FailingRenderer {
    fn render_page(
        &self,
        _doc: &DocumentHandle,
        page_index: usize,
        _scale: f64,
    ) -> Result<RgbaImage> {
        Err(DocForgeError::Render {
            page: page_index,
            reason: "synthetic failure".into(),
        })
    }
}
