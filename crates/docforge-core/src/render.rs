//! Rasterization seam
//!
//! The engine never rasterizes page content itself; a collaborator
//! implements [`PageRenderer`] (pdfium, a print pipeline, a test double).
//! Rendered pixels arrive in raster space (origin top-left); the engine
//! never re-flips a value it receives from this seam.

use image::RgbaImage;

use crate::document::DocumentHandle;
use crate::error::Result;

/// External rasterizer for one page at one scale.
pub trait PageRenderer {
    /// Render `page_index` (zero-based) of `doc` at `scale`, where 1.0
    /// means one pixel per point. Returns RGBA pixels with origin
    /// top-left.
    fn render_page(&self, doc: &DocumentHandle, page_index: usize, scale: f64)
        -> Result<RgbaImage>;
}

impl<T: PageRenderer + ?Sized> PageRenderer for &T {
    fn render_page(
        &self,
        doc: &DocumentHandle,
        page_index: usize,
        scale: f64,
    ) -> Result<RgbaImage> {
        (**self).render_page(doc, page_index, scale)
    }
}
