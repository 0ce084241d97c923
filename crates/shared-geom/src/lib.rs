//! Shared page geometry utilities
//!
//! This crate provides the coordinate transformation and overlay placement
//! math used across the document engine. Page space has its origin at the
//! bottom-left; raster/view space at the top-left. Every origin flip lives
//! here so no caller applies its own sign flip.

pub mod coords;
pub mod placement;

pub use coords::{to_device_rect, to_normalized, NormPoint, PageBounds, Point, Rect, Size};
pub use placement::{compute_single, compute_tiled, GridPosition, TileSpacing};
