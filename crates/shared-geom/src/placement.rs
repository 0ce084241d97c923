//! Overlay placement
//!
//! Computes page-space origins (origin bottom-left) for a single overlay
//! or a tiled grid of overlays. Deterministic: identical inputs always
//! yield identical outputs.

use serde::{Deserialize, Serialize};

use crate::coords::{NormPoint, PageBounds, Point, Size};

/// Where to place a single overlay on a page.
///
/// Nine discrete positions (three rows by three columns) plus a custom
/// mode that centers the element on a caller-supplied normalized point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GridPosition {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    Custom { point: NormPoint },
}

/// Tiling spacing as multiples of the element's own size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileSpacing {
    pub horizontal: f64,
    pub vertical: f64,
}

impl TileSpacing {
    /// Text overlays tile tighter: repeated text reads as a pattern.
    pub const TEXT: TileSpacing = TileSpacing {
        horizontal: 1.5,
        vertical: 3.0,
    };

    /// Image overlays get more breathing room than text.
    pub const IMAGE: TileSpacing = TileSpacing {
        horizontal: 2.0,
        vertical: 4.0,
    };
}

/// Compute the page-space origin for a single overlay.
///
/// Edge positions are inset by `margin`; centering positions average the
/// inset on the relevant axis. `Custom` centers the element on the given
/// normalized point without any margin.
pub fn compute_single(
    position: GridPosition,
    element: Size,
    page: PageBounds,
    margin: f64,
) -> Point {
    let margin = margin.max(0.0);

    let left = margin;
    let center_x = (page.width - element.width) / 2.0;
    let right = page.width - element.width - margin;

    let bottom = margin;
    let middle_y = (page.height - element.height) / 2.0;
    let top = page.height - element.height - margin;

    match position {
        GridPosition::TopLeft => Point::new(left, top),
        GridPosition::TopCenter => Point::new(center_x, top),
        GridPosition::TopRight => Point::new(right, top),
        GridPosition::MiddleLeft => Point::new(left, middle_y),
        GridPosition::Center => Point::new(center_x, middle_y),
        GridPosition::MiddleRight => Point::new(right, middle_y),
        GridPosition::BottomLeft => Point::new(left, bottom),
        GridPosition::BottomCenter => Point::new(center_x, bottom),
        GridPosition::BottomRight => Point::new(right, bottom),
        GridPosition::Custom { point } => Point::new(
            point.x() * page.width - element.width / 2.0,
            point.y() * page.height - element.height / 2.0,
        ),
    }
}

/// Compute page-space origins for a tiled grid of overlays.
///
/// Grid dimensions are `ceil(page / spacing)` with a minimum of one row
/// and one column. Iteration order is row-major, top-to-bottom then
/// left-to-right, fixed for reproducibility. An element larger than the
/// page on either axis collapses to a single centered placement.
pub fn compute_tiled(element: Size, page: PageBounds, spacing: TileSpacing) -> Vec<Point> {
    if element.width > page.width || element.height > page.height {
        return vec![compute_single(GridPosition::Center, element, page, 0.0)];
    }

    let step_x = (element.width * spacing.horizontal).max(1.0);
    let step_y = (element.height * spacing.vertical).max(1.0);

    let cols = ((page.width / step_x).ceil() as usize).max(1);
    let rows = ((page.height / step_y).ceil() as usize).max(1);

    let mut origins = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        let y = page.height - element.height - (row as f64) * step_y;
        for col in 0..cols {
            let x = (col as f64) * step_x;
            origins.push(Point::new(x, y));
        }
    }
    origins
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn center_position_averages_insets() {
        let page = PageBounds::letter();
        let origin = compute_single(GridPosition::Center, Size::new(100.0, 40.0), page, 20.0);
        assert_eq!(origin, Point::new(256.0, 376.0));
    }

    #[test]
    fn edge_positions_respect_margin() {
        let page = PageBounds::letter();
        let element = Size::new(100.0, 40.0);

        let bl = compute_single(GridPosition::BottomLeft, element, page, 20.0);
        assert_eq!(bl, Point::new(20.0, 20.0));

        let tr = compute_single(GridPosition::TopRight, element, page, 20.0);
        assert_eq!(tr, Point::new(612.0 - 100.0 - 20.0, 792.0 - 40.0 - 20.0));
    }

    #[test]
    fn custom_position_centers_element_on_point() {
        let page = PageBounds::letter();
        let origin = compute_single(
            GridPosition::Custom {
                point: NormPoint::new(0.5, 0.9),
            },
            Size::new(100.0, 40.0),
            page,
            20.0,
        );
        assert_eq!(origin, Point::new(306.0 - 50.0, 792.0 * 0.9 - 20.0));
    }

    #[test]
    fn tiled_grid_covers_letter_page() {
        // 612x792 page, 100x40 element, text spacing: steps of 150x120.
        let origins = compute_tiled(
            Size::new(100.0, 40.0),
            PageBounds::letter(),
            TileSpacing::TEXT,
        );

        let cols = (612.0f64 / 150.0).ceil() as usize;
        let rows = (792.0f64 / 120.0).ceil() as usize;
        assert_eq!(origins.len(), cols * rows);
        assert!(cols >= (612.0f64 / 150.0).ceil() as usize);
        assert!(rows >= (792.0f64 / 160.0).ceil() as usize);
    }

    #[test]
    fn tiled_iteration_is_row_major_top_down() {
        let origins = compute_tiled(
            Size::new(100.0, 40.0),
            PageBounds::letter(),
            TileSpacing::IMAGE,
        );

        // First origin is the top-left cell.
        assert_eq!(origins[0], Point::new(0.0, 792.0 - 40.0));
        // Second moves right along the same row.
        assert!(origins[1].x > origins[0].x);
        assert_eq!(origins[1].y, origins[0].y);
        // Rows descend.
        let last = origins.last().unwrap();
        assert!(last.y < origins[0].y);
    }

    #[test]
    fn oversized_element_collapses_to_single_centered_placement() {
        let page = PageBounds::letter();
        let origins = compute_tiled(Size::new(700.0, 100.0), page, TileSpacing::TEXT);
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0], Point::new((612.0 - 700.0) / 2.0, 346.0));
    }

    proptest! {
        /// Placement is pure: identical inputs always yield identical
        /// outputs.
        #[test]
        fn compute_tiled_is_deterministic(
            ew in 10.0f64..300.0,
            eh in 10.0f64..300.0,
            pw in 200.0f64..1200.0,
            ph in 200.0f64..1200.0,
        ) {
            let element = Size::new(ew, eh);
            let page = PageBounds::new(pw, ph);
            let a = compute_tiled(element, page, TileSpacing::TEXT);
            let b = compute_tiled(element, page, TileSpacing::TEXT);
            prop_assert_eq!(a, b);
        }

        /// A tiled grid always has at least one placement.
        #[test]
        fn compute_tiled_never_empty(
            ew in 1.0f64..2000.0,
            eh in 1.0f64..2000.0,
        ) {
            let origins = compute_tiled(Size::new(ew, eh), PageBounds::letter(), TileSpacing::IMAGE);
            prop_assert!(!origins.is_empty());
        }

        /// Single placements keep the element's origin finite for all
        /// nine grid positions.
        #[test]
        fn compute_single_is_finite(
            ew in 1.0f64..600.0,
            eh in 1.0f64..600.0,
            margin in 0.0f64..100.0,
        ) {
            let positions = [
                GridPosition::TopLeft, GridPosition::TopCenter, GridPosition::TopRight,
                GridPosition::MiddleLeft, GridPosition::Center, GridPosition::MiddleRight,
                GridPosition::BottomLeft, GridPosition::BottomCenter, GridPosition::BottomRight,
            ];
            for pos in positions {
                let p = compute_single(pos, Size::new(ew, eh), PageBounds::letter(), margin);
                prop_assert!(p.x.is_finite() && p.y.is_finite());
            }
        }
    }
}
