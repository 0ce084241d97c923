//! Operation parameter and report types
//!
//! These are the serializable values exchanged with callers (a job queue,
//! a UI layer): what to overlay and where, which pages to touch, and what
//! got skipped along the way.

use serde::{Deserialize, Serialize};
use shared_geom::{GridPosition, NormPoint};

/// What to draw as an overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OverlayContent {
    /// A line of watermark/signature text drawn in Helvetica.
    Text { content: String },
    /// PNG image bytes (a drawn signature, a stamp).
    Image { data: Vec<u8> },
}

impl OverlayContent {
    pub fn is_text(&self) -> bool {
        matches!(self, OverlayContent::Text { .. })
    }
}

/// Where overlays go: one discrete/custom position, or a repeating grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OverlayPosition {
    Single { position: GridPosition },
    Tiled,
}

/// Which pages an operation targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageSelection {
    All,
    Only { indices: Vec<usize> },
}

/// Full description of an overlay to place.
///
/// `opacity` is clamped to [0,1] and `size_ratio` to (0,1] when the spec
/// is applied; out-of-range caller values are never rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementSpec {
    pub content: OverlayContent,
    pub position: OverlayPosition,
    pub opacity: f64,
    /// Element width as a fraction of the page width.
    pub size_ratio: f64,
    pub pages: PageSelection,
}

impl PlacementSpec {
    /// Build a spec from a detector hint, centering the overlay on the
    /// candidate region.
    pub fn from_candidate(candidate: &DetectedCandidate, content: OverlayContent) -> Self {
        let center = NormPoint::new(
            candidate.region.x + candidate.region.width / 2.0,
            candidate.region.y + candidate.region.height / 2.0,
        );
        Self {
            content,
            position: OverlayPosition::Single {
                position: GridPosition::Custom { point: center },
            },
            opacity: 1.0,
            size_ratio: candidate.region.width.clamp(0.05, 1.0),
            pages: PageSelection::Only {
                indices: vec![candidate.page_index],
            },
        }
    }
}

/// A normalized region on a page, all fields in [0,1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A field/region suggestion from an external detector. Only ever
/// consumed as hint input to [`PlacementSpec`] construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedCandidate {
    pub page_index: usize,
    pub region: NormRegion,
    pub confidence: f32,
    #[serde(default)]
    pub label: Option<String>,
}

/// A page or constituent that an operation could not process and skipped,
/// with the reason, so the caller can decide whether to warn the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skipped {
    pub index: usize,
    pub reason: String,
}

impl Skipped {
    pub fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}
