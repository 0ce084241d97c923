//! Parsed document wrapper
//!
//! Wraps a parsed lopdf document together with per-page geometry. The
//! handle is read-only: every operation clones the inner document and
//! produces fresh output bytes, so a handle can back any number of
//! independent operations.

use lopdf::{Document, Object, ObjectId};
use shared_geom::PageBounds;

use crate::error::{DocForgeError, Result};

/// Intrinsic geometry of one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    /// Width in points.
    pub width: f64,
    /// Height in points.
    pub height: f64,
    /// Rotation in degrees, always a multiple of 90, reduced mod 360.
    pub rotation: i64,
}

impl PageInfo {
    pub fn bounds(&self) -> PageBounds {
        PageBounds::new(self.width, self.height)
    }
}

/// A validated, parsed source document.
#[derive(Debug)]
pub struct DocumentHandle {
    pub(crate) doc: Document,
    pages: Vec<PageInfo>,
    page_ids: Vec<ObjectId>,
    input_len: usize,
}

impl DocumentHandle {
    /// Parse and validate source bytes.
    ///
    /// Fails with an input error for empty, unparseable, encrypted, or
    /// zero-page sources, before any page work happens.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(DocForgeError::Input("source document is empty".into()));
        }

        let doc = Document::load_mem(bytes)
            .map_err(|e| DocForgeError::Input(format!("failed to parse PDF: {}", e)))?;

        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(DocForgeError::Input(
                "source document is encrypted".into(),
            ));
        }

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(DocForgeError::Input("document has no pages".into()));
        }

        let pages = page_ids
            .iter()
            .map(|&id| read_page_info(&doc, id))
            .collect();

        Ok(Self {
            doc,
            pages,
            page_ids,
            input_len: bytes.len(),
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&PageInfo> {
        self.pages.get(index)
    }

    pub fn pages(&self) -> &[PageInfo] {
        &self.pages
    }

    pub(crate) fn page_id(&self, index: usize) -> Option<ObjectId> {
        self.page_ids.get(index).copied()
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }
}

/// Read MediaBox and Rotate for a page, following Parent links for
/// inherited attributes. Missing or malformed entries fall back to US
/// Letter and zero rotation.
fn read_page_info(doc: &Document, page_id: ObjectId) -> PageInfo {
    let media_box = inherited_entry(doc, page_id, b"MediaBox")
        .and_then(|obj| media_box_size(&obj))
        .unwrap_or((612.0, 792.0));

    let rotation = inherited_entry(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360);

    PageInfo {
        width: media_box.0,
        height: media_box.1,
        rotation,
    }
}

/// Look up a page-tree attribute on the page itself or any ancestor.
pub(crate) fn inherited_entry(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    // Parent chains in real documents are shallow; the bound guards
    // against reference cycles in corrupt files.
    for _ in 0..16 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok().cloned(),
                other => Some(other.clone()),
            };
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn media_box_size(obj: &Object) -> Option<(f64, f64)> {
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let nums: Vec<f64> = arr.iter().filter_map(object_to_f64).collect();
    if nums.len() != 4 {
        return None;
    }
    let width = (nums[2] - nums[0]).abs();
    let height = (nums[3] - nums[1]).abs();
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some((width, height))
}

pub(crate) fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}
