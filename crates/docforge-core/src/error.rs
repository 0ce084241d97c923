use thiserror::Error;

/// Error taxonomy for the document engine.
///
/// `Input` and `InvalidOperation` fail before any page work begins.
/// `Render` failures during merge/split skip the offending page; during
/// compress/overlay they trigger a same-page fallback instead of a page
/// drop. `UnattainableTarget` is a last resort, never raised while any
/// usable artifact exists.
#[derive(Error, Debug)]
pub enum DocForgeError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("page {page} failed to rasterize: {reason}")]
    Render { page: usize, reason: String },

    #[error("failed to assemble output: {0}")]
    Assembly(String),

    #[error("no probe produced any output for target of {target} bytes")]
    UnattainableTarget { target: u64 },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("insufficient storage: estimated {needed} bytes needed, {available} available")]
    Resource { needed: u64, available: u64 },
}

pub type Result<T> = std::result::Result<T, DocForgeError>;
