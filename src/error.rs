use thiserror::Error;

/// Top-level error type for the lotfill subdivision engine.
#[derive(Debug, Error)]
pub enum LotfillError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Arrangement(#[from] ArrangementError),
}

/// Errors raised while validating block input.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("ring degenerate after coincident-point removal: {got} vertices, need {need}")]
    DegenerateRing { got: usize, need: usize },

    #[error("invalid block: {0}")]
    InvalidBlock(String),
}

/// Errors raised when an external rule oracle has no applicable entry.
///
/// These are block-level failures: the caller falls back to a simpler
/// fill strategy rather than aborting.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("no facade spelling for width {width:.2}")]
    NoSpelling { width: f64 },

    #[error("fill not applicable: {0}")]
    FillFailure(String),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("zero-length curve at ({x:.3}, {y:.3})")]
    ZeroLengthCurve { x: f64, y: f64 },

    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}

/// Programming-contract violations inside the planar subdivision.
///
/// These indicate a bug, not bad input; block processing aborts loudly.
#[derive(Debug, Error)]
pub enum ArrangementError {
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Convenience type alias for results using [`LotfillError`].
pub type Result<T> = std::result::Result<T, LotfillError>;
