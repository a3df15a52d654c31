use std::io;

use thiserror::Error;

/// Fatal errors of the projection pipeline.
///
/// Every check in the pipeline surfaces as exactly one of these variants;
/// none of them is recoverable. The pipeline either returns a complete,
/// orthonormal projector set or aborts with the first failing check.
#[derive(Debug, Error)]
pub enum PloError {
    /// Array dimensions disagree with each other or with the metadata
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A shell label outside the closed set `s, p, d, f, d_t2g, d_eg`,
    /// or an orbital label outside the cubic-harmonic table
    #[error("unknown shell or orbital label: {0}")]
    UnknownShell(String),

    /// Window bounds out of order, of mixed scalar kind, or selecting an
    /// empty band set
    #[error("bad window: {0}")]
    BadWindow(String),

    /// The Löwdin overlap matrix has an eigenvalue that is not strictly
    /// positive, so `(M M†)^(-1/2)` does not exist
    #[error("non-positive overlap eigenvalue {value:.6e} at (k = {ikpt}, s = {ispin})")]
    NonPositiveOverlap {
        /// Offending eigenvalue
        value: f64,
        /// K-point index of the failing slice
        ikpt: usize,
        /// Spin index of the failing slice
        ispin: usize,
    },

    /// A window slot holds fewer bands than the projectors it must span
    #[error(
        "insufficient bands: window holds {nbnd} band(s) at (k = {ikpt}, s = {ispin}) \
         but {ndim} projector row(s) must fit"
    )]
    InsufficientBands {
        /// Usable bands in the failing slot
        nbnd: usize,
        /// Projector rows that must be orthonormalised inside it
        ndim: usize,
        /// K-point index of the failing slot
        ikpt: usize,
        /// Spin index of the failing slot
        ispin: usize,
    },

    /// Configuration lists disagree with each other
    #[error("inconsistent configuration: {0}")]
    ConfigInconsistent(String),

    /// Failure while writing a diagnostic file
    #[error("diagnostic output: {0}")]
    Io(#[from] io::Error),
}
