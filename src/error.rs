//! Error type for filter invocations.
//!
//! Numeric degeneracy (NaN / division by near-zero parameters) is never
//! reported through this type — those values are clamped or substituted
//! inline and logged (see the wood filter). Everything that surfaces here
//! is fatal to the current filter pass.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    /// A filter that must allocate its own output was handed a buffer with
    /// a zero dimension. Callers are expected to validate geometry before
    /// invoking; this is the backstop for generator filters.
    #[error("invalid image geometry: {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    /// Building the explicit worker pool failed.
    #[error("worker pool construction failed: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
}
