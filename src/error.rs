/// Engine Error Handling
///
/// Central error type for the terrain engine. Subsystems wrap their
/// failures into `EngineError` through per-module context traits
/// (see `terrain::error`).

use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// A named resource (buffer, kernel, adapter) was expected but absent
    #[error("resource not found: {resource_type} '{id}'")]
    ResourceNotFound { resource_type: String, id: String },

    /// A subsystem operation failed
    #[error("{component} error: {error}")]
    SystemError { component: String, error: String },

    /// Configuration rejected at validation time
    #[error("invalid config: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// A documented capacity bound was exceeded (fatal invariant violation)
    #[error("capacity exceeded for {resource}: needed {needed}, capacity {capacity}")]
    CapacityExceeded {
        resource: String,
        needed: u64,
        capacity: u64,
    },

    /// No usable compute device
    #[error("gpu unavailable: {0}")]
    GpuUnavailable(String),
}

/// Crate-wide result type
pub type EngineResult<T> = Result<T, EngineError>;
