//! Error types for the terrain engine

use thiserror::Error;

/// Main error type for the engine
///
/// Streaming, meshing and sculpting never fail; they clamp instead.
/// Only the I/O boundaries (persistence, export) surface errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Definition error: {0}")]
    Definition(String),

    #[error("Export error: {0}")]
    Export(String),
}
