//! Error types for the earshot pipeline.
//!
//! The pipeline itself is deliberately hard to fail: authorization denial
//! is a policy outcome, tier-2 trouble degrades to a passthrough, and
//! storage hiccups are logged without blocking. What remains as real
//! errors is configuration handling; collaborator boundaries use
//! `anyhow::Result` (see [`collab`](crate::collab)).

/// Top-level error type for the speech-to-action system.
#[derive(Debug, thiserror::Error)]
pub enum EarshotError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EarshotError>;
