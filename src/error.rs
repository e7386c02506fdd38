//! Error types for the conversion pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline phase an error (or progress report) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Capture,
    Normalize,
    Layout,
    Assets,
    Hierarchy,
    Transport,
    Emit,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Capture => "capture",
            Phase::Normalize => "normalize",
            Phase::Layout => "layout",
            Phase::Assets => "assets",
            Phase::Hierarchy => "hierarchy",
            Phase::Transport => "transport",
            Phase::Emit => "emit",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while converting a page
///
/// Style parse errors and layout mapping gaps are not represented here: they
/// are recovered locally and recorded as markers on the affected node.
#[derive(Error, Debug)]
pub enum Error {
    /// The captured snapshot cannot be converted at all
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Network error while fetching an asset
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Asset could not be decoded, converted or reassembled
    #[error("Asset error: {0}")]
    AssetError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Malformed message or broken channel
    #[error("Transport error during {phase}: {message}")]
    Transport {
        message: String,
        recoverable: bool,
        phase: Phase,
    },

    /// The scene sink rejected a call
    #[error("Sink error: {0}")]
    Sink(String),

    /// The conversion was aborted
    #[error("Conversion cancelled")]
    Cancelled,

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a transport error for the given phase
    pub fn transport(message: impl Into<String>, recoverable: bool, phase: Phase) -> Self {
        Error::Transport {
            message: message.into(),
            recoverable,
            phase,
        }
    }

    /// Whether the partial result produced so far is still usable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Transport { recoverable, .. } => *recoverable,
            Error::AssetError(_) | Error::NetworkError(_) | Error::Timeout(_) => true,
            _ => false,
        }
    }

    /// Phase this error is attributed to, where known
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::InvalidSnapshot(_) => Some(Phase::Capture),
            Error::NetworkError(_) | Error::AssetError(_) | Error::Timeout(_) => Some(Phase::Assets),
            Error::Transport { phase, .. } => Some(*phase),
            Error::Sink(_) => Some(Phase::Emit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_carries_phase_and_flag() {
        let err = Error::transport("sequence went backwards", false, Phase::Transport);
        assert_eq!(err.phase(), Some(Phase::Transport));
        assert!(!err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "Transport error during transport: sequence went backwards"
        );
    }

    #[test]
    fn asset_errors_are_recoverable() {
        assert!(Error::Timeout(10).is_recoverable());
        assert!(Error::AssetError("bad png".into()).is_recoverable());
        assert!(!Error::Cancelled.is_recoverable());
    }
}
