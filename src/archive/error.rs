// src/archive/error.rs
// =============================================================================
// Everything that can go wrong while talking to the archive.
//
// None of these abort a harvest: callers in `harvest` swallow them, count
// them in HarvestStats and move on. They are still typed so tests (and the
// stats summary) can tell a dead network apart from a capture the archive
// refused to replay.
// =============================================================================

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: String },

    #[error("unexpected response body: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The replay endpoint answered, but with its "can't be displayed" page
    /// instead of the archived content.
    #[error("capture {timestamp} of {url} is unavailable")]
    CaptureUnavailable { timestamp: String, url: String },

    #[error("cancelled")]
    Cancelled,
}

/// Coarse failure category, used as a counter key for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Status,
    Malformed,
    CaptureUnavailable,
    Cancelled,
}

impl ArchiveError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ArchiveError::Transport(_) => FailureKind::Transport,
            ArchiveError::Status { .. } => FailureKind::Status,
            ArchiveError::Malformed(_) => FailureKind::Malformed,
            ArchiveError::CaptureUnavailable { .. } => FailureKind::CaptureUnavailable,
            ArchiveError::Cancelled => FailureKind::Cancelled,
        }
    }
}
