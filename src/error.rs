//! Error types shared by every pipeline stage.

use std::path::PathBuf;
use thiserror::Error;

use crate::window::TimeWindow;

/// Failures raised by a [`crate::warehouse::Warehouse`] implementation.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("warehouse query failed: {0}")]
    Query(#[from] duckdb::Error),

    #[error("warehouse task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("warehouse connection lock poisoned")]
    Poisoned,
}

/// The error taxonomy surfaced to whoever schedules the assets.
///
/// Nothing here is retried locally.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid partition key '{key}': {source}")]
    InvalidPartitionKey {
        key: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("aggregation failed for window {window}: {source}")]
    AggregationFailed {
        window: TimeWindow,
        #[source]
        source: WarehouseError,
    },

    #[error("corrupt artifact at {}: {reason}", .path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("render failed: {reason}")]
    RenderFailed { reason: String },

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn render(reason: impl Into<String>) -> Self {
        Self::RenderFailed {
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
