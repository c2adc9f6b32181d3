//! Errors surfaced by the pipeline.

use thiserror::Error;

/// Boxed collaborator error (detector, frame source).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stream level failures. Motion estimation, matching and sink problems are
/// recovered where they happen and never show up here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("detector failed on frame {frame}: {source}")]
    Detector {
        frame: u64,
        #[source]
        source: BoxError,
    },

    #[error("frame source failed: {0}")]
    Source(#[source] BoxError),

    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),

    #[error("failed to spawn {name} worker: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn detector<E>(frame: u64, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Detector {
            frame,
            source: Box::new(err),
        }
    }

    pub fn frame_source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source(Box::new(err))
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
