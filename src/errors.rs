/*!
 * Error types for the storyreel composition engine.
 *
 * This module contains custom error types for the different stages of a
 * render job, using the thiserror crate for ergonomic error definitions.
 */

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by an external encoder invocation
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The encoder binary could not be started
    #[error("Failed to start {program} for {step}: {message}")]
    Spawn {
        /// Program that was launched
        program: String,
        /// Pipeline step that launched it
        step: String,
        /// Underlying OS error
        message: String,
    },

    /// The encoder exited with a non-zero status
    #[error("{step} failed (status {status}): {stderr}")]
    Failed {
        step: String,
        status: String,
        /// Filtered stderr of the encoder
        stderr: String,
    },

    /// The encoder exceeded its wall-clock budget and was killed
    #[error("{step} timed out after {secs} seconds")]
    Timeout { step: String, secs: u64 },

    /// Streaming data into the encoder failed
    #[error("Failed to stream data to encoder during {step}: {message}")]
    Pipe { step: String, message: String },
}

/// Errors that can occur while composing a story video
#[derive(Error, Debug)]
pub enum ComposeError {
    /// A referenced audio or image asset is not on disk
    #[error("Asset missing: {}", path.display())]
    AssetMissing { path: PathBuf },

    /// Segment count and audio asset count disagree for a page
    #[error("Page {page} audio count mismatch: expected {expected} segments, found {found} audio files")]
    DurationMismatch {
        page: usize,
        expected: usize,
        found: usize,
    },

    /// Background music extension is not in the allow-list
    #[error("Unsupported background music extension '{extension}' for {}", path.display())]
    UnsupportedMusic { path: PathBuf, extension: String },

    /// Realized clip placement is inconsistent with the inputs
    #[error("Timeline assembly failed at clip {clip}: {detail}")]
    TimelineAssembly { clip: usize, detail: String },

    /// Configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Story script is missing or malformed
    #[error("Script error: {0}")]
    Script(String),

    /// Audio could not be decoded or written
    #[error("Audio error: {0}")]
    Audio(String),

    /// Image could not be decoded or rasterized
    #[error("Image error: {0}")]
    Image(String),

    /// External encoder failure
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for ComposeError {
    fn from(error: hound::Error) -> Self {
        Self::Audio(error.to_string())
    }
}

impl From<image::ImageError> for ComposeError {
    fn from(error: image::ImageError) -> Self {
        Self::Image(error.to_string())
    }
}

/// Stage of a render job, used to report where a job failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Validation,
    ClipBuilding,
    Composition,
    Captioning,
    Rendering,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::ClipBuilding => "clip building",
            Self::Composition => "composition",
            Self::Captioning => "captioning",
            Self::Rendering => "rendering",
        };
        write!(f, "{}", name)
    }
}

/// The single structured error a render job surfaces to its caller
#[derive(Error, Debug)]
#[error("Render job failed during {stage}: {source}")]
pub struct JobError {
    pub stage: PipelineStage,
    #[source]
    pub source: ComposeError,
}

impl JobError {
    pub fn new(stage: PipelineStage, source: ComposeError) -> Self {
        Self { stage, source }
    }

    /// Whether re-running the job could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.source,
            ComposeError::AssetMissing { .. }
                | ComposeError::DurationMismatch { .. }
                | ComposeError::UnsupportedMusic { .. }
                | ComposeError::TimelineAssembly { .. }
                | ComposeError::InvalidConfig(_)
                | ComposeError::Script(_)
        )
    }
}

/// Attach a pipeline stage to a stage-local result
pub trait StageContext<T> {
    fn at_stage(self, stage: PipelineStage) -> Result<T, JobError>;
}

impl<T> StageContext<T> for Result<T, ComposeError> {
    fn at_stage(self, stage: PipelineStage) -> Result<T, JobError> {
        self.map_err(|source| JobError::new(stage, source))
    }
}
