/*!
 * Tests for error types
 */

use std::error::Error;
use std::path::PathBuf;
use storyreel::errors::{ComposeError, EncodeError, JobError, PipelineStage};

/// Job errors name their stage and keep the cause as source
#[test]
fn test_job_error_display_shouldIncludeStageAndCause() {
    let error = JobError::new(
        PipelineStage::Validation,
        ComposeError::AssetMissing { path: PathBuf::from("speech/s3.wav") },
    );
    let message = error.to_string();
    assert!(message.contains("validation"), "{}", message);
    assert!(message.contains("s3.wav"), "{}", message);
    assert!(error.source().is_some());
}

/// Input problems are permanent, encoder failures may be transient
#[test]
fn test_is_retryable_shouldSeparateInputAndEncoderErrors() {
    let missing = JobError::new(
        PipelineStage::Validation,
        ComposeError::AssetMissing { path: PathBuf::from("x.wav") },
    );
    assert!(!missing.is_retryable());

    let timeout = JobError::new(
        PipelineStage::Rendering,
        ComposeError::Encode(EncodeError::Timeout { step: "mux".to_string(), secs: 300 }),
    );
    assert!(timeout.is_retryable());
}

/// Encoder errors convert into compose errors
#[test]
fn test_compose_error_fromEncodeError_shouldWrap() {
    let encode = EncodeError::Failed {
        step: "video".to_string(),
        status: "exit status: 1".to_string(),
        stderr: "Unknown encoder".to_string(),
    };
    let error: ComposeError = encode.into();
    assert!(matches!(error, ComposeError::Encode(EncodeError::Failed { .. })));
    assert!(error.to_string().contains("Unknown encoder"));
}
