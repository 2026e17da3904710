/*!
 * # storyreel - narrated slideshow videos from story pages
 *
 * A Rust library that turns story pages, their images and per-segment
 * narration into a single captioned video.
 *
 * ## Features
 *
 * - Sentence-aware text segmentation with abbreviation handling
 * - Exact, audio-driven caption timing read back from the composed timeline
 * - Slide transitions plus zoom or pan effects per clip, from a seedable source
 * - SRT and ASS subtitle output and burned-in caption overlays
 * - ffmpeg-based encoding with timeouts and fallback strategies
 * - Optional background music mixed under the narration
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `segmenter`: Text splitting for speech segments and caption lines
 * - `audio`: WAV decoding, stereo forcing, resampling and mixing
 * - `clip_builder`: Per-segment clips with letterboxing and visual effects
 * - `timeline`: Transition composition and realized timestamps
 * - `captions`: Cue synchronization, SRT/ASS files and glyph rendering
 * - `render`: Frame rasterisation and the ffmpeg render pipeline
 * - `app_controller`: Render job orchestration
 * - `app_config`: Configuration management
 * - `file_utils`: Story directory discovery
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_arguments)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod audio;
pub mod captions;
pub mod clip_builder;
pub mod errors;
pub mod file_utils;
pub mod render;
pub mod segmenter;
pub mod timeline;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{ComposedStory, Controller, RenderOutput};
pub use captions::{CaptionCue, CaptionMode, CaptionSynchronizer, CueList};
pub use clip_builder::{ClipBuilder, Segment, TimedClip};
pub use errors::{ComposeError, EncodeError, JobError, PipelineStage};
pub use render::{RenderJob, RenderState, Renderer};
pub use segmenter::{Segmenter, UnitKind};
pub use timeline::{Timeline, Timestamp, TransitionComposer};
