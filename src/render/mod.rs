/*!
 * Rasterisation and encoding of a composed timeline.
 */

pub mod ffmpeg;
pub mod frames;
pub mod renderer;

pub use ffmpeg::FfmpegRunner;
pub use frames::FrameRasterizer;
pub use renderer::{validate_music, RenderJob, RenderState, Renderer};
