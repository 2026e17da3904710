/*!
 * Per-segment clip construction.
 *
 * A `TimedClip` pairs a segment's padded narration with a letterboxed page
 * image and one visual effect (zoom or pan) chosen from an injected random
 * source.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{imageops, Rgb, RgbImage};
use log::debug;
use rand::Rng;

use crate::app_config::Config;
use crate::audio::AudioTrack;
use crate::captions::glyph::parse_color;
use crate::errors::ComposeError;

/// One story page with its image
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    pub text: String,
    pub image: PathBuf,
}

/// A speech-sized fragment of page text with its narration asset
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// 1-based page number
    pub page: usize,
    /// 0-based position within the page
    pub index: usize,
    pub text: String,
    pub audio: Option<PathBuf>,
}

impl Segment {
    /// Create a segment, rejecting blank text
    pub fn new(page: usize, index: usize, text: &str, audio: Option<PathBuf>) -> Result<Self, ComposeError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ComposeError::Script(format!(
                "segment {} of page {} has no text",
                index + 1,
                page
            )));
        }
        Ok(Self {
            page,
            index,
            text: text.to_string(),
            audio,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    /// Viewport travels from the left edge to the right edge
    Left,
    Right,
}

/// The single visual effect applied to a clip
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisualEffect {
    Zoom { direction: ZoomDirection, speed: f64 },
    Pan { direction: PanDirection, ratio: f64 },
}

impl VisualEffect {
    /// Pick zoom or pan, and its direction, from `rng`
    pub fn choose<R: Rng + ?Sized>(rng: &mut R, zoom_speed: f64, move_ratio: f64) -> Self {
        if rng.random_bool(0.5) {
            let direction = if rng.random_bool(0.5) { ZoomDirection::In } else { ZoomDirection::Out };
            Self::Zoom { direction, speed: zoom_speed }
        } else {
            let direction = if rng.random_bool(0.5) { PanDirection::Left } else { PanDirection::Right };
            Self::Pan { direction, ratio: move_ratio }
        }
    }

    /// Source rectangle `(x, y, w, h)` of a `width`x`height` image that fills
    /// the canvas at `progress` in [0, 1] through the clip
    pub fn viewport(&self, progress: f64, width: u32, height: u32) -> (f64, f64, f64, f64) {
        let progress = progress.clamp(0.0, 1.0);
        let (w, h) = (width as f64, height as f64);
        match *self {
            Self::Zoom { direction, speed } => {
                let p = match direction {
                    ZoomDirection::In => progress,
                    ZoomDirection::Out => 1.0 - progress,
                };
                let zoom = 1.0 + p * 0.1 * speed;
                let (cw, ch) = (w / zoom, h / zoom);
                ((w - cw) / 2.0, (h - ch) / 2.0, cw, ch)
            }
            Self::Pan { direction, ratio } => {
                let (cw, ch) = (w * ratio, h * ratio);
                let travel = w - cw;
                let x = match direction {
                    PanDirection::Left => travel * progress,
                    PanDirection::Right => travel * (1.0 - progress),
                };
                (x, (h - ch) / 2.0, cw, ch)
            }
        }
    }
}

/// A segment ready for the timeline
#[derive(Debug, Clone)]
pub struct TimedClip {
    pub segment: Segment,
    /// Narration wrapped in leading and trailing silence
    pub audio: AudioTrack,
    /// Page image letterboxed to the canvas, shared by a page's clips
    pub image: Arc<RgbImage>,
    pub effect: VisualEffect,
    /// Silence before narration starts
    pub lead_padding: f64,
    /// Narration length without padding
    pub speech_duration: f64,
}

impl TimedClip {
    /// Visual duration; equal to the padded audio duration
    pub fn duration(&self) -> f64 {
        self.audio.duration()
    }
}

/// Builds `TimedClip`s for a render job
#[derive(Debug, Clone)]
pub struct ClipBuilder {
    width: u32,
    height: u32,
    background: Rgb<u8>,
    sample_rate: u32,
    padding: f64,
    zoom_speed: f64,
    move_ratio: f64,
}

impl ClipBuilder {
    pub fn new(config: &Config) -> Result<Self, ComposeError> {
        let [r, g, b, _] = parse_color(&config.video.background).ok_or_else(|| {
            ComposeError::InvalidConfig(format!("unrecognised colour {}", config.video.background))
        })?;
        Ok(Self {
            width: config.video.width,
            height: config.video.height,
            background: Rgb([r, g, b]),
            sample_rate: config.video.audio_sample_rate,
            padding: config.effects.transition_padding,
            zoom_speed: config.effects.zoom_speed,
            move_ratio: config.effects.move_ratio,
        })
    }

    /// Check a page's audio assets once, before any clip of the page is built
    pub fn validate_page(page: usize, segments: usize, audio: &[PathBuf]) -> Result<(), ComposeError> {
        if audio.len() != segments {
            return Err(ComposeError::DurationMismatch {
                page,
                expected: segments,
                found: audio.len(),
            });
        }
        if let Some(missing) = audio.iter().find(|path| !path.is_file()) {
            return Err(ComposeError::AssetMissing { path: missing.clone() });
        }
        Ok(())
    }

    /// Decode a page image and fit it to the canvas
    pub fn load_page_image<P: AsRef<Path>>(&self, path: P) -> Result<Arc<RgbImage>, ComposeError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ComposeError::AssetMissing { path: path.to_path_buf() });
        }
        let source = image::open(path)?.to_rgb8();
        Ok(Arc::new(self.letterbox(&source)))
    }

    /// Scale uniformly to fit and centre on a solid background
    pub fn letterbox(&self, source: &RgbImage) -> RgbImage {
        let (sw, sh) = source.dimensions();
        let scale = (self.width as f64 / sw.max(1) as f64).min(self.height as f64 / sh.max(1) as f64);
        let fw = ((sw as f64 * scale).round() as u32).clamp(1, self.width);
        let fh = ((sh as f64 * scale).round() as u32).clamp(1, self.height);

        let mut canvas = RgbImage::from_pixel(self.width, self.height, self.background);
        let fitted = if (fw, fh) == (sw, sh) {
            source.clone()
        } else {
            imageops::resize(source, fw, fh, imageops::FilterType::Triangle)
        };
        let x = ((self.width - fw) / 2) as i64;
        let y = ((self.height - fh) / 2) as i64;
        imageops::replace(&mut canvas, &fitted, x, y);
        canvas
    }

    /// Build the clip for one segment
    pub fn build<R: Rng + ?Sized>(
        &self,
        segment: &Segment,
        image: Arc<RgbImage>,
        rng: &mut R,
    ) -> Result<TimedClip, ComposeError> {
        let path = segment.audio.as_ref().ok_or_else(|| {
            ComposeError::Script(format!("segment {} of page {} has no audio", segment.index + 1, segment.page))
        })?;
        let narration = AudioTrack::load_wav(path, self.sample_rate)?;
        Ok(self.build_from_audio(segment, narration, image, rng))
    }

    /// Build a clip from already decoded narration
    pub fn build_from_audio<R: Rng + ?Sized>(
        &self,
        segment: &Segment,
        narration: AudioTrack,
        image: Arc<RgbImage>,
        rng: &mut R,
    ) -> TimedClip {
        let speech_duration = narration.duration();
        let audio = narration.padded(self.padding, self.padding);
        let effect = VisualEffect::choose(rng, self.zoom_speed, self.move_ratio);
        debug!(
            "Clip p{} #{}: {:.3}s speech, {:.3}s total, {:?}",
            segment.page,
            segment.index + 1,
            speech_duration,
            audio.duration(),
            effect
        );

        TimedClip {
            segment: segment.clone(),
            audio,
            image,
            effect,
            lead_padding: self.padding,
            speech_duration,
        }
    }
}
