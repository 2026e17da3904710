use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;

/// Application configuration module
/// This module handles the render configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Output canvas and audio format
    #[serde(default)]
    pub video: VideoConfig,

    /// Transition and per-clip visual effects
    #[serde(default)]
    pub effects: EffectConfig,

    /// Caption style and synchronization settings
    #[serde(default)]
    pub caption: CaptionConfig,

    /// Optional background music
    #[serde(default)]
    pub music: MusicConfig,

    /// External encoder settings
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Text segmentation limits
    #[serde(default)]
    pub segmenter: SegmenterConfig,

    /// Seed for transition sides and effect selection; random when absent
    #[serde(default)]
    pub seed: Option<u64>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Output canvas configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VideoConfig {
    // @field: Canvas width in pixels (even)
    #[serde(default = "default_width")]
    pub width: u32,

    // @field: Canvas height in pixels, excluding the caption area (even)
    #[serde(default = "default_height")]
    pub height: u32,

    // @field: Frames per second
    #[serde(default = "default_fps")]
    pub fps: u32,

    // @field: Target audio sample rate
    #[serde(default = "default_audio_sample_rate")]
    pub audio_sample_rate: u32,

    // @field: Audio codec of the final container
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    // @field: Audio bitrate of the final container
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    // @field: Letterbox colour
    #[serde(default = "default_background")]
    pub background: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            audio_sample_rate: default_audio_sample_rate(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            background: default_background(),
        }
    }
}

/// When the visual fade from/to background is applied
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FadeMode {
    None,
    /// First clip fades in, last clip fades out
    #[default]
    Ends,
    All,
}

/// Transition and effect configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EffectConfig {
    /// Overlap between adjacent clips in seconds
    #[serde(default = "default_transition_duration")]
    pub transition_duration: f64,

    /// Silence added to each edge of a clip's audio, in seconds.
    /// Must be at least `transition_duration` so overlaps never cut narration.
    #[serde(default = "default_transition_padding")]
    pub transition_padding: f64,

    /// Zoom speed; 1.0 zooms by 10% over the clip
    #[serde(default = "default_zoom_speed")]
    pub zoom_speed: f64,

    /// Visible fraction of the enlarged image during a pan
    #[serde(default = "default_move_ratio")]
    pub move_ratio: f64,

    /// Fade duration in seconds (0 disables)
    #[serde(default)]
    pub fade_duration: f64,

    #[serde(default)]
    pub fade_mode: FadeMode,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            transition_duration: default_transition_duration(),
            transition_padding: default_transition_padding(),
            zoom_speed: default_zoom_speed(),
            move_ratio: default_move_ratio(),
            fade_duration: 0.0,
            fade_mode: FadeMode::default(),
        }
    }
}

/// Caption style configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptionConfig {
    // @field: Whether captions are produced at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    // @field: Font file path or file name
    #[serde(default = "default_font")]
    pub font: String,

    // @field: Font size in pixels (0 derives it from the canvas)
    #[serde(default)]
    pub font_size: u32,

    // @field: Text colour (#RGB, #RRGGBB or CSS name)
    #[serde(default = "default_caption_color")]
    pub color: String,

    // @field: Outline colour
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,

    // @field: Outline width in pixels
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,

    // @field: Height reserved below the image for captions (0 derives it)
    #[serde(default)]
    pub area_height: u32,

    // @field: Max characters per caption line
    #[serde(default = "default_max_chars_per_line")]
    pub max_chars_per_line: usize,

    // @field: ASS numpad alignment
    #[serde(default = "default_alignment")]
    pub alignment: u8,

    // @field: Vertical margin
    #[serde(default = "default_margin_v")]
    pub margin_v: u32,

    // @field: Horizontal margin
    #[serde(default = "default_margin_h")]
    pub margin_h: u32,

    // @field: Gap between lines when a page caption is split (seconds)
    #[serde(default = "default_line_gap")]
    pub line_gap: f64,

    // @field: Glyph pre-render worker count
    #[serde(default = "default_caption_workers")]
    pub workers: usize,

    // @field: Also write an ASS subtitle file
    #[serde(default)]
    pub export_ass: bool,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            font: default_font(),
            font_size: 0,
            color: default_caption_color(),
            stroke_color: default_stroke_color(),
            stroke_width: default_stroke_width(),
            area_height: 0,
            max_chars_per_line: default_max_chars_per_line(),
            alignment: default_alignment(),
            margin_v: default_margin_v(),
            margin_h: default_margin_h(),
            line_gap: default_line_gap(),
            workers: default_caption_workers(),
            export_ass: false,
        }
    }
}

impl CaptionConfig {
    /// Font size, derived from the canvas when not configured
    pub fn effective_font_size(&self, width: u32, height: u32) -> u32 {
        if self.font_size > 0 {
            return self.font_size;
        }
        let derived = ((width + height) as f64 / 2.0 * 0.025) as u32;
        derived.max(18)
    }

    /// Caption area height, derived from the canvas when not configured.
    /// Always even so the full frame stays yuv420p-compatible.
    pub fn effective_area_height(&self, height: u32) -> u32 {
        let raw = if self.area_height > 0 {
            self.area_height
        } else {
            ((height as f64 * 0.06) as u32).max(24)
        };
        raw + raw % 2
    }
}

/// Background music configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MusicConfig {
    /// Music file; no mixing when absent
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Music volume relative to narration
    #[serde(default = "default_music_volume")]
    pub volume: f64,

    /// Accepted extensions, lowercase without dot
    #[serde(default = "default_music_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            path: None,
            volume: default_music_volume(),
            allowed_extensions: default_music_extensions(),
        }
    }
}

/// External encoder configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EncoderConfig {
    // @field: ffmpeg binary name or path
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,

    // @field: Wall-clock budget per subprocess call
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,

    // @field: Primary video codec
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    // @field: Video codec used when the primary encode fails
    #[serde(default = "default_fallback_video_codec")]
    pub fallback_video_codec: String,

    // @field: x264 preset
    #[serde(default = "default_preset")]
    pub preset: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: default_ffmpeg_bin(),
            step_timeout_secs: default_step_timeout_secs(),
            video_codec: default_video_codec(),
            fallback_video_codec: default_fallback_video_codec(),
            preset: default_preset(),
        }
    }
}

/// Segmenter limits
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SegmenterConfig {
    /// Max words per speech segment
    #[serde(default = "default_max_words")]
    pub max_words: usize,

    /// Segments shorter than this are merged into a neighbour
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Max characters per caption line fragment
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
            min_words: default_min_words(),
            max_chars: default_max_chars(),
            min_chars: default_min_chars(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_fps() -> u32 {
    24
}

fn default_audio_sample_rate() -> u32 {
    44100
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "128k".to_string()
}

fn default_background() -> String {
    "#000000".to_string()
}

fn default_transition_duration() -> f64 {
    0.4
}

fn default_transition_padding() -> f64 {
    0.4
}

fn default_zoom_speed() -> f64 {
    0.5
}

fn default_move_ratio() -> f64 {
    0.95
}

fn default_true() -> bool {
    true
}

fn default_font() -> String {
    "DejaVuSans.ttf".to_string()
}

fn default_caption_color() -> String {
    "#FFFFFF".to_string()
}

fn default_stroke_color() -> String {
    "#000000".to_string()
}

fn default_stroke_width() -> u32 {
    1
}

fn default_max_chars_per_line() -> usize {
    40
}

fn default_alignment() -> u8 {
    2 // bottom centre
}

fn default_margin_v() -> u32 {
    10
}

fn default_margin_h() -> u32 {
    30
}

fn default_line_gap() -> f64 {
    0.3
}

fn default_caption_workers() -> usize {
    4
}

fn default_music_volume() -> f64 {
    0.25
}

fn default_music_extensions() -> Vec<String> {
    vec!["mp3".to_string(), "wav".to_string(), "flac".to_string()]
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_step_timeout_secs() -> u64 {
    300 // 5 minutes per encoder call
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_fallback_video_codec() -> String {
    "mpeg4".to_string()
}

fn default_preset() -> String {
    "fast".to_string()
}

fn default_max_words() -> usize {
    20
}

fn default_min_words() -> usize {
    3
}

fn default_max_chars() -> usize {
    60
}

fn default_min_chars() -> usize {
    8
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let video = &self.video;
        if video.width == 0 || video.height == 0 {
            return Err(anyhow!("Canvas size must be non-zero, got {}x{}", video.width, video.height));
        }
        if video.width % 2 != 0 || video.height % 2 != 0 {
            return Err(anyhow!("Canvas size must be even, got {}x{}", video.width, video.height));
        }
        if video.fps == 0 || video.fps > 120 {
            return Err(anyhow!("fps must be between 1 and 120, got {}", video.fps));
        }
        if video.audio_sample_rate < 8000 {
            return Err(anyhow!("Audio sample rate too low: {}", video.audio_sample_rate));
        }
        crate::captions::glyph::parse_color(&video.background)
            .ok_or_else(|| anyhow!("Unrecognised background colour: {}", video.background))?;

        let effects = &self.effects;
        if effects.transition_duration < 0.0 {
            return Err(anyhow!("transition_duration must not be negative"));
        }
        if effects.transition_padding < effects.transition_duration {
            return Err(anyhow!(
                "transition_padding ({}) must be at least transition_duration ({})",
                effects.transition_padding, effects.transition_duration
            ));
        }
        if !(effects.move_ratio > 0.0 && effects.move_ratio <= 1.0) {
            return Err(anyhow!("move_ratio must be in (0, 1], got {}", effects.move_ratio));
        }
        if effects.fade_duration < 0.0 || effects.zoom_speed < 0.0 {
            return Err(anyhow!("fade_duration and zoom_speed must not be negative"));
        }

        if self.caption.max_chars_per_line == 0 {
            return Err(anyhow!("caption.max_chars_per_line must be positive"));
        }
        if self.caption.workers == 0 {
            return Err(anyhow!("caption.workers must be positive"));
        }
        if self.caption.line_gap < 0.0 {
            return Err(anyhow!("caption.line_gap must not be negative"));
        }

        if !(0.0..=4.0).contains(&self.music.volume) {
            return Err(anyhow!("music.volume must be between 0 and 4, got {}", self.music.volume));
        }

        if self.encoder.step_timeout_secs == 0 {
            return Err(anyhow!("encoder.step_timeout_secs must be positive"));
        }

        let seg = &self.segmenter;
        if seg.max_words == 0 || seg.max_chars == 0 {
            return Err(anyhow!("segmenter limits must be positive"));
        }
        if seg.min_words > seg.max_words || seg.min_chars > seg.max_chars {
            return Err(anyhow!("segmenter minimums must not exceed maximums"));
        }

        Ok(())
    }

    /// Canvas height including the caption area
    pub fn frame_height(&self) -> u32 {
        if self.caption.enabled {
            self.video.height + self.caption.effective_area_height(self.video.height)
        } else {
            self.video.height
        }
    }
}
