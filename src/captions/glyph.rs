/*!
 * Caption glyph rasterisation.
 *
 * Each distinct cue text is rendered once into a transparent RGBA image
 * with an outline, so repeated lines share one bitmap. Rendering runs on
 * blocking worker threads with bounded concurrency; a text that fails to
 * render gets an empty placeholder instead of failing the job.
 */

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fontdue::layout::{CoordinateSystem, HorizontalAlign, Layout, LayoutSettings, TextStyle, VerticalAlign, WrapStyle};
use fontdue::{Font, FontSettings};
use futures::stream::{self, StreamExt};
use image::{Rgba, RgbaImage};
use log::{debug, warn};

use crate::app_config::Config;
use crate::errors::ComposeError;
use crate::file_utils::FileManager;

// @const: Directories searched for a font given by file name
const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/Library/Fonts",
    "/System/Library/Fonts",
    "C:\\Windows\\Fonts",
];

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("white", [255, 255, 255]),
    ("black", [0, 0, 0]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
];

/// Parse `#RGB`, `#RRGGBB`, `#RRGGBBAA` or a CSS colour name into RGBA
pub fn parse_color(value: &str) -> Option<[u8; 4]> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        return match hex.len() {
            3 => {
                let mut rgb = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    rgb[i] = channel(&c.to_string().repeat(2))?;
                }
                Some([rgb[0], rgb[1], rgb[2], 255])
            }
            6 | 8 if hex.is_ascii() => {
                let r = channel(&hex[0..2])?;
                let g = channel(&hex[2..4])?;
                let b = channel(&hex[4..6])?;
                let a = if hex.len() == 8 { channel(&hex[6..8])? } else { 255 };
                Some([r, g, b, a])
            }
            _ => None,
        };
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
        .map(|(_, [r, g, b])| [*r, *g, *b, 255])
}

/// Greedy word wrap at `max_chars` characters per line; long words stay whole
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
            } else if current.chars().count() + 1 + word.chars().count() <= max_chars {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Locate a font: as given, relative to the story, then in system font dirs
pub fn resolve_font(font: &str, story_dir: &Path) -> Option<PathBuf> {
    let direct = PathBuf::from(font);
    if FileManager::file_exists(&direct) {
        return Some(direct);
    }
    let local = story_dir.join(font);
    if FileManager::file_exists(&local) {
        return Some(local);
    }
    let file_name = direct.file_name()?.to_string_lossy().to_string();
    FileManager::find_file_named(SYSTEM_FONT_DIRS, &file_name)
}

/// Visual style of overlay captions
#[derive(Debug, Clone)]
pub struct GlyphStyle {
    pub font_size: f32,
    pub color: [u8; 4],
    pub stroke_color: [u8; 4],
    pub stroke_width: u32,
    pub max_chars_per_line: usize,
    /// Width of the rendered bitmap
    pub width: u32,
}

impl GlyphStyle {
    pub fn from_config(config: &Config) -> Self {
        let caption = &config.caption;
        let video = &config.video;
        Self {
            font_size: caption.effective_font_size(video.width, video.height) as f32,
            color: parse_color(&caption.color).unwrap_or([255, 255, 255, 255]),
            stroke_color: parse_color(&caption.stroke_color).unwrap_or([0, 0, 0, 255]),
            stroke_width: caption.stroke_width,
            max_chars_per_line: caption.max_chars_per_line,
            width: video.width.saturating_sub(2 * caption.margin_h).max(1),
        }
    }
}

/// Rasterises caption text with a loaded font
#[derive(Clone)]
pub struct GlyphRenderer {
    font: Option<Arc<Font>>,
    style: GlyphStyle,
}

impl GlyphRenderer {
    /// Load the font at `font_path`. Without a usable font every render
    /// fails and callers fall back to placeholders.
    pub fn load(font_path: Option<&Path>, style: GlyphStyle) -> Self {
        let font = match font_path {
            Some(path) => match std::fs::read(path) {
                Ok(bytes) => match Font::from_bytes(bytes, FontSettings::default()) {
                    Ok(font) => Some(Arc::new(font)),
                    Err(e) => {
                        warn!("Failed to parse caption font {}: {}", path.display(), e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Failed to read caption font {}: {}", path.display(), e);
                    None
                }
            },
            None => {
                warn!("No caption font found; overlay captions will be blank");
                None
            }
        };
        Self { font, style }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render one cue text into a transparent bitmap of the style's width
    pub fn render(&self, text: &str) -> Result<RgbaImage, ComposeError> {
        let font = self
            .font
            .as_ref()
            .ok_or_else(|| ComposeError::Image("no caption font loaded".to_string()))?;

        let lines = wrap_text(text, self.style.max_chars_per_line);
        if lines.is_empty() {
            return Ok(placeholder());
        }

        let pad = self.style.stroke_width as f32;
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: pad,
            y: pad,
            max_width: Some(self.style.width as f32 - 2.0 * pad),
            max_height: None,
            horizontal_align: HorizontalAlign::Center,
            vertical_align: VerticalAlign::Top,
            line_height: 1.0,
            wrap_style: WrapStyle::Word,
            wrap_hard_breaks: true,
        });
        layout.append(&[font.as_ref()], &TextStyle::new(&lines.join("\n"), self.style.font_size, 0));

        let width = self.style.width as usize;
        let height = (layout.height() + 2.0 * pad).ceil().max(1.0) as usize;
        let mut coverage = vec![0u8; width * height];

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (_, bitmap) = font.rasterize_config(glyph.key);
            let gx = glyph.x.round() as i64;
            let gy = glyph.y.round() as i64;
            for row in 0..glyph.height {
                for col in 0..glyph.width {
                    let x = gx + col as i64;
                    let y = gy + row as i64;
                    if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
                        continue;
                    }
                    let idx = y as usize * width + x as usize;
                    coverage[idx] = coverage[idx].max(bitmap[row * glyph.width + col]);
                }
            }
        }

        let outline = dilate(&coverage, width, height, self.style.stroke_width as usize);
        let mut image = RgbaImage::new(width as u32, height as u32);
        for (i, pixel) in image.pixels_mut().enumerate() {
            let fill = coverage[i] as f32 / 255.0;
            let stroke = outline[i] as f32 / 255.0;
            *pixel = composite(self.style.stroke_color, stroke, self.style.color, fill);
        }
        Ok(image)
    }

    /// Render every distinct text once with at most `workers` in flight
    pub async fn render_all(&self, texts: &[String], workers: usize) -> HashMap<String, Arc<RgbaImage>> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = texts.iter().filter(|t| seen.insert(t.as_str())).cloned().collect();
        debug!("Pre-rendering {} unique captions of {} cues", unique.len(), texts.len());

        let results: Vec<(String, Arc<RgbaImage>)> = stream::iter(unique)
            .map(|text| {
                let renderer = self.clone();
                async move {
                    let job_text = text.clone();
                    let rendered = tokio::task::spawn_blocking(move || renderer.render(&job_text)).await;
                    let image = match rendered {
                        Ok(Ok(image)) => image,
                        Ok(Err(e)) => {
                            warn!("Caption render failed for {:?}: {}; using placeholder", text, e);
                            placeholder()
                        }
                        Err(e) => {
                            warn!("Caption render task failed for {:?}: {}; using placeholder", text, e);
                            placeholder()
                        }
                    };
                    (text, Arc::new(image))
                }
            })
            .buffer_unordered(workers.max(1))
            .collect()
            .await;

        results.into_iter().collect()
    }
}

/// Transparent 1x1 stand-in for a caption that could not be rendered
pub fn placeholder() -> RgbaImage {
    RgbaImage::new(1, 1)
}

/// Max filter over a square neighbourhood of `radius`
fn dilate(mask: &[u8], width: usize, height: usize, radius: usize) -> Vec<u8> {
    if radius == 0 {
        return mask.to_vec();
    }
    // separable: rows then columns
    let mut rows = vec![0u8; mask.len()];
    for y in 0..height {
        for x in 0..width {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(width - 1);
            rows[y * width + x] = mask[y * width + lo..=y * width + hi].iter().copied().max().unwrap_or(0);
        }
    }
    let mut out = vec![0u8; mask.len()];
    for x in 0..width {
        for y in 0..height {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(height - 1);
            out[y * width + x] = (lo..=hi).map(|yy| rows[yy * width + x]).max().unwrap_or(0);
        }
    }
    out
}

/// Fill over stroke, both over transparent
fn composite(stroke: [u8; 4], stroke_cov: f32, fill: [u8; 4], fill_cov: f32) -> Rgba<u8> {
    let sa = stroke_cov * stroke[3] as f32 / 255.0;
    let fa = fill_cov * fill[3] as f32 / 255.0;
    let alpha = fa + sa * (1.0 - fa);
    if alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut rgba = [0u8; 4];
    for c in 0..3 {
        let value = (fill[c] as f32 * fa + stroke[c] as f32 * sa * (1.0 - fa)) / alpha;
        rgba[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    rgba[3] = (alpha * 255.0).round() as u8;
    Rgba(rgba)
}
