/*!
 * Composite frame rasteriser.
 *
 * Produces the RGB frame of the timeline at a given time: every clip on
 * screen is drawn with its effect viewport, slide offset and fade, and the
 * active caption glyph is blended into the caption area below the image.
 */

use std::collections::HashMap;
use std::sync::Arc;

use image::{imageops, Rgb, RgbImage, RgbaImage};

use crate::captions::cue::CueList;
use crate::timeline::{PlacedClip, SlideSide, Timeline};

/// Everything needed to draw any frame of a job; cheap to clone
#[derive(Clone)]
pub struct FrameRasterizer {
    timeline: Arc<Timeline>,
    cues: Arc<CueList>,
    glyphs: Arc<HashMap<String, Arc<RgbaImage>>>,
    width: u32,
    height: u32,
    caption_area: u32,
    background: Rgb<u8>,
}

impl FrameRasterizer {
    pub fn new(
        timeline: Arc<Timeline>,
        cues: Arc<CueList>,
        glyphs: Arc<HashMap<String, Arc<RgbaImage>>>,
        width: u32,
        height: u32,
        caption_area: u32,
        background: Rgb<u8>,
    ) -> Self {
        Self {
            timeline,
            cues,
            glyphs,
            width,
            height,
            caption_area,
            background,
        }
    }

    /// Full frame size including the caption area
    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height + self.caption_area)
    }

    /// Number of frames covering the timeline at `fps`
    pub fn frame_count(&self, fps: u32) -> u64 {
        (self.timeline.duration() * fps as f64).ceil() as u64
    }

    /// Draw the frame shown at `t` seconds
    pub fn render(&self, t: f64) -> RgbImage {
        let (w, h) = self.frame_size();
        let mut canvas = RgbImage::from_pixel(w, h, self.background);

        for placed in self.timeline.active_at(t) {
            let (picture, x_offset) = self.draw_clip(placed, t);
            imageops::replace(&mut canvas, &picture, x_offset, 0);
        }

        if self.caption_area > 0 {
            if let Some(glyph) = self.cues.active_at(t).and_then(|cue| self.glyphs.get(&cue.text)) {
                let (gw, gh) = glyph.dimensions();
                let x = (self.width as i64 - gw as i64) / 2;
                let y = self.height as i64 + (self.caption_area as i64 - gh as i64) / 2;
                blend_rgba(&mut canvas, glyph, x, y);
            }
        }
        canvas
    }

    fn draw_clip(&self, placed: &PlacedClip, t: f64) -> (RgbImage, i64) {
        let duration = placed.clip.duration().max(f64::EPSILON);
        let local = (t - placed.start).clamp(0.0, duration);
        let image = placed.clip.image.as_ref();

        let (vx, vy, vw, vh) = placed.clip.effect.viewport(local / duration, self.width, self.height);
        let mut picture = if vw >= self.width as f64 && vh >= self.height as f64 {
            image.clone()
        } else {
            let x = vx.floor().max(0.0) as u32;
            let y = vy.floor().max(0.0) as u32;
            let cw = (vw.round() as u32).clamp(1, self.width - x.min(self.width - 1));
            let ch = (vh.round() as u32).clamp(1, self.height - y.min(self.height - 1));
            let cropped = imageops::crop_imm(image, x, y, cw, ch).to_image();
            imageops::resize(&cropped, self.width, self.height, imageops::FilterType::Triangle)
        };

        let fade = self.timeline.fade_duration();
        if fade > 0.0 {
            let mut level: f64 = 1.0;
            if placed.fade_in && local < fade {
                level = level.min(local / fade);
            }
            if placed.fade_out && duration - local < fade {
                level = level.min((duration - local) / fade);
            }
            if level < 1.0 {
                fade_toward(&mut picture, self.background, level as f32);
            }
        }

        let transition = self.timeline.transition();
        let width = self.width as f64;
        let mut offset = 0.0;
        if transition > 0.0 {
            if let Some(side) = placed.slide_in {
                if local < transition {
                    let remaining = 1.0 - local / transition;
                    offset = match side {
                        SlideSide::Left => -width * remaining,
                        SlideSide::Right => width * remaining,
                    };
                }
            }
            if let Some(side) = placed.slide_out {
                let left = duration - local;
                if left < transition {
                    let progress = 1.0 - left / transition;
                    offset = match side {
                        SlideSide::Left => -width * progress,
                        SlideSide::Right => width * progress,
                    };
                }
            }
        }

        (picture, offset.round() as i64)
    }
}

fn fade_toward(picture: &mut RgbImage, background: Rgb<u8>, level: f32) {
    let level = level.clamp(0.0, 1.0);
    for pixel in picture.pixels_mut() {
        for c in 0..3 {
            let value = background[c] as f32 + (pixel[c] as f32 - background[c] as f32) * level;
            pixel[c] = value.round() as u8;
        }
    }
}

/// Alpha-blend an RGBA image onto an RGB canvas, clipping at the edges
fn blend_rgba(canvas: &mut RgbImage, overlay: &RgbaImage, x: i64, y: i64) {
    let (cw, ch) = canvas.dimensions();
    for (ox, oy, pixel) in overlay.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        if alpha == 0 {
            continue;
        }
        let tx = x + ox as i64;
        let ty = y + oy as i64;
        if tx < 0 || ty < 0 || tx >= cw as i64 || ty >= ch as i64 {
            continue;
        }
        let target = canvas.get_pixel_mut(tx as u32, ty as u32);
        for c in 0..3 {
            let blended = (pixel[c] as u32 * alpha + target[c] as u32 * (255 - alpha) + 127) / 255;
            target[c] = blended as u8;
        }
    }
}
