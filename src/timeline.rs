/*!
 * Transition composition.
 *
 * Clips are laid end to end with adjacent clips overlapping by the
 * transition duration. Caption timestamps are read back from the placed
 * clips, so narration and captions always agree on where a segment starts.
 */

use log::{debug, error};
use rand::Rng;

use crate::app_config::FadeMode;
use crate::audio::{seconds_to_frames, AudioTrack, CHANNELS};
use crate::clip_builder::TimedClip;
use crate::errors::ComposeError;

// Shortest caption window for a segment with near-empty narration
const MIN_WINDOW: f64 = 0.01;

/// Side of the canvas a clip leaves through, or enters from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideSide {
    Left,
    Right,
}

impl SlideSide {
    pub fn complement(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Caption window of one segment on the composed timeline, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamp {
    pub start: f64,
    pub end: f64,
}

impl Timestamp {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A clip at its position on the timeline
#[derive(Debug, Clone)]
pub struct PlacedClip {
    pub start: f64,
    pub clip: TimedClip,
    /// Side the clip enters from during the overlap with its predecessor
    pub slide_in: Option<SlideSide>,
    /// Side the clip leaves through during the overlap with its successor
    pub slide_out: Option<SlideSide>,
    pub fade_in: bool,
    pub fade_out: bool,
}

impl PlacedClip {
    pub fn end(&self) -> f64 {
        self.start + self.clip.duration()
    }

    /// Whether the clip is on screen at `t`
    pub fn is_active(&self, t: f64) -> bool {
        t >= self.start && t < self.end()
    }

    /// Narration window read back from the placed clip
    pub fn timestamp(&self) -> Timestamp {
        let start = self.start + self.clip.lead_padding;
        Timestamp {
            start,
            end: start + self.clip.speech_duration.max(MIN_WINDOW),
        }
    }
}

/// The single composed stream of a render job
#[derive(Debug, Clone)]
pub struct Timeline {
    clips: Vec<PlacedClip>,
    transition: f64,
    fade_duration: f64,
}

impl Timeline {
    pub fn clips(&self) -> &[PlacedClip] {
        &self.clips
    }

    pub fn transition(&self) -> f64 {
        self.transition
    }

    pub fn fade_duration(&self) -> f64 {
        self.fade_duration
    }

    /// End of the last clip
    pub fn duration(&self) -> f64 {
        self.clips.iter().map(PlacedClip::end).fold(0.0, f64::max)
    }

    /// Clips on screen at `t`, earliest first
    pub fn active_at(&self, t: f64) -> impl Iterator<Item = &PlacedClip> {
        self.clips.iter().filter(move |placed| placed.is_active(t))
    }

    /// Sum every clip's padded audio at its offset
    pub fn mix_audio(&self, sample_rate: u32) -> AudioTrack {
        let frames = seconds_to_frames(self.duration(), sample_rate);
        let mut buffer = vec![0.0_f32; frames * CHANNELS];
        for placed in &self.clips {
            placed
                .clip
                .audio
                .mix_into(&mut buffer, seconds_to_frames(placed.start, sample_rate));
        }
        let mut track = AudioTrack::from_interleaved(buffer, sample_rate);
        track.clamp();
        track
    }
}

/// Arranges clips with slide transitions
#[derive(Debug, Clone)]
pub struct TransitionComposer {
    transition: f64,
    fade_duration: f64,
    fade_mode: FadeMode,
}

impl TransitionComposer {
    pub fn new(transition: f64) -> Self {
        Self {
            transition: transition.max(0.0),
            fade_duration: 0.0,
            fade_mode: FadeMode::None,
        }
    }

    /// Fade clips from and to the background colour
    pub fn with_fade(mut self, mode: FadeMode, duration: f64) -> Self {
        self.fade_mode = mode;
        self.fade_duration = duration.max(0.0);
        self
    }

    /// Place clips and return the timeline with one timestamp per clip.
    ///
    /// Clip `i` starts at the summed duration of the clips before it minus
    /// `i` transitions. The first clip slides out to the left; every later
    /// exit side comes from `rng`, and each entry side is the complement of
    /// the previous exit.
    pub fn compose<R: Rng + ?Sized>(
        &self,
        clips: Vec<TimedClip>,
        rng: &mut R,
    ) -> Result<(Timeline, Vec<Timestamp>), ComposeError> {
        let expected = clips.len();
        let last = expected.saturating_sub(1);
        let sliding = self.transition > 0.0;

        let mut placed: Vec<PlacedClip> = Vec::with_capacity(expected);
        let mut elapsed = 0.0;
        let mut previous_exit: Option<SlideSide> = None;

        for (i, clip) in clips.into_iter().enumerate() {
            let start = (elapsed - self.transition * i as f64).max(0.0);
            elapsed += clip.duration();

            let slide_in = if sliding { previous_exit.map(SlideSide::complement) } else { None };
            let slide_out = match (sliding, i) {
                (false, _) => None,
                (true, i) if i == last => None,
                (true, 0) => Some(SlideSide::Left),
                (true, _) => Some(if rng.random_bool(0.5) { SlideSide::Left } else { SlideSide::Right }),
            };
            previous_exit = slide_out;

            let fades = self.fade_duration > 0.0;
            let (fade_in, fade_out) = match self.fade_mode {
                FadeMode::None => (false, false),
                FadeMode::Ends => (fades && i == 0, fades && i == last),
                FadeMode::All => (fades, fades),
            };

            placed.push(PlacedClip {
                start,
                clip,
                slide_in,
                slide_out,
                fade_in,
                fade_out,
            });
        }

        check_assembly(&placed)?;

        let timestamps: Vec<Timestamp> = placed.iter().map(PlacedClip::timestamp).collect();
        let timeline = Timeline {
            clips: placed,
            transition: self.transition,
            fade_duration: self.fade_duration,
        };
        debug!(
            "Composed {} clips, {:.3}s total, transition {:.2}s",
            expected,
            timeline.duration(),
            self.transition
        );
        Ok((timeline, timestamps))
    }
}

// Float slack when comparing realized offsets
const EPSILON: f64 = 1e-9;

/// Starts never move backwards and every narration window opens inside its
/// own clip. A clip shorter than the transition breaks both.
fn check_assembly(placed: &[PlacedClip]) -> Result<(), ComposeError> {
    let mut previous_start = 0.0;
    for (i, clip) in placed.iter().enumerate() {
        let window = clip.timestamp();
        let detail = if clip.start + EPSILON < previous_start {
            Some(format!("starts at {:.3}s before the previous clip at {:.3}s", clip.start, previous_start))
        } else if window.start + EPSILON < clip.start || window.start > clip.end() + EPSILON {
            Some(format!(
                "narration at {:.3}s lies outside the clip [{:.3}s, {:.3}s)",
                window.start,
                clip.start,
                clip.end()
            ))
        } else {
            None
        };
        if let Some(detail) = detail {
            error!("Timeline assembly failed at clip {}: {}", i, detail);
            return Err(ComposeError::TimelineAssembly { clip: i, detail });
        }
        previous_start = clip.start;
    }
    Ok(())
}
