use log::{debug, warn};

use crate::captions::cue::{CaptionCue, CueList};
use crate::segmenter::Segmenter;
use crate::timeline::Timestamp;

/// How timestamps relate to caption texts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionMode {
    /// One timestamp per spoken sentence; one cue each, never re-split
    PerSegment,
    /// One timestamp per page; page text is split into timed lines
    PageLevel,
}

/// Maps realized timestamps to caption cues
#[derive(Debug, Clone)]
pub struct CaptionSynchronizer {
    lines: Segmenter,
    line_gap: f64,
}

impl CaptionSynchronizer {
    /// `lines` sizes page-level caption lines; `line_gap` separates them
    pub fn new(lines: Segmenter, line_gap: f64) -> Self {
        Self {
            lines,
            line_gap: line_gap.max(0.0),
        }
    }

    /// Build the cue list for a job.
    ///
    /// Mismatched counts are truncated to the shorter side with a warning.
    pub fn synchronize(&self, timestamps: &[Timestamp], texts: &[String], mode: CaptionMode) -> CueList {
        if timestamps.len() != texts.len() {
            warn!(
                "Caption count mismatch: {} texts for {} timestamps, using the first {}",
                texts.len(),
                timestamps.len(),
                timestamps.len().min(texts.len())
            );
        }

        let mut cues = Vec::new();
        for (stamp, text) in timestamps.iter().zip(texts) {
            match mode {
                CaptionMode::PerSegment => {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    cues.push(CaptionCue::from_seconds(stamp.start, stamp.end, text));
                }
                CaptionMode::PageLevel => cues.extend(self.split_page(stamp, text)),
            }
        }

        debug!("Synchronized {} caption cues ({:?})", cues.len(), mode);
        CueList::new(cues)
    }

    /// Divide a page window evenly across its caption lines
    fn split_page(&self, stamp: &Timestamp, text: &str) -> Vec<CaptionCue> {
        let lines = self.lines.segment(text);
        if lines.is_empty() {
            return Vec::new();
        }

        let n = lines.len() as f64;
        let total = stamp.duration();
        let mut gap = self.line_gap;
        let mut line_duration = (total - gap * (n - 1.0)) / n;
        if line_duration <= gap {
            gap = 0.0;
            line_duration = total / n;
        }

        lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let start = stamp.start + (line_duration + gap) * i as f64;
                CaptionCue::from_seconds(start, start + line_duration, line)
            })
            .collect()
    }
}
