use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ComposeError;

// @module: Caption cues and SRT files

// @const: SRT timestamp regex
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2})[,.](\d{3})").unwrap()
});

// @const: Identical adjacent cues closer than this are joined
const MERGE_GAP_MS: u64 = 50;
// @const: Cues shorter than this are dropped before writing
const MIN_CUE_MS: u64 = 60;
// @const: Length given to cues whose end does not follow their start
const WIDEN_MS: u64 = 10;

// @struct: Single caption cue
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Caption text
    pub text: String,
}

impl CaptionCue {
    /// Build a cue from timeline seconds
    pub fn from_seconds(start: f64, end: f64, text: &str) -> Self {
        CaptionCue {
            start_ms: seconds_to_ms(start),
            end_ms: seconds_to_ms(end),
            text: text.to_string(),
        }
    }

    // @creates: Validated cue
    // @validates: Time range and non-empty text
    pub fn new_validated(start_ms: u64, end_ms: u64, text: &str) -> Result<Self> {
        if end_ms <= start_ms {
            return Err(anyhow!("Invalid time range: end time {} <= start time {}", end_ms, start_ms));
        }

        let trimmed_text = text.trim();
        if trimmed_text.is_empty() {
            return Err(anyhow!("Empty caption text at {}", Self::format_timestamp(start_ms)));
        }

        Ok(CaptionCue {
            start_ms,
            end_ms,
            text: trimmed_text.to_string(),
        })
    }

    pub fn start(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn end(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }

    /// Whether the cue is on screen at `t` seconds
    pub fn contains(&self, t: f64) -> bool {
        let ms = t * 1000.0;
        ms >= self.start_ms as f64 && ms < self.end_ms as f64
    }

    /// Parse an SRT timestamp to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
        // Parse HH:MM:SS,mmm format
        let parts: Vec<&str> = timestamp.trim().split(&[':', ',', '.'][..]).collect();

        if parts.len() != 4 {
            return Err(anyhow!("Invalid timestamp format: {}", timestamp));
        }

        let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
        let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
        let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
        let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

/// Round seconds to whole milliseconds, clamping negatives to zero
pub fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

/// Ordered cue list owned by a render job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueList {
    pub cues: Vec<CaptionCue>,
}

impl CueList {
    pub fn new(cues: Vec<CaptionCue>) -> Self {
        CueList { cues }
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Cue on screen at `t` seconds, if any
    pub fn active_at(&self, t: f64) -> Option<&CaptionCue> {
        self.cues.iter().find(|cue| cue.contains(t))
    }

    /// Clean a cue list for writing.
    ///
    /// Line endings and blank text are normalised, cues are sorted, identical
    /// neighbours within 50 ms are joined, empty ranges are widened to 10 ms
    /// and anything shorter than 60 ms is dropped.
    pub fn normalized(&self) -> CueList {
        let mut norm: Vec<CaptionCue> = self
            .cues
            .iter()
            .filter_map(|cue| {
                let text = cue.text.replace("\r\n", "\n").replace('\r', "\n");
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                let end_ms = if cue.end_ms > cue.start_ms { cue.end_ms } else { cue.start_ms + WIDEN_MS };
                Some(CaptionCue {
                    start_ms: cue.start_ms,
                    end_ms,
                    text: text.to_string(),
                })
            })
            .collect();
        norm.sort_by_key(|cue| (cue.start_ms, cue.end_ms));

        let mut merged: Vec<CaptionCue> = Vec::with_capacity(norm.len());
        for cue in norm {
            if let Some(prev) = merged.last_mut() {
                if prev.text == cue.text && cue.start_ms <= prev.end_ms + MERGE_GAP_MS {
                    prev.end_ms = prev.end_ms.max(cue.end_ms);
                    continue;
                }
            }
            merged.push(cue);
        }

        let before = merged.len();
        merged.retain(|cue| cue.end_ms - cue.start_ms >= MIN_CUE_MS);
        if merged.len() < before {
            debug!("Dropped {} caption cues shorter than {}ms", before - merged.len(), MIN_CUE_MS);
        }
        CueList { cues: merged }
    }

    /// Write cues to an SRT file, numbered from 1
    pub fn write_srt<P: AsRef<Path>>(&self, path: P) -> Result<(), ComposeError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = File::create(path)?;
        write!(file, "{}", self)?;
        Ok(())
    }

    /// Parse an SRT file
    pub fn parse_srt_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read subtitle file: {}", path.as_ref().display()))?;
        Self::parse_srt_string(&content)
    }

    /// Parse SRT format string into cues
    pub fn parse_srt_string(content: &str) -> Result<Self> {
        let mut cues = Vec::new();

        // State variables for parsing
        let mut current_seq_num: Option<usize> = None;
        let mut current_range: Option<(u64, u64)> = None;
        let mut current_text = String::new();

        let mut add_current_entry = |seq_num: usize, start_ms: u64, end_ms: u64, text: &str| {
            match CaptionCue::new_validated(start_ms, end_ms, text) {
                Ok(cue) => cues.push(cue),
                Err(e) => warn!("Skipping invalid caption cue {}: {}", seq_num, e),
            }
        };

        for (line_no, line) in content.lines().enumerate() {
            let trimmed = line.trim().trim_start_matches('\u{feff}');

            if trimmed.is_empty() {
                if let (Some(seq_num), Some((start_ms, end_ms))) = (current_seq_num, current_range) {
                    if !current_text.is_empty() {
                        add_current_entry(seq_num, start_ms, end_ms, &current_text);
                        current_seq_num = None;
                        current_range = None;
                        current_text.clear();
                    }
                }
                continue;
            }

            if current_seq_num.is_none() && current_text.is_empty() {
                if let Ok(num) = trimmed.parse::<usize>() {
                    current_seq_num = Some(num);
                    continue;
                }
            }

            if current_seq_num.is_some() && current_range.is_none() {
                if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                    current_range = Some((captured_ms(&caps, 1), captured_ms(&caps, 5)));
                    continue;
                }
            }

            if current_seq_num.is_some() && current_range.is_some() {
                if !current_text.is_empty() {
                    current_text.push('\n');
                }
                current_text.push_str(trimmed);
            } else {
                warn!("Unexpected text at line {} before sequence number or timestamp: {}", line_no + 1, trimmed);
            }
        }

        if let (Some(seq_num), Some((start_ms, end_ms))) = (current_seq_num, current_range) {
            if !current_text.is_empty() {
                add_current_entry(seq_num, start_ms, end_ms, &current_text);
            }
        }

        if cues.is_empty() {
            return Err(anyhow!("No valid caption cues were found in the SRT content"));
        }

        cues.sort_by_key(|cue| cue.start_ms);

        let overlap_count = cues.windows(2).filter(|pair| pair[0].end_ms > pair[1].start_ms).count();
        if overlap_count > 0 {
            warn!("Found {} overlapping caption cues", overlap_count);
        }

        Ok(CueList { cues })
    }
}

fn captured_ms(caps: &regex::Captures, start_idx: usize) -> u64 {
    let part = |offset: usize| -> u64 {
        caps.get(start_idx + offset)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0))
    };
    (part(0) * 3600 + part(1) * 60 + part(2)) * 1000 + part(3)
}

impl fmt::Display for CueList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, cue) in self.cues.iter().enumerate() {
            writeln!(f, "{}", i + 1)?;
            writeln!(
                f,
                "{} --> {}",
                CaptionCue::format_timestamp(cue.start_ms),
                CaptionCue::format_timestamp(cue.end_ms)
            )?;
            writeln!(f, "{}", cue.text)?;
            writeln!(f)?;
        }
        Ok(())
    }
}
