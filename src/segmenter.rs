/*!
 * Text segmentation for speech synthesis and caption lines.
 *
 * Splits page text into fragments no longer than a configured number of
 * words or characters. Splitting prefers sentence terminators, then clause
 * terminators, then commas, then whitespace, and only hard-cuts a single
 * token when nothing else is left. Known abbreviations never end a sentence.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// @const: Abbreviations whose trailing period is not a sentence terminator
const ABBREVIATIONS: &[&str] = &[
    "Dr", "Mr", "Mrs", "Ms", "Prof", "Sr", "Jr", "Ltd", "Inc", "Corp", "Co", "St", "Ave", "Blvd",
    "Rd", "etc", "vs", "e.g", "i.e", "a.m", "p.m", "U.S", "U.K", "U.N", "Ph.D", "M.D", "B.A",
    "M.A", "Jan", "Feb", "Mar", "Apr", "Jun", "Jul", "Aug", "Sep", "Sept", "Oct", "Nov", "Dec",
    "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun", "No", "Nos", "Vol", "Vols", "pp", "fig",
    "figs", "ref", "Gen", "Lt", "Col", "Maj", "Capt", "Sgt", "Rev", "Hon", "Gov", "Sen", "Rep",
    "Pres", "Dept", "Univ", "Min", "Max", "Avg", "Std", "Est", "Circa", "ca",
];

// Stands in for a protected period; never produced by normal text
const PERIOD_SENTINEL: char = '\u{E000}';

static ABBREVIATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    let alternatives: Vec<String> = ABBREVIATIONS.iter().map(|a| regex::escape(a)).collect();
    Regex::new(&format!(r"\b(?:{})\.", alternatives.join("|"))).unwrap()
});

const STRONG: &[char] = &['.', '!', '?', '。', '！', '？'];
const MEDIUM: &[char] = &[';', ':', '；', '：'];
const WEAK: &[char] = &[',', '，', '、'];
const CLOSING: &[char] = &['"', '\'', ')', ']', '”', '’', '」', '』'];

/// Unit used to measure fragment length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Whitespace-separated words, used to size speech segments
    Words,
    /// Unicode scalar values, used to size caption lines
    Chars,
}

impl UnitKind {
    /// Count units in a fragment
    pub fn count(&self, text: &str) -> usize {
        match self {
            Self::Words => text.split_whitespace().count(),
            Self::Chars => text.chars().count(),
        }
    }
}

impl std::str::FromStr for UnitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "words" | "word" => Ok(Self::Words),
            "chars" | "char" | "characters" => Ok(Self::Chars),
            other => Err(format!("unknown unit kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Level {
    Medium,
    Weak,
    Whitespace,
}

/// Pure text splitter with fixed limits
#[derive(Debug, Clone)]
pub struct Segmenter {
    max_units: usize,
    min_units: usize,
    unit: UnitKind,
}

impl Segmenter {
    /// Create a segmenter; `max_units` is clamped to at least 1 and
    /// `min_units` to at most `max_units`
    pub fn new(max_units: usize, min_units: usize, unit: UnitKind) -> Self {
        let max_units = max_units.max(1);
        Self {
            max_units,
            min_units: min_units.min(max_units),
            unit,
        }
    }

    /// Word-based segmenter for sizing speech segments
    pub fn for_speech(max_words: usize, min_words: usize) -> Self {
        Self::new(max_words, min_words, UnitKind::Words)
    }

    /// Character-based segmenter for sizing caption lines
    pub fn for_captions(max_chars: usize, min_chars: usize) -> Self {
        Self::new(max_chars, min_chars, UnitKind::Chars)
    }

    pub fn max_units(&self) -> usize {
        self.max_units
    }

    pub fn unit(&self) -> UnitKind {
        self.unit
    }

    /// Split text into ordered fragments of at most `max_units` units.
    ///
    /// Empty or whitespace-only input yields no fragments. The only fragments
    /// allowed past the limit are never produced: an unsplittable token is
    /// hard-cut so that the cut piece, including any appended period, fits.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            return Vec::new();
        }

        let protected = ABBREVIATION_REGEX.replace_all(&normalized, |caps: &regex::Captures| {
            caps[0].replace('.', &PERIOD_SENTINEL.to_string())
        });

        let mut fragments = Vec::new();
        for sentence in split_after(&protected, STRONG) {
            if self.units(&sentence) <= self.max_units {
                fragments.push(sentence);
            } else {
                fragments.extend(self.split_at(&sentence, Level::Medium));
            }
        }

        let fragments = self.merge_short(fragments);
        fragments.into_iter().map(|f| f.replace(PERIOD_SENTINEL, ".")).collect()
    }

    fn units(&self, text: &str) -> usize {
        self.unit.count(text)
    }

    fn split_at(&self, text: &str, level: Level) -> Vec<String> {
        if self.units(text) <= self.max_units {
            return vec![text.to_string()];
        }

        let (parts, next) = match level {
            Level::Medium => (split_after(text, MEDIUM), Some(Level::Weak)),
            Level::Weak => (split_after(text, WEAK), Some(Level::Whitespace)),
            Level::Whitespace => (
                text.split_whitespace().map(str::to_string).collect::<Vec<_>>(),
                None,
            ),
        };

        if parts.len() <= 1 {
            return match next {
                Some(next) => self.split_at(text, next),
                None => self.hard_cut(text),
            };
        }

        let mut pieces = Vec::new();
        for part in parts {
            match next {
                Some(next) => pieces.extend(self.split_at(&part, next)),
                None if self.units(&part) > self.max_units => pieces.extend(self.hard_cut(&part)),
                None => pieces.push(part),
            }
        }
        self.pack(pieces)
    }

    // @merges: Adjacent pieces greedily while they stay within the limit.
    // A piece that already ends a sentence is never extended, or the joined
    // fragment would split again when re-segmented.
    fn pack(&self, pieces: Vec<String>) -> Vec<String> {
        let mut packed: Vec<String> = Vec::new();
        for piece in pieces {
            if let Some(last) = packed.last_mut().filter(|last| !ends_sentence(last)) {
                let candidate = format!("{} {}", last, piece);
                if self.units(&candidate) <= self.max_units {
                    *last = candidate;
                    continue;
                }
            }
            packed.push(piece);
        }
        packed
    }

    /// Cut a token that has no split points left. In character mode each
    /// piece leaves room for the appended period.
    fn hard_cut(&self, token: &str) -> Vec<String> {
        let chars: Vec<char> = token.chars().collect();
        let append = self.unit == UnitKind::Words || self.max_units > 1;
        let width = match self.unit {
            UnitKind::Chars if append => self.max_units - 1,
            _ => self.max_units,
        };

        let words: Vec<&str> = token.split_whitespace().collect();
        let raw: Vec<String> = match self.unit {
            UnitKind::Words => words.chunks(width).map(|c| c.join(" ")).collect(),
            UnitKind::Chars => chars
                .chunks(width)
                .map(|c| c.iter().collect::<String>().trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        };

        raw.into_iter()
            .map(|mut piece| {
                if append && !ends_with_punctuation(&piece) {
                    piece.push('.');
                }
                piece
            })
            .collect()
    }

    /// Merge fragments shorter than `min_units` into the previous fragment,
    /// or forward when the first fragment is still short
    fn merge_short(&self, fragments: Vec<String>) -> Vec<String> {
        let mut merged: Vec<String> = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            if self.units(&fragment) < self.min_units {
                if let Some(prev) = merged.last_mut() {
                    let candidate = format!("{} {}", prev, fragment);
                    if self.units(&candidate) <= self.max_units {
                        *prev = candidate;
                        continue;
                    }
                }
            }
            merged.push(fragment);
        }

        if merged.len() > 1 && self.units(&merged[0]) < self.min_units {
            let candidate = format!("{} {}", merged[0], merged[1]);
            if self.units(&candidate) <= self.max_units {
                merged[1] = candidate;
                merged.remove(0);
            }
        }
        merged
    }
}

fn ends_with_punctuation(text: &str) -> bool {
    text.chars()
        .last()
        .map(|c| STRONG.contains(&c) || MEDIUM.contains(&c) || WEAK.contains(&c) || CLOSING.contains(&c))
        .unwrap_or(false)
}

/// True when `text` ends with a strong terminator, optionally followed by
/// closing quotes or brackets
fn ends_sentence(text: &str) -> bool {
    text.trim_end_matches(CLOSING)
        .chars()
        .last()
        .is_some_and(|c| STRONG.contains(&c))
}

/// Split after each run of `terminators`, keeping the terminators and any
/// closing quotes with the preceding piece. ASCII terminators only split when
/// followed by whitespace or the end of the text, so "3.5" and "1,000" stay
/// whole.
fn split_after(text: &str, terminators: &[char]) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        current.push(c);
        i += 1;

        if !terminators.contains(&c) {
            continue;
        }
        while i < chars.len() && (terminators.contains(&chars[i]) || CLOSING.contains(&chars[i])) {
            current.push(chars[i]);
            i += 1;
        }
        let at_boundary = i >= chars.len() || chars[i].is_whitespace() || !c.is_ascii();
        if at_boundary {
            let piece = current.trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}
