/*!
 * Caption timing, subtitle files and overlay glyphs.
 */

pub mod ass;
pub mod cue;
pub mod glyph;
pub mod sync;

pub use cue::{CaptionCue, CueList};
pub use glyph::{GlyphRenderer, GlyphStyle};
pub use sync::{CaptionMode, CaptionSynchronizer};
