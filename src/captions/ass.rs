use std::fmt::Write as _;
use std::path::Path;

use crate::app_config::Config;
use crate::captions::cue::CueList;
use crate::captions::glyph::{parse_color, wrap_text};
use crate::errors::ComposeError;

// @module: Styled ASS subtitle export

/// Convert a colour to ASS `&H00BBGGRR` form; `&H` values pass through
pub fn to_ass_color(value: &str, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() > 2 && trimmed[..2].eq_ignore_ascii_case("&h") {
        return trimmed.to_uppercase();
    }
    match parse_color(trimmed) {
        Some([r, g, b, _]) => format!("&H00{:02X}{:02X}{:02X}", b, g, r),
        None => default.to_string(),
    }
}

/// ASS timestamp `H:MM:SS.cc`
pub fn format_ass_time(ms: u64) -> String {
    let centis = (ms + 5) / 10;
    let hours = centis / 360_000;
    let minutes = (centis % 360_000) / 6_000;
    let seconds = (centis % 6_000) / 100;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, centis % 100)
}

/// Render a complete ASS document for the cue list
pub fn render_ass(cues: &CueList, config: &Config, font_name: &str) -> String {
    let caption = &config.caption;
    let video = &config.video;
    let font_size = caption.effective_font_size(video.width, video.height);
    let primary = to_ass_color(&caption.color, "&H00FFFFFF");
    let outline = to_ass_color(&caption.stroke_color, "&H00000000");

    let mut doc = String::new();
    let _ = writeln!(doc, "[Script Info]");
    let _ = writeln!(doc, "ScriptType: v4.00+");
    let _ = writeln!(doc, "PlayResX: {}", video.width);
    let _ = writeln!(doc, "PlayResY: {}", config.frame_height());
    let _ = writeln!(doc, "WrapStyle: 2");
    let _ = writeln!(doc, "ScaledBorderAndShadow: yes");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "[V4+ Styles]");
    let _ = writeln!(
        doc,
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding"
    );
    let _ = writeln!(
        doc,
        "Style: Default,{},{},{},&H000000FF,{},&H64000000,0,0,0,0,100,100,0,0,1,{:.2},0.00,{},{},{},{},1",
        font_name, font_size, primary, outline, caption.stroke_width as f64, caption.alignment,
        caption.margin_h, caption.margin_h, caption.margin_v
    );
    let _ = writeln!(doc);
    let _ = writeln!(doc, "[Events]");
    let _ = writeln!(doc, "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text");
    for cue in &cues.cues {
        let text = wrap_text(&cue.text, caption.max_chars_per_line).join("\\N");
        let _ = writeln!(
            doc,
            "Dialogue: 0,{},{},Default,,0000,0000,0000,,{}",
            format_ass_time(cue.start_ms),
            format_ass_time(cue.end_ms),
            text
        );
    }
    doc
}

/// Write the ASS document next to the other outputs
pub fn write_ass<P: AsRef<Path>>(path: P, cues: &CueList, config: &Config, font_name: &str) -> Result<(), ComposeError> {
    std::fs::write(path, render_ass(cues, config, font_name))?;
    Ok(())
}
