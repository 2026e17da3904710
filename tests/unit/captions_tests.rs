/*!
 * Tests for caption cues, SRT/ASS output and synchronization
 */

use anyhow::Result;
use storyreel::app_config::Config;
use storyreel::captions::ass;
use storyreel::captions::{CaptionCue, CaptionMode, CaptionSynchronizer, CueList};
use storyreel::segmenter::Segmenter;
use storyreel::timeline::Timestamp;
use crate::common;

fn sample_cues() -> CueList {
    CueList::new(vec![
        CaptionCue::from_seconds(0.4, 3.4, "The first sentence."),
        CaptionCue::from_seconds(3.8, 7.8, "The second sentence."),
    ])
}

/// Written SRT files read back to the same cues
#[test]
fn test_write_srt_withTwoCues_shouldParseBackIdentically() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("story.srt");

    let cues = sample_cues();
    cues.write_srt(&path)?;

    let content = std::fs::read_to_string(&path)?;
    assert!(content.starts_with("1\n00:00:00,400 --> 00:00:03,400\nThe first sentence.\n"));

    let parsed = CueList::parse_srt_file(&path)?;
    assert_eq!(parsed, cues);
    Ok(())
}

/// Timestamps round-trip through the SRT text form
#[test]
fn test_format_timestamp_withLargeValue_shouldParseBack() -> Result<()> {
    let ms = 3_723_045;
    let text = CaptionCue::format_timestamp(ms);
    assert_eq!(text, "01:02:03,045");
    assert_eq!(CaptionCue::parse_timestamp(&text)?, ms);
    Ok(())
}

/// Content without cues is rejected
#[test]
fn test_parse_srt_string_withNoCues_shouldFail() {
    assert!(CueList::parse_srt_string("just some text\n").is_err());
}

/// Cleaning drops slivers, joins duplicates and widens empty ranges
#[test]
fn test_normalized_withMessyCues_shouldCleanList() {
    let cues = CueList::new(vec![
        CaptionCue { start_ms: 2000, end_ms: 2030, text: "Too short".to_string() },
        CaptionCue { start_ms: 0, end_ms: 1000, text: "Hello".to_string() },
        CaptionCue { start_ms: 1020, end_ms: 1500, text: "Hello".to_string() },
        CaptionCue { start_ms: 3000, end_ms: 4000, text: "   ".to_string() },
        CaptionCue { start_ms: 5000, end_ms: 5000, text: "Instant".to_string() },
    ]);

    let cleaned = cues.normalized();
    assert_eq!(cleaned.cues, vec![CaptionCue { start_ms: 0, end_ms: 1500, text: "Hello".to_string() }]);
}

/// Active cue lookup honours the half-open interval
#[test]
fn test_active_at_withCueBoundaries_shouldBeHalfOpen() {
    let cues = sample_cues();
    assert!(cues.active_at(0.39).is_none());
    assert_eq!(cues.active_at(0.4).map(|c| c.text.as_str()), Some("The first sentence."));
    assert!(cues.active_at(3.5).is_none());
    assert_eq!(cues.active_at(7.79).map(|c| c.text.as_str()), Some("The second sentence."));
    assert!(cues.active_at(7.8).is_none());
}

/// Each segment becomes exactly one cue at its realized timestamp
#[test]
fn test_synchronize_withPerSegmentMode_shouldUseTimestampsVerbatim() {
    let synchronizer = CaptionSynchronizer::new(Segmenter::for_captions(40, 8), 0.3);
    let stamps = vec![Timestamp { start: 0.4, end: 3.4 }, Timestamp { start: 3.8, end: 7.8 }];
    let texts = vec!["The first sentence.".to_string(), "The second sentence.".to_string()];

    let cues = synchronizer.synchronize(&stamps, &texts, CaptionMode::PerSegment);
    assert_eq!(cues, sample_cues());
}

/// A page caption longer than a line is spread over its window
#[test]
fn test_synchronize_withPageLevelMode_shouldSplitWindow() {
    let synchronizer = CaptionSynchronizer::new(Segmenter::for_captions(20, 1), 0.5);
    let stamps = vec![Timestamp { start: 0.0, end: 6.0 }];
    let texts = vec!["A bird sang loudly. The wind blew hard. Rain fell.".to_string()];

    let cues = synchronizer.synchronize(&stamps, &texts, CaptionMode::PageLevel);
    assert_eq!(cues.len(), 3);
    assert_eq!(cues.cues[0].start_ms, 0);
    assert_eq!(cues.cues[2].end_ms, 6000);
    for pair in cues.cues.windows(2) {
        assert_eq!(pair[1].start_ms - pair[0].end_ms, 500);
    }
}

/// When lines would be shorter than the gap, the gap is dropped
#[test]
fn test_synchronize_withTinyWindow_shouldDropGap() {
    let synchronizer = CaptionSynchronizer::new(Segmenter::for_captions(10, 1), 1.0);
    let stamps = vec![Timestamp { start: 0.0, end: 1.0 }];
    let texts = vec!["One line. Two line.".to_string()];

    let cues = synchronizer.synchronize(&stamps, &texts, CaptionMode::PageLevel);
    assert_eq!(cues.len(), 2);
    assert_eq!(cues.cues[0].end_ms, cues.cues[1].start_ms);
    assert_eq!(cues.cues[1].end_ms, 1000);
}

/// ASS output carries a style line and one dialogue per cue
#[test]
fn test_render_ass_withDefaultConfig_shouldWriteDialogueLines() {
    let config = Config::default();
    let doc = ass::render_ass(&sample_cues(), &config, "DejaVuSans");

    assert!(doc.contains("[V4+ Styles]"));
    assert!(doc.contains("Style: Default,DejaVuSans,25,&H00FFFFFF"));
    assert!(doc.contains("Dialogue: 0,0:00:00.40,0:00:03.40,Default,,0000,0000,0000,,The first sentence."));
    assert_eq!(doc.matches("Dialogue:").count(), 2);
}

/// Colours convert to ASS blue-green-red order
#[test]
fn test_to_ass_color_withHexColor_shouldSwapChannels() {
    assert_eq!(ass::to_ass_color("#112233", "&H00FFFFFF"), "&H00332211");
    assert_eq!(ass::to_ass_color("not a colour", "&H00FFFFFF"), "&H00FFFFFF");
}
