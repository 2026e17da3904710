/*!
 * Validation and composition of whole story directories.
 * Nothing in here starts an encoder process.
 */

use anyhow::Result;
use storyreel::captions::CaptionMode;
use storyreel::errors::{ComposeError, PipelineStage};
use storyreel::timeline::SlideSide;
use storyreel::Controller;
use crate::common;

const TWO_SENTENCES: &str = r#"{"segmented_pages": [["The first sentence.", "The second sentence."]]}"#;

/// Two narrated sentences of 3s and 4s with 0.4s padding and transition
#[test]
fn test_compose_story_withTwoSegments_shouldAlignCaptionsToNarration() -> Result<()> {
    common::init_test_logger();
    let temp_dir = common::create_temp_dir()?;
    let story = temp_dir.path();
    common::make_story(story, TWO_SENTENCES, 1)?;
    common::write_test_wav(&story.join("speech").join("s1_1.wav"), 3.0)?;
    common::write_test_wav(&story.join("speech").join("s1_2.wav"), 4.0)?;

    let controller = Controller::with_config(common::test_config())?;
    let composed = controller.compose_story(story)?;

    assert_eq!(composed.mode, CaptionMode::PerSegment);
    assert!((composed.timeline.duration() - 8.2).abs() < 1e-6);

    let cues = &composed.cues.cues;
    assert_eq!(cues.len(), 2);
    assert_eq!((cues[0].start_ms, cues[0].end_ms), (400, 3400));
    assert_eq!((cues[1].start_ms, cues[1].end_ms), (3800, 7800));
    assert_eq!(cues[0].text, "The first sentence.");
    assert_eq!(cues[1].text, "The second sentence.");

    // The first clip always leaves to the left; the second enters from the right
    let clips = composed.timeline.clips();
    assert_eq!(clips[0].slide_out, Some(SlideSide::Left));
    assert_eq!(clips[1].slide_in, Some(SlideSide::Right));
    Ok(())
}

/// A missing global speech file fails validation before any rendering
#[test]
fn test_run_withMissingGlobalSpeech_shouldFailAtValidation() -> Result<()> {
    common::init_test_logger();
    let temp_dir = common::create_temp_dir()?;
    let story = temp_dir.path();
    common::make_story(
        story,
        r#"{"segmented_pages": [["One is here.", "Two is here.", "Three is gone.", "Four is here.", "Five is here."]]}"#,
        1,
    )?;
    for i in [1, 2, 4, 5] {
        common::write_test_wav(&story.join("speech").join(format!("s{}.wav", i)), 0.5)?;
    }

    let mut config = common::test_config();
    // Would fail loudly if anything reached the encoder
    config.encoder.ffmpeg_bin = "/nonexistent/bin/ffmpeg".to_string();
    let controller = Controller::with_config(config)?;

    let error = tokio_test::block_on(controller.run(story, None)).expect_err("run should fail");
    assert_eq!(error.stage, PipelineStage::Validation);
    match &error.source {
        ComposeError::AssetMissing { path } => assert!(path.ends_with("s3.wav"), "{:?}", path),
        other => panic!("expected AssetMissing, got {:?}", other),
    }
    assert!(!error.is_retryable());
    assert!(!story.join("output.mp4").exists());
    assert!(!story.join("output.srt").exists());
    Ok(())
}

/// Fewer per-page audio files than segments is a count mismatch
#[test]
fn test_validate_story_withTooFewPerPageFiles_shouldReportMismatch() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let story = temp_dir.path();
    common::make_story(story, TWO_SENTENCES, 1)?;
    common::write_test_wav(&story.join("speech").join("s1_1.wav"), 1.0)?;

    let controller = Controller::with_config(common::test_config())?;
    let error = controller.validate_story(story).expect_err("validation should fail");
    assert_eq!(error.stage, PipelineStage::Validation);
    assert!(matches!(
        error.source,
        ComposeError::DurationMismatch { page: 1, expected: 2, found: 1 }
    ));
    Ok(())
}

/// Script pages and page images must agree
#[test]
fn test_validate_story_withExtraImage_shouldReportScriptError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let story = temp_dir.path();
    common::make_story(story, TWO_SENTENCES, 2)?;

    let controller = Controller::with_config(common::test_config())?;
    let error = controller.validate_story(story).expect_err("validation should fail");
    assert!(matches!(error.source, ComposeError::Script(_)));
    Ok(())
}

/// Unsegmented pages are split with the speech segmenter
#[test]
fn test_validate_story_withPlainPages_shouldSegmentText() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let story = temp_dir.path();
    common::make_story(
        story,
        r#"{"pages": ["The fox ran into the woods. It was never seen again.", "The end of our tale."]}"#,
        2,
    )?;
    for i in 1..=3 {
        common::write_test_wav(&story.join("speech").join(format!("s{}.wav", i)), 0.5)?;
    }

    let controller = Controller::with_config(common::test_config())?;
    let plan = controller.validate_story(story)?;
    assert_eq!(plan.segment_count(), 3);
    assert_eq!(plan.segments[0][1].text, "It was never seen again.");
    assert!(plan.segments[1][0].audio.as_ref().is_some_and(|p| p.ends_with("s3.wav")));
    Ok(())
}

/// Page narration produces page captions split over each page window
#[test]
fn test_compose_story_withPageNarration_shouldSplitPageCaptions() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let story = temp_dir.path();
    common::make_story(
        story,
        r#"{"pages": ["A bird sang loudly. The wind blew hard.", "Rain fell on the roof."]}"#,
        2,
    )?;
    common::write_test_wav(&story.join("speech").join("p1.wav"), 2.0)?;
    common::write_test_wav(&story.join("speech").join("p2.wav"), 1.5)?;

    let controller = Controller::with_config(common::test_config())?;
    let composed = controller.compose_story(story)?;
    assert_eq!(composed.mode, CaptionMode::PageLevel);

    let cues = &composed.cues.cues;
    assert_eq!(cues.len(), 3);
    assert_eq!(cues[0].start_ms, 400);
    assert_eq!(cues[1].end_ms, 2400);
    assert_eq!(cues[1].start_ms - cues[0].end_ms, 300);
    assert_eq!((cues[2].start_ms, cues[2].end_ms), (2800, 4300));
    assert_eq!(cues[2].text, "Rain fell on the roof.");
    Ok(())
}

/// Seeded runs choose the same transitions and effects
#[test]
fn test_compose_story_withSeed_shouldBeDeterministic() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let story = temp_dir.path();
    common::make_story(
        story,
        r#"{"segmented_pages": [["One.", "Two.", "Three."], ["Four.", "Five."]]}"#,
        2,
    )?;
    for i in 1..=5 {
        common::write_test_wav(&story.join("speech").join(format!("s{}.wav", i)), 0.3)?;
    }

    let controller = Controller::with_config(common::test_config())?;
    let first = controller.compose_story(story)?;
    let second = controller.compose_story(story)?;

    let sides = |c: &storyreel::ComposedStory| -> Vec<_> {
        c.timeline.clips().iter().map(|p| (p.slide_out, p.clip.effect)).collect()
    };
    assert_eq!(sides(&first), sides(&second));
    assert_eq!(first.cues, second.cues);
    Ok(())
}

/// Music is checked with the rest of the story, before any rendering
#[test]
fn test_compose_story_withMusic_shouldKeepOnlyAllowedTracks() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let story = temp_dir.path();
    common::make_story(story, TWO_SENTENCES, 1)?;
    common::write_test_wav(&story.join("speech").join("s1_1.wav"), 0.5)?;
    common::write_test_wav(&story.join("speech").join("s1_2.wav"), 0.5)?;

    let mut config = common::test_config();
    config.music.path = Some(common::create_test_file(story, "theme.ogg", "not really audio")?);
    let skipped = Controller::with_config(config.clone())?.validate_story(story)?;
    assert!(skipped.music.is_none());

    let track = story.join("theme.wav");
    common::write_test_wav(&track, 0.5)?;
    config.music.path = Some(track.clone());
    let composed = Controller::with_config(config)?.compose_story(story)?;
    assert_eq!(composed.music, Some(track));
    Ok(())
}

/// More global narration files than segments is a count mismatch
#[test]
fn test_validate_story_withLeftoverGlobalSpeech_shouldReportMismatch() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let story = temp_dir.path();
    common::make_story(story, TWO_SENTENCES, 1)?;
    for i in 1..=3 {
        common::write_test_wav(&story.join("speech").join(format!("s{}.wav", i)), 0.5)?;
    }

    let controller = Controller::with_config(common::test_config())?;
    let error = controller.validate_story(story).expect_err("validation should fail");
    assert_eq!(error.stage, PipelineStage::Validation);
    assert!(matches!(
        error.source,
        ComposeError::DurationMismatch { page: 1, expected: 2, found: 3 }
    ));
    Ok(())
}
