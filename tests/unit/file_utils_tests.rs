/*!
 * Tests for file and story-directory utilities
 */

use anyhow::Result;
use storyreel::errors::ComposeError;
use storyreel::file_utils::{FileManager, SpeechFiles, StoryScript};
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "exists.txt", "content")?;
    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::file_exists(temp_dir.path().join("missing.txt")));
    Ok(())
}

/// Page images are returned in numeric, not lexical, order
#[test]
fn test_find_page_images_withMixedNames_shouldSortNumerically() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let image_dir = temp_dir.path().join("image");
    for name in ["p10.png", "p2.jpg", "p1.png", "cover.png"] {
        common::write_test_image(&image_dir.join(name), 4, 4)?;
    }

    let images = FileManager::find_page_images(temp_dir.path())?;
    let names: Vec<String> = images
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["p1.png", "p2.jpg", "p10.png"]);
    Ok(())
}

/// A story without an image directory reports the missing directory
#[test]
fn test_find_page_images_withoutImageDir_shouldReportAssetMissing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    match FileManager::find_page_images(temp_dir.path()) {
        Err(ComposeError::AssetMissing { path }) => assert!(path.ends_with("image")),
        other => panic!("expected AssetMissing, got {:?}", other),
    }
    Ok(())
}

/// Global speech files are consumed in order across pages
#[test]
fn test_paths_for_page_withGlobalNames_shouldAdvanceCursor() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let speech = temp_dir.path().join("speech");
    for i in 1..=5 {
        common::write_test_wav(&speech.join(format!("s{}.wav", i)), 0.1)?;
    }

    let files = SpeechFiles::discover(temp_dir.path())?;
    let mut cursor = 0;
    let first = files.paths_for_page(1, 2, &mut cursor);
    let second = files.paths_for_page(2, 3, &mut cursor);

    assert_eq!(cursor, 5);
    assert!(first[0].ends_with("s1.wav") && first[1].ends_with("s2.wav"));
    assert!(second[2].ends_with("s5.wav"));
    assert!(files.check_unused_global(cursor, 2).is_ok());
    Ok(())
}

/// Global files left over after every page took its share are a mismatch
#[test]
fn test_check_unused_global_withLeftoverFiles_shouldReportMismatch() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let speech = temp_dir.path().join("speech");
    for i in 1..=4 {
        common::write_test_wav(&speech.join(format!("s{}.wav", i)), 0.1)?;
    }

    let files = SpeechFiles::discover(temp_dir.path())?;
    let mut cursor = 0;
    files.paths_for_page(1, 2, &mut cursor);

    match files.check_unused_global(cursor, 1) {
        Err(ComposeError::DurationMismatch { page, expected, found }) => {
            assert_eq!((page, expected, found), (1, 2, 4));
        }
        other => panic!("expected DurationMismatch, got {:?}", other),
    }
    Ok(())
}

/// A missing global index is returned as its expected path
#[test]
fn test_paths_for_page_withGap_shouldReturnExpectedPath() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let speech = temp_dir.path().join("speech");
    for i in [1, 2, 4] {
        common::write_test_wav(&speech.join(format!("s{}.wav", i)), 0.1)?;
    }

    let files = SpeechFiles::discover(temp_dir.path())?;
    let mut cursor = 0;
    let paths = files.paths_for_page(1, 4, &mut cursor);
    assert_eq!(paths[2], speech.join("s3.wav"));
    assert!(!paths[2].exists());
    Ok(())
}

/// Page-level narration is recognised only when no segment files exist
#[test]
fn test_discover_withPageNarration_shouldBePageLevel() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let speech = temp_dir.path().join("speech");
    common::write_test_wav(&speech.join("p1.wav"), 0.1)?;
    common::write_test_wav(&speech.join("p2.wav"), 0.1)?;

    let files = SpeechFiles::discover(temp_dir.path())?;
    assert!(files.is_page_level());
    assert_eq!(files.page_level_path(2), speech.join("p2.wav"));

    common::write_test_wav(&speech.join("s1_1.wav"), 0.1)?;
    assert!(!SpeechFiles::discover(temp_dir.path())?.is_page_level());
    Ok(())
}

/// Plain string pages are accepted
#[test]
fn test_story_script_parse_withStringPages_shouldHaveNoSegments() -> Result<()> {
    let script = StoryScript::parse(r#"{"pages": ["Page one.", "Page two."]}"#)?;
    assert_eq!(script.pages.len(), 2);
    assert_eq!(script.pages[1].text, "Page two.");
    assert!(script.pages.iter().all(|p| p.segments.is_none()));
    Ok(())
}

/// A script without pages is a script error
#[test]
fn test_story_script_parse_withoutPages_shouldFail() {
    assert!(matches!(StoryScript::parse(r#"{"title": "x"}"#), Err(ComposeError::Script(_))));
    assert!(matches!(StoryScript::parse("not json"), Err(ComposeError::Script(_))));
}
