/*!
 * Tests for text segmentation
 */

use storyreel::segmenter::{Segmenter, UnitKind};

const LONG_TEXT: &str = "Once upon a time, in a village at the edge of a dark forest, there lived a \
    girl who loved to wander; she knew every path and every stream. One morning she found a \
    fox sleeping under an old oak tree, and she decided to follow it when it woke. The fox \
    led her deeper than she had ever gone before!";

/// Every fragment stays within the word limit
#[test]
fn test_segment_withLongText_shouldRespectWordLimit() {
    for max in [4, 8, 12, 20] {
        let segmenter = Segmenter::for_speech(max, 1);
        let fragments = segmenter.segment(LONG_TEXT);
        assert!(!fragments.is_empty());
        for fragment in &fragments {
            assert!(
                UnitKind::Words.count(fragment) <= max,
                "fragment over {} words: {}",
                max,
                fragment
            );
        }
    }
}

/// Every fragment stays within the character limit
#[test]
fn test_segment_withCharUnits_shouldRespectCharLimit() {
    let segmenter = Segmenter::for_captions(25, 4);
    for fragment in segmenter.segment(LONG_TEXT) {
        assert!(fragment.chars().count() <= 25, "fragment too long: {}", fragment);
    }
}

/// Splitting never drops, reorders or rewrites text when no token is hard-cut
#[test]
fn test_segment_withOrdinaryWords_shouldPreserveTextInOrder() {
    let segmenter = Segmenter::for_speech(6, 2);
    let fragments = segmenter.segment(LONG_TEXT);
    let normalized = LONG_TEXT.split_whitespace().collect::<Vec<_>>().join(" ");
    assert_eq!(fragments.join(" "), normalized);
}

/// Short sentences under the limit are kept as separate fragments
#[test]
fn test_segment_withShortSentences_shouldSplitOnSentenceEnds() {
    let segmenter = Segmenter::for_speech(20, 2);
    let fragments = segmenter.segment("The cat sat down. The dog ran off! Where did it go?");
    assert_eq!(
        fragments,
        vec!["The cat sat down.", "The dog ran off!", "Where did it go?"]
    );
}

/// Titles such as "Mr." do not end a sentence
#[test]
fn test_segment_withAbbreviations_shouldKeepSentenceWhole() {
    let segmenter = Segmenter::for_speech(20, 1);
    let fragments = segmenter.segment("Mr. Brown met Prof. Green at 9 a.m. on Main St. today. They talked.");
    assert_eq!(
        fragments,
        vec!["Mr. Brown met Prof. Green at 9 a.m. on Main St. today.", "They talked."]
    );
}

/// Closing quotes stay with their sentence
#[test]
fn test_segment_withQuotedSpeech_shouldKeepClosingQuote() {
    let segmenter = Segmenter::for_speech(20, 1);
    let fragments = segmenter.segment("She said \"Run!\" Then she ran.");
    assert_eq!(fragments, vec!["She said \"Run!\"", "Then she ran."]);
}

/// A word longer than the caption limit is cut and each piece ends with a period
#[test]
fn test_segment_withUnbreakableToken_shouldHardCut() {
    let segmenter = Segmenter::for_captions(5, 1);
    let fragments = segmenter.segment("supercalifragilistic");
    assert!(fragments.len() >= 4);
    for fragment in &fragments {
        assert!(fragment.chars().count() <= 5, "{}", fragment);
        assert!(fragment.ends_with('.'));
    }
}

/// Parsing unit names accepts the common spellings
#[test]
fn test_unit_kind_fromStr_shouldAcceptAliases() {
    assert_eq!("words".parse::<UnitKind>(), Ok(UnitKind::Words));
    assert_eq!("Chars".parse::<UnitKind>(), Ok(UnitKind::Chars));
    assert_eq!("characters".parse::<UnitKind>(), Ok(UnitKind::Chars));
    assert!("lines".parse::<UnitKind>().is_err());
}

/// A zero limit is clamped to one unit
#[test]
fn test_segmenter_new_withZeroLimit_shouldClampToOne() {
    let segmenter = Segmenter::new(0, 5, UnitKind::Words);
    assert_eq!(segmenter.max_units(), 1);
    assert_eq!(segmenter.segment("a b c"), vec!["a", "b", "c"]);
}

/// Re-segmenting any produced fragment with the same limits gives it back unchanged
#[test]
fn test_segment_withOwnOutput_shouldBeIdempotent() {
    let texts = [
        LONG_TEXT,
        "abcdefg x",
        "Dr. Smith visited the U.S. in 1999; it was supercalifragilisticexpialidocious, truly! \"Wow,\" he said.",
        "Long words like antidisestablishmentarianism appear, then us. word and 3.5 percent.",
        "你好世界。再见朋友。今天天气很好，我们去公园散步吧！",
    ];

    let mut failures = Vec::new();
    for text in texts {
        for unit in [UnitKind::Words, UnitKind::Chars] {
            for max in 1..=30 {
                for min in 0..=6 {
                    let segmenter = Segmenter::new(max, min, unit);
                    for fragment in segmenter.segment(text) {
                        let again = segmenter.segment(&fragment);
                        if again != vec![fragment.clone()] {
                            failures.push(format!("{:?} max={} min={}: {:?} -> {:?}", unit, max, min, fragment, again));
                        }
                    }
                }
            }
        }
    }
    assert!(failures.is_empty(), "{} fragments changed:\n{}", failures.len(), failures.join("\n"));
}

/// A hard-cut piece ends its fragment; the following word starts a new one
#[test]
fn test_segment_withHardCutBeforeWord_shouldNotGlueWordToCut() {
    let segmenter = Segmenter::for_captions(9, 1);
    let fragments = segmenter.segment("abcdefghus word");
    assert_eq!(fragments, vec!["abcdefgh.", "us.", "word"]);
}
