/*!
 * Common test utilities for the storyreel test suite
 */

use anyhow::Result;
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use storyreel::app_config::Config;

/// Sample rate used for every generated narration file
pub const TEST_SAMPLE_RATE: u32 = 16000;

/// Routes library log output through the test harness
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Writes a mono 16-bit sine tone of the given length
pub fn write_test_wav(path: &Path, seconds: f64) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let frames = (seconds * TEST_SAMPLE_RATE as f64).round() as usize;
    for i in 0..frames {
        let t = i as f64 / TEST_SAMPLE_RATE as f64;
        let sample = (t * 440.0 * std::f64::consts::TAU).sin() * 0.3;
        writer.write_sample((sample * i16::MAX as f64) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Writes a small solid-colour page image
pub fn write_test_image(path: &Path, width: u32, height: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let image = RgbImage::from_pixel(width, height, Rgb([200, 120, 40]));
    image.save(path)?;
    Ok(())
}

/// Lays out a story directory with `pages` images and the given script.
/// Speech files are written separately by each test.
pub fn make_story(dir: &Path, script_json: &str, pages: usize) -> Result<()> {
    for page in 1..=pages {
        write_test_image(&dir.join("image").join(format!("p{}.png", page)), 40, 30)?;
    }
    create_test_file(dir, "script_data.json", script_json)?;
    fs::create_dir_all(dir.join("speech"))?;
    Ok(())
}

/// Small, fast, reproducible configuration for tests
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.video.width = 64;
    config.video.height = 36;
    config.video.fps = 4;
    config.video.audio_sample_rate = TEST_SAMPLE_RATE;
    config.seed = Some(7);
    config
}

/// Whether an ffmpeg binary is reachable on PATH
pub fn ffmpeg_available() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Writes a stand-in encoder script. It records every argument line in
/// `encoder_calls.log`, drains stdin, exits non-zero when the arguments
/// contain any of `fail_on`, and otherwise writes its last argument as the
/// output file.
#[cfg(unix)]
pub fn write_fake_encoder(dir: &Path, fail_on: &[&str]) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let log = dir.join("encoder_calls.log");
    let mut script = format!(
        "#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{}'\nfor arg in \"$@\"; do out=\"$arg\"; done\ncat > /dev/null\n",
        log.display()
    );
    if !fail_on.is_empty() {
        let patterns: Vec<String> = fail_on.iter().map(|p| format!("*'{}'*", p)).collect();
        script.push_str(&format!(
            "case \"$*\" in\n  {}) echo \"simulated encoder failure\" >&2; exit 1 ;;\nesac\n",
            patterns.join("|")
        ));
    }
    script.push_str("printf 'fake media' > \"$out\"\n");

    let path = dir.join("fake-ffmpeg");
    fs::write(&path, script)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// Argument lines recorded by the stand-in encoder
pub fn encoder_calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("encoder_calls.log"))
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Per-job render directories still present in `dir`
pub fn leftover_render_dirs(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_dir() && p.file_name().is_some_and(|n| n.to_string_lossy().starts_with(".render_")))
                .collect()
        })
        .unwrap_or_default()
}
