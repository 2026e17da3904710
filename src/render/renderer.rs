/*!
 * Muxer/Renderer.
 *
 * Drives ffmpeg through the render pipeline:
 * `Idle → WritingAudio → WritingVideo → Muxing → MixingMusic → Done | Failed`.
 * Each step has one simpler fallback. Intermediate files live in a per-job
 * temporary directory next to the output, removed on every exit path, and
 * the output file only appears once all mandatory steps have succeeded.
 */

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::app_config::Config;
use crate::errors::{ComposeError, EncodeError};
use crate::render::ffmpeg::FfmpegRunner;
use crate::render::frames::FrameRasterizer;
use crate::timeline::Timeline;

// @const: Bytes of raw audio per stdin write
const AUDIO_CHUNK_BYTES: usize = 1 << 20;
// @const: Raw frames buffered between the rasteriser and the encoder
const FRAME_QUEUE: usize = 8;

/// Progress of a render through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    WritingAudio,
    WritingVideo,
    Muxing,
    MixingMusic,
    Done,
    Failed,
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::WritingAudio => "writing audio",
            Self::WritingVideo => "writing video",
            Self::Muxing => "muxing",
            Self::MixingMusic => "mixing music",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Process-scoped description of one render
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub story_dir: PathBuf,
    pub output: PathBuf,
    pub config: Config,
}

impl RenderJob {
    /// Job writing `output.mp4` inside the story directory
    pub fn new<P: AsRef<Path>>(story_dir: P, config: Config) -> Self {
        let story_dir = story_dir.as_ref().to_path_buf();
        Self {
            output: story_dir.join("output.mp4"),
            story_dir,
            config,
        }
    }

    pub fn with_output<P: AsRef<Path>>(mut self, output: P) -> Self {
        self.output = output.as_ref().to_path_buf();
        self
    }

    /// Subtitle file written beside the video
    pub fn srt_path(&self) -> PathBuf {
        self.output.with_extension("srt")
    }

    pub fn ass_path(&self) -> PathBuf {
        self.output.with_extension("ass")
    }
}

/// Check background music against the extension allow-list
pub fn validate_music(path: &Path, allowed: &[String]) -> Result<PathBuf, ComposeError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !allowed.iter().any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&extension)) {
        return Err(ComposeError::UnsupportedMusic {
            path: path.to_path_buf(),
            extension,
        });
    }
    if !path.is_file() {
        return Err(ComposeError::AssetMissing { path: path.to_path_buf() });
    }
    Ok(path.to_path_buf())
}

/// Renders a composed timeline to the job's output file
pub struct Renderer {
    runner: FfmpegRunner,
    state: RenderState,
    show_progress: bool,
}

impl Renderer {
    pub fn new(config: &Config) -> Self {
        Self {
            runner: FfmpegRunner::new(
                &config.encoder.ffmpeg_bin,
                Duration::from_secs(config.encoder.step_timeout_secs),
            ),
            state: RenderState::Idle,
            show_progress: false,
        }
    }

    /// Show a frame progress bar on stderr
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    fn enter(&mut self, state: RenderState) {
        debug!("Render state: {} -> {}", self.state, state);
        self.state = state;
    }

    /// Run the whole pipeline and return the final output path
    pub async fn render(
        &mut self,
        timeline: Arc<Timeline>,
        overlay: FrameRasterizer,
        job: &RenderJob,
    ) -> Result<PathBuf, ComposeError> {
        match self.run_pipeline(timeline, overlay, job).await {
            Ok(path) => {
                self.enter(RenderState::Done);
                Ok(path)
            }
            Err(e) => {
                self.enter(RenderState::Failed);
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &mut self,
        timeline: Arc<Timeline>,
        overlay: FrameRasterizer,
        job: &RenderJob,
    ) -> Result<PathBuf, ComposeError> {
        let output_dir = job
            .output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&output_dir)?;
        let temp = tempfile::Builder::new().prefix(".render_").tempdir_in(&output_dir)?;
        debug!("Render temp dir: {:?}", temp.path());

        self.enter(RenderState::WritingAudio);
        let audio = self.write_audio(&timeline, job, &temp).await?;

        self.enter(RenderState::WritingVideo);
        let video = self.write_video(&overlay, job, &temp).await?;

        self.enter(RenderState::Muxing);
        let mut staged = self.mux(&video, &audio, job, &temp).await?;

        if let Some(music) = job.config.music.path.as_deref() {
            self.enter(RenderState::MixingMusic);
            match validate_music(music, &job.config.music.allowed_extensions) {
                Ok(music) => match self.mix_music(&staged, &music, job, &temp).await {
                    Ok(mixed) => staged = mixed,
                    Err(e) => warn!("Background music mix failed, keeping narration only: {}", e),
                },
                Err(e) => warn!("Skipping background music: {}", e),
            }
        }

        if let Err(e) = std::fs::rename(&staged, &job.output) {
            debug!("Rename into place failed ({}), copying instead", e);
            std::fs::copy(&staged, &job.output)?;
        }
        info!("Wrote {}", job.output.display());
        Ok(job.output.clone())
    }

    /// Mixed narration as 16-bit WAV; ffmpeg first, in-process writer second
    async fn write_audio(&self, timeline: &Timeline, job: &RenderJob, temp: &TempDir) -> Result<PathBuf, ComposeError> {
        let rate = job.config.video.audio_sample_rate;
        let mixed = timeline.mix_audio(rate);
        let path = temp.path().join("narration.wav");

        let args = vec![
            "-f".to_string(), "f32le".to_string(),
            "-ar".to_string(), rate.to_string(),
            "-ac".to_string(), "2".to_string(),
            "-i".to_string(), "pipe:0".to_string(),
            "-c:a".to_string(), "pcm_s16le".to_string(),
            path_arg(&path),
        ];
        let (tx, rx) = mpsc::channel(4);
        let bytes = mixed.to_f32le_bytes();
        let feeder = tokio::spawn(async move {
            for chunk in bytes.chunks(AUDIO_CHUNK_BYTES) {
                if tx.send(chunk.to_vec()).await.is_err() {
                    break;
                }
            }
        });
        let primary = self.runner.run_piped("audio write", &args, rx).await;
        let _ = feeder.await;

        match primary {
            Ok(()) => Ok(path),
            Err(e) => {
                warn!("Encoder audio write failed ({}), writing WAV in-process", e);
                mixed.write_wav(&path)?;
                Ok(path)
            }
        }
    }

    /// Rasterise every frame into the encoder; retry once with the fallback codec
    async fn write_video(&self, overlay: &FrameRasterizer, job: &RenderJob, temp: &TempDir) -> Result<PathBuf, ComposeError> {
        let encoder = &job.config.encoder;
        let path = temp.path().join("video.mp4");

        match self.encode_frames(overlay, job, &encoder.video_codec, &path).await {
            Ok(()) => Ok(path),
            Err(e) if encoder.fallback_video_codec != encoder.video_codec => {
                warn!("Video encode with {} failed ({}), retrying with {}", encoder.video_codec, e, encoder.fallback_video_codec);
                self.encode_frames(overlay, job, &encoder.fallback_video_codec, &path).await?;
                Ok(path)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn encode_frames(&self, overlay: &FrameRasterizer, job: &RenderJob, codec: &str, path: &Path) -> Result<(), EncodeError> {
        let fps = job.config.video.fps;
        let (width, height) = overlay.frame_size();
        let total = overlay.frame_count(fps);

        let mut args = vec![
            "-f".to_string(), "rawvideo".to_string(),
            "-pix_fmt".to_string(), "rgb24".to_string(),
            "-s".to_string(), format!("{}x{}", width, height),
            "-r".to_string(), fps.to_string(),
            "-i".to_string(), "pipe:0".to_string(),
            "-an".to_string(),
            "-c:v".to_string(), codec.to_string(),
        ];
        if codec == "libx264" {
            args.extend(["-preset".to_string(), job.config.encoder.preset.clone()]);
        }
        args.extend(["-pix_fmt".to_string(), "yuv420p".to_string(), path_arg(path)]);

        let progress = self.progress_bar(total);
        let (tx, rx) = mpsc::channel::<Vec<u8>>(FRAME_QUEUE);
        let raster = overlay.clone();
        let bar = progress.clone();
        let producer = tokio::task::spawn_blocking(move || {
            for i in 0..total {
                let frame = raster.render(i as f64 / fps as f64).into_raw();
                if tx.blocking_send(frame).is_err() {
                    break;
                }
                bar.inc(1);
            }
        });

        let result = self.runner.run_piped(&format!("video encode ({})", codec), &args, rx).await;
        let _ = producer.await;
        progress.finish_and_clear();
        result
    }

    /// Stream-copy mux, falling back to a full video re-encode
    async fn mux(&self, video: &Path, audio: &Path, job: &RenderJob, temp: &TempDir) -> Result<PathBuf, ComposeError> {
        let config = &job.config;
        let path = temp.path().join("muxed.mp4");
        let inputs = vec![
            "-i".to_string(), path_arg(video),
            "-i".to_string(), path_arg(audio),
            "-map".to_string(), "0:v:0".to_string(),
            "-map".to_string(), "1:a:0".to_string(),
        ];
        let audio_args = vec![
            "-c:a".to_string(), config.video.audio_codec.clone(),
            "-b:a".to_string(), config.video.audio_bitrate.clone(),
            "-shortest".to_string(),
            path_arg(&path),
        ];

        let mut copy = inputs.clone();
        copy.extend(["-c:v".to_string(), "copy".to_string()]);
        copy.extend(audio_args.iter().cloned());

        match self.runner.run("mux (stream copy)", &copy).await {
            Ok(()) => Ok(path),
            Err(e) => {
                warn!("Stream-copy mux failed ({}), re-encoding video", e);
                let mut reencode = inputs;
                reencode.extend([
                    "-c:v".to_string(), config.encoder.video_codec.clone(),
                    "-pix_fmt".to_string(), "yuv420p".to_string(),
                ]);
                reencode.extend(audio_args);
                self.runner.run("mux (re-encode)", &reencode).await?;
                Ok(path)
            }
        }
    }

    /// Loop music under the narration at the configured volume
    async fn mix_music(&self, staged: &Path, music: &Path, job: &RenderJob, temp: &TempDir) -> Result<PathBuf, EncodeError> {
        let config = &job.config;
        let path = temp.path().join("with_music.mp4");
        let filter = format!(
            "[1:a]volume={:.3}[a1];[0:a][a1]amix=inputs=2:duration=first:dropout_transition=2[aout]",
            config.music.volume
        );
        let args = vec![
            "-i".to_string(), path_arg(staged),
            "-stream_loop".to_string(), "-1".to_string(),
            "-i".to_string(), path_arg(music),
            "-filter_complex".to_string(), filter,
            "-map".to_string(), "0:v:0".to_string(),
            "-map".to_string(), "[aout]".to_string(),
            "-c:v".to_string(), "copy".to_string(),
            "-c:a".to_string(), config.video.audio_codec.clone(),
            "-b:a".to_string(), config.video.audio_bitrate.clone(),
            "-shortest".to_string(),
            path_arg(&path),
        ];
        self.runner.run("music mix", &args).await?;
        Ok(path)
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress_bar = ProgressBar::new(total);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) {eta}")
                .or_else(|_| ProgressStyle::default_bar().template("{bar:40} {pos}/{len}"))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░"),
        );
        progress_bar
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
