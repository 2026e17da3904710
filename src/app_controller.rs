use anyhow::Result;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::app_config::Config;
use crate::captions::ass;
use crate::captions::glyph::{self, parse_color, GlyphRenderer, GlyphStyle};
use crate::captions::{CaptionMode, CaptionSynchronizer, CueList};
use crate::clip_builder::{ClipBuilder, Page, Segment};
use crate::errors::{ComposeError, JobError, PipelineStage, StageContext};
use crate::file_utils::{FileManager, SpeechFiles, StoryScript};
use crate::render::{validate_music, FrameRasterizer, RenderJob, Renderer};
use crate::segmenter::Segmenter;
use crate::timeline::{Timeline, TransitionComposer};

// @module: Render job orchestration

/// Pages and segments of a story after validation
#[derive(Debug, Clone)]
pub struct StoryPlan {
    pub pages: Vec<Page>,
    /// Segments of each page, in page order
    pub segments: Vec<Vec<Segment>>,
    pub mode: CaptionMode,
    /// Background music that passed validation
    pub music: Option<PathBuf>,
}

impl StoryPlan {
    pub fn segment_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }
}

/// A story laid out on its timeline with synchronized captions
#[derive(Debug, Clone)]
pub struct ComposedStory {
    pub timeline: Timeline,
    pub cues: CueList,
    pub mode: CaptionMode,
    pub music: Option<PathBuf>,
}

/// Files produced by a successful render
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub video: PathBuf,
    pub subtitles: PathBuf,
    pub ass: Option<PathBuf>,
    pub cue_count: usize,
    pub duration: f64,
}

/// Main application controller for story rendering
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Show a frame progress bar while encoding
    show_progress: bool,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Check every asset a story needs before any expensive work starts
    pub fn validate_story<P: AsRef<Path>>(&self, story_dir: P) -> Result<StoryPlan, JobError> {
        self.plan_story(story_dir.as_ref()).at_stage(PipelineStage::Validation)
    }

    /// Unusable music only costs the soundtrack, never the render
    fn check_music(&self) -> Option<PathBuf> {
        let music = self.config.music.path.as_deref()?;
        match validate_music(music, &self.config.music.allowed_extensions) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping background music: {}", e);
                None
            }
        }
    }

    fn plan_story(&self, story_dir: &Path) -> Result<StoryPlan, ComposeError> {
        let music = self.check_music();
        let images = FileManager::find_page_images(story_dir)?;
        if images.is_empty() {
            return Err(ComposeError::Script(format!("no page images in {}", story_dir.display())));
        }

        let script = StoryScript::load(story_dir)?;
        if script.pages.len() != images.len() {
            return Err(ComposeError::Script(format!(
                "script has {} pages but {} page images were found",
                script.pages.len(),
                images.len()
            )));
        }

        let pages: Vec<Page> = script
            .pages
            .iter()
            .zip(images)
            .enumerate()
            .map(|(i, (page, image))| Page {
                number: i + 1,
                text: page.text.clone(),
                image,
            })
            .collect();

        let speech = SpeechFiles::discover(story_dir)?;
        if speech.is_page_level() {
            info!("Using page-level narration (p<page>.wav)");
            let mut segments = Vec::with_capacity(pages.len());
            for page in &pages {
                let audio = speech.page_level_path(page.number);
                ClipBuilder::validate_page(page.number, 1, std::slice::from_ref(&audio))?;
                segments.push(vec![Segment::new(page.number, 0, &page.text, Some(audio))?]);
            }
            return Ok(StoryPlan {
                pages,
                segments,
                mode: CaptionMode::PageLevel,
                music,
            });
        }

        let segmenter = Segmenter::for_speech(self.config.segmenter.max_words, self.config.segmenter.min_words);
        let mut cursor = 0;
        let mut segments = Vec::with_capacity(pages.len());
        for (page, recorded) in pages.iter().zip(&script.pages) {
            let texts = match &recorded.segments {
                Some(texts) => texts.clone(),
                None => segmenter.segment(&page.text),
            };
            let audio = speech.paths_for_page(page.number, texts.len(), &mut cursor);
            ClipBuilder::validate_page(page.number, texts.len(), &audio)?;

            let page_segments = texts
                .iter()
                .zip(audio)
                .enumerate()
                .map(|(i, (text, path))| Segment::new(page.number, i, text, Some(path)))
                .collect::<Result<Vec<_>, _>>()?;
            debug!("Page {}: {} segments", page.number, page_segments.len());
            segments.push(page_segments);
        }
        speech.check_unused_global(cursor, pages.len())?;

        let plan = StoryPlan {
            pages,
            segments,
            mode: CaptionMode::PerSegment,
            music,
        };
        if plan.segment_count() == 0 {
            return Err(ComposeError::Script("story has no narrated segments".to_string()));
        }
        Ok(plan)
    }

    /// Validate, build clips, compose the timeline and synchronize captions.
    /// Runs no subprocess.
    pub fn compose_story<P: AsRef<Path>>(&self, story_dir: P) -> Result<ComposedStory, JobError> {
        let plan = self.validate_story(story_dir)?;
        let mut rng = self.rng();

        let builder = ClipBuilder::new(&self.config).at_stage(PipelineStage::ClipBuilding)?;
        let mut clips = Vec::with_capacity(plan.segment_count());
        let mut texts = Vec::with_capacity(plan.segment_count());
        for (page, segments) in plan.pages.iter().zip(&plan.segments) {
            if segments.is_empty() {
                continue;
            }
            let image = builder.load_page_image(&page.image).at_stage(PipelineStage::ClipBuilding)?;
            for segment in segments {
                clips.push(builder.build(segment, image.clone(), &mut rng).at_stage(PipelineStage::ClipBuilding)?);
            }
            match plan.mode {
                CaptionMode::PerSegment => texts.extend(segments.iter().map(|s| s.text.clone())),
                CaptionMode::PageLevel => texts.push(page.text.clone()),
            }
        }

        let effects = &self.config.effects;
        let composer = TransitionComposer::new(effects.transition_duration)
            .with_fade(effects.fade_mode, effects.fade_duration);
        let (timeline, timestamps) = composer.compose(clips, &mut rng).at_stage(PipelineStage::Composition)?;

        let caption = &self.config.caption;
        let lines = Segmenter::for_captions(caption.max_chars_per_line, self.config.segmenter.min_chars);
        let synchronizer = CaptionSynchronizer::new(lines, caption.line_gap);
        let cues = synchronizer.synchronize(&timestamps, &texts, plan.mode).normalized();

        info!(
            "Composed {} clips into {:.2}s with {} captions",
            timeline.clips().len(),
            timeline.duration(),
            cues.len()
        );
        Ok(ComposedStory {
            timeline,
            cues,
            mode: plan.mode,
            music: plan.music,
        })
    }

    /// Render a story to `output`, or `<story>/output.mp4` by default
    pub async fn run<P: AsRef<Path>>(&self, story_dir: P, output: Option<PathBuf>) -> Result<RenderOutput, JobError> {
        let start_time = Instant::now();
        let story_dir = story_dir.as_ref();
        let mut job = RenderJob::new(story_dir, self.config.clone());
        if let Some(output) = output {
            job = job.with_output(output);
        }

        let composed = self.compose_story(story_dir)?;
        job.config.music.path = composed.music.clone();
        let caption = &self.config.caption;
        let video = &self.config.video;

        let font = glyph::resolve_font(&caption.font, story_dir);
        let (glyphs, caption_area) = if caption.enabled {
            let renderer = GlyphRenderer::load(font.as_deref(), GlyphStyle::from_config(&self.config));
            let texts: Vec<String> = composed.cues.cues.iter().map(|c| c.text.clone()).collect();
            let glyphs = renderer.render_all(&texts, caption.workers).await;
            (glyphs, caption.effective_area_height(video.height))
        } else {
            (Default::default(), 0)
        };

        let [r, g, b, _] = parse_color(&video.background).unwrap_or([0, 0, 0, 255]);
        let timeline = Arc::new(composed.timeline);
        let cues = Arc::new(composed.cues);
        let overlay = FrameRasterizer::new(
            timeline.clone(),
            cues.clone(),
            Arc::new(glyphs),
            video.width,
            video.height,
            caption_area,
            image::Rgb([r, g, b]),
        );

        let mut renderer = Renderer::new(&self.config).with_progress(self.show_progress);
        let video_path = renderer
            .render(timeline.clone(), overlay, &job)
            .await
            .at_stage(PipelineStage::Rendering)?;

        let subtitles = job.srt_path();
        cues.write_srt(&subtitles).at_stage(PipelineStage::Captioning)?;
        let ass_path = if caption.export_ass {
            let font_name = font
                .as_deref()
                .unwrap_or_else(|| Path::new(&caption.font))
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| caption.font.clone());
            let path = job.ass_path();
            ass::write_ass(&path, &cues, &self.config, &font_name).at_stage(PipelineStage::Captioning)?;
            Some(path)
        } else {
            None
        };

        if cues.is_empty() {
            warn!("No captions were produced for {}", story_dir.display());
        }
        info!("Render finished in {:.1}s", start_time.elapsed().as_secs_f64());

        Ok(RenderOutput {
            video: video_path,
            subtitles,
            ass: ass_path,
            cue_count: cues.len(),
            duration: timeline.duration(),
        })
    }
}
