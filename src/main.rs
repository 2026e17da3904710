// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use storyreel::app_config::{self, Config};
use storyreel::{Controller, Segmenter, UnitKind};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for UnitKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliUnit {
    Words,
    Chars,
}

impl From<CliUnit> for UnitKind {
    fn from(unit: CliUnit) -> Self {
        match unit {
            CliUnit::Words => UnitKind::Words,
            CliUnit::Chars => UnitKind::Chars,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a story directory to a captioned video
    Render(RenderArgs),

    /// Split text into segments and print one per line
    Segment {
        /// Text to split
        #[arg(value_name = "TEXT")]
        text: String,

        /// Maximum units per segment
        #[arg(short, long, default_value_t = 20)]
        max_units: usize,

        /// Minimum units before a segment is merged into a neighbour
        #[arg(long, default_value_t = 3)]
        min_units: usize,

        /// Unit used for the limits
        #[arg(short, long, value_enum, default_value = "words")]
        unit: CliUnit,
    },

    /// Generate shell completions for storyreel
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Story directory containing image/, speech/ and script_data.json
    #[arg(value_name = "STORY_DIR")]
    story_dir: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "storyreel.json")]
    config: String,

    /// Output video path (defaults to <STORY_DIR>/output.mp4)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Background music file
    #[arg(long)]
    music: Option<PathBuf>,

    /// Background music volume
    #[arg(long)]
    music_volume: Option<f64>,

    /// Seed for transition and effect choices
    #[arg(long, env = "STORYREEL_SEED")]
    seed: Option<u64>,

    /// Frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Canvas width
    #[arg(long)]
    width: Option<u32>,

    /// Canvas height, excluding the caption area
    #[arg(long)]
    height: Option<u32>,

    /// Disable burned-in captions (subtitle files are still written)
    #[arg(long)]
    no_captions: bool,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// storyreel - narrated slideshow videos from story pages
#[derive(Parser, Debug)]
#[command(name = "storyreel")]
#[command(version)]
#[command(about = "Compose narrated, captioned slideshow videos")]
#[command(long_about = "storyreel turns story pages, page images and narration audio into one video
with slide transitions, synchronized captions and optional background music.

EXAMPLES:
    storyreel render stories/42                    # Render with storyreel.json
    storyreel render stories/42 --seed 7           # Reproducible transitions
    storyreel render stories/42 --music theme.mp3  # Mix background music
    storyreel segment \"Dr. Who arrived. He left.\"  # Preview speech segments
    storyreel completions bash > storyreel.bash    # Generate bash completions

CONFIGURATION:
    Configuration is stored in storyreel.json by default. You can specify a
    different file with --config. If the file doesn't exist, a default one will
    be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI colour for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Start at info; the level is refined once the config is loaded
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "storyreel", &mut std::io::stdout());
            Ok(())
        }
        Commands::Segment {
            text,
            max_units,
            min_units,
            unit,
        } => {
            let segmenter = Segmenter::new(max_units, min_units, unit.into());
            for fragment in segmenter.segment(&text) {
                println!("{}", fragment);
            }
            Ok(())
        }
        Commands::Render(args) => run_render(args).await,
    }
}

fn load_config(config_path: &str) -> Result<Config> {
    if Path::new(config_path).exists() {
        let file = File::open(config_path).context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?;
        Ok(config)
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        Ok(config)
    }
}

async fn run_render(options: RenderArgs) -> Result<()> {
    if let Some(level) = &options.log_level {
        log::set_max_level(level_filter(&level.clone().into()));
    }

    let mut config = load_config(&options.config)?;

    // Override config with CLI options if provided
    if let Some(level) = &options.log_level {
        config.log_level = level.clone().into();
    }
    if let Some(music) = &options.music {
        config.music.path = Some(music.clone());
    }
    if let Some(volume) = options.music_volume {
        config.music.volume = volume;
    }
    if let Some(seed) = options.seed {
        config.seed = Some(seed);
    }
    if let Some(fps) = options.fps {
        config.video.fps = fps;
    }
    if let Some(width) = options.width {
        config.video.width = width;
    }
    if let Some(height) = options.height {
        config.video.height = height;
    }
    if options.no_captions {
        config.caption.enabled = false;
    }

    config.validate().context("Configuration validation failed")?;

    if options.log_level.is_none() {
        log::set_max_level(level_filter(&config.log_level));
    }

    if !options.story_dir.is_dir() {
        return Err(anyhow::anyhow!("Story directory does not exist: {:?}", options.story_dir));
    }

    let controller = Controller::with_config(config)?.with_progress(true);
    match controller.run(&options.story_dir, options.output.clone()).await {
        Ok(output) => {
            info!(
                "Success: {} ({:.1}s, {} captions, subtitles at {})",
                output.video.display(),
                output.duration,
                output.cue_count,
                output.subtitles.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            if e.is_retryable() {
                warn!("The failure may be transient; re-running the render can succeed");
            }
            Err(e.into())
        }
    }
}
