use anyhow::{Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::ComposeError;

// @module: File and story-directory utilities

// @const: Page image names, p<page>.<ext>
static IMAGE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^p(\d+)\.(png|jpe?g|webp)$").unwrap());

// @const: Per-page speech names, s<page>_<segment>.wav
static PER_PAGE_SPEECH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^s(\d+)_(\d+)\.wav$").unwrap());

// @const: Global speech names, s<index>.wav
static GLOBAL_SPEECH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^s(\d+)\.wav$").unwrap());

// @const: Page-level speech names, p<page>.wav
static PAGE_SPEECH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^p(\d+)\.wav$").unwrap());

pub const IMAGE_DIR: &str = "image";
pub const SPEECH_DIR: &str = "speech";
pub const SCRIPT_FILE: &str = "script_data.json";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Find a file by exact name under any of the given roots
    pub fn find_file_named<P: AsRef<Path>>(roots: &[P], file_name: &str) -> Option<PathBuf> {
        for root in roots {
            if !Self::dir_exists(root) {
                continue;
            }
            let found = WalkDir::new(root.as_ref())
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .find(|entry| {
                    entry.file_type().is_file()
                        && entry.file_name().to_string_lossy().eq_ignore_ascii_case(file_name)
                });
            if let Some(entry) = found {
                return Some(entry.into_path());
            }
        }
        None
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Page images `image/p<N>.{png,jpg,jpeg,webp}` sorted by page number
    pub fn find_page_images<P: AsRef<Path>>(story_dir: P) -> Result<Vec<PathBuf>, ComposeError> {
        let image_dir = story_dir.as_ref().join(IMAGE_DIR);
        if !Self::dir_exists(&image_dir) {
            return Err(ComposeError::AssetMissing { path: image_dir });
        }

        let mut images: Vec<(usize, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&image_dir)? {
            let path = entry?.path();
            let name = file_name_of(&path);
            if let Some(caps) = IMAGE_NAME_REGEX.captures(&name) {
                if let Ok(page) = caps[1].parse::<usize>() {
                    images.push((page, path));
                }
            }
        }
        images.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        debug!("Found {} page images in {:?}", images.len(), image_dir);
        Ok(images.into_iter().map(|(_, path)| path).collect())
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Speech files found in a story's `speech/` directory, grouped by naming scheme
#[derive(Debug, Default, Clone)]
pub struct SpeechFiles {
    /// Directory the files were found in
    pub dir: PathBuf,
    /// `s<page>_<segment>.wav`, keyed by page then segment
    pub per_page: BTreeMap<usize, BTreeMap<usize, PathBuf>>,
    /// `s<index>.wav`, keyed by global index
    pub global: BTreeMap<usize, PathBuf>,
    /// `p<page>.wav`, one narration per page
    pub page_level: BTreeMap<usize, PathBuf>,
}

impl SpeechFiles {
    /// Scan a story directory's speech folder. A missing folder yields no files.
    pub fn discover<P: AsRef<Path>>(story_dir: P) -> Result<Self, ComposeError> {
        let dir = story_dir.as_ref().join(SPEECH_DIR);
        let mut files = SpeechFiles {
            dir: dir.clone(),
            ..Default::default()
        };
        if !FileManager::dir_exists(&dir) {
            return Ok(files);
        }

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let name = file_name_of(&path);
            if let Some(caps) = PER_PAGE_SPEECH_REGEX.captures(&name) {
                if let (Ok(page), Ok(segment)) = (caps[1].parse::<usize>(), caps[2].parse::<usize>()) {
                    files.per_page.entry(page).or_default().insert(segment, path);
                }
            } else if let Some(caps) = GLOBAL_SPEECH_REGEX.captures(&name) {
                if let Ok(index) = caps[1].parse::<usize>() {
                    files.global.insert(index, path);
                }
            } else if let Some(caps) = PAGE_SPEECH_REGEX.captures(&name) {
                if let Ok(page) = caps[1].parse::<usize>() {
                    files.page_level.insert(page, path);
                }
            }
        }

        debug!(
            "Speech files: {} per-page, {} global, {} page-level",
            files.per_page.values().map(|m| m.len()).sum::<usize>(),
            files.global.len(),
            files.page_level.len()
        );
        Ok(files)
    }

    /// True when only `p<page>.wav` narrations exist
    pub fn is_page_level(&self) -> bool {
        self.per_page.is_empty() && self.global.is_empty() && !self.page_level.is_empty()
    }

    /// Audio paths for a 1-based page that expects `need` segments.
    ///
    /// Per-page names take priority; otherwise the next `need` global indices
    /// are taken starting after `cursor`, which is advanced. Global indices
    /// with no file on disk are returned as the path they should have, so
    /// that validation can report exactly which asset is missing.
    pub fn paths_for_page(&self, page: usize, need: usize, cursor: &mut usize) -> Vec<PathBuf> {
        if let Some(files) = self.per_page.get(&page) {
            return files.values().cloned().collect();
        }

        let mut paths = Vec::with_capacity(need);
        for index in (*cursor + 1)..=(*cursor + need) {
            let path = self
                .global
                .get(&index)
                .cloned()
                .unwrap_or_else(|| self.dir.join(format!("s{}.wav", index)));
            paths.push(path);
        }
        *cursor += need;
        paths
    }

    /// Narration for a 1-based page in page-level mode
    pub fn page_level_path(&self, page: usize) -> PathBuf {
        self.page_level
            .get(&page)
            .cloned()
            .unwrap_or_else(|| self.dir.join(format!("p{}.wav", page)))
    }

    /// Global files that no page consumed leave more narration than
    /// segments. Reported against `last_page`.
    pub fn check_unused_global(&self, cursor: usize, last_page: usize) -> Result<(), ComposeError> {
        let unused = self.global.keys().filter(|&&index| index > cursor).count();
        if unused > 0 {
            warn!("{} global speech files beyond s{}.wav were not used", unused, cursor);
            return Err(ComposeError::DurationMismatch {
                page: last_page,
                expected: cursor,
                found: cursor + unused,
            });
        }
        Ok(())
    }
}

/// Text of one story page
#[derive(Debug, Clone, PartialEq)]
pub struct PageScript {
    /// Full page text
    pub text: String,
    /// Pre-segmented sentences, when the script records them
    pub segments: Option<Vec<String>>,
}

/// Pages of a story as recorded in its script file
#[derive(Debug, Clone, PartialEq)]
pub struct StoryScript {
    pub pages: Vec<PageScript>,
}

#[derive(Debug, Deserialize)]
struct ScriptFile {
    #[serde(default)]
    segmented_pages: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pages: Option<Vec<ScriptPageEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptPageEntry {
    Text(String),
    Detailed {
        #[serde(default, alias = "text")]
        story: String,
        #[serde(default)]
        segments: Vec<String>,
    },
}

impl StoryScript {
    /// Load `script_data.json` from a story directory
    pub fn load<P: AsRef<Path>>(story_dir: P) -> Result<Self, ComposeError> {
        let path = story_dir.as_ref().join(SCRIPT_FILE);
        if !FileManager::file_exists(&path) {
            return Err(ComposeError::AssetMissing { path });
        }
        let content = fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    /// Parse script JSON; `segmented_pages` wins over `pages`
    pub fn parse(content: &str) -> Result<Self, ComposeError> {
        let file: ScriptFile = serde_json::from_str(content)
            .map_err(|e| ComposeError::Script(format!("invalid {}: {}", SCRIPT_FILE, e)))?;

        if let Some(segmented) = file.segmented_pages {
            let pages = segmented
                .into_iter()
                .map(|segments| PageScript {
                    text: segments.join(" "),
                    segments: Some(segments),
                })
                .collect();
            return Ok(Self { pages });
        }

        let entries = file
            .pages
            .ok_or_else(|| ComposeError::Script("neither segmented_pages nor pages present".to_string()))?;
        let pages = entries
            .into_iter()
            .map(|entry| match entry {
                ScriptPageEntry::Text(text) => PageScript { text, segments: None },
                ScriptPageEntry::Detailed { story, segments } => {
                    let text = if story.trim().is_empty() { segments.join(" ") } else { story };
                    let segments = if segments.is_empty() { None } else { Some(segments) };
                    PageScript { text, segments }
                }
            })
            .collect();
        Ok(Self { pages })
    }
}
