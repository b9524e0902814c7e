//! Extraction results and work-dir scanning helpers.

use std::path::{Path, PathBuf};

use super::error::ExtractionFailure;

/// Extensions accepted from Instagram extractions.
pub const INSTAGRAM_MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "mp4", "mov"];

/// What a downloaded file is, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "webp" => Some(MediaKind::Image),
            "mp4" | "mov" | "mkv" | "webm" | "m4v" => Some(MediaKind::Video),
            "mp3" | "m4a" | "opus" | "ogg" | "aac" | "flac" | "wav" => Some(MediaKind::Audio),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }
}

/// One file ready for the size policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub size: u64,
}

impl MediaItem {
    /// Builds an item for `path` if it is a regular media file.
    pub fn inspect(path: &Path) -> std::io::Result<Option<Self>> {
        let Some(kind) = MediaKind::from_path(path) else {
            return Ok(None);
        };
        let meta = fs_err::metadata(path)?;
        if !meta.is_file() {
            return Ok(None);
        }
        Ok(Some(Self {
            path: path.to_path_buf(),
            kind,
            size: meta.len(),
        }))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Which path produced the media; drives the caption annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Primary,
    Fallback,
    AudioOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMedia {
    /// Never empty; every item is at or below the transport cap
    pub items: Vec<MediaItem>,
    pub caption: String,
    pub author: Option<String>,
    pub strategy: Strategy,
    /// Short remark shown next to the media, e.g. "video too large"
    pub note: Option<String>,
}

/// `Ok` is the success branch, `Err` the classified failure.
pub type ExtractionOutcome = Result<ExtractedMedia, ExtractionFailure>;

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = fs_err::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

/// Lists media files in `dir` whose extension is in `allowed` and whose
/// size is at most `cap_bytes`. Sorted by file name, which keeps the
/// order of multi-item posts.
pub fn collect_media(dir: &Path, cap_bytes: u64, allowed: &[&str]) -> std::io::Result<Vec<MediaItem>> {
    let mut items = Vec::new();
    for path in sorted_entries(dir)? {
        let ext_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)));
        if !ext_ok {
            continue;
        }
        let Some(item) = MediaItem::inspect(&path)? else {
            continue;
        };
        if item.size > cap_bytes {
            log::warn!("Skipping {} ({} bytes over the cap)", item.file_name(), item.size - cap_bytes);
            continue;
        }
        items.push(item);
    }
    Ok(items)
}

/// The largest media file in `dir`, ignoring sidecars such as `.json`,
/// `.part` and thumbnails of unknown type.
pub fn largest_media(dir: &Path) -> std::io::Result<Option<MediaItem>> {
    let mut best: Option<MediaItem> = None;
    for path in sorted_entries(dir)? {
        if let Some(item) = MediaItem::inspect(&path)? {
            if best.as_ref().is_none_or(|b| item.size > b.size) {
                best = Some(item);
            }
        }
    }
    Ok(best)
}
