//! URL classification
//!
//! Decides which extraction strategy a chat message belongs to. Pure and
//! deterministic: plain substring checks over the lowercased text, first
//! match wins. The Instagram and YouTube pattern sets are disjoint by host.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported source platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    YouTube,
}

impl Platform {
    /// Prefix of the job working directory (`ig_<job id>`, `yt_<job id>`).
    pub fn dir_prefix(&self) -> &'static str {
        match self {
            Platform::Instagram => "ig",
            Platform::YouTube => "yt",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Instagram => "Instagram",
            Platform::YouTube => "YouTube",
        }
    }

    /// All prefixes used for job directories, for sweeps.
    pub fn all_dir_prefixes() -> [&'static str; 2] {
        [Platform::Instagram.dir_prefix(), Platform::YouTube.dir_prefix()]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

const INSTAGRAM_PATTERNS: &[&str] = &[
    "instagram.com/p/",
    "instagram.com/reel/",
    "instagram.com/reels/",
    "instagram.com/tv/",
    "instagram.com/share/",
    "instagr.am/",
];

const YOUTUBE_PATTERNS: &[&str] = &[
    "youtube.com/watch",
    "youtu.be/",
    "youtube.com/shorts/",
    "m.youtube.com/watch",
    "music.youtube.com/watch",
];

/// Returns the platform whose pattern set matches `text`, or `None`.
///
/// `None` means the message is ordinary chat text and must be ignored
/// without any reply.
pub fn classify(text: &str) -> Option<Platform> {
    let lower = text.to_lowercase();
    if INSTAGRAM_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Some(Platform::Instagram);
    }
    if YOUTUBE_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Some(Platform::YouTube);
    }
    None
}

/// Picks the first whitespace-delimited token of `text` that classifies,
/// so "look at this https://youtu.be/xyz !" still yields the link.
pub fn extract_url(text: &str) -> Option<(Platform, String)> {
    text.split_whitespace().find_map(|token| {
        let token = token.trim_matches(|c: char| matches!(c, '<' | '>' | '(' | ')' | '"' | '\''));
        classify(token).map(|platform| (platform, token.to_string()))
    })
}
