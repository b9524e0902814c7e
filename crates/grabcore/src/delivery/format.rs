//! User-facing texts (Telegram HTML parse mode)

use crate::core::config::limits::TELEGRAM_CAPTION_LIMIT;
use crate::core::utils::{escape_html, format_size_mb, truncate_string_safe};
use crate::download::{ExtractedMedia, ExtractionFailure, Platform, Strategy};
use crate::storage::{BotAggregateState, UserStats};

pub fn in_progress(platform: Platform) -> String {
    format!("⏳ Downloading from {}...", platform.display_name())
}

pub fn sending() -> &'static str {
    "📤 Sending files..."
}

pub fn delivered(sent: usize, total: usize) -> String {
    if total == 1 && sent == 1 {
        "✅ Done!".to_string()
    } else {
        format!("✅ Sent {}/{} files", sent, total)
    }
}

/// Error text with the wait hint for retryable kinds.
pub fn failure(failure: &ExtractionFailure) -> String {
    let mut text = format!("❌ <b>Error:</b>\n{}", escape_html(&failure.message));
    if failure.retryable {
        if let Some(wait) = failure.kind.suggested_wait() {
            text.push_str(&format!("\n\n⏳ Please try again in {}.", wait));
        }
    }
    text
}

/// Reported for one item of a batch; the rest of the batch continues.
pub fn item_failed(index: usize, total: usize, reason: &str) -> String {
    format!(
        "⚠️ File {}/{} could not be sent: {}",
        index,
        total,
        escape_html(&truncate_string_safe(reason, 200))
    )
}

/// Header sent before the files of an Instagram post.
pub fn instagram_info(media: &ExtractedMedia) -> String {
    let author = media.author.as_deref().unwrap_or("unknown");
    let caption = if media.caption.trim().is_empty() {
        "<i>No caption</i>".to_string()
    } else {
        escape_html(&media.caption)
    };
    let mut text = format!("📸 <b>Instagram Post</b>\n👤 @{}\n\n{}", escape_html(author), caption);
    if media.strategy == Strategy::Fallback {
        text.push_str("\n\n<i>(via fallback downloader)</i>");
    }
    text
}

/// Caption attached to a YouTube video or audio file.
///
/// Only the title is shortened, and it is cut as plain text before escaping
/// so an HTML entity is never split.
pub fn youtube_caption(media: &ExtractedMedia, size_bytes: u64) -> String {
    let title = if media.caption.trim().is_empty() {
        "Video"
    } else {
        media.caption.as_str()
    };
    let mut suffix = format!("\n📦 {}", format_size_mb(size_bytes));
    if let Some(note) = &media.note {
        suffix.push_str(&format!("\n🎧 Audio only: {}", truncate_string_safe(note, 200)));
    }
    let budget = TELEGRAM_CAPTION_LIMIT.saturating_sub("🎬 ".chars().count() + suffix.chars().count());
    format!(
        "🎬 {}{}",
        escape_html(&truncate_string_safe(title, budget)),
        escape_html(&suffix)
    )
}

/// `/stats` reply.
pub fn stats(user: UserStats, state: &BotAggregateState) -> String {
    let mut text = String::from("📊 <b>Your stats</b>\n");
    text.push_str(&format!("Downloads: {}\nSuccessful: {}\n", user.total, user.success));
    text.push_str("\n🌐 <b>Bot stats</b>\n");
    text.push_str(&format!(
        "Completed: {}\nFailed: {}\nIn progress: {}\nUsers: {}",
        state.downloads_completed,
        state.downloads_failed,
        state.active_downloads.len(),
        state.user_stats.len()
    ));
    if let Some(restart) = state.last_restart {
        text.push_str(&format!("\nLast restart: {}", restart.format("%Y-%m-%d %H:%M UTC")));
    }
    text
}
