//! /start, /stats and /clean

use teloxide::prelude::*;
use teloxide::types::{Message, ParseMode};

use grabcore::core::config;
use grabcore::core::utils::escape_html;
use grabcore::delivery::format;

use super::types::{HandlerDeps, HandlerError};

pub(super) fn start_text(first_name: Option<&str>, chat_id: i64) -> String {
    let name = first_name.map(escape_html).unwrap_or_else(|| "there".to_string());
    format!(
        "🤖 <b>Media Downloader Bot</b>\n\n\
         Hello {}!\n\n\
         Send me links to download:\n\
         📸 <b>Instagram</b> - posts, reels\n\
         🎬 <b>YouTube</b> - videos, shorts\n\n\
         Files up to {}MB are sent directly. Longer YouTube videos fall back to audio only.\n\n\
         Your chat ID: <code>{}</code>",
        name,
        config::limits::TRANSPORT_CAP_MB,
        chat_id
    )
}

pub(super) fn clean_text(removed: usize) -> String {
    match removed {
        0 => "🧹 Nothing to clean up.".to_string(),
        1 => "🧹 Removed 1 stale download folder.".to_string(),
        n => format!("🧹 Removed {} stale download folders.", n),
    }
}

pub(super) async fn handle_start_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    let first_name = msg.from.as_ref().map(|u| u.first_name.as_str());
    bot.send_message(msg.chat.id, start_text(first_name, msg.chat.id.0))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub(super) async fn handle_stats_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let book = deps.orchestrator.jobs();
    let user_id = msg.from.as_ref().map(|u| u.id.0).unwrap_or(msg.chat.id.0 as u64);
    let text = format::stats(book.user_stats(user_id), &book.snapshot());
    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}

pub(super) async fn handle_clean_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let temp_root = &deps.orchestrator.settings().temp_root;
    let text = match deps.orchestrator.jobs().sweep_stale(temp_root, config::cleanup::stale_age()) {
        Ok(removed) => {
            log::info!("🧹 /clean from chat {} removed {} folder(s)", msg.chat.id, removed.len());
            clean_text(removed.len())
        }
        Err(e) => {
            log::error!("/clean failed under {}: {}", temp_root.display(), e);
            "❌ Cleanup failed, see logs.".to_string()
        }
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_text_greets_and_shows_chat_id() {
        let text = start_text(Some("Ann <3"), 42);
        assert!(text.contains("Hello Ann &lt;3!"));
        assert!(text.contains("<code>42</code>"));
        assert!(text.contains("Instagram"));
        assert!(text.contains("YouTube"));
        assert!(text.contains("50MB"));
    }

    #[test]
    fn test_start_text_without_name() {
        assert!(start_text(None, 1).contains("Hello there!"));
    }

    #[test]
    fn test_clean_text_counts() {
        assert_eq!(clean_text(0), "🧹 Nothing to clean up.");
        assert_eq!(clean_text(1), "🧹 Removed 1 stale download folder.");
        assert_eq!(clean_text(3), "🧹 Removed 3 stale download folders.");
    }
}
