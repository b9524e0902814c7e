//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command menu registration

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use grabcore::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "how to use the bot")]
    Start,
    #[command(description = "your downloads and bot totals")]
    Stats,
    #[command(description = "remove download folders older than an hour")]
    Clean,
}

/// Creates a Bot instance with a long HTTP timeout for uploads
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - HTTP client could not be built
pub fn create_bot(token: &str) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    Ok(Bot::with_client(token, client))
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_parse() {
        assert_eq!(Command::parse("/start", "mediagrab_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/stats", "mediagrab_bot").unwrap(), Command::Stats);
        assert_eq!(Command::parse("/clean", "mediagrab_bot").unwrap(), Command::Clean);
        assert!(Command::parse("/mode", "mediagrab_bot").is_err());
    }

    #[test]
    fn test_command_menu_lists_all_commands() {
        let names: Vec<_> = Command::bot_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(names, vec!["/start", "/stats", "/clean"]);
    }
}
