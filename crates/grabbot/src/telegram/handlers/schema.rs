//! Dispatcher schema and handler chain builders

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use grabcore::delivery::JobStatus;
use grabcore::IncomingRequest;

use super::commands::{handle_clean_command, handle_start_command, handle_stats_command};
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::Command;
use crate::telegram::messenger::TelegramMessenger;

/// Creates the dispatcher schema: commands first, then any text message.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start => handle_start_command(&bot, &msg).await?,
                    Command::Stats => handle_stats_command(&bot, &msg, &deps).await?,
                    Command::Clean => handle_clean_command(&bot, &msg, &deps).await?,
                }
                Ok(())
            }
        },
    ))
}

/// Text messages are handed to the orchestrator on their own task so a
/// panic inside one job is caught here instead of unwinding the dispatcher.
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let text = msg.text().unwrap_or_default().to_string();
                let user_id = msg.from.as_ref().map(|u| u.id.0).unwrap_or(msg.chat.id.0 as u64);
                let chat_id = msg.chat.id;

                let orchestrator = Arc::clone(&deps.orchestrator);
                let messenger = TelegramMessenger::new(bot.clone(), chat_id);
                let task = tokio::spawn(async move {
                    let request = IncomingRequest::new(user_id, text);
                    orchestrator.handle(&messenger, &request).await
                });

                match task.await {
                    Ok(Some(report)) => match report.status {
                        JobStatus::Delivered { sent, total, strategy } => log::info!(
                            "Job {} done for chat {}: {}/{} item(s) via {:?}",
                            report.job_id,
                            chat_id,
                            sent,
                            total,
                            strategy
                        ),
                        JobStatus::Failed(kind) => {
                            log::warn!("Job {} failed for chat {}: {:?}", report.job_id, chat_id, kind)
                        }
                    },
                    Ok(None) => log::debug!("No supported link in message from chat {}", chat_id),
                    Err(e) => {
                        log::error!("💥 Download task for chat {} aborted: {}", chat_id, e);
                        let _ = bot
                            .send_message(chat_id, "⚠️ An error occurred, the bot keeps running. Please try again.")
                            .await;
                    }
                }
                Ok(())
            }
        })
}
