//! `Messenger` over the Telegram Bot API, bound to one chat

use async_trait::async_trait;
use std::future::Future;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode};
use teloxide::RequestError;

use grabcore::core::retry::{retry, RetryConfig};
use grabcore::delivery::{DeliveryError, MessageRef, Messenger};

/// Sends into a single chat. Every request is retried on network errors
/// and flood-wait replies (honouring the server's `retry_after`).
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    chat_id: ChatId,
    retry: RetryConfig,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            retry: RetryConfig::telegram_send(),
        }
    }

    async fn upload<F, Fut>(&self, kind: &str, path: &Path, request: F) -> Result<(), DeliveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Message, RequestError>>,
    {
        let outcome = retry(&self.retry, request).await;
        let attempts = outcome.attempts;
        match outcome.into_result() {
            Ok(_) => {
                log::debug!("{} {} sent to chat {}", kind, path.display(), self.chat_id);
                Ok(())
            }
            Err(e) => {
                log::error!(
                    "Failed to send {} {} to chat {} after {} attempt(s): {}",
                    kind,
                    path.display(),
                    self.chat_id,
                    attempts,
                    e
                );
                Err(DeliveryError::new(e.to_string()))
            }
        }
    }
}

fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, text: &str) -> Result<MessageRef, DeliveryError> {
        let outcome = retry(&self.retry, || {
            self.bot
                .send_message(self.chat_id, text)
                .parse_mode(ParseMode::Html)
                .send()
        })
        .await;

        outcome.into_result().map(|msg| message_ref(&msg)).map_err(|e| {
            log::error!("Failed to send message to chat {}: {}", self.chat_id, e);
            DeliveryError::new(e.to_string())
        })
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), DeliveryError> {
        let outcome = retry(&self.retry, || {
            self.bot
                .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
                .parse_mode(ParseMode::Html)
                .send()
        })
        .await;

        outcome.into_result().map(|_| ()).map_err(|e| {
            log::warn!("Failed to edit message {} in chat {}: {}", message.message_id, self.chat_id, e);
            DeliveryError::new(e.to_string())
        })
    }

    async fn send_photo(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError> {
        self.upload("photo", path, || {
            let mut request = self
                .bot
                .send_photo(self.chat_id, InputFile::file(path))
                .parse_mode(ParseMode::Html);
            if let Some(text) = caption {
                request = request.caption(text);
            }
            request.send()
        })
        .await
    }

    async fn send_video(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError> {
        self.upload("video", path, || {
            let mut request = self
                .bot
                .send_video(self.chat_id, InputFile::file(path))
                .parse_mode(ParseMode::Html)
                .supports_streaming(true);
            if let Some(text) = caption {
                request = request.caption(text);
            }
            request.send()
        })
        .await
    }

    async fn send_audio(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError> {
        self.upload("audio", path, || {
            let mut request = self
                .bot
                .send_audio(self.chat_id, InputFile::file(path))
                .parse_mode(ParseMode::Html);
            if let Some(text) = caption {
                request = request.caption(text);
            }
            request.send()
        })
        .await
    }

    async fn send_document(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError> {
        self.upload("document", path, || {
            let mut request = self
                .bot
                .send_document(self.chat_id, InputFile::file(path))
                .parse_mode(ParseMode::Html);
            if let Some(text) = caption {
                request = request.caption(text);
            }
            request.send()
        })
        .await
    }
}
