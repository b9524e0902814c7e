//! Per-message delivery: from an incoming chat message to sent media
//!
//! - [`Messenger`]: the chat transport seam (Telegram in production)
//! - [`Orchestrator`]: drives one job through extraction, the size policy,
//!   sending, reporting and cleanup
//! - [`format`]: every user-facing text

pub mod format;
pub mod orchestrator;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::download::{FailureKind, JobId, Platform, Strategy};

pub use orchestrator::Orchestrator;

/// A message previously sent by the bot, for later edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// A transport-level send or edit failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DeliveryError(pub String);

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Chat gateway bound to one conversation. Texts are HTML.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<MessageRef, DeliveryError>;
    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), DeliveryError>;
    async fn send_photo(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError>;
    async fn send_video(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError>;
    async fn send_audio(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError>;
    async fn send_document(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError>;
}

/// One chat message as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    pub user_id: u64,
    pub text: String,
}

impl IncomingRequest {
    pub fn new(user_id: u64, text: impl Into<String>) -> Self {
        Self {
            user_id,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// At least one item reached the chat
    Delivered { sent: usize, total: usize, strategy: Strategy },
    Failed(FailureKind),
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Delivered { .. })
    }
}

/// Terminal result of one handled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_id: JobId,
    pub platform: Platform,
    pub status: JobStatus,
}
