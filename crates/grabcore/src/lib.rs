//! grabcore - download engine behind the mediagrab Telegram bot
//!
//! Everything here is transport-agnostic: the chat gateway, the extraction
//! tools and the state store are reached through traits so the whole
//! pipeline can run against in-memory fakes.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, retry and process helpers
//! - `download`: URL classification, jobs, Instagram/YouTube strategies
//! - `conversion`: ffmpeg compression and the size policy
//! - `storage`: aggregate counters, active-job bookkeeping
//! - `delivery`: the per-message orchestrator and chat-facing texts

pub mod conversion;
pub mod core;
pub mod delivery;
pub mod download;
pub mod storage;

// Re-export commonly used types for convenience
pub use crate::core::config::Settings;
pub use crate::core::error::{AppError, AppResult};
pub use delivery::{IncomingRequest, JobReport, JobStatus, Messenger, Orchestrator};
pub use download::{classify, ExtractionFailure, FailureKind, Platform};
pub use storage::{JobBook, JsonFileStore, MemoryStore, StatsStore};
