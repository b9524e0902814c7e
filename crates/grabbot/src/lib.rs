//! mediagrab - Telegram front end of the grabcore download engine
//!
//! - `cli`: command line (run, create-session, sweep)
//! - `telegram`: bot setup, the `Messenger` over the Bot API and the
//!   dispatcher handler tree

pub mod cli;
pub mod telegram;
