///! # WFA Hub Worker Library
///!
///! This library provides the background sender for bulk email campaigns.
///!
///! ## Modules
///!
///! - `config`: Worker settings from the environment
///! - `queue`: Campaign claiming and recipient bookkeeping
///! - `orchestrator`: Worker loop and per-campaign jobs
///! - `senders`: SMTP and mock delivery backends
///! - `retry`: Backoff for transient delivery failures
///! - `compose`: Per-recipient message merge
///!
///! ## Example
///!
///! ```no_run
///! use wfahub_worker::senders::{MockSender, Sender};
///!
///! # async fn example() {
///! let sender = MockSender::new();
///! println!("Sender: {}", sender.name());
///! # }
///! ```

pub mod compose;
pub mod config;
pub mod orchestrator;
pub mod queue;
pub mod retry;
pub mod senders;
