//! Storefront - offline-resilient order pipeline
//!
//! Orders are persisted to a pending queue before any delivery attempt and
//! move to the completed ledger only once the notifier confirms them. All
//! state lives in one key-value store; collaborators are injected through the
//! traits in [`traits`] so every component can be tested in memory.

pub mod cart;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod message;
pub mod mocks;
pub mod models;
pub mod orders;
pub mod production;
pub mod retry_scheduler;
mod sqlite_store;
mod state;
pub mod store;
pub mod traits;
pub mod validation;

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::StorefrontError;
pub use sqlite_store::SqliteStore;
pub use state::AppState;

/// Initialize logging to both stderr and a daily-rolling file in `log_dir`.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = rolling::daily(log_dir, "storefront.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "storefront=info,storefront_lib=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)) // console
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .try_init()?;

    Ok(guard)
}
