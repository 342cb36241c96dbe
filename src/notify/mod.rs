// src/notify/mod.rs
pub mod email;

use anyhow::Result;
use async_trait::async_trait;

use crate::run::VideoResult;

pub use email::EmailNotifier;

/// One notification pass per run, covering everything produced. Delivery is
/// at-most-once; a failed send is logged and counted as zero.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns the number of messages sent.
    async fn send(&self, results: &[VideoResult]) -> Result<usize>;
}
