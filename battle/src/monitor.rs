//! Push-based progress reporting.
//!
//! The orchestrator pushes a `ProgressUpdate` to the configured monitor
//! after every round. Delivery is best-effort: implementations must swallow
//! their own failures, so a dead observability endpoint never slows or
//! stops a battle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One progress sample, pushed after each round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Task name (the battle id).
    pub name: String,
    /// Current battle status.
    pub status: String,
    /// Rounds completed.
    pub progress: u64,
    /// Round cap for this battle.
    pub total: u64,
    /// Human-readable round summary.
    pub message: String,
    /// Seconds since battle start.
    pub elapsed_seconds: f64,
    /// When this sample was taken.
    pub updated_at: DateTime<Utc>,
}

/// Progress sink consumed by the orchestrator.
#[async_trait]
pub trait TaskMonitor: Send + Sync {
    /// Push one update. Must not fail and must not block the round loop
    /// beyond its own internal timeout.
    async fn push(&self, update: ProgressUpdate);
}

/// Monitor that logs updates through `tracing`.
pub struct LogMonitor;

#[async_trait]
impl TaskMonitor for LogMonitor {
    async fn push(&self, update: ProgressUpdate) {
        info!(
            name = %update.name,
            status = %update.status,
            progress = update.progress,
            total = update.total,
            elapsed_s = update.elapsed_seconds,
            "{}",
            update.message
        );
    }
}

/// Monitor that discards updates. Useful in tests.
pub struct NullMonitor;

#[async_trait]
impl TaskMonitor for NullMonitor {
    async fn push(&self, _update: ProgressUpdate) {}
}

/// Monitor that POSTs updates as JSON to an external endpoint.
///
/// Failures are logged at warn and otherwise ignored.
pub struct HttpTaskMonitor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTaskMonitor {
    /// Create a monitor pushing to `endpoint` with a short request timeout.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TaskMonitor for HttpTaskMonitor {
    async fn push(&self, update: ProgressUpdate) {
        match self
            .client
            .post(&self.endpoint)
            .json(&update)
            .send()
            .await
        {
            Ok(resp) if !resp.status().is_success() => {
                warn!(
                    endpoint = %self.endpoint,
                    status = %resp.status(),
                    "monitor push rejected"
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(endpoint = %self.endpoint, "monitor push failed: {e}");
            }
        }
    }
}
