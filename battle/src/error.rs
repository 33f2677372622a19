//! Battle error types.
//!
//! The orchestrator itself never propagates an error to the caller (a
//! failed battle still yields a final `BattleState`), but checkpointing,
//! state-machine guards, and adapter plumbing use these typed errors
//! internally.

use std::path::PathBuf;

use thiserror::Error;

use crate::machine::IllegalTransition;

/// Result type alias for battle operations.
pub type BattleResult<T> = Result<T, BattleError>;

/// Errors from checkpoint persistence.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization error: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("checkpoint deserialization error at {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no checkpoint found for battle {battle_id} at {path}")]
    NotFound { battle_id: String, path: PathBuf },
}

/// Errors raised by battle machinery.
#[derive(Debug, Error)]
pub enum BattleError {
    /// The digital twin kept failing across consecutive rounds.
    #[error("digital twin unavailable after {failures} consecutive round failures: {last_error}")]
    TwinUnavailable { failures: u32, last_error: String },

    /// An illegal status transition was attempted.
    #[error(transparent)]
    Transition(#[from] IllegalTransition),

    /// Checkpoint persistence failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}
