//! JSON checkpoint store for battle state.
//!
//! A checkpoint is the full `BattleState` serialized as a JSON document that
//! round-trips losslessly, so resume recomputes nothing. Writes are atomic
//! (temp file + rename): a crash mid-write leaves the previous checkpoint
//! intact, losing at most one round of progress.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CheckpointError;
use crate::model::BattleState;

/// Result type for checkpoint operations.
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// File-backed checkpoint store, one JSON document per battle.
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store's root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, battle_id: &str) -> PathBuf {
        self.dir.join(format!("battle-{battle_id}.json"))
    }

    /// Persist the full battle state, atomically replacing any previous
    /// checkpoint for the same battle.
    pub fn save(&self, state: &BattleState) -> CheckpointResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(&state.battle_id);
        let tmp = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(state).map_err(CheckpointError::Serialize)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;

        debug!(
            battle_id = %state.battle_id,
            round = state.current_round,
            path = %path.display(),
            "checkpoint written"
        );
        Ok(path)
    }

    /// Load the latest checkpoint for a battle.
    pub fn load(&self, battle_id: &str) -> CheckpointResult<BattleState> {
        let path = self.path_for(battle_id);
        if !path.exists() {
            return Err(CheckpointError::NotFound {
                battle_id: battle_id.to_string(),
                path,
            });
        }
        Self::load_path(&path)
    }

    /// Load a checkpoint from an explicit file path.
    pub fn load_path(path: impl AsRef<Path>) -> CheckpointResult<BattleState> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|source| CheckpointError::Deserialize {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Move a terminal battle's checkpoint into the `archive/` subdirectory.
    ///
    /// Archival is how a battle leaves the active store; the document itself
    /// is preserved for later reporting.
    pub fn archive(&self, battle_id: &str) -> CheckpointResult<PathBuf> {
        let path = self.path_for(battle_id);
        if !path.exists() {
            return Err(CheckpointError::NotFound {
                battle_id: battle_id.to_string(),
                path,
            });
        }

        let archive_dir = self.dir.join("archive");
        fs::create_dir_all(&archive_dir)?;
        let dest = archive_dir.join(format!("battle-{battle_id}.json"));
        fs::rename(&path, &dest)?;

        info!(battle_id, path = %dest.display(), "battle archived");
        Ok(dest)
    }

    /// List battle ids with an active (non-archived) checkpoint.
    pub fn list(&self) -> CheckpointResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name
                .strip_prefix("battle-")
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
