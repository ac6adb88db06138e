//! In-progress session persistence with file locking.
//!
//! The CLI runs one process per operator action, so the engine is saved
//! between invocations together with the wall-clock instant its session
//! clock was last synchronised. On load, [`StoredSession::catch_up`] replays
//! the elapsed wall time as whole ticks.

use crate::engine::Engine;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredSession {
    pub engine: Engine,
    /// Wall-clock instant matching the engine's current session second
    pub clock_synced_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn new(engine: Engine, now: DateTime<Utc>) -> Self {
        Self {
            engine,
            clock_synced_at: now,
        }
    }

    /// Load a stored session with shared locking
    ///
    /// Returns `None` if the file doesn't exist. A corrupted or unreadable
    /// file is logged and also treated as absent.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            tracing::debug!("No session state at {:?}", path);
            return Ok(None);
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open state file {:?}: {}. Starting fresh.", path, e);
                return Ok(None);
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock state file {:?}: {}. Starting fresh.", path, e);
            return Ok(None);
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!("Failed to read state file {:?}: {}. Starting fresh.", path, e);
            return Ok(None);
        }

        file.unlock()?;

        match serde_json::from_str::<StoredSession>(&contents) {
            Ok(mut stored) => {
                stored.engine.refresh();
                tracing::debug!("Loaded session {} from {:?}", stored.engine.id(), path);
                Ok(Some(stored))
            }
            Err(e) => {
                tracing::warn!("Failed to parse state file {:?}: {}. Starting fresh.", path, e);
                Ok(None)
            }
        }
    }

    /// Save with exclusive locking
    ///
    /// Atomically writes state by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::State(format!("state path {:?} has no parent", path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved session {} to {:?}", self.engine.id(), path);
        Ok(())
    }

    /// Tick the engine once per whole second of wall time since the last
    /// sync. The sub-second remainder carries over to the next call.
    ///
    /// Returns the number of ticks applied.
    pub fn catch_up(&mut self, now: DateTime<Utc>) -> u64 {
        if !self.engine.session().status.is_running() {
            self.clock_synced_at = now;
            return 0;
        }

        let elapsed = now - self.clock_synced_at;
        if elapsed < Duration::zero() {
            tracing::warn!(
                "Wall clock moved backwards by {}s, resynchronising",
                -elapsed.num_seconds()
            );
            self.clock_synced_at = now;
            return 0;
        }

        let seconds = elapsed.num_seconds() as u64;
        self.engine.advance(seconds);
        self.clock_synced_at = self.clock_synced_at + Duration::seconds(seconds as i64);
        if seconds > 0 {
            tracing::debug!("Caught up {} seconds of session time", seconds);
        }
        seconds
    }
}
