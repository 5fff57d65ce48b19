//! Filesystem snapshot store and event sink.
//!
//! Layout under the store root:
//!
//! ```text
//! tickets.jsonl              every saved snapshot, one compact line each
//! events.jsonl               the global event chain
//! runs/<run_id>/ticket.json  latest snapshot of the run, pretty-printed
//! runs/<run_id>/events.jsonl the run's own event chain
//! ```
//!
//! JSONL files are only ever appended to. `ticket.json` is replaced through
//! a temporary file and a rename so a reader never sees half a snapshot.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use interlock_contracts::{
    envelope::{check_run_id, TicketEnvelope},
    error::{InterlockError, InterlockResult},
    event::RunEvent,
};
use interlock_core::traits::{EventSink, SnapshotStore};

use crate::{
    chain::{verify_chain, ChainHead},
    event::{ChainedEvent, EventLog, GLOBAL_SCOPE},
};

const RUNS_DIR: &str = "runs";
const SNAPSHOT_FILE: &str = "ticket.json";
const EVENTS_FILE: &str = "events.jsonl";
const TICKETS_FILE: &str = "tickets.jsonl";

/// Stores snapshots and hash-chained events as files under one directory.
///
/// A single `Mutex` serializes every write, and caches the head of each
/// chain once it has been read from disk.
pub struct FsStore {
    root: PathBuf,
    heads: Mutex<HashMap<String, ChainHead>>,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// `StoreWriteFailed` if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> InterlockResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(RUNS_DIR)).map_err(|e| write_failed(&root, e))?;
        info!(root = %root.display(), "filesystem store opened");
        Ok(Self {
            root,
            heads: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read every chained event of `scope` (a run id or `GLOBAL_SCOPE`).
    /// A scope that has never been written is empty.
    pub fn load_chain(&self, scope: &str) -> InterlockResult<Vec<ChainedEvent>> {
        let path = self.events_path(scope)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&path).map_err(|e| read_failed(&path, e))?;
        let mut events = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| read_failed(&path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let event: ChainedEvent =
                serde_json::from_str(&line).map_err(|e| read_failed(&path, e))?;
            events.push(event);
        }
        Ok(events)
    }

    pub fn export_log(&self, scope: &str) -> InterlockResult<EventLog> {
        Ok(EventLog::new(scope, self.load_chain(scope)?))
    }

    /// Re-hash `scope`'s chain from disk and report whether it is intact.
    pub fn verify_scope(&self, scope: &str) -> InterlockResult<bool> {
        let events = self.load_chain(scope)?;
        let intact = verify_chain(&events);
        debug!(scope = %scope, event_count = events.len(), intact, "chain verified");
        Ok(intact)
    }

    // ── Paths ─────────────────────────────────────────────────────────────────

    fn run_dir(&self, run_id: &str) -> InterlockResult<PathBuf> {
        if run_id.is_empty() {
            return Err(InterlockError::StoreWriteFailed {
                reason: "an empty run_id cannot be used as a directory name".to_string(),
            });
        }
        check_run_id(run_id).map_err(|reason| InterlockError::StoreWriteFailed { reason })?;
        Ok(self.root.join(RUNS_DIR).join(run_id))
    }

    fn events_path(&self, scope: &str) -> InterlockResult<PathBuf> {
        if scope == GLOBAL_SCOPE {
            Ok(self.root.join(EVENTS_FILE))
        } else {
            Ok(self.run_dir(scope)?.join(EVENTS_FILE))
        }
    }

    // ── Appending ─────────────────────────────────────────────────────────────

    fn append_chained(
        &self,
        heads: &mut HashMap<String, ChainHead>,
        scope: &str,
        event: &RunEvent,
    ) -> InterlockResult<()> {
        let head = match heads.entry(scope.to_string()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => slot.insert(ChainHead::after(&self.load_chain(scope)?)),
        };

        // Seal a copy so a failed write leaves the cached head untouched.
        let mut next = head.clone();
        let chained = next.seal(scope, event)?;
        append_line(&self.events_path(scope)?, &serde_json::to_string(&chained)?)?;
        *head = next;
        Ok(())
    }
}

impl SnapshotStore for FsStore {
    fn save_envelope(&self, envelope: &TicketEnvelope) -> InterlockResult<()> {
        let _guard = self.heads.lock().map_err(|e| InterlockError::StoreWriteFailed {
            reason: format!("store lock poisoned: {e}"),
        })?;

        let dir = self.run_dir(&envelope.run_id)?;
        fs::create_dir_all(&dir).map_err(|e| write_failed(&dir, e))?;

        let snapshot = dir.join(SNAPSHOT_FILE);
        let staging = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        fs::write(&staging, envelope.to_json(true)?).map_err(|e| write_failed(&staging, e))?;
        fs::rename(&staging, &snapshot).map_err(|e| write_failed(&snapshot, e))?;

        append_line(&self.root.join(TICKETS_FILE), &envelope.to_json(false)?)?;

        debug!(run_id = %envelope.run_id, state = %envelope.state, "snapshot saved");
        Ok(())
    }

    fn latest_envelope(&self, run_id: &str) -> InterlockResult<Option<TicketEnvelope>> {
        let path = self.run_dir(run_id)?.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|e| read_failed(&path, e))?;
        TicketEnvelope::from_json(&text)
            .map(Some)
            .map_err(|e| read_failed(&path, e))
    }
}

impl EventSink for FsStore {
    fn append_event(&self, event: &RunEvent) -> InterlockResult<()> {
        let mut heads = self.heads.lock().map_err(|e| InterlockError::StoreWriteFailed {
            reason: format!("store lock poisoned: {e}"),
        })?;

        if let Some(run_id) = &event.run_id {
            let dir = self.run_dir(run_id)?;
            fs::create_dir_all(&dir).map_err(|e| write_failed(&dir, e))?;
            self.append_chained(&mut heads, run_id, event)?;
        }
        self.append_chained(&mut heads, GLOBAL_SCOPE, event)?;

        debug!(
            run_id = ?event.run_id,
            event_type = ?event.event_type,
            "event appended"
        );
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn append_line(path: &Path, line: &str) -> InterlockResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| write_failed(path, e))?;
    writeln!(file, "{line}").map_err(|e| write_failed(path, e))?;
    file.flush().map_err(|e| write_failed(path, e))
}

fn write_failed(path: &Path, err: impl std::fmt::Display) -> InterlockError {
    InterlockError::StoreWriteFailed {
        reason: format!("{}: {err}", path.display()),
    }
}

fn read_failed(path: &Path, err: impl std::fmt::Display) -> InterlockError {
    InterlockError::StoreReadFailed {
        reason: format!("{}: {err}", path.display()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
