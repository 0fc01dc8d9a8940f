//! In-memory process registry
//!
//! One [`ProcessRecord`] per launched process, kept for the life of the
//! daemon. The table is shared between the accept loop and every supervisor
//! task, so all access goes through a mutex; id allocation is serialized
//! through the same lock.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Registry entry describing one launched process.
///
/// The serialized form (`Id`, `StartTime`, `StopTime`) matches what clients
/// expect on the wire; the cancellation handle is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Unique id, assigned by an ever-incrementing counter; never reused
    /// within a daemon run
    #[serde(rename = "Id")]
    pub id: u32,

    /// UTC time the launch request was accepted, captured before the child
    /// is spawned
    #[serde(rename = "StartTime")]
    pub start_time: DateTime<Utc>,

    /// UTC time the supervisor observed completion; absent while running,
    /// written exactly once
    #[serde(rename = "StopTime")]
    pub stop_time: Option<DateTime<Utc>>,

    /// Cooperative cancellation handle, shared with the supervisor task
    #[serde(skip)]
    pub cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u32,
    table: BTreeMap<u32, ProcessRecord>,
}

/// Mutex-guarded table of every process launched in this daemon run.
///
/// Entries are inserted on launch and mutated in place on completion; nothing
/// ever evicts an entry. Cloning is cheap and shares the underlying table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and insert a fresh record with the start time
    /// captured now. Returns a clone of the inserted record; its cancellation
    /// handle is shared with the stored entry.
    pub fn insert_new(&self) -> ProcessRecord {
        let mut inner = self.inner.lock().unwrap();
        let record = ProcessRecord {
            id: inner.next_id,
            start_time: Utc::now(),
            stop_time: None,
            cancel: CancellationToken::new(),
        };
        inner.next_id += 1;
        inner.table.insert(record.id, record.clone());
        record
    }

    /// Get a snapshot of the record for `id`, if it exists
    pub fn get(&self, id: u32) -> Option<ProcessRecord> {
        self.inner.lock().unwrap().table.get(&id).cloned()
    }

    /// Signal the cancellation handle for `id`. Returns false when the id is
    /// unknown; the registry is left untouched in that case.
    pub fn signal_cancel(&self, id: u32) -> bool {
        match self.inner.lock().unwrap().table.get(&id) {
            Some(record) => {
                record.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Record completion for `id`. The stop time is written once; later calls
    /// leave the original value in place.
    pub fn mark_stopped(&self, id: u32) {
        if let Some(record) = self.inner.lock().unwrap().table.get_mut(&id) {
            if record.stop_time.is_none() {
                record.stop_time = Some(Utc::now());
            }
        }
    }

    /// Snapshot every record, completed or not, in ascending id order
    pub fn snapshot(&self) -> Vec<ProcessRecord> {
        self.inner.lock().unwrap().table.values().cloned().collect()
    }

    /// Broadcast cancellation to every record. Used at daemon shutdown;
    /// signaling an already-completed record is a no-op.
    pub fn cancel_all(&self) {
        for record in self.inner.lock().unwrap().table.values() {
            record.cancel.cancel();
        }
    }
}
