//! In-memory versioned key-value storage.
//!
//! Every node owns exactly one [`VersionedStore`]. The leader mutates it
//! through [`VersionedStore::assign_and_commit`] and
//! [`VersionedStore::delete_and_commit`], which allocate a fresh version;
//! followers (and anything re-applying a mutation) go through
//! [`VersionedStore::apply_if_newer`], which merges by last-writer-wins.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::mutation::{Mutation, MutationOp};
use crate::version::VersionAllocator;

/// A live value together with the version that wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub value: Value,
    pub version: u64,
}

/// What the map actually holds per key. `value == None` is a tombstone: the
/// key was deleted at `version`, and older mutations must not bring it back.
#[derive(Debug, Clone)]
struct Slot {
    version: u64,
    value: Option<Value>,
}

impl Slot {
    fn live(&self) -> Option<Record> {
        self.value.as_ref().map(|value| Record {
            value: value.clone(),
            version: self.version,
        })
    }
}

/// Thread-safe key-value store keyed by string, with per-key versions.
///
/// The mutex guards only the map access itself and is never held across an
/// `.await`. Version allocation for leader writes happens while the lock is
/// held so that, for any key, the write holding the higher version is always
/// the one left in the map.
///
/// Deleted keys stay in the map as tombstones and are never removed, so
/// memory grows with the number of distinct keys ever written, not with the
/// number currently live.
#[derive(Debug, Default)]
pub struct VersionedStore {
    data: Mutex<BTreeMap<String, Slot>>,
    versions: VersionAllocator,
}

impl VersionedStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
            versions: VersionAllocator::new(),
        }
    }

    /// Each critical section is a single map operation, so a panic elsewhere
    /// can never leave the map half-updated; recover the guard instead of
    /// propagating the poison.
    fn data(&self) -> MutexGuard<'_, BTreeMap<String, Slot>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the live record for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Record> {
        self.data().get(key).and_then(Slot::live)
    }

    /// Leader write: allocates the next version and stores `value` under it.
    pub fn assign_and_commit(&self, key: &str, value: Value) -> u64 {
        let mut data = self.data();
        let version = self.versions.next();
        data.insert(
            key.to_string(),
            Slot {
                version,
                value: Some(value),
            },
        );
        version
    }

    /// Leader delete: if `key` is live, allocates the next version and
    /// replaces the record with a tombstone at that version.
    ///
    /// Returns `None` when the key is absent (or already deleted); no
    /// version is consumed in that case.
    pub fn delete_and_commit(&self, key: &str) -> Option<u64> {
        let mut data = self.data();
        let slot = data.get_mut(key).filter(|slot| slot.value.is_some())?;
        let version = self.versions.next();
        *slot = Slot {
            version,
            value: None,
        };
        Some(version)
    }

    /// Last-writer-wins merge.
    ///
    /// The mutation is applied when nothing is known about the key, or when
    /// its version is greater than or equal to the stored one (records and
    /// tombstones alike). Re-applying the same version is therefore a no-op
    /// in effect. Returns whether the mutation was applied.
    pub fn apply_if_newer(&self, mutation: &Mutation) -> bool {
        let mut data = self.data();
        if let Some(existing) = data.get(&mutation.key) {
            if mutation.version < existing.version {
                return false;
            }
        }

        let value = match &mutation.op {
            MutationOp::Put(value) => Some(value.clone()),
            MutationOp::Delete => None,
        };
        data.insert(
            mutation.key.clone(),
            Slot {
                version: mutation.version,
                value,
            },
        );
        true
    }

    /// Number of live keys (tombstones excluded).
    pub fn len(&self) -> usize {
        self.data()
            .values()
            .filter(|slot| slot.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest version this store has allocated itself. Followers never
    /// allocate, so this stays 0 on them.
    pub fn last_allocated_version(&self) -> u64 {
        self.versions.current()
    }

    /// Clones every live record. The lock is released before the caller
    /// iterates.
    pub fn snapshot(&self) -> BTreeMap<String, Record> {
        self.data()
            .iter()
            .filter_map(|(key, slot)| slot.live().map(|record| (key.clone(), record)))
            .collect()
    }
}
