//! Versioned change journal.
//!
//! Every applied action or phase transition commits exactly one record; the
//! record's version is the room's broadcast version. The journal keeps a
//! bounded ring of recent records for reconnect resync; a client whose
//! last-acked version has fallen below the retention floor gets a full
//! resync instead of a diff stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, VecDeque};

use super::phases::PhaseKind;

/// Field-level changes carried by one record. A `BTreeMap` keeps the wire
/// encoding key-ordered, which the checksum depends on.
pub type ChangeSet = BTreeMap<String, Value>;

/// One committed journal entry.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub version: u64,
    pub phase: PhaseKind,
    pub changes: ChangeSet,
    pub reason: String,
    pub applied_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
}

/// What a resync from a given version looks like.
#[derive(Clone, Debug, PartialEq)]
pub enum Resync {
    /// The requested range is retained: stream these records in order, then
    /// the current snapshot.
    Records(Vec<ChangeRecord>),
    /// The requested version is below the retention floor; the client must
    /// discard local history and take the full snapshot.
    Full,
}

#[derive(Debug)]
pub struct Journal {
    records: VecDeque<ChangeRecord>,
    version: u64,
    retention: usize,
}

impl Journal {
    #[must_use]
    pub fn new(retention: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(retention.min(1024)),
            version: 0,
            retention,
        }
    }

    /// Latest committed version. 0 until the first record lands.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Oldest retained version, if any records are retained.
    #[must_use]
    pub fn floor(&self) -> Option<u64> {
        self.records.front().map(|r| r.version)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Commit one change batch, bumping the version by exactly one.
    pub fn append(
        &mut self,
        phase: PhaseKind,
        changes: ChangeSet,
        reason: impl Into<String>,
        triggered_by: Option<String>,
    ) -> &ChangeRecord {
        self.version += 1;
        let record = ChangeRecord {
            version: self.version,
            phase,
            changes,
            reason: reason.into(),
            applied_at: Utc::now(),
            triggered_by,
        };
        if self.records.len() == self.retention {
            self.records.pop_front();
        }
        self.records.push_back(record);
        self.records.back().expect("record just pushed")
    }

    /// Records strictly newer than `after_version`, or `Resync::Full` when
    /// that point has already been evicted from the ring.
    #[must_use]
    pub fn since(&self, after_version: u64) -> Resync {
        if after_version >= self.version {
            return Resync::Records(Vec::new());
        }
        match self.floor() {
            // The first needed record is after_version + 1.
            Some(floor) if floor <= after_version + 1 => Resync::Records(
                self.records
                    .iter()
                    .filter(|r| r.version > after_version)
                    .cloned()
                    .collect(),
            ),
            _ => Resync::Full,
        }
    }
}

/// Stable 64-bit checksum over a canonical JSON body, hex-encoded.
///
/// `serde_json` maps serialize key-ordered, so the same logical body always
/// hashes to the same digest regardless of construction order.
#[must_use]
pub fn checksum(body: &Value) -> String {
    let canonical = serde_json::to_vec(body).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    hex::encode(&digest[..8])
}
