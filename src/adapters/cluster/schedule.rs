use std::sync::atomic::{AtomicUsize, Ordering};

/// Backend selection policy, fixed for the lifetime of a cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Schedule {
    /// Every selection takes the next backend from a cursor shared by all
    /// calls on the cluster, so load rotates globally across backends.
    #[default]
    RoundRobin,

    /// Attempt `k` always goes to backend `k`: the first configured backend
    /// is the master, the rest are ordered fallbacks.
    MasterSlave,
}

/// Maps an attempt index to a backend index.
#[derive(Debug)]
pub(crate) struct Scheduler {
    schedule: Schedule,
    cursor: AtomicUsize,
}

impl Scheduler {
    pub(crate) fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            cursor: AtomicUsize::new(0),
        }
    }

    pub(crate) fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Current round-robin position. Always `< len` of the pool it serves.
    pub(crate) fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Pick the backend for `attempt` out of a pool of `len` (`len > 0`).
    ///
    /// Round robin ignores `attempt`: the cursor is read and advanced modulo
    /// `len` in one atomic step, so concurrent callers never observe or skip
    /// the same slot, though one call's picks need not be contiguous.
    pub(crate) fn choose(&self, attempt: usize, len: usize) -> usize {
        match self.schedule {
            Schedule::MasterSlave => attempt,
            Schedule::RoundRobin => self
                .cursor
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                    Some((cursor + 1) % len)
                })
                .unwrap_or_else(|cursor| cursor),
        }
    }
}
