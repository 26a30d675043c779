// ── Snapshot store and health tracking ──
//
// Two of the engine's three guarded regions live here. `SyncState` is
// the data region: the snapshot, the pending change set, and every
// timestamp the reconciliation heuristics depend on, all behind one
// async mutex so a poll read and a write reconciliation can never
// interleave their view of the document. `Health` is the error-count
// region backing the availability predicate.

use std::time::Instant;

use chrono::{DateTime, Utc};

use ariston_api::PlantData;

use crate::params::PendingChanges;

/// Data region: snapshot, pending changes, and reconciliation timestamps.
#[derive(Debug, Default)]
pub(crate) struct SyncState {
    /// Last fetched or written-and-echoed document. Replaced wholesale.
    pub snapshot: Option<PlantData>,
    /// When the last read attempt started.
    pub read_start: Option<Instant>,
    /// When the last successful read finished.
    pub read_end: Option<Instant>,
    /// When the last write attempt started.
    pub write_start: Option<Instant>,
    /// When the last successful write finished.
    pub write_end: Option<Instant>,
    /// Wall-clock time of the last successful refresh, for observability.
    pub last_refresh: Option<DateTime<Utc>>,
    /// Values queued for transmission.
    pub pending: PendingChanges,
    /// Retries consumed by the current pending batch.
    pub retries_used: u32,
    /// A one-shot retry timer is currently armed.
    pub retry_armed: bool,
    /// The next reconciliation is the synchronous one following
    /// `apply_parameters`, as opposed to a scheduled retry.
    pub fresh_request: bool,
}

impl SyncState {
    /// Whether a queued value equal to the snapshot's can be considered
    /// applied: a read must have completed after the write attempt began.
    ///
    /// Wall-clock ordering, not a backend version token (none exists) --
    /// a read that races the write can still lie. Known limitation.
    pub fn confirmed_by_read(&self) -> bool {
        match (self.write_start, self.read_end) {
            // Never written: any completed read is authoritative.
            (None, Some(_)) => true,
            (Some(write_start), Some(read_end)) => write_start < read_end,
            (_, None) => false,
        }
    }
}

/// Error-count region backing the availability predicate.
#[derive(Debug, Default)]
pub(crate) struct Health {
    /// Consecutive failed refresh cycles.
    pub errors: u32,
    /// Latched by the first successful cycle; the plant never reads as
    /// available before it.
    pub initialized: bool,
}

impl Health {
    pub fn is_available(&self, max_errors: u32) -> bool {
        self.initialized && self.errors <= max_errors
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn availability_requires_the_initialization_latch() {
        let health = Health::default();
        assert!(!health.is_available(4));

        let health = Health {
            errors: 0,
            initialized: true,
        };
        assert!(health.is_available(4));
    }

    #[test]
    fn availability_tolerates_errors_up_to_the_threshold() {
        let mut health = Health {
            errors: 4,
            initialized: true,
        };
        assert!(health.is_available(4));

        health.errors = 5;
        assert!(!health.is_available(4));
    }

    #[test]
    fn confirmation_needs_a_read_after_the_write_started() {
        let mut state = SyncState::default();
        assert!(!state.confirmed_by_read());

        let now = Instant::now();
        state.read_end = Some(now);
        assert!(state.confirmed_by_read());

        state.write_start = Some(now + Duration::from_secs(1));
        assert!(!state.confirmed_by_read());

        state.read_end = Some(now + Duration::from_secs(2));
        assert!(state.confirmed_by_read());
    }
}
