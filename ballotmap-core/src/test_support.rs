//! Test-only store doubles used by unit and behaviour tests.

use thiserror::Error;

use crate::{
    DistrictRecord, MemoryRecordStore, Record, RecordKey, RecordKind, RecordStore, RegionId,
    StationRecord, UpsertOutcome,
};

/// Error raised by [`FailingRecordStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("simulated {operation} failure")]
pub struct SimulatedStoreError {
    /// Operation that was configured to fail.
    pub operation: &'static str,
}

/// Memory store that fails once a configured number of upserts succeeded.
#[derive(Debug, Default)]
pub struct FailingRecordStore {
    inner: MemoryRecordStore,
    remaining_upserts: usize,
    fail_deletes: bool,
}

impl FailingRecordStore {
    /// Allow `successes` upserts before every further upsert fails.
    pub fn failing_after(successes: usize) -> Self {
        Self {
            remaining_upserts: successes,
            ..Self::default()
        }
    }

    /// Fail every `delete_all` call.
    pub fn failing_deletes() -> Self {
        Self {
            remaining_upserts: usize::MAX,
            fail_deletes: true,
            ..Self::default()
        }
    }

    /// Records written before the failure.
    pub const fn inner(&self) -> &MemoryRecordStore {
        &self.inner
    }
}

impl RecordStore for FailingRecordStore {
    type Error = SimulatedStoreError;

    fn upsert(&mut self, record: &Record) -> Result<UpsertOutcome, Self::Error> {
        let Some(remaining) = self.remaining_upserts.checked_sub(1) else {
            return Err(SimulatedStoreError {
                operation: "upsert",
            });
        };
        self.remaining_upserts = remaining;
        let Ok(outcome) = self.inner.upsert(record);
        Ok(outcome)
    }

    fn contains(&self, kind: RecordKind, key: &RecordKey) -> Result<bool, Self::Error> {
        let Ok(found) = self.inner.contains(kind, key);
        Ok(found)
    }

    fn delete_all(&mut self, kind: RecordKind, region: &RegionId) -> Result<usize, Self::Error> {
        if self.fail_deletes {
            return Err(SimulatedStoreError {
                operation: "delete",
            });
        }
        let Ok(removed) = self.inner.delete_all(kind, region);
        Ok(removed)
    }

    fn districts(&self, region: &RegionId) -> Result<Vec<DistrictRecord>, Self::Error> {
        let Ok(districts) = self.inner.districts(region);
        Ok(districts)
    }

    fn stations(&self, region: &RegionId) -> Result<Vec<StationRecord>, Self::Error> {
        let Ok(stations) = self.inner.stations(region);
        Ok(stations)
    }
}
