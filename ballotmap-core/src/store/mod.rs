//! Persistence contract for canonical records.
//!
//! The importer writes through [`RecordStore`]: it clears a region with
//! [`RecordStore::delete_all`] and then upserts every mapped record. Records
//! are keyed by `(region_id, internal_region_id)` within their kind, and an
//! upsert fully replaces any existing record with the same key.

use std::{collections::BTreeMap, convert::Infallible};

use crate::{DistrictRecord, Record, RecordKey, RecordKind, RegionId, StationRecord};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteRecordStore, SqliteRecordStoreError};

/// Whether an upsert created a record or replaced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record with the key existed.
    Inserted,
    /// A record with the key was overwritten.
    Replaced,
}

/// Write and read access to canonical records.
pub trait RecordStore {
    /// Backend failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert the record, or replace the record with the same key.
    fn upsert(&mut self, record: &Record) -> Result<UpsertOutcome, Self::Error>;

    /// Report whether a record of `kind` with `key` exists.
    fn contains(&self, kind: RecordKind, key: &RecordKey) -> Result<bool, Self::Error>;

    /// Delete every record of `kind` in `region`, returning how many were
    /// removed. Deleting from an empty region succeeds with zero.
    fn delete_all(&mut self, kind: RecordKind, region: &RegionId) -> Result<usize, Self::Error>;

    /// All districts of `region`, ordered by internal id.
    fn districts(&self, region: &RegionId) -> Result<Vec<DistrictRecord>, Self::Error>;

    /// All stations of `region`, ordered by internal id.
    fn stations(&self, region: &RegionId) -> Result<Vec<StationRecord>, Self::Error>;
}

/// In-memory store, used for dry runs and tests.
///
/// # Examples
/// ```
/// use ballotmap_core::{
///     MemoryRecordStore, RecordKind, RecordStore, RegionId, StationRecord, UpsertOutcome,
/// };
///
/// let region = RegionId::new("X01000000")?;
/// let station = StationRecord {
///     region_id: region.clone(),
///     internal_region_id: "1".into(),
///     postcode: String::new(),
///     address: "Hall".into(),
///     location: None,
/// };
/// let mut store = MemoryRecordStore::default();
/// assert_eq!(store.upsert(&station.clone().into()).unwrap(), UpsertOutcome::Inserted);
/// assert_eq!(store.upsert(&station.into()).unwrap(), UpsertOutcome::Replaced);
/// assert_eq!(store.delete_all(RecordKind::Station, &region).unwrap(), 1);
/// # Ok::<(), ballotmap_core::RegionIdError>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    districts: BTreeMap<RecordKey, DistrictRecord>,
    stations: BTreeMap<RecordKey, StationRecord>,
}

impl MemoryRecordStore {
    /// Total number of stored records of `kind` across all regions.
    pub fn len(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::District => self.districts.len(),
            RecordKind::Station => self.stations.len(),
        }
    }

    /// Report whether the store holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.districts.is_empty() && self.stations.is_empty()
    }
}

fn retain_other_regions<V>(map: &mut BTreeMap<RecordKey, V>, region: &RegionId) -> usize {
    let before = map.len();
    map.retain(|key, _| key.region_id != *region);
    before - map.len()
}

fn region_values<V: Clone>(map: &BTreeMap<RecordKey, V>, region: &RegionId) -> Vec<V> {
    map.iter()
        .filter(|(key, _)| key.region_id == *region)
        .map(|(_, value)| value.clone())
        .collect()
}

impl RecordStore for MemoryRecordStore {
    type Error = Infallible;

    fn upsert(&mut self, record: &Record) -> Result<UpsertOutcome, Self::Error> {
        let previous = match record {
            Record::District(district) => self
                .districts
                .insert(district.key(), district.clone())
                .is_some(),
            Record::Station(station) => self
                .stations
                .insert(station.key(), station.clone())
                .is_some(),
        };
        Ok(if previous {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn contains(&self, kind: RecordKind, key: &RecordKey) -> Result<bool, Self::Error> {
        Ok(match kind {
            RecordKind::District => self.districts.contains_key(key),
            RecordKind::Station => self.stations.contains_key(key),
        })
    }

    fn delete_all(&mut self, kind: RecordKind, region: &RegionId) -> Result<usize, Self::Error> {
        Ok(match kind {
            RecordKind::District => retain_other_regions(&mut self.districts, region),
            RecordKind::Station => retain_other_regions(&mut self.stations, region),
        })
    }

    fn districts(&self, region: &RegionId) -> Result<Vec<DistrictRecord>, Self::Error> {
        Ok(region_values(&self.districts, region))
    }

    fn stations(&self, region: &RegionId) -> Result<Vec<StationRecord>, Self::Error> {
        Ok(region_values(&self.stations, region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Boundary, Srid};
    use geo::{MultiPolygon, polygon};
    use rstest::{fixture, rstest};

    fn region(id: &str) -> RegionId {
        RegionId::new(id).expect("valid region")
    }

    fn district(region_id: &str, id: &str) -> Record {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        Record::District(DistrictRecord {
            region_id: region(region_id),
            internal_region_id: id.into(),
            name: format!("District {id}"),
            boundary: Boundary::new(Srid::WGS84, MultiPolygon(vec![square])),
        })
    }

    #[fixture]
    fn store() -> MemoryRecordStore {
        let mut store = MemoryRecordStore::default();
        for record in [district("R1", "A"), district("R1", "B"), district("R2", "A")] {
            let Ok(outcome) = store.upsert(&record);
            assert_eq!(outcome, UpsertOutcome::Inserted);
        }
        store
    }

    #[rstest]
    fn upsert_replaces_matching_keys(mut store: MemoryRecordStore) {
        let Ok(outcome) = store.upsert(&district("R1", "A"));
        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(store.len(RecordKind::District), 3);
    }

    #[rstest]
    fn delete_all_is_scoped_to_region_and_kind(mut store: MemoryRecordStore) {
        let Ok(removed_stations) = store.delete_all(RecordKind::Station, &region("R1"));
        assert_eq!(removed_stations, 0);
        let Ok(removed) = store.delete_all(RecordKind::District, &region("R1"));
        assert_eq!(removed, 2);
        let Ok(remaining) = store.districts(&region("R2"));
        assert_eq!(remaining.len(), 1);
        let Ok(again) = store.delete_all(RecordKind::District, &region("R1"));
        assert_eq!(again, 0);
    }

    #[rstest]
    fn lists_region_records_in_key_order(store: MemoryRecordStore) {
        let Ok(districts) = store.districts(&region("R1"));
        let ids: Vec<_> = districts
            .iter()
            .map(|d| d.internal_region_id.as_str())
            .collect();
        assert_eq!(ids, ["A", "B"]);
        let key = RecordKey::new(region("R2"), "A".into());
        assert_eq!(store.contains(RecordKind::District, &key), Ok(true));
        assert_eq!(store.contains(RecordKind::Station, &key), Ok(false));
    }
}
