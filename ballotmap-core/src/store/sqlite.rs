//! SQLite-backed record store.
//!
//! Districts and stations live in separate tables keyed by
//! `(region_id, internal_region_id)`. Boundaries are stored as JSON-encoded
//! `geo` multi-polygons alongside their SRID; station points are stored as
//! nullable coordinate columns.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use geo::{MultiPolygon, Point};
use rusqlite::{Connection, Error as SqliteError, OptionalExtension, params};
use thiserror::Error;

use super::{RecordStore, UpsertOutcome};
use crate::{
    Boundary, DistrictRecord, Location, Record, RecordKey, RecordKind, RegionId, Srid,
    StationRecord,
};

/// Errors raised by [`SqliteRecordStore`].
#[derive(Debug, Error)]
pub enum SqliteRecordStoreError {
    /// Failed to create the parent directory for the database file.
    #[error("failed to create parent directory for {path}")]
    CreateDirectory {
        /// Database path whose parent could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Creating the record tables failed.
    #[error("failed to create record tables")]
    CreateSchema {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Serializing a boundary to JSON failed.
    #[error("failed to serialize boundary for district {key}")]
    SerializeBoundary {
        /// Key of the district being written.
        key: RecordKey,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// A stored boundary was not valid JSON geometry.
    #[error("failed to parse stored boundary for district {key}")]
    DeserializeBoundary {
        /// Key of the district being read.
        key: RecordKey,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// Writing a record failed.
    #[error("failed to write {kind} {key}")]
    Write {
        /// Kind of the record being written.
        kind: RecordKind,
        /// Key of the record being written.
        key: RecordKey,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Deleting a region's records failed.
    #[error("failed to delete {kind} records for region {region}")]
    Delete {
        /// Kind being cleared.
        kind: RecordKind,
        /// Region being cleared.
        region: RegionId,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Reading records failed.
    #[error("failed to read {kind} records")]
    Query {
        /// Kind being read.
        kind: RecordKind,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Record store persisted in a SQLite database.
///
/// # Examples
/// ```
/// use ballotmap_core::{RecordStore, RegionId, SqliteRecordStore, StationRecord};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut store = SqliteRecordStore::open_in_memory()?;
/// let region = RegionId::new("X01000000")?;
/// store.upsert(&StationRecord {
///     region_id: region.clone(),
///     internal_region_id: "1".into(),
///     postcode: "AB1 2CD".into(),
///     address: "Hall".into(),
///     location: None,
/// }.into())?;
/// assert_eq!(store.stations(&region)?.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct SqliteRecordStore {
    connection: Connection,
}

impl fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteRecordStore")
            .field("path", &self.connection.path())
            .finish_non_exhaustive()
    }
}

impl SqliteRecordStore {
    /// Open (or create) a database file, creating parent directories and the
    /// record tables as needed.
    pub fn open(path: &Utf8Path) -> Result<Self, SqliteRecordStoreError> {
        ballotmap_fs::ensure_parent_dir(path).map_err(|source| {
            SqliteRecordStoreError::CreateDirectory {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| SqliteRecordStoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::with_connection(connection)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, SqliteRecordStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| SqliteRecordStoreError::Open {
                path: Utf8PathBuf::from(":memory:"),
                source,
            })?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self, SqliteRecordStoreError> {
        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS districts (
                    region_id TEXT NOT NULL,
                    internal_region_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    srid INTEGER NOT NULL,
                    boundary TEXT NOT NULL,
                    PRIMARY KEY (region_id, internal_region_id)
                );
                CREATE TABLE IF NOT EXISTS stations (
                    region_id TEXT NOT NULL,
                    internal_region_id TEXT NOT NULL,
                    postcode TEXT NOT NULL,
                    address TEXT NOT NULL,
                    srid INTEGER,
                    location_x REAL,
                    location_y REAL,
                    PRIMARY KEY (region_id, internal_region_id)
                );",
            )
            .map_err(|source| SqliteRecordStoreError::CreateSchema { source })?;
        Ok(Self { connection })
    }

    fn write(
        &mut self,
        record: &Record,
        boundary: Option<&str>,
    ) -> Result<UpsertOutcome, SqliteError> {
        let key = record.key();
        let transaction = self.connection.transaction()?;
        let existing = transaction
            .query_row(
                existence_query(record.kind()),
                params![key.region_id.as_str(), key.internal_region_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        match record {
            Record::District(district) => {
                transaction.execute(
                    "INSERT OR REPLACE INTO districts
                        (region_id, internal_region_id, name, srid, boundary)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        district.region_id.as_str(),
                        district.internal_region_id,
                        district.name,
                        district.boundary.srid.code(),
                        boundary,
                    ],
                )?;
            }
            Record::Station(station) => {
                let (srid, x, y) = station.location.map_or((None, None, None), |location| {
                    (
                        Some(location.srid.code()),
                        Some(location.point.x()),
                        Some(location.point.y()),
                    )
                });
                transaction.execute(
                    "INSERT OR REPLACE INTO stations
                        (region_id, internal_region_id, postcode, address, srid, location_x, location_y)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        station.region_id.as_str(),
                        station.internal_region_id,
                        station.postcode,
                        station.address,
                        srid,
                        x,
                        y,
                    ],
                )?;
            }
        }
        transaction.commit()?;

        Ok(if existing {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Inserted
        })
    }
}

const fn existence_query(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::District => {
            "SELECT 1 FROM districts WHERE region_id = ?1 AND internal_region_id = ?2"
        }
        RecordKind::Station => {
            "SELECT 1 FROM stations WHERE region_id = ?1 AND internal_region_id = ?2"
        }
    }
}

impl RecordStore for SqliteRecordStore {
    type Error = SqliteRecordStoreError;

    fn upsert(&mut self, record: &Record) -> Result<UpsertOutcome, Self::Error> {
        let boundary = match record {
            Record::District(district) => Some(
                serde_json::to_string(&district.boundary.geometry).map_err(|source| {
                    SqliteRecordStoreError::SerializeBoundary {
                        key: district.key(),
                        source,
                    }
                })?,
            ),
            Record::Station(_) => None,
        };
        self.write(record, boundary.as_deref())
            .map_err(|source| SqliteRecordStoreError::Write {
                kind: record.kind(),
                key: record.key(),
                source,
            })
    }

    fn contains(&self, kind: RecordKind, key: &RecordKey) -> Result<bool, Self::Error> {
        self.connection
            .query_row(
                existence_query(kind),
                params![key.region_id.as_str(), key.internal_region_id],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(|source| SqliteRecordStoreError::Query { kind, source })
    }

    fn delete_all(&mut self, kind: RecordKind, region: &RegionId) -> Result<usize, Self::Error> {
        let sql = match kind {
            RecordKind::District => "DELETE FROM districts WHERE region_id = ?1",
            RecordKind::Station => "DELETE FROM stations WHERE region_id = ?1",
        };
        self.connection
            .execute(sql, params![region.as_str()])
            .map_err(|source| SqliteRecordStoreError::Delete {
                kind,
                region: region.clone(),
                source,
            })
    }

    fn districts(&self, region: &RegionId) -> Result<Vec<DistrictRecord>, Self::Error> {
        let query_error = |source| SqliteRecordStoreError::Query {
            kind: RecordKind::District,
            source,
        };
        let mut statement = self
            .connection
            .prepare(
                "SELECT internal_region_id, name, srid, boundary FROM districts
                 WHERE region_id = ?1 ORDER BY internal_region_id",
            )
            .map_err(query_error)?;
        let rows = statement
            .query_map(params![region.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        rows.into_iter()
            .map(|(internal_region_id, name, srid, boundary)| {
                let geometry: MultiPolygon<f64> =
                    serde_json::from_str(&boundary).map_err(|source| {
                        SqliteRecordStoreError::DeserializeBoundary {
                            key: RecordKey::new(region.clone(), internal_region_id.clone()),
                            source,
                        }
                    })?;
                Ok(DistrictRecord {
                    region_id: region.clone(),
                    internal_region_id,
                    name,
                    boundary: Boundary::new(Srid::new(srid), geometry),
                })
            })
            .collect()
    }

    fn stations(&self, region: &RegionId) -> Result<Vec<StationRecord>, Self::Error> {
        let query_error = |source| SqliteRecordStoreError::Query {
            kind: RecordKind::Station,
            source,
        };
        let mut statement = self
            .connection
            .prepare(
                "SELECT internal_region_id, postcode, address, srid, location_x, location_y
                 FROM stations WHERE region_id = ?1 ORDER BY internal_region_id",
            )
            .map_err(query_error)?;
        statement
            .query_map(params![region.as_str()], |row| {
                let srid: Option<u32> = row.get(3)?;
                let x: Option<f64> = row.get(4)?;
                let y: Option<f64> = row.get(5)?;
                let location = match (srid, x, y) {
                    (Some(srid), Some(x), Some(y)) => {
                        Some(Location::new(Srid::new(srid), Point::new(x, y)))
                    }
                    _ => None,
                };
                Ok(StationRecord {
                    region_id: region.clone(),
                    internal_region_id: row.get(0)?,
                    postcode: row.get(1)?,
                    address: row.get(2)?,
                    location,
                })
            })
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)
    }
}
