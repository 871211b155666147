//! Facade crate for the ballotmap polling-station importer.
//!
//! This crate re-exports the record model, the source adapters and the
//! importer, and exposes the `SQLite` store behind a feature flag.

#![forbid(unsafe_code)]

pub use ballotmap_core::{
    Boundary, DistrictFields, DistrictRecord, Location, MappingError, MemoryRecordStore, RawRecord,
    RawValue, RecordKind, RecordStore, RegionId, RegionMapper, RegionRegistry, Reprojection, Srid,
    StaticRegionRegistry, StationFields, StationRecord, UpsertOutcome,
};

#[cfg(feature = "store-sqlite")]
pub use ballotmap_core::{SqliteRecordStore, SqliteRecordStoreError};

pub use ballotmap_data::{
    BUILTIN_REGIONS, CollisionPolicy, FormatFamily, ImportError, ImportOptions, ImportReport,
    Importer, Phase, PhaseSummary, RegionConfig, RegionPlugin, builtin_plugin,
};
