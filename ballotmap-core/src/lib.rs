//! Core domain types for the ballotmap import pipeline.
//!
//! The crate defines the canonical district and station records, the
//! coordinate references they are tagged with, the raw records format
//! adapters produce, the contract region mappers implement, and the storage
//! and registry interfaces the importer writes through.
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod crs;
pub mod mapper;
pub mod raw;
pub mod record;
pub mod region;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use crs::{CrsError, Reprojection, Srid};
pub use mapper::{
    DistrictFields, MappingError, RegionMapper, StationFields, address_lines, postcode_from_address,
};
pub use raw::{RawGeometry, RawRecord, RawValue, normalise_field_name};
pub use record::{Boundary, DistrictRecord, Location, Record, RecordKey, RecordKind, StationRecord};
pub use region::{RegionId, RegionIdError, RegionRegistry, RegistryError, StaticRegionRegistry};
pub use store::{MemoryRecordStore, RecordStore, UpsertOutcome};

#[cfg(feature = "store-sqlite")]
pub use store::{SqliteRecordStore, SqliteRecordStoreError};
