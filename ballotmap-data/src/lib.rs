//! Source reading and import orchestration for ballotmap.
//!
//! Responsibilities:
//! - Read delimited text, shapefiles, GeoJSON and KML/KMZ into raw records.
//! - Validate, flatten and reproject source geometry.
//! - Drive region imports through the mapper and store contracts defined in
//!   `ballotmap-core`.
//!
//! Boundaries:
//! - Field meaning is decided by region mappers, never by adapters.
//! - No logger is installed here; output goes through the `log` facade.
//!
//! Invariants:
//! - Stored geometry always uses the configured output reference.
//! - Extracted KMZ documents never outlive the read that needed them.
#![forbid(unsafe_code)]

pub mod adapters;
pub mod archive;
pub mod config;
pub mod geometry;
pub mod import;
pub mod kml;
pub mod regions;
pub mod tabular;

pub use adapters::{FormatFamily, SourceAdapter, SourceContext, SourceError, adapter_for};
pub use archive::{ArchiveError, ArchiveResolver};
pub use config::{CollisionPolicy, ConfigError, ImportOptions, RegionConfig, RegionPlugin};
pub use geometry::{GeometryError, GeometryNormalizer, SourceGeometry};
pub use import::{ImportError, ImportReport, Importer, Phase, PhaseSummary};
pub use regions::{BUILTIN_REGIONS, builtin_plugin};
pub use tabular::{TabularError, TabularReader, normalise_field_name};
