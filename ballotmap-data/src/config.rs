//! Region manifests and import options.
//!
//! A [`RegionConfig`] says where a region's sources live and how to read
//! them. It deserializes from a JSON manifest whose optional keys fall back
//! to the conventional source names and the British National Grid.

use std::io;

use ballotmap_core::{RegionId, RegionMapper, Srid};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

use crate::adapters::FormatFamily;

const DEFAULT_DISTRICTS_NAME: &str = "polling_districts";
const DEFAULT_STATIONS_NAME: &str = "polling_places";
const DEFAULT_GEOMETRY_FIELD: &str = "geometry";

/// Errors raised while loading a region manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The manifest could not be read.
    #[error("failed to read region manifest {path}")]
    Read {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The manifest was not valid JSON for a region.
    #[error("invalid region manifest {path}")]
    Parse {
        /// Manifest path, or `<inline>` for in-memory text.
        path: Utf8PathBuf,
        /// Deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Where a region's sources live and how they are encoded.
///
/// # Examples
/// ```
/// use ballotmap_core::Srid;
/// use ballotmap_data::config::RegionConfig;
///
/// let config = RegionConfig::from_json_str(
///     r#"{"region_id": "S12000042", "format": "geojson_csv", "base_dir": "/data/dundee"}"#,
/// )?;
/// assert_eq!(config.district_srid(), Srid::BRITISH_NATIONAL_GRID);
/// assert_eq!(config.stations_path(), "/data/dundee/polling_places.csv");
/// # Ok::<(), ballotmap_data::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionConfig {
    /// Region being imported.
    pub region_id: RegionId,
    /// Encoding of the district and station sources.
    pub format: FormatFamily,
    /// Directory holding the sources.
    pub base_dir: Utf8PathBuf,
    /// District source name relative to `base_dir`, with or without an
    /// extension.
    #[serde(default = "default_districts_name")]
    pub districts_name: String,
    /// Station source name relative to `base_dir`.
    #[serde(default = "default_stations_name")]
    pub stations_name: String,
    /// Reference of station coordinates, and of districts unless overridden.
    #[serde(default = "default_srid")]
    pub srid: Srid,
    /// Reference of district geometry when it differs from `srid`.
    #[serde(default)]
    pub districts_srid: Option<Srid>,
    /// Tabular column carrying GeoJSON district geometry.
    #[serde(default = "default_geometry_field")]
    pub district_geometry_field: String,
}

fn default_districts_name() -> String {
    DEFAULT_DISTRICTS_NAME.to_owned()
}

fn default_stations_name() -> String {
    DEFAULT_STATIONS_NAME.to_owned()
}

const fn default_srid() -> Srid {
    Srid::BRITISH_NATIONAL_GRID
}

fn default_geometry_field() -> String {
    DEFAULT_GEOMETRY_FIELD.to_owned()
}

impl RegionConfig {
    /// Configuration with the conventional names and references.
    pub fn new(region_id: RegionId, format: FormatFamily, base_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            region_id,
            format,
            base_dir: base_dir.into(),
            districts_name: default_districts_name(),
            stations_name: default_stations_name(),
            srid: default_srid(),
            districts_srid: None,
            district_geometry_field: default_geometry_field(),
        }
    }

    /// Override the district source name.
    #[must_use]
    pub fn with_districts_name(mut self, name: impl Into<String>) -> Self {
        self.districts_name = name.into();
        self
    }

    /// Override the station source name.
    #[must_use]
    pub fn with_stations_name(mut self, name: impl Into<String>) -> Self {
        self.stations_name = name.into();
        self
    }

    /// Override the reference of station coordinates.
    #[must_use]
    pub const fn with_srid(mut self, srid: Srid) -> Self {
        self.srid = srid;
        self
    }

    /// Override the reference of district geometry.
    #[must_use]
    pub const fn with_districts_srid(mut self, srid: Srid) -> Self {
        self.districts_srid = Some(srid);
        self
    }

    /// Reference district geometry is declared in. KML is always WGS84.
    pub fn district_srid(&self) -> Srid {
        if self.format == FormatFamily::KmlCsv {
            return Srid::WGS84;
        }
        self.districts_srid.unwrap_or(self.srid)
    }

    /// Full path of the district source. A name without an extension gets
    /// the conventional one for the format family.
    pub fn districts_path(&self) -> Utf8PathBuf {
        with_default_extension(
            self.base_dir.join(&self.districts_name),
            self.format.district_extension(),
        )
    }

    /// Full path of the station source, completed the same way.
    pub fn stations_path(&self) -> Utf8PathBuf {
        with_default_extension(
            self.base_dir.join(&self.stations_name),
            self.format.station_extension(),
        )
    }

    /// Parse a manifest from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: Utf8PathBuf::from("<inline>"),
            source,
        })
    }

    /// Read and parse a manifest file.
    pub fn from_json_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = ballotmap_fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn with_default_extension(path: Utf8PathBuf, extension: &str) -> Utf8PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(extension)
    }
}

/// What to do when an import writes the same key twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Keep the last record and count the replacement.
    #[default]
    Replace,
    /// Abort the import.
    Fail,
}

/// Settings shared by every region import.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Reference every stored geometry is converted to.
    pub output_srid: Srid,
    /// Handling of repeated keys within one import.
    pub collision: CollisionPolicy,
    /// Directory for extracted archive documents; the system temporary
    /// directory when unset.
    pub scratch_dir: Option<Utf8PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            output_srid: Srid::WGS84,
            collision: CollisionPolicy::default(),
            scratch_dir: None,
        }
    }
}

/// A region's configuration together with the mapper for its sources.
pub struct RegionPlugin {
    /// Source locations and encodings.
    pub config: RegionConfig,
    /// Field mapping for the region.
    pub mapper: Box<dyn RegionMapper>,
}

impl RegionPlugin {
    /// Pair a configuration with its mapper.
    pub fn new(config: RegionConfig, mapper: impl RegionMapper + 'static) -> Self {
        Self {
            config,
            mapper: Box::new(mapper),
        }
    }
}

impl std::fmt::Debug for RegionPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionPlugin")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn manifests_fill_in_defaults() {
        let config = RegionConfig::from_json_str(
            r#"{"region_id": "E06000038", "format": "shapefile_shapefile", "base_dir": "/data/reading"}"#,
        )
        .expect("manifest");
        assert_eq!(config.districts_name, "polling_districts");
        assert_eq!(config.stations_name, "polling_places");
        assert_eq!(config.srid, Srid::BRITISH_NATIONAL_GRID);
        assert_eq!(config.district_geometry_field, "geometry");
        assert_eq!(config.districts_path(), "/data/reading/polling_districts.shp");
        assert_eq!(config.stations_path(), "/data/reading/polling_places.shp");
    }

    #[rstest]
    fn kml_districts_are_always_wgs84() {
        let region = RegionId::new("X01000000").expect("region");
        let config = RegionConfig::new(region, FormatFamily::KmlCsv, "/data")
            .with_districts_srid(Srid::WEB_MERCATOR);
        assert_eq!(config.district_srid(), Srid::WGS84);
    }

    #[rstest]
    #[case("stations", "/data/stations.csv")]
    #[case("stations.txt", "/data/stations.txt")]
    fn tabular_station_paths_default_to_csv(#[case] name: &str, #[case] expected: &str) {
        let region = RegionId::new("X01000000").expect("region");
        let config = RegionConfig::new(region, FormatFamily::Csv, "/data").with_stations_name(name);
        assert_eq!(config.stations_path(), expected);
    }

    #[rstest]
    fn rejects_unknown_formats() {
        let err = RegionConfig::from_json_str(
            r#"{"region_id": "X01000000", "format": "gpx", "base_dir": "/data"}"#,
        )
        .expect_err("unknown format");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[rstest]
    fn options_deserialize_with_defaults() {
        let options: ImportOptions =
            serde_json::from_str(r#"{"collision": "fail"}"#).expect("options");
        assert_eq!(options.output_srid, Srid::WGS84);
        assert_eq!(options.collision, CollisionPolicy::Fail);
        assert!(options.scratch_dir.is_none());
    }
}
