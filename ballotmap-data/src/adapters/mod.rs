//! Format adapters.
//!
//! Each [`FormatFamily`] pairs a district encoding with a station encoding.
//! Adapters locate the sources, turn every row or feature into a
//! [`RawRecord`] and attach normalized geometry, but never build canonical
//! records; that is left to the region mapper.

mod geojson;
mod kml;
mod shapefile;
mod tabular;

use std::io;

use ballotmap_core::{RawRecord, Srid};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    archive::{ArchiveError, ArchiveResolver},
    config::RegionConfig,
    geometry::{GeometryError, GeometryNormalizer},
    kml::KmlError,
    tabular::TabularError,
};

/// Encoding of a region's district and station sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatFamily {
    /// Delimited text for both.
    Csv,
    /// Polygon shapefile districts, delimited text stations.
    ShapefileCsv,
    /// Polygon shapefile districts, point shapefile stations.
    ShapefileShapefile,
    /// GeoJSON feature collection districts, delimited text stations.
    #[serde(rename = "geojson_csv")]
    GeoJsonCsv,
    /// KML or KMZ districts, delimited text stations.
    KmlCsv,
}

impl FormatFamily {
    /// Extension given to district source names that have none.
    pub const fn district_extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::ShapefileCsv | Self::ShapefileShapefile => "shp",
            Self::GeoJsonCsv => "geojson",
            Self::KmlCsv => "kml",
        }
    }

    /// Extension given to station source names that have none.
    pub const fn station_extension(self) -> &'static str {
        match self {
            Self::ShapefileShapefile => "shp",
            Self::Csv | Self::ShapefileCsv | Self::GeoJsonCsv | Self::KmlCsv => "csv",
        }
    }
}

/// Errors raised while reading a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source file does not exist.
    #[error("source {path} does not exist")]
    NotFound {
        /// Expected path.
        path: Utf8PathBuf,
    },
    /// Delimited text could not be read.
    #[error(transparent)]
    Tabular(#[from] TabularError),
    /// A shapefile or its attribute table could not be read.
    #[error("failed to read shapefile {path}")]
    Shapefile {
        /// Path of the `.shp` file.
        path: Utf8PathBuf,
        /// Reader error.
        #[source]
        source: ::shapefile::Error,
    },
    /// A GeoJSON document could not be parsed.
    #[error("failed to parse GeoJSON {path}")]
    GeoJson {
        /// Document path.
        path: Utf8PathBuf,
        /// Parser error.
        #[source]
        source: ::geojson::Error,
    },
    /// A GeoJSON document held something other than a feature collection.
    #[error("GeoJSON {path} is not a feature collection")]
    NotFeatureCollection {
        /// Document path.
        path: Utf8PathBuf,
    },
    /// A KML document could not be parsed.
    #[error(transparent)]
    Kml(#[from] KmlError),
    /// A KMZ container could not be opened or extracted.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    /// Source geometry was malformed.
    #[error("record {record} has invalid geometry")]
    Geometry {
        /// One-based position of the record in its source.
        record: usize,
        /// Validation error.
        #[source]
        source: GeometryError,
    },
    /// Checking for or opening the source failed.
    #[error("failed to access {path}")]
    Io {
        /// Source path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Everything an adapter needs to read one region.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    /// Source locations and references.
    pub config: &'a RegionConfig,
    /// Target of geometry normalization.
    pub normalizer: GeometryNormalizer,
    /// Resolver for compressed documents.
    pub archives: &'a ArchiveResolver,
}

impl<'a> SourceContext<'a> {
    /// Bundle the parts of a context.
    pub const fn new(
        config: &'a RegionConfig,
        normalizer: GeometryNormalizer,
        archives: &'a ArchiveResolver,
    ) -> Self {
        Self {
            config,
            normalizer,
            archives,
        }
    }

    fn district_srid(&self) -> Srid {
        self.config.district_srid()
    }

    fn station_srid(&self) -> Srid {
        self.config.srid
    }
}

/// Raw records read from one source, in source order.
pub type RawRecords = Box<dyn Iterator<Item = Result<RawRecord, SourceError>>>;

/// Reads district and station sources of one format family.
pub trait SourceAdapter: Send + Sync {
    /// Raw district records with boundary geometry attached where present.
    fn read_districts(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError>;

    /// Raw station records with location geometry attached where present.
    fn read_stations(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError>;
}

struct CsvAdapter;
struct ShapefileCsvAdapter;
struct ShapefileShapefileAdapter;
struct GeoJsonCsvAdapter;
struct KmlCsvAdapter;

impl SourceAdapter for CsvAdapter {
    fn read_districts(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
        tabular::read_districts(context)
    }

    fn read_stations(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
        tabular::read_stations(context)
    }
}

impl SourceAdapter for ShapefileCsvAdapter {
    fn read_districts(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
        shapefile::read_districts(context)
    }

    fn read_stations(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
        tabular::read_stations(context)
    }
}

impl SourceAdapter for ShapefileShapefileAdapter {
    fn read_districts(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
        shapefile::read_districts(context)
    }

    fn read_stations(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
        shapefile::read_stations(context)
    }
}

impl SourceAdapter for GeoJsonCsvAdapter {
    fn read_districts(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
        geojson::read_districts(context)
    }

    fn read_stations(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
        tabular::read_stations(context)
    }
}

impl SourceAdapter for KmlCsvAdapter {
    fn read_districts(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
        kml::read_districts(context)
    }

    fn read_stations(&self, context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
        tabular::read_stations(context)
    }
}

/// Adapter implementing `family`.
pub fn adapter_for(family: FormatFamily) -> &'static dyn SourceAdapter {
    match family {
        FormatFamily::Csv => &CsvAdapter,
        FormatFamily::ShapefileCsv => &ShapefileCsvAdapter,
        FormatFamily::ShapefileShapefile => &ShapefileShapefileAdapter,
        FormatFamily::GeoJsonCsv => &GeoJsonCsvAdapter,
        FormatFamily::KmlCsv => &KmlCsvAdapter,
    }
}

/// Fail with [`SourceError::NotFound`] unless `path` is a regular file.
fn require_file(path: &Utf8Path) -> Result<(), SourceError> {
    match ballotmap_fs::is_regular_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(SourceError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(SourceError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
