//! Canonical district and station records.
//!
//! Every geometry carries the [`Srid`] it is expressed in, so consumers never
//! have to guess which reference a boundary or point uses.

use std::fmt;

use geo::{MultiPolygon, Point};
use serde::{Deserialize, Serialize};

use crate::{RegionId, Srid};

/// District boundary tagged with its coordinate reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    /// Reference of every coordinate in `geometry`.
    pub srid: Srid,
    /// One or more polygons, each with an exterior and optional holes.
    pub geometry: MultiPolygon<f64>,
}

impl Boundary {
    /// Tag a multi-polygon with its reference.
    pub const fn new(srid: Srid, geometry: MultiPolygon<f64>) -> Self {
        Self { srid, geometry }
    }
}

/// Station position tagged with its coordinate reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Reference of `point`.
    pub srid: Srid,
    /// Longitude/latitude or easting/northing depending on `srid`.
    pub point: Point<f64>,
}

impl Location {
    /// Tag a point with its reference.
    pub const fn new(srid: Srid, point: Point<f64>) -> Self {
        Self { srid, point }
    }
}

/// Administrative boundary within which voters are assigned to a station.
///
/// # Examples
/// ```
/// use geo::{MultiPolygon, polygon};
/// use ballotmap_core::{Boundary, DistrictRecord, RegionId, Srid};
///
/// let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
/// let district = DistrictRecord {
///     region_id: RegionId::new("X01000000")?,
///     internal_region_id: "A".into(),
///     name: "Alpha".into(),
///     boundary: Boundary::new(Srid::WGS84, MultiPolygon(vec![square])),
/// };
/// assert_eq!(district.key().internal_region_id, "A");
/// # Ok::<(), ballotmap_core::RegionIdError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRecord {
    /// Owning region.
    pub region_id: RegionId,
    /// Identifier assigned by the source dataset, unique within the region.
    pub internal_region_id: String,
    /// Human-readable district name.
    pub name: String,
    /// District outline.
    pub boundary: Boundary,
}

impl DistrictRecord {
    /// Storage key of the district.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.region_id.clone(), self.internal_region_id.clone())
    }
}

/// Physical voting location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// Owning region.
    pub region_id: RegionId,
    /// Identifier assigned by the source dataset, unique within the region.
    pub internal_region_id: String,
    /// Postcode, possibly empty or a placeholder when the source omits it.
    pub postcode: String,
    /// Multi-line postal address.
    pub address: String,
    /// Position, absent for address-only sources.
    pub location: Option<Location>,
}

impl StationRecord {
    /// Storage key of the station.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.region_id.clone(), self.internal_region_id.clone())
    }
}

/// The two entity kinds the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// [`DistrictRecord`].
    District,
    /// [`StationRecord`].
    Station,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::District => "district",
            Self::Station => "station",
        })
    }
}

/// Natural key shared by both record kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Owning region.
    pub region_id: RegionId,
    /// Source identifier within the region.
    pub internal_region_id: String,
}

impl RecordKey {
    /// Build a key from its parts.
    pub const fn new(region_id: RegionId, internal_region_id: String) -> Self {
        Self {
            region_id,
            internal_region_id,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region_id, self.internal_region_id)
    }
}

/// Either canonical record, as handed to [`crate::RecordStore::upsert`].
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A district boundary.
    District(DistrictRecord),
    /// A polling station.
    Station(StationRecord),
}

impl Record {
    /// Kind of the wrapped record.
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::District(_) => RecordKind::District,
            Self::Station(_) => RecordKind::Station,
        }
    }

    /// Storage key of the wrapped record.
    pub fn key(&self) -> RecordKey {
        match self {
            Self::District(district) => district.key(),
            Self::Station(station) => station.key(),
        }
    }
}

impl From<DistrictRecord> for Record {
    fn from(value: DistrictRecord) -> Self {
        Self::District(value)
    }
}

impl From<StationRecord> for Record {
    fn from(value: StationRecord) -> Self {
        Self::Station(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn station(id: &str) -> StationRecord {
        StationRecord {
            region_id: RegionId::new("X01000000").expect("valid region"),
            internal_region_id: id.into(),
            postcode: "AB1 2CD".into(),
            address: "Village Hall\nHigh Street".into(),
            location: None,
        }
    }

    #[rstest]
    fn record_exposes_kind_and_key() {
        let record = Record::from(station("7"));
        assert_eq!(record.kind(), RecordKind::Station);
        assert_eq!(record.key().to_string(), "X01000000/7");
    }

    #[rstest]
    #[case(RecordKind::District, "district")]
    #[case(RecordKind::Station, "station")]
    fn kinds_render_lowercase(#[case] kind: RecordKind, #[case] expected: &str) {
        assert_eq!(kind.to_string(), expected);
    }
}
