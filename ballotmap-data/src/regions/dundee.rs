//! Dundee City Council.
//!
//! Districts come from GeoJSON on the British National Grid. Station
//! addresses are too poor to geocode, so the postcode is left empty and the
//! location is read from the easting and northing columns.

use ballotmap_core::{
    DistrictFields, MappingError, RawRecord, RegionId, RegionMapper, StationFields,
};
use camino::Utf8Path;

use crate::{
    adapters::FormatFamily,
    config::{RegionConfig, RegionPlugin},
};

pub(super) const REGION_ID: &str = "S12000042";

/// Named-column mapper for the Dundee exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dundee;

impl RegionMapper for Dundee {
    fn map_district(&self, raw: &RawRecord) -> Result<Option<DistrictFields>, MappingError> {
        Ok(Some(DistrictFields::new(
            raw.require("polling_station_id")?,
            raw.require("polling_station_name")?,
        )))
    }

    fn map_station(&self, raw: &RawRecord) -> Result<Option<StationFields>, MappingError> {
        let location = raw.point("easting", "northing")?;
        Ok(Some(
            StationFields::new(raw.require("objectid")?, "", raw.require("name")?)
                .with_location(location),
        ))
    }
}

pub(super) fn plugin(base_dir: &Utf8Path) -> Option<RegionPlugin> {
    let region = RegionId::new(REGION_ID).ok()?;
    let config = RegionConfig::new(region, FormatFamily::GeoJsonCsv, base_dir)
        .with_districts_name("polling_districts.bng.geo.json")
        .with_stations_name("SV_POLLING_STATIONS.csv");
    Some(RegionPlugin::new(config, Dundee))
}
