//! Braintree District Council.

use ballotmap_core::{
    DistrictFields, MappingError, RawRecord, RegionId, RegionMapper, StationFields,
};
use camino::Utf8Path;

use crate::{
    adapters::FormatFamily,
    config::{RegionConfig, RegionPlugin},
};

pub(super) const REGION_ID: &str = "E07000067";

/// Shapefile columns: id, name for districts; id, unused, one-line address
/// and postcode last for stations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Braintree;

impl RegionMapper for Braintree {
    fn map_district(&self, raw: &RawRecord) -> Result<Option<DistrictFields>, MappingError> {
        Ok(Some(DistrictFields::new(raw.require_nth(0)?, raw.require_nth(1)?)))
    }

    fn map_station(&self, raw: &RawRecord) -> Result<Option<StationFields>, MappingError> {
        Ok(Some(StationFields::new(
            raw.require_nth(0)?,
            raw.require_last()?,
            raw.require_nth(2)?,
        )))
    }
}

pub(super) fn plugin(base_dir: &Utf8Path) -> Option<RegionPlugin> {
    let region = RegionId::new(REGION_ID).ok()?;
    let config = RegionConfig::new(region, FormatFamily::ShapefileShapefile, base_dir)
        .with_districts_name("Polling_Districts")
        .with_stations_name("Polling_Stations.shp");
    Some(RegionPlugin::new(config, Braintree))
}
