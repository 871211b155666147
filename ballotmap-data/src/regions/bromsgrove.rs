//! Bromsgrove District Council.
//!
//! The published station layer carries no addresses, so placeholders are
//! stored and the location comes from the shape alone.

use ballotmap_core::{
    DistrictFields, MappingError, RawRecord, RegionId, RegionMapper, StationFields,
};
use camino::Utf8Path;

use crate::{
    adapters::FormatFamily,
    config::{RegionConfig, RegionPlugin},
};

pub(super) const REGION_ID: &str = "E07000234";

const POSTCODE_PLACEHOLDER: &str = "(postcode not supplied)";
const ADDRESS_PLACEHOLDER: &str = "(address not supplied)";

/// The second column is both the id and the name of a district, and the id
/// of a station.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bromsgrove;

impl RegionMapper for Bromsgrove {
    fn map_district(&self, raw: &RawRecord) -> Result<Option<DistrictFields>, MappingError> {
        let id = raw.require_nth(1)?;
        Ok(Some(DistrictFields::new(id.clone(), id)))
    }

    fn map_station(&self, raw: &RawRecord) -> Result<Option<StationFields>, MappingError> {
        Ok(Some(StationFields::new(
            raw.require_nth(1)?,
            POSTCODE_PLACEHOLDER,
            ADDRESS_PLACEHOLDER,
        )))
    }
}

pub(super) fn plugin(base_dir: &Utf8Path) -> Option<RegionPlugin> {
    let region = RegionId::new(REGION_ID).ok()?;
    let config = RegionConfig::new(region, FormatFamily::ShapefileShapefile, base_dir)
        .with_districts_name("Electoral Boundaries 2")
        .with_stations_name(
            "Bromsgrove DC and Redditch BC Polling Stations - May 2015 Elections.shp",
        );
    Some(RegionPlugin::new(config, Bromsgrove))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotmap_core::Srid;
    use rstest::rstest;

    #[rstest]
    fn stations_get_placeholder_addresses() {
        let raw = RawRecord::new(Srid::BRITISH_NATIONAL_GRID)
            .with_field("FID", 0_i64)
            .with_field("Station", "BA1");
        let fields = Bromsgrove.map_station(&raw).expect("map").expect("kept");
        assert_eq!(fields.internal_region_id, "BA1");
        assert_eq!(fields.postcode, POSTCODE_PLACEHOLDER);
        assert_eq!(fields.address, ADDRESS_PLACEHOLDER);
    }
}
