//! Reading Borough Council.

use ballotmap_core::{
    DistrictFields, MappingError, RawRecord, RegionId, RegionMapper, StationFields,
};
use camino::Utf8Path;

use crate::{
    adapters::FormatFamily,
    config::{RegionConfig, RegionPlugin},
};

pub(super) const REGION_ID: &str = "E06000038";

/// Shapefile columns: id and name for districts. Stations carry the id
/// first, address lines from the third column on and the postcode last;
/// rows too short for address lines get an empty address.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reading;

impl RegionMapper for Reading {
    fn map_district(&self, raw: &RawRecord) -> Result<Option<DistrictFields>, MappingError> {
        Ok(Some(DistrictFields::new(raw.require_nth(0)?, raw.require_nth(1)?)))
    }

    fn map_station(&self, raw: &RawRecord) -> Result<Option<StationFields>, MappingError> {
        let address_end = raw.len().saturating_sub(1);
        let address = raw.range(2..address_end).map_or_else(String::new, |lines| {
            lines
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        });
        Ok(Some(StationFields::new(
            raw.require_nth(0)?,
            raw.require_last()?,
            address,
        )))
    }
}

pub(super) fn plugin(base_dir: &Utf8Path) -> Option<RegionPlugin> {
    let region = RegionId::new(REGION_ID).ok()?;
    let config = RegionConfig::new(region, FormatFamily::ShapefileShapefile, base_dir)
        .with_stations_name("polling_stations.shp");
    Some(RegionPlugin::new(config, Reading))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn station(values: &[&str]) -> RawRecord {
        values
            .iter()
            .enumerate()
            .fold(RawRecord::new(ballotmap_core::Srid::BRITISH_NATIONAL_GRID), |raw, (i, value)| {
                raw.with_field(&format!("field_{i}"), *value)
            })
    }

    #[rstest]
    fn station_address_spans_the_middle_columns() {
        let raw = station(&["12", "x", "St Mary's Hall", "Castle Street", "RG1 7RB"]);
        let fields = Reading.map_station(&raw).expect("map").expect("kept");
        assert_eq!(fields.internal_region_id, "12");
        assert_eq!(fields.postcode, "RG1 7RB");
        assert_eq!(fields.address, "St Mary's Hall\nCastle Street");
    }

    #[rstest]
    #[case(&["12", "RG1 7RB"], "RG1 7RB")]
    #[case(&["12"], "12")]
    fn short_station_rows_have_no_address(#[case] values: &[&str], #[case] postcode: &str) {
        let fields = Reading
            .map_station(&station(values))
            .expect("map")
            .expect("kept");
        assert_eq!(fields.address, "");
        assert_eq!(fields.postcode, postcode);
    }

    #[rstest]
    fn empty_station_rows_are_rejected() {
        let err = Reading.map_station(&station(&[])).expect_err("no fields");
        assert!(matches!(err, MappingError::MissingPosition { index: 0, .. }));
    }
}
