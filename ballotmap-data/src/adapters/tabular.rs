//! Delimited text districts and stations.

use ballotmap_core::{RawGeometry, RawRecord, Srid, normalise_field_name};

use super::{RawRecords, SourceContext, SourceError, require_file};
use crate::{
    geometry::{GeometryNormalizer, SourceGeometry, parse_geojson_geometry},
    tabular::TabularReader,
};

pub(super) fn read_stations(context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
    let path = context.config.stations_path();
    require_file(&path)?;
    let reader = TabularReader::open(&path, context.station_srid())?;
    Ok(Box::new(reader.map(|row| row.map_err(SourceError::from))))
}

/// Districts from delimited text. A non-blank geometry column holds GeoJSON
/// geometry text which is parsed and attached as the boundary.
pub(super) fn read_districts(context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
    let path = context.config.districts_path();
    require_file(&path)?;
    let srid = context.district_srid();
    let reader = TabularReader::open(&path, srid)?;
    let field = normalise_field_name(&context.config.district_geometry_field);
    let normalizer = context.normalizer;
    Ok(Box::new(reader.enumerate().map(move |(index, row)| {
        let record = row?;
        attach_boundary(record, &field, normalizer, srid).map_err(|source| {
            SourceError::Geometry {
                record: index + 1,
                source,
            }
        })
    })))
}

fn attach_boundary(
    mut record: RawRecord,
    field: &str,
    normalizer: GeometryNormalizer,
    srid: Srid,
) -> Result<RawRecord, crate::geometry::GeometryError> {
    let Some(text) = record
        .get(field)
        .filter(|value| !value.is_blank())
        .and_then(|value| value.as_text())
    else {
        return Ok(record);
    };
    let geometry = SourceGeometry::from(parse_geojson_geometry(text)?);
    let boundary = normalizer.boundary(&geometry, srid)?;
    record.set_geometry(RawGeometry::Boundary(boundary));
    Ok(record)
}
