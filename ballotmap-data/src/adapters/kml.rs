//! KML and KMZ districts.

use ballotmap_core::{RawGeometry, RawRecord, Srid};

use super::{RawRecords, SourceContext, SourceError, require_file};
use crate::{
    geometry::{GeometryError, GeometryNormalizer, SourceGeometry},
    kml::{Placemark, read_placemarks_from_path},
};

pub(super) fn read_districts(context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
    let path = context.config.districts_path();
    require_file(&path)?;
    let placemarks = context.archives.with_document(&path, |document| {
        read_placemarks_from_path(document).map_err(SourceError::from)
    })?;
    log::debug!("read {} placemarks from {path}", placemarks.len());

    let normalizer = context.normalizer;
    Ok(Box::new(placemarks.into_iter().enumerate().map(
        move |(index, placemark)| {
            to_raw(placemark, normalizer).map_err(|source| SourceError::Geometry {
                record: index + 1,
                source,
            })
        },
    )))
}

fn to_raw(placemark: Placemark, normalizer: GeometryNormalizer) -> Result<RawRecord, GeometryError> {
    let mut record = RawRecord::new(Srid::WGS84);
    for (name, value) in &placemark.fields {
        record.push(name, value.as_str());
    }
    if let Some(geometry) = placemark.geometry {
        let boundary = normalizer.boundary(&SourceGeometry::from(geometry), Srid::WGS84)?;
        record.set_geometry(RawGeometry::Boundary(boundary));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kml::{KmlCoord, KmlGeometry, KmlPolygon};
    use ballotmap_core::RawValue;
    use rstest::rstest;

    #[rstest]
    fn flattens_altitude_and_normalizes_field_names() {
        let outer: Vec<KmlCoord> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]
            .into_iter()
            .map(|(x, y)| KmlCoord { x, y, z: Some(120.0) })
            .collect();
        let placemark = Placemark {
            fields: vec![("Ward Code".to_owned(), "N01".to_owned())],
            geometry: Some(KmlGeometry::Polygon(KmlPolygon {
                outer,
                inner: Vec::new(),
            })),
        };
        let record = to_raw(placemark, GeometryNormalizer::new(Srid::WGS84)).expect("record");
        assert_eq!(record.get("ward_code"), Some(&RawValue::from("N01")));
        let boundary = record.boundary().expect("boundary");
        assert_eq!(boundary.srid, Srid::WGS84);
        assert_eq!(boundary.geometry.0[0].exterior().0.len(), 4);
    }
}
