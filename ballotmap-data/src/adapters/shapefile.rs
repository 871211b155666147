//! ESRI shapefile districts and stations.
//!
//! The attribute table is read alongside the shapes; its column order is
//! kept so positional mappers see the fields as the publisher laid them out.

use std::io::BufReader;

use ::shapefile::{
    Reader, Shape, ShapeReader,
    dbase::{self, FieldValue},
};
use ballotmap_core::{RawGeometry, RawRecord, RawValue, Srid};
use camino::{Utf8Path, Utf8PathBuf};

use super::{RawRecords, SourceContext, SourceError, require_file};
use crate::geometry::{GeometryError, GeometryNormalizer, SourceGeometry};

#[derive(Debug, Clone, Copy)]
enum Target {
    Boundary,
    Location,
}

pub(super) fn read_districts(context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
    read(
        &context.config.districts_path(),
        context.district_srid(),
        context.normalizer,
        Target::Boundary,
    )
}

pub(super) fn read_stations(context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
    read(
        &context.config.stations_path(),
        context.station_srid(),
        context.normalizer,
        Target::Location,
    )
}

/// `.shp` path for a configured source name.
fn shape_path(path: &Utf8Path) -> Utf8PathBuf {
    match path.extension() {
        Some(extension) if extension.eq_ignore_ascii_case("shp") => path.to_path_buf(),
        _ => {
            let mut with_shp = path.as_str().to_owned();
            with_shp.push_str(".shp");
            Utf8PathBuf::from(with_shp)
        }
    }
}

fn open(path: &Utf8Path) -> Result<BufReader<std::fs::File>, SourceError> {
    require_file(path)?;
    ballotmap_fs::open_std_file(path)
        .map(BufReader::new)
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn read(
    configured: &Utf8Path,
    srid: Srid,
    normalizer: GeometryNormalizer,
    target: Target,
) -> Result<RawRecords, SourceError> {
    let shp = shape_path(configured);
    let dbf = shp.with_extension("dbf");
    let shapefile_error = |source| SourceError::Shapefile {
        path: shp.clone(),
        source,
    };

    let shapes = ShapeReader::new(open(&shp)?).map_err(shapefile_error)?;
    let table = dbase::Reader::new(open(&dbf)?)
        .map_err(|err| shapefile_error(::shapefile::Error::from(err)))?;
    let names: Vec<String> = table
        .fields()
        .iter()
        .map(|field| field.name().to_owned())
        .collect();
    let rows = Reader::new(shapes, table).read().map_err(shapefile_error)?;
    log::debug!("read {} shapes from {shp}", rows.len());

    Ok(Box::new(rows.into_iter().enumerate().map(
        move |(index, (shape, attributes))| {
            let mut record = RawRecord::new(srid);
            for name in &names {
                record.push(name, attributes.get(name).map_or(RawValue::Null, raw_value));
            }
            attach(&mut record, shape, normalizer, srid, target).map_err(|source| {
                SourceError::Geometry {
                    record: index + 1,
                    source,
                }
            })?;
            Ok(record)
        },
    )))
}

fn attach(
    record: &mut RawRecord,
    shape: Shape,
    normalizer: GeometryNormalizer,
    srid: Srid,
    target: Target,
) -> Result<(), GeometryError> {
    if matches!(shape, Shape::NullShape) {
        return Ok(());
    }
    let geometry = SourceGeometry::from(shape);
    let raw = match target {
        Target::Boundary => RawGeometry::Boundary(normalizer.boundary(&geometry, srid)?),
        Target::Location => RawGeometry::Location(normalizer.location(&geometry, srid)?),
    };
    record.set_geometry(raw);
    Ok(())
}

fn raw_value(value: &FieldValue) -> RawValue {
    match value {
        FieldValue::Character(text) => text.as_deref().map(str::trim).into(),
        FieldValue::Memo(text) => text.trim().into(),
        FieldValue::Numeric(number) => (*number).into(),
        FieldValue::Float(number) => number.map(f64::from).into(),
        FieldValue::Integer(number) => i64::from(*number).into(),
        FieldValue::Double(number) | FieldValue::Currency(number) => (*number).into(),
        FieldValue::Logical(flag) => (*flag).into(),
        FieldValue::Date(date) => date
            .map(|d| format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
            .into(),
        other => {
            log::debug!("ignoring unsupported attribute value {other:?}");
            RawValue::Null
        }
    }
}
