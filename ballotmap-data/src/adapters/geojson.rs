//! GeoJSON feature collection districts.

use ::geojson::{Feature, FeatureCollection, GeoJson, feature::Id};
use ballotmap_core::{RawGeometry, RawRecord, RawValue, Srid};
use log::{debug, warn};
use serde_json::Value;

use super::{RawRecords, SourceContext, SourceError, require_file};
use crate::geometry::{GeometryError, GeometryNormalizer, SourceGeometry};

pub(super) fn read_districts(context: &SourceContext<'_>) -> Result<RawRecords, SourceError> {
    let path = context.config.districts_path();
    require_file(&path)?;
    let text = ballotmap_fs::read_to_string(&path).map_err(|source| SourceError::Io {
        path: path.clone(),
        source,
    })?;
    let parsed: GeoJson = text.parse().map_err(|source| SourceError::GeoJson {
        path: path.clone(),
        source,
    })?;
    let GeoJson::FeatureCollection(collection) = parsed else {
        return Err(SourceError::NotFeatureCollection { path });
    };

    let srid = match legacy_crs(&collection) {
        Some(declared) => {
            debug!("{path} declares {declared}; overriding {}", context.district_srid());
            declared
        }
        None => context.district_srid(),
    };
    let normalizer = context.normalizer;
    Ok(Box::new(collection.features.into_iter().enumerate().map(
        move |(index, feature)| {
            to_raw(feature, normalizer, srid).map_err(|source| SourceError::Geometry {
                record: index + 1,
                source,
            })
        },
    )))
}

/// Reference named by a pre-RFC 7946 `crs` member, if any.
fn legacy_crs(collection: &FeatureCollection) -> Option<Srid> {
    let name = collection
        .foreign_members
        .as_ref()?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    match name.parse() {
        Ok(srid) => Some(srid),
        Err(err) => {
            warn!("ignoring GeoJSON crs member: {err}");
            None
        }
    }
}

fn to_raw(
    feature: Feature,
    normalizer: GeometryNormalizer,
    srid: Srid,
) -> Result<RawRecord, GeometryError> {
    let mut record = RawRecord::new(srid);
    for (key, value) in feature.properties.into_iter().flatten() {
        record.push(&key, json_value(value));
    }
    if record.get("id").is_none() {
        match feature.id {
            Some(Id::String(id)) => record.push("id", id),
            Some(Id::Number(id)) => record.push("id", json_value(Value::Number(id))),
            None => {}
        }
    }
    if let Some(geometry) = feature.geometry {
        let boundary = normalizer.boundary(&SourceGeometry::from(geometry), srid)?;
        record.set_geometry(RawGeometry::Boundary(boundary));
    }
    Ok(record)
}

fn json_value(value: Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::Bool(flag) => RawValue::Bool(flag),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => RawValue::Integer(integer),
            None => number.as_f64().map_or(RawValue::Null, RawValue::Number),
        },
        Value::String(text) => RawValue::Text(text),
        nested @ (Value::Array(_) | Value::Object(_)) => RawValue::Text(nested.to_string()),
    }
}
