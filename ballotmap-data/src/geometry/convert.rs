//! Per-format conversion into validated 2D geometry.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use geojson::{GeoJson, Value};
use shapefile::{PolygonRing, Shape};

use super::{GeometryError, Planar, SourceGeometry};
use crate::kml::{KmlCoord, KmlGeometry, KmlPolygon};

const MIN_RING_POSITIONS: usize = 4;

pub(super) fn to_planar(geometry: &SourceGeometry) -> Result<Planar, GeometryError> {
    match geometry {
        SourceGeometry::Shape(shape) => from_shape(shape),
        SourceGeometry::GeoJson(geometry) => from_geojson(&geometry.value),
        SourceGeometry::Kml(geometry) => from_kml(geometry),
        SourceGeometry::Point(coord) => finite(*coord).map(Planar::Point),
    }
}

/// Parse GeoJSON geometry text, as found in a tabular geometry column.
///
/// Both bare geometry objects and single features are accepted.
pub fn parse_geojson_geometry(text: &str) -> Result<geojson::Geometry, GeometryError> {
    let parsed: GeoJson = text
        .parse()
        .map_err(|err: geojson::Error| GeometryError::InvalidGeoJson {
            message: err.to_string(),
        })?;
    match parsed {
        GeoJson::Geometry(geometry) => Ok(geometry),
        GeoJson::Feature(feature) => feature.geometry.ok_or(GeometryError::Empty),
        GeoJson::FeatureCollection(_) => Err(GeometryError::InvalidGeoJson {
            message: "expected a geometry, found a feature collection".into(),
        }),
    }
}

fn finite(coord: Coord<f64>) -> Result<Coord<f64>, GeometryError> {
    if coord.x.is_finite() && coord.y.is_finite() {
        Ok(coord)
    } else {
        Err(GeometryError::NonFinite {
            x: coord.x,
            y: coord.y,
        })
    }
}

fn check_ring(coords: &[Coord<f64>]) -> Result<(), GeometryError> {
    if coords.len() < MIN_RING_POSITIONS {
        return Err(GeometryError::RingTooShort {
            positions: coords.len(),
        });
    }
    for coord in coords {
        finite(*coord)?;
    }
    if coords.first() != coords.last() {
        return Err(GeometryError::UnclosedRing);
    }
    Ok(())
}

/// Validate a ring's coordinates and close over them as a line string.
fn ring(coords: Vec<Coord<f64>>) -> Result<LineString<f64>, GeometryError> {
    check_ring(&coords)?;
    Ok(LineString::new(coords))
}

/// Apply the source checks to a multi-polygon built elsewhere, such as one
/// supplied by a region mapper.
pub(super) fn check_polygons(multi: &MultiPolygon<f64>) -> Result<(), GeometryError> {
    if multi.0.is_empty() {
        return Err(GeometryError::Empty);
    }
    for member in &multi.0 {
        check_ring(&member.exterior().0)?;
        for interior in member.interiors() {
            check_ring(&interior.0)?;
        }
    }
    Ok(())
}

pub(super) fn check_point(coord: Coord<f64>) -> Result<(), GeometryError> {
    finite(coord).map(|_| ())
}

fn polygon(mut rings: Vec<Vec<Coord<f64>>>) -> Result<Polygon<f64>, GeometryError> {
    if rings.is_empty() {
        return Err(GeometryError::NoRings);
    }
    let exterior = ring(rings.remove(0))?;
    let interiors = rings.into_iter().map(ring).collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn polygons(polygons: Vec<Polygon<f64>>) -> Result<Planar, GeometryError> {
    if polygons.is_empty() {
        return Err(GeometryError::Empty);
    }
    Ok(Planar::Polygons(MultiPolygon(polygons)))
}

// Shapefile

fn from_shape(shape: &Shape) -> Result<Planar, GeometryError> {
    match shape {
        Shape::NullShape => Err(GeometryError::Empty),
        Shape::Point(p) => finite(Coord { x: p.x, y: p.y }).map(Planar::Point),
        Shape::PointM(p) => finite(Coord { x: p.x, y: p.y }).map(Planar::Point),
        Shape::PointZ(p) => finite(Coord { x: p.x, y: p.y }).map(Planar::Point),
        Shape::Multipoint(shape) => single_point(shape.points().iter().map(|p| (p.x, p.y))),
        Shape::MultipointM(shape) => single_point(shape.points().iter().map(|p| (p.x, p.y))),
        Shape::MultipointZ(shape) => single_point(shape.points().iter().map(|p| (p.x, p.y))),
        Shape::Polygon(shape) => shape_rings(shape.rings(), |p| (p.x, p.y)),
        Shape::PolygonM(shape) => shape_rings(shape.rings(), |p| (p.x, p.y)),
        Shape::PolygonZ(shape) => shape_rings(shape.rings(), |p| (p.x, p.y)),
        Shape::Polyline(_) | Shape::PolylineM(_) | Shape::PolylineZ(_) => {
            Err(GeometryError::Unsupported {
                found: "polyline",
                expected: "polygon or point",
            })
        }
        Shape::Multipatch(_) => Err(GeometryError::Unsupported {
            found: "multipatch",
            expected: "polygon or point",
        }),
    }
}

/// A multipoint holding exactly one point; more than one is ambiguous for a
/// station location.
fn single_point(mut points: impl Iterator<Item = (f64, f64)>) -> Result<Planar, GeometryError> {
    let (x, y) = points.next().ok_or(GeometryError::Empty)?;
    if points.next().is_some() {
        return Err(MULTIPLE_POINTS);
    }
    finite(Coord { x, y }).map(Planar::Point)
}

const MULTIPLE_POINTS: GeometryError = GeometryError::Unsupported {
    found: "multipoint with several points",
    expected: "single point",
};

/// Group shapefile rings into polygons: each outer ring opens a polygon and
/// inner rings attach to the most recent one.
fn shape_rings<P>(
    rings: &[PolygonRing<P>],
    xy: impl Fn(&P) -> (f64, f64),
) -> Result<Planar, GeometryError> {
    if rings.is_empty() {
        return Err(GeometryError::NoRings);
    }
    let to_coords = |points: &[P]| -> Vec<Coord<f64>> {
        points
            .iter()
            .map(|p| {
                let (x, y) = xy(p);
                Coord { x, y }
            })
            .collect()
    };

    let mut grouped: Vec<Vec<Vec<Coord<f64>>>> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => grouped.push(vec![to_coords(points)]),
            PolygonRing::Inner(points) => grouped
                .last_mut()
                .ok_or(GeometryError::OrphanInnerRing)?
                .push(to_coords(points)),
        }
    }
    polygons(
        grouped
            .into_iter()
            .map(polygon)
            .collect::<Result<Vec<_>, _>>()?,
    )
}

// GeoJSON

fn position(values: &[f64]) -> Result<Coord<f64>, GeometryError> {
    match values {
        [x, y, ..] => finite(Coord { x: *x, y: *y }),
        _ => Err(GeometryError::DegeneratePoint {
            ordinates: values.len(),
        }),
    }
}

fn geojson_polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>, GeometryError> {
    let rings = rings
        .iter()
        .map(|ring| ring.iter().map(|p| position(p)).collect())
        .collect::<Result<Vec<_>, _>>()?;
    polygon(rings)
}

fn from_geojson(value: &Value) -> Result<Planar, GeometryError> {
    match value {
        Value::Point(p) => position(p).map(Planar::Point),
        Value::MultiPoint(points) => match points.as_slice() {
            [] => Err(GeometryError::Empty),
            [point] => position(point).map(Planar::Point),
            _ => Err(MULTIPLE_POINTS),
        },
        Value::Polygon(rings) => polygons(vec![geojson_polygon(rings)?]),
        Value::MultiPolygon(members) => polygons(
            members
                .iter()
                .map(|rings| geojson_polygon(rings))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::LineString(_) | Value::MultiLineString(_) => Err(GeometryError::Unsupported {
            found: "line string",
            expected: "polygon or point",
        }),
        Value::GeometryCollection(_) => Err(GeometryError::Unsupported {
            found: "geometry collection",
            expected: "polygon or point",
        }),
    }
}

// KML

fn kml_coords(coords: &[KmlCoord]) -> Vec<Coord<f64>> {
    coords.iter().map(|c| Coord { x: c.x, y: c.y }).collect()
}

fn kml_polygon(polygon_geometry: &KmlPolygon) -> Result<Polygon<f64>, GeometryError> {
    let mut rings = Vec::with_capacity(1 + polygon_geometry.inner.len());
    rings.push(kml_coords(&polygon_geometry.outer));
    rings.extend(polygon_geometry.inner.iter().map(|ring| kml_coords(ring)));
    polygon(rings)
}

fn collect_kml_polygons(
    geometry: &KmlGeometry,
    out: &mut Vec<Polygon<f64>>,
) -> Result<(), GeometryError> {
    match geometry {
        KmlGeometry::Polygon(polygon_geometry) => out.push(kml_polygon(polygon_geometry)?),
        KmlGeometry::Multi(members) => {
            for member in members {
                collect_kml_polygons(member, out)?;
            }
        }
        KmlGeometry::Point(_) => {}
    }
    Ok(())
}

fn collect_kml_points(geometry: &KmlGeometry, out: &mut Vec<KmlCoord>) {
    match geometry {
        KmlGeometry::Point(coord) => out.push(*coord),
        KmlGeometry::Multi(members) => {
            for member in members {
                collect_kml_points(member, out);
            }
        }
        KmlGeometry::Polygon(_) => {}
    }
}

fn from_kml(geometry: &KmlGeometry) -> Result<Planar, GeometryError> {
    let mut found = Vec::new();
    collect_kml_polygons(geometry, &mut found)?;
    if !found.is_empty() {
        return polygons(found);
    }
    let mut points = Vec::new();
    collect_kml_points(geometry, &mut points);
    single_point(points.iter().map(|point| (point.x, point.y)))
}
