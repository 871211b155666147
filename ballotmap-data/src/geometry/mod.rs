//! Geometry normalization.
//!
//! Source geometry arrives as shapefile shapes, GeoJSON values, KML
//! placemark geometry or bare coordinates. [`GeometryNormalizer`] validates
//! it, flattens it to 2D, promotes single polygons to multi-polygons and
//! reprojects the result into the configured output reference. Malformed
//! input is rejected; nothing is repaired.

mod convert;

use ballotmap_core::{Boundary, CrsError, Location, Reprojection, Srid, crs};
use geo::{Coord, MapCoords, MultiPolygon, Point};
use thiserror::Error;

use crate::kml::KmlGeometry;

pub use convert::parse_geojson_geometry;

/// Geometry as read from a source, before validation.
///
/// Multipoints are accepted as locations only when they hold a single point.
pub enum SourceGeometry {
    /// ESRI shapefile shape, including M and Z variants.
    Shape(shapefile::Shape),
    /// GeoJSON geometry object.
    GeoJson(geojson::Geometry),
    /// KML placemark geometry, possibly with altitude.
    Kml(KmlGeometry),
    /// Bare coordinate pair.
    Point(Coord<f64>),
}

impl From<shapefile::Shape> for SourceGeometry {
    fn from(value: shapefile::Shape) -> Self {
        Self::Shape(value)
    }
}

impl From<geojson::Geometry> for SourceGeometry {
    fn from(value: geojson::Geometry) -> Self {
        Self::GeoJson(value)
    }
}

impl From<KmlGeometry> for SourceGeometry {
    fn from(value: KmlGeometry) -> Self {
        Self::Kml(value)
    }
}

/// Errors raised for malformed or unsupported geometry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The geometry contained no polygons or points.
    #[error("geometry is empty")]
    Empty,
    /// A polygon had no rings.
    #[error("polygon has no rings")]
    NoRings,
    /// A ring had fewer than four positions.
    #[error("ring has {positions} positions; at least 4 are required")]
    RingTooShort {
        /// Number of positions found.
        positions: usize,
    },
    /// A ring's first and last positions differ.
    #[error("ring is not closed")]
    UnclosedRing,
    /// A coordinate was NaN or infinite.
    #[error("coordinate ({x}, {y}) is not finite")]
    NonFinite {
        /// First ordinate.
        x: f64,
        /// Second ordinate.
        y: f64,
    },
    /// A position had fewer than two ordinates.
    #[error("position has {ordinates} ordinates; at least 2 are required")]
    DegeneratePoint {
        /// Number of ordinates found.
        ordinates: usize,
    },
    /// An inner ring appeared before any outer ring.
    #[error("inner ring has no enclosing outer ring")]
    OrphanInnerRing,
    /// The geometry type cannot be used for the requested record.
    #[error("unsupported {found} geometry where a {expected} was expected")]
    Unsupported {
        /// Geometry type found.
        found: &'static str,
        /// Geometry type required.
        expected: &'static str,
    },
    /// A district had neither mapped nor source geometry.
    #[error("district has no boundary geometry")]
    MissingBoundary,
    /// Reprojection failed.
    #[error("reprojection failed: {0}")]
    Reproject(#[from] CrsError),
    /// Geometry text was not valid GeoJSON geometry.
    #[error("invalid GeoJSON geometry: {message}")]
    InvalidGeoJson {
        /// Parser message.
        message: String,
    },
}

/// 2D geometry after conversion and validation, still in the source
/// reference.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Planar {
    Polygons(MultiPolygon<f64>),
    Point(Coord<f64>),
}

impl Planar {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Polygons(_) => "polygon",
            Self::Point(_) => "point",
        }
    }
}

/// Converts source geometry into tagged boundaries and locations in one
/// output reference.
///
/// # Examples
/// ```
/// use ballotmap_core::Srid;
/// use ballotmap_data::geometry::{GeometryNormalizer, SourceGeometry};
/// use geo::Coord;
///
/// let normalizer = GeometryNormalizer::new(Srid::WGS84);
/// let grid = SourceGeometry::Point(Coord { x: 531_979.29, y: 179_606.91 });
/// let location = normalizer.location(&grid, Srid::BRITISH_NATIONAL_GRID)?;
/// assert_eq!(location.srid, Srid::WGS84);
/// assert!((location.point.x() + 0.1).abs() < 1.0e-5);
/// # Ok::<(), ballotmap_data::geometry::GeometryError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryNormalizer {
    output: Srid,
}

impl GeometryNormalizer {
    /// Normalizer targeting `output`.
    pub const fn new(output: Srid) -> Self {
        Self { output }
    }

    /// Output reference.
    pub const fn output(&self) -> Srid {
        self.output
    }

    /// Validate polygonal source geometry and reproject it.
    pub fn boundary(
        &self,
        geometry: &SourceGeometry,
        source: Srid,
    ) -> Result<Boundary, GeometryError> {
        match convert::to_planar(geometry)? {
            Planar::Polygons(polygons) => self.project_boundary(Boundary::new(source, polygons)),
            other => Err(GeometryError::Unsupported {
                found: other.kind(),
                expected: "polygon",
            }),
        }
    }

    /// Validate point source geometry and reproject it.
    pub fn location(
        &self,
        geometry: &SourceGeometry,
        source: Srid,
    ) -> Result<Location, GeometryError> {
        match convert::to_planar(geometry)? {
            Planar::Point(coord) => {
                self.project_location(Location::new(source, Point::from(coord)))
            }
            other => Err(GeometryError::Unsupported {
                found: other.kind(),
                expected: "point",
            }),
        }
    }

    /// Validate a tagged boundary and reproject it. The coordinates are left
    /// untouched when it already uses the output reference.
    ///
    /// # Errors
    /// The same [`GeometryError`]s as [`Self::boundary`]: an empty set, short,
    /// open or non-finite rings, or a failed reprojection.
    pub fn reproject_boundary(&self, boundary: Boundary) -> Result<Boundary, GeometryError> {
        convert::check_polygons(&boundary.geometry)?;
        self.project_boundary(boundary)
    }

    /// Validate a tagged location and reproject it. The coordinates are left
    /// untouched when it already uses the output reference.
    ///
    /// # Errors
    /// [`GeometryError::NonFinite`] or a failed reprojection.
    pub fn reproject_location(&self, location: Location) -> Result<Location, GeometryError> {
        convert::check_point(location.point.0)?;
        self.project_location(location)
    }

    fn project_boundary(&self, boundary: Boundary) -> Result<Boundary, GeometryError> {
        if boundary.srid == self.output {
            return Ok(boundary);
        }
        let reprojection = Reprojection::new(boundary.srid, self.output)?;
        let geometry = boundary
            .geometry
            .try_map_coords(|coord| reprojection.apply(coord))?;
        Ok(Boundary::new(self.output, geometry))
    }

    fn project_location(&self, location: Location) -> Result<Location, GeometryError> {
        if location.srid == self.output {
            return Ok(location);
        }
        let coord = crs::transform(location.point.0, location.srid, self.output)?;
        Ok(Location::new(self.output, Point::from(coord)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kml::{KmlCoord, KmlPolygon};
    use geo::{LineString, Polygon, polygon};
    use rstest::{fixture, rstest};

    #[fixture]
    fn normalizer() -> GeometryNormalizer {
        GeometryNormalizer::new(Srid::WGS84)
    }

    fn ring(points: &[(f64, f64)]) -> Vec<Vec<f64>> {
        points.iter().map(|&(x, y)| vec![x, y]).collect()
    }

    fn geojson_polygon(rings: Vec<Vec<Vec<f64>>>) -> SourceGeometry {
        SourceGeometry::GeoJson(geojson::Geometry::new(geojson::Value::Polygon(rings)))
    }

    fn unit_square() -> Vec<Vec<f64>> {
        ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)])
    }

    #[rstest]
    fn promotes_polygons_to_multi_polygons(normalizer: GeometryNormalizer) {
        let boundary = normalizer
            .boundary(&geojson_polygon(vec![unit_square()]), Srid::WGS84)
            .expect("valid polygon");
        let expected: Polygon<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        assert_eq!(boundary.srid, Srid::WGS84);
        assert_eq!(boundary.geometry, MultiPolygon(vec![expected]));
    }

    #[rstest]
    #[case(vec![], GeometryError::NoRings)]
    #[case(
        vec![ring(&[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)])],
        GeometryError::RingTooShort { positions: 3 }
    )]
    #[case(
        vec![ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])],
        GeometryError::UnclosedRing
    )]
    #[case(
        vec![vec![vec![0.0], vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0]]],
        GeometryError::DegeneratePoint { ordinates: 1 }
    )]
    fn rejects_malformed_polygons(
        normalizer: GeometryNormalizer,
        #[case] rings: Vec<Vec<Vec<f64>>>,
        #[case] expected: GeometryError,
    ) {
        let err = normalizer
            .boundary(&geojson_polygon(rings), Srid::WGS84)
            .expect_err("malformed polygon");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn rejects_non_finite_coordinates(normalizer: GeometryNormalizer) {
        let rings = vec![ring(&[
            (0.0, 0.0),
            (f64::INFINITY, 0.0),
            (1.0, 1.0),
            (0.0, 0.0),
        ])];
        let err = normalizer
            .boundary(&geojson_polygon(rings), Srid::WGS84)
            .expect_err("infinite coordinate");
        assert!(matches!(err, GeometryError::NonFinite { .. }));
    }

    #[rstest]
    fn drops_kml_altitude_without_changing_coordinate_count(normalizer: GeometryNormalizer) {
        let outer: Vec<KmlCoord> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]
            .into_iter()
            .map(|(x, y)| KmlCoord { x, y, z: Some(120.0) })
            .collect();
        let geometry = SourceGeometry::Kml(KmlGeometry::Polygon(KmlPolygon {
            outer,
            inner: Vec::new(),
        }));
        let boundary = normalizer
            .boundary(&geometry, Srid::WGS84)
            .expect("3d polygon");
        let exterior = boundary.geometry.0[0].exterior();
        assert_eq!(exterior.0.len(), 4);
        assert_eq!(exterior.0[1], Coord { x: 1.0, y: 0.0 });
    }

    #[rstest]
    fn reprojects_grid_polygons_and_is_idempotent(normalizer: GeometryNormalizer) {
        let grid = ring(&[
            (531_979.29, 179_606.91),
            (532_979.29, 179_606.91),
            (532_979.29, 180_606.91),
            (531_979.29, 179_606.91),
        ]);
        let boundary = normalizer
            .boundary(&geojson_polygon(vec![grid]), Srid::BRITISH_NATIONAL_GRID)
            .expect("grid polygon");
        assert_eq!(boundary.srid, Srid::WGS84);
        let first = boundary.geometry.0[0].exterior().0[0];
        assert!((first.x + 0.1).abs() < 1.0e-5, "lon {}", first.x);
        assert!((first.y - 51.5).abs() < 1.0e-5, "lat {}", first.y);

        let again = normalizer
            .reproject_boundary(boundary.clone())
            .expect("idempotent");
        assert_eq!(again, boundary);
    }

    #[rstest]
    fn validates_tagged_boundaries_already_in_the_output_reference(
        normalizer: GeometryNormalizer,
    ) {
        let open = Polygon::new(LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]), Vec::new());
        assert_eq!(
            normalizer.reproject_boundary(Boundary::new(Srid::WGS84, MultiPolygon(vec![open]))),
            Err(GeometryError::RingTooShort { positions: 3 })
        );
        assert_eq!(
            normalizer.reproject_boundary(Boundary::new(Srid::WGS84, MultiPolygon(Vec::new()))),
            Err(GeometryError::Empty)
        );
    }

    #[rstest]
    fn validates_tagged_locations(normalizer: GeometryNormalizer) {
        let location = Location::new(Srid::WGS84, Point::new(f64::NAN, 51.0));
        assert!(matches!(
            normalizer.reproject_location(location),
            Err(GeometryError::NonFinite { .. })
        ));
    }

    #[rstest]
    fn rejects_kind_mismatches(normalizer: GeometryNormalizer) {
        let point = SourceGeometry::Point(Coord { x: 0.0, y: 0.0 });
        assert_eq!(
            normalizer.boundary(&point, Srid::WGS84),
            Err(GeometryError::Unsupported {
                found: "point",
                expected: "polygon"
            })
        );
        assert!(matches!(
            normalizer.location(&geojson_polygon(vec![unit_square()]), Srid::WGS84),
            Err(GeometryError::Unsupported { .. })
        ));
    }

    #[rstest]
    fn surfaces_reprojection_failures(normalizer: GeometryNormalizer) {
        let point = SourceGeometry::Point(Coord { x: 1.0, y: 2.0 });
        let err = normalizer
            .location(&point, Srid::new(2157))
            .expect_err("unsupported reference");
        assert!(matches!(err, GeometryError::Reproject(CrsError::Unsupported { .. })));
    }
}
