//! Coordinate reference identifiers and reprojection between them.
//!
//! Each supported reference maps to a PROJ.4 definition, and conversions are
//! delegated to `proj4rs`. Geographic coordinates use `x = longitude`,
//! `y = latitude`, in degrees.
//!
//! Supported references:
//! - EPSG:4326, WGS84 longitude/latitude.
//! - EPSG:27700, OSGB36 British National Grid (easting/northing in metres),
//!   with the seven-parameter Helmert shift to WGS84.
//! - EPSG:3857, spherical Web Mercator (metres).

use std::{fmt, str::FromStr};

use geo::Coord;
use proj4rs::proj::Proj;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const WGS84_DEFINITION: &str = "+proj=longlat +datum=WGS84 +no_defs";

const NATIONAL_GRID_DEFINITION: &str = concat!(
    "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 +x_0=400000 +y_0=-100000",
    " +ellps=airy +towgs84=446.448,-125.157,542.06,0.15,0.247,0.842,-20.489",
    " +units=m +no_defs",
);

const WEB_MERCATOR_DEFINITION: &str = concat!(
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1",
    " +units=m +nadgrids=@null +wktext +no_defs",
);

/// Latitude at which the Web Mercator square ends, in degrees.
const WEB_MERCATOR_MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Spatial reference identifier (EPSG code) attached to every geometry.
///
/// # Examples
/// ```
/// use ballotmap_core::Srid;
///
/// let srid: Srid = "urn:ogc:def:crs:EPSG::27700".parse().unwrap();
/// assert_eq!(srid, Srid::BRITISH_NATIONAL_GRID);
/// assert_eq!(srid.to_string(), "EPSG:27700");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "SridRepr", into = "u32")]
pub struct Srid(u32);

impl Srid {
    /// WGS84 longitude/latitude in degrees.
    pub const WGS84: Self = Self(4326);
    /// OSGB36 British National Grid.
    pub const BRITISH_NATIONAL_GRID: Self = Self(27700);
    /// Spherical Web Mercator.
    pub const WEB_MERCATOR: Self = Self(3857);

    /// Wrap a raw EPSG code. Unsupported codes are accepted here and rejected
    /// when a reprojection is attempted.
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    /// Return the EPSG code.
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Report whether [`transform`] can convert to and from this reference.
    pub const fn is_supported(self) -> bool {
        self.definition().is_some()
    }

    /// PROJ.4 definition of the reference, if supported.
    pub const fn definition(self) -> Option<&'static str> {
        match self.0 {
            4326 => Some(WGS84_DEFINITION),
            27700 => Some(NATIONAL_GRID_DEFINITION),
            3857 => Some(WEB_MERCATOR_DEFINITION),
            _ => None,
        }
    }

    const fn is_geographic(self) -> bool {
        self.0 == Self::WGS84.0
    }
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl From<Srid> for u32 {
    fn from(srid: Srid) -> Self {
        srid.0
    }
}

impl FromStr for Srid {
    type Err = CrsError;

    /// Parse `4326`, `EPSG:4326`, `urn:ogc:def:crs:EPSG::4326` or the
    /// `CRS84` aliases.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let upper = trimmed.to_ascii_uppercase();
        if upper == "CRS84" || upper.ends_with(":CRS84") {
            return Ok(Self::WGS84);
        }

        let code = if let Some(rest) = upper.strip_prefix("EPSG:") {
            rest
        } else if let Some(rest) = upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:") {
            rest.rsplit(':').next().unwrap_or(rest)
        } else {
            upper.as_str()
        };

        code.parse::<u32>()
            .map(Self)
            .map_err(|_| CrsError::UnrecognisedReference {
                value: trimmed.to_owned(),
            })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SridRepr {
    Code(u32),
    Name(String),
}

impl TryFrom<SridRepr> for Srid {
    type Error = CrsError;

    fn try_from(repr: SridRepr) -> Result<Self, Self::Error> {
        match repr {
            SridRepr::Code(code) => Ok(Self(code)),
            SridRepr::Name(name) => name.parse(),
        }
    }
}

/// Errors raised while parsing references or reprojecting coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CrsError {
    /// No conversion is implemented for the reference.
    #[error("unsupported coordinate reference {srid}")]
    Unsupported {
        /// Reference that could not be converted.
        srid: Srid,
    },
    /// A textual reference could not be parsed.
    #[error("unrecognised coordinate reference {value:?}")]
    UnrecognisedReference {
        /// Text that failed to parse.
        value: String,
    },
    /// An input or output coordinate was NaN or infinite.
    #[error("coordinate ({x}, {y}) is not finite")]
    NonFinite {
        /// Easting or longitude.
        x: f64,
        /// Northing or latitude.
        y: f64,
    },
    /// The projection library rejected a definition or a coordinate.
    #[error("failed to convert from {from} to {to}: {message}")]
    Projection {
        /// Source reference.
        from: Srid,
        /// Target reference.
        to: Srid,
        /// Library message.
        message: String,
    },
    /// A coordinate fell outside the domain of the reference.
    #[error("coordinate ({x}, {y}) lies outside the valid range of {srid}")]
    OutOfRange {
        /// Reference whose domain was violated.
        srid: Srid,
        /// Easting or longitude.
        x: f64,
        /// Northing or latitude.
        y: f64,
    },
}

/// A prepared conversion between two references.
///
/// Parsing the definitions happens once, so convert whole geometries through
/// one value rather than calling [`transform`] per coordinate.
pub struct Reprojection {
    from: Srid,
    to: Srid,
    projections: Option<(Proj, Proj)>,
}

impl Reprojection {
    /// Prepare a conversion from `from` to `to`.
    ///
    /// # Errors
    /// [`CrsError::Unsupported`] when either reference has no definition.
    pub fn new(from: Srid, to: Srid) -> Result<Self, CrsError> {
        if from == to {
            return Ok(Self {
                from,
                to,
                projections: None,
            });
        }
        let source = projection(from, from, to)?;
        let target = projection(to, from, to)?;
        Ok(Self {
            from,
            to,
            projections: Some((source, target)),
        })
    }

    /// Convert one coordinate.
    ///
    /// # Errors
    /// Non-finite input or output, coordinates outside the domain of either
    /// reference, or a failure inside the projection library.
    pub fn apply(&self, coord: Coord<f64>) -> Result<Coord<f64>, CrsError> {
        ensure_finite(coord)?;
        let Some((source, target)) = &self.projections else {
            return Ok(coord);
        };
        if self.from.is_geographic() {
            ensure_geographic(coord)?;
            if self.to == Srid::WEB_MERCATOR && coord.y.abs() > WEB_MERCATOR_MAX_LATITUDE {
                return Err(CrsError::OutOfRange {
                    srid: self.to,
                    x: coord.x,
                    y: coord.y,
                });
            }
        }
        let mut point = if self.from.is_geographic() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        proj4rs::transform::transform(source, target, &mut point).map_err(|err| {
            CrsError::Projection {
                from: self.from,
                to: self.to,
                message: err.to_string(),
            }
        })?;
        let converted = if self.to.is_geographic() {
            Coord {
                x: point.0.to_degrees(),
                y: point.1.to_degrees(),
            }
        } else {
            Coord {
                x: point.0,
                y: point.1,
            }
        };
        ensure_finite(converted)?;
        Ok(converted)
    }
}

impl fmt::Debug for Reprojection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reprojection")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

fn projection(srid: Srid, from: Srid, to: Srid) -> Result<Proj, CrsError> {
    let definition = srid.definition().ok_or(CrsError::Unsupported { srid })?;
    Proj::from_proj_string(definition).map_err(|err| CrsError::Projection {
        from,
        to,
        message: err.to_string(),
    })
}

/// Reproject a single coordinate from one reference to another.
///
/// Identical references return the coordinate unchanged, so reprojecting
/// already-normalized geometry is a no-op.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use ballotmap_core::{Srid, crs::transform};
///
/// let grid = transform(Coord { x: -0.1, y: 51.5 }, Srid::WGS84, Srid::BRITISH_NATIONAL_GRID)?;
/// assert!((grid.x - 531_979.3).abs() < 1.0);
/// assert!((grid.y - 179_606.9).abs() < 1.0);
/// # Ok::<(), ballotmap_core::crs::CrsError>(())
/// ```
pub fn transform(coord: Coord<f64>, from: Srid, to: Srid) -> Result<Coord<f64>, CrsError> {
    Reprojection::new(from, to)?.apply(coord)
}

fn ensure_finite(coord: Coord<f64>) -> Result<(), CrsError> {
    if coord.x.is_finite() && coord.y.is_finite() {
        Ok(())
    } else {
        Err(CrsError::NonFinite {
            x: coord.x,
            y: coord.y,
        })
    }
}

fn ensure_geographic(coord: Coord<f64>) -> Result<(), CrsError> {
    if (-180.0..=180.0).contains(&coord.x) && (-90.0..=90.0).contains(&coord.y) {
        Ok(())
    } else {
        Err(CrsError::OutOfRange {
            srid: Srid::WGS84,
            x: coord.x,
            y: coord.y,
        })
    }
}
