//! Raw source records handed from format adapters to region mappers.
//!
//! A [`RawRecord`] keeps the column order of its source, so mappers can
//! address values either by normalized name or by position.

use std::{fmt, ops::Range};

use geo::Point;

use crate::{Boundary, Location, MappingError, Srid};

/// Normalize a source column name: strip `.`, `(` and `)`, trim, lowercase,
/// and replace spaces with underscores.
///
/// The function is idempotent.
///
/// # Examples
/// ```
/// use ballotmap_core::normalise_field_name;
///
/// assert_eq!(normalise_field_name(" Polling Place (Name) "), "polling_place_name");
/// assert_eq!(normalise_field_name("Addr. Line 1"), "addr_line_1");
/// ```
pub fn normalise_field_name(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !matches!(c, '.' | '(' | ')'))
        .collect();
    stripped.trim().to_lowercase().replace(' ', "_")
}

/// Value of one raw field.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Missing or null value.
    Null,
    /// Character data.
    Text(String),
    /// Whole number.
    Integer(i64),
    /// Floating point number.
    Number(f64),
    /// Logical value.
    Bool(bool),
}

impl RawValue {
    /// Borrow the text when the value is [`RawValue::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Interpret the value as a number, parsing text when necessary.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            Self::Null | Self::Bool(_) => None,
        }
    }

    /// Report whether the value is null or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

/// Text rendering used by mappers; whole floating point numbers drop their
/// fractional part so DBF numeric ids print as `12`, not `12.0`.
impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(text) => f.write_str(text),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1.0e15 => {
                write!(f, "{value:.0}")
            }
            Self::Number(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Geometry already normalized by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum RawGeometry {
    /// Polygonal geometry for districts.
    Boundary(Boundary),
    /// Point geometry for stations.
    Location(Location),
}

/// One source row or feature.
///
/// # Examples
/// ```
/// use ballotmap_core::{RawRecord, RawValue, Srid};
///
/// let raw = RawRecord::new(Srid::BRITISH_NATIONAL_GRID)
///     .with_field("Polling Place ID", "12")
///     .with_field("Postcode", "RG1 1AA");
/// assert_eq!(raw.get("polling_place_id"), Some(&RawValue::from("12")));
/// assert_eq!(raw.last(), Some(&RawValue::from("RG1 1AA")));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, RawValue)>,
    geometry: Option<RawGeometry>,
    source_srid: Srid,
}

impl RawRecord {
    /// Create an empty record whose coordinate columns use `source_srid`.
    pub const fn new(source_srid: Srid) -> Self {
        Self {
            fields: Vec::new(),
            geometry: None,
            source_srid,
        }
    }

    /// Append a field, normalizing its name. A repeated name overwrites the
    /// earlier value in place.
    pub fn push(&mut self, name: &str, value: impl Into<RawValue>) {
        let key = normalise_field_name(name);
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(existing, _)| *existing == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }

    /// Builder form of [`RawRecord::push`].
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<RawValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Attach normalized geometry.
    pub fn set_geometry(&mut self, geometry: RawGeometry) {
        self.geometry = Some(geometry);
    }

    /// Builder form of [`RawRecord::set_geometry`].
    #[must_use]
    pub fn with_geometry(mut self, geometry: RawGeometry) -> Self {
        self.set_geometry(geometry);
        self
    }

    /// Look a field up by name; the query is normalized first.
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        let key = normalise_field_name(name);
        self.fields
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, value)| value)
    }

    /// Value at `index` in source column order.
    pub fn nth(&self, index: usize) -> Option<&RawValue> {
        self.fields.get(index).map(|(_, value)| value)
    }

    /// First value in source order.
    pub fn first(&self) -> Option<&RawValue> {
        self.nth(0)
    }

    /// Last value in source order.
    pub fn last(&self) -> Option<&RawValue> {
        self.fields.last().map(|(_, value)| value)
    }

    /// Values in a positional range, or `None` when the range overruns.
    pub fn range(&self, range: Range<usize>) -> Option<impl Iterator<Item = &RawValue>> {
        self.fields
            .get(range)
            .map(|slice| slice.iter().map(|(_, value)| value))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Report whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate `(name, value)` pairs in source order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Geometry attached by the adapter, if any.
    pub const fn geometry(&self) -> Option<&RawGeometry> {
        self.geometry.as_ref()
    }

    /// Attached boundary, if the geometry is polygonal.
    pub const fn boundary(&self) -> Option<&Boundary> {
        match &self.geometry {
            Some(RawGeometry::Boundary(boundary)) => Some(boundary),
            _ => None,
        }
    }

    /// Attached location, if the geometry is a point.
    pub const fn location(&self) -> Option<&Location> {
        match &self.geometry {
            Some(RawGeometry::Location(location)) => Some(location),
            _ => None,
        }
    }

    /// Reference declared for the source's coordinate columns.
    pub const fn source_srid(&self) -> Srid {
        self.source_srid
    }

    /// Text of a named field; missing and null fields are errors.
    pub fn require(&self, name: &str) -> Result<String, MappingError> {
        match self.get(name) {
            Some(RawValue::Null) | None => Err(MappingError::MissingField {
                field: normalise_field_name(name),
            }),
            Some(value) => Ok(value.to_string()),
        }
    }

    /// Text of the field at `index`.
    pub fn require_nth(&self, index: usize) -> Result<String, MappingError> {
        self.nth(index)
            .map(ToString::to_string)
            .ok_or(MappingError::MissingPosition {
                index,
                len: self.len(),
            })
    }

    /// Text of the last field.
    pub fn require_last(&self) -> Result<String, MappingError> {
        self.last()
            .map(ToString::to_string)
            .ok_or(MappingError::MissingPosition { index: 0, len: 0 })
    }

    /// Numeric value of a named field.
    pub fn require_f64(&self, name: &str) -> Result<f64, MappingError> {
        let text = self.require(name)?;
        self.get(name)
            .and_then(RawValue::as_f64)
            .filter(|value| value.is_finite())
            .ok_or_else(|| MappingError::InvalidNumber {
                field: normalise_field_name(name),
                value: text,
            })
    }

    /// Build a point from two coordinate columns in the record's source
    /// reference.
    pub fn point(&self, x_field: &str, y_field: &str) -> Result<Location, MappingError> {
        let x = self.require_f64(x_field)?;
        let y = self.require_f64(y_field)?;
        Ok(Location::new(self.source_srid, Point::new(x, y)))
    }
}
