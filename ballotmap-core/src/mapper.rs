//! Region mapper contract.
//!
//! A region mapper turns raw source records into canonical field sets. It is
//! a pure function pair: no I/O, no shared mutation, and the same input
//! always produces the same output. Returning `Ok(None)` skips the record.

use thiserror::Error;

use crate::{Boundary, Location, RawRecord, RegionId};

/// Canonical district fields produced by a mapper.
///
/// `region_id` may be left empty; the importer fills in the region being
/// imported. `boundary` may also be left empty when the adapter attached
/// geometry to the raw record.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictFields {
    /// Region reference, usually left for the importer to inject.
    pub region_id: Option<RegionId>,
    /// Source identifier of the district.
    pub internal_region_id: String,
    /// Display name.
    pub name: String,
    /// Explicit boundary overriding the raw record geometry.
    pub boundary: Option<Boundary>,
}

impl DistrictFields {
    /// Fields with the identifier and name set and everything else inferred.
    pub fn new(internal_region_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            region_id: None,
            internal_region_id: internal_region_id.into(),
            name: name.into(),
            boundary: None,
        }
    }

    /// Set an explicit region reference.
    #[must_use]
    pub fn with_region(mut self, region_id: RegionId) -> Self {
        self.region_id = Some(region_id);
        self
    }

    /// Set an explicit boundary.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = Some(boundary);
        self
    }
}

/// Canonical station fields produced by a mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct StationFields {
    /// Region reference, usually left for the importer to inject.
    pub region_id: Option<RegionId>,
    /// Source identifier of the station.
    pub internal_region_id: String,
    /// Postcode or placeholder.
    pub postcode: String,
    /// Multi-line address.
    pub address: String,
    /// Explicit location overriding the raw record geometry.
    pub location: Option<Location>,
}

impl StationFields {
    /// Fields with identifier, postcode and address set.
    pub fn new(
        internal_region_id: impl Into<String>,
        postcode: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            region_id: None,
            internal_region_id: internal_region_id.into(),
            postcode: postcode.into(),
            address: address.into(),
            location: None,
        }
    }

    /// Set an explicit region reference.
    #[must_use]
    pub fn with_region(mut self, region_id: RegionId) -> Self {
        self.region_id = Some(region_id);
        self
    }

    /// Set an explicit location.
    #[must_use]
    pub const fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// Errors a mapper may raise; all of them abort the import.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    /// A named field was absent or null.
    #[error("field `{field}` is missing")]
    MissingField {
        /// Normalized field name.
        field: String,
    },
    /// A positional field was out of range.
    #[error("field #{index} is missing; record has {len} fields")]
    MissingPosition {
        /// Requested position.
        index: usize,
        /// Number of fields in the record.
        len: usize,
    },
    /// A field could not be read as a finite number.
    #[error("field `{field}` is not a number: {value:?}")]
    InvalidNumber {
        /// Normalized field name.
        field: String,
        /// Offending text.
        value: String,
    },
    /// The mapper assigned a record to a different region.
    #[error("record belongs to region {found}, expected {expected}")]
    RegionMismatch {
        /// Region being imported.
        expected: RegionId,
        /// Region named by the mapper.
        found: RegionId,
    },
    /// Any other mapper-specific rejection.
    #[error("{message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

/// Region-specific translation from raw records to canonical fields.
///
/// # Examples
/// ```
/// use ballotmap_core::{
///     DistrictFields, MappingError, RawRecord, RegionMapper, StationFields,
///     postcode_from_address, address_lines,
/// };
///
/// struct Example;
///
/// impl RegionMapper for Example {
///     fn map_district(&self, raw: &RawRecord) -> Result<Option<DistrictFields>, MappingError> {
///         Ok(Some(DistrictFields::new(raw.require("code")?, raw.require("name")?)))
///     }
///
///     fn map_station(&self, raw: &RawRecord) -> Result<Option<StationFields>, MappingError> {
///         let address = raw.require("address")?;
///         if address.is_empty() {
///             return Ok(None);
///         }
///         Ok(Some(StationFields::new(
///             raw.require("id")?,
///             postcode_from_address(&address),
///             address_lines(&address),
///         )))
///     }
/// }
/// ```
pub trait RegionMapper: Send + Sync {
    /// Map a raw district record, or return `Ok(None)` to skip it.
    fn map_district(&self, raw: &RawRecord) -> Result<Option<DistrictFields>, MappingError>;

    /// Map a raw station record, or return `Ok(None)` to skip it.
    fn map_station(&self, raw: &RawRecord) -> Result<Option<StationFields>, MappingError>;
}

/// Last comma-separated segment of a one-line address, trimmed.
///
/// ```
/// use ballotmap_core::postcode_from_address;
///
/// assert_eq!(postcode_from_address("Town Hall, Market Place, RG1 1AA"), "RG1 1AA");
/// ```
pub fn postcode_from_address(address: &str) -> String {
    address
        .rsplit(',')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_owned()
}

/// All but the last comma-separated segment, one per line.
///
/// ```
/// use ballotmap_core::address_lines;
///
/// assert_eq!(address_lines("Town Hall, Market Place, RG1 1AA"), "Town Hall\nMarket Place");
/// ```
pub fn address_lines(address: &str) -> String {
    let segments: Vec<&str> = address.split(',').map(str::trim).collect();
    match segments.split_last() {
        Some((_, rest)) => rest.join("\n"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Hall, Road, AB1 2CD", "AB1 2CD")]
    #[case("AB1 2CD", "AB1 2CD")]
    #[case("Hall, ", "")]
    #[case("", "")]
    fn extracts_postcodes(#[case] address: &str, #[case] expected: &str) {
        assert_eq!(postcode_from_address(address), expected);
    }

    #[rstest]
    #[case("Hall, Road, AB1 2CD", "Hall\nRoad")]
    #[case("AB1 2CD", "")]
    #[case(" Hall ,Road,X", "Hall\nRoad")]
    fn splits_address_lines(#[case] address: &str, #[case] expected: &str) {
        assert_eq!(address_lines(address), expected);
    }

    #[rstest]
    fn builders_fill_optional_parts() {
        let region = RegionId::new("X01000000").expect("valid region");
        let fields = StationFields::new("1", "", "Hall").with_region(region.clone());
        assert_eq!(fields.region_id, Some(region));
        assert!(fields.location.is_none());
    }
}
