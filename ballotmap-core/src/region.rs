//! Region identifiers and the registry that vouches for them.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a local authority (for example a GSS code such as
/// `E06000038`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionId(String);

/// Errors returned by [`RegionId::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionIdError {
    /// The identifier was empty after trimming.
    #[error("region id must not be empty")]
    Empty,
}

impl RegionId {
    /// Validate and construct a region identifier. Surrounding whitespace is
    /// trimmed.
    pub fn new(value: impl AsRef<str>) -> Result<Self, RegionIdError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(RegionIdError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RegionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RegionId {
    type Error = RegionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RegionId> for String {
    fn from(value: RegionId) -> Self {
        value.0
    }
}

/// Errors raised while resolving a region.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The identifier is well formed but not registered.
    #[error("unknown region {id}")]
    UnknownRegion {
        /// Identifier that failed to resolve.
        id: String,
    },
    /// The identifier was malformed.
    #[error("invalid region id: {source}")]
    InvalidId {
        /// Validation failure.
        #[source]
        source: RegionIdError,
    },
}

/// Lookup of known regions, consulted before any data is cleared.
pub trait RegionRegistry {
    /// Resolve a configured identifier to a registered region.
    fn resolve(&self, id: &str) -> Result<RegionId, RegistryError>;
}

/// Registry backed by a fixed set of identifiers.
///
/// # Examples
/// ```
/// use ballotmap_core::{RegionRegistry, StaticRegionRegistry};
///
/// let registry = StaticRegionRegistry::from_ids(["E06000038"])?;
/// assert!(registry.resolve("E06000038").is_ok());
/// assert!(registry.resolve("S12000042").is_err());
/// # Ok::<(), ballotmap_core::RegionIdError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticRegionRegistry {
    regions: BTreeSet<RegionId>,
}

impl StaticRegionRegistry {
    /// Build a registry from identifier strings.
    pub fn from_ids<I, S>(ids: I) -> Result<Self, RegionIdError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let regions = ids
            .into_iter()
            .map(RegionId::new)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { regions })
    }

    /// Register another region. Returns `false` when it was already present.
    pub fn insert(&mut self, id: RegionId) -> bool {
        self.regions.insert(id)
    }

    /// Iterate the registered regions in order.
    pub fn iter(&self) -> impl Iterator<Item = &RegionId> {
        self.regions.iter()
    }
}

impl RegionRegistry for StaticRegionRegistry {
    fn resolve(&self, id: &str) -> Result<RegionId, RegistryError> {
        let region = RegionId::new(id).map_err(|source| RegistryError::InvalidId { source })?;
        if self.regions.contains(&region) {
            Ok(region)
        } else {
            Err(RegistryError::UnknownRegion {
                id: region.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn registry() -> StaticRegionRegistry {
        StaticRegionRegistry::from_ids(["E06000038", "S12000042"]).expect("valid ids")
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn rejects_blank_ids(#[case] raw: &str) {
        assert_eq!(RegionId::new(raw), Err(RegionIdError::Empty));
    }

    #[rstest]
    fn trims_ids() {
        let id = RegionId::new("  E07000067 ").expect("valid id");
        assert_eq!(id.as_str(), "E07000067");
    }

    #[rstest]
    fn resolves_known_regions(registry: StaticRegionRegistry) {
        let region = registry.resolve(" S12000042").expect("known region");
        assert_eq!(region.as_str(), "S12000042");
    }

    #[rstest]
    fn reports_unknown_and_invalid_regions(registry: StaticRegionRegistry) {
        assert_eq!(
            registry.resolve("E07000234"),
            Err(RegistryError::UnknownRegion {
                id: "E07000234".into()
            })
        );
        assert!(matches!(
            registry.resolve(""),
            Err(RegistryError::InvalidId { .. })
        ));
    }

    #[rstest]
    fn deserializes_through_validation() {
        let id: RegionId = serde_json::from_str("\"X01000000\"").expect("valid id");
        assert_eq!(id.as_str(), "X01000000");
        assert!(serde_json::from_str::<RegionId>("\"\"").is_err());
    }
}
