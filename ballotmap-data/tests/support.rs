//! Shared helpers for the import behaviour tests.

use base64::{Engine as _, engine::general_purpose};
use ballotmap_core::{
    DistrictFields, MappingError, RawRecord, RegionId, RegionMapper, Srid, StationFields,
};
use ballotmap_data::{FormatFamily, RegionConfig, RegionPlugin};
use camino::{Utf8Path, Utf8PathBuf};
use std::{fs, path::Path};

/// Region used by the JSON importer fixtures.
pub const STUB_REGION: &str = "X01000000";

/// Tolerance for coordinates that went through a datum shift.
const COORDINATE_EPSILON: f64 = 1.0e-6;

/// Directory containing the fixture files.
pub fn fixtures_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Copy a plain fixture into `dir`, keeping its file name.
pub fn copy_fixture(dir: &Path, relative: &str) -> Utf8PathBuf {
    let source = fixtures_dir().join(relative);
    let name = source.file_name().expect("fixture file name");
    let target = utf8(dir).join(name);
    fs::copy(&source, &target).unwrap_or_else(|err| {
        panic!("failed to copy fixture {source}: {err}");
    });
    target
}

/// Decode a Base64-encoded fixture `relative.b64` into `dir` under its
/// original name.
pub fn decode_fixture(dir: &Path, relative: &str) -> Utf8PathBuf {
    let encoded_path = fixtures_dir().join(format!("{relative}.b64"));
    let encoded = fs::read_to_string(&encoded_path).unwrap_or_else(|err| {
        panic!("failed to read base64 fixture {encoded_path}: {err}");
    });
    let cleaned: String = encoded
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    let decoded = general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .unwrap_or_else(|err| {
            panic!("failed to decode base64 fixture {encoded_path}: {err}");
        });
    let name = Utf8Path::new(relative).file_name().expect("fixture file name");
    let target = utf8(dir).join(name);
    fs::write(&target, decoded).unwrap_or_else(|err| {
        panic!("failed to write decoded fixture {target}: {err}");
    });
    target
}

/// View a temporary directory as a UTF-8 path.
pub fn utf8(dir: &Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.to_path_buf()).expect("utf-8 temp dir")
}

/// Compare floating-point coordinates within a small epsilon.
pub fn assert_close(actual: f64, expected: f64) {
    let delta = (actual - expected).abs();
    assert!(
        delta <= COORDINATE_EPSILON,
        "expected {expected}, got {actual} (|Δ| = {delta})"
    );
}

/// Mapper for the JSON importer fixtures. Stations whose id is listed in
/// `skipped_stations` are dropped.
#[derive(Debug, Default)]
pub struct StubMapper {
    pub skipped_stations: Vec<String>,
}

impl RegionMapper for StubMapper {
    fn map_district(&self, raw: &RawRecord) -> Result<Option<DistrictFields>, MappingError> {
        Ok(Some(DistrictFields::new(raw.require("id")?, raw.require("name")?)))
    }

    fn map_station(&self, raw: &RawRecord) -> Result<Option<StationFields>, MappingError> {
        let id = raw.require("internal_council_id")?;
        if self.skipped_stations.contains(&id) {
            return Ok(None);
        }
        let location = raw.point("lng", "lat")?;
        Ok(Some(
            StationFields::new(id, raw.require("postcode")?, raw.require("address")?)
                .with_location(location),
        ))
    }
}

/// Stub region configuration reading `test.*` sources from `base_dir`.
pub fn stub_config(base_dir: &Utf8Path, format: FormatFamily, districts: &str) -> RegionConfig {
    let region = RegionId::new(STUB_REGION).expect("stub region id");
    RegionConfig::new(region, format, base_dir)
        .with_districts_name(districts)
        .with_stations_name("test.csv")
        .with_srid(Srid::WGS84)
}

/// Plugin for the stub region.
pub fn stub_plugin(base_dir: &Utf8Path, format: FormatFamily, districts: &str, mapper: StubMapper) -> RegionPlugin {
    RegionPlugin::new(stub_config(base_dir, format, districts), mapper)
}
