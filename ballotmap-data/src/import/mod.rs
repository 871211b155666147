//! Region import orchestration.
//!
//! An import moves through four states, each represented by its own type so
//! the steps cannot be reordered:
//!
//! 1. `Pending`: the region is resolved through the registry.
//! 2. `Clearing`: the region's stations, then districts, are deleted.
//! 3. `Loading`: districts are read, mapped and written, then stations.
//! 4. `Done`: the report is handed back.
//!
//! Any error aborts the import where it happened. Nothing is rolled back;
//! clearing makes a rerun from scratch safe.

mod report;

use std::error::Error as StdError;

use ballotmap_core::{
    DistrictRecord, MappingError, RawRecord, Record, RecordKind, RecordStore, RegionId,
    RegionMapper, RegionRegistry, RegistryError, StationRecord, UpsertOutcome,
};
use camino::Utf8PathBuf;
use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    adapters::{RawRecords, SourceAdapter, SourceContext, SourceError, adapter_for},
    archive::ArchiveResolver,
    config::{CollisionPolicy, ImportOptions, RegionPlugin},
    geometry::{GeometryError, GeometryNormalizer},
};

pub use report::{ImportReport, Phase, PhaseSummary};

/// Errors that abort a region import.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The registry does not accept the region.
    #[error("region {region} cannot be imported")]
    UnknownRegion {
        /// Region named by the plugin.
        region: RegionId,
        /// Registry failure.
        #[source]
        source: RegistryError,
    },
    /// A source file is missing.
    #[error("{phase} source {path} does not exist")]
    SourceNotFound {
        /// Phase that needed the source.
        phase: Phase,
        /// Expected path.
        path: Utf8PathBuf,
    },
    /// A source could not be parsed.
    #[error("failed to read {phase} source")]
    Source {
        /// Phase being loaded.
        phase: Phase,
        /// Adapter error.
        #[source]
        source: SourceError,
    },
    /// A record's geometry was missing or malformed.
    #[error("invalid {phase} geometry for {}", internal_region_id.as_deref().unwrap_or("an unmapped record"))]
    Geometry {
        /// Phase being loaded.
        phase: Phase,
        /// Identifier of the record; `None` when the adapter rejected the
        /// geometry before the mapper named the record.
        internal_region_id: Option<String>,
        /// Geometry error.
        #[source]
        source: GeometryError,
    },
    /// The region mapper rejected a record.
    #[error("failed to map {phase} record {record}")]
    Mapping {
        /// Phase being loaded.
        phase: Phase,
        /// One-based position of the raw record.
        record: usize,
        /// Mapper error.
        #[source]
        source: MappingError,
    },
    /// The store failed.
    #[error("record store {operation} failed")]
    Storage {
        /// Store operation that failed.
        operation: &'static str,
        /// Backend error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// A key was written twice under [`CollisionPolicy::Fail`].
    #[error("{kind} {internal_region_id} appears more than once")]
    DuplicateKey {
        /// Kind of the repeated record.
        kind: RecordKind,
        /// Repeated identifier.
        internal_region_id: String,
    },
}

impl ImportError {
    fn source_error(phase: Phase, error: SourceError) -> Self {
        match error {
            SourceError::NotFound { path } => Self::SourceNotFound { phase, path },
            SourceError::Geometry { source, .. } => Self::Geometry {
                phase,
                internal_region_id: None,
                source,
            },
            source => Self::Source { phase, source },
        }
    }

    fn storage<E>(operation: &'static str) -> impl FnOnce(E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        move |source| Self::Storage {
            operation,
            source: Box::new(source),
        }
    }

    fn mapping(phase: Phase, record: usize) -> impl FnOnce(MappingError) -> Self {
        move |source| Self::Mapping {
            phase,
            record,
            source,
        }
    }
}

/// Imports regions into a record store.
///
/// # Examples
/// ```no_run
/// use ballotmap_core::{MemoryRecordStore, StaticRegionRegistry};
/// use ballotmap_data::{ImportOptions, Importer, builtin_plugin};
/// use camino::Utf8Path;
///
/// let registry = StaticRegionRegistry::from_ids(["E06000038"])?;
/// let mut store = MemoryRecordStore::default();
/// let plugin = builtin_plugin("E06000038", Utf8Path::new("/data/reading")).expect("built in");
/// let report = Importer::new(&registry, &mut store, ImportOptions::default()).import(&plugin)?;
/// println!("{} districts", report.districts.imported);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Importer<'a, G, T>
where
    G: RegionRegistry + ?Sized,
    T: RecordStore + ?Sized,
{
    registry: &'a G,
    store: &'a mut T,
    options: ImportOptions,
    archives: ArchiveResolver,
}

impl<'a, G, T> Importer<'a, G, T>
where
    G: RegionRegistry + ?Sized,
    T: RecordStore + ?Sized,
{
    /// Importer writing to `store` the regions `registry` accepts.
    pub fn new(registry: &'a G, store: &'a mut T, options: ImportOptions) -> Self {
        let archives = ArchiveResolver::new(options.scratch_dir.clone());
        Self {
            registry,
            store,
            options,
            archives,
        }
    }

    /// Settings in effect.
    pub const fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Replace the region's records with those read from its sources.
    pub fn import(&mut self, plugin: &RegionPlugin) -> Result<ImportReport, ImportError> {
        let context = SourceContext::new(
            &plugin.config,
            GeometryNormalizer::new(self.options.output_srid),
            &self.archives,
        );
        let report = Session::new(plugin)
            .resolve(self.registry)?
            .clear(&mut *self.store)?
            .load(&mut *self.store, &context, self.options.collision)?
            .finish();
        info!(
            "{}: imported {} districts and {} stations",
            report.region, report.districts.imported, report.stations.imported
        );
        Ok(report)
    }
}

/// Name of a session state, used when logging transitions.
trait ImportState {
    const NAME: &'static str;
}

struct Pending;

struct Clearing {
    report: ImportReport,
}

struct Loading {
    report: ImportReport,
}

struct Done {
    report: ImportReport,
}

impl ImportState for Pending {
    const NAME: &'static str = "pending";
}

impl ImportState for Clearing {
    const NAME: &'static str = "clearing";
}

impl ImportState for Loading {
    const NAME: &'static str = "loading";
}

impl ImportState for Done {
    const NAME: &'static str = "done";
}

/// One region import, threaded through its states by value.
struct Session<'p, S: ImportState> {
    plugin: &'p RegionPlugin,
    state: S,
}

fn log_transition<F: ImportState, N: ImportState>(region: &RegionId) {
    info!("{region}: {} -> {}", F::NAME, N::NAME);
}

impl<'p> Session<'p, Pending> {
    const fn new(plugin: &'p RegionPlugin) -> Self {
        Self {
            plugin,
            state: Pending,
        }
    }

    fn resolve<G>(self, registry: &G) -> Result<Session<'p, Clearing>, ImportError>
    where
        G: RegionRegistry + ?Sized,
    {
        let named = &self.plugin.config.region_id;
        let region = registry
            .resolve(named.as_str())
            .map_err(|source| ImportError::UnknownRegion {
                region: named.clone(),
                source,
            })?;
        log_transition::<Pending, Clearing>(&region);
        Ok(Session {
            plugin: self.plugin,
            state: Clearing {
                report: ImportReport::new(region),
            },
        })
    }
}

impl<'p> Session<'p, Clearing> {
    fn clear<T>(self, store: &mut T) -> Result<Session<'p, Loading>, ImportError>
    where
        T: RecordStore + ?Sized,
    {
        let Clearing { mut report } = self.state;
        for phase in [Phase::Stations, Phase::Districts] {
            let removed = store
                .delete_all(phase.kind(), &report.region)
                .map_err(ImportError::storage("delete"))?;
            debug!("{}: removed {removed} existing {phase}", report.region);
            report.phase_mut(phase).record_removed(removed);
        }
        log_transition::<Clearing, Loading>(&report.region);
        Ok(Session {
            plugin: self.plugin,
            state: Loading { report },
        })
    }
}

impl<'p> Session<'p, Loading> {
    fn load<T>(
        self,
        store: &mut T,
        context: &SourceContext<'_>,
        policy: CollisionPolicy,
    ) -> Result<Session<'p, Done>, ImportError>
    where
        T: RecordStore + ?Sized,
    {
        let Loading { mut report } = self.state;
        let region = report.region.clone();
        let adapter = adapter_for(self.plugin.config.format);
        let mut loader = Loader {
            store,
            mapper: self.plugin.mapper.as_ref(),
            region: &region,
            normalizer: context.normalizer,
            policy,
        };
        for phase in [Phase::Districts, Phase::Stations] {
            let records = read(adapter, phase, context)
                .map_err(|err| ImportError::source_error(phase, err))?;
            let summary = report.phase_mut(phase);
            loader.load(phase, records, summary)?;
            info!("{region}: {phase} {summary}");
        }
        log_transition::<Loading, Done>(&region);
        Ok(Session {
            plugin: self.plugin,
            state: Done { report },
        })
    }
}

impl Session<'_, Done> {
    fn finish(self) -> ImportReport {
        self.state.report
    }
}

fn read(
    adapter: &dyn SourceAdapter,
    phase: Phase,
    context: &SourceContext<'_>,
) -> Result<RawRecords, SourceError> {
    match phase {
        Phase::Districts => adapter.read_districts(context),
        Phase::Stations => adapter.read_stations(context),
    }
}

/// Maps raw records and writes the results for one region.
struct Loader<'a, T: RecordStore + ?Sized> {
    store: &'a mut T,
    mapper: &'a dyn RegionMapper,
    region: &'a RegionId,
    normalizer: GeometryNormalizer,
    policy: CollisionPolicy,
}

impl<T: RecordStore + ?Sized> Loader<'_, T> {
    fn load(
        &mut self,
        phase: Phase,
        records: RawRecords,
        summary: &mut PhaseSummary,
    ) -> Result<(), ImportError> {
        for (index, raw) in records.enumerate() {
            let position = index + 1;
            let raw = raw.map_err(|err| ImportError::source_error(phase, err))?;
            summary.record_read();
            let mapped = match phase {
                Phase::Districts => self.district(position, &raw)?,
                Phase::Stations => self.station(position, &raw)?,
            };
            let Some(record) = mapped else {
                debug!("{}: skipped {phase} record {position}", self.region);
                summary.record_skip();
                continue;
            };
            let outcome = self.write(&record)?;
            summary.record_import(outcome == UpsertOutcome::Replaced);
        }
        Ok(())
    }

    fn district(&self, position: usize, raw: &RawRecord) -> Result<Option<Record>, ImportError> {
        let phase = Phase::Districts;
        let Some(fields) = self
            .mapper
            .map_district(raw)
            .map_err(ImportError::mapping(phase, position))?
        else {
            return Ok(None);
        };
        let region_id = self.region_for(fields.region_id, phase, position)?;
        let boundary = match fields.boundary {
            Some(boundary) => self.normalizer.reproject_boundary(boundary),
            None => raw
                .boundary()
                .cloned()
                .ok_or(GeometryError::MissingBoundary)
                .and_then(|boundary| self.normalizer.reproject_boundary(boundary)),
        }
        .map_err(|source| ImportError::Geometry {
            phase,
            internal_region_id: Some(fields.internal_region_id.clone()),
            source,
        })?;
        Ok(Some(
            DistrictRecord {
                region_id,
                internal_region_id: fields.internal_region_id,
                name: fields.name,
                boundary,
            }
            .into(),
        ))
    }

    fn station(&self, position: usize, raw: &RawRecord) -> Result<Option<Record>, ImportError> {
        let phase = Phase::Stations;
        let Some(fields) = self
            .mapper
            .map_station(raw)
            .map_err(ImportError::mapping(phase, position))?
        else {
            return Ok(None);
        };
        let region_id = self.region_for(fields.region_id, phase, position)?;
        let location = fields
            .location
            .or_else(|| raw.location().copied())
            .map(|location| self.normalizer.reproject_location(location))
            .transpose()
            .map_err(|source| ImportError::Geometry {
                phase,
                internal_region_id: Some(fields.internal_region_id.clone()),
                source,
            })?;
        Ok(Some(
            StationRecord {
                region_id,
                internal_region_id: fields.internal_region_id,
                postcode: fields.postcode,
                address: fields.address,
                location,
            }
            .into(),
        ))
    }

    /// The region being imported, unless the mapper named a different one.
    fn region_for(
        &self,
        named: Option<RegionId>,
        phase: Phase,
        position: usize,
    ) -> Result<RegionId, ImportError> {
        match named {
            None => Ok(self.region.clone()),
            Some(found) if found == *self.region => Ok(found),
            Some(found) => Err(ImportError::mapping(phase, position)(
                MappingError::RegionMismatch {
                    expected: self.region.clone(),
                    found,
                },
            )),
        }
    }

    fn write(&mut self, record: &Record) -> Result<UpsertOutcome, ImportError> {
        let kind = record.kind();
        if self.policy == CollisionPolicy::Fail {
            let key = record.key();
            if self
                .store
                .contains(kind, &key)
                .map_err(ImportError::storage("lookup"))?
            {
                return Err(ImportError::DuplicateKey {
                    kind,
                    internal_region_id: key.internal_region_id,
                });
            }
        }
        let outcome = self
            .store
            .upsert(record)
            .map_err(ImportError::storage("upsert"))?;
        if outcome == UpsertOutcome::Replaced {
            warn!(
                "{}: {kind} {} was written twice; keeping the last",
                self.region,
                record.key().internal_region_id
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{adapters::FormatFamily, config::RegionConfig};
    use ballotmap_core::{
        Boundary, DistrictFields, MemoryRecordStore, RawValue, Srid, StaticRegionRegistry,
        StationFields, test_support::FailingRecordStore,
    };
    use rstest::{fixture, rstest};
    use std::fs;
    use tempfile::TempDir;

    const REGION: &str = "X01000000";
    const SQUARE: &str = r#""{""type"":""Polygon"",""coordinates"":[[[0,0],[1,0],[1,1],[0,0]]]}""#;

    /// Maps `id`/`name` districts and `id`/`address` stations; ids starting
    /// with `skip` are dropped and a `region` column overrides the region.
    struct ColumnMapper;

    impl RegionMapper for ColumnMapper {
        fn map_district(&self, raw: &RawRecord) -> Result<Option<DistrictFields>, MappingError> {
            let id = raw.require("id")?;
            if id.starts_with("skip") {
                return Ok(None);
            }
            let mut fields = DistrictFields::new(id, raw.require("name")?);
            if let Some(region) = raw.get("region").and_then(RawValue::as_text) {
                let region = RegionId::new(region).map_err(|err| MappingError::Invalid {
                    message: err.to_string(),
                })?;
                fields = fields.with_region(region);
            }
            Ok(Some(fields))
        }

        fn map_station(&self, raw: &RawRecord) -> Result<Option<StationFields>, MappingError> {
            let id = raw.require("id")?;
            if id.starts_with("skip") {
                return Ok(None);
            }
            let address = raw.require("address")?;
            Ok(Some(StationFields::new(id, "", address)))
        }
    }

    /// Supplies its own district boundary: a two-position open ring.
    struct OpenRingMapper;

    impl RegionMapper for OpenRingMapper {
        fn map_district(&self, raw: &RawRecord) -> Result<Option<DistrictFields>, MappingError> {
            let ring = geo::LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]);
            let boundary = Boundary::new(
                Srid::WGS84,
                geo::MultiPolygon(vec![geo::Polygon::new(ring, Vec::new())]),
            );
            let fields = DistrictFields::new(raw.require("id")?, raw.require("name")?)
                .with_boundary(boundary);
            Ok(Some(fields))
        }

        fn map_station(&self, raw: &RawRecord) -> Result<Option<StationFields>, MappingError> {
            ColumnMapper.map_station(raw)
        }
    }

    struct Sources {
        dir: TempDir,
    }

    impl Sources {
        fn plugin(&self, districts: &str, stations: &str) -> RegionPlugin {
            self.plugin_with(districts, stations, ColumnMapper)
        }

        fn plugin_with(
            &self,
            districts: &str,
            stations: &str,
            mapper: impl RegionMapper + 'static,
        ) -> RegionPlugin {
            let base = camino::Utf8Path::from_path(self.dir.path()).expect("utf-8 dir");
            fs::write(base.join("polling_districts.csv"), districts).expect("districts");
            fs::write(base.join("polling_places.csv"), stations).expect("stations");
            let region = RegionId::new(REGION).expect("region");
            let config =
                RegionConfig::new(region, FormatFamily::Csv, base).with_srid(Srid::WGS84);
            RegionPlugin::new(config, mapper)
        }
    }

    #[fixture]
    fn sources() -> Sources {
        Sources {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    #[fixture]
    fn registry() -> StaticRegionRegistry {
        StaticRegionRegistry::from_ids([REGION]).expect("registry")
    }

    fn districts(rows: &[(&str, &str)]) -> String {
        let mut text = String::from("id,name,geometry\n");
        for (id, name) in rows {
            text.push_str(&format!("{id},{name},{SQUARE}\n"));
        }
        text
    }

    #[rstest]
    fn skipped_records_are_counted_not_stored(sources: Sources, registry: StaticRegionRegistry) {
        let plugin = sources.plugin(
            &districts(&[("A", "North"), ("skip-1", "Ignored")]),
            "id,address\n1,Hall\nskip-2,Nowhere\n",
        );
        let mut store = MemoryRecordStore::default();
        let report = Importer::new(&registry, &mut store, ImportOptions::default())
            .import(&plugin)
            .expect("import");

        assert_eq!(report.districts.read, 2);
        assert_eq!(report.districts.skipped, 1);
        assert_eq!(report.stations.imported, 1);
        let region = RegionId::new(REGION).expect("region");
        let ids: Vec<String> = store
            .stations(&region)
            .expect("stations")
            .into_iter()
            .map(|station| station.internal_region_id)
            .collect();
        assert_eq!(ids, ["1"]);
    }

    #[rstest]
    fn repeated_keys_are_replaced_by_default(sources: Sources, registry: StaticRegionRegistry) {
        let plugin = sources.plugin(
            &districts(&[("A", "First"), ("A", "Second")]),
            "id,address\n",
        );
        let mut store = MemoryRecordStore::default();
        let report = Importer::new(&registry, &mut store, ImportOptions::default())
            .import(&plugin)
            .expect("import");

        assert_eq!(report.districts.imported, 2);
        assert_eq!(report.districts.replaced, 1);
        let region = RegionId::new(REGION).expect("region");
        let names: Vec<String> = store
            .districts(&region)
            .expect("districts")
            .into_iter()
            .map(|district| district.name)
            .collect();
        assert_eq!(names, ["Second"]);
    }

    #[rstest]
    fn repeated_keys_fail_under_the_fail_policy(sources: Sources, registry: StaticRegionRegistry) {
        let plugin = sources.plugin(&districts(&[("A", "First"), ("A", "Second")]), "id,address\n");
        let mut store = MemoryRecordStore::default();
        let options = ImportOptions {
            collision: CollisionPolicy::Fail,
            ..ImportOptions::default()
        };
        let err = Importer::new(&registry, &mut store, options)
            .import(&plugin)
            .expect_err("duplicate");
        assert!(matches!(
            err,
            ImportError::DuplicateKey { kind: RecordKind::District, ref internal_region_id }
                if internal_region_id == "A"
        ));
    }

    #[rstest]
    fn districts_need_a_boundary(sources: Sources, registry: StaticRegionRegistry) {
        let plugin = sources.plugin("id,name,geometry\nA,North,\n", "id,address\n");
        let mut store = MemoryRecordStore::default();
        let err = Importer::new(&registry, &mut store, ImportOptions::default())
            .import(&plugin)
            .expect_err("missing boundary");
        assert!(matches!(
            err,
            ImportError::Geometry {
                phase: Phase::Districts,
                source: GeometryError::MissingBoundary,
                ..
            }
        ));
    }

    #[rstest]
    fn mapped_boundaries_are_validated(sources: Sources, registry: StaticRegionRegistry) {
        let plugin = sources.plugin_with("id,name\nA,North\n", "id,address\n", OpenRingMapper);
        let mut store = MemoryRecordStore::default();
        let err = Importer::new(&registry, &mut store, ImportOptions::default())
            .import(&plugin)
            .expect_err("open ring");
        assert!(matches!(
            err,
            ImportError::Geometry {
                phase: Phase::Districts,
                internal_region_id: Some(ref id),
                source: GeometryError::RingTooShort { positions: 3 },
            } if id == "A"
        ));
        let region = RegionId::new(REGION).expect("region");
        assert!(store.districts(&region).expect("districts").is_empty());
    }

    #[rstest]
    fn mappers_cannot_move_records_to_other_regions(
        sources: Sources,
        registry: StaticRegionRegistry,
    ) {
        let plugin = sources.plugin(
            &format!("id,name,region,geometry\nA,North,X02000000,{SQUARE}\n"),
            "id,address\n",
        );
        let mut store = MemoryRecordStore::default();
        let err = Importer::new(&registry, &mut store, ImportOptions::default())
            .import(&plugin)
            .expect_err("mismatch");
        assert!(matches!(
            err,
            ImportError::Mapping {
                phase: Phase::Districts,
                record: 1,
                source: MappingError::RegionMismatch { .. },
            }
        ));
    }

    #[rstest]
    fn unknown_regions_abort_before_clearing(sources: Sources) {
        let plugin = sources.plugin(&districts(&[("A", "North")]), "id,address\n");
        let registry = StaticRegionRegistry::from_ids(["E06000038"]).expect("registry");
        let mut store = FailingRecordStore::failing_deletes();
        let err = Importer::new(&registry, &mut store, ImportOptions::default())
            .import(&plugin)
            .expect_err("unknown region");
        assert!(matches!(err, ImportError::UnknownRegion { .. }));
    }

    #[rstest]
    fn store_failures_abort_the_import(sources: Sources, registry: StaticRegionRegistry) {
        let plugin = sources.plugin(
            &districts(&[("A", "North"), ("B", "South")]),
            "id,address\n1,Hall\n",
        );
        let mut store = FailingRecordStore::failing_after(1);
        let err = Importer::new(&registry, &mut store, ImportOptions::default())
            .import(&plugin)
            .expect_err("store failure");
        assert!(matches!(err, ImportError::Storage { operation: "upsert", .. }));
        assert_eq!(store.inner().len(RecordKind::District), 1);
    }

    #[rstest]
    fn missing_sources_are_reported_per_phase(sources: Sources, registry: StaticRegionRegistry) {
        let plugin = sources.plugin(&districts(&[("A", "North")]), "id,address\n");
        fs::remove_file(plugin.config.stations_path()).expect("remove stations");
        let mut store = MemoryRecordStore::default();
        let err = Importer::new(&registry, &mut store, ImportOptions::default())
            .import(&plugin)
            .expect_err("missing stations");
        assert!(matches!(err, ImportError::SourceNotFound { phase: Phase::Stations, .. }));
        assert_eq!(store.len(RecordKind::District), 1);
    }
}
