//! Counts gathered while importing one region.

use std::fmt;

use ballotmap_core::{RecordKind, RegionId};
use serde::Serialize;

/// Half of an import: districts are loaded before stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// District boundaries.
    Districts,
    /// Station locations.
    Stations,
}

impl Phase {
    /// Kind of record the phase writes.
    pub const fn kind(self) -> RecordKind {
        match self {
            Self::Districts => RecordKind::District,
            Self::Stations => RecordKind::Station,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Districts => "districts",
            Self::Stations => "stations",
        })
    }
}

/// Record counts for one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseSummary {
    /// Existing records of the region deleted before loading.
    pub removed: usize,
    /// Raw records produced by the adapter.
    pub read: usize,
    /// Records written to the store, replacements included.
    pub imported: usize,
    /// Raw records the mapper skipped.
    pub skipped: usize,
    /// Writes that overwrote a record written earlier in the same import.
    pub replaced: usize,
}

impl PhaseSummary {
    pub(crate) const fn record_removed(&mut self, count: usize) {
        self.removed = count;
    }

    pub(crate) const fn record_read(&mut self) {
        self.read += 1;
    }

    pub(crate) const fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub(crate) const fn record_import(&mut self, replaced: bool) {
        self.imported += 1;
        if replaced {
            self.replaced += 1;
        }
    }
}

impl fmt::Display for PhaseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} read, {} imported, {} skipped, {} replaced",
            self.read, self.imported, self.skipped, self.replaced
        )
    }
}

/// Outcome of a successful region import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Region that was imported.
    pub region: RegionId,
    /// District phase counts.
    pub districts: PhaseSummary,
    /// Station phase counts.
    pub stations: PhaseSummary,
}

impl ImportReport {
    pub(crate) fn new(region: RegionId) -> Self {
        Self {
            region,
            districts: PhaseSummary::default(),
            stations: PhaseSummary::default(),
        }
    }

    /// Counts for `phase`.
    pub const fn phase(&self, phase: Phase) -> &PhaseSummary {
        match phase {
            Phase::Districts => &self.districts,
            Phase::Stations => &self.stations,
        }
    }

    pub(crate) const fn phase_mut(&mut self, phase: Phase) -> &mut PhaseSummary {
        match phase {
            Phase::Districts => &mut self.districts,
            Phase::Stations => &mut self.stations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn replacements_count_as_imports() {
        let mut summary = PhaseSummary::default();
        summary.record_read();
        summary.record_import(false);
        summary.record_read();
        summary.record_import(true);
        summary.record_read();
        summary.record_skip();
        assert_eq!(summary.to_string(), "3 read, 2 imported, 1 skipped, 1 replaced");
    }

    #[rstest]
    #[case(Phase::Districts, RecordKind::District)]
    #[case(Phase::Stations, RecordKind::Station)]
    fn phases_write_one_kind(#[case] phase: Phase, #[case] kind: RecordKind) {
        assert_eq!(phase.kind(), kind);
    }
}
