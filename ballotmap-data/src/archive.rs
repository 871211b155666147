//! KMZ archive resolution.
//!
//! A KMZ file is a zip container whose main document is `doc.kml`.
//! [`ArchiveResolver::with_document`] extracts that document into a uniquely
//! named scratch file, hands its path to a reader and deletes it afterwards,
//! whether the reader succeeds, fails or panics.

use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use tempfile::{Builder, TempPath};
use thiserror::Error;
use zip::{ZipArchive, result::ZipError};

/// Name of the main document inside a KMZ container.
pub const KMZ_DOCUMENT: &str = "doc.kml";

const SCRATCH_PREFIX: &str = "ballotmap-";

/// Errors raised while resolving compressed documents.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The container could not be opened.
    #[error("failed to open archive {path}")]
    Open {
        /// Archive path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file was not a readable zip container.
    #[error("{path} is not a valid KMZ archive")]
    InvalidArchive {
        /// Archive path.
        path: Utf8PathBuf,
        /// Zip error.
        #[source]
        source: ZipError,
    },
    /// The container had no KML document.
    #[error("{path} contains no {KMZ_DOCUMENT}")]
    MissingDocument {
        /// Archive path.
        path: Utf8PathBuf,
    },
    /// Writing the extracted document failed.
    #[error("failed to extract the KML document from {path}")]
    Extract {
        /// Archive path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The scratch file path was not valid UTF-8.
    #[error("scratch file path {path:?} is not valid UTF-8")]
    NonUtf8TempPath {
        /// Offending path.
        path: std::path::PathBuf,
    },
}

/// Resolves KML and KMZ sources to a readable KML document path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveResolver {
    scratch_dir: Option<Utf8PathBuf>,
}

impl ArchiveResolver {
    /// Resolver extracting into `scratch_dir`, or the system temporary
    /// directory when `None`.
    pub const fn new(scratch_dir: Option<Utf8PathBuf>) -> Self {
        Self { scratch_dir }
    }

    /// Report whether `path` names a KMZ container (case-insensitive).
    pub fn is_compressed(path: &Utf8Path) -> bool {
        path.extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("kmz"))
    }

    /// Run `read` against the KML document behind `path`.
    ///
    /// Plain documents are passed through unchanged. For KMZ containers the
    /// closure receives the path of an extracted scratch copy, which is
    /// removed before this function returns or unwinds.
    pub fn with_document<T, E, F>(&self, path: &Utf8Path, read: F) -> Result<T, E>
    where
        E: From<ArchiveError>,
        F: FnOnce(&Utf8Path) -> Result<T, E>,
    {
        if !Self::is_compressed(path) {
            return read(path);
        }

        let extracted = self.extract(path)?;
        let outcome = match Utf8Path::from_path(&extracted) {
            Some(document) => {
                debug!("extracted {KMZ_DOCUMENT} from {path} to {document}");
                read(document)
            }
            None => Err(ArchiveError::NonUtf8TempPath {
                path: extracted.to_path_buf(),
            }
            .into()),
        };
        if let Err(err) = extracted.close() {
            warn!("failed to remove scratch copy of {path}: {err}");
        }
        outcome
    }

    fn extract(&self, path: &Utf8Path) -> Result<TempPath, ArchiveError> {
        let file = ballotmap_fs::open_std_file(path).map_err(|source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive =
            ZipArchive::new(file).map_err(|source| ArchiveError::InvalidArchive {
                path: path.to_path_buf(),
                source,
            })?;
        let name = document_name(&archive).ok_or_else(|| ArchiveError::MissingDocument {
            path: path.to_path_buf(),
        })?;
        let mut entry = archive
            .by_name(&name)
            .map_err(|source| ArchiveError::InvalidArchive {
                path: path.to_path_buf(),
                source,
            })?;

        let extract_error = |source| ArchiveError::Extract {
            path: path.to_path_buf(),
            source,
        };
        let mut builder = Builder::new();
        builder.prefix(SCRATCH_PREFIX).suffix(".kml");
        let mut scratch = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(extract_error)?;
        io::copy(&mut entry, &mut scratch).map_err(extract_error)?;
        scratch.flush().map_err(extract_error)?;
        Ok(scratch.into_temp_path())
    }
}

/// `doc.kml` when present, otherwise the first top-level `.kml` entry.
fn document_name<R: io::Read + io::Seek>(archive: &ZipArchive<R>) -> Option<String> {
    let mut fallback = None;
    for name in archive.file_names() {
        if name.eq_ignore_ascii_case(KMZ_DOCUMENT) {
            return Some(name.to_owned());
        }
        let top_level_kml = !name.contains('/')
            && Utf8Path::new(name)
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("kml"));
        if fallback.is_none() && top_level_kml {
            fallback = Some(name.to_owned());
        }
    }
    fallback
}
