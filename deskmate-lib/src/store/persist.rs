use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::store::{IndexEntry, Metric, VectorIndex};
use crate::{Error, Result};

/// File holding the serialized index inside its location directory.
pub const INDEX_FILE: &str = "index.json";

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct StoredIndexRef<'a> {
    format_version: u32,
    model: &'a str,
    metric: Metric,
    dimension: usize,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct StoredIndex {
    format_version: u32,
    model: String,
    metric: Metric,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Write the index to `location/index.json`, replacing any previous one.
    ///
    /// The data goes to a temporary file in the same directory which is then
    /// renamed over the target, so a failed write never leaves a partial file
    /// where [`load`](Self::load) would find it.
    ///
    /// # Errors
    /// [`Error::Storage`] on any I/O or serialization failure.
    pub fn persist(&self, location: &Path) -> Result<()> {
        let storage = |what: &str, e: &dyn std::fmt::Display| {
            Error::Storage(format!("{what} {}: {e}", location.display()))
        };

        fs::create_dir_all(location).map_err(|e| storage("failed to create", &e))?;
        let mut tmp = NamedTempFile::new_in(location).map_err(|e| storage("failed to write in", &e))?;

        let stored = StoredIndexRef {
            format_version: FORMAT_VERSION,
            model: &self.model,
            metric: self.metric,
            dimension: self.dimension,
            entries: &self.entries,
        };
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &stored).map_err(|e| storage("failed to serialize index for", &e))?;
            writer.flush().map_err(|e| storage("failed to write in", &e))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| storage("failed to sync in", &e))?;
        tmp.persist(location.join(INDEX_FILE))
            .map_err(|e| storage("failed to replace index in", &e.error))?;

        info!(
            location = %location.display(),
            entries = self.entries.len(),
            "persisted vector index"
        );
        Ok(())
    }

    /// Read an index previously written by [`persist`](Self::persist).
    ///
    /// Loading is a trusted-input operation: the caller must make sure
    /// `location` is not writable by an attacker. The file is validated for
    /// shape and dimension consistency, not for authenticity.
    ///
    /// # Errors
    /// - [`Error::IndexNotFound`] if nothing was persisted at `location`
    /// - [`Error::IndexCorrupt`] if the file cannot be parsed, has an
    ///   unsupported version, or holds vectors of the wrong dimension
    /// - [`Error::Storage`] for other I/O failures
    pub fn load(location: &Path) -> Result<Self> {
        let path = location.join(INDEX_FILE);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if is_missing(&e) => {
                return Err(Error::IndexNotFound(location.to_path_buf()));
            }
            Err(e) => {
                return Err(Error::Storage(format!(
                    "failed to open {}: {e}",
                    path.display()
                )));
            }
        };

        let stored: StoredIndex = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            if e.is_io() {
                Error::Storage(format!("failed to read {}: {e}", path.display()))
            } else {
                Error::IndexCorrupt(format!("{}: {e}", path.display()))
            }
        })?;

        if stored.format_version != FORMAT_VERSION {
            return Err(Error::IndexCorrupt(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                stored.format_version
            )));
        }
        if stored.dimension == 0 && !stored.entries.is_empty() {
            return Err(Error::IndexCorrupt("index records dimension 0".to_string()));
        }
        for (i, entry) in stored.entries.iter().enumerate() {
            if entry.vector.len() != stored.dimension {
                return Err(Error::IndexCorrupt(format!(
                    "entry {i} has dimension {}, index records {}",
                    entry.vector.len(),
                    stored.dimension
                )));
            }
            if entry.vector.iter().any(|x| !x.is_finite()) {
                return Err(Error::IndexCorrupt(format!(
                    "entry {i} holds non-finite values"
                )));
            }
        }

        info!(
            location = %location.display(),
            entries = stored.entries.len(),
            model = %stored.model,
            "loaded vector index"
        );
        Ok(Self {
            model: stored.model,
            metric: stored.metric,
            dimension: stored.dimension,
            entries: stored.entries,
        })
    }

    /// Delete the index persisted at `location`.
    ///
    /// The directory itself is removed only when nothing else is left in it.
    ///
    /// # Errors
    /// [`Error::IndexNotFound`] if there is no index to delete,
    /// [`Error::Storage`] if the file cannot be removed.
    pub fn destroy(location: &Path) -> Result<()> {
        let path = location.join(INDEX_FILE);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if is_missing(&e) => {
                return Err(Error::IndexNotFound(location.to_path_buf()));
            }
            Err(e) => {
                return Err(Error::Storage(format!(
                    "failed to remove {}: {e}",
                    path.display()
                )));
            }
        }
        // a non-empty directory holds someone else's files
        let _ = fs::remove_dir(location);
        info!(location = %location.display(), "deleted vector index");
        Ok(())
    }
}

/// Nothing persisted: no such path, or `location` is not a directory.
fn is_missing(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}
