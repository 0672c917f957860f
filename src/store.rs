use crate::dataset::{self, Dataset, DatasetError};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Result of a load: the table (possibly empty) plus a user-facing notice
/// when the file could not be used.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub student_count: usize,
    pub notice: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SaveSummary {
    pub updated_rows: usize,
    pub sha256: String,
}

/// In-memory copy of the backing file.
///
/// The file is read on the first `load` and the table is kept for the rest
/// of the process. Only `refresh` (or a restart) reads it again; a save
/// replaces the cached table after the file has been overwritten.
pub struct DatasetStore {
    path: PathBuf,
    cached: Option<Dataset>,
    notice: Option<String>,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
            notice: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cached.is_some()
    }

    /// Never fails: unusable files degrade to an empty table plus a notice.
    pub fn load(&mut self) -> LoadOutcome {
        if self.cached.is_none() {
            let (ds, notice) = match read_dataset(&self.path) {
                Ok(ds) => {
                    tracing::info!(
                        path = %self.path.display(),
                        rows = ds.len(),
                        "dataset loaded"
                    );
                    (ds, None)
                }
                Err(DatasetError::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    tracing::warn!(path = %self.path.display(), "dataset file not found");
                    (
                        Dataset::default(),
                        Some(format!(
                            "Error: The file '{}' was not found. Make sure it's in the same directory as the app.",
                            self.path.display()
                        )),
                    )
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "dataset unusable");
                    (
                        Dataset::default(),
                        Some(format!(
                            "Error: could not load '{}': {}",
                            self.path.display(),
                            e
                        )),
                    )
                }
            };
            self.cached = Some(ds);
            self.notice = notice;
        }
        self.outcome()
    }

    /// Drops the cached table and reads the file again.
    pub fn refresh(&mut self) -> LoadOutcome {
        tracing::info!(path = %self.path.display(), "dataset refresh requested");
        self.cached = None;
        self.notice = None;
        self.load()
    }

    pub fn dataset(&mut self) -> &Dataset {
        self.load();
        self.cached.get_or_insert_with(Dataset::default)
    }

    pub fn save_feedback(
        &mut self,
        name: &str,
        feedback: &str,
    ) -> Result<SaveSummary, DatasetError> {
        self.load();
        let path = self.path.clone();
        let ds = self.cached.get_or_insert_with(Dataset::default);
        save_feedback(ds, &path, name, feedback)
    }

    fn outcome(&self) -> LoadOutcome {
        LoadOutcome {
            student_count: self.cached.as_ref().map(|d| d.len()).unwrap_or(0),
            notice: self.notice.clone(),
        }
    }
}

pub fn read_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    let file = std::fs::File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    dataset::parse_csv(std::io::BufReader::new(file))
}

/// Writes the feedback into every row named `name`, then overwrites the
/// whole backing file. Nothing is written when no row matches, and `ds`
/// only changes once the file write succeeded.
pub fn save_feedback(
    ds: &mut Dataset,
    path: &Path,
    name: &str,
    feedback: &str,
) -> Result<SaveSummary, DatasetError> {
    let mut next = ds.clone();
    let updated_rows = next.apply_feedback(name, feedback);
    if updated_rows == 0 {
        return Err(DatasetError::NotFound(name.to_string()));
    }
    let bytes = dataset::render_csv(&next)?;
    write_atomic(path, &bytes)?;
    *ds = next;
    let sha256 = sha256_hex(&bytes);
    tracing::info!(
        path = %path.display(),
        rows = updated_rows,
        sha256 = %sha256,
        "parent feedback saved"
    );
    Ok(SaveSummary {
        updated_rows,
        sha256,
    })
}

/// Full overwrite through a sibling temp file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DatasetError> {
    let io_err = |source: std::io::Error| DatasetError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "dataset".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.saving"));

    let mut f = std::fs::File::create(&tmp).map_err(io_err)?;
    f.write_all(bytes).map_err(io_err)?;
    f.sync_all().map_err(io_err)?;
    drop(f);
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
