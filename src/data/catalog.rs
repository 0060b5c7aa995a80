//! Pre-existing datasets stored under the data directory

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::loader::{DataFormat, DataSource};
use crate::error::{Result, TrainerError};

/// A loadable file found in the data directory
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetEntry {
    /// File name including extension, as shown to the user
    pub name: String,
    pub path: PathBuf,
    pub format: DataFormat,
    pub size_bytes: u64,
}

/// Catalog of the tables stored in one directory
#[derive(Debug, Clone)]
pub struct DatasetCatalog {
    root: PathBuf,
}

impl DatasetCatalog {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List loadable datasets sorted by name.
    ///
    /// A missing directory is an empty catalog. Files with unsupported
    /// extensions are skipped.
    pub fn list(&self) -> Result<Vec<DatasetEntry>> {
        if !self.root.exists() {
            debug!(dir = %self.root.display(), "Data directory does not exist");
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(format) = DataFormat::from_path(&path) else {
                continue;
            };
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            entries.push(DatasetEntry {
                name,
                size_bytes: entry.metadata()?.len(),
                path,
                format,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Resolve a dataset file name to a loadable source
    pub fn resolve(&self, name: &str) -> Result<(DataSource, DataFormat)> {
        let path = self.locate(name)?;
        let format = DataFormat::from_path(&path)?;
        Ok((DataSource::Path(path), format))
    }

    /// Path of the stored file called `name`, whatever its extension
    pub fn locate(&self, name: &str) -> Result<PathBuf> {
        check_file_name(name)?;
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(TrainerError::DatasetNotFound(format!(
                "{} (looked in {})",
                name,
                self.root.display()
            )));
        }
        Ok(path)
    }

    /// Store uploaded bytes as `<dataset_name>.<ext>` so the table shows up
    /// in later listings. Returns the stored entry.
    ///
    /// The stored file keeps the extension of `source_name` (the uploaded
    /// file) when it matches `format`, so an `.ods` upload stays `.ods`.
    pub fn import(
        &self,
        dataset_name: &str,
        source_name: &str,
        format: DataFormat,
        bytes: &[u8],
    ) -> Result<DatasetEntry> {
        let dataset_name = dataset_name.trim();
        check_file_name(dataset_name)?;

        let extension = Path::new(source_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|ext| DataFormat::from_extension(ext).ok() == Some(format))
            .unwrap_or_else(|| format.extension().to_string());

        fs::create_dir_all(&self.root)?;
        let name = format!("{}.{}", dataset_name, extension);
        let path = self.root.join(&name);
        fs::write(&path, bytes)?;

        info!(dataset = %name, bytes = bytes.len(), "Imported dataset");
        Ok(DatasetEntry {
            name,
            path,
            format,
            size_bytes: bytes.len() as u64,
        })
    }
}

fn check_file_name(name: &str) -> Result<()> {
    let escapes = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if escapes {
        return Err(TrainerError::DatasetNotFound(format!(
            "{:?} is not a plain file name",
            name
        )));
    }
    Ok(())
}
