//! Модуль для работы с временными файлами
//!
//! Every request gets its own [`RequestWorkspace`]: a private temporary
//! directory that is removed, with everything in it, when the workspace is
//! dropped. Success, error and panic paths all clean up the same way.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// Временная директория одного запроса
#[derive(Debug)]
pub struct RequestWorkspace {
    /// Временная директория
    temp_dir: TempDir,
    /// Список созданных файлов
    files: Vec<PathBuf>,
}

impl RequestWorkspace {
    /// Create a workspace under `root`, or under the system temp dir
    pub fn new(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("narrator-");

        let temp_dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        log::debug!("Created request workspace {}", temp_dir.path().display());

        Ok(Self {
            temp_dir,
            files: Vec::new(),
        })
    }

    /// Reserve a collision-free path (`<prefix>_<uuid>.<extension>`) inside the workspace
    pub fn file_path(&mut self, prefix: &str, extension: &str) -> PathBuf {
        let file_name = format!("{}_{}.{}", prefix, uuid::Uuid::new_v4(), extension);
        let path = self.temp_dir.path().join(file_name);
        self.files.push(path.clone());
        path
    }

    /// Write `bytes` to a fresh file and return its path
    pub async fn write_file(&mut self, prefix: &str, extension: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.file_path(prefix, extension);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Получить путь к временной директории
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Files handed out so far
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        // TempDir removes the directory right after this
        log::debug!(
            "Releasing request workspace {} ({} files)",
            self.temp_dir.path().display(),
            self.files.len()
        );
    }
}
