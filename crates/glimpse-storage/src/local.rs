use crate::error::{StorageError, StorageResult};
use crate::naming::{sanitize_filename, unique_file_name};
use glimpse_core::{PipelineError, PipelineResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage for pipeline artifacts
#[derive(Clone, Debug)]
pub struct LocalStorage {
    download_root: PathBuf,
    preview_root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance, creating both roots if needed
    ///
    /// # Arguments
    /// * `download_root` - Directory for downloaded originals (e.g., "temp")
    /// * `preview_root` - Directory for generated previews, may equal `download_root`
    /// * `base_url` - Base URL under which previews are served (e.g., "http://localhost:4000/previews")
    pub async fn new(
        download_root: impl Into<PathBuf>,
        preview_root: impl Into<PathBuf>,
        base_url: impl Into<String>,
    ) -> StorageResult<Self> {
        let download_root = download_root.into();
        let preview_root = preview_root.into();

        for root in [&download_root, &preview_root] {
            fs::create_dir_all(root).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    root.display(),
                    e
                ))
            })?;
        }

        Ok(LocalStorage {
            download_root,
            preview_root,
            base_url: base_url.into(),
        })
    }

    pub fn download_root(&self) -> &Path {
        &self.download_root
    }

    pub fn preview_root(&self) -> &Path {
        &self.preview_root
    }

    /// Fresh path for a downloaded original: `{download_root}/{token}_{name}`
    pub fn download_path(&self, declared_name: &str) -> PathBuf {
        self.download_root.join(unique_file_name(declared_name))
    }

    /// Fresh path for a preview of `source_name`: `{preview_root}/{token}_{stem}.{format}`
    pub fn preview_path(&self, source_name: &str, format: &str) -> PathBuf {
        let stem = Path::new(source_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(source_name);
        let file_name = unique_file_name(stem);
        self.preview_root.join(format!("{}.{}", file_name, format))
    }

    /// Delete a stored file. A file that is already gone counts as removed.
    pub async fn remove(&self, path: &Path) -> PipelineResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed local file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::Cleanup {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Public reference for a file stored under the preview root
    pub fn download_reference(&self, path: &Path) -> Option<String> {
        if !path.starts_with(&self.preview_root) {
            return None;
        }
        let file_name = path.file_name()?.to_str()?;
        Some(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            file_name
        ))
    }

    /// Resolve a served preview name to an existing file under the preview root
    ///
    /// The name must be a single path component that survives sanitization
    /// unchanged, so nothing outside the preview root can be addressed.
    pub async fn resolve_preview(&self, file_name: &str) -> StorageResult<PathBuf> {
        if file_name.is_empty()
            || file_name.contains("..")
            || file_name.contains('/')
            || file_name.contains('\\')
            || sanitize_filename(file_name) != file_name
        {
            return Err(StorageError::InvalidKey(
                "File name contains invalid characters".to_string(),
            ));
        }

        let path = self.preview_root.join(file_name);

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(StorageError::NotFound(file_name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(file_name.to_string()))
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }
}
