// Pose model loader
// Fetches and caches the exported classifier files and reads their metadata

use crate::models::pose::ModelMetadata;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Files making up an exported pose classification model
pub const MODEL_FILES: [&str; 3] = ["model.json", "metadata.json", "weights.bin"];

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download of {url} failed with status {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Malformed metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Invalid model: {0}")]
    InvalidModel(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Model source configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Directory holding the exported files
    LocalDir(PathBuf),
    /// Base URL the files are published under
    Url(String),
}

impl ModelSource {
    /// Location of one model file within the source
    pub fn file_location(&self, file_name: &str) -> String {
        match self {
            ModelSource::LocalDir(dir) => dir.join(file_name).display().to_string(),
            ModelSource::Url(base) => {
                if base.ends_with('/') {
                    format!("{}{}", base, file_name)
                } else {
                    format!("{}/{}", base, file_name)
                }
            }
        }
    }

    /// Name of the cache subdirectory holding this source's files
    pub fn cache_key(&self) -> String {
        let (prefix, location) = match self {
            ModelSource::LocalDir(dir) => ("local", dir.display().to_string()),
            ModelSource::Url(base) => {
                let trimmed = base.trim_end_matches('/');
                let without_scheme = trimmed
                    .split_once("://")
                    .map(|(_, rest)| rest)
                    .unwrap_or(trimmed);
                ("url", without_scheme.to_string())
            }
        };

        let sanitized: String = location
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();

        format!("{}_{}", prefix, sanitized.trim_matches('_'))
    }
}

/// Local paths of a cached model
///
/// Only `metadata` is read here. `checkpoint` and `weights` are provisioned
/// for the inference backend that produces the pose estimates.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub checkpoint: PathBuf,
    pub metadata: PathBuf,
    pub weights: PathBuf,
}

/// Model manager for caching and loading the pose classifier
///
/// Each source is cached in its own subdirectory, so switching sources never
/// serves files from a previous model.
pub struct ModelLoader {
    cache_dir: PathBuf,
}

impl ModelLoader {
    /// Create a new model loader with cache directory
    pub fn new(cache_dir: PathBuf) -> ModelResult<Self> {
        fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn source_dir(&self, source: &ModelSource) -> PathBuf {
        self.cache_dir.join(source.cache_key())
    }

    pub fn files(&self, source: &ModelSource) -> ModelFiles {
        let dir = self.source_dir(source);
        ModelFiles {
            checkpoint: dir.join(MODEL_FILES[0]),
            metadata: dir.join(MODEL_FILES[1]),
            weights: dir.join(MODEL_FILES[2]),
        }
    }

    pub fn is_cached(&self, source: &ModelSource) -> bool {
        let dir = self.source_dir(source);
        MODEL_FILES.iter().all(|name| dir.join(name).exists())
    }

    /// Fetch any model file missing from the source's cache directory
    ///
    /// Files are written under a `.part` name and renamed once complete, so
    /// an interrupted fetch never leaves a truncated file behind.
    pub async fn ensure_model(&self, source: &ModelSource) -> ModelResult<ModelFiles> {
        let dir = self.source_dir(source);
        fs::create_dir_all(&dir)?;

        for name in MODEL_FILES {
            let target = dir.join(name);
            if target.exists() {
                debug!("Model file {} already cached at {:?}", name, target);
                continue;
            }

            let location = source.file_location(name);
            info!("Fetching model file {}", location);
            let partial = dir.join(format!("{}.part", name));

            match source {
                ModelSource::LocalDir(source_dir) => {
                    let path = source_dir.join(name);
                    if !path.exists() {
                        return Err(ModelError::InvalidModel(format!(
                            "{} is missing from {:?}",
                            name, source_dir
                        )));
                    }
                    fs::copy(&path, &partial)?;
                }
                ModelSource::Url(_) => {
                    let response = reqwest::get(&location).await?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(ModelError::DownloadFailed {
                            url: location,
                            status: status.as_u16(),
                        });
                    }
                    let bytes = response.bytes().await?;
                    tokio::fs::write(&partial, &bytes).await?;
                }
            }

            fs::rename(&partial, &target)?;
        }

        Ok(self.files(source))
    }

    /// Read the class labels and version info of a model
    pub fn load_metadata(path: &Path) -> ModelResult<ModelMetadata> {
        let contents = fs::read_to_string(path)?;
        let metadata: ModelMetadata = serde_json::from_str(&contents)?;

        if metadata.labels.is_empty() {
            return Err(ModelError::InvalidModel(format!(
                "{:?} declares no class labels",
                path
            )));
        }

        Ok(metadata)
    }

    /// Clear the model cache
    pub fn clear_cache(&self) -> ModelResult<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Get cache size in bytes, across every cached source
    pub fn cache_size(&self) -> ModelResult<u64> {
        if self.cache_dir.exists() {
            dir_size(&self.cache_dir)
        } else {
            Ok(0)
        }
    }
}

fn dir_size(dir: &Path) -> ModelResult<u64> {
    let mut total_size = 0u64;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            total_size += dir_size(&entry.path())?;
        } else if metadata.is_file() {
            total_size += metadata.len();
        }
    }

    Ok(total_size)
}
