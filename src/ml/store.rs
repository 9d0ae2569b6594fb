use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use super::{Artifact, Regressor};
use crate::calendar::expand_two_digit_year;

/// Format of `pred_start_date` once its two-digit year is expanded
/// (artifacts store `YY-MM-DD HH:MM:SS`)
pub const REFERENCE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DEFAULT_MODELS_DIR: &str = "artifacts/models";
pub const DEFAULT_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum ModelStoreError {
    #[error("Model not found: {name} ({})", .path.display())]
    NotFound { name: String, path: PathBuf },

    #[error("Model {name} is corrupt: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("Failed to read model {name}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// A trained model pinned to its reference point in index space
pub struct ModelDescriptor {
    pub artifact: Arc<dyn Regressor>,
    pub pred_start_index: i64,
    pub pred_start_date: NaiveDateTime,
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("pred_start_index", &self.pred_start_index)
            .field("pred_start_date", &self.pred_start_date)
            .finish_non_exhaustive()
    }
}

/// On-disk layout of a model artifact
#[derive(Debug, Deserialize)]
struct DescriptorFile {
    artifact: Artifact,
    pred_start_index: i64,
    pred_start_date: String,
}

impl ModelDescriptor {
    pub fn from_json(name: &str, bytes: &[u8]) -> Result<Self, ModelStoreError> {
        let corrupt = |reason: String| ModelStoreError::Corrupt {
            name: name.to_string(),
            reason,
        };

        let file: DescriptorFile =
            serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;

        let invalid_date = |reason: String| {
            corrupt(format!(
                "invalid pred_start_date '{}': {}",
                file.pred_start_date, reason
            ))
        };
        let expanded = expand_two_digit_year(&file.pred_start_date)
            .ok_or_else(|| invalid_date("expected YY-MM-DD HH:MM:SS".to_string()))?;
        let pred_start_date = NaiveDateTime::parse_from_str(&expanded, REFERENCE_DATE_FORMAT)
            .map_err(|e| invalid_date(e.to_string()))?;

        let artifact = file.artifact.into_regressor().map_err(corrupt)?;

        Ok(Self {
            artifact,
            pred_start_index: file.pred_start_index,
            pred_start_date,
        })
    }
}

/// Lazily populated, process-lifetime cache of model descriptors.
///
/// Each name gets its own `OnceCell`, so concurrent first requests for one
/// model share a single load while loads of different models proceed in
/// parallel. A failed load leaves the cell empty and the next request
/// retries it.
pub struct ModelStore {
    models_dir: PathBuf,
    extension: String,
    loaded: RwLock<HashMap<String, Arc<OnceCell<Arc<ModelDescriptor>>>>>,
}

impl ModelStore {
    pub fn new(models_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            models_dir: models_dir.into(),
            extension: extension.into(),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(format!("{}.{}", name, self.extension))
    }

    pub async fn get_or_load(&self, name: &str) -> Result<Arc<ModelDescriptor>, ModelStoreError> {
        if !is_safe_model_name(name) {
            return Err(ModelStoreError::NotFound {
                name: name.to_string(),
                path: self.models_dir.clone(),
            });
        }

        let cell = self.cell_for(name).await;
        match cell.get_or_try_init(|| self.load(name)).await {
            Ok(descriptor) => Ok(Arc::clone(descriptor)),
            Err(e) => {
                self.evict_empty(name, &cell).await;
                Err(e)
            }
        }
    }

    async fn cell_for(&self, name: &str) -> Arc<OnceCell<Arc<ModelDescriptor>>> {
        if let Some(cell) = self.loaded.read().await.get(name) {
            return Arc::clone(cell);
        }
        let mut loaded = self.loaded.write().await;
        Arc::clone(loaded.entry(name.to_string()).or_default())
    }

    /// Drop the entry for a name whose load failed, unless another request
    /// has since filled it or replaced the cell.
    async fn evict_empty(&self, name: &str, cell: &Arc<OnceCell<Arc<ModelDescriptor>>>) {
        let mut loaded = self.loaded.write().await;
        let stale = loaded
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized());
        if stale {
            loaded.remove(name);
        }
    }

    async fn load(&self, name: &str) -> Result<Arc<ModelDescriptor>, ModelStoreError> {
        let path = self.artifact_path(name);
        debug!("Loading model {} from {}", name, path.display());

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ModelStoreError::NotFound {
                    name: name.to_string(),
                    path,
                });
            }
            Err(e) => {
                return Err(ModelStoreError::Io {
                    name: name.to_string(),
                    source: e,
                });
            }
        };

        let descriptor = ModelDescriptor::from_json(name, &bytes)?;
        info!(
            "Loaded model {}: pred_start_index={}, pred_start_date={}",
            name, descriptor.pred_start_index, descriptor.pred_start_date
        );
        Ok(Arc::new(descriptor))
    }

    /// Number of models currently held in memory
    pub async fn loaded_count(&self) -> usize {
        self.loaded
            .read()
            .await
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// Warm the cache. Failures are logged and skipped; returns how many loaded.
    pub async fn preload(&self, names: &[String]) -> usize {
        let mut ok = 0;
        for name in names {
            match self.get_or_load(name).await {
                Ok(_) => ok += 1,
                Err(e) => warn!("Failed to preload model {}: {:#}", name, anyhow::Error::from(e)),
            }
        }
        ok
    }
}

/// Model names end up in file paths; only plain file stems are accepted.
fn is_safe_model_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
