//! On-disk cache of successful analyses keyed by media reference.
//!
//! The cache is only read while tasks are in flight; new results are merged
//! after the whole batch has been collected.

use crate::models::{AnalysisResult, CreativeDimensions, VideoItem};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Media reference → dimensions of a past successful analysis.
#[derive(Debug, Clone, Default)]
pub struct AnalysisCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, CreativeDimensions>,
}

impl AnalysisCache {
    /// Load the cache at `path`.
    ///
    /// A missing file yields an empty cache; an unreadable one is logged and ignored.
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Ignoring corrupt analysis cache {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No analysis cache at {}", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Failed to read analysis cache {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        info!("Loaded {} cached analyses", entries.len());
        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    pub fn get(&self, media_reference: &str) -> Option<&CreativeDimensions> {
        self.entries.get(media_reference)
    }

    #[cfg(test)]
    pub fn insert(&mut self, media_reference: String, dimensions: CreativeDimensions) {
        self.entries.insert(media_reference, dimensions);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge the non-degraded results of a run. Returns how many entries were added.
    pub fn record(&mut self, items: &[VideoItem], results: &[AnalysisResult]) -> usize {
        let media_by_key: HashMap<&str, &str> = items
            .iter()
            .map(|i| (i.key.as_str(), i.media_reference.as_str()))
            .collect();

        let mut added = 0;
        for result in results.iter().filter(|r| !r.degraded) {
            let Some(media) = media_by_key.get(result.key.as_str()) else {
                continue;
            };
            if media.is_empty() || self.entries.contains_key(*media) {
                continue;
            }
            self.entries
                .insert((*media).to_string(), result.dimensions.clone());
            added += 1;
        }
        added
    }

    /// Rewrite the cache file. A cache without a path is a no-op.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;

        let content = serde_json::to_string_pretty(&self.entries)?;
        let mut file = tempfile::NamedTempFile::new_in(dir)
            .context("Failed to create temporary cache file")?;
        file.write_all(content.as_bytes())?;
        file.persist(path)
            .with_context(|| format!("Failed to write analysis cache {}", path.display()))?;

        debug!("Saved {} cached analyses to {}", self.entries.len(), path.display());
        Ok(())
    }
}
