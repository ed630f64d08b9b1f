//! Append-only archive of weekly snapshots.
//!
//! One JSON file per run date (`YYYY-MM-DD.json`). Files are written through a
//! temporary file and linked into place without clobbering, so an entry is
//! either fully present or absent and never replaced.

use crate::models::{SummaryRecord, WeeklySnapshot};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors returned by the archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// An entry already exists for this date.
    #[error("archive already holds an entry for {date}")]
    Conflict { date: NaiveDate },

    /// The snapshot's run date differs from the requested entry date.
    #[error("snapshot dated {snapshot} cannot be stored under {date}")]
    DateMismatch { date: NaiveDate, snapshot: NaiveDate },

    #[error("archive I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive entry {path} is not valid JSON: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One archived run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub run_date: NaiveDate,
    pub written_at: DateTime<Utc>,
    pub snapshot: WeeklySnapshot,
    pub summary: SummaryRecord,
}

/// Directory-backed write-once store.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    dir: PathBuf,
}

impl ArchiveStore {
    /// Open (and create if needed) the archive directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| ArchiveError::Io {
            path: dir.clone(),
            source,
        })?;
        debug!("Archive directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format(DATE_FORMAT)))
    }

    /// Returns `true` if an entry exists for `date`.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.entry_path(date).exists()
    }

    /// Persist a run. Fails with [`ArchiveError::Conflict`] if `date` is taken.
    pub fn put(
        &self,
        date: NaiveDate,
        snapshot: &WeeklySnapshot,
        summary: &SummaryRecord,
    ) -> Result<PathBuf, ArchiveError> {
        if snapshot.run_date != date {
            return Err(ArchiveError::DateMismatch {
                date,
                snapshot: snapshot.run_date,
            });
        }

        let path = self.entry_path(date);
        if path.exists() {
            return Err(ArchiveError::Conflict { date });
        }

        let entry = ArchiveEntry {
            run_date: date,
            written_at: Utc::now(),
            snapshot: snapshot.clone(),
            summary: summary.clone(),
        };
        let content = serde_json::to_vec_pretty(&entry).map_err(|source| ArchiveError::Serde {
            path: path.clone(),
            source,
        })?;

        let io_err = |source| ArchiveError::Io {
            path: path.clone(),
            source,
        };
        let mut file = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        file.write_all(&content).map_err(io_err)?;
        file.as_file().sync_all().map_err(io_err)?;

        file.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                ArchiveError::Conflict { date }
            } else {
                io_err(e.error)
            }
        })?;

        info!("Archived run {} to {}", date, path.display());
        Ok(path)
    }

    /// All archived dates, oldest first.
    pub fn dates(&self) -> Result<Vec<NaiveDate>, ArchiveError> {
        let read_dir = std::fs::read_dir(&self.dir).map_err(|source| ArchiveError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut dates: Vec<NaiveDate> = read_dir
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?;
                NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
            })
            .collect();
        dates.sort_unstable();
        Ok(dates)
    }

    /// Load the entry for exactly `date`.
    pub fn get(&self, date: NaiveDate) -> Result<Option<ArchiveEntry>, ArchiveError> {
        let path = self.entry_path(date);
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ArchiveError::Io { path, source }),
        };
        let entry = serde_json::from_slice(&content)
            .map_err(|source| ArchiveError::Serde { path, source })?;
        Ok(Some(entry))
    }

    /// The most recent entry strictly before `date`, if any.
    pub fn latest_before(&self, date: NaiveDate) -> Result<Option<ArchiveEntry>, ArchiveError> {
        let Some(previous) = self.dates()?.into_iter().filter(|d| *d < date).max() else {
            return Ok(None);
        };
        self.get(previous)
    }
}
