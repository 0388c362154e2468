//! Analysis history — Sled-backed per-user record of past analyses.
//! Keys are `{username}/{created_at_nanos:020}-{id:020}` so a prefix scan
//! returns one user's entries in chronological order. The id comes from
//! `generate_id`, so entries sharing a timestamp never collide.

use crate::analysis::{AnalysisResult, Change, Ratings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const HISTORY_DEFAULT_PATH: &str = "./data/history";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history store: {0}")]
    Sled(#[from] sled::Error),
    #[error("history entry encoding: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("invalid username {0:?}")]
    InvalidUser(String),
}

/// One stored analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    pub corrected_text: String,
    pub ratings: Ratings,
    pub changes: Vec<Change>,
    pub created_at: DateTime<Utc>,
}

/// Sink the pipeline writes completed analyses into.
pub trait HistorySink: Send + Sync {
    fn record(&self, username: &str, text: &str, result: &AnalysisResult) -> Result<(), HistoryError>;
}

/// Sled-backed history store.
pub struct SledHistory {
    db: sled::Db,
}

impl SledHistory {
    /// Open at `path`, or [`HISTORY_DEFAULT_PATH`] when `None`.
    pub fn open(path: Option<impl AsRef<Path>>) -> Result<Self, HistoryError> {
        let p = path
            .map(|x| x.as_ref().to_path_buf())
            .unwrap_or_else(|| Path::new(HISTORY_DEFAULT_PATH).to_path_buf());
        let db = sled::open(p)?;
        Ok(Self { db })
    }

    fn prefix(username: &str) -> Result<String, HistoryError> {
        if username.is_empty() || username.contains('/') {
            return Err(HistoryError::InvalidUser(username.to_string()));
        }
        Ok(format!("{}/", username))
    }

    /// Store an entry under the user's prefix.
    pub fn insert(&self, username: &str, entry: &HistoryEntry) -> Result<(), HistoryError> {
        let nanos = entry.created_at.timestamp_nanos_opt().unwrap_or_default().max(0);
        let id = self.db.generate_id()?;
        let key = format!("{}{:020}-{:020}", Self::prefix(username)?, nanos, id);
        self.db.insert(key.as_bytes(), serde_json::to_vec(entry)?)?;
        Ok(())
    }

    /// Newest-first entries for one user, at most `limit`.
    pub fn recent(&self, username: &str, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let prefix = Self::prefix(username)?;
        let mut out = Vec::new();
        for item in self.db.scan_prefix(prefix.as_bytes()).rev().take(limit) {
            let (_, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    /// Number of stored entries for one user.
    pub fn count(&self, username: &str) -> Result<usize, HistoryError> {
        let prefix = Self::prefix(username)?;
        Ok(self.db.scan_prefix(prefix.as_bytes()).count())
    }
}

impl HistorySink for SledHistory {
    fn record(&self, username: &str, text: &str, result: &AnalysisResult) -> Result<(), HistoryError> {
        let entry = HistoryEntry {
            text: text.to_string(),
            corrected_text: result.corrected_text.clone(),
            ratings: result.ratings,
            changes: result.changes.clone(),
            created_at: Utc::now(),
        };
        self.insert(username, &entry)
    }
}
