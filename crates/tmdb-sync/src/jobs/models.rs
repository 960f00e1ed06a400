//! Job queue data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use super::{JobStoreError, Result};
use crate::media::MediaKind;

/// The fixed set of jobs the worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    FullSweep,
    MissingIds,
    PruneDeleted,
    ChangesSync,
    CreateTables,
    AddMovie,
    AddSeries,
}

impl JobKind {
    pub const ALL: [JobKind; 7] = [
        JobKind::FullSweep,
        JobKind::MissingIds,
        JobKind::PruneDeleted,
        JobKind::ChangesSync,
        JobKind::CreateTables,
        JobKind::AddMovie,
        JobKind::AddSeries,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::FullSweep => "full_sweep",
            JobKind::MissingIds => "missing_ids",
            JobKind::PruneDeleted => "prune_deleted",
            JobKind::ChangesSync => "changes_sync",
            JobKind::CreateTables => "create_tables",
            JobKind::AddMovie => "add_movie",
            JobKind::AddSeries => "add_series",
        }
    }

    /// Catalog-wide jobs run alone; everything else is a per-item job.
    pub fn is_global(self) -> bool {
        self.item_kind().is_none()
    }

    /// Media kind of a single-item job.
    pub fn item_kind(self) -> Option<MediaKind> {
        match self {
            JobKind::AddMovie => Some(MediaKind::Movie),
            JobKind::AddSeries => Some(MediaKind::Series),
            _ => None,
        }
    }

    /// Check a payload before it is enqueued or dispatched.
    pub fn validate_payload(self, payload: Option<&str>) -> Result<()> {
        if self.item_kind().is_some() {
            parse_item_id(self, payload)?;
        }
        Ok(())
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = JobStoreError;

    fn from_str(s: &str) -> Result<Self> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| JobStoreError::UnknownKind(s.to_string()))
    }
}

/// Catalog ID carried by `add_movie` / `add_series`. Must be a positive integer.
pub fn parse_item_id(kind: JobKind, payload: Option<&str>) -> Result<i64> {
    let raw = payload.map(str::trim).unwrap_or_default();
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(JobStoreError::InvalidPayload {
            kind,
            reason: format!("expected a positive integer id, got {raw:?}"),
        }),
    }
}

/// `full_sweep` payload `true` / `True` forces promotion past the safety check.
pub fn is_forced(payload: Option<&str>) -> bool {
    matches!(payload.map(str::trim), Some("true") | Some("True"))
}

/// A claimed row of `job_queue`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: i32,
    pub job_type: String,
    pub payload: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn kind(&self) -> Result<JobKind> {
        self.job_type.parse()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_names() {
        for kind in JobKind::ALL {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!(matches!("reindex".parse::<JobKind>(), Err(JobStoreError::UnknownKind(_))));
    }

    #[test]
    fn test_global_classification() {
        let item: Vec<_> = JobKind::ALL.into_iter().filter(|k| !k.is_global()).collect();
        assert_eq!(item, vec![JobKind::AddMovie, JobKind::AddSeries]);
        assert!(JobKind::CreateTables.is_global());
    }

    #[test]
    fn test_item_payload_validation() {
        assert_eq!(parse_item_id(JobKind::AddMovie, Some(" 550 ")).unwrap(), 550);
        assert!(parse_item_id(JobKind::AddMovie, Some("0")).is_err());
        assert!(parse_item_id(JobKind::AddSeries, Some("-3")).is_err());
        assert!(parse_item_id(JobKind::AddSeries, Some("abc")).is_err());
        assert!(JobKind::AddSeries.validate_payload(None).is_err());
        assert!(JobKind::PruneDeleted.validate_payload(Some("anything")).is_ok());
    }

    #[test]
    fn test_force_flag() {
        assert!(is_forced(Some("true")));
        assert!(is_forced(Some("True")));
        assert!(!is_forced(Some("TRUE")));
        assert!(!is_forced(Some("false")));
        assert!(!is_forced(None));
    }
}
