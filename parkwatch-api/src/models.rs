//! Domain types for the occupancy ingestion pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::PathBuf;

/// Persisted parking lot record
///
/// `occupied` always stays within `[0, capacity]`; on the ingestion path
/// that bound is enforced by the normalizer, on the CRUD path by request
/// validation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ParkingLot {
    pub id: i64,
    /// Unique human-readable key used to address a lot for updates
    pub name: String,
    pub capacity: i64,
    pub occupied: i64,
    pub updated_at: DateTime<Utc>,
}

/// One (parking lot, candidate image locations) pairing processed by a
/// single pipeline run. Built from configuration at startup, immutable
/// during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionTarget {
    pub parking_name: String,
    /// Probed in order; the first existing path wins
    pub image_paths: Vec<PathBuf>,
}

/// Which backend produced a raw count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountSource {
    /// Cloud vision model
    Vision,
    /// Statically configured count used when no credential is available
    ManualFallback,
    /// External detector subprocess
    Detector,
}

/// Raw adapter output, consumed immediately by the normalizer
#[derive(Debug, Clone, Serialize)]
pub struct CountingResult {
    /// Unvalidated vehicle estimate, prior to normalization
    pub raw_count: f64,
    pub source: CountSource,
    /// Free-form analysis payload, kept for diagnostics only
    pub analysis: serde_json::Value,
}

/// Why a target ended in the Skipped state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No candidate source path resolved
    NoSource,
    /// Vision backend has no API key and no fallback count
    CredentialMissing,
    /// Resolved file is neither an image nor a video
    UnsupportedMedia,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::NoSource => "no candidate source path exists",
            SkipReason::CredentialMissing => "no API key and no fallback count configured",
            SkipReason::UnsupportedMedia => "resolved file is not an image or video",
        };
        f.write_str(text)
    }
}

/// Terminal state of one pipeline run
///
/// Every run ends in exactly one of these; failures carry the originating
/// error text and never propagate past the per-target boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TargetOutcome {
    Done {
        parking_name: String,
        occupied: i64,
        capacity: i64,
        source: CountSource,
    },
    Skipped {
        parking_name: String,
        reason: SkipReason,
    },
    Failed {
        parking_name: String,
        error: String,
    },
}

impl TargetOutcome {
    pub fn parking_name(&self) -> &str {
        match self {
            TargetOutcome::Done { parking_name, .. }
            | TargetOutcome::Skipped { parking_name, .. }
            | TargetOutcome::Failed { parking_name, .. } => parking_name,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TargetOutcome::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_with_state_tag() {
        let outcome = TargetOutcome::Skipped {
            parking_name: "Lot A".to_string(),
            reason: SkipReason::NoSource,
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["state"], "skipped");
        assert_eq!(json["reason"], "no_source");
        assert_eq!(json["parking_name"], "Lot A");
    }

    #[test]
    fn done_outcome_reports_name() {
        let outcome = TargetOutcome::Done {
            parking_name: "Lot B".to_string(),
            occupied: 12,
            capacity: 80,
            source: CountSource::Detector,
        };

        assert_eq!(outcome.parking_name(), "Lot B");
        assert!(outcome.is_done());
    }
}
