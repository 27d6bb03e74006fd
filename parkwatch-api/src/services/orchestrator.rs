//! Ingestion pipeline orchestration
//!
//! Fans out one pipeline run per configured target (locate → analyze →
//! normalize → persist), all targets concurrently. Each run is independent
//! and ends in a terminal Done / Skipped / Failed state; a failure in one
//! never aborts siblings or the host process, and nothing is retried
//! within a run.

use crate::config::{resolve_vision_api_key, AppConfig};
use crate::db;
use crate::models::{CountingResult, IngestionTarget, ParkingLot, SkipReason, TargetOutcome};
use crate::services::counter_process::CounterRunner;
use crate::services::normalizer::normalize;
use crate::services::source_locator::{describe_candidates, locate};
use crate::services::vision_client::{fallback_result, VisionClient};
use chrono::Utc;
use parkwatch_common::Error;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Orchestrates ingestion runs against the shared store
pub struct IngestOrchestrator {
    db: SqlitePool,
    config: Arc<AppConfig>,
}

impl IngestOrchestrator {
    pub fn new(db: SqlitePool, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// Run the subprocess counter pipeline over every configured target.
    ///
    /// Targets run concurrently and complete in any order; the returned
    /// outcomes follow the configured target order.
    pub async fn run_counter(&self) -> Vec<TargetOutcome> {
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, targets = self.config.counter.targets.len(), "Counter ingestion run started");

        let runner = CounterRunner::new(
            self.config.counter.interpreter.clone(),
            self.config.counter.program_paths.clone(),
        );

        let outcomes = futures::future::join_all(
            self.config
                .counter
                .targets
                .iter()
                .map(|target| self.counter_target(&runner, target, run_id)),
        )
        .await;

        log_run_summary(run_id, "counter", &outcomes);
        outcomes
    }

    /// Run the vision pipeline for its single configured target.
    pub async fn run_vision(&self) -> TargetOutcome {
        let run_id = Uuid::new_v4();
        let target = &self.config.vision.target;
        tracing::info!(%run_id, parking_name = %target.parking_name, "Vision ingestion run started");

        let outcome = self.vision_target(target, run_id).await;
        log_run_summary(run_id, "vision", std::slice::from_ref(&outcome));
        outcome
    }

    /// One counter pipeline run: locate → subprocess → normalize → persist.
    async fn counter_target(
        &self,
        runner: &CounterRunner,
        target: &IngestionTarget,
        run_id: Uuid,
    ) -> TargetOutcome {
        let name = target.parking_name.clone();

        let Some(image_path) = locate(&target.image_paths) else {
            tracing::warn!(
                %run_id,
                parking_name = %name,
                tried = %describe_candidates(&target.image_paths),
                "No target image found; skipping"
            );
            return TargetOutcome::Skipped {
                parking_name: name,
                reason: SkipReason::NoSource,
            };
        };

        let result = match runner.analyze(&image_path).await {
            Ok(result) => result,
            Err(e) => return self.failed(run_id, name, &image_path, e.to_string()),
        };

        self.persist_and_report(run_id, name, &image_path, None, result)
            .await
    }

    /// One vision pipeline run. With no API key configured the remote call
    /// is never made: a configured fallback count produces a degraded
    /// manual result, otherwise the target is skipped.
    async fn vision_target(&self, target: &IngestionTarget, run_id: Uuid) -> TargetOutcome {
        let name = target.parking_name.clone();

        let Some(image_path) = locate(&target.image_paths) else {
            tracing::warn!(
                %run_id,
                parking_name = %name,
                tried = %describe_candidates(&target.image_paths),
                "No target image found; skipping"
            );
            return TargetOutcome::Skipped {
                parking_name: name,
                reason: SkipReason::NoSource,
            };
        };

        let mime_type = match sniff_media_type(&image_path) {
            Some(mime) => mime,
            None => {
                tracing::warn!(
                    %run_id,
                    parking_name = %name,
                    path = %image_path.display(),
                    "Resolved file is not an image or video; skipping"
                );
                return TargetOutcome::Skipped {
                    parking_name: name,
                    reason: SkipReason::UnsupportedMedia,
                };
            }
        };

        let api_key = match resolve_vision_api_key(&self.db).await {
            Ok(key) => key,
            Err(e) => return self.failed(run_id, name, &image_path, e.to_string()),
        };

        let result = match api_key {
            Some(key) => {
                let client = match VisionClient::new(key, self.config.vision.model.clone()) {
                    Ok(client) => client,
                    Err(e) => return self.failed(run_id, name, &image_path, e.to_string()),
                };
                match client.analyze(&image_path, &mime_type).await {
                    Ok(result) => result,
                    Err(e) => return self.failed(run_id, name, &image_path, e.to_string()),
                }
            }
            None => match self.config.vision.fallback_car_count {
                Some(count) => {
                    tracing::warn!(
                        %run_id,
                        parking_name = %name,
                        fallback_count = count,
                        "No vision API key configured; using fallback count (analysis skipped)"
                    );
                    fallback_result(count)
                }
                None => {
                    tracing::warn!(
                        %run_id,
                        parking_name = %name,
                        "No vision API key and no fallback count configured; skipping"
                    );
                    return TargetOutcome::Skipped {
                        parking_name: name,
                        reason: SkipReason::CredentialMissing,
                    };
                }
            },
        };

        self.persist_and_report(run_id, name, &image_path, Some(mime_type), result)
            .await
    }

    /// Normalize against the lot's current capacity and write the new
    /// occupied value. Capacity is read fresh on every run.
    async fn persist_and_report(
        &self,
        run_id: Uuid,
        parking_name: String,
        image_path: &Path,
        mime_type: Option<String>,
        result: CountingResult,
    ) -> TargetOutcome {
        let updated = match self.apply_occupancy(&parking_name, result.raw_count).await {
            Ok(updated) => updated,
            Err(e) => return self.failed(run_id, parking_name, image_path, e.to_string()),
        };

        self.write_artifact(&updated, image_path, mime_type.as_deref(), &result)
            .await;

        TargetOutcome::Done {
            parking_name,
            occupied: updated.occupied,
            capacity: updated.capacity,
            source: result.source,
        }
    }

    async fn apply_occupancy(
        &self,
        parking_name: &str,
        raw_count: f64,
    ) -> parkwatch_common::Result<ParkingLot> {
        let lot = db::lots::find_by_name(&self.db, parking_name)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("parking lot '{}' does not exist", parking_name))
            })?;

        let next_occupied = normalize(raw_count, lot.capacity);
        let updated = db::lots::update_occupied(&self.db, parking_name, next_occupied).await?;

        tracing::info!(
            parking_name = %updated.name,
            occupied_before = lot.occupied,
            occupied_after = updated.occupied,
            capacity = updated.capacity,
            "Store updated"
        );

        Ok(updated)
    }

    /// Best-effort diagnostic artifact, one JSON file per lot. Never fatal.
    async fn write_artifact(
        &self,
        lot: &ParkingLot,
        image_path: &Path,
        mime_type: Option<&str>,
        result: &CountingResult,
    ) {
        let Some(dir) = &self.config.artifact_dir else {
            return;
        };

        let target_file = image_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| image_path.display().to_string());

        let document = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "target_file": target_file,
            "mime_type": mime_type,
            "result": result.analysis,
            "db_update": {
                "parking_lot": lot.name,
                "occupied": lot.occupied,
                "capacity": lot.capacity,
            },
        });

        let path = dir.join(format!("result-{}.json", slug(&lot.name)));
        let body = match serde_json::to_string_pretty(&document) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Artifact serialization failed");
                return;
            }
        };

        match tokio::fs::write(&path, body).await {
            Ok(()) => tracing::info!(path = %path.display(), "Result artifact written"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Artifact write failed"),
        }
    }

    fn failed(
        &self,
        run_id: Uuid,
        parking_name: String,
        image_path: &Path,
        error: String,
    ) -> TargetOutcome {
        tracing::error!(
            %run_id,
            parking_name = %parking_name,
            image = %image_path.display(),
            error = %error,
            "Ingestion target failed"
        );
        TargetOutcome::Failed {
            parking_name,
            error,
        }
    }
}

/// Sniff the media type from file content; only images and videos are
/// accepted by the vision backend.
fn sniff_media_type(path: &Path) -> Option<String> {
    let kind = infer::get_from_path(path).ok()??;
    let mime = kind.mime_type();
    if mime.starts_with("image/") || mime.starts_with("video/") {
        Some(mime.to_string())
    } else {
        None
    }
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

fn log_run_summary(run_id: Uuid, pipeline: &str, outcomes: &[TargetOutcome]) {
    let done = outcomes.iter().filter(|o| o.is_done()).count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, TargetOutcome::Skipped { .. }))
        .count();
    let failed = outcomes.len() - done - skipped;

    tracing::info!(
        %run_id,
        pipeline,
        done,
        skipped,
        failed,
        "Ingestion run finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_flattens_lot_names() {
        assert_eq!(slug("Lot A"), "lot-a");
        assert_eq!(slug("North Garage #2"), "north-garage-2");
        assert_eq!(slug("--x--"), "x");
    }
}
