//! External counting subprocess adapter
//!
//! Runs the detector program (`<interpreter> <program> --image <path>
//! --json`), captures its output to completion, and extracts the trailing
//! JSON result from stdout. Detector programs commonly print progress and
//! log lines to the same stream as their final structured result, so the
//! scan starts at the last line and takes the first well-formed JSON
//! object.

use crate::models::{CountSource, CountingResult};
use crate::services::source_locator::{describe_candidates, locate};
use crate::services::numeric_count;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Counting subprocess errors
#[derive(Debug, Error)]
pub enum CounterError {
    /// No candidate location for the detector program exists
    #[error("Counting program not found; tried: {0}")]
    ProgramNotFound(String),

    /// Failed to spawn or join the child process
    #[error("Failed to execute counting program: {0}")]
    ExecutionError(String),

    /// Child exited with a non-zero status
    #[error("Counting program failed (exit code {code:?}): {stderr}")]
    ProcessFailed {
        code: Option<i32>,
        stderr: String,
    },

    /// No JSON object with a numeric count could be extracted from stdout
    #[error("Counting program output is not parseable: {0}")]
    MalformedOutput(String),
}

/// Scan stdout for the trailing JSON result.
///
/// Lines are inspected from last to first; the first line that is
/// syntactically a JSON object wins. If no line parses, the entire trimmed
/// blob is tried as a single JSON document.
pub fn extract_trailing_json(stdout: &str) -> Option<serde_json::Value> {
    for line in stdout.lines().rev() {
        let line = line.trim();
        if line.starts_with('{') && line.ends_with('}') {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
                return Some(value);
            }
        }
    }

    serde_json::from_str(stdout.trim()).ok()
}

/// Adapter that counts vehicles by invoking an external detector program
pub struct CounterRunner {
    interpreter: String,
    program_candidates: Vec<PathBuf>,
}

impl CounterRunner {
    pub fn new(interpreter: impl Into<String>, program_candidates: Vec<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            program_candidates,
        }
    }

    /// Run the detector against one image and extract the raw count.
    ///
    /// Blocks the calling pipeline run until the child exits; the child is
    /// executed off the async runtime.
    pub async fn analyze(&self, image_path: &Path) -> Result<CountingResult, CounterError> {
        let program = locate(&self.program_candidates).ok_or_else(|| {
            CounterError::ProgramNotFound(describe_candidates(&self.program_candidates))
        })?;

        tracing::info!(
            interpreter = %self.interpreter,
            program = %program.display(),
            image = %image_path.display(),
            "Running counting program"
        );

        let output = tokio::task::spawn_blocking({
            let interpreter = self.interpreter.clone();
            let image = image_path.to_path_buf();

            move || {
                Command::new(&interpreter)
                    .arg(&program)
                    .arg("--image")
                    .arg(&image)
                    .arg("--json")
                    .output()
            }
        })
        .await
        .map_err(|e| CounterError::ExecutionError(format!("Task join error: {}", e)))?
        .map_err(|e| CounterError::ExecutionError(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CounterError::ProcessFailed {
                code: output.status.code(),
                stderr: if stderr.is_empty() {
                    "(no stderr output)".to_string()
                } else {
                    stderr
                },
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = extract_trailing_json(&stdout)
            .ok_or_else(|| CounterError::MalformedOutput(stdout.trim().to_string()))?;

        let raw_count = numeric_count(parsed.get("car_count")).ok_or_else(|| {
            CounterError::MalformedOutput(format!(
                "car_count is missing or not numeric: {}",
                parsed
            ))
        })?;

        tracing::info!(
            image = %image_path.display(),
            raw_count,
            "Counting program completed"
        );

        Ok(CountingResult {
            raw_count,
            source: CountSource::Detector,
            analysis: parsed,
        })
    }
}
