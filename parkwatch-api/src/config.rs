//! Configuration resolution for parkwatch-api
//!
//! Settings come from an optional TOML file with environment variable
//! overrides on top; built-in defaults mirror the conventional repository
//! layout (images under `img/`, the detector script under `python/`).
//!
//! The vision API key is resolved separately with Database → ENV priority:
//! a key configured through the settings API wins over the environment.

use crate::models::IngestionTarget;
use parkwatch_common::{config::env_flag, Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_VISION_API_KEY: &str = "PARKWATCH_VISION_API_KEY";
/// Accepted for compatibility with the provider's conventional variable
pub const ENV_VISION_API_KEY_ALT: &str = "GEMINI_API_KEY";

const DEFAULT_VISION_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_INTERPRETER: &str = "python3";

/// Resolved service configuration, immutable for the process lifetime
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub vision: VisionSettings,
    pub counter: CounterSettings,
    /// Directory for diagnostic result artifacts; `None` disables them
    pub artifact_dir: Option<PathBuf>,
}

/// Vision adapter settings
#[derive(Debug, Clone)]
pub struct VisionSettings {
    /// Run the vision pipeline once in the background on startup
    pub auto_run: bool,
    pub model: String,
    /// The single lot the vision adapter maintains
    pub target: IngestionTarget,
    /// Used instead of the remote call when no API key is configured
    pub fallback_car_count: Option<f64>,
}

/// Subprocess counter settings
#[derive(Debug, Clone)]
pub struct CounterSettings {
    /// Run the counter pipeline once in the background on startup
    pub auto_run: bool,
    pub interpreter: String,
    /// Ordered candidate locations for the counting program
    pub program_paths: Vec<PathBuf>,
    pub targets: Vec<IngestionTarget>,
}

// --- TOML file shapes ---

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    artifact_dir: Option<String>,
    #[serde(default)]
    vision: VisionFileConfig,
    #[serde(default)]
    counter: CounterFileConfig,
}

#[derive(Debug, Default, Deserialize)]
struct VisionFileConfig {
    auto_run: Option<bool>,
    model: Option<String>,
    parking_name: Option<String>,
    image_paths: Option<Vec<PathBuf>>,
    fallback_car_count: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CounterFileConfig {
    auto_run: Option<bool>,
    interpreter: Option<String>,
    program_paths: Option<Vec<PathBuf>>,
    #[serde(default)]
    targets: Vec<IngestionTarget>,
}

impl AppConfig {
    /// Load configuration: TOML file (when present) + env overrides +
    /// built-in defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file = match config_path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("Read config failed: {}", e)))?;
                let parsed: FileConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Parse config failed: {}", e)))?;
                info!("Configuration loaded from {}", path.display());
                parsed
            }
            Some(path) => {
                warn!(
                    "Config file {} does not exist; using defaults",
                    path.display()
                );
                FileConfig::default()
            }
            None => FileConfig::default(),
        };

        let vision_parking_name = std::env::var("PARKWATCH_VISION_PARKING_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or(file.vision.parking_name)
            .unwrap_or_else(|| "Lot A".to_string());

        let vision = VisionSettings {
            auto_run: env_flag(
                "PARKWATCH_VISION_AUTO_RUN",
                file.vision.auto_run.unwrap_or(true),
            ),
            model: file
                .vision
                .model
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            target: IngestionTarget {
                parking_name: vision_parking_name,
                image_paths: file
                    .vision
                    .image_paths
                    .unwrap_or_else(|| default_image_candidates("parkingimg.jpeg")),
            },
            fallback_car_count: env_fallback_count().or(file.vision.fallback_car_count),
        };

        let counter = CounterSettings {
            auto_run: env_flag(
                "PARKWATCH_COUNTER_AUTO_RUN",
                file.counter.auto_run.unwrap_or(true),
            ),
            interpreter: std::env::var("PARKWATCH_PYTHON_BIN")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or(file.counter.interpreter)
                .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string()),
            program_paths: file
                .counter
                .program_paths
                .unwrap_or_else(default_program_candidates),
            targets: if file.counter.targets.is_empty() {
                default_counter_targets()
            } else {
                file.counter.targets
            },
        };

        let artifact_dir = match std::env::var("PARKWATCH_ARTIFACT_DIR") {
            Ok(dir) if dir.trim().is_empty() => None,
            Ok(dir) => Some(PathBuf::from(dir)),
            Err(_) => Some(
                file.artifact_dir
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".")),
            ),
        };

        Ok(Self {
            vision,
            counter,
            artifact_dir,
        })
    }
}

fn env_fallback_count() -> Option<f64> {
    let raw = std::env::var("PARKWATCH_FALLBACK_CAR_COUNT").ok()?;
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            warn!("PARKWATCH_FALLBACK_CAR_COUNT is not numeric: {}", raw);
            None
        }
    }
}

/// Candidate image locations across deployment layouts
fn default_image_candidates(file_name: &str) -> Vec<PathBuf> {
    vec![
        // workspace root img/
        PathBuf::from("../../img").join(file_name),
        PathBuf::from("img").join(file_name),
        PathBuf::from("assets/images").join(file_name),
    ]
}

/// Candidate locations for the counting script
fn default_program_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("../../python/car_counter_im.py"),
        PathBuf::from("python/car_counter_im.py"),
        PathBuf::from("scripts/car_counter_im.py"),
    ]
}

/// The original two-lot deployment
fn default_counter_targets() -> Vec<IngestionTarget> {
    vec![
        IngestionTarget {
            parking_name: "Lot A".to_string(),
            image_paths: default_image_candidates("parkingimg.jpeg"),
        },
        IngestionTarget {
            parking_name: "Lot B".to_string(),
            image_paths: default_image_candidates("parkingimg2.jpg"),
        },
    ]
}

/// Resolve the vision API key with Database → ENV priority.
///
/// Returns `None` when no source has a non-blank key; the caller decides
/// between the fallback count and skipping the run.
pub async fn resolve_vision_api_key(db: &SqlitePool) -> Result<Option<String>> {
    let db_key = crate::db::settings::get_vision_api_key(db)
        .await?
        .filter(|k| is_valid_key(k));

    let env_key = std::env::var(ENV_VISION_API_KEY)
        .or_else(|_| std::env::var(ENV_VISION_API_KEY_ALT))
        .ok()
        .filter(|k| is_valid_key(k));

    if db_key.is_some() && env_key.is_some() {
        warn!("Vision API key found in both database and environment. Using database (highest priority).");
    }

    if let Some(key) = db_key {
        info!("Vision API key loaded from database");
        return Ok(Some(key));
    }

    if let Some(key) = env_key {
        info!("Vision API key loaded from environment variable");
        return Ok(Some(key));
    }

    Ok(None)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "PARKWATCH_VISION_AUTO_RUN",
            "PARKWATCH_COUNTER_AUTO_RUN",
            "PARKWATCH_VISION_PARKING_NAME",
            "PARKWATCH_FALLBACK_CAR_COUNT",
            "PARKWATCH_PYTHON_BIN",
            "PARKWATCH_ARTIFACT_DIR",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn defaults_mirror_two_lot_deployment() {
        clear_env();
        let config = AppConfig::load(None).unwrap();

        assert!(config.vision.auto_run);
        assert!(config.counter.auto_run);
        assert_eq!(config.vision.model, "gemini-2.5-flash");
        assert_eq!(config.vision.target.parking_name, "Lot A");
        assert_eq!(config.counter.interpreter, "python3");
        assert_eq!(config.counter.targets.len(), 2);
        assert_eq!(config.counter.targets[1].parking_name, "Lot B");
        assert_eq!(config.artifact_dir, Some(PathBuf::from(".")));
        assert_eq!(config.vision.fallback_car_count, None);
    }

    #[test]
    #[serial]
    fn env_overrides_take_priority() {
        clear_env();
        std::env::set_var("PARKWATCH_VISION_AUTO_RUN", "false");
        std::env::set_var("PARKWATCH_VISION_PARKING_NAME", "Lot C");
        std::env::set_var("PARKWATCH_FALLBACK_CAR_COUNT", "12");
        std::env::set_var("PARKWATCH_PYTHON_BIN", "python3.12");

        let config = AppConfig::load(None).unwrap();
        clear_env();

        assert!(!config.vision.auto_run);
        assert_eq!(config.vision.target.parking_name, "Lot C");
        assert_eq!(config.vision.fallback_car_count, Some(12.0));
        assert_eq!(config.counter.interpreter, "python3.12");
    }

    #[test]
    #[serial]
    fn non_numeric_fallback_count_is_ignored() {
        clear_env();
        std::env::set_var("PARKWATCH_FALLBACK_CAR_COUNT", "a few");
        let config = AppConfig::load(None).unwrap();
        clear_env();

        assert_eq!(config.vision.fallback_car_count, None);
    }

    #[test]
    #[serial]
    fn empty_artifact_dir_disables_artifacts() {
        clear_env();
        std::env::set_var("PARKWATCH_ARTIFACT_DIR", "");
        let config = AppConfig::load(None).unwrap();
        clear_env();

        assert_eq!(config.artifact_dir, None);
    }

    #[test]
    #[serial]
    fn toml_file_configures_targets() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parkwatch.toml");
        std::fs::write(
            &path,
            r#"
artifact_dir = "/tmp/artifacts"

[vision]
auto_run = false
parking_name = "North Garage"
image_paths = ["/data/north.jpg"]

[counter]
interpreter = "python3.11"
program_paths = ["/opt/counter/car_counter_im.py"]

[[counter.targets]]
parking_name = "North Garage"
image_paths = ["/data/north.jpg", "/mnt/cam/north.jpg"]
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();

        assert!(!config.vision.auto_run);
        assert_eq!(config.vision.target.parking_name, "North Garage");
        assert_eq!(config.counter.interpreter, "python3.11");
        assert_eq!(config.counter.targets.len(), 1);
        assert_eq!(config.counter.targets[0].image_paths.len(), 2);
        assert_eq!(config.artifact_dir, Some(PathBuf::from("/tmp/artifacts")));
    }

    #[test]
    fn key_validation_rejects_blank() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }
}
