//! Configuration helpers shared by the Parkwatch binaries
//!
//! Database path resolution follows the priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. OS-dependent compiled default (fallback)

use std::path::PathBuf;

/// Resolve the sqlite database path.
///
/// Checks the CLI argument first, then the named environment variable, and
/// finally falls back to `parkwatch.db` under the platform data directory.
pub fn resolve_database_path(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_data_dir().join("parkwatch.db")
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        // ~/Library/Application Support/parkwatch
        dirs::data_dir()
            .map(|d| d.join("parkwatch"))
            .unwrap_or_else(|| PathBuf::from("./parkwatch_data"))
    } else {
        // Linux: ~/.local/share/parkwatch, Windows: %LOCALAPPDATA%\parkwatch
        dirs::data_local_dir()
            .map(|d| d.join("parkwatch"))
            .unwrap_or_else(|| PathBuf::from("./parkwatch_data"))
    }
}

/// Parse a boolean enable/disable flag from the environment.
///
/// Anything other than a case-insensitive "false" or "0" counts as enabled,
/// matching the permissive flag handling of the auto-run switches.
pub fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => {
            let v = value.trim().to_ascii_lowercase();
            if v.is_empty() {
                default
            } else {
                v != "false" && v != "0"
            }
        }
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn cli_argument_wins_over_env() {
        std::env::set_var("PW_TEST_DB", "/tmp/env.db");
        let path = resolve_database_path(Some("/tmp/cli.db"), "PW_TEST_DB");
        std::env::remove_var("PW_TEST_DB");
        assert_eq!(path, PathBuf::from("/tmp/cli.db"));
    }

    #[test]
    #[serial]
    fn env_used_when_no_cli_argument() {
        std::env::set_var("PW_TEST_DB2", "/tmp/env2.db");
        let path = resolve_database_path(None, "PW_TEST_DB2");
        std::env::remove_var("PW_TEST_DB2");
        assert_eq!(path, PathBuf::from("/tmp/env2.db"));
    }

    #[test]
    #[serial]
    fn falls_back_to_default_when_unset() {
        std::env::remove_var("PW_TEST_DB3");
        let path = resolve_database_path(None, "PW_TEST_DB3");
        assert!(path.ends_with("parkwatch.db"));
    }

    #[test]
    #[serial]
    fn env_flag_parsing() {
        std::env::remove_var("PW_TEST_FLAG");
        assert!(env_flag("PW_TEST_FLAG", true));
        assert!(!env_flag("PW_TEST_FLAG", false));

        std::env::set_var("PW_TEST_FLAG", "false");
        assert!(!env_flag("PW_TEST_FLAG", true));

        std::env::set_var("PW_TEST_FLAG", "0");
        assert!(!env_flag("PW_TEST_FLAG", true));

        std::env::set_var("PW_TEST_FLAG", "TRUE");
        assert!(env_flag("PW_TEST_FLAG", false));

        std::env::remove_var("PW_TEST_FLAG");
    }
}
