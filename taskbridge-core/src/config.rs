//! Bridge configuration registry.
//!
//! # Storage layout
//!
//! ```text
//! ~/.taskbridge/
//!   config.yaml   (mode 0600, directory 0700 — created on first init)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Remote mirror store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the mirror store API.
    pub base_url: String,
    /// Database whose first data source backs the mirror.
    pub database_id: String,
    /// Name of the environment variable holding the API token. The token
    /// itself never lands in the config file.
    pub token_env: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.notion.com/v1".to_owned(),
            database_id: String::new(),
            token_env: "TASKBRIDGE_TOKEN".to_owned(),
        }
    }
}

/// Root of the taskbridge YAML config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the ledger document.
    pub ledger: PathBuf,
    /// Agent identity stamped into advisory locks taken by the bridge.
    #[serde(default = "default_agent")]
    pub agent: String,
    /// Minutes before a held lock is considered stale and reclaimable.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_minutes: i64,
    /// Watch-mode cycle interval.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub remote: RemoteConfig,
}

fn default_agent() -> String {
    "bridge".to_owned()
}

fn default_lock_timeout() -> i64 {
    10
}

fn default_interval() -> u64 {
    300
}

impl Config {
    /// A fresh config for the given ledger path, everything else defaulted.
    pub fn for_ledger(ledger: PathBuf) -> Config {
        Config {
            ledger,
            agent: default_agent(),
            lock_timeout_minutes: default_lock_timeout(),
            interval_secs: default_interval(),
            remote: RemoteConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.taskbridge/`
///
/// Creates the directory (mode `0700`) if it does not yet exist.
pub fn config_dir_at(home: &Path) -> Result<PathBuf, ConfigError> {
    let dir = home.join(".taskbridge");
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.taskbridge/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".taskbridge").join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load the config from `<home>/.taskbridge/config.yaml`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the config to `<home>/.taskbridge/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// The `.tmp` lives in the same directory as the target (same filesystem).
pub fn save_at(home: &Path, config: &Config) -> Result<(), ConfigError> {
    config_dir_at(home)?;
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

/// Scaffold a config for `ledger_path`.
///
/// Idempotent: if a config already exists, loads and returns it unchanged.
pub fn init_at(home: &Path, ledger_path: PathBuf) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if path.exists() {
        return load_at(home);
    }
    let config = Config::for_ledger(ledger_path);
    save_at(home, &config)?;
    Ok(config)
}

/// `init_at` convenience wrapper.
pub fn init(ledger_path: PathBuf) -> Result<Config, ConfigError> {
    init_at(&home()?, ledger_path)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    #[test]
    fn config_path_is_correct() {
        let home = make_home();
        let path = config_path_at(home.path());
        assert!(path.ends_with(".taskbridge/config.yaml"));
    }

    #[test]
    fn config_dir_created_with_perms() {
        let home = make_home();
        let dir = config_dir_at(home.path()).expect("config_dir_at");
        assert!(dir.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
        }
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = make_home();
        let mut config = Config::for_ledger(PathBuf::from("data/tasks.md"));
        config.remote.database_id = "db-123".to_owned();
        save_at(home.path(), &config).expect("save");
        let loaded = load_at(home.path()).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn atomic_save_cleans_up_tmp() {
        let home = make_home();
        let config = Config::for_ledger(PathBuf::from("data/tasks.md"));
        save_at(home.path(), &config).expect("save");
        let tmp = config_path_at(home.path()).with_file_name("config.yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[test]
    #[cfg(unix)]
    fn config_file_saved_with_tight_perms() {
        use std::os::unix::fs::PermissionsExt;
        let home = make_home();
        let config = Config::for_ledger(PathBuf::from("data/tasks.md"));
        save_at(home.path(), &config).expect("save");
        let mode = std::fs::metadata(config_path_at(home.path()))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn load_missing_config_returns_not_found() {
        let home = make_home();
        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigNotFound { .. }));
    }

    #[test]
    fn init_is_idempotent() {
        let home = make_home();
        let first = init_at(home.path(), PathBuf::from("a/tasks.md")).expect("init");
        let second = init_at(home.path(), PathBuf::from("b/other.md")).expect("re-init");
        assert_eq!(second.ledger, first.ledger, "re-init must not overwrite");
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let home = make_home();
        config_dir_at(home.path()).expect("dir");
        std::fs::write(config_path_at(home.path()), "ledger: data/tasks.md\n").expect("write");
        let loaded = load_at(home.path()).expect("load");
        assert_eq!(loaded.agent, "bridge");
        assert_eq!(loaded.lock_timeout_minutes, 10);
        assert_eq!(loaded.interval_secs, 300);
        assert_eq!(loaded.remote.token_env, "TASKBRIDGE_TOKEN");
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(ConfigError::HomeNotFound.to_string().contains("home directory"));
    }
}
