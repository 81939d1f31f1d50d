//! Tracker configuration and database path resolution

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::{infer_backend_type, BackendType, DatabaseConfig};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "ANALYST_TRACKER_CONFIG";

/// Environment variable overriding the database path
pub const DB_PATH_ENV: &str = "ANALYST_TRACKER_DB";

/// Database file picked up from the working directory when present
pub const LOCAL_DB_FILE: &str = "analysts.yaml";

const APP_DIR: &str = "analyst-tracker";

/// Persistent user settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfig {
    /// Path to the database file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Backend override; inferred from the file extension when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendType>,
}

impl TrackerConfig {
    /// Loads the config from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Loads the config if the file exists, otherwise returns defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the config to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }

    let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
    Ok(config_dir.join(APP_DIR).join("config.yaml"))
}

/// Default database location when nothing else is configured
pub fn default_database_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(data_dir.join(APP_DIR).join(LOCAL_DB_FILE))
}

/// Where a resolved database path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    CommandLine,
    Environment,
    WorkingDirectory,
    ConfigFile,
    Default,
}

impl std::fmt::Display for PathSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSource::CommandLine => write!(f, "--db flag"),
            PathSource::Environment => write!(f, "{}", DB_PATH_ENV),
            PathSource::WorkingDirectory => write!(f, "working directory"),
            PathSource::ConfigFile => write!(f, "config file"),
            PathSource::Default => write!(f, "default location"),
        }
    }
}

/// Inputs to database resolution, gathered by the caller
#[derive(Debug, Clone, Default)]
pub struct ResolveInputs {
    pub cli_path: Option<PathBuf>,
    pub cli_backend: Option<BackendType>,
    pub env_path: Option<PathBuf>,
    pub local_file: Option<PathBuf>,
    pub config: TrackerConfig,
    pub default_path: PathBuf,
}

impl ResolveInputs {
    /// Gathers inputs from the process environment and config file
    pub fn from_environment(
        cli_path: Option<&Path>,
        cli_backend: Option<BackendType>,
    ) -> Result<Self> {
        let local = PathBuf::from(LOCAL_DB_FILE);
        Ok(Self {
            cli_path: cli_path.map(Path::to_path_buf),
            cli_backend,
            env_path: env::var(DB_PATH_ENV).ok().map(PathBuf::from),
            local_file: local.exists().then_some(local),
            config: TrackerConfig::load_or_default(get_config_path()?)?,
            default_path: default_database_path()?,
        })
    }
}

/// Picks the database to open.
///
/// Priority: command line, environment, `./analysts.yaml`, config file,
/// then the per-user data directory.
pub fn resolve_database(inputs: ResolveInputs) -> (DatabaseConfig, PathSource) {
    let (path, source) = if let Some(path) = inputs.cli_path {
        (path, PathSource::CommandLine)
    } else if let Some(path) = inputs.env_path {
        (path, PathSource::Environment)
    } else if let Some(path) = inputs.local_file {
        (path, PathSource::WorkingDirectory)
    } else if let Some(path) = inputs.config.database.clone() {
        (path, PathSource::ConfigFile)
    } else {
        (inputs.default_path, PathSource::Default)
    };

    // A configured backend only applies to the configured database
    let config_backend = match source {
        PathSource::ConfigFile => inputs.config.backend,
        _ => None,
    };
    let backend_type = inputs
        .cli_backend
        .or(config_backend)
        .unwrap_or_else(|| infer_backend_type(&path));

    (DatabaseConfig { path, backend_type }, source)
}

/// Resolves the database from the live environment
pub fn determine_database(
    cli_path: Option<&Path>,
    cli_backend: Option<BackendType>,
) -> Result<(DatabaseConfig, PathSource)> {
    let inputs = ResolveInputs::from_environment(cli_path, cli_backend)?;
    let (config, source) = resolve_database(inputs);
    log::debug!(
        "using {} database {:?} (from {})",
        config.backend_type,
        config.path,
        source
    );
    Ok((config, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn inputs() -> ResolveInputs {
        ResolveInputs {
            default_path: PathBuf::from("/data/analysts.yaml"),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_priority_order() {
        let mut i = inputs();
        i.config.database = Some(PathBuf::from("/cfg/tracker.db"));
        i.local_file = Some(PathBuf::from("analysts.yaml"));
        i.env_path = Some(PathBuf::from("/env/analysts.yaml"));
        i.cli_path = Some(PathBuf::from("/cli/analysts.db"));

        let (config, source) = resolve_database(i.clone());
        assert_eq!(source, PathSource::CommandLine);
        assert_eq!(config.backend_type, BackendType::Sqlite);

        i.cli_path = None;
        assert_eq!(resolve_database(i.clone()).1, PathSource::Environment);

        i.env_path = None;
        assert_eq!(resolve_database(i.clone()).1, PathSource::WorkingDirectory);

        i.local_file = None;
        let (config, source) = resolve_database(i.clone());
        assert_eq!(source, PathSource::ConfigFile);
        assert_eq!(config.path, PathBuf::from("/cfg/tracker.db"));

        i.config.database = None;
        let (config, source) = resolve_database(i);
        assert_eq!(source, PathSource::Default);
        assert_eq!(config.backend_type, BackendType::Yaml);
    }

    #[test]
    fn test_config_backend_overrides_extension() {
        let mut i = inputs();
        i.config.database = Some(PathBuf::from("/cfg/tracker.data"));
        i.config.backend = Some(BackendType::Sqlite);
        let (config, _) = resolve_database(i.clone());
        assert_eq!(config.backend_type, BackendType::Sqlite);

        i.cli_backend = Some(BackendType::Yaml);
        let (config, _) = resolve_database(i);
        assert_eq!(config.backend_type, BackendType::Yaml);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.yaml");

        assert_eq!(TrackerConfig::load_or_default(&path).unwrap(), TrackerConfig::default());

        let config = TrackerConfig {
            database: Some(PathBuf::from("/tmp/analysts.db")),
            backend: Some(BackendType::Sqlite),
        };
        config.save(&path).unwrap();

        let loaded = TrackerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("backend: sqlite"));
    }
}
