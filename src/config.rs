//! Configuration for readshelf.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (READSHELF_HOME, READSHELF_GOOGLE_API_KEY)
//! 2. Config file (.readshelf/config.yaml)
//! 3. Defaults (~/.readshelf)
//!
//! Config file discovery:
//! - Searches current directory and parents for .readshelf/config.yaml
//! - Relative paths in the config file are resolved against its .readshelf/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::catalog::{CatalogSettings, RetryPolicy};
use crate::domain::Source;
use crate::storage::{DEFAULT_CAPACITY_BYTES, DEFAULT_PREFIX};

const CONFIG_DIR: &str = ".readshelf";
const CONFIG_FILE: &str = "config.yaml";
const DEFAULT_STORAGE_FILE: &str = "library.json";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub catalog: CatalogSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSection {
    pub prefix: Option<String>,
    pub capacity_bytes: Option<usize>,
    /// Storage file (relative to .readshelf/)
    pub file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSection {
    pub default_source: Option<Source>,
    pub cache_ttl_seconds: Option<u64>,
    pub rate_limit_requests: Option<u32>,
    pub rate_limit_window_ms: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_initial_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
    pub open_library_url: Option<String>,
    pub google_books_url: Option<String>,
    pub google_api_key: Option<String>,
}

impl CatalogSection {
    /// Overlay these settings on the defaults
    fn settings(&self) -> CatalogSettings {
        let defaults = CatalogSettings::default();

        let mut retry = match self.max_retries {
            Some(retries) => RetryPolicy::with_retries(retries),
            None => defaults.retry.clone(),
        };
        if let Some(ms) = self.retry_initial_delay_ms {
            retry.initial_delay_ms = ms;
        }
        if let Some(ms) = self.retry_max_delay_ms {
            retry.max_delay_ms = ms;
        }

        CatalogSettings {
            default_source: self.default_source.unwrap_or(defaults.default_source),
            cache_ttl: self
                .cache_ttl_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            rate_limit_requests: self
                .rate_limit_requests
                .unwrap_or(defaults.rate_limit_requests),
            rate_limit_window: self
                .rate_limit_window_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.rate_limit_window),
            timeout: self
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            retry,
            open_library_url: self
                .open_library_url
                .clone()
                .unwrap_or(defaults.open_library_url),
            google_books_url: self
                .google_books_url
                .clone()
                .unwrap_or(defaults.google_books_url),
            google_api_key: self.google_api_key.clone(),
        }
    }
}

/// Environment overrides, read once at load time
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub home: Option<PathBuf>,
    pub google_api_key: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            home: std::env::var("READSHELF_HOME").ok().map(PathBuf::from),
            google_api_key: std::env::var("READSHELF_GOOGLE_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// readshelf home directory
    pub home: PathBuf,
    /// File backing the persistence service
    pub storage_file: PathBuf,
    /// Storage key namespace
    pub prefix: String,
    /// Assumed storage capacity in bytes
    pub capacity_bytes: usize,
    /// Catalog client tunables
    pub catalog: CatalogSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Load configuration discovered from `start`, with `env` taking priority
fn load_config_from(start: &Path, env: EnvOverrides, default_home: PathBuf) -> Result<ResolvedConfig> {
    let config_file = find_config_file(start);

    let (config, config_dir) = match config_file {
        Some(ref path) => {
            let config = load_config_file(path)?;
            let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
            (config, Some(dir))
        }
        None => (ConfigFile::default(), None),
    };

    let home = env
        .home
        .clone()
        .or_else(|| config_dir.clone())
        .unwrap_or(default_home);

    let storage_file = match (&config.storage.file, &config_dir) {
        (Some(file), Some(dir)) => resolve_path(dir, file),
        (Some(file), None) => resolve_path(&home, file),
        (None, _) => home.join(DEFAULT_STORAGE_FILE),
    };

    let mut catalog = config.catalog.settings();
    if env.google_api_key.is_some() {
        catalog.google_api_key = env.google_api_key;
    }

    Ok(ResolvedConfig {
        home,
        storage_file,
        prefix: config
            .storage
            .prefix
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
        capacity_bytes: config.storage.capacity_bytes.unwrap_or(DEFAULT_CAPACITY_BYTES),
        catalog,
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    load_config_from(&cwd, EnvOverrides::from_env(), default_home)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration, bypassing the global cache
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(root: &Path, yaml: &str) -> PathBuf {
        let dir = root.join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", yaml).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let temp = TempDir::new().unwrap();
        let home = temp.path().join("home");

        let config = load_config_from(temp.path(), EnvOverrides::default(), home.clone()).unwrap();

        assert_eq!(config.home, home);
        assert_eq!(config.storage_file, home.join("library.json"));
        assert_eq!(config.prefix, "readshelf_");
        assert_eq!(config.capacity_bytes, 5 * 1024 * 1024);
        assert_eq!(config.catalog, CatalogSettings::default());
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
version: "1"
storage:
  prefix: test_
  file: data/shelf.json
catalog:
  default_source: googlebooks
  cache_ttl_seconds: 60
  max_retries: 1
  retry_initial_delay_ms: 250
"#,
        );

        let file = load_config_file(&path).unwrap();
        assert_eq!(file.version.as_deref(), Some("1"));
        assert_eq!(file.catalog.default_source, Some(Source::GoogleBooks));

        let config = load_config_from(temp.path(), EnvOverrides::default(), PathBuf::from("/unused")).unwrap();
        let dir = temp.path().join(CONFIG_DIR);
        assert_eq!(config.home, dir);
        assert_eq!(config.storage_file, dir.join("data/shelf.json"));
        assert_eq!(config.prefix, "test_");
        assert_eq!(config.catalog.default_source, Source::GoogleBooks);
        assert_eq!(config.catalog.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.catalog.retry.max_attempts, 2);
        assert_eq!(config.catalog.retry.initial_delay_ms, 250);
        assert_eq!(config.config_file, Some(path));
    }

    #[test]
    fn test_discovery_walks_up() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "storage:\n  prefix: up_");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = load_config_from(&nested, EnvOverrides::default(), PathBuf::from("/unused")).unwrap();
        assert_eq!(config.prefix, "up_");
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "catalog:\n  google_api_key: from-file");
        let env = EnvOverrides {
            home: Some(PathBuf::from("/env/home")),
            google_api_key: Some("from-env".to_string()),
        };

        let config = load_config_from(temp.path(), env, PathBuf::from("/unused")).unwrap();
        assert_eq!(config.home, PathBuf::from("/env/home"));
        assert_eq!(config.catalog.google_api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_invalid_yaml_reports_path() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "catalog: [not, a, map]");

        let err = load_config_from(temp.path(), EnvOverrides::default(), PathBuf::from("/unused")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/.readshelf");

        assert_eq!(
            resolve_path(&base, "shelf.json"),
            PathBuf::from("/home/user/.readshelf/shelf.json")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/shelf.json"),
            PathBuf::from("/absolute/shelf.json")
        );
    }
}
