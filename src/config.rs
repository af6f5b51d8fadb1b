//! Tool configuration.
//!
//! Layered: builtin defaults, then the user config file, then the project
//! `drydock.json`, then environment variables. Every component reads the
//! resolved `Config`; nothing consults the environment after load.
use crate::profile::CatalogOverrides;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROJECT_CONFIG_FILE: &str = "drydock.json";
pub const DEFAULT_REGISTRY: &str = "https://crandb.r-pkg.org";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_R_VERSION: &str = "4.4.1";

/// One config file's contents; every field optional so layers overlay.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    registry: Option<String>,
    timeout_ms: Option<u64>,
    extensions: Option<Vec<String>>,
    docker: Option<Vec<String>>,
    r_version: Option<String>,
    #[serde(default)]
    catalog: CatalogOverrides,
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub registry: String,
    pub timeout: Duration,
    pub extensions: Vec<String>,
    pub docker: Vec<String>,
    pub r_version: String,
    pub catalog: CatalogOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            extensions: vec!["R".to_string(), "Rmd".to_string(), "qmd".to_string()],
            docker: vec!["docker".to_string()],
            r_version: DEFAULT_R_VERSION.to_string(),
            catalog: CatalogOverrides::default(),
        }
    }
}

impl Config {
    /// Resolve configuration for a project, lowest layer first.
    pub fn load(project_root: &Path) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = user_config_path() {
            config.apply_file(&path)?;
        }
        config.apply_file(&project_root.join(PROJECT_CONFIG_FILE))?;
        config.apply_env()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Ok(());
        }
        let text =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let file: ConfigFile =
            serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
        if let Some(registry) = file.registry {
            self.registry = registry;
        }
        if let Some(timeout_ms) = file.timeout_ms {
            self.timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(extensions) = file.extensions {
            self.extensions = extensions;
        }
        if let Some(docker) = file.docker {
            self.docker = docker;
        }
        if let Some(r_version) = file.r_version {
            self.r_version = r_version;
        }
        self.catalog.profiles.extend(file.catalog.profiles);
        self.catalog.system_libs.extend(file.catalog.system_libs);
        self.catalog.packages.extend(file.catalog.packages);
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(registry) = env::var("DRYDOCK_REGISTRY") {
            self.registry = registry;
        }
        if let Ok(raw) = env::var("DRYDOCK_TIMEOUT_MS") {
            let timeout_ms: u64 = raw
                .parse()
                .with_context(|| format!("parse DRYDOCK_TIMEOUT_MS ({raw:?})"))?;
            self.timeout = Duration::from_millis(timeout_ms);
        }
        if let Ok(raw) = env::var("DRYDOCK_DOCKER") {
            self.docker =
                shell_words::split(&raw).with_context(|| format!("parse DRYDOCK_DOCKER ({raw:?})"))?;
        }
        Ok(())
    }
}

fn user_config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("drydock").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_without_any_files() {
        let dir = TempDir::new().expect("temp project");
        let config = Config::load(dir.path()).expect("load");
        assert_eq!(config.registry, DEFAULT_REGISTRY);
        assert_eq!(config.docker, vec!["docker".to_string()]);
        assert!(config.extensions.contains(&"Rmd".to_string()));
    }

    #[test]
    fn project_file_overlays_defaults() {
        let dir = TempDir::new().expect("temp project");
        fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            r#"{ "registry": "http://127.0.0.1:9", "timeout_ms": 250 }"#,
        )
        .expect("write config");
        let config = Config::load(dir.path()).expect("load");
        assert_eq!(config.registry, "http://127.0.0.1:9");
        assert_eq!(config.timeout, Duration::from_millis(250));
        // Untouched fields keep their defaults.
        assert_eq!(config.r_version, DEFAULT_R_VERSION);
    }

    #[test]
    fn catalog_overrides_are_collected() {
        let dir = TempDir::new().expect("temp project");
        fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            r#"{ "catalog": { "packages": { "lab": ["targets", "arrow"] } } }"#,
        )
        .expect("write config");
        let config = Config::load(dir.path()).expect("load");
        assert_eq!(
            config.catalog.packages["lab"],
            vec!["targets".to_string(), "arrow".to_string()]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().expect("temp project");
        fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            r#"{ "registy": "typo" }"#,
        )
        .expect("write config");
        assert!(Config::load(dir.path()).is_err());
    }
}
