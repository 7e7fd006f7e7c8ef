//! Project configuration management for `garcon.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── app        # [[apps]], [[apps.bundles]]
//! │   └── server     # [server], [server.proxy]
//! ├── types/         # ConfigError
//! └── mod.rs         # GarconConfig (this file)
//! ```
//!
//! Relative paths in the file resolve against the directory holding it.

pub mod section;
pub mod types;
mod util;

use util::{find_config_file, normalize_path};

pub use section::{AppConfig, BundleConfig, ProxyConfig, ServerConfig};
pub use types::ConfigError;

use crate::cli::{Cli, Commands};
use crate::log;
use anyhow::{Result, bail};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Root configuration structure representing garcon.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GarconConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub apps: Vec<AppConfig>,
}

impl GarconConfig {
    /// Load configuration from CLI arguments, searching upward from cwd for
    /// the config file.
    pub fn load(cli: &Cli) -> Result<Self> {
        let Some(config_path) = find_config_file(&cli.config) else {
            bail!(
                "config file `{}` not found in this directory or any parent",
                cli.config.display()
            );
        };

        let mut config = Self::from_path(&config_path)?;
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_path = config_path;
        config.finalize(&root);
        config.apply_command_options(cli);
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::from)?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} are ignored:", display_path);
        for field in fields {
            log!("warning"; "- {}", field);
        }
    }

    /// Resolve paths against `root` and fill in computed defaults.
    fn finalize(&mut self, root: &Path) {
        self.root = root.to_path_buf();

        let version = default_build_version();
        for (index, app) in self.apps.iter_mut().enumerate() {
            if app.name.is_empty() {
                app.name = format!("app{}", index + 1);
                log!("warning"; "application #{} has no name, serving it as `{}`", index + 1, app.name);
            }
            app.build_version.get_or_insert_with(|| version.clone());
            app.save_path = normalize_path(&root.join(&app.save_path));
        }
    }

    fn apply_command_options(&mut self, cli: &Cli) {
        if let Commands::Serve { port, hostname } = &cli.command {
            Self::update_option(&mut self.server.port, port.as_ref());
            Self::update_option(&mut self.server.hostname, hostname.as_ref());
        }
    }

    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.apps.is_empty() {
            log!("warning"; "no applications configured");
        }

        let mut names = FxHashSet::default();
        for app in &self.apps {
            if !names.insert(app.name.as_str()) {
                return Err(ConfigError::DuplicateApp(app.name.clone()));
            }
            Self::validate_bundles(&app.name, &app.bundles)?;
        }

        if let Some(proxy) = &self.server.proxy
            && proxy.host.is_empty()
        {
            return Err(ConfigError::Validation(
                "[server.proxy] host must not be empty".into(),
            ));
        }

        Ok(())
    }

    fn validate_bundles(app: &str, bundles: &[BundleConfig]) -> Result<(), ConfigError> {
        for bundle in bundles {
            if bundle.path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "a bundle of application `{app}` has no path"
                )));
            }
            Self::validate_bundles(app, &bundle.bundles)?;
        }
        Ok(())
    }
}

fn default_build_version() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
        .to_string()
}

/// Parse a config snippet, failing on unknown fields.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> GarconConfig {
    let (parsed, ignored) = GarconConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
