//! Layered configuration loading.
//!
//! A [`ConfigLoader`] stacks these sources, later ones winning field by field:
//!
//! 1. [`TetherConfig::default`]
//! 2. the profile file, `tether.{profile}.toml` (or `.yaml` / `.yml`)
//! 3. the main file, `tether.toml` (or `.yaml` / `.yml`)
//! 4. `TETHER_*` environment variables, `__` separating nested keys
//! 5. configs passed to [`ConfigLoader::merge`], in call order
//!
//! The profile comes from [`ConfigLoader::profile`] or `TETHER_PROFILE` and is
//! matched case-insensitively. Without one, no profile file is read.
//!
//! Files are looked up in the configured search paths (the current directory
//! and `$CONFIG_DIR/tether` when none are given). The first directory holding
//! either file is used. With [`ConfigLoader::file`] the main file is fixed and
//! the profile file is looked up next to it.
//!
//! TOML needs the `toml-config` feature (on by default), YAML the
//! `yaml-config` feature.
//!
//! ```rust,ignore
//! // TETHER_ADAPTERS__SLACK__TOKEN=xoxb-... overrides adapters.slack.token
//! let config = ConfigLoader::new()
//!     .with_current_dir()
//!     .profile("production")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::TetherConfig;
use super::validation::validate_config;

/// File stem shared by the main and profile files.
const FILE_STEM: &str = "tether";

/// Prefix of the environment variables read by the loader.
const ENV_PREFIX: &str = "TETHER_";

/// Environment variable naming the active profile.
const PROFILE_VAR: &str = "TETHER_PROFILE";

/// File extensions enabled by the format features, in lookup order.
#[allow(unused_mut)]
fn extensions() -> Vec<&'static str> {
    let mut exts = Vec::new();
    #[cfg(feature = "toml-config")]
    exts.push("toml");
    #[cfg(feature = "yaml-config")]
    exts.extend(["yaml", "yml"]);
    exts
}

fn normalize_profile(raw: &str) -> Option<String> {
    let name = raw.trim().to_lowercase();
    (!name.is_empty()).then_some(name)
}

/// The files one load will read.
#[derive(Debug, Default, PartialEq)]
struct ConfigFiles {
    profile: Option<PathBuf>,
    main: Option<PathBuf>,
}

/// Builds a [`TetherConfig`] from files, the environment and code.
pub struct ConfigLoader {
    profile: Option<String>,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
    overrides: Vec<TetherConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader. The profile defaults to `TETHER_PROFILE`.
    pub fn new() -> Self {
        Self {
            profile: std::env::var(PROFILE_VAR)
                .ok()
                .and_then(|p| normalize_profile(&p)),
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
            overrides: Vec::new(),
        }
    }

    /// Selects the profile file to layer under the main file.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = normalize_profile(profile.as_ref());
        self
    }

    /// Returns the active profile, lower-cased.
    pub fn active_profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Adds a directory to search for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `$CONFIG_DIR/tether` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join(FILE_STEM)),
            None => self,
        }
    }

    /// Uses `path` as the main file instead of searching.
    ///
    /// Loading fails if the file does not exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Reads `TETHER_*` variables (the default).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Ignores `TETHER_*` variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Layers `config` on top of every other source.
    ///
    /// Every field of `config` is applied, including those left at their
    /// defaults.
    pub fn merge(mut self, config: TetherConfig) -> Self {
        self.overrides.push(config);
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<TetherConfig> {
        let files = self.locate()?;
        let figment = self.layer(&files)?;

        let config: TetherConfig = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;
        validate_config(&config)?;

        debug!(
            profile = self.profile.as_deref().unwrap_or("-"),
            logging_level = %config.logging.level,
            funnel_capacity = config.runtime.funnel_capacity,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn layer(&self, files: &ConfigFiles) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(TetherConfig::default()));

        if let Some(path) = &files.profile {
            info!(path = %path.display(), "Loading profile configuration file");
            figment = merge_file(figment, path)?;
        }
        if let Some(path) = &files.main {
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_file(figment, path)?;
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["profile"]));
        }

        for config in &self.overrides {
            figment = figment.merge(Serialized::defaults(config));
        }

        Ok(figment)
    }

    fn locate(&self) -> ConfigResult<ConfigFiles> {
        if let Some(path) = &self.config_file {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            return Ok(ConfigFiles {
                profile: self.profile_next_to(path),
                main: Some(path.clone()),
            });
        }

        let found = self
            .search_dirs()
            .iter()
            .map(|dir| self.files_in(dir))
            .find(|files| files.main.is_some() || files.profile.is_some())
            .unwrap_or_default();
        if found == ConfigFiles::default() {
            warn!("No configuration file found, using defaults");
        }
        Ok(found)
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(FILE_STEM)))
            .collect()
    }

    fn files_in(&self, dir: &Path) -> ConfigFiles {
        let first = |stem: &str| {
            extensions()
                .into_iter()
                .map(|ext| dir.join(format!("{stem}.{ext}")))
                .find(|path| path.is_file())
        };
        ConfigFiles {
            profile: self
                .profile
                .as_ref()
                .and_then(|p| first(&format!("{FILE_STEM}.{p}"))),
            main: first(FILE_STEM),
        }
    }

    /// `config/bot.toml` with profile `prod` pairs with `config/bot.prod.toml`.
    fn profile_next_to(&self, main: &Path) -> Option<PathBuf> {
        let profile = self.profile.as_ref()?;
        let stem = main.file_stem()?.to_str()?;
        let ext = main.extension()?.to_str()?;
        let candidate = main.with_file_name(format!("{stem}.{profile}.{ext}"));
        candidate.is_file().then_some(candidate)
    }
}

/// Merges one file, picking the format from its extension.
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::ParseError(format!(
            "Unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::schema::{LogFormat, LogLevel};

    fn capacity(funnel_capacity: usize) -> TetherConfig {
        let mut config = TetherConfig::default();
        config.runtime.funnel_capacity = funnel_capacity;
        config
    }

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level.as_str(), "info");
            assert_eq!(config.runtime.funnel_capacity, 1024);
            Ok(())
        });
    }

    #[test]
    fn test_profile_is_normalized() {
        Jail::expect_with(|jail| {
            jail.set_env("TETHER_PROFILE", " Staging ");
            assert_eq!(ConfigLoader::new().active_profile(), Some("staging"));
            assert_eq!(ConfigLoader::new().profile("PROD").active_profile(), Some("prod"));
            assert_eq!(ConfigLoader::new().profile("  ").active_profile(), None);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("TETHER_LOGGING__LEVEL", "debug");
            jail.set_env("TETHER_RUNTIME__FUNNEL_CAPACITY", "64");
            jail.set_env("TETHER_ADAPTERS__SLACK__TOKEN", "xoxb-env");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.runtime.funnel_capacity, 64);
            let slack = config.adapters.get("slack").ok_or("missing slack section")?;
            assert_eq!(
                slack.find_ref("token").and_then(|v| v.as_str()),
                Some("xoxb-env")
            );
            Ok(())
        });
    }

    #[test]
    fn test_merged_config_wins_over_env() {
        Jail::expect_with(|jail| {
            jail.set_env("TETHER_RUNTIME__FUNNEL_CAPACITY", "64");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(capacity(7))
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.runtime.funnel_capacity, 7);
            Ok(())
        });
    }

    #[test]
    fn test_later_merges_win() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .merge(capacity(7))
                .merge(capacity(9))
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.runtime.funnel_capacity, 9);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        Jail::expect_with(|jail| {
            jail.set_env("TETHER_RUNTIME__FUNNEL_CAPACITY", "0");
            let result = ConfigLoader::new().search_path(jail.directory()).load();
            assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = ConfigLoader::new()
            .file("/definitely/not/here/tether.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("tether.ini", "level = debug")?;
            let result = ConfigLoader::new().file("tether.ini").without_env().load();
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_with_profile_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tether.toml",
                r#"
                [logging]
                level = "warn"
                format = "pretty"

                [adapters.slack]
                token = "xoxb-file"
                listen_passive = true
                "#,
            )?;
            jail.create_file(
                "tether.production.toml",
                r#"
                [logging]
                level = "error"

                [runtime]
                funnel_capacity = 8
                "#,
            )?;
            jail.set_env("TETHER_ADAPTERS__SLACK__TOKEN", "xoxb-env");

            let config = ConfigLoader::new()
                .profile("Production")
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;

            // The main file sits above the profile file.
            assert_eq!(config.logging.level, LogLevel::Warn);
            assert_eq!(config.logging.format, LogFormat::Pretty);
            assert_eq!(config.runtime.funnel_capacity, 8);

            let slack = config.adapters.get("slack").ok_or("missing slack section")?;
            assert_eq!(
                slack.find_ref("token").and_then(|v| v.as_str()),
                Some("xoxb-env")
            );
            assert_eq!(
                slack.find_ref("listen_passive").and_then(|v| v.to_bool()),
                Some(true)
            );
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_explicit_file_picks_up_profile_sibling() {
        Jail::expect_with(|jail| {
            jail.create_dir("conf")?;
            jail.create_file("conf/bot.toml", "[logging]\nlevel = \"warn\"\n")?;
            jail.create_file("conf/bot.prod.toml", "[runtime]\nfunnel_capacity = 16\n")?;

            let config = ConfigLoader::new()
                .file("conf/bot.toml")
                .profile("prod")
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level, LogLevel::Warn);
            assert_eq!(config.runtime.funnel_capacity, 16);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_only_tether_files_are_searched() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[runtime]\nfunnel_capacity = 3\n")?;

            let loader = ConfigLoader::new().search_path(jail.directory());
            assert_eq!(loader.locate().map_err(|e| e.to_string())?, ConfigFiles::default());
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_first_directory_with_a_file_wins() {
        Jail::expect_with(|jail| {
            jail.create_dir("empty")?;
            jail.create_dir("second")?;
            jail.create_dir("third")?;
            jail.create_file("second/tether.toml", "[runtime]\nfunnel_capacity = 2\n")?;
            jail.create_file("third/tether.toml", "[runtime]\nfunnel_capacity = 3\n")?;

            let config = ConfigLoader::new()
                .search_path(jail.directory().join("empty"))
                .search_path(jail.directory().join("second"))
                .search_path(jail.directory().join("third"))
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.runtime.funnel_capacity, 2);
            Ok(())
        });
    }
}
