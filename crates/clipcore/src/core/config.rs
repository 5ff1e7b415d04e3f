//! Runtime configuration
//!
//! Layered with `figment`, lowest priority first:
//! 1. built-in defaults (`Config::default()`)
//! 2. optional TOML file (`clipgrab.toml` or `--config <path>`)
//! 3. `CLIPGRAB_*` environment variables (`CLIPGRAB_PORT=8080`)
//!
//! The legacy `YTDL_BIN` variable is honored for the extractor path, below
//! `CLIPGRAB_EXTRACTOR_BIN`.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "clipgrab.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CLIPGRAB_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to
    pub host: String,

    /// Port the HTTP server listens on
    pub port: u16,

    /// Extractor executable (`yt-dlp`, or `python3` with `extractor_args = ["-m", "yt_dlp"]`)
    pub extractor_bin: String,

    /// Arguments placed before every extractor argument list
    pub extractor_args: Vec<String>,

    /// Parent directory for per-session work dirs
    pub work_root: PathBuf,

    /// Upper bound for the title fetch
    pub title_timeout_secs: u64,

    /// Upper bound for one whole session (title fetch + download)
    pub session_timeout_secs: u64,

    /// How long a finished artifact stays retrievable
    pub registry_ttl_secs: u64,

    /// How often expired registry entries are purged
    pub sweep_interval_secs: u64,

    /// Event frames buffered between a session and its client
    pub event_buffer: usize,

    /// Default tracing filter (overridden by `RUST_LOG`)
    pub log_filter: String,

    /// Optional log file in addition to the console
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            extractor_bin: "yt-dlp".to_string(),
            extractor_args: Vec::new(),
            work_root: std::env::temp_dir(),
            title_timeout_secs: 120,
            // Source media can be huge; an hour of wall clock
            session_timeout_secs: 3600,
            registry_ttl_secs: 300,
            sweep_interval_secs: 30,
            event_buffer: 64,
            log_filter: "info".to_string(),
            log_file: None,
        }
    }
}

impl Config {
    /// Builds the figment without extracting, so callers can layer more providers.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let file = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::raw().only(&["YTDL_BIN"]).map(|_| "extractor_bin".into()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Loads configuration from defaults, file and environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(config_file).extract()
    }

    pub fn title_timeout(&self) -> Duration {
        Duration::from_secs(self.title_timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn registry_ttl(&self) -> Duration {
        Duration::from_secs(self.registry_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // A zero interval would make tokio::time::interval panic
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// `host:port` as given in the config
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let config = Config::load(None)?;
            assert_eq!(config, Config::default());
            assert_eq!(config.registry_ttl(), Duration::from_secs(300));
            assert_eq!(config.session_timeout(), Duration::from_secs(3600));
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                port = 8080
                extractor_bin = "python3"
                extractor_args = ["-m", "yt_dlp"]
                registry_ttl_secs = 60
                "#,
            )?;
            jail.set_env("CLIPGRAB_PORT", "9090");

            let config = Config::load(None)?;
            assert_eq!(config.port, 9090);
            assert_eq!(config.extractor_bin, "python3");
            assert_eq!(config.extractor_args, vec!["-m".to_string(), "yt_dlp".to_string()]);
            assert_eq!(config.registry_ttl_secs, 60);
            assert_eq!(config.bind_address(), "0.0.0.0:9090");
            Ok(())
        });
    }

    #[test]
    fn test_legacy_ytdl_bin_is_honored() {
        Jail::expect_with(|jail| {
            jail.set_env("YTDL_BIN", "/opt/yt-dlp");
            let config = Config::load(None)?;
            assert_eq!(config.extractor_bin, "/opt/yt-dlp");

            jail.set_env("CLIPGRAB_EXTRACTOR_BIN", "/usr/local/bin/yt-dlp");
            let config = Config::load(None)?;
            assert_eq!(config.extractor_bin, "/usr/local/bin/yt-dlp");
            Ok(())
        });
    }

    #[test]
    fn test_sweep_interval_never_zero() {
        let config = Config {
            sweep_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
