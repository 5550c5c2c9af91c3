//! Configuration for the registry sync pipeline.
//!
//! Settings come from three layers, lowest precedence first: built-in
//! defaults, an optional config file (TOML or JSON by extension), and
//! environment variables.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "dshs-sync.db";

/// Browser session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Remote Chrome DevTools endpoint (e.g. "ws://browser-pool:9222").
    /// When set, sessions connect to the shared remote browser instead of
    /// launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
    /// Access token for the remote endpoint, appended as a query parameter.
    #[serde(default)]
    pub remote_token: Option<String>,
    /// Path to a local Chromium executable. Auto-detected when unset.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    /// Run the local browser headless (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Page navigation timeout in seconds.
    #[serde(default = "default_nav_timeout")]
    pub nav_timeout_secs: u64,
    /// Quiet-network wait timeout in seconds. Postback result pages keep
    /// fetching after the load event fires.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Element lookup timeout in seconds.
    #[serde(default = "default_element_timeout")]
    pub element_timeout_secs: u64,
}

fn default_headless() -> bool {
    true
}

fn default_nav_timeout() -> u64 {
    60
}

fn default_idle_timeout() -> u64 {
    30
}

fn default_element_timeout() -> u64 {
    10
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            remote_url: None,
            remote_token: None,
            executable: None,
            headless: default_headless(),
            nav_timeout_secs: default_nav_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            element_timeout_secs: default_element_timeout(),
        }
    }
}

/// Sync orchestration tuning.
///
/// The right values depend on the source site's current tolerance, so these
/// are configuration rather than constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Delay between facilities in milliseconds (courtesy pacing).
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Consecutive per-facility failures before a single-county run aborts.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// Attempts to reacquire the browser session after a lost connection.
    #[serde(default = "default_reconnect_attempts")]
    pub session_reconnect_attempts: u32,
}

fn default_request_delay_ms() -> u64 {
    1500
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_reconnect_attempts() -> u32 {
    2
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            session_reconnect_attempts: default_reconnect_attempts(),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename within the data directory.
    pub database_filename: String,
    /// Database URL/path override (DATABASE_URL env var or config).
    pub database_url: Option<String>,
    pub browser: BrowserSettings,
    pub sync: SyncSettings,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: home dir -> current dir
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dshs-sync");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            browser: BrowserSettings::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl Settings {
    /// Full path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        if let Some(ref url) = self.database_url {
            PathBuf::from(url.trim_start_matches("sqlite:"))
        } else {
            self.data_dir.join(&self.database_filename)
        }
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }
}

/// Configuration file structure. Every field is optional; unset fields keep
/// their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncSettings>,
}

impl Config {
    /// Parse configuration from file contents, dispatching on extension.
    pub fn parse(contents: &str, extension: &str) -> Result<Self, String> {
        match extension {
            "toml" => {
                toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {}", e))
            }
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        Self::parse(&contents, ext)
    }

    /// Apply configuration on top of settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = PathBuf::from(data_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone();
        }
        if let Some(ref sync) = self.sync {
            settings.sync = sync.clone();
        }
    }
}

/// Options for loading settings from the CLI.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path.
    pub config_path: Option<PathBuf>,
    /// Data directory override (--data flag).
    pub data: Option<PathBuf>,
}

/// Load settings: defaults, then config file, then environment overrides.
pub fn load_settings(options: &LoadOptions) -> Settings {
    let mut settings = Settings::default();

    if let Some(ref path) = options.config_path {
        match Config::load_from_path(path) {
            Ok(config) => config.apply_to_settings(&mut settings),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    if let Some(ref data) = options.data {
        settings.data_dir = data.clone();
    }

    if let Some(url) = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()) {
        tracing::debug!("Using DATABASE_URL from environment");
        settings.database_url = Some(url);
    }
    if let Some(ws) = std::env::var("BROWSER_WS_URL")
        .ok()
        .filter(|s| !s.is_empty())
    {
        tracing::debug!("Using BROWSER_WS_URL from environment: {}", ws);
        settings.browser.remote_url = Some(ws);
    }
    if let Some(token) = std::env::var("BROWSER_TOKEN").ok().filter(|s| !s.is_empty()) {
        settings.browser.remote_token = Some(token);
    }
    if let Some(path) = std::env::var("CHROME_PATH").ok().filter(|s| !s.is_empty()) {
        settings.browser.executable = Some(PathBuf::from(path));
    }

    settings
}
