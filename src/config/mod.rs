use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths::Paths;

/// Bounds for `backend.request_timeout_ms`.
pub const MIN_REQUEST_TIMEOUT_MS: u64 = 1_000;
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Lowest port the HTTP transport may bind to.
pub const MIN_PORT: u16 = 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Resolved XDG-compliant paths (not serialized)
    #[serde(skip)]
    pub paths: Paths,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the trading service
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Dashboard URL shown after registration, also the allowed CORS origin
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Wall-clock budget for a single backend call, in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Identity file override. Defaults to data_dir/agent_identity.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Keep the secret in the OS keychain when one is available (default: true)
    #[serde(default = "default_true")]
    pub use_vault: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Error detail exposure: "hardened" (default) or "permissive"
    #[serde(default)]
    pub mode: RuntimeMode,
}

/// Controls whether internal error detail reaches the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    /// Backend and unexpected errors are replaced with generic text.
    #[default]
    Hardened,
    /// Backend and unexpected errors are shown verbatim.
    Permissive,
}

impl RuntimeMode {
    pub fn is_permissive(self) -> bool {
        self == RuntimeMode::Permissive
    }
}

impl std::str::FromStr for RuntimeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hardened" | "production" => Ok(RuntimeMode::Hardened),
            "permissive" | "development" => Ok(RuntimeMode::Permissive),
            other => anyhow::bail!(
                "Invalid security mode '{}': expected 'hardened' or 'permissive'",
                other
            ),
        }
    }
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeMode::Hardened => f.write_str("hardened"),
            RuntimeMode::Permissive => f.write_str("permissive"),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            file: None,
            use_vault: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "text" (default) or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}
fn default_request_timeout() -> u64 {
    30_000
}
fn default_port() -> u16 {
    3001
}
fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            frontend_url: default_frontend_url(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load from the default location, creating a template on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from an explicit config file, or the default location when `None`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let paths = Paths::resolve()?;
        paths.ensure_dirs()?;
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| paths.config_file());

        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let mut config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?;
            config.expand_env_vars();
            config
        } else {
            let config = Config::default();
            write_template(&path)?;
            config
        };

        config.paths = paths;
        config.apply_env_overrides(|key| std::env::var(key))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = self.paths.config_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Paths::resolve()?.config_file())
    }

    /// Apply `TRADEGATE_*` environment overrides on top of file values.
    pub fn apply_env_overrides<F>(&mut self, env_fn: F) -> Result<()>
    where
        F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
    {
        let get = |key: &str| env_fn(key).ok().filter(|v| !v.trim().is_empty());

        if let Some(url) = get("TRADEGATE_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Some(url) = get("TRADEGATE_FRONTEND_URL") {
            self.backend.frontend_url = url;
        }
        if let Some(port) = get("TRADEGATE_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("TRADEGATE_PORT is not a port number: {}", port))?;
        }
        if let Some(file) = get("TRADEGATE_IDENTITY_FILE") {
            self.identity.file = Some(file);
        }
        if let Some(timeout) = get("TRADEGATE_REQUEST_TIMEOUT_MS") {
            self.backend.request_timeout_ms = timeout.trim().parse().with_context(|| {
                format!("TRADEGATE_REQUEST_TIMEOUT_MS is not a number: {}", timeout)
            })?;
        }
        if let Some(mode) = get("TRADEGATE_MODE") {
            self.security.mode = mode.parse()?;
        }

        Ok(())
    }

    /// Reject out-of-range values before anything uses them.
    pub fn validate(&self) -> Result<()> {
        check_url("backend.url", &self.backend.url)?;
        check_url("backend.frontend_url", &self.backend.frontend_url)?;

        if self.server.port < MIN_PORT {
            anyhow::bail!("server.port must be >= {} (got {})", MIN_PORT, self.server.port);
        }

        let timeout = self.backend.request_timeout_ms;
        if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&timeout) {
            anyhow::bail!(
                "backend.request_timeout_ms must be between {} and {} (got {})",
                MIN_REQUEST_TIMEOUT_MS,
                MAX_REQUEST_TIMEOUT_MS,
                timeout
            );
        }

        if let Some(ref file) = self.identity.file
            && file.trim().is_empty()
        {
            anyhow::bail!("identity.file cannot be empty");
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.request_timeout_ms)
    }

    /// Resolved identity file: explicit override (tilde-expanded) or the data dir default.
    pub fn identity_file(&self) -> PathBuf {
        match self.identity.file {
            Some(ref file) => PathBuf::from(shellexpand::tilde(file.trim()).to_string()),
            None => self.paths.identity_file(),
        }
    }

    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["backend", "url"] => Ok(self.backend.url.clone()),
            ["backend", "frontend_url"] => Ok(self.backend.frontend_url.clone()),
            ["backend", "request_timeout_ms"] => Ok(self.backend.request_timeout_ms.to_string()),
            ["server", "port"] => Ok(self.server.port.to_string()),
            ["server", "bind"] => Ok(self.server.bind.clone()),
            ["identity", "file"] => Ok(self.identity_file().display().to_string()),
            ["identity", "use_vault"] => Ok(self.identity.use_vault.to_string()),
            ["security", "mode"] => Ok(self.security.mode.to_string()),
            ["logging", "level"] => Ok(self.logging.level.clone()),
            ["logging", "format"] => Ok(self.logging.format.clone()),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
    }

    fn expand_env_vars(&mut self) {
        self.backend.url = expand_env(&self.backend.url);
        self.backend.frontend_url = expand_env(&self.backend.frontend_url);
        if let Some(ref mut file) = self.identity.file {
            *file = expand_env(file);
        }
    }
}

fn check_url(field: &str, value: &str) -> Result<()> {
    let url = reqwest::Url::parse(value)
        .with_context(|| format!("{} must be a valid URL (got '{}')", field, value))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("{} must use http or https (got '{}')", field, value);
    }
    Ok(())
}

fn expand_env(s: &str) -> String {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else if let Some(var_name) = s.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else {
        s.to_string()
    }
}

/// Write the commented template used on first run.
pub fn write_template(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    eprintln!("Created default config at {}", path.display());
    Ok(())
}

/// Default config template with helpful comments (used for first-time setup)
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# tradegate configuration
# Auto-created on first run. Environment variables (TRADEGATE_*) override these values.

[backend]
url = "http://localhost:8000"
frontend_url = "http://localhost:5173"
# 1000..=30000
request_timeout_ms = 30000

[server]
bind = "127.0.0.1"
port = 3001

[identity]
# file = "~/.local/share/tradegate/agent_identity.json"
# Store the API key in the OS keychain when available; otherwise it is kept
# in the identity file with 0600 permissions.
use_vault = true

[security]
# hardened: backend/internal errors are replaced with generic text
# permissive: full error detail is returned (local development)
mode = "hardened"

[logging]
level = "info"
# text | json
format = "text"
"#;
