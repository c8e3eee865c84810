//! Server configuration

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::DEFAULT_SCROLLBACK;
use crate::server::ServerOptions;

/// terminfo entry whose presence selects `xterm-256color` as `TERM`
const XTERM_256_TERMINFO: &str = "/usr/share/terminfo/x/xterm-256color";

/// Server configuration, read once at startup
///
/// Every field is optional in the file; missing ones take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Program run in each terminal
    pub shell: String,
    pub shell_args: Vec<String>,
    /// Working directory for new terminals; the server's own when unset
    pub cwd: Option<String>,
    /// Value of `TERM` in the child environment
    pub term_name: String,
    /// Extra environment variables for the child
    pub env: BTreeMap<String, String>,
    pub limit_per_user: Option<usize>,
    pub limit_global: Option<usize>,
    /// Keep a disconnected client's terminals alive for `grace_secs`
    pub resume: bool,
    pub grace_secs: u64,
    pub hostname: String,
    pub port: u16,
    /// Scrollback lines for `webtty-headless` when `--scrollback` is not given
    pub scrollback: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string()),
            shell_args: Vec::new(),
            cwd: None,
            term_name: default_term_name(),
            env: BTreeMap::new(),
            limit_per_user: None,
            limit_global: None,
            resume: false,
            grace_secs: 30,
            hostname: "0.0.0.0".to_string(),
            port: 8080,
            scrollback: DEFAULT_SCROLLBACK,
        }
    }
}

fn default_term_name() -> String {
    if Path::new(XTERM_256_TERMINFO).exists() {
        "xterm-256color".to_string()
    } else {
        "xterm".to_string()
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.resolve_shell(path.parent());
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load `path` if given, else the default location if it exists, else defaults
    ///
    /// An explicit path that cannot be read is an error; a broken file at the
    /// default location is logged and ignored.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        if let Some(path) = default_config_path() {
            if path.exists() {
                match Self::load(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config")
                    }
                }
            }
        }
        Ok(Self::default())
    }

    /// A relative shell path containing a slash is taken relative to the config file
    fn resolve_shell(&mut self, dir: Option<&Path>) {
        let shell = Path::new(&self.shell);
        if self.shell.contains('/') && shell.is_relative() {
            if let Some(dir) = dir {
                self.shell = dir.join(shell).to_string_lossy().into_owned();
            }
        }
    }

    /// Address for the TCP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            shell: self.shell.clone(),
            shell_args: self.shell_args.clone(),
            cwd: self.cwd.clone(),
            term_name: self.term_name.clone(),
            env: self.env.clone(),
            limit_per_user: self.limit_per_user,
            limit_global: self.limit_global,
            resume: self.resume,
            grace: Duration::from_secs(self.grace_secs),
        }
    }
}

/// `~/.webtty/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".webtty").join("config.json"))
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
