//! Application state for the signing server.

use ipasign_core::models::CleanupPolicy;
use ipasign_core::pipeline::{CommandRunner, SigningPipeline};
use ipasign_core::signing::SigningTools;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_UPLOAD_DIR: &str = "./uploads";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

/// Server configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,
    /// Landing directory for per-request workspaces.
    pub upload_dir: PathBuf,
    /// Maximum accepted request body size.
    pub max_upload_bytes: usize,
    /// Retention of request workspaces after a failure.
    pub cleanup: CleanupPolicy,
    /// Per-command timeout; `None` waits indefinitely.
    pub command_timeout: Option<Duration>,
    /// External tool settings.
    pub tools: SigningTools,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3000))),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cleanup: CleanupPolicy::default(),
            command_timeout: Some(Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS)),
            tools: SigningTools::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("IPASIGN_BIND_ADDR") {
            config.bind_addr = val
                .parse()
                .map_err(|e| format!("Invalid IPASIGN_BIND_ADDR: {}", e))?;
        }

        if let Ok(val) = std::env::var("IPASIGN_UPLOAD_DIR") {
            if val.is_empty() {
                return Err("IPASIGN_UPLOAD_DIR must not be empty".to_string());
            }
            config.upload_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("IPASIGN_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = val
                .parse()
                .map_err(|e| format!("Invalid IPASIGN_MAX_UPLOAD_BYTES: {}", e))?;
        }

        if let Ok(val) = std::env::var("IPASIGN_CLEANUP") {
            config.cleanup = val.parse()?;
        }

        if let Ok(val) = std::env::var("IPASIGN_COMMAND_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .map_err(|e| format!("Invalid IPASIGN_COMMAND_TIMEOUT_SECS: {}", e))?;
            config.command_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        config.tools = SigningTools::from_env();

        Ok(config)
    }

    /// Effective settings as `key = value` lines, for the `config` command.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("bind_addr", self.bind_addr.to_string()),
            ("upload_dir", self.upload_dir.display().to_string()),
            ("max_upload_bytes", self.max_upload_bytes.to_string()),
            ("cleanup", self.cleanup.to_string()),
            (
                "command_timeout_secs",
                self.command_timeout
                    .map(|t| t.as_secs().to_string())
                    .unwrap_or_else(|| "none".to_string()),
            ),
            ("security_bin", self.tools.security.display().to_string()),
            ("xcrun_bin", self.tools.xcrun.display().to_string()),
            ("sdk", self.tools.sdk.clone()),
            ("signing_identity", self.tools.identity.clone()),
            ("codesign_path", self.tools.codesign_path.display().to_string()),
            (
                "keychain",
                self.tools
                    .keychain
                    .as_ref()
                    .map(|k| k.display().to_string())
                    .unwrap_or_else(|| "default".to_string()),
            ),
        ]
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Import-then-sign pipeline shared by all requests.
    pub pipeline: Arc<SigningPipeline>,
}

impl AppState {
    /// Creates a new application state around the given command runner.
    pub fn new(config: ServerConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let pipeline = SigningPipeline::new(runner, config.tools.clone());
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}
