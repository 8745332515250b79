use crate::auth::TokenVersion;
use crate::proxy::types::{
    RunnerName, RunnerPath, TargetHost, TargetScheme, DEFAULT_MAX_REQUEST_BYTES,
};
use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `RUNNER_GATEWAY__PASETO__SECRET_KEY`
pub const ENV_PREFIX: &str = "RUNNER_GATEWAY";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub paseto: PasetoSettings,
    #[serde(default)]
    pub runners: Vec<RunnerSettings>,
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

#[derive(Deserialize, Clone)]
pub struct PasetoSettings {
    pub version: TokenVersion,
    pub expiration_seconds: u64,
    /// PEM encoded ed25519 private key used for signing
    pub key_path: PathBuf,
    /// SSH authorized-key formatted ed25519 public key used for verification
    pub public_path: PathBuf,
    /// Hex encoded symmetric key for local tokens
    #[serde(default)]
    pub secret_key: String,
}

impl PasetoSettings {
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_seconds)
    }
}

impl std::fmt::Debug for PasetoSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasetoSettings")
            .field("version", &self.version)
            .field("expiration_seconds", &self.expiration_seconds)
            .field("key_path", &self.key_path)
            .field("public_path", &self.public_path)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// A backend service exposed under a path prefix
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub name: RunnerName,
    pub host: TargetHost,
    pub path: RunnerPath,
    #[serde(default)]
    pub scheme: TargetScheme,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub address: String,
    pub certificate_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub read_timeout_seconds: u64,
    pub write_timeout_seconds: u64,
    pub max_request_bytes: usize,
}

impl ServerSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_seconds)
    }

    /// TLS material, only when both the certificate and the key are configured
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.certificate_path, &self.key_path) {
            (Some(certificate), Some(key))
                if !certificate.as_os_str().is_empty() && !key.as_os_str().is_empty() =>
            {
                Some((certificate.as_path(), key.as_path()))
            }
            _ => None,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
            certificate_path: None,
            key_path: None,
            read_timeout_seconds: 30,
            write_timeout_seconds: 30,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl Settings {
    /// Load settings from `config/` files and the environment
    pub fn new() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Load settings from a single explicit file plus environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        defaults()?
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("logging.level", "info")?
        .set_default("logging.format", "pretty")?
        .set_default("paseto.version", "v4")?
        .set_default("paseto.expiration_seconds", 3600)?
        .set_default("paseto.key_path", "./settings/paseto.key")?
        .set_default("paseto.public_path", "./settings/paseto.pub")?
        .set_default("paseto.secret_key", "")?
        .set_default("server.address", "0.0.0.0:8080")?
        .set_default("server.read_timeout_seconds", 30)?
        .set_default("server.write_timeout_seconds", 30)?
        .set_default("server.max_request_bytes", DEFAULT_MAX_REQUEST_BYTES as u64)
}
