//! Key and token management for the runner gateway

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use runner_gateway::auth::paseto::{generate_asymmetric_key_pair, generate_symmetric_key};
use runner_gateway::auth::{build_provider, AuthorizationService};
use runner_gateway::config::Settings;
use runner_gateway::infrastructure::{init_tracing, log_messages::keys as messages};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "gateway-keys", version, about = "Manage runner gateway keys and tokens")]
struct Cli {
    /// Settings file; defaults to the layered `config/` directory
    #[arg(short, long, global = true, env = "RUNNER_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a fresh hex encoded symmetric key
    Symmetric,

    /// Write a fresh ed25519 key pair to the configured key paths
    Asymmetric {
        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Print a signed public token
    Public,

    /// Print an encrypted local token
    Private,

    /// Check a token, exiting non-zero when it is rejected
    Validate {
        token: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::new().context("failed to load settings")?,
    };
    init_tracing(&settings.logging);

    match cli.command {
        Commands::Symmetric => {
            println!("{}", generate_symmetric_key(settings.paseto.version)?);
        }
        Commands::Asymmetric { force } => {
            let pair = generate_asymmetric_key_pair(settings.paseto.version)?;
            write_key_file(&settings.paseto.key_path, &pair.private_key, force, true)?;
            write_key_file(&settings.paseto.public_path, &pair.public_key, force, false)?;
            info!(
                version = %settings.paseto.version,
                key_path = %settings.paseto.key_path.display(),
                public_path = %settings.paseto.public_path.display(),
                "{}",
                messages::KEY_PAIR_WRITTEN
            );
        }
        Commands::Public => {
            println!("{}", authorization(&settings)?.generate_public_paseto()?);
        }
        Commands::Private => {
            println!("{}", authorization(&settings)?.generate_private_paseto()?);
        }
        Commands::Validate { token } => {
            let token = token.trim();
            authorization(&settings)?
                .validate_token(token.strip_prefix("Bearer ").unwrap_or(token))
                .context("token rejected")?;
            println!("valid");
        }
    }

    Ok(())
}

fn authorization(settings: &Settings) -> Result<AuthorizationService> {
    let provider = build_provider(&settings.paseto)?;
    Ok(AuthorizationService::new(provider, settings.paseto.expiration()))
}

fn write_key_file(path: &Path, contents: &str, force: bool, private: bool) -> Result<()> {
    if path.exists() && !force {
        warn!(path = %path.display(), "{}", messages::KEY_FILE_EXISTS);
        bail!("{} already exists, pass --force to overwrite", path.display());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    // applies to overwritten files as well
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if private { 0o600 } else { 0o644 };
        file.set_permissions(std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = private;

    file.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}
