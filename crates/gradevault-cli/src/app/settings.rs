//! Settings resolution. Precedence: flag, then environment, then config file.

use std::path::{Path, PathBuf};

use gradevault_core::KdfParams;
use secrecy::SecretString;

use crate::cli::Cli;
use crate::config::{default_config_path, default_root, read_config, GradevaultConfig};
use crate::constants::env_vars;
use crate::errors::CliError;

#[derive(Debug)]
pub struct Settings {
    pub root: PathBuf,
    pub server_secret: SecretString,
    pub kdf: KdfParams,
}

pub fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let config = load_config(cli.config.as_deref())?;
    let env_secret = non_empty_env(env_vars::SERVER_SECRET);
    resolve(cli.root.as_deref(), env_secret, config)
}

fn load_config(explicit: Option<&str>) -> anyhow::Result<GradevaultConfig> {
    match explicit {
        Some(path) => {
            let path = Path::new(path);
            if !path.exists() {
                return Err(CliError::not_found(
                    format!("Config file not found: {}", path.display()),
                    format!("Create it or unset {}", env_vars::CONFIG),
                )
                .into());
            }
            read_config(path)
        }
        None => {
            let path = default_config_path()?;
            if path.exists() {
                read_config(&path)
            } else {
                Ok(GradevaultConfig::default())
            }
        }
    }
}

fn resolve(
    root_flag: Option<&str>,
    env_secret: Option<String>,
    config: GradevaultConfig,
) -> anyhow::Result<Settings> {
    let root = match root_flag.or(config.storage.root.as_deref()) {
        Some(root) => PathBuf::from(root),
        None => default_root()?,
    };

    let server_secret = env_secret
        .or(config.security.server_secret)
        .filter(|secret| !secret.is_empty())
        .ok_or_else(|| {
            CliError::invalid_input(format!(
                "No server secret configured. Set {} or security.server_secret in the config file.",
                env_vars::SERVER_SECRET
            ))
        })?;

    Ok(Settings {
        root,
        server_secret: SecretString::from(server_secret),
        kdf: KdfParams::new(config.security.kdf_iterations)?,
    })
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
