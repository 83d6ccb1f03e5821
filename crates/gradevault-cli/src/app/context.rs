//! Application context for the gradevault CLI.

use once_cell::unsync::OnceCell;
use secrecy::{ExposeSecret, SecretString};

use gradevault_core::{HistoryEngine, HistoryStore, UserKeyContext, Vault, VaultError};

use crate::cli::Cli;
use crate::constants::env_vars;
use crate::errors::CliError;
use crate::ui::{Spinner, UiContext};

use super::credentials::read_password;
use super::settings::{load_settings, Settings};

/// Bundles CLI args with lazily loaded settings and the vault handle.
pub struct AppContext<'a> {
    cli: &'a Cli,
    ui: UiContext,
    settings: OnceCell<Settings>,
    vault: OnceCell<Vault>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            ui: UiContext::from_env(false),
            settings: OnceCell::new(),
            vault: OnceCell::new(),
        }
    }

    pub fn ui(&self) -> &UiContext {
        &self.ui
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// True when prompts may be shown.
    pub fn interactive(&self) -> bool {
        !self.cli.no_input && self.ui.is_interactive()
    }

    pub fn settings(&self) -> anyhow::Result<&Settings> {
        self.settings.get_or_try_init(|| load_settings(self.cli))
    }

    pub fn vault(&self) -> anyhow::Result<&Vault> {
        self.vault.get_or_try_init(|| {
            let settings = self.settings()?;
            let vault = Vault::new(
                settings.root.clone(),
                SecretString::from(settings.server_secret.expose_secret().to_string()),
                settings.kdf,
            )?;
            Ok(vault)
        })
    }

    pub fn username(&self) -> anyhow::Result<&str> {
        self.cli
            .username
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                CliError::invalid_input("No username given. Use --username or set GRADEVAULT_USERNAME.")
                    .into()
            })
    }

    /// Credentials for the current user, prompting if needed.
    pub fn user_context(&self) -> anyhow::Result<UserKeyContext> {
        let username = self.username()?;
        let password = read_password(env_vars::PASSWORD, "Password", self.interactive())?;
        Ok(self.vault()?.context(username, password)?)
    }

    /// Open an existing history and check the password against it.
    pub fn open_verified(&self, context: &UserKeyContext) -> anyhow::Result<HistoryStore> {
        let spinner = Spinner::start(&self.ui, "Deriving key");
        let opened = self.vault()?.open_existing(context);
        spinner.finish();

        let store = match opened {
            Ok(store) => store,
            Err(VaultError::NotInitialized) => {
                return Err(CliError::not_found(
                    format!("No history for {}", context.username()),
                    "Run `gradevault save <FILE>` to record the first snapshot",
                )
                .into())
            }
            Err(err) => return Err(err.into()),
        };

        match store.verify() {
            Ok(()) => Ok(store),
            Err(VaultError::CredentialMismatch) => Err(CliError::auth_failed_with_hint(
                "Password does not match the stored history.",
                "If the password changed, run `gradevault migrate`",
            )
            .into()),
            Err(err) => Err(err.into()),
        }
    }
}
