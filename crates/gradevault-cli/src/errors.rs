//! CLI error types for structured error handling.
//!
//! Typed errors map to specific exit codes. Errors bubbling up from the
//! core library are classified by [`exit_code_for`].

use std::fmt;

use gradevault_core::VaultError;

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// No history, or no snapshot at the requested timestamp
    NotFound { message: String, hint: String },

    /// Password does not match the stored history
    AuthFailed {
        message: String,
        hint: Option<String>,
    },

    /// Invalid user input
    InvalidInput(String),

    /// Integrity check found problems
    IntegrityFailed(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, hint } => {
                write!(f, "{}\nHint: {}", message, hint)
            }
            CliError::AuthFailed { message, hint } => {
                if let Some(h) = hint {
                    write!(f, "{}\nHint: {}", message, h)
                } else {
                    write!(f, "{}", message)
                }
            }
            CliError::InvalidInput(message) => write!(f, "{}", message),
            CliError::IntegrityFailed(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    pub fn auth_failed_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    pub fn integrity_failed(message: impl Into<String>) -> Self {
        CliError::IntegrityFailed(message.into())
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::AuthFailed { .. } => exit_codes::AUTH_FAILED,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
            CliError::IntegrityFailed(_) => exit_codes::INTEGRITY_FAILED,
        }
    }
}

fn vault_exit_code(err: &VaultError) -> i32 {
    match err {
        VaultError::CredentialMismatch | VaultError::DecryptionFailed => exit_codes::AUTH_FAILED,
        VaultError::NotFound(_) | VaultError::NotInitialized => exit_codes::NOT_FOUND,
        VaultError::InvalidInput(_)
        | VaultError::AlreadyExists
        | VaultError::DuplicateSnapshot(_)
        | VaultError::Json { .. } => exit_codes::INVALID_INPUT,
        VaultError::StoreConsistency(_) => exit_codes::INTEGRITY_FAILED,
        VaultError::Crypto(_) | VaultError::Storage(_) | VaultError::Io { .. } => 1,
    }
}

/// Exit code for any error reaching `main`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    if let Some(vault) = err.downcast_ref::<VaultError>() {
        return vault_exit_code(vault);
    }
    1
}
