//! Per-request credential bundle.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{Result, VaultError};

/// Username, password and server secret for one request.
///
/// Never persisted. The password and server secret stay wrapped in
/// [`SecretString`] so they are zeroized on drop and redacted from `Debug`.
#[derive(Debug)]
pub struct UserKeyContext {
    username: String,
    password: SecretString,
    server_secret: SecretString,
}

impl UserKeyContext {
    /// Build a context, rejecting empty fields.
    pub fn new(
        username: impl Into<String>,
        password: SecretString,
        server_secret: SecretString,
    ) -> Result<Self> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(VaultError::InvalidInput(
                "Username cannot be empty".to_string(),
            ));
        }
        if password.expose_secret().is_empty() {
            return Err(VaultError::InvalidInput(
                "Password cannot be empty".to_string(),
            ));
        }
        if server_secret.expose_secret().is_empty() {
            return Err(VaultError::InvalidInput(
                "Server secret cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            username,
            password,
            server_secret,
        })
    }

    /// Convenience constructor from plain strings.
    pub fn from_parts(username: &str, password: &str, server_secret: &str) -> Result<Self> {
        Self::new(
            username,
            SecretString::from(password.to_string()),
            SecretString::from(server_secret.to_string()),
        )
    }

    /// Same user and server secret, different password.
    pub fn with_password(&self, password: SecretString) -> Result<Self> {
        Self::new(
            self.username.clone(),
            password,
            SecretString::from(self.server_secret.expose_secret().to_string()),
        )
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn server_secret(&self) -> &SecretString {
        &self.server_secret
    }
}
