//! Password input: environment variable first, then a hidden prompt.

use dialoguer::Password;
use secrecy::SecretString;

use crate::errors::CliError;

/// Read a password from `env_var`, or prompt when `interactive`.
pub fn read_password(env_var: &str, prompt: &str, interactive: bool) -> anyhow::Result<SecretString> {
    if let Some(value) = from_env(env_var) {
        return Ok(value);
    }
    if !interactive {
        return Err(CliError::invalid_input(format!(
            "No password available. Set {} or run in a terminal.",
            env_var
        ))
        .into());
    }
    let value = Password::new().with_prompt(prompt).interact()?;
    non_empty(value)
}

/// Like [`read_password`], but a prompted password must be typed twice.
pub fn read_new_password(env_var: &str, interactive: bool) -> anyhow::Result<SecretString> {
    if let Some(value) = from_env(env_var) {
        return Ok(value);
    }
    if !interactive {
        return Err(CliError::invalid_input(format!(
            "No new password available. Set {} or run in a terminal.",
            env_var
        ))
        .into());
    }
    let value = Password::new()
        .with_prompt("New password")
        .with_confirmation("Confirm new password", "Passwords do not match")
        .interact()?;
    non_empty(value)
}

fn from_env(env_var: &str) -> Option<SecretString> {
    std::env::var(env_var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

fn non_empty(value: String) -> anyhow::Result<SecretString> {
    if value.is_empty() {
        return Err(CliError::invalid_input("Password cannot be empty").into());
    }
    Ok(SecretString::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_env_password_used() {
        std::env::set_var("GRADEVAULT_TEST_PW_SET", "hunter2");
        let pw = read_password("GRADEVAULT_TEST_PW_SET", "Password", false).unwrap();
        assert_eq!(pw.expose_secret(), "hunter2");
    }

    #[test]
    fn test_missing_env_without_terminal_fails() {
        std::env::remove_var("GRADEVAULT_TEST_PW_UNSET");
        let err = read_password("GRADEVAULT_TEST_PW_UNSET", "Password", false).unwrap_err();
        assert!(err.to_string().contains("GRADEVAULT_TEST_PW_UNSET"));
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(non_empty(String::new()).is_err());
    }
}
