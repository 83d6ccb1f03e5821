//! `gradevault save`, including the password-mismatch decision.

use std::io::Read;

use dialoguer::{Confirm, Select};
use gradevault_core::{
    GradebookSnapshot, MismatchChoice, MismatchResolver, MismatchState, SaveAttempt, SaveOutcome,
    VaultError,
};
use tracing::debug;
use zeroize::Zeroizing;

use crate::app::{read_password, AppContext};
use crate::cli::{OnMismatch, SaveArgs};
use crate::constants::{env_vars, MAX_PASSWORD_ATTEMPTS};
use crate::errors::CliError;
use crate::output::format_timestamp;
use crate::ui::{badge, hint, print, receipt, Badge, Spinner};

pub fn handle_save(ctx: &AppContext, args: &SaveArgs) -> anyhow::Result<()> {
    let snapshot = read_snapshot(&args.file)?;
    let context = ctx.user_context()?;
    let username = context.username().to_string();
    let vault = ctx.vault()?;

    let spinner = Spinner::start(ctx.ui(), "Saving snapshot");
    let attempt = vault.save_snapshot(context, &snapshot);
    spinner.finish();

    match attempt? {
        SaveAttempt::Saved(timestamp) => {
            report_saved(ctx, &username, timestamp, None);
            Ok(())
        }
        SaveAttempt::Mismatch(mut resolver) => {
            resolve_mismatch(ctx, &mut resolver, args.on_mismatch, &snapshot)
        }
    }
}

fn read_snapshot(file: &str) -> anyhow::Result<GradebookSnapshot> {
    let raw = if file == "-" {
        let mut buffer = Zeroizing::new(String::new());
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        match std::fs::read_to_string(file) {
            Ok(contents) => Zeroizing::new(contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CliError::not_found(
                    format!("Snapshot file not found: {}", file),
                    "Pass a JSON file, or `-` to read from stdin",
                )
                .into())
            }
            Err(err) => return Err(err.into()),
        }
    };

    serde_json::from_str(&raw)
        .map_err(|err| CliError::invalid_input(format!("Invalid snapshot JSON: {}", err)).into())
}

fn resolve_mismatch(
    ctx: &AppContext,
    resolver: &mut MismatchResolver,
    flag: Option<OnMismatch>,
    snapshot: &GradebookSnapshot,
) -> anyhow::Result<()> {
    let choice = match flag {
        Some(choice) => choice,
        None if ctx.interactive() => prompt_choice(resolver.username())?,
        None => {
            return Err(CliError::auth_failed_with_hint(
                "Password does not match the stored history.",
                "Re-run with --on-mismatch continue, delete or migrate",
            )
            .into())
        }
    };
    debug!(?choice, "Resolving credential mismatch");

    let outcome = match choice {
        OnMismatch::Continue => resolver.resolve(MismatchChoice::Continue, snapshot)?,
        OnMismatch::Delete => {
            if flag.is_none() && !confirm_delete(resolver.username())? {
                resolver.resolve(MismatchChoice::Continue, snapshot)?
            } else {
                resolver.resolve(MismatchChoice::Delete, snapshot)?
            }
        }
        OnMismatch::Migrate => migrate_with_retry(ctx, resolver, snapshot)?,
    };

    match outcome {
        SaveOutcome::Saved(timestamp) => {
            let note = match choice {
                OnMismatch::Migrate => "History re-encrypted under the new password",
                _ => "Previous history deleted",
            };
            report_saved(ctx, resolver.username(), timestamp, Some(note));
        }
        SaveOutcome::Skipped => {
            if !ctx.quiet() {
                report_skipped(ctx, resolver.state());
            }
        }
    }
    Ok(())
}

fn migrate_with_retry(
    ctx: &AppContext,
    resolver: &mut MismatchResolver,
    snapshot: &GradebookSnapshot,
) -> anyhow::Result<SaveOutcome> {
    let from_env = std::env::var(env_vars::OLD_PASSWORD).is_ok_and(|v| !v.is_empty());
    let max_attempts = if ctx.interactive() && !from_env {
        MAX_PASSWORD_ATTEMPTS
    } else {
        1
    };

    let mut attempts = 0;
    loop {
        attempts += 1;
        let old_password = read_password(env_vars::OLD_PASSWORD, "Previous password", ctx.interactive())?;

        let spinner = Spinner::start(ctx.ui(), "Re-encrypting history");
        let result = resolver.resolve(MismatchChoice::Migrate { old_password }, snapshot);
        spinner.finish();

        match result {
            Ok(outcome) => return Ok(outcome),
            Err(VaultError::CredentialMismatch) => {
                let remaining = max_attempts.saturating_sub(attempts);
                if remaining == 0 {
                    return Err(CliError::auth_failed_with_hint(
                        "Previous password does not match the stored history.",
                        "Nothing was changed. Use --on-mismatch delete to start a new history",
                    )
                    .into());
                }
                eprintln!(
                    "Incorrect previous password. {} attempt{} remaining.",
                    remaining,
                    if remaining == 1 { "" } else { "s" }
                );
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn prompt_choice(username: &str) -> anyhow::Result<OnMismatch> {
    eprintln!("The password for {} does not match the stored history.", username);
    let options = [
        "Migrate: re-encrypt the history with the new password",
        "Delete: erase the history and start over",
        "Continue: keep the history, skip this snapshot",
    ];
    let selected = Select::new()
        .with_prompt("What should happen to the existing history?")
        .items(&options)
        .default(0)
        .interact()?;
    Ok(match selected {
        0 => OnMismatch::Migrate,
        1 => OnMismatch::Delete,
        _ => OnMismatch::Continue,
    })
}

fn confirm_delete(username: &str) -> anyhow::Result<bool> {
    Ok(Confirm::new()
        .with_prompt(format!(
            "Delete every stored snapshot for {}? This cannot be undone.",
            username
        ))
        .default(false)
        .interact()?)
}

fn report_skipped(ctx: &AppContext, state: MismatchState) {
    let ui = ctx.ui();
    let (message, next) = match state {
        MismatchState::Migrate => (
            "History re-encrypted; this snapshot was already recorded",
            None,
        ),
        _ => (
            "Snapshot not saved; history still uses the previous password",
            Some("Run `gradevault migrate` to move it to the new password"),
        ),
    };
    if ui.mode.is_pretty() {
        println!("{}", badge(ui, Badge::Warn, message));
    } else {
        println!("status=skipped");
    }
    if let Some(next) = next {
        print(ui, &hint(ui, next));
    }
}

fn report_saved(ctx: &AppContext, username: &str, timestamp: i64, note: Option<&str>) {
    if ctx.quiet() {
        return;
    }
    let ts = timestamp.to_string();
    let recorded = format_timestamp(timestamp);
    let mut items = vec![("User", username), ("Timestamp", ts.as_str()), ("Recorded", recorded.as_str())];
    if let Some(note) = note {
        items.push(("Note", note));
    }
    print(ctx.ui(), &receipt(ctx.ui(), "Snapshot saved", &items));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_snapshot_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"last_updated": 100, "courses": [{{"name": "Math", "grade": 90}}]}}"#
        )
        .unwrap();

        let snapshot = read_snapshot(file.path().to_str().unwrap()).unwrap();
        assert_eq!(snapshot.last_updated, 100);
        assert_eq!(snapshot.courses[0].teacher, "UNKNOWN");
    }

    #[test]
    fn test_read_snapshot_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = read_snapshot(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_read_snapshot_missing_file() {
        let err = read_snapshot("/nonexistent/snapshot.json").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::NotFound { .. })
        ));
    }
}
