//! `wipe`, `migrate`, `verify` and `check`.

use dialoguer::Confirm;
use gradevault_core::{HistoryEngine, VaultError};
use tracing::info;

use crate::app::{read_new_password, read_password, AppContext};
use crate::cli::{CheckArgs, WipeArgs};
use crate::constants::{env_vars, MAX_PASSWORD_ATTEMPTS};
use crate::errors::CliError;
use crate::output::{format_timestamp, integrity_json};
use crate::ui::{badge, header, kv, print, receipt, Badge, Spinner};

pub fn handle_wipe(ctx: &AppContext, args: &WipeArgs) -> anyhow::Result<()> {
    let username = ctx.username()?;

    if !args.yes {
        if !ctx.interactive() {
            return Err(CliError::invalid_input(
                "Refusing to wipe without --yes when not running in a terminal.",
            )
            .into());
        }
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete every stored snapshot for {}? This cannot be undone.",
                username
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            print(ctx.ui(), "Aborted.");
            return Ok(());
        }
    }

    if !ctx.vault()?.wipe_user(username)? {
        return Err(CliError::not_found(
            format!("No history for {}", username),
            "Nothing to delete",
        )
        .into());
    }

    if !ctx.quiet() {
        print(ctx.ui(), &receipt(ctx.ui(), "History deleted", &[("User", username)]));
    }
    Ok(())
}

/// Re-encrypt a history under a new password outside of a save.
pub fn handle_migrate(ctx: &AppContext) -> anyhow::Result<()> {
    let username = ctx.username()?;
    let vault = ctx.vault()?;
    let interactive = ctx.interactive();

    let new_password = read_new_password(env_vars::PASSWORD, interactive)?;
    let context = vault.context(username, new_password)?;
    let mut store = match vault.open_existing(&context) {
        Ok(store) => store,
        Err(VaultError::NotInitialized) => {
            return Err(CliError::not_found(
                format!("No history for {}", username),
                "Nothing to migrate",
            )
            .into())
        }
        Err(err) => return Err(err.into()),
    };

    if store.verify().is_ok() {
        if !ctx.quiet() {
            print(ctx.ui(), &badge(ctx.ui(), Badge::Info, "History already uses this password"));
        }
        return Ok(());
    }

    let from_env = std::env::var(env_vars::OLD_PASSWORD).is_ok_and(|v| !v.is_empty());
    let max_attempts = if interactive && !from_env {
        MAX_PASSWORD_ATTEMPTS
    } else {
        1
    };

    let mut attempts = 0;
    loop {
        attempts += 1;
        let old_password = read_password(env_vars::OLD_PASSWORD, "Previous password", interactive)?;

        let spinner = Spinner::start(ctx.ui(), "Re-encrypting history");
        let result = store.migrate(&old_password, context.password());
        spinner.finish();

        match result {
            Ok(()) => break,
            Err(VaultError::CredentialMismatch) => {
                let remaining = max_attempts.saturating_sub(attempts);
                if remaining == 0 {
                    return Err(CliError::auth_failed_with_hint(
                        "Previous password does not match the stored history.",
                        "Nothing was changed",
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

    let versions = store.list_history()?.len();
    info!(versions, "Migrated history");
    if !ctx.quiet() {
        let count = versions.to_string();
        print(
            ctx.ui(),
            &receipt(ctx.ui(), "History migrated", &[("User", username), ("Versions", count.as_str())]),
        );
    }
    Ok(())
}

pub fn handle_verify(ctx: &AppContext) -> anyhow::Result<()> {
    let context = ctx.user_context()?;
    let store = ctx.open_verified(&context)?;

    if !ctx.quiet() {
        let ui = ctx.ui();
        print(ui, &badge(ui, Badge::Ok, "Password matches the stored history"));
        let latest = store
            .latest()?
            .map(|entry| format_timestamp(entry.timestamp))
            .unwrap_or_else(|| "none".to_string());
        print(ui, &kv(ui, "Latest", &latest));
    }
    Ok(())
}

pub fn handle_check(ctx: &AppContext, args: &CheckArgs) -> anyhow::Result<()> {
    let ui = ctx.ui().with_json(args.json);
    let context = ctx.user_context()?;
    let store = ctx.open_verified(&context)?;

    let mut report = store.check_integrity()?;
    let mut pruned = 0;
    if args.prune && !report.orphaned_snapshots.is_empty() {
        pruned = store.prune_orphans()?;
        report = store.check_integrity()?;
    }

    if ui.mode.is_json() {
        println!("{}", serde_json::to_string_pretty(&integrity_json(&report, pruned))?);
    } else if !ctx.quiet() {
        print(&ui, &header(&ui, "check", Some(context.username())));
        print(&ui, &kv(&ui, "Indexed", &report.indexed.to_string()));
        if pruned > 0 {
            print(&ui, &kv(&ui, "Pruned", &pruned.to_string()));
        }
        for timestamp in &report.missing_snapshots {
            print(&ui, &badge(&ui, Badge::Err, &format!("Missing snapshot file for {}", timestamp)));
        }
        for timestamp in &report.orphaned_snapshots {
            print(&ui, &badge(&ui, Badge::Warn, &format!("Unindexed snapshot file {}", timestamp)));
        }
        if report.is_clean() {
            print(&ui, &badge(&ui, Badge::Ok, "Index and snapshot files agree"));
        }
    }

    if !report.is_clean() {
        return Err(CliError::integrity_failed(format!(
            "{} missing and {} unindexed snapshot file(s)",
            report.missing_snapshots.len(),
            report.orphaned_snapshots.len()
        ))
        .into());
    }
    Ok(())
}
