//! Gradevault CLI - encrypted, versioned gradebook history
//!
//! Thin command-line front end over `gradevault-core`: reads snapshots,
//! prompts for passwords and the mismatch decision, and renders results.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod logging;
mod output;
mod ui;

use clap::{CommandFactory, Parser};

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::commands::{
    handle_check, handle_completions, handle_list, handle_migrate, handle_remove, handle_save,
    handle_show, handle_verify, handle_wipe,
};
use crate::errors::exit_code_for;
use crate::ui::render::print_error;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);
    let ctx = AppContext::new(&cli);

    if let Err(err) = run(&ctx, &cli) {
        let message = format!("{}", err);
        let (message, hint) = split_hint(&message);
        print_error(ctx.ui(), message, hint);
        std::process::exit(exit_code_for(&err));
    }
}

fn run(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
        Some(Commands::Save(args)) => handle_save(ctx, args),
        Some(Commands::List(args)) => handle_list(ctx, args),
        Some(Commands::Show(args)) => handle_show(ctx, args),
        Some(Commands::Remove(args)) => handle_remove(ctx, args),
        Some(Commands::Wipe(args)) => handle_wipe(ctx, args),
        Some(Commands::Migrate) => handle_migrate(ctx),
        Some(Commands::Verify) => handle_verify(ctx),
        Some(Commands::Check(args)) => handle_check(ctx, args),
        Some(Commands::Completions { shell }) => handle_completions(*shell),
    }
}

/// Split "message\nHint: text" into its parts.
fn split_hint(error: &str) -> (&str, Option<&str>) {
    match error.find("\nHint: ") {
        Some(idx) => (&error[..idx], Some(&error[idx + "\nHint: ".len()..])),
        None => (error, None),
    }
}
