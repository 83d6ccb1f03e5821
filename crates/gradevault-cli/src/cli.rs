use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use gradevault_core::VERSION;

/// Gradevault - encrypted, versioned gradebook history keyed by your own password
#[derive(Parser)]
#[command(name = "gradevault")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding every user's history
    #[arg(long, global = true, env = "GRADEVAULT_ROOT")]
    pub root: Option<String>,

    /// Whose history to operate on
    #[arg(short, long, global = true, env = "GRADEVAULT_USERNAME")]
    pub username: Option<String>,

    /// Config file path
    #[arg(long, global = true, env = "GRADEVAULT_CONFIG")]
    pub config: Option<String>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Never prompt; fail instead when input is missing
    #[arg(long, global = true)]
    pub no_input: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// What to do when the password no longer matches the stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnMismatch {
    /// Keep the old history and drop this snapshot
    Continue,
    /// Erase the old history and start over
    Delete,
    /// Re-encrypt the old history under the new password
    Migrate,
}

#[derive(Args)]
pub struct SaveArgs {
    /// Snapshot JSON file, or "-" for stdin
    #[arg(value_name = "FILE", default_value = "-")]
    pub file: String,

    /// Answer the mismatch prompt up front
    #[arg(long, value_enum)]
    pub on_mismatch: Option<OnMismatch>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Snapshot timestamp (unix seconds)
    #[arg(value_name = "TIMESTAMP", allow_hyphen_values = true)]
    pub timestamp: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Snapshot timestamp (unix seconds)
    #[arg(value_name = "TIMESTAMP", allow_hyphen_values = true)]
    pub timestamp: i64,
}

#[derive(Args)]
pub struct WipeArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Delete snapshot files the index does not reference
    #[arg(long)]
    pub prune: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a gradebook snapshot
    Save(SaveArgs),

    /// List recorded versions
    List(ListArgs),

    /// Show one recorded snapshot
    Show(ShowArgs),

    /// Remove one recorded snapshot
    Remove(RemoveArgs),

    /// Delete the user's entire history
    Wipe(WipeArgs),

    /// Re-encrypt the history under a new password
    Migrate,

    /// Check that the password matches the stored history
    Verify,

    /// Compare the index against the snapshot files
    Check(CheckArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_save_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["gradevault", "save"]).unwrap();
        match cli.command {
            Some(Commands::Save(args)) => {
                assert_eq!(args.file, "-");
                assert!(args.on_mismatch.is_none());
            }
            _ => panic!("expected save"),
        }
    }

    #[test]
    fn test_on_mismatch_parses() {
        let cli = Cli::try_parse_from(["gradevault", "save", "snap.json", "--on-mismatch", "migrate"])
            .unwrap();
        match cli.command {
            Some(Commands::Save(args)) => assert_eq!(args.on_mismatch, Some(OnMismatch::Migrate)),
            _ => panic!("expected save"),
        }
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::try_parse_from(["gradevault", "-vv", "verify"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
