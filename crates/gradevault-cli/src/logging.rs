//! Log setup for the CLI.
//!
//! Logs go to stderr so they never mix with command output. `RUST_LOG`
//! wins over the `-v`/`-q` flags when set.

use tracing_subscriber::EnvFilter;

/// Default filter directive for a verbosity level.
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "gradevault_core=warn,gradevault=warn",
        1 => "gradevault_core=info,gradevault=info",
        2 => "gradevault_core=debug,gradevault=debug",
        _ => "trace",
    }
}

pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(verbose, quiet).into());

    // A second init (e.g. in tests) is not an error worth surfacing.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
