//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (reserved by shells and clap)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// No history for the user, or no snapshot at the timestamp.
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input or arguments.
    pub const INVALID_INPUT: i32 = 4;

    /// Password does not match the stored history.
    pub const AUTH_FAILED: i32 = 5;

    /// Index and snapshot files disagree.
    pub const INTEGRITY_FAILED: i32 = 6;
}

/// Environment variables read by the CLI.
pub mod env_vars {
    pub const PASSWORD: &str = "GRADEVAULT_PASSWORD";
    pub const OLD_PASSWORD: &str = "GRADEVAULT_OLD_PASSWORD";
    pub const SERVER_SECRET: &str = "GRADEVAULT_SERVER_SECRET";
    pub const CONFIG: &str = "GRADEVAULT_CONFIG";
}

/// How many times an interactive password prompt is retried.
pub const MAX_PASSWORD_ATTEMPTS: usize = 3;
