//! Per-invocation state for the gradevault CLI.
//!
//! - settings: storage root, server secret and KDF cost from flags, env and config
//! - credentials: password prompts and environment fallbacks
//! - context: lazily built vault handle shared by every command

mod context;
mod credentials;
mod settings;

pub use context::AppContext;
pub use credentials::{read_new_password, read_password};
