//! Terminal output for the gradevault CLI.
//!
//! - **context**: TTY, width, color and unicode detection
//! - **mode**: json / plain / pretty routing
//! - **theme**: badges and color styles
//! - **render**: headers, tables, receipts, hints, errors
//! - **progress**: spinner for key derivation and migration

mod context;
mod mode;
pub mod progress;
pub mod render;
pub mod theme;

pub use context::UiContext;
pub use theme::Badge;

pub use render::{badge, blank_line, header, hint, kv, print, receipt, simple_table, Column};

pub use progress::Spinner;
