//! Command handlers.

mod history;
mod maintenance;
mod misc;
mod save;

pub use history::{handle_list, handle_remove, handle_show};
pub use maintenance::{handle_check, handle_migrate, handle_verify, handle_wipe};
pub use misc::handle_completions;
pub use save::handle_save;
