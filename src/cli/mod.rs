pub mod commands;
pub mod handlers;

pub use commands::{CliArgs, Commands, RunArgs};
pub use handlers::{handle_run, EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE};
