//! Command handler modules for the CLI.

mod policy;
mod run;

use std::path::Path;

use crate::cli::{Commands, PolicyCommands};
use crate::error::CliError;

/// Dispatch a CLI command to the appropriate handler.
pub fn dispatch(config_path: Option<&Path>, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Run { file } => run::cmd_run(config_path, file.as_deref()),
        Commands::Policy(PolicyCommands::Check { command }) => {
            policy::cmd_check(config_path, &command)
        }
        Commands::Policy(PolicyCommands::Show) => policy::cmd_show(config_path),
    }
}
