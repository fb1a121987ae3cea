// UI module - command line front end
//
// This module contains:
// - Cli / Commands: clap definitions of the command line
// - CliController: runs one command against a project and the build services
// - console: renders build state changes as log lines

pub mod commands;
pub mod console;
pub mod controller;

pub use commands::{Cli, Commands};
pub use console::{print_until_done, render_change};
pub use controller::CliController;
