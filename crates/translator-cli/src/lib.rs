//! Command-line front end: argument parsing, command handlers and the
//! console observer used while a conversation runs.

pub mod cli;
pub mod commands;
pub mod observer;

pub use cli::{Cli, Command, SettingsAction};
pub use observer::ConsoleObserver;
