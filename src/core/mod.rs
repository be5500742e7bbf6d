//! Command line front end
//!
//! This module contains what the binary needs around the library:
//! - CLI parsing and validation
//! - The user settings file
//! - Process-level error handling

pub mod cli;
pub mod config_file;
pub mod platform;

// Re-export commonly used items
pub use cli::CliArgs;
pub use config_file::ConfigFile;
