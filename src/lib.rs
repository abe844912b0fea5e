pub mod archiver;
pub mod cli;
pub mod commands;
pub mod env_loader;
pub mod error;
pub mod logging;
pub mod nad;
