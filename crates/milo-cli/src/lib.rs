//! Command-line front end for the Milo archive engine.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod summary;
