//! Command-line runner for the catalog sync engine.
//!
//! `bootstrap` is the only place where the database, the provider
//! registries and the loaders are wired together; handlers receive the
//! composed pieces.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by main.rs only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;

pub use commands::{Commands, ConfigArgs, RunArgs};
pub use parser::Cli;
