//! CLI for the registry sync pipeline.

mod commands;

pub use commands::{is_verbose, run};
