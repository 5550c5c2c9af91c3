//! DSHS adult family home registry synchronization.
//!
//! Crawls the state lookup portal with a controlled browser session,
//! extracts facility and inspection records from its postback-driven HTML,
//! and reconciles them into a local store using content fingerprints.

pub mod browser;
pub mod cli;
pub mod config;
pub mod extract;
pub mod models;
pub mod portal;
pub mod repository;
pub mod sync;
