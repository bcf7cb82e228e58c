//! `comfyvid-cli` library crate.
//!
//! Re-exports the argument, logging and run modules for integration
//! testing. The binary entrypoint lives in `main.rs`.

pub mod app;
pub mod args;
pub mod logging;
