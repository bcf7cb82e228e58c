//! Domain types shared across the comfyvid crates.
//!
//! Holds the workflow graph model, job instantiation from a template, the
//! bundled template, and the configuration error type.

pub mod error;
pub mod template;
pub mod workflow;
