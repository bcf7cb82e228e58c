//! Video generation pipeline: per-job controller and batch driver.
//!
//! [`controller::JobController`] takes one job from submission to a file
//! on disk; [`batch::run_batch`] runs a planned batch of jobs through it
//! sequentially.

pub mod batch;
pub mod controller;
pub mod error;
pub mod poll;
