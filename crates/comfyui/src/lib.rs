//! ComfyUI REST client library.
//!
//! Provides the HTTP API wrapper, typed history/artifact payloads, and
//! the [`transport::ComfyTransport`] trait the job controller is written
//! against.

pub mod api;
pub mod history;
pub mod transport;
