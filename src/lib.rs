//! Implements a client for a remote feature-flag / experimentation service
//!
//! To change the default request timeout set the FLAGSYNC_TIMEOUT_MS
//! environment variable to the desired timeout value.
mod client;
mod error;
mod http;

pub mod models;
pub mod params;

pub use crate::client::Client;
pub use crate::error::Error;
