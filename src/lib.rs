//! Session-based client for the Dominos Pizza UK web API.
//!
//! Every call goes through one [`http::CallExecutor`], which paces requests
//! to the remote's budget and retries throttled or failed calls with
//! exponential backoff. [`Client`] layers the cookie session and the
//! anti-forgery token on top, and [`api`] exposes the endpoints.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod session;

pub use client::Client;
pub use config::{ClientConfig, MutationRetry, RateLimit, RetryPolicy};
pub use error::{Error, Result};
