//! Core utilities shared by the Glow client crates
//!
//! This crate provides functionality that has no dependency on HTTP:
//!
//! - **Error handling**: Errors with codes, context, and recovery suggestions
//! - **Retry schedule**: Exponential backoff configuration and delay math
//! - **Configuration**: TOML config file discovery and loading
//!
//! # Example
//!
//! ```rust
//! use glow_core::retry::RetryConfig;
//! use std::time::Duration;
//!
//! let retry = RetryConfig::default();
//! assert_eq!(retry.delay_for_retry(1), Duration::from_millis(1000));
//! assert_eq!(retry.delay_for_retry(3), Duration::from_millis(4000));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod retry;

pub use error::{Error, ErrorCode, Result};
