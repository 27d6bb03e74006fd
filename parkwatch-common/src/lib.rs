//! Shared types for the Parkwatch services
//!
//! Carries the common error type and configuration resolution used by the
//! API service and its utility binaries.

pub mod config;
pub mod error;

pub use error::{Error, Result};
