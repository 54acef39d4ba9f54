//! Domain model and collaborator contracts for the DoksAI client.
//!
//! This crate has no I/O of its own. The HTTP client lives in
//! `doks-interaction`, the health monitor and conversation store in
//! `doks-application`.

pub mod config;
pub mod document;
pub mod error;
pub mod health;
pub mod query;
pub mod schedule;
pub mod session;

// Re-export common error type
pub use error::{DoksError, Result};
