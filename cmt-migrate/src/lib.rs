//! cmt-migrate library interface
//!
//! Parallel catalog migration: records from a source catalog export are
//! distributed across a fixed pool of workers, each running the item
//! pipeline (price, describe, create, attach images, QA, publish) against
//! the target platform through its own rate-limited client. Outcomes are
//! recorded in a resumable state file.

pub mod config;
pub mod error;
pub mod models;
pub mod run_mode;
pub mod services;

pub use crate::error::{PlatformError, TransportError};
