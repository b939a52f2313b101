//! # CMT Common Library
//!
//! Shared code for the catalog migration toolkit:
//! - Error and result types
//! - Configuration loading (TOML, environment, compiled defaults)
//! - Migration event types and the EventBus
//! - Timestamp and human-readable duration helpers

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod time;

pub use error::{Error, Result};
