//! # FWMP Common Library
//!
//! Shared code for FWMP services including:
//! - Wire models (tasks, reference media, materials)
//! - Event types (FwmpEvent enum) and EventBus
//! - Common error type
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
