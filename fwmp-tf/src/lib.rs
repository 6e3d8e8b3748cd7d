//! # FWMP Task Fulfillment Service
//!
//! The reference-slot media fulfillment engine for FWMP field tasks:
//! - Slot expansion from a section's reference catalog
//! - Per-slot before/after media state with single-flight uploads
//! - Two-phase (arm, confirm) deletion with rollback
//! - Reference-catalog reconciliation for section editing
//! - Material confirmation and the task completion gate
//!
//! The engine consumes the FWMP backend through narrow collaborator traits
//! (`clients`) and exposes a REST + SSE surface (`api`) for the field-worker
//! UI.

pub mod api;
pub mod catalog;
pub mod clients;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod materials;
pub mod task;

pub use error::{Error, Result};
