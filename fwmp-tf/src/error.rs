//! Error types for fwmp-tf
//!
//! Defines the engine error taxonomy using thiserror. Validation errors are
//! raised locally before any collaborator call; network-origin errors carry
//! the collaborator's message and always accompany a rollback of the
//! affected slot, material, or task state.

use fwmp_common::models::{Phase, SlotKey};
use thiserror::Error;
use uuid::Uuid;

/// Main error type for fwmp-tf
#[derive(Error, Debug)]
pub enum Error {
    /// File MIME type is neither image/* nor video/*
    #[error("Unsupported media kind: {0}")]
    UnsupportedMediaKind(String),

    /// File exceeds the upload size limit
    #[error("Payload too large: {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Slot+phase already holds media or has an operation in flight
    #[error("Slot {slot} ({phase}) cannot accept an upload: {state}")]
    SlotBusy {
        slot: SlotKey,
        phase: Phase,
        state: String,
    },

    /// Delete requested for a slot without server-stored media
    #[error("Nothing to delete at slot {slot} ({phase})")]
    NothingToDelete { slot: SlotKey, phase: Phase },

    /// Confirm called with no delete staged
    #[error("No delete is staged")]
    NotArmed,

    /// Slot key outside the expanded slot table
    #[error("Unknown slot {0}")]
    UnknownSlot(SlotKey),

    /// Material line id not present on the task
    #[error("Unknown material line: {0}")]
    UnknownMaterial(Uuid),

    /// Reference id not present in the section catalog
    #[error("Unknown reference: {0}")]
    UnknownReference(Uuid),

    /// Media upload rejected or failed by the upload service
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Media delete rejected or failed by the delete service
    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    /// Task mutation (start/complete/materials) failed at the backend
    #[error("Mutation failed: {0}")]
    MutationFailed(String),

    /// Task view could not be read from the backend
    #[error("Task load failed: {0}")]
    LoadFailed(String),

    /// Device denied the location query; the action must not proceed
    #[error("Location permission denied")]
    GeolocationDenied,

    /// No position fix obtainable and the caller did not override
    #[error("No location fix available")]
    GeolocationUnavailable,

    /// Task reached its terminal state; all mutations are rejected
    #[error("Task {0} is completed; no further changes accepted")]
    TaskAlreadyCompleted(Uuid),

    /// Completion gate did not clear
    #[error("Completion blocked: {0}")]
    CompletionBlocked(String),

    /// Material list frozen by a successful confirm-all
    #[error("Materials are confirmed and frozen")]
    MaterialsFrozen,

    /// Operation not valid for the current task status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request parameter
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience Result type using fwmp-tf Error
pub type Result<T> = std::result::Result<T, Error>;
