//! Event types for the FWMP event system
//!
//! Provides shared event definitions and EventBus for FWMP services.
//! Every failure event names the slot, material, or action it belongs to so
//! concurrent operations surface as discrete, attributable notifications
//! rather than one conflated report.

use crate::models::{GeoPoint, Phase, SlotKey};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// FWMP event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FwmpEvent {
    /// An upload for one slot+phase entered flight
    SlotUploadStarted {
        task_id: Uuid,
        slot: SlotKey,
        phase: Phase,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Upload acknowledged by the media service; the slot is now fulfilled
    SlotUploadCompleted {
        task_id: Uuid,
        slot: SlotKey,
        phase: Phase,
        /// Server-side URL of the stored media (never a local preview)
        url: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Upload failed; the slot rolled back to empty
    SlotUploadFailed {
        task_id: Uuid,
        slot: SlotKey,
        phase: Phase,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A confirmed delete removed the slot's stored media
    SlotMediaRemoved {
        task_id: Uuid,
        slot: SlotKey,
        phase: Phase,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Delete failed; the slot kept its original descriptor
    SlotMediaRemoveFailed {
        task_id: Uuid,
        slot: SlotKey,
        phase: Phase,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// All material lines confirmed in one operation
    MaterialsConfirmed {
        task_id: Uuid,
        line_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Material confirmation rejected by the backend; lines stay unconfirmed
    MaterialsConfirmFailed {
        task_id: Uuid,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Task moved to in-progress
    TaskStarted {
        task_id: Uuid,
        location: Option<GeoPoint>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Task reached its terminal state
    TaskCompleted {
        task_id: Uuid,
        location: Option<GeoPoint>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A start/complete call failed; local status is unchanged
    TaskMutationFailed {
        task_id: Uuid,
        action: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Section reference catalog changed (submit or remove settled)
    CatalogUpdated {
        section_id: Uuid,
        reference_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Removing a catalog reference failed; the entry was restored
    CatalogRemoveFailed {
        section_id: Uuid,
        reference_id: Uuid,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl FwmpEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            FwmpEvent::SlotUploadStarted { .. } => "SlotUploadStarted",
            FwmpEvent::SlotUploadCompleted { .. } => "SlotUploadCompleted",
            FwmpEvent::SlotUploadFailed { .. } => "SlotUploadFailed",
            FwmpEvent::SlotMediaRemoved { .. } => "SlotMediaRemoved",
            FwmpEvent::SlotMediaRemoveFailed { .. } => "SlotMediaRemoveFailed",
            FwmpEvent::MaterialsConfirmed { .. } => "MaterialsConfirmed",
            FwmpEvent::MaterialsConfirmFailed { .. } => "MaterialsConfirmFailed",
            FwmpEvent::TaskStarted { .. } => "TaskStarted",
            FwmpEvent::TaskCompleted { .. } => "TaskCompleted",
            FwmpEvent::TaskMutationFailed { .. } => "TaskMutationFailed",
            FwmpEvent::CatalogUpdated { .. } => "CatalogUpdated",
            FwmpEvent::CatalogRemoveFailed { .. } => "CatalogRemoveFailed",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FwmpEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Old events are dropped once the buffer is full; subscribers observe
    /// a lag error rather than blocking the producer.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<FwmpEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` if nobody is listening.
    pub fn emit(
        &self,
        event: FwmpEvent,
    ) -> Result<usize, broadcast::error::SendError<FwmpEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, tolerating the case where no subscribers are listening
    pub fn emit_lossy(&self, event: FwmpEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event emitted with no subscribers");
        }
    }

    /// Current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
