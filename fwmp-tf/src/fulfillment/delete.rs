//! Deletion orchestration
//!
//! Removal of a slot's stored media is destructive server-side, so it runs
//! in two phases: `request_delete` stages an armed target with no side
//! effects (the user confirmation step), `confirm_delete` performs the
//! network call. A failed delete rolls the slot back to `Uploaded` with the
//! original descriptor; the slot is never left in `Deleting`.

use crate::clients::{DeleteRequest, EntityType, MediaDeleteService, ResourceKind};
use crate::error::{Error, Result};
use crate::fulfillment::store::FulfillmentStore;
use fwmp_common::events::{EventBus, FwmpEvent};
use fwmp_common::models::{Phase, SlotKey};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// A staged delete awaiting confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteTarget {
    pub slot: SlotKey,
    pub phase: Phase,
}

/// Drives two-phase media deletion for one task's fulfillment store
pub struct DeletionOrchestrator {
    store: FulfillmentStore,
    deleter: Arc<dyn MediaDeleteService>,
    events: EventBus,
    armed: Mutex<Option<DeleteTarget>>,
}

impl DeletionOrchestrator {
    pub fn new(
        store: FulfillmentStore,
        deleter: Arc<dyn MediaDeleteService>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            deleter,
            events,
            armed: Mutex::new(None),
        }
    }

    /// Stage a delete for confirmation.
    ///
    /// Validates that the slot holds server-stored media
    /// (`NothingToDelete` otherwise) but changes no slot state. A second
    /// request replaces the previously armed target.
    pub async fn request_delete(&self, slot: SlotKey, phase: Phase) -> Result<DeleteTarget> {
        self.store.delete_target(slot, phase).await?;
        let target = DeleteTarget { slot, phase };
        *self.armed.lock().await = Some(target);
        debug!("Armed delete for slot {} ({})", slot, phase);
        Ok(target)
    }

    /// Drop the armed target, if any. Returns whether one was armed.
    pub async fn cancel_delete(&self) -> bool {
        self.armed.lock().await.take().is_some()
    }

    /// Currently armed target, if any.
    pub async fn armed_target(&self) -> Option<DeleteTarget> {
        *self.armed.lock().await
    }

    /// Perform the armed delete.
    ///
    /// Re-validates the precondition (the slot may have changed since
    /// arming), marks the slot `Deleting`, and calls the delete service.
    /// Success empties the slot; failure restores the original descriptor.
    pub async fn confirm_delete(&self, task_id: Uuid) -> Result<()> {
        let target = self.armed.lock().await.take().ok_or(Error::NotArmed)?;
        let DeleteTarget { slot, phase } = target;

        let (descriptor, epoch) = self.store.begin_delete(slot, phase).await?;

        let request = DeleteRequest {
            entity_type: EntityType::Task,
            entity_id: task_id,
            image_id: descriptor.server_id,
            delete_token: descriptor.delete_token.clone(),
            resource_kind: ResourceKind::Media,
        };

        match self.deleter.delete_media(&request).await {
            Ok(()) => {
                let committed = self.store.commit_delete(slot, phase, epoch).await;
                if committed {
                    self.events.emit_lossy(FwmpEvent::SlotMediaRemoved {
                        task_id,
                        slot,
                        phase,
                        timestamp: chrono::Utc::now(),
                    });
                }
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Delete failed for task {} slot {} ({}): {}",
                    task_id, slot, phase, e
                );
                self.store
                    .rollback_delete(slot, phase, epoch, descriptor)
                    .await;
                self.events.emit_lossy(FwmpEvent::SlotMediaRemoveFailed {
                    task_id,
                    slot,
                    phase,
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Err(Error::DeleteFailed(e.to_string()))
            }
        }
    }
}
