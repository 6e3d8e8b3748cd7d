//! Task sessions
//!
//! A [`TaskSession`] owns the engine state for one task: the fulfillment
//! store, the material board, the upload/deletion orchestrators, and the
//! lifecycle status. There is one active session per task; orchestration is
//! delegated to the sub-modules, lifecycle gating lives here.

use crate::clients::geo::{LocationError, LocationProvider};
use crate::clients::{MediaDeleteService, MediaUploadService, TaskMutationService, TaskReader};
use crate::error::{Error, Result};
use crate::fulfillment::delete::{DeleteTarget, DeletionOrchestrator};
use crate::fulfillment::gate::{self, CompletionStatus};
use crate::fulfillment::store::{FulfillmentStore, SlotMediaState, StoreSnapshot};
use crate::fulfillment::upload::UploadOrchestrator;
use crate::materials::MaterialBoard;
use fwmp_common::events::{EventBus, FwmpEvent};
use fwmp_common::models::{
    CandidateFile, GeoPoint, MaterialLine, MediaDescriptor, Phase, SlotKey, TaskStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Engine state and orchestration for one task
pub struct TaskSession {
    task_id: Uuid,
    section_id: Uuid,
    status: RwLock<TaskStatus>,
    store: FulfillmentStore,
    board: MaterialBoard,
    uploads: UploadOrchestrator,
    deletes: DeletionOrchestrator,
    mutator: Arc<dyn TaskMutationService>,
    events: EventBus,
}

impl TaskSession {
    /// Load a session through the Task Reader and initialize the engine
    /// state from the returned task view.
    pub async fn load(
        task_id: Uuid,
        reader: Arc<dyn TaskReader>,
        media: Arc<dyn MediaUploadService>,
        deleter: Arc<dyn MediaDeleteService>,
        mutator: Arc<dyn TaskMutationService>,
        events: EventBus,
    ) -> Result<Self> {
        let detail = reader
            .fetch_task(task_id)
            .await
            .map_err(|e| Error::LoadFailed(format!("task {}: {}", task_id, e)))?;

        let store = FulfillmentStore::new();
        store.initialize(&detail).await;

        let board = MaterialBoard::new();
        board.seed(detail.materials).await;

        let uploads = UploadOrchestrator::new(store.clone(), media, events.clone());
        let deletes = DeletionOrchestrator::new(store.clone(), deleter, events.clone());

        info!(
            "Loaded task {} (section {}, status {})",
            task_id, detail.section_id, detail.status
        );

        Ok(Self {
            task_id,
            section_id: detail.section_id,
            status: RwLock::new(detail.status),
            store,
            board,
            uploads,
            deletes,
            mutator,
            events,
        })
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn section_id(&self) -> Uuid {
        self.section_id
    }

    pub async fn status(&self) -> TaskStatus {
        *self.status.read().await
    }

    /// Reject every mutation on a completed task, with no side effects.
    async fn ensure_mutable(&self) -> Result<()> {
        if self.status().await.is_terminal() {
            return Err(Error::TaskAlreadyCompleted(self.task_id));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Media fulfillment
    // ------------------------------------------------------------------

    pub async fn upload(
        &self,
        slot: SlotKey,
        phase: Phase,
        file: CandidateFile,
    ) -> Result<MediaDescriptor> {
        self.ensure_mutable().await?;
        self.uploads
            .upload(self.task_id, self.section_id, slot, phase, file)
            .await
    }

    pub async fn request_delete(&self, slot: SlotKey, phase: Phase) -> Result<DeleteTarget> {
        self.ensure_mutable().await?;
        self.deletes.request_delete(slot, phase).await
    }

    pub async fn confirm_delete(&self) -> Result<()> {
        self.ensure_mutable().await?;
        self.deletes.confirm_delete(self.task_id).await
    }

    /// Disarming a stale confirmation is allowed in any state.
    pub async fn cancel_delete(&self) -> bool {
        self.deletes.cancel_delete().await
    }

    pub async fn armed_delete(&self) -> Option<DeleteTarget> {
        self.deletes.armed_target().await
    }

    pub async fn slot_state(&self, slot: SlotKey, phase: Phase) -> Option<SlotMediaState> {
        self.store.get(slot, phase).await
    }

    pub async fn fulfillment_snapshot(&self) -> StoreSnapshot {
        self.store.snapshot().await
    }

    /// Derived completion gate, recomputed on every call.
    pub async fn completion_status(&self) -> CompletionStatus {
        let snapshot = self.store.snapshot().await;
        let materials = self.board.lines().await;
        gate::evaluate(&snapshot, &materials)
    }

    // ------------------------------------------------------------------
    // Materials
    // ------------------------------------------------------------------

    pub async fn materials(&self) -> Vec<MaterialLine> {
        self.board.lines().await
    }

    pub async fn add_material(
        &self,
        name: String,
        quantity: u32,
        unit: String,
    ) -> Result<MaterialLine> {
        self.ensure_mutable().await?;
        self.board.add_line(name, quantity, unit).await
    }

    pub async fn set_material_quantity(&self, item_id: Uuid, quantity: u32) -> Result<()> {
        self.ensure_mutable().await?;
        self.board.set_quantity(item_id, quantity).await
    }

    pub async fn remove_material(&self, item_id: Uuid) -> Result<MaterialLine> {
        self.ensure_mutable().await?;
        self.board.remove_line(item_id).await
    }

    /// Confirm every material line in one operation.
    ///
    /// The board freezes only on backend acknowledgement; a failed call
    /// leaves every line unconfirmed and adjustable. Confirming an empty
    /// list is a local no-op (vacuously confirmed).
    pub async fn confirm_materials(&self) -> Result<()> {
        self.ensure_mutable().await?;

        let payload = self.board.confirmed_payload().await;
        if payload.is_empty() {
            return Ok(());
        }

        match self
            .mutator
            .update_task_materials(self.task_id, &payload)
            .await
        {
            Ok(()) => {
                self.board.mark_confirmed().await;
                self.events.emit_lossy(FwmpEvent::MaterialsConfirmed {
                    task_id: self.task_id,
                    line_count: payload.len(),
                    timestamp: chrono::Utc::now(),
                });
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Material confirmation failed for task {}: {}",
                    self.task_id, e
                );
                self.events.emit_lossy(FwmpEvent::MaterialsConfirmFailed {
                    task_id: self.task_id,
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Err(Error::MutationFailed(e.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Move the task from assigned to in-progress.
    ///
    /// Gated only on location acquisition (or its explicit override), not
    /// on media fulfillment.
    pub async fn start_task(
        &self,
        location: &dyn LocationProvider,
        allow_missing_fix: bool,
    ) -> Result<()> {
        match self.status().await {
            TaskStatus::Assigned => {}
            TaskStatus::Pending => {
                return Err(Error::InvalidState("task is not yet assigned".to_string()))
            }
            TaskStatus::InProgress => {
                return Err(Error::InvalidState("task is already in progress".to_string()))
            }
            TaskStatus::Completed => return Err(Error::TaskAlreadyCompleted(self.task_id)),
        }

        let coords = acquire_location(location, allow_missing_fix).await?;

        match self.mutator.start_task(self.task_id, coords).await {
            Ok(()) => {
                *self.status.write().await = TaskStatus::InProgress;
                info!("Task {} started", self.task_id);
                self.events.emit_lossy(FwmpEvent::TaskStarted {
                    task_id: self.task_id,
                    location: coords,
                    timestamp: chrono::Utc::now(),
                });
                Ok(())
            }
            Err(e) => {
                warn!("Start failed for task {}: {}", self.task_id, e);
                self.events.emit_lossy(FwmpEvent::TaskMutationFailed {
                    task_id: self.task_id,
                    action: "start".to_string(),
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Err(Error::MutationFailed(e.to_string()))
            }
        }
    }

    /// Move the task from in-progress to completed.
    ///
    /// Completion is terminal and irreversible server-side, so this is a
    /// no-optimism operation: local status flips only after the backend
    /// acknowledges; any failure leaves state exactly as it was.
    pub async fn complete_task(
        &self,
        location: &dyn LocationProvider,
        allow_missing_fix: bool,
    ) -> Result<()> {
        match self.status().await {
            TaskStatus::InProgress => {}
            TaskStatus::Completed => return Err(Error::TaskAlreadyCompleted(self.task_id)),
            other => {
                return Err(Error::InvalidState(format!(
                    "task cannot be completed from status {}",
                    other
                )))
            }
        }

        let status = self.completion_status().await;
        if let Some(reason) = status.blocking_reason() {
            return Err(Error::CompletionBlocked(reason));
        }

        let coords = acquire_location(location, allow_missing_fix).await?;

        match self.mutator.complete_task(self.task_id, coords).await {
            Ok(()) => {
                *self.status.write().await = TaskStatus::Completed;
                info!("Task {} completed", self.task_id);
                self.events.emit_lossy(FwmpEvent::TaskCompleted {
                    task_id: self.task_id,
                    location: coords,
                    timestamp: chrono::Utc::now(),
                });
                Ok(())
            }
            Err(e) => {
                warn!("Complete failed for task {}: {}", self.task_id, e);
                self.events.emit_lossy(FwmpEvent::TaskMutationFailed {
                    task_id: self.task_id,
                    action: "complete".to_string(),
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Err(Error::MutationFailed(e.to_string()))
            }
        }
    }
}

/// Resolve the device position for a lifecycle action.
///
/// Denial is fatal regardless of the override; a missing fix proceeds
/// without coordinates only when the caller explicitly confirmed that.
async fn acquire_location(
    provider: &dyn LocationProvider,
    allow_missing_fix: bool,
) -> Result<Option<GeoPoint>> {
    match provider.current_position().await {
        Ok(point) => Ok(Some(point)),
        Err(LocationError::Denied) => Err(Error::GeolocationDenied),
        Err(LocationError::Unavailable) if allow_missing_fix => Ok(None),
        Err(LocationError::Unavailable) => Err(Error::GeolocationUnavailable),
    }
}

/// Per-task sessions, loaded on first use
pub struct SessionManager {
    reader: Arc<dyn TaskReader>,
    media: Arc<dyn MediaUploadService>,
    deleter: Arc<dyn MediaDeleteService>,
    mutator: Arc<dyn TaskMutationService>,
    events: EventBus,
    sessions: RwLock<HashMap<Uuid, Arc<TaskSession>>>,
}

impl SessionManager {
    pub fn new(
        reader: Arc<dyn TaskReader>,
        media: Arc<dyn MediaUploadService>,
        deleter: Arc<dyn MediaDeleteService>,
        mutator: Arc<dyn TaskMutationService>,
        events: EventBus,
    ) -> Self {
        Self {
            reader,
            media,
            deleter,
            mutator,
            events,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Get the session for a task, loading it on first use.
    pub async fn session(&self, task_id: Uuid) -> Result<Arc<TaskSession>> {
        if let Some(session) = self.sessions.read().await.get(&task_id) {
            return Ok(session.clone());
        }

        let session = TaskSession::load(
            task_id,
            self.reader.clone(),
            self.media.clone(),
            self.deleter.clone(),
            self.mutator.clone(),
            self.events.clone(),
        )
        .await?;

        let session = Arc::new(session);
        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .entry(task_id)
            .or_insert_with(|| session.clone())
            .clone())
    }

    /// Drop a task's session (e.g. after the worker navigates away).
    /// In-flight operations resolve against their own store handle and are
    /// discarded by the epoch guard if the task is ever reloaded.
    pub async fn close(&self, task_id: Uuid) -> bool {
        self.sessions.write().await.remove(&task_id).is_some()
    }
}
