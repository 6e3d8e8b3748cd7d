//! Fulfillment state store
//!
//! In-memory table keyed by (slot, phase) holding each work location's media
//! state. The store is owned by the current task session; it re-initializes
//! only when the owning task identity changes, so in-flight optimistic state
//! survives reference-list refreshes of the same task.
//!
//! Every initialization bumps an epoch. Async operations capture the epoch
//! when they claim a slot and commit only against the same epoch; a result
//! resolving against a re-initialized store is discarded instead of
//! clobbering the new task's table.

use crate::error::{Error, Result};
use crate::fulfillment::slots::expand_slots;
use fwmp_common::models::{MediaDescriptor, Phase, SlotKey, TaskDetail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Media state of one (slot, phase)
///
/// Transitions: `Empty → Uploading → Uploaded` for capture,
/// `Uploaded → Deleting → Empty` for removal. A failed operation returns to
/// the state it started from; the descriptor is retained through `Deleting`
/// so rollback restores it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "media", rename_all = "lowercase")]
pub enum SlotMediaState {
    Empty,
    Uploading,
    Uploaded(MediaDescriptor),
    Deleting(MediaDescriptor),
}

impl SlotMediaState {
    /// An operation is in flight (upload or delete not yet settled)
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SlotMediaState::Uploading | SlotMediaState::Deleting(_))
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, SlotMediaState::Uploaded(_))
    }

    pub fn descriptor(&self) -> Option<&MediaDescriptor> {
        match self {
            SlotMediaState::Uploaded(d) | SlotMediaState::Deleting(d) => Some(d),
            _ => None,
        }
    }

    /// Short state name for error messages and logs
    pub fn describe(&self) -> &'static str {
        match self {
            SlotMediaState::Empty => "empty",
            SlotMediaState::Uploading => "uploading",
            SlotMediaState::Uploaded(_) => "uploaded",
            SlotMediaState::Deleting(_) => "deleting",
        }
    }
}

/// Immutable view of the slot table for derived computations
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub epoch: u64,
    pub slots: Vec<SlotKey>,
    pub table: HashMap<(SlotKey, Phase), SlotMediaState>,
}

impl StoreSnapshot {
    pub fn state(&self, slot: SlotKey, phase: Phase) -> Option<&SlotMediaState> {
        self.table.get(&(slot, phase))
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    task_id: Option<Uuid>,
    epoch: u64,
    slots: Vec<SlotKey>,
    table: HashMap<(SlotKey, Phase), SlotMediaState>,
}

/// Shared fulfillment state store
#[derive(Debug, Clone, Default)]
pub struct FulfillmentStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl FulfillmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the table for a task, assigning existing server media.
    ///
    /// A no-op when the store already owns this task: reference-list
    /// refreshes of the same task must not discard in-flight optimistic
    /// state. Returns the epoch operations should commit against.
    pub async fn initialize(&self, task: &TaskDetail) -> u64 {
        let mut inner = self.inner.write().await;
        if inner.task_id == Some(task.id) {
            debug!("Store already owns task {}; keeping state", task.id);
            return inner.epoch;
        }

        let slots = expand_slots(&task.reference_images);
        let mut table = HashMap::with_capacity(slots.len() * 2);
        for slot in &slots {
            table.insert((*slot, Phase::Before), SlotMediaState::Empty);
            table.insert((*slot, Phase::After), SlotMediaState::Empty);
        }

        assign_existing(&slots, &mut table, Phase::Before, &task.images.before);
        assign_existing(&slots, &mut table, Phase::After, &task.images.after);

        inner.task_id = Some(task.id);
        inner.epoch += 1;
        inner.slots = slots;
        inner.table = table;

        info!(
            "Initialized fulfillment store for task {}: {} slots (epoch {})",
            task.id,
            inner.slots.len(),
            inner.epoch
        );
        inner.epoch
    }

    pub async fn task_id(&self) -> Option<Uuid> {
        self.inner.read().await.task_id
    }

    pub async fn epoch(&self) -> u64 {
        self.inner.read().await.epoch
    }

    pub async fn get(&self, slot: SlotKey, phase: Phase) -> Option<SlotMediaState> {
        self.inner.read().await.table.get(&(slot, phase)).cloned()
    }

    /// Full table snapshot for derived computations (completion gate, API)
    pub async fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read().await;
        StoreSnapshot {
            epoch: inner.epoch,
            slots: inner.slots.clone(),
            table: inner.table.clone(),
        }
    }

    /// Claim a slot+phase for upload (single-flight).
    ///
    /// The busy check and the transition to `Uploading` happen under one
    /// write lock; a second claim for the same slot+phase fails with
    /// `SlotBusy` before any network activity.
    pub async fn claim_upload(&self, slot: SlotKey, phase: Phase) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let epoch = inner.epoch;
        match inner.table.get(&(slot, phase)) {
            None => Err(Error::UnknownSlot(slot)),
            Some(SlotMediaState::Empty) => {
                inner.table.insert((slot, phase), SlotMediaState::Uploading);
                Ok(epoch)
            }
            Some(state) => Err(Error::SlotBusy {
                slot,
                phase,
                state: state.describe().to_string(),
            }),
        }
    }

    /// Settle a successful upload. Returns false when the result was
    /// discarded because the store was re-initialized in the meantime.
    pub async fn commit_upload(
        &self,
        slot: SlotKey,
        phase: Phase,
        epoch: u64,
        descriptor: MediaDescriptor,
    ) -> bool {
        let mut inner = self.inner.write().await;
        if inner.epoch != epoch {
            debug!(
                "Discarding upload result for slot {} ({}): store re-initialized",
                slot, phase
            );
            return false;
        }
        if !matches!(
            inner.table.get(&(slot, phase)),
            Some(SlotMediaState::Uploading)
        ) {
            debug!(
                "Discarding upload result for slot {} ({}): slot no longer uploading",
                slot, phase
            );
            return false;
        }
        inner
            .table
            .insert((slot, phase), SlotMediaState::Uploaded(descriptor));
        true
    }

    /// Roll a failed upload back to `Empty`, indistinguishable from a slot
    /// that was never attempted.
    pub async fn rollback_upload(&self, slot: SlotKey, phase: Phase, epoch: u64) {
        let mut inner = self.inner.write().await;
        if inner.epoch != epoch {
            return;
        }
        if matches!(
            inner.table.get(&(slot, phase)),
            Some(SlotMediaState::Uploading)
        ) {
            inner.table.insert((slot, phase), SlotMediaState::Empty);
        }
    }

    /// Validate a delete precondition without side effects.
    ///
    /// Only `Uploaded` media that the server knows about may be deleted;
    /// locally-previewed descriptors never reach the delete service.
    pub async fn delete_target(&self, slot: SlotKey, phase: Phase) -> Result<MediaDescriptor> {
        let inner = self.inner.read().await;
        match inner.table.get(&(slot, phase)) {
            None => Err(Error::UnknownSlot(slot)),
            Some(SlotMediaState::Uploaded(d)) if d.existing => Ok(d.clone()),
            Some(_) => Err(Error::NothingToDelete { slot, phase }),
        }
    }

    /// Transition `Uploaded → Deleting`, retaining the descriptor for
    /// rollback. Same validation as [`Self::delete_target`].
    pub async fn begin_delete(
        &self,
        slot: SlotKey,
        phase: Phase,
    ) -> Result<(MediaDescriptor, u64)> {
        let mut inner = self.inner.write().await;
        let epoch = inner.epoch;
        match inner.table.get(&(slot, phase)) {
            None => Err(Error::UnknownSlot(slot)),
            Some(SlotMediaState::Uploaded(d)) if d.existing => {
                let descriptor = d.clone();
                inner
                    .table
                    .insert((slot, phase), SlotMediaState::Deleting(descriptor.clone()));
                Ok((descriptor, epoch))
            }
            Some(_) => Err(Error::NothingToDelete { slot, phase }),
        }
    }

    /// Settle a successful delete: the slot returns to `Empty`.
    pub async fn commit_delete(&self, slot: SlotKey, phase: Phase, epoch: u64) -> bool {
        let mut inner = self.inner.write().await;
        if inner.epoch != epoch {
            debug!(
                "Discarding delete result for slot {} ({}): store re-initialized",
                slot, phase
            );
            return false;
        }
        if !matches!(
            inner.table.get(&(slot, phase)),
            Some(SlotMediaState::Deleting(_))
        ) {
            return false;
        }
        inner.table.insert((slot, phase), SlotMediaState::Empty);
        true
    }

    /// Roll a failed delete back to `Uploaded` with the original descriptor.
    pub async fn rollback_delete(
        &self,
        slot: SlotKey,
        phase: Phase,
        epoch: u64,
        descriptor: MediaDescriptor,
    ) {
        let mut inner = self.inner.write().await;
        if inner.epoch != epoch {
            return;
        }
        if matches!(
            inner.table.get(&(slot, phase)),
            Some(SlotMediaState::Deleting(_))
        ) {
            inner
                .table
                .insert((slot, phase), SlotMediaState::Uploaded(descriptor));
        }
    }
}

/// Assign existing server media to slots.
///
/// This is the single seam for the positional-ordering contract: descriptors
/// carrying a server-side `slot_ref` are placed by key first; the remainder
/// fill the unfilled slots in traversal order (Nth remaining entry to the
/// Nth unfilled slot). If the backend ever attaches slot identities to every
/// descriptor, positional inference dies here and nowhere else.
fn assign_existing(
    slots: &[SlotKey],
    table: &mut HashMap<(SlotKey, Phase), SlotMediaState>,
    phase: Phase,
    entries: &[MediaDescriptor],
) {
    let mut positional: Vec<&MediaDescriptor> = Vec::new();

    for entry in entries {
        match entry.slot_ref {
            Some(slot_ref) => {
                let vacant = matches!(
                    table.get(&(slot_ref, phase)),
                    Some(SlotMediaState::Empty)
                );
                if vacant {
                    table.insert((slot_ref, phase), SlotMediaState::Uploaded(as_existing(entry)));
                } else {
                    warn!(
                        "Discarding {} media with dangling slot ref {}",
                        phase, slot_ref
                    );
                }
            }
            None => positional.push(entry),
        }
    }

    let mut remaining = positional.into_iter();
    for slot in slots {
        if matches!(table.get(&(*slot, phase)), Some(SlotMediaState::Empty)) {
            match remaining.next() {
                Some(entry) => {
                    table.insert((*slot, phase), SlotMediaState::Uploaded(as_existing(entry)));
                }
                None => break,
            }
        }
    }

    let leftover = remaining.count();
    if leftover > 0 {
        warn!(
            "Ignoring {} extra {} media entries beyond the slot table",
            leftover, phase
        );
    }
}

/// Server-fetched media is deletable by definition.
fn as_existing(entry: &MediaDescriptor) -> MediaDescriptor {
    let mut descriptor = entry.clone();
    descriptor.existing = true;
    descriptor
}
