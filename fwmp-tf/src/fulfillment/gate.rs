//! Completion gate
//!
//! Pure derived computation over an immutable snapshot of the slot table
//! and the material list. Recomputed from scratch on every read so the gate
//! can never drift from the table after a rollback.

use crate::fulfillment::store::StoreSnapshot;
use fwmp_common::models::{MaterialLine, Phase};
use serde::Serialize;

/// Derived booleans gating the in-progress → completed transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionStatus {
    pub total_slots: usize,
    pub before_count: usize,
    pub after_count: usize,
    pub all_media_complete: bool,
    pub any_in_flight: bool,
    pub materials_confirmed: bool,
    pub can_complete: bool,
}

impl CompletionStatus {
    /// Human-readable reason the gate is closed, for error reporting.
    /// `None` when `can_complete`.
    pub fn blocking_reason(&self) -> Option<String> {
        if self.can_complete {
            return None;
        }
        if self.any_in_flight {
            return Some("media operations still in flight".to_string());
        }
        if !self.all_media_complete {
            return Some(format!(
                "media incomplete: {}/{} before, {}/{} after",
                self.before_count, self.total_slots, self.after_count, self.total_slots
            ));
        }
        Some("materials not confirmed".to_string())
    }
}

/// Evaluate the gate for one snapshot + material list.
pub fn evaluate(snapshot: &StoreSnapshot, materials: &[MaterialLine]) -> CompletionStatus {
    let total_slots = snapshot.slots.len();

    let mut before_count = 0;
    let mut after_count = 0;
    let mut any_in_flight = false;

    for slot in &snapshot.slots {
        for phase in [Phase::Before, Phase::After] {
            if let Some(state) = snapshot.state(*slot, phase) {
                if state.is_in_flight() {
                    any_in_flight = true;
                }
                if state.is_uploaded() {
                    match phase {
                        Phase::Before => before_count += 1,
                        Phase::After => after_count += 1,
                    }
                }
            }
        }
    }

    let all_media_complete = before_count == total_slots && after_count == total_slots;
    // Vacuously true for an empty list
    let materials_confirmed = materials.iter().all(|line| line.confirmed);
    let can_complete = all_media_complete && materials_confirmed && !any_in_flight;

    CompletionStatus {
        total_slots,
        before_count,
        after_count,
        all_media_complete,
        any_in_flight,
        materials_confirmed,
        can_complete,
    }
}
