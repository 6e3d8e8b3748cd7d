//! Slot expansion
//!
//! Turns a reference list into the flattened, ordered table of work
//! locations. Traversal order is reference-major then slot-minor; existing
//! server media is later assigned against this exact order, so the order is
//! part of the contract, not a detail.

use fwmp_common::models::{ReferenceItem, SlotKey};

/// Expand a reference list into its fulfillment slots.
///
/// A reference item always occupies at least one slot: a missing or zero
/// repeat count behaves as 1. The result length equals the sum of effective
/// repeat counts.
pub fn expand_slots(reference_items: &[ReferenceItem]) -> Vec<SlotKey> {
    let mut slots =
        Vec::with_capacity(reference_items.iter().map(|r| r.effective_repeat_count()).sum());

    for (reference_index, item) in reference_items.iter().enumerate() {
        for slot_index in 0..item.effective_repeat_count() {
            slots.push(SlotKey::new(reference_index, slot_index));
        }
    }

    slots
}
