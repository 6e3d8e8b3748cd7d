//! Wire models shared across FWMP services
//!
//! These mirror the backend REST contract: tasks, reference media, stored
//! media descriptors, and material lines. Everything here is plain data;
//! behavior lives in the service crates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of media carried by a reference item or stored descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a MIME content type by its accepted prefixes.
    ///
    /// Returns `None` for anything that is neither `image/*` nor `video/*`.
    pub fn from_content_type(content_type: &str) -> Option<MediaKind> {
        if content_type.starts_with("image/") {
            Some(MediaKind::Image)
        } else if content_type.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Fulfillment phase of a work location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Before,
    After,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Before => write!(f, "before"),
            Phase::After => write!(f, "after"),
        }
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "before" => Ok(Phase::Before),
            "after" => Ok(Phase::After),
            other => Err(format!("unknown phase: {}", other)),
        }
    }
}

/// Identity of one work location within a task's reference list
///
/// Derived from the reference list (never persisted): `reference_index` is
/// the position in the list, `slot_index` runs 0..repeat_count.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SlotKey {
    pub reference_index: usize,
    pub slot_index: usize,
}

impl SlotKey {
    pub fn new(reference_index: usize, slot_index: usize) -> Self {
        Self {
            reference_index,
            slot_index,
        }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.reference_index, self.slot_index)
    }
}

/// Catalog entry describing a work area, optionally repeated across
/// multiple physical locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceItem {
    pub id: Uuid,
    pub url: String,
    pub media_kind: MediaKind,
    #[serde(default)]
    pub caption: Option<String>,
    /// Number of work locations this reference expands into.
    /// Absent or zero behaves as 1.
    #[serde(default)]
    pub repeat_count: Option<u32>,
}

impl ReferenceItem {
    /// Repeat count as actually applied: a reference item always occupies
    /// at least one slot.
    pub fn effective_repeat_count(&self) -> usize {
        match self.repeat_count {
            Some(n) if n >= 1 => n as usize,
            _ => 1,
        }
    }
}

/// Stored media as known to the backend (or previewed locally)
///
/// `existing = false` marks a locally-created preview that has never been
/// acknowledged by the server; such a descriptor must never be handed to the
/// delete service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub url: String,
    pub media_kind: MediaKind,
    #[serde(default)]
    pub existing: bool,
    #[serde(default)]
    pub server_id: Option<Uuid>,
    #[serde(default)]
    pub delete_token: Option<String>,
    /// Server-attached slot identity, when the backend provides one.
    /// Takes precedence over positional assignment during reconciliation.
    #[serde(default)]
    pub slot_ref: Option<SlotKey>,
}

/// One material requirement line on a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub item_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit: String,
    #[serde(default)]
    pub confirmed: bool,
}

/// Task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// `Completed` is terminal: no engine component may mutate task state
    /// past it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Assigned => write!(f, "assigned"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Existing before/after media of a task as returned by the backend
///
/// The arrays are positional: the Nth `before` entry belongs to the Nth slot
/// in traversal order unless the descriptor carries a `slot_ref`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskImages {
    #[serde(default)]
    pub before: Vec<MediaDescriptor>,
    #[serde(default)]
    pub after: Vec<MediaDescriptor>,
}

/// Full task view as returned by the Task Reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetail {
    pub id: Uuid,
    pub section_id: Uuid,
    #[serde(default)]
    pub reference_images: Vec<ReferenceItem>,
    #[serde(default)]
    pub images: TaskImages,
    #[serde(default)]
    pub materials: Vec<MaterialLine>,
    pub status: TaskStatus,
}

/// Geographic position reported by the worker's device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A candidate upload, already pulled off the wire
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl CandidateFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}
