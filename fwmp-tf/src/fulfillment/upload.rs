//! Upload orchestration
//!
//! Validates a candidate file, claims the slot (single-flight), issues the
//! upload, and reconciles the outcome into the store. Uploads for distinct
//! slots run concurrently without ordering; per slot+phase the store
//! serializes strictly.

use crate::clients::{MediaUploadService, StoredMedia};
use crate::error::{Error, Result};
use crate::fulfillment::store::FulfillmentStore;
use fwmp_common::events::{EventBus, FwmpEvent};
use fwmp_common::models::{CandidateFile, MediaDescriptor, MediaKind, Phase, SlotKey};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Maximum accepted upload payload (100 MB)
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Validate a candidate file against the boundary constraints.
///
/// Rejected files never reach the upload service.
pub fn validate_candidate(file: &CandidateFile) -> Result<MediaKind> {
    let kind = MediaKind::from_content_type(&file.content_type)
        .ok_or_else(|| Error::UnsupportedMediaKind(file.content_type.clone()))?;

    if file.size() > MAX_UPLOAD_BYTES {
        return Err(Error::PayloadTooLarge {
            size: file.size(),
            limit: MAX_UPLOAD_BYTES,
        });
    }

    Ok(kind)
}

/// Drives uploads for one task's fulfillment store
pub struct UploadOrchestrator {
    store: FulfillmentStore,
    media: Arc<dyn MediaUploadService>,
    events: EventBus,
}

impl UploadOrchestrator {
    pub fn new(
        store: FulfillmentStore,
        media: Arc<dyn MediaUploadService>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            media,
            events,
        }
    }

    /// Upload a file for one slot+phase.
    ///
    /// Local rejections (`UnsupportedMediaKind`, `PayloadTooLarge`,
    /// `UnknownSlot`, `SlotBusy`) happen before any network call. A failed
    /// upload rolls the slot back to empty and surfaces the error; retry is
    /// the caller's decision via a fresh call.
    pub async fn upload(
        &self,
        task_id: Uuid,
        section_id: Uuid,
        slot: SlotKey,
        phase: Phase,
        file: CandidateFile,
    ) -> Result<MediaDescriptor> {
        validate_candidate(&file)?;
        let epoch = self.store.claim_upload(slot, phase).await?;

        debug!(
            "Uploading {} for task {} slot {} ({})",
            file.file_name, task_id, slot, phase
        );
        self.events.emit_lossy(FwmpEvent::SlotUploadStarted {
            task_id,
            slot,
            phase,
            timestamp: chrono::Utc::now(),
        });

        match self
            .media
            .upload_media(task_id, section_id, phase, &file)
            .await
        {
            Ok(stored) => {
                let descriptor = descriptor_from_stored(stored);
                let committed = self
                    .store
                    .commit_upload(slot, phase, epoch, descriptor.clone())
                    .await;
                if committed {
                    self.events.emit_lossy(FwmpEvent::SlotUploadCompleted {
                        task_id,
                        slot,
                        phase,
                        url: descriptor.url.clone(),
                        timestamp: chrono::Utc::now(),
                    });
                }
                Ok(descriptor)
            }
            Err(e) => {
                warn!(
                    "Upload failed for task {} slot {} ({}): {}",
                    task_id, slot, phase, e
                );
                self.store.rollback_upload(slot, phase, epoch).await;
                self.events.emit_lossy(FwmpEvent::SlotUploadFailed {
                    task_id,
                    slot,
                    phase,
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Err(Error::UploadFailed(e.to_string()))
            }
        }
    }
}

/// Build the slot descriptor from the service response.
///
/// The URL is the server's; `existing` is set because the media is now
/// stored and therefore deletable.
fn descriptor_from_stored(stored: StoredMedia) -> MediaDescriptor {
    MediaDescriptor {
        url: stored.url,
        media_kind: stored.media_kind,
        existing: true,
        server_id: stored.server_id,
        delete_token: stored.delete_token,
        slot_ref: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content_type: &str, size: usize) -> CandidateFile {
        CandidateFile {
            file_name: "site.jpg".to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0u8; size],
        }
    }

    #[test]
    fn accepts_image_and_video_mime_prefixes() {
        assert_eq!(validate_candidate(&file("image/png", 10)).unwrap(), MediaKind::Image);
        assert_eq!(validate_candidate(&file("video/mp4", 10)).unwrap(), MediaKind::Video);
    }

    #[test]
    fn rejects_other_mime_types() {
        let err = validate_candidate(&file("application/pdf", 10)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaKind(_)));
    }

    #[test]
    fn rejects_payload_over_limit() {
        let err = validate_candidate(&file("image/png", MAX_UPLOAD_BYTES + 1)).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { .. }));
        // The boundary itself is accepted
        assert!(validate_candidate(&file("image/png", MAX_UPLOAD_BYTES)).is_ok());
    }
}
