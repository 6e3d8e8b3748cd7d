//! Reference-catalog reconciliation
//!
//! Editing a section's reference catalog is a sibling concern to task
//! fulfillment: new reference files appear locally the moment they are
//! picked (optimistic, previewed), and reconcile against the server response
//! on submit. The server's authoritative list replaces the local one
//! wholesale when present; otherwise synthesized entries from the pending
//! files keep the view stable. Removal of an existing entry is armed,
//! confirmed, and rolled back at its original position on failure.

use crate::clients::{
    ClientError, DeleteRequest, EntityType, MediaDeleteService, ResourceKind,
    SectionCatalogService,
};
use crate::error::{Error, Result};
use crate::fulfillment::upload::validate_candidate;
use fwmp_common::events::{EventBus, FwmpEvent};
use fwmp_common::models::{CandidateFile, MediaKind, ReferenceItem};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// One catalog entry as the editor sees it
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub reference: ReferenceItem,
    /// Locally previewed, not yet acknowledged by the server
    pub pending: bool,
}

#[derive(Debug, Default)]
struct EditorInner {
    entries: Vec<CatalogEntry>,
    /// Files backing the pending entries, keyed by synthesized reference id
    pending_files: Vec<(Uuid, CandidateFile)>,
    armed_remove: Option<Uuid>,
}

/// Optimistic editor over one section's reference catalog
pub struct CatalogEditor {
    section_id: Uuid,
    catalog: Arc<dyn SectionCatalogService>,
    deleter: Arc<dyn MediaDeleteService>,
    events: EventBus,
    inner: Arc<RwLock<EditorInner>>,
}

impl CatalogEditor {
    /// Load an editor seeded from the server's current catalog.
    pub async fn load(
        section_id: Uuid,
        catalog: Arc<dyn SectionCatalogService>,
        deleter: Arc<dyn MediaDeleteService>,
        events: EventBus,
    ) -> std::result::Result<Self, ClientError> {
        let existing = catalog.fetch_references(section_id).await?;
        let entries = existing
            .into_iter()
            .map(|reference| CatalogEntry {
                reference,
                pending: false,
            })
            .collect();

        Ok(Self {
            section_id,
            catalog,
            deleter,
            events,
            inner: Arc::new(RwLock::new(EditorInner {
                entries,
                pending_files: Vec::new(),
                armed_remove: None,
            })),
        })
    }

    pub fn section_id(&self) -> Uuid {
        self.section_id
    }

    pub async fn entries(&self) -> Vec<CatalogEntry> {
        self.inner.read().await.entries.clone()
    }

    /// Append locally-previewed entries for the picked files.
    ///
    /// Files are validated with the upload boundary rules; entries appear
    /// immediately with `existing = false` semantics (they cannot be sent to
    /// the delete service and are replaced on submit).
    pub async fn add_pending(&self, files: Vec<CandidateFile>) -> Result<Vec<ReferenceItem>> {
        let mut validated = Vec::with_capacity(files.len());
        for file in files {
            let kind = validate_candidate(&file)?;
            validated.push((file, kind));
        }

        let mut inner = self.inner.write().await;
        let mut added = Vec::with_capacity(validated.len());
        for (file, kind) in validated {
            let reference = synthesize_reference(&file, kind);
            inner.pending_files.push((reference.id, file));
            inner.entries.push(CatalogEntry {
                reference: reference.clone(),
                pending: true,
            });
            added.push(reference);
        }
        Ok(added)
    }

    /// Submit pending files and reconcile with the server response.
    ///
    /// Returns the catalog after reconciliation. On failure the optimistic
    /// pending entries are rolled back (removed) and the error surfaced.
    pub async fn submit(&self) -> Result<Vec<ReferenceItem>> {
        let (files, submitted_ids) = {
            let mut inner = self.inner.write().await;
            let taken = std::mem::take(&mut inner.pending_files);
            let ids: Vec<Uuid> = taken.iter().map(|(id, _)| *id).collect();
            let files: Vec<CandidateFile> = taken.into_iter().map(|(_, f)| f).collect();
            (files, ids)
        };

        if files.is_empty() {
            return Ok(self.current_references().await);
        }

        match self.catalog.submit_references(self.section_id, &files).await {
            Ok(Some(authoritative)) => {
                let mut inner = self.inner.write().await;
                // Entries that went pending while this submit was in flight
                // survive the wholesale replace.
                let still_pending: Vec<CatalogEntry> = inner
                    .entries
                    .iter()
                    .filter(|e| e.pending && !submitted_ids.contains(&e.reference.id))
                    .cloned()
                    .collect();
                inner.entries = authoritative
                    .iter()
                    .cloned()
                    .map(|reference| CatalogEntry {
                        reference,
                        pending: false,
                    })
                    .collect();
                inner.entries.extend(still_pending);
                drop(inner);

                self.emit_updated().await;
                Ok(authoritative)
            }
            Ok(None) => {
                // Server accepted without returning the new list; the
                // synthesized entries stand in for it.
                let mut inner = self.inner.write().await;
                for entry in &mut inner.entries {
                    if submitted_ids.contains(&entry.reference.id) {
                        entry.pending = false;
                    }
                }
                drop(inner);

                self.emit_updated().await;
                Ok(self.current_references().await)
            }
            Err(e) => {
                warn!(
                    "Catalog submit failed for section {}: {}",
                    self.section_id, e
                );
                let mut inner = self.inner.write().await;
                inner
                    .entries
                    .retain(|e| !submitted_ids.contains(&e.reference.id));
                drop(inner);
                Err(Error::UploadFailed(e.to_string()))
            }
        }
    }

    /// Stage a removal for confirmation. No side effects.
    pub async fn request_remove(&self, reference_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner
            .entries
            .iter()
            .any(|e| e.reference.id == reference_id)
        {
            return Err(Error::UnknownReference(reference_id));
        }
        inner.armed_remove = Some(reference_id);
        debug!("Armed catalog remove for reference {}", reference_id);
        Ok(())
    }

    /// Drop the armed removal, if any. Returns whether one was armed.
    pub async fn cancel_remove(&self) -> bool {
        self.inner.write().await.armed_remove.take().is_some()
    }

    /// Perform the armed removal.
    ///
    /// Pending entries are purely local and disappear without a server
    /// call. Existing entries are removed optimistically and restored at
    /// their original position if the delete service fails.
    pub async fn confirm_remove(&self) -> Result<()> {
        let reference_id = {
            let mut inner = self.inner.write().await;
            inner.armed_remove.take().ok_or(Error::NotArmed)?
        };

        let (index, entry) = {
            let mut inner = self.inner.write().await;
            let index = inner
                .entries
                .iter()
                .position(|e| e.reference.id == reference_id)
                .ok_or(Error::UnknownReference(reference_id))?;
            let entry = inner.entries.remove(index);
            if entry.pending {
                inner.pending_files.retain(|(id, _)| *id != reference_id);
            }
            (index, entry)
        };

        if entry.pending {
            self.emit_updated().await;
            return Ok(());
        }

        let request = DeleteRequest {
            entity_type: EntityType::Section,
            entity_id: self.section_id,
            image_id: Some(reference_id),
            delete_token: None,
            resource_kind: ResourceKind::Reference,
        };

        match self.deleter.delete_media(&request).await {
            Ok(()) => {
                self.emit_updated().await;
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Catalog remove failed for reference {} in section {}: {}",
                    reference_id, self.section_id, e
                );
                let mut inner = self.inner.write().await;
                let at = index.min(inner.entries.len());
                inner.entries.insert(at, entry);
                drop(inner);

                self.events.emit_lossy(FwmpEvent::CatalogRemoveFailed {
                    section_id: self.section_id,
                    reference_id,
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Err(Error::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn current_references(&self) -> Vec<ReferenceItem> {
        self.inner
            .read()
            .await
            .entries
            .iter()
            .map(|e| e.reference.clone())
            .collect()
    }

    async fn emit_updated(&self) {
        let count = self.inner.read().await.entries.len();
        self.events.emit_lossy(FwmpEvent::CatalogUpdated {
            section_id: self.section_id,
            reference_count: count,
            timestamp: chrono::Utc::now(),
        });
    }
}

/// Build the locally-previewed reference entry for a picked file.
fn synthesize_reference(file: &CandidateFile, kind: MediaKind) -> ReferenceItem {
    let id = Uuid::new_v4();
    ReferenceItem {
        id,
        url: format!("pending://{}/{}", id, file.file_name),
        media_kind: kind,
        caption: None,
        repeat_count: None,
    }
}

/// Per-section catalog editors, created on first use
pub struct CatalogManager {
    catalog: Arc<dyn SectionCatalogService>,
    deleter: Arc<dyn MediaDeleteService>,
    events: EventBus,
    editors: RwLock<HashMap<Uuid, Arc<CatalogEditor>>>,
}

impl CatalogManager {
    pub fn new(
        catalog: Arc<dyn SectionCatalogService>,
        deleter: Arc<dyn MediaDeleteService>,
        events: EventBus,
    ) -> Self {
        Self {
            catalog,
            deleter,
            events,
            editors: RwLock::new(HashMap::new()),
        }
    }

    /// Get the editor for a section, loading it from the backend on first
    /// use.
    pub async fn editor(&self, section_id: Uuid) -> Result<Arc<CatalogEditor>> {
        if let Some(editor) = self.editors.read().await.get(&section_id) {
            return Ok(editor.clone());
        }

        let editor = CatalogEditor::load(
            section_id,
            self.catalog.clone(),
            self.deleter.clone(),
            self.events.clone(),
        )
        .await
        .map_err(|e| Error::NotFound(format!("section {}: {}", section_id, e)))?;

        let editor = Arc::new(editor);
        let mut editors = self.editors.write().await;
        // Another caller may have loaded the section concurrently; the first
        // insert wins so both see one editor.
        Ok(editors
            .entry(section_id)
            .or_insert_with(|| editor.clone())
            .clone())
    }
}
