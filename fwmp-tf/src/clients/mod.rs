//! Collaborator contracts consumed by the fulfillment engine
//!
//! The engine never talks to the backend directly; it goes through these
//! narrow traits so orchestration stays testable without a network. The
//! production implementation is [`http::BackendClient`].

pub mod geo;
pub mod http;

use async_trait::async_trait;
use fwmp_common::models::{
    CandidateFile, GeoPoint, MaterialLine, MediaKind, Phase, ReferenceItem, TaskDetail,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by collaborator implementations
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Parse(String),
}

/// Entity owning a stored media object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Task,
    Section,
}

/// What a delete request targets within the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Media,
    Reference,
}

/// Payload for the Media Delete Service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    #[serde(default)]
    pub image_id: Option<Uuid>,
    #[serde(default)]
    pub delete_token: Option<String>,
    pub resource_kind: ResourceKind,
}

/// Descriptor returned by the Media Upload Service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMedia {
    pub url: String,
    pub media_kind: MediaKind,
    #[serde(default)]
    pub server_id: Option<Uuid>,
    #[serde(default)]
    pub delete_token: Option<String>,
}

/// Reads a task's reference media list and existing before/after media
#[async_trait]
pub trait TaskReader: Send + Sync {
    async fn fetch_task(&self, task_id: Uuid) -> Result<TaskDetail, ClientError>;
}

/// Accepts a binary payload plus slot metadata, returns the stored media
#[async_trait]
pub trait MediaUploadService: Send + Sync {
    async fn upload_media(
        &self,
        task_id: Uuid,
        section_id: Uuid,
        phase: Phase,
        file: &CandidateFile,
    ) -> Result<StoredMedia, ClientError>;
}

/// Removes an already-stored media object
#[async_trait]
pub trait MediaDeleteService: Send + Sync {
    async fn delete_media(&self, request: &DeleteRequest) -> Result<(), ClientError>;
}

/// Task lifecycle and material mutations
#[async_trait]
pub trait TaskMutationService: Send + Sync {
    async fn start_task(
        &self,
        task_id: Uuid,
        location: Option<GeoPoint>,
    ) -> Result<(), ClientError>;

    async fn complete_task(
        &self,
        task_id: Uuid,
        location: Option<GeoPoint>,
    ) -> Result<(), ClientError>;

    async fn update_task_materials(
        &self,
        task_id: Uuid,
        materials: &[MaterialLine],
    ) -> Result<(), ClientError>;
}

/// Reads and updates a section's reference catalog
#[async_trait]
pub trait SectionCatalogService: Send + Sync {
    async fn fetch_references(
        &self,
        section_id: Uuid,
    ) -> Result<Vec<ReferenceItem>, ClientError>;

    /// Submit new reference files.
    ///
    /// A `Some` response is the server's authoritative catalog and replaces
    /// the local list wholesale; `None` means the server accepted the files
    /// without returning the new list.
    async fn submit_references(
        &self,
        section_id: Uuid,
        files: &[CandidateFile],
    ) -> Result<Option<Vec<ReferenceItem>>, ClientError>;
}
