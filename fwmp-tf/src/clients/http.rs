//! FWMP backend client
//!
//! Implements every collaborator trait over the backend REST API. The
//! backend is treated as a black box: requests go out as JSON or multipart,
//! non-2xx responses come back as [`ClientError::Api`] with the body text as
//! the message.

use super::{
    ClientError, DeleteRequest, MediaDeleteService, MediaUploadService, SectionCatalogService,
    StoredMedia, TaskMutationService, TaskReader,
};
use async_trait::async_trait;
use fwmp_common::models::{
    CandidateFile, GeoPoint, MaterialLine, Phase, ReferenceItem, TaskDetail,
};
use reqwest::multipart;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const USER_AGENT: &str = concat!("FWMP-TF/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Uploads carry up to 100 MB of media; give them a wider window than
/// control-plane calls.
const UPLOAD_TIMEOUT_SECS: u64 = 300;

/// HTTP client for the FWMP backend
pub struct BackendClient {
    http_client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct LocationBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<GeoPoint>,
}

#[derive(Debug, Serialize)]
struct MaterialsBody<'a> {
    materials: &'a [MaterialLine],
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turn a non-2xx response into `ClientError::Api`, passing 2xx through.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn media_part(file: &CandidateFile) -> Result<multipart::Part, ClientError> {
        multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| ClientError::Parse(format!("invalid content type: {}", e)))
    }
}

#[async_trait]
impl TaskReader for BackendClient {
    async fn fetch_task(&self, task_id: Uuid) -> Result<TaskDetail, ClientError> {
        debug!("Fetching task {}", task_id);
        let request = self
            .http_client
            .get(self.url(&format!("/api/v1/tasks/{}", task_id)));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check(response)
            .await?
            .json::<TaskDetail>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MediaUploadService for BackendClient {
    async fn upload_media(
        &self,
        task_id: Uuid,
        section_id: Uuid,
        phase: Phase,
        file: &CandidateFile,
    ) -> Result<StoredMedia, ClientError> {
        debug!(
            "Uploading {} ({} bytes) for task {} phase {}",
            file.file_name,
            file.size(),
            task_id,
            phase
        );

        let form = multipart::Form::new()
            .part("file", Self::media_part(file)?)
            .text("image_type", phase.to_string())
            .text("section_id", section_id.to_string());

        let request = self
            .http_client
            .post(self.url(&format!("/api/v1/tasks/{}/images", task_id)))
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .multipart(form);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check(response)
            .await?
            .json::<StoredMedia>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MediaDeleteService for BackendClient {
    async fn delete_media(&self, request_body: &DeleteRequest) -> Result<(), ClientError> {
        debug!(
            "Deleting media {:?} of {:?} {}",
            request_body.image_id, request_body.entity_type, request_body.entity_id
        );
        let request = self
            .http_client
            .post(self.url("/api/v1/media/delete"))
            .json(request_body);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check(response).await.map(|_| ())
    }
}

#[async_trait]
impl TaskMutationService for BackendClient {
    async fn start_task(
        &self,
        task_id: Uuid,
        location: Option<GeoPoint>,
    ) -> Result<(), ClientError> {
        let request = self
            .http_client
            .post(self.url(&format!("/api/v1/tasks/{}/start", task_id)))
            .json(&LocationBody { location });
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check(response).await.map(|_| ())
    }

    async fn complete_task(
        &self,
        task_id: Uuid,
        location: Option<GeoPoint>,
    ) -> Result<(), ClientError> {
        let request = self
            .http_client
            .post(self.url(&format!("/api/v1/tasks/{}/complete", task_id)))
            .json(&LocationBody { location });
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check(response).await.map(|_| ())
    }

    async fn update_task_materials(
        &self,
        task_id: Uuid,
        materials: &[MaterialLine],
    ) -> Result<(), ClientError> {
        let request = self
            .http_client
            .patch(self.url(&format!("/api/v1/tasks/{}", task_id)))
            .json(&MaterialsBody { materials });
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check(response).await.map(|_| ())
    }
}

#[async_trait]
impl SectionCatalogService for BackendClient {
    async fn fetch_references(
        &self,
        section_id: Uuid,
    ) -> Result<Vec<ReferenceItem>, ClientError> {
        let request = self
            .http_client
            .get(self.url(&format!("/api/v1/sections/{}/references", section_id)));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check(response)
            .await?
            .json::<Vec<ReferenceItem>>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn submit_references(
        &self,
        section_id: Uuid,
        files: &[CandidateFile],
    ) -> Result<Option<Vec<ReferenceItem>>, ClientError> {
        let mut form = multipart::Form::new();
        for file in files {
            form = form.part("files", Self::media_part(file)?);
        }

        let request = self
            .http_client
            .post(self.url(&format!("/api/v1/sections/{}/references", section_id)))
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .multipart(form);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let response = Self::check(response).await?;

        // Some backends return the authoritative catalog, some return 204.
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<Vec<ReferenceItem>>(&body)
            .map(Some)
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}
