//! Shared test harness for fulfillment engine tests
//!
//! Provides a programmable in-memory backend implementing every collaborator
//! trait, with failure injection, call counters, and gates to hold requests
//! in flight.

#![allow(dead_code)]

use async_trait::async_trait;
use fwmp_common::events::EventBus;
use fwmp_common::models::{
    CandidateFile, GeoPoint, MaterialLine, MediaDescriptor, MediaKind, Phase, ReferenceItem,
    TaskDetail, TaskImages, TaskStatus,
};
use fwmp_tf::clients::{
    ClientError, DeleteRequest, MediaDeleteService, MediaUploadService, SectionCatalogService,
    StoredMedia, TaskMutationService, TaskReader,
};
use fwmp_tf::task::TaskSession;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

/// How the mock answers a catalog submit
#[derive(Debug, Clone)]
pub enum SubmitMode {
    /// Return an authoritative reference list
    ReturnList(Vec<ReferenceItem>),
    /// Accept without returning the new list
    Accept,
    /// Fail the call
    Fail,
}

/// Programmable backend standing in for every collaborator service
pub struct MockBackend {
    pub task: Mutex<Option<TaskDetail>>,
    pub references: Mutex<Vec<ReferenceItem>>,
    pub submit_mode: Mutex<SubmitMode>,

    pub upload_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub complete_calls: AtomicUsize,
    pub materials_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,

    pub fail_uploads: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_complete: AtomicBool,
    pub fail_materials: AtomicBool,

    /// When set, uploads wait on the notify before resolving
    pub upload_gate: Mutex<Option<Arc<Notify>>>,
    /// When set, deletes wait on the notify before resolving
    pub delete_gate: Mutex<Option<Arc<Notify>>>,

    pub delete_requests: Mutex<Vec<DeleteRequest>>,
    pub last_materials: Mutex<Vec<MaterialLine>>,
    pub last_locations: Mutex<Vec<Option<GeoPoint>>>,

    upload_seq: AtomicUsize,
}

impl MockBackend {
    pub fn new(task: TaskDetail) -> Arc<Self> {
        Arc::new(Self {
            task: Mutex::new(Some(task)),
            references: Mutex::new(Vec::new()),
            submit_mode: Mutex::new(SubmitMode::Accept),
            upload_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            materials_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            fail_complete: AtomicBool::new(false),
            fail_materials: AtomicBool::new(false),
            upload_gate: Mutex::new(None),
            delete_gate: Mutex::new(None),
            delete_requests: Mutex::new(Vec::new()),
            last_materials: Mutex::new(Vec::new()),
            last_locations: Mutex::new(Vec::new()),
            upload_seq: AtomicUsize::new(0),
        })
    }

    /// Install an upload gate; uploads block until the returned notify
    /// fires.
    pub fn hold_uploads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.upload_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn release_upload_gate(&self) {
        *self.upload_gate.lock().unwrap() = None;
    }

    /// Install a delete gate; deletes block until the returned notify fires.
    pub fn hold_deletes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.delete_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn api_failure(what: &str) -> ClientError {
        ClientError::Api {
            status: 500,
            message: format!("{} rejected by test backend", what),
        }
    }
}

#[async_trait]
impl TaskReader for MockBackend {
    async fn fetch_task(&self, task_id: Uuid) -> Result<TaskDetail, ClientError> {
        let task = self.task.lock().unwrap().clone();
        match task {
            Some(detail) if detail.id == task_id => Ok(detail),
            _ => Err(ClientError::Api {
                status: 404,
                message: "task not found".to_string(),
            }),
        }
    }
}

#[async_trait]
impl MediaUploadService for MockBackend {
    async fn upload_media(
        &self,
        _task_id: Uuid,
        _section_id: Uuid,
        _phase: Phase,
        file: &CandidateFile,
    ) -> Result<StoredMedia, ClientError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(Self::api_failure("upload"));
        }

        let n = self.upload_seq.fetch_add(1, Ordering::SeqCst);
        Ok(StoredMedia {
            url: format!("https://media.fwmp.example/{}.jpg", n),
            media_kind: MediaKind::from_content_type(&file.content_type)
                .unwrap_or(MediaKind::Image),
            server_id: Some(Uuid::new_v4()),
            delete_token: Some(format!("tok-{}", n)),
        })
    }
}

#[async_trait]
impl MediaDeleteService for MockBackend {
    async fn delete_media(&self, request: &DeleteRequest) -> Result<(), ClientError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.delete_requests.lock().unwrap().push(request.clone());

        let gate = self.delete_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::api_failure("delete"));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskMutationService for MockBackend {
    async fn start_task(
        &self,
        _task_id: Uuid,
        location: Option<GeoPoint>,
    ) -> Result<(), ClientError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.last_locations.lock().unwrap().push(location);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Self::api_failure("start"));
        }
        Ok(())
    }

    async fn complete_task(
        &self,
        _task_id: Uuid,
        location: Option<GeoPoint>,
    ) -> Result<(), ClientError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.last_locations.lock().unwrap().push(location);
        if self.fail_complete.load(Ordering::SeqCst) {
            return Err(Self::api_failure("complete"));
        }
        Ok(())
    }

    async fn update_task_materials(
        &self,
        _task_id: Uuid,
        materials: &[MaterialLine],
    ) -> Result<(), ClientError> {
        self.materials_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_materials.load(Ordering::SeqCst) {
            return Err(Self::api_failure("materials"));
        }
        *self.last_materials.lock().unwrap() = materials.to_vec();
        Ok(())
    }
}

#[async_trait]
impl SectionCatalogService for MockBackend {
    async fn fetch_references(
        &self,
        _section_id: Uuid,
    ) -> Result<Vec<ReferenceItem>, ClientError> {
        Ok(self.references.lock().unwrap().clone())
    }

    async fn submit_references(
        &self,
        _section_id: Uuid,
        _files: &[CandidateFile],
    ) -> Result<Option<Vec<ReferenceItem>>, ClientError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let mode = self.submit_mode.lock().unwrap().clone();
        match mode {
            SubmitMode::ReturnList(list) => Ok(Some(list)),
            SubmitMode::Accept => Ok(None),
            SubmitMode::Fail => Err(Self::api_failure("submit")),
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn reference(repeat_count: Option<u32>) -> ReferenceItem {
    ReferenceItem {
        id: Uuid::new_v4(),
        url: "https://cdn.fwmp.example/ref.jpg".to_string(),
        media_kind: MediaKind::Image,
        caption: Some("north wall".to_string()),
        repeat_count,
    }
}

pub fn server_media(url: &str) -> MediaDescriptor {
    MediaDescriptor {
        url: url.to_string(),
        media_kind: MediaKind::Image,
        existing: false,
        server_id: Some(Uuid::new_v4()),
        delete_token: Some("server-tok".to_string()),
        slot_ref: None,
    }
}

pub fn task_detail(
    references: Vec<ReferenceItem>,
    images: TaskImages,
    materials: Vec<MaterialLine>,
    status: TaskStatus,
) -> TaskDetail {
    TaskDetail {
        id: Uuid::new_v4(),
        section_id: Uuid::new_v4(),
        reference_images: references,
        images,
        materials,
        status,
    }
}

pub fn image_file(name: &str) -> CandidateFile {
    CandidateFile {
        file_name: name.to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
    }
}

pub fn video_file(name: &str) -> CandidateFile {
    CandidateFile {
        file_name: name.to_string(),
        content_type: "video/mp4".to_string(),
        bytes: vec![0x00, 0x00, 0x00, 0x18],
    }
}

/// Load a session against the mock backend.
///
/// Returns the session plus the event bus it emits on.
pub async fn load_session(mock: &Arc<MockBackend>) -> (Arc<TaskSession>, EventBus) {
    let task_id = mock
        .task
        .lock()
        .unwrap()
        .as_ref()
        .expect("mock has a task")
        .id;
    let events = EventBus::new(64);
    let session = TaskSession::load(
        task_id,
        mock.clone(),
        mock.clone(),
        mock.clone(),
        mock.clone(),
        events.clone(),
    )
    .await
    .expect("session loads");
    (Arc::new(session), events)
}

/// Wait until the mock has seen `count` upload calls (the spawned upload
/// reached its suspension point).
pub async fn wait_for_upload_calls(mock: &Arc<MockBackend>, count: usize) {
    for _ in 0..200 {
        if mock.upload_calls.load(Ordering::SeqCst) >= count {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("backend never saw {} upload calls", count);
}

/// Wait until the mock has seen `count` delete calls.
pub async fn wait_for_delete_calls(mock: &Arc<MockBackend>, count: usize) {
    for _ in 0..200 {
        if mock.delete_calls.load(Ordering::SeqCst) >= count {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("backend never saw {} delete calls", count);
}
