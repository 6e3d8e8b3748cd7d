//! REST API implementation for the Task Fulfillment service
//!
//! The surface the field-worker UI drives: task loading, slot uploads and
//! deletes, materials, lifecycle transitions, catalog editing, and the SSE
//! event stream.

pub mod handlers;
pub mod sse;

use crate::catalog::CatalogManager;
use crate::fulfillment::upload::MAX_UPLOAD_BYTES;
use crate::task::SessionManager;
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use fwmp_common::events::EventBus;
use serde_json::json;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub catalogs: Arc<CatalogManager>,
    pub events: EventBus,
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))

        // API v1 routes
        .nest("/api/v1", Router::new()
            // Task view
            .route("/tasks/:task_id/load", post(handlers::load_task))
            .route("/tasks/:task_id/close", post(handlers::close_task))
            .route("/tasks/:task_id/fulfillment", get(handlers::get_fulfillment))

            // Slot media endpoints
            .route(
                "/tasks/:task_id/slots/:reference_index/:slot_index/:phase/upload",
                post(handlers::upload_slot_media),
            )
            .route(
                "/tasks/:task_id/slots/:reference_index/:slot_index/:phase/delete",
                post(handlers::request_slot_delete),
            )
            .route("/tasks/:task_id/delete/confirm", post(handlers::confirm_slot_delete))
            .route("/tasks/:task_id/delete/cancel", post(handlers::cancel_slot_delete))

            // Material endpoints
            .route("/tasks/:task_id/materials", get(handlers::list_materials))
            .route("/tasks/:task_id/materials", post(handlers::add_material))
            .route("/tasks/:task_id/materials/confirm", post(handlers::confirm_materials))
            .route("/tasks/:task_id/materials/:item_id", put(handlers::set_material_quantity))
            .route("/tasks/:task_id/materials/:item_id", delete(handlers::remove_material))

            // Lifecycle endpoints
            .route("/tasks/:task_id/start", post(handlers::start_task))
            .route("/tasks/:task_id/complete", post(handlers::complete_task))

            // Section reference catalog
            .route("/sections/:section_id/references", get(handlers::list_references))
            .route("/sections/:section_id/references", post(handlers::add_references))
            .route("/sections/:section_id/references/submit", post(handlers::submit_references))
            .route(
                "/sections/:section_id/references/:reference_id/delete",
                post(handlers::request_reference_remove),
            )
            .route(
                "/sections/:section_id/references/remove/confirm",
                post(handlers::confirm_reference_remove),
            )
            .route(
                "/sections/:section_id/references/remove/cancel",
                post(handlers::cancel_reference_remove),
            )

            // SSE events
            .route("/events", get(sse::event_stream))
        )
        // Media uploads run up to 100 MB; leave headroom for multipart framing
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "fwmp-tf",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.port,
    }))
}
