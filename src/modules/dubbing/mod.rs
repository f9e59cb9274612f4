use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub mod dto;
pub mod error;
pub mod events;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(handler::enqueue_job))
        .route("/jobs/{id}", get(handler::job_status))
        .route("/audio", post(handler::fetch_audio))
}
