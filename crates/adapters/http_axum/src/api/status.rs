//! `GET /api/status` — latest aggregate snapshot.

use axum::Json;
use axum::extract::State;
use housectl_domain::status::SystemStatus;

use crate::state::AppState;

/// `GET /api/status`
pub async fn get<P>(State(state): State<AppState<P>>) -> Json<SystemStatus> {
    Json(state.status.borrow().clone())
}
