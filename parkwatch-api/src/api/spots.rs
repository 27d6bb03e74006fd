//! Parking spot CRUD endpoints
//!
//! Thin controller over the lot store. Request validation keeps the
//! `occupied <= capacity` invariant on this path; the ingestion pipeline
//! enforces the same bound through the normalizer.

use crate::models::ParkingLot;
use crate::{db, ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;

/// Request payload for creating a lot
#[derive(Debug, Deserialize)]
pub struct CreateSpotRequest {
    pub name: String,
    pub capacity: i64,
    /// Defaults to 0
    pub occupied: Option<i64>,
}

/// Request payload for partially updating a lot
#[derive(Debug, Deserialize)]
pub struct UpdateSpotRequest {
    pub name: Option<String>,
    pub capacity: Option<i64>,
    pub occupied: Option<i64>,
}

/// GET /spots
pub async fn list_spots(State(state): State<AppState>) -> ApiResult<Json<Vec<ParkingLot>>> {
    let lots = db::lots::list_all(&state.db).await?;
    Ok(Json(lots))
}

/// POST /spots
pub async fn create_spot(
    State(state): State<AppState>,
    Json(payload): Json<CreateSpotRequest>,
) -> ApiResult<(StatusCode, Json<ParkingLot>)> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name cannot be empty".to_string()));
    }
    if payload.capacity < 0 {
        return Err(ApiError::BadRequest("capacity cannot be negative".to_string()));
    }

    let occupied = payload.occupied.unwrap_or(0);
    if occupied < 0 {
        return Err(ApiError::BadRequest("occupied cannot be negative".to_string()));
    }
    if occupied > payload.capacity {
        return Err(ApiError::BadRequest(
            "occupied cannot exceed capacity".to_string(),
        ));
    }

    if db::lots::find_by_name(&state.db, &payload.name)
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest(format!(
            "parking lot '{}' already exists",
            payload.name
        )));
    }

    let lot = db::lots::create(&state.db, &payload.name, payload.capacity, occupied).await?;

    tracing::info!(name = %lot.name, capacity = lot.capacity, "Parking lot created");

    Ok((StatusCode::CREATED, Json(lot)))
}

/// PATCH /spots/:id
pub async fn update_spot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSpotRequest>,
) -> ApiResult<Json<ParkingLot>> {
    let current = db::lots::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("parking lot id {} does not exist", id)))?;

    let capacity = payload.capacity.unwrap_or(current.capacity);
    let occupied = payload.occupied.unwrap_or(current.occupied);

    if capacity < 0 {
        return Err(ApiError::BadRequest("capacity cannot be negative".to_string()));
    }
    if occupied < 0 {
        return Err(ApiError::BadRequest("occupied cannot be negative".to_string()));
    }
    if occupied > capacity {
        return Err(ApiError::BadRequest(
            "occupied cannot exceed capacity".to_string(),
        ));
    }

    let lot = db::lots::update_fields(
        &state.db,
        id,
        payload.name.as_deref(),
        payload.capacity,
        payload.occupied,
    )
    .await?;

    Ok(Json(lot))
}

/// DELETE /spots/:id
pub async fn delete_spot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let removed = db::lots::delete(&state.db, id).await?;
    if !removed {
        return Err(ApiError::NotFound(format!(
            "parking lot id {} does not exist",
            id
        )));
    }

    tracing::info!(id, "Parking lot deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build spot CRUD routes
pub fn spot_routes() -> Router<AppState> {
    Router::new()
        .route("/spots", get(list_spots).post(create_spot))
        .route("/spots/:id", patch(update_spot).delete(delete_spot))
}
