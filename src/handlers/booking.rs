use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Appointment, BookingRequest, Service};
use crate::services::availability::{self, DayBoard};
use crate::services::{booking, expiry};
use crate::state::AppState;

// GET /api/services
pub async fn get_services(State(state): State<Arc<AppState>>) -> Json<Vec<Service>> {
    Json(state.config.catalog.all().to_vec())
}

// GET /api/availability
#[derive(Serialize)]
pub struct AvailabilityResponse {
    days: Vec<DayBoard>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    if state.config.sweep_before_availability {
        expiry::sweep_quietly(&state).await;
    }

    let snapshot = state.store.snapshot().await?;
    let days = availability::board(&snapshot, &state.config.grid, state.clock.now());
    Ok(Json(AvailabilityResponse { days }))
}

// POST /api/appointments
pub async fn submit_appointment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = booking::submit(&state, &body).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}
