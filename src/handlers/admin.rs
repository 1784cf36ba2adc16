use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::blocked_slot::{DEFAULT_BLOCKED_BY, DEFAULT_BLOCK_REASON};
use crate::models::{
    Appointment, AppointmentStatus, BlockedSlot, BookingRequest, DailyStats, MonthlyStats, SlotKey,
};
use crate::services::conflicts::{self, ConflictSet, Resolution};
use crate::services::expiry::{self, SweepReport};
use crate::services::live::{self, Overview};
use crate::services::{analytics, booking};
use crate::state::AppState;
use crate::store::AppointmentFilter;

/// A slot as it arrives in a request body, before it is parsed.
#[derive(Deserialize)]
pub struct SlotBody {
    pub date: String,
    pub time: String,
}

impl SlotBody {
    fn parse(&self) -> Result<SlotKey, AppError> {
        SlotKey::parse(&self.date, &self.time).map_err(|e| AppError::Validation(format!("{e:#}")))
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid date: {raw}")))
}

// ── Appointments ──

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub status: Option<String>,
    pub date: Option<String>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            AppointmentStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))
        })
        .transpose()?;
    let date = query.date.as_deref().map(parse_date).transpose()?;

    let appointments = state
        .store
        .list_appointments(&AppointmentFilter { status, date })
        .await?;
    Ok(Json(appointments))
}

// POST /api/admin/appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = booking::book_as_operator(&state, &body).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

// POST /api/admin/appointments/:id/approve
pub async fn approve_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(booking::approve(&state, &id).await?))
}

// POST /api/admin/appointments/:id/reject
pub async fn reject_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(booking::reject(&state, &id).await?))
}

// POST /api/admin/appointments/:id/cancel
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(booking::cancel(&state, &id).await?))
}

// POST /api/admin/appointments/:id/no-show
pub async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(booking::mark_no_show(&state, &id).await?))
}

// POST /api/admin/appointments/:id/move
pub async fn move_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SlotBody>,
) -> Result<Json<Appointment>, AppError> {
    let target = body.parse()?;
    Ok(Json(booking::move_to(&state, &id, target).await?))
}

// DELETE /api/admin/appointments/:id
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    booking::delete(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Conflicts ──

// GET /api/admin/conflicts
pub async fn list_conflicts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ConflictSet>>, AppError> {
    let snapshot = state.store.snapshot().await?;
    Ok(Json(conflicts::detect(&snapshot)))
}

// GET /api/admin/conflicts/next
pub async fn next_conflict(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<ConflictSet>>, AppError> {
    let snapshot = state.store.snapshot().await?;
    Ok(Json(conflicts::next(&snapshot)))
}

// POST /api/admin/conflicts/resolve
#[derive(Deserialize)]
pub struct ResolveRequest {
    #[serde(flatten)]
    pub slot: SlotBody,
    pub keep_id: String,
}

pub async fn resolve_conflict(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<Resolution>, AppError> {
    let slot = body.slot.parse()?;
    Ok(Json(
        conflicts::resolve_manually(&state, slot, &body.keep_id).await?,
    ))
}

// ── Blocked slots ──

// GET /api/admin/blocked
pub async fn get_blocked(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BlockedSlot>>, AppError> {
    Ok(Json(state.store.list_blocked_slots().await?))
}

// POST /api/admin/block
#[derive(Deserialize)]
pub struct BlockRequest {
    #[serde(flatten)]
    pub slot: SlotBody,
    pub reason: Option<String>,
    pub blocked_by: Option<String>,
}

pub async fn block_slot(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BlockRequest>,
) -> Result<Json<BlockedSlot>, AppError> {
    let slot = body.slot.parse()?;
    if !state.config.grid.contains(&slot.time) {
        return Err(AppError::Validation(format!(
            "{} is not a bookable time",
            slot.time.format("%H:%M")
        )));
    }

    let reason = body
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_BLOCK_REASON);
    let blocked_by = body.blocked_by.as_deref().unwrap_or(DEFAULT_BLOCKED_BY);

    let blocked = state
        .store
        .block_slot(slot, reason, blocked_by, state.clock.now())
        .await?;
    tracing::info!(slot = %slot, reason, "slot blocked");
    Ok(Json(blocked))
}

// POST /api/admin/unblock
#[derive(Serialize)]
pub struct UnblockResponse {
    removed: usize,
}

pub async fn unblock_slot(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SlotBody>,
) -> Result<Json<UnblockResponse>, AppError> {
    let slot = body.parse()?;
    let removed = state.store.unblock_slot(slot).await?;
    if removed > 0 {
        tracing::info!(slot = %slot, removed, "slot unblocked");
    }
    Ok(Json(UnblockResponse { removed }))
}

// ── Analytics ──

// GET /api/admin/stats/daily
#[derive(Deserialize)]
pub struct DailyQuery {
    pub date: Option<String>,
}

pub async fn daily_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailyQuery>,
) -> Result<Json<DailyStats>, AppError> {
    let date = match query.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => state.clock.now().date(),
    };
    let snapshot = state.store.snapshot().await?;
    Ok(Json(analytics::daily(&snapshot, date)))
}

// GET /api/admin/stats/monthly
#[derive(Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

pub async fn monthly_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthlyQuery>,
) -> Result<Json<MonthlyStats>, AppError> {
    let today = state.clock.now().date();
    let year = query.year.unwrap_or(today.year());
    let month = query.month.unwrap_or(today.month());
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation(format!("invalid month: {month}")));
    }

    let snapshot = state.store.snapshot().await?;
    Ok(Json(analytics::monthly(&snapshot, year, month)))
}

// GET /api/admin/overview
pub async fn get_overview(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Overview>, AppError> {
    Ok(Json(live::current(&state).await?))
}

// POST /api/admin/expiry/sweep
pub async fn run_expiry_sweep(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepReport>, AppError> {
    Ok(Json(expiry::sweep(&state).await?))
}
