//! Single-appointment status and slot transitions.
//!
//! | from     | operation  | to        |
//! |----------|------------|-----------|
//! | Pending  | Approve    | Approved  |
//! | Pending  | Reject     | Rejected  |
//! | Pending  | Expire     | Rejected  |
//! | Approved | Move       | Approved  |
//! | Approved | Cancel     | Cancelled |
//! | Approved | MarkNoShow | NoShow    |
//!
//! Rejected, Cancelled and NoShow have no outgoing edges. Asking for a
//! transition the appointment has already made is a no-op.

use chrono::{Duration, NaiveDateTime};

use crate::errors::AppError;
use crate::models::{
    Appointment, AppointmentStatus, BookedBy, BookingRequest, CustomerType, NewAppointment,
    SlotKey, SlotStatus,
};
use crate::services::availability::SlotIndex;
use crate::services::conflicts;
use crate::state::AppState;
use crate::store::{StatusUpdate, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Approve,
    Reject,
    Expire,
    Move,
    Cancel,
    MarkNoShow,
}

impl Operation {
    /// The status an appointment ends up in after this operation.
    pub fn target(&self) -> AppointmentStatus {
        match self {
            Operation::Approve | Operation::Move => AppointmentStatus::Approved,
            Operation::Reject | Operation::Expire => AppointmentStatus::Rejected,
            Operation::Cancel => AppointmentStatus::Cancelled,
            Operation::MarkNoShow => AppointmentStatus::NoShow,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Operation::Approve => "approve",
            Operation::Reject => "reject",
            Operation::Expire => "expire",
            Operation::Move => "move",
            Operation::Cancel => "cancel",
            Operation::MarkNoShow => "mark as no-show",
        }
    }
}

/// The status `op` leads to from `from`, or `None` when the edge does not
/// exist.
pub fn next_status(from: AppointmentStatus, op: Operation) -> Option<AppointmentStatus> {
    use AppointmentStatus::*;
    match (from, op) {
        (Pending, Operation::Approve) => Some(Approved),
        (Pending, Operation::Reject) | (Pending, Operation::Expire) => Some(Rejected),
        (Approved, Operation::Move) => Some(Approved),
        (Approved, Operation::Cancel) => Some(Cancelled),
        (Approved, Operation::MarkNoShow) => Some(NoShow),
        _ => None,
    }
}

/// An approved appointment may be marked as a no-show once `grace` has
/// passed since it was due to start.
pub fn no_show_eligible(appointment: &Appointment, now: NaiveDateTime, grace: Duration) -> bool {
    now >= appointment.slot.instant() + grace
}

/// Keeps only the digits; the result must be exactly ten of them.
pub fn normalize_phone(raw: &str) -> Result<String, String> {
    if raw.trim().is_empty() {
        return Err("phone number is required".to_string());
    }
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 10 {
        return Err("please enter a valid 10-digit phone number".to_string());
    }
    Ok(digits)
}

/// Checks a booking form and resolves its services against the catalog.
/// Nothing is written.
pub fn validate_request(
    state: &AppState,
    req: &BookingRequest,
    booked_by: BookedBy,
) -> Result<NewAppointment, AppError> {
    let mut problems = vec![];

    let customer_name = req.customer_name.trim().to_string();
    if customer_name.is_empty() {
        problems.push("name is required".to_string());
    }

    let customer_phone = normalize_phone(&req.customer_phone).unwrap_or_else(|e| {
        problems.push(e);
        String::new()
    });

    let mut services = Vec::with_capacity(req.service_ids.len());
    if req.service_ids.is_empty() {
        problems.push("select at least one service".to_string());
    }
    for id in &req.service_ids {
        match state.config.catalog.get(id) {
            Some(service) => services.push(service.clone()),
            None => problems.push(format!("unknown service: {id}")),
        }
    }

    if !state.config.grid.contains(&req.slot.time) {
        problems.push(format!(
            "{} is not a bookable time",
            req.slot.time.format("%H:%M")
        ));
    }

    if !problems.is_empty() {
        return Err(AppError::Validation(problems.join("; ")));
    }

    let total_price = services.iter().map(|s| s.price).sum();
    let customer_type = match booked_by {
        BookedBy::Operator => Some(req.customer_type.unwrap_or(CustomerType::Walkin)),
        BookedBy::Customer => None,
    };

    Ok(NewAppointment {
        customer_name,
        customer_phone,
        slot: req.slot,
        services,
        total_price,
        booked_by,
        customer_type,
        notes: req
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    })
}

pub async fn get(state: &AppState, id: &str) -> Result<Appointment, AppError> {
    state
        .store
        .get_appointment(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))
}

/// A customer request. Enters as Pending, even if the slot is already
/// taken; the operator decides.
pub async fn submit(state: &AppState, req: &BookingRequest) -> Result<Appointment, AppError> {
    let new = validate_request(state, req, BookedBy::Customer)?;
    let id = state
        .store
        .create_appointment(&new, AppointmentStatus::Pending, state.clock.now())
        .await?;

    tracing::info!(
        appointment_id = %id,
        slot = %new.slot,
        total_price = new.total_price,
        "appointment requested"
    );
    get(state, &id).await
}

/// A walk-in or phone booking taken by the operator. Enters as Approved.
pub async fn book_as_operator(
    state: &AppState,
    req: &BookingRequest,
) -> Result<Appointment, AppError> {
    let new = validate_request(state, req, BookedBy::Operator)?;

    let snapshot = state.store.snapshot().await?;
    if SlotIndex::build(&snapshot).is_booked(&new.slot) {
        return Err(AppError::GuardViolation(format!(
            "slot {} is already booked",
            new.slot
        )));
    }

    let id = state
        .store
        .create_appointment(&new, AppointmentStatus::Approved, state.clock.now())
        .await?;

    tracing::info!(
        appointment_id = %id,
        slot = %new.slot,
        customer_type = ?new.customer_type,
        "operator booking created"
    );
    get(state, &id).await
}

/// Approves a pending request and rejects every other pending request for
/// the same slot in the same unit of work.
///
/// Refused with a guard violation while another approved appointment holds
/// the slot, even once the slot has started.
///
/// Approving an appointment that is already approved re-runs the sibling
/// rejections, which is how a partially failed approval is retried.
pub async fn approve(state: &AppState, id: &str) -> Result<Appointment, AppError> {
    let current = get(state, id).await?;
    let now = state.clock.now();

    match current.status {
        AppointmentStatus::Pending => {}
        AppointmentStatus::Approved => {
            conflicts::reject_siblings(state, &current, now).await?;
            return get(state, id).await;
        }
        other => return Err(not_allowed(id, other, Operation::Approve)),
    }

    let snapshot = state.store.snapshot().await?;
    if SlotIndex::build(&snapshot).is_booked(&current.slot) {
        return Err(AppError::GuardViolation(format!(
            "slot {} is already booked by another appointment",
            current.slot
        )));
    }

    let siblings = conflicts::pending_siblings(&snapshot.appointments, &current);
    let mut updates = vec![StatusUpdate {
        id: current.id.clone(),
        from: AppointmentStatus::Pending,
        to: AppointmentStatus::Approved,
        at: now,
    }];
    updates.extend(siblings.iter().map(|s| StatusUpdate {
        id: s.id.clone(),
        from: AppointmentStatus::Pending,
        to: AppointmentStatus::Rejected,
        at: now,
    }));

    match state.store.update_status_batch(&updates).await {
        Ok(applied) if applied.first() == Some(&true) => {
            let rejected = applied.iter().skip(1).filter(|&&changed| changed).count();
            tracing::info!(
                appointment_id = %id,
                slot = %current.slot,
                rejected,
                "appointment approved"
            );
        }
        Ok(_) => {
            // Someone else moved it out of Pending between our read and write.
            let latest = get(state, id).await?;
            if latest.status == AppointmentStatus::Approved {
                conflicts::reject_siblings(state, &latest, now).await?;
                return Ok(latest);
            }
            return Err(not_allowed(id, latest.status, Operation::Approve));
        }
        Err(StoreError::PartialBatch { failed, reason, .. }) => {
            tracing::error!(
                appointment_id = %id,
                failed,
                reason = %reason,
                "approved but conflicting requests were not all rejected"
            );
            return Err(AppError::ConflictBatchPartialFailure {
                approved_id: id.to_string(),
                failed,
                reason,
            });
        }
        Err(e) => return Err(e.into()),
    }

    get(state, id).await
}

pub async fn reject(state: &AppState, id: &str) -> Result<Appointment, AppError> {
    transition(state, id, Operation::Reject).await
}

pub async fn cancel(state: &AppState, id: &str) -> Result<Appointment, AppError> {
    transition(state, id, Operation::Cancel).await
}

pub async fn mark_no_show(state: &AppState, id: &str) -> Result<Appointment, AppError> {
    transition(state, id, Operation::MarkNoShow).await
}

/// Moves an approved appointment to another free slot. Status is unchanged.
pub async fn move_to(state: &AppState, id: &str, target: SlotKey) -> Result<Appointment, AppError> {
    let current = get(state, id).await?;
    if next_status(current.status, Operation::Move).is_none() {
        return Err(not_allowed(id, current.status, Operation::Move));
    }
    if !state.config.grid.contains(&target.time) {
        return Err(AppError::Validation(format!(
            "{} is not a bookable time",
            target.time.format("%H:%M")
        )));
    }
    if target == current.slot {
        return Err(AppError::GuardViolation(format!(
            "appointment {id} is already at {target}"
        )));
    }

    let now = state.clock.now();
    let snapshot = state.store.snapshot().await?;
    let status = SlotIndex::build_excluding(&snapshot, Some(id)).status(&target, now);
    if status != SlotStatus::Available {
        return Err(AppError::GuardViolation(format!(
            "slot {target} is not available ({status:?})"
        )));
    }

    let changed = state
        .store
        .update_slot(id, AppointmentStatus::Approved, target, now)
        .await?;
    if !changed {
        let latest = get(state, id).await?;
        return Err(not_allowed(id, latest.status, Operation::Move));
    }

    tracing::info!(appointment_id = %id, from = %current.slot, to = %target, "appointment moved");
    get(state, id).await
}

/// Hard delete, for operator clean-up.
pub async fn delete(state: &AppState, id: &str) -> Result<(), AppError> {
    if !state.store.delete_appointment(id).await? {
        return Err(AppError::NotFound(format!("appointment {id}")));
    }
    tracing::info!(appointment_id = %id, "appointment deleted");
    Ok(())
}

async fn transition(state: &AppState, id: &str, op: Operation) -> Result<Appointment, AppError> {
    let current = get(state, id).await?;

    let Some(target) = next_status(current.status, op) else {
        let settled =
            matches!(op, Operation::Reject | Operation::Cancel) && current.status.is_terminal();
        if settled || current.status == op.target() {
            tracing::debug!(appointment_id = %id, op = op.as_str(), "already applied");
            return Ok(current);
        }
        return Err(not_allowed(id, current.status, op));
    };

    let now = state.clock.now();
    if op == Operation::MarkNoShow && !no_show_eligible(&current, now, state.config.no_show_grace) {
        return Err(AppError::GuardViolation(format!(
            "appointment {id} cannot be marked as a no-show until {} minutes after {}",
            state.config.no_show_grace.num_minutes(),
            current.slot
        )));
    }

    let changed = state
        .store
        .update_status(&StatusUpdate {
            id: id.to_string(),
            from: current.status,
            to: target,
            at: now,
        })
        .await?;

    if !changed {
        let latest = get(state, id).await?;
        if latest.status == target {
            return Ok(latest);
        }
        return Err(not_allowed(id, latest.status, op));
    }

    tracing::info!(
        appointment_id = %id,
        from = current.status.as_str(),
        to = target.as_str(),
        "appointment status changed"
    );
    get(state, id).await
}

fn not_allowed(id: &str, status: AppointmentStatus, op: Operation) -> AppError {
    if status.is_terminal() {
        return AppError::GuardViolation(format!(
            "cannot {} appointment {id}: it is {} and can no longer change",
            op.as_str(),
            status.as_str()
        ));
    }
    AppError::GuardViolation(format!(
        "cannot {} appointment {id} while it is {}",
        op.as_str(),
        status.as_str()
    ))
}
