use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus, SlotKey};
use crate::state::AppState;
use crate::store::{Snapshot, StatusUpdate};

/// Two or more pending requests for the same slot.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictSet {
    pub slot: SlotKey,
    /// Oldest request first.
    pub appointments: Vec<Appointment>,
}

impl ConflictSet {
    pub fn contains(&self, id: &str) -> bool {
        self.appointments.iter().any(|a| a.id == id)
    }
}

/// Every conflict set in the snapshot, ordered by slot (date, then time).
///
/// Approved appointments are never part of a conflict, even when pending
/// requests share their slot.
pub fn detect(snapshot: &Snapshot) -> Vec<ConflictSet> {
    let mut by_slot: BTreeMap<SlotKey, Vec<Appointment>> = BTreeMap::new();
    for appt in snapshot.with_status(AppointmentStatus::Pending) {
        by_slot.entry(appt.slot).or_default().push(appt.clone());
    }

    by_slot
        .into_iter()
        .filter(|(_, group)| group.len() >= 2)
        .map(|(slot, mut appointments)| {
            appointments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            ConflictSet { slot, appointments }
        })
        .collect()
}

/// The conflict to surface first when only one can be shown.
pub fn next(snapshot: &Snapshot) -> Option<ConflictSet> {
    detect(snapshot).into_iter().next()
}

/// Other pending requests competing for `appointment`'s slot.
pub fn pending_siblings<'a>(
    appointments: &'a [Appointment],
    appointment: &Appointment,
) -> Vec<&'a Appointment> {
    appointments
        .iter()
        .filter(|a| {
            a.id != appointment.id
                && a.status == AppointmentStatus::Pending
                && a.slot == appointment.slot
        })
        .collect()
}

/// Rejects every pending request left on `approved`'s slot, returning how
/// many changed. Each write is attempted even if an earlier one fails.
pub async fn reject_siblings(
    state: &AppState,
    approved: &Appointment,
    now: NaiveDateTime,
) -> Result<usize, AppError> {
    let snapshot = state.store.snapshot().await?;
    let siblings = pending_siblings(&snapshot.appointments, approved);

    let mut rejected = 0;
    let mut failed = 0;
    let mut first_reason = None;
    for sibling in siblings {
        let update = StatusUpdate {
            id: sibling.id.clone(),
            from: AppointmentStatus::Pending,
            to: AppointmentStatus::Rejected,
            at: now,
        };
        match state.store.update_status(&update).await {
            Ok(true) => rejected += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(appointment_id = %sibling.id, error = %e, "failed to reject conflicting request");
                failed += 1;
                first_reason.get_or_insert_with(|| e.to_string());
            }
        }
    }

    if let Some(reason) = first_reason {
        return Err(AppError::ConflictBatchPartialFailure {
            approved_id: approved.id.clone(),
            failed,
            reason,
        });
    }

    if rejected > 0 {
        tracing::info!(appointment_id = %approved.id, rejected, "rejected conflicting requests");
    }
    Ok(rejected)
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub kept: Appointment,
    pub deleted: Vec<String>,
    /// Members that stopped being pending before they could be deleted.
    pub skipped: Vec<String>,
}

/// Keeps one request of the conflict on `slot` and deletes the rest. The
/// kept request stays Pending.
///
/// Only rows still pending at the moment of deletion are removed; anything
/// approved or rejected in the meantime is left alone and reported.
pub async fn resolve_manually(
    state: &AppState,
    slot: SlotKey,
    keep_id: &str,
) -> Result<Resolution, AppError> {
    let snapshot = state.store.snapshot().await?;
    let Some(conflict) = detect(&snapshot).into_iter().find(|c| c.slot == slot) else {
        return Err(AppError::GuardViolation(format!("no conflict at {slot}")));
    };
    if !conflict.contains(keep_id) {
        return Err(AppError::GuardViolation(format!(
            "appointment {keep_id} is not part of the conflict at {slot}"
        )));
    }

    let mut kept = None;
    let mut deleted = vec![];
    let mut skipped = vec![];
    for appt in conflict.appointments {
        if appt.id == keep_id {
            kept = Some(appt);
            continue;
        }
        if state
            .store
            .delete_appointment_if(&appt.id, AppointmentStatus::Pending)
            .await?
        {
            deleted.push(appt.id);
            continue;
        }
        match state.store.get_appointment(&appt.id).await? {
            // A previous attempt got this far.
            None => deleted.push(appt.id),
            Some(latest) => {
                tracing::info!(
                    appointment_id = %latest.id,
                    status = latest.status.as_str(),
                    "conflict member changed before deletion, left in place"
                );
                skipped.push(latest.id);
            }
        }
    }

    let kept = kept.ok_or_else(|| AppError::NotFound(format!("appointment {keep_id}")))?;
    tracing::info!(
        appointment_id = %kept.id,
        slot = %slot,
        deleted = deleted.len(),
        skipped = skipped.len(),
        "conflict resolved"
    );
    Ok(Resolution {
        kept,
        deleted,
        skipped,
    })
}
