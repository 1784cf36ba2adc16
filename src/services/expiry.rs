use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus};
use crate::services::booking::Operation;
use crate::state::AppState;
use crate::store::{AppointmentFilter, StatusUpdate};

/// A pending request expires once `grace` has passed since its slot began.
pub fn is_expired(appointment: &Appointment, now: NaiveDateTime, grace: Duration) -> bool {
    appointment.status == AppointmentStatus::Pending && now >= appointment.slot.instant() + grace
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: Vec<String>,
    /// Expired when listed but no longer pending when re-checked.
    pub skipped: usize,
    pub failed: usize,
}

/// Rejects every expired pending request.
///
/// Each candidate's status is re-read right before its write, and the write
/// itself only applies to a still-pending row, so a concurrent approval wins.
pub async fn sweep(state: &AppState) -> Result<SweepReport, AppError> {
    let now = state.clock.now();
    let grace = state.config.pending_grace;
    let pending = state
        .store
        .list_appointments(&AppointmentFilter::status(AppointmentStatus::Pending))
        .await?;

    let mut report = SweepReport {
        examined: pending.len(),
        ..Default::default()
    };

    for appt in pending.iter().filter(|a| is_expired(a, now, grace)) {
        match state.store.get_appointment(&appt.id).await {
            Ok(Some(latest)) if latest.status == AppointmentStatus::Pending => {}
            Ok(_) => {
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(appointment_id = %appt.id, error = %e, "failed to re-check expired request");
                report.failed += 1;
                continue;
            }
        }

        let update = StatusUpdate {
            id: appt.id.clone(),
            from: AppointmentStatus::Pending,
            to: Operation::Expire.target(),
            at: now,
        };
        match state.store.update_status(&update).await {
            Ok(true) => report.expired.push(appt.id.clone()),
            Ok(false) => report.skipped += 1,
            Err(e) => {
                tracing::warn!(appointment_id = %appt.id, error = %e, "failed to expire request");
                report.failed += 1;
            }
        }
    }

    if !report.expired.is_empty() {
        tracing::info!(count = report.expired.len(), "auto-declined expired pending appointments");
    }
    Ok(report)
}

/// Sweep for callers that must not fail because of it. Errors are logged.
pub async fn sweep_quietly(state: &AppState) {
    match sweep(state).await {
        Ok(report) if report.failed > 0 => {
            tracing::warn!(failed = report.failed, "expiry sweep left some requests for next time");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "expiry sweep failed"),
    }
}

/// Background task that sweeps once on start and then on every interval.
pub struct ExpiryEnforcer {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ExpiryEnforcer {
    pub fn start(state: Arc<AppState>) -> Self {
        let every = state
            .config
            .expiry_sweep_interval
            .max(StdDuration::from_millis(1));
        let (shutdown, mut stop) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_secs = every.as_secs(), "expiry enforcer started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => sweep_quietly(&state).await,
                    _ = &mut stop => break,
                }
            }

            tracing::info!("expiry enforcer stopped");
        });

        Self { shutdown, handle }
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "expiry enforcer task failed");
        }
    }
}
