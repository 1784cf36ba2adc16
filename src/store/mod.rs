//! The persistence collaborator the engine consumes.
//!
//! The engine never reads storage state it has not just fetched: every
//! write is a compare-and-set against the status the caller expects, so a
//! background sweep and an operator acting on the same appointment cannot
//! overwrite each other.

pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{Appointment, AppointmentStatus, BlockedSlot, NewAppointment, SlotKey};

pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("{failed} of {total} follow-up writes failed: {reason}")]
    PartialBatch {
        failed: usize,
        total: usize,
        reason: String,
    },
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Unavailable(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
}

impl AppointmentFilter {
    pub fn status(status: AppointmentStatus) -> Self {
        Self {
            status: Some(status),
            date: None,
        }
    }
}

/// Move appointment `id` from `from` to `to`. Applies only if the stored
/// status still equals `from`.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub id: String,
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
    pub at: NaiveDateTime,
}

/// The full current state of the store. Each one supersedes the last.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub appointments: Vec<Appointment>,
    pub blocked: Vec<BlockedSlot>,
}

impl Snapshot {
    pub fn with_status(&self, status: AppointmentStatus) -> impl Iterator<Item = &Appointment> {
        self.appointments.iter().filter(move |a| a.status == status)
    }
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>>;

    async fn get_appointment(&self, id: &str) -> StoreResult<Option<Appointment>>;

    /// Persists `new` with `status` preset and returns the assigned id.
    async fn create_appointment(
        &self,
        new: &NewAppointment,
        status: AppointmentStatus,
        at: NaiveDateTime,
    ) -> StoreResult<String>;

    /// Returns whether the row changed. Stamps `updated_at`, and
    /// `cancelled_at` / `no_show_at` when entering those states.
    async fn update_status(&self, update: &StatusUpdate) -> StoreResult<bool>;

    /// Applies a primary update followed by its follow-ups.
    ///
    /// If the first update does not apply nothing else is written and the
    /// result is `[false]`. This default writes one at a time; a failure in
    /// a follow-up does not stop the others and is reported as
    /// [`StoreError::PartialBatch`]. Backends with transactions override it.
    async fn update_status_batch(&self, updates: &[StatusUpdate]) -> StoreResult<Vec<bool>> {
        let Some((primary, rest)) = updates.split_first() else {
            return Ok(vec![]);
        };

        if !self.update_status(primary).await? {
            return Ok(vec![false]);
        }

        let mut applied = vec![true];
        let mut failed = 0;
        let mut first_reason = None;
        for update in rest {
            match self.update_status(update).await {
                Ok(changed) => applied.push(changed),
                Err(e) => {
                    tracing::warn!(appointment_id = %update.id, error = %e, "batch follow-up write failed");
                    failed += 1;
                    first_reason.get_or_insert_with(|| e.to_string());
                    applied.push(false);
                }
            }
        }

        match first_reason {
            Some(reason) => Err(StoreError::PartialBatch {
                failed,
                total: rest.len(),
                reason,
            }),
            None => Ok(applied),
        }
    }

    /// Moves the appointment to `slot` if its status is still `expected`.
    async fn update_slot(
        &self,
        id: &str,
        expected: AppointmentStatus,
        slot: SlotKey,
        at: NaiveDateTime,
    ) -> StoreResult<bool>;

    async fn delete_appointment(&self, id: &str) -> StoreResult<bool>;

    /// Deletes the appointment only if its status is still `expected`.
    async fn delete_appointment_if(
        &self,
        id: &str,
        expected: AppointmentStatus,
    ) -> StoreResult<bool>;

    async fn list_blocked_slots(&self) -> StoreResult<Vec<BlockedSlot>>;

    /// Blocking an already blocked slot returns the existing record.
    async fn block_slot(
        &self,
        slot: SlotKey,
        reason: &str,
        blocked_by: &str,
        at: NaiveDateTime,
    ) -> StoreResult<BlockedSlot>;

    /// Removes every block on `slot`, returning how many were removed.
    async fn unblock_slot(&self, slot: SlotKey) -> StoreResult<usize>;

    async fn snapshot(&self) -> StoreResult<Snapshot> {
        let appointments = self.list_appointments(&AppointmentFilter::default()).await?;
        let blocked = self.list_blocked_slots().await?;
        Ok(Snapshot {
            appointments,
            blocked,
        })
    }

    /// A fresh snapshot is pushed after every successful write. Dropping the
    /// receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>>;
}
