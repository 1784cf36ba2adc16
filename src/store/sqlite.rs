use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::db::queries;
use crate::models::{Appointment, AppointmentStatus, BlockedSlot, NewAppointment, SlotKey};
use crate::store::{
    AppointmentFilter, AppointmentStore, Snapshot, StatusUpdate, StoreError, StoreResult,
};

pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
    snapshots: broadcast::Sender<Arc<Snapshot>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        let (snapshots, _) = broadcast::channel(64);
        Self {
            db: Arc::new(Mutex::new(conn)),
            snapshots,
        }
    }

    pub fn open(path: &str) -> anyhow::Result<Self> {
        Ok(Self::new(crate::db::init_db(path)?))
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".to_string()))
    }

    /// Pushes the post-write state to subscribers. Runs under the write's
    /// lock so snapshots are delivered in write order.
    fn publish(&self, conn: &Connection) {
        if self.snapshots.receiver_count() == 0 {
            return;
        }
        match queries::load_snapshot(conn) {
            Ok(snapshot) => {
                let _ = self.snapshots.send(Arc::new(snapshot));
            }
            Err(e) => tracing::error!(error = %e, "failed to load snapshot for subscribers"),
        }
    }
}

#[async_trait]
impl AppointmentStore for SqliteStore {
    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let conn = self.conn()?;
        Ok(queries::list_appointments(&conn, filter)?)
    }

    async fn get_appointment(&self, id: &str) -> StoreResult<Option<Appointment>> {
        let conn = self.conn()?;
        Ok(queries::get_appointment(&conn, id)?)
    }

    async fn create_appointment(
        &self,
        new: &NewAppointment,
        status: AppointmentStatus,
        at: NaiveDateTime,
    ) -> StoreResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.conn()?;
        queries::insert_appointment(&conn, &id, new, status, &at)?;
        self.publish(&conn);
        Ok(id)
    }

    async fn update_status(&self, update: &StatusUpdate) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = queries::update_status(&conn, update)?;
        if changed {
            self.publish(&conn);
        }
        Ok(changed)
    }

    async fn update_status_batch(&self, updates: &[StatusUpdate]) -> StoreResult<Vec<bool>> {
        let Some((primary, rest)) = updates.split_first() else {
            return Ok(vec![]);
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if !queries::update_status(&tx, primary)? {
            // Dropping the transaction rolls it back; nothing was written.
            return Ok(vec![false]);
        }

        let mut applied = vec![true];
        for update in rest {
            applied.push(queries::update_status(&tx, update)?);
        }
        tx.commit()?;

        self.publish(&conn);
        Ok(applied)
    }

    async fn update_slot(
        &self,
        id: &str,
        expected: AppointmentStatus,
        slot: SlotKey,
        at: NaiveDateTime,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = queries::update_slot(&conn, id, expected, &slot, &at)?;
        if changed {
            self.publish(&conn);
        }
        Ok(changed)
    }

    async fn delete_appointment(&self, id: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let deleted = queries::delete_appointment(&conn, id)?;
        if deleted {
            self.publish(&conn);
        }
        Ok(deleted)
    }

    async fn delete_appointment_if(
        &self,
        id: &str,
        expected: AppointmentStatus,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;
        let deleted = queries::delete_appointment_if(&conn, id, expected)?;
        if deleted {
            self.publish(&conn);
        }
        Ok(deleted)
    }

    async fn list_blocked_slots(&self) -> StoreResult<Vec<BlockedSlot>> {
        let conn = self.conn()?;
        Ok(queries::list_blocked_slots(&conn)?)
    }

    async fn block_slot(
        &self,
        slot: SlotKey,
        reason: &str,
        blocked_by: &str,
        at: NaiveDateTime,
    ) -> StoreResult<BlockedSlot> {
        let conn = self.conn()?;
        if let Some(existing) = queries::find_blocked_slot(&conn, &slot)? {
            return Ok(existing);
        }

        let blocked = BlockedSlot {
            id: uuid::Uuid::new_v4().to_string(),
            slot,
            reason: reason.to_string(),
            blocked_by: blocked_by.to_string(),
            created_at: at,
        };
        queries::insert_blocked_slot(&conn, &blocked)?;
        self.publish(&conn);
        Ok(blocked)
    }

    async fn unblock_slot(&self, slot: SlotKey) -> StoreResult<usize> {
        let conn = self.conn()?;
        let removed = queries::delete_blocked_slots(&conn, &slot)?;
        if removed > 0 {
            self.publish(&conn);
        }
        Ok(removed)
    }

    async fn snapshot(&self) -> StoreResult<Snapshot> {
        let conn = self.conn()?;
        Ok(queries::load_snapshot(&conn)?)
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.snapshots.subscribe()
    }
}
