use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Appointment, AppointmentStatus, BlockedSlot, BookedBy, CustomerType, NewAppointment, Service,
    SlotKey,
};
use crate::store::{AppointmentFilter, Snapshot, StatusUpdate};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const APPOINTMENT_COLUMNS: &str = "id, customer_name, customer_phone, date, time, services, total_price, status, \
     booked_by, customer_type, notes, created_at, updated_at, cancelled_at, no_show_at";

// ── Appointments ──

pub fn insert_appointment(
    conn: &Connection,
    id: &str,
    new: &NewAppointment,
    status: AppointmentStatus,
    at: &NaiveDateTime,
) -> anyhow::Result<()> {
    let services = serde_json::to_string(&new.services)?;

    conn.execute(
        "INSERT INTO appointments (id, customer_name, customer_phone, date, time, services, total_price, status, booked_by, customer_type, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            id,
            new.customer_name,
            new.customer_phone,
            format_date(&new.slot.date),
            new.slot.time.format(TIME_FORMAT).to_string(),
            services,
            new.total_price,
            status.as_str(),
            new.booked_by.as_str(),
            new.customer_type.map(|c| c.as_str()),
            new.notes,
            format_timestamp(at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let row = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id],
            |row| Ok(parse_appointment_row(row)),
        )
        .optional()?;

    row.transpose()
}

pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> anyhow::Result<Vec<Appointment>> {
    let mut clauses = vec![];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", params_vec.len()));
    }
    if let Some(date) = filter.date {
        params_vec.push(Box::new(format_date(&date)));
        clauses.push(format!("date = ?{}", params_vec.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments{where_clause} ORDER BY created_at DESC, id ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn update_status(conn: &Connection, update: &StatusUpdate) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET
           status = ?1,
           updated_at = ?2,
           cancelled_at = CASE WHEN ?1 = 'cancelled' THEN ?2 ELSE cancelled_at END,
           no_show_at = CASE WHEN ?1 = 'no_show' THEN ?2 ELSE no_show_at END
         WHERE id = ?3 AND status = ?4",
        params![
            update.to.as_str(),
            format_timestamp(&update.at),
            update.id,
            update.from.as_str(),
        ],
    )?;
    Ok(count > 0)
}

pub fn update_slot(
    conn: &Connection,
    id: &str,
    expected: AppointmentStatus,
    slot: &SlotKey,
    at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET date = ?1, time = ?2, updated_at = ?3 WHERE id = ?4 AND status = ?5",
        params![
            format_date(&slot.date),
            slot.time.format(TIME_FORMAT).to_string(),
            format_timestamp(at),
            id,
            expected.as_str(),
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_appointment(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn delete_appointment_if(
    conn: &Connection,
    id: &str,
    expected: AppointmentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM appointments WHERE id = ?1 AND status = ?2",
        params![id, expected.as_str()],
    )?;
    Ok(count > 0)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let id: String = row.get(0)?;
    let customer_name: String = row.get(1)?;
    let customer_phone: String = row.get(2)?;
    let date_str: String = row.get(3)?;
    let time_str: String = row.get(4)?;
    let services_json: String = row.get(5)?;
    let total_price: i64 = row.get(6)?;
    let status_str: String = row.get(7)?;
    let booked_by_str: String = row.get(8)?;
    let customer_type_str: Option<String> = row.get(9)?;
    let notes: Option<String> = row.get(10)?;
    let created_at_str: String = row.get(11)?;
    let updated_at_str: Option<String> = row.get(12)?;
    let cancelled_at_str: Option<String> = row.get(13)?;
    let no_show_at_str: Option<String> = row.get(14)?;

    let slot = SlotKey::parse(&date_str, &time_str)
        .with_context(|| format!("appointment {id} has an invalid slot"))?;
    let services: Vec<Service> = serde_json::from_str(&services_json)
        .with_context(|| format!("appointment {id} has unreadable services"))?;
    let status = AppointmentStatus::parse(&status_str)
        .with_context(|| format!("appointment {id} has unknown status {status_str}"))?;

    Ok(Appointment {
        id,
        customer_name,
        customer_phone,
        slot,
        services,
        total_price,
        status,
        booked_by: BookedBy::parse(&booked_by_str),
        customer_type: customer_type_str.as_deref().and_then(CustomerType::parse),
        notes,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: updated_at_str.as_deref().map(parse_timestamp).transpose()?,
        cancelled_at: cancelled_at_str.as_deref().map(parse_timestamp).transpose()?,
        no_show_at: no_show_at_str.as_deref().map(parse_timestamp).transpose()?,
    })
}

// ── Blocked Slots ──

pub fn list_blocked_slots(conn: &Connection) -> anyhow::Result<Vec<BlockedSlot>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, time, reason, blocked_by, created_at FROM blocked_slots ORDER BY date ASC, time ASC",
    )?;
    let rows = stmt.query_map([], |row| Ok(parse_blocked_row(row)))?;

    let mut blocked = vec![];
    for row in rows {
        blocked.push(row??);
    }
    Ok(blocked)
}

pub fn find_blocked_slot(conn: &Connection, slot: &SlotKey) -> anyhow::Result<Option<BlockedSlot>> {
    let row = conn
        .query_row(
            "SELECT id, date, time, reason, blocked_by, created_at FROM blocked_slots
             WHERE date = ?1 AND time = ?2 ORDER BY created_at ASC LIMIT 1",
            params![format_date(&slot.date), slot.time.format(TIME_FORMAT).to_string()],
            |row| Ok(parse_blocked_row(row)),
        )
        .optional()?;

    row.transpose()
}

pub fn insert_blocked_slot(conn: &Connection, blocked: &BlockedSlot) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO blocked_slots (id, date, time, reason, blocked_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            blocked.id,
            format_date(&blocked.slot.date),
            blocked.slot.time.format(TIME_FORMAT).to_string(),
            blocked.reason,
            blocked.blocked_by,
            format_timestamp(&blocked.created_at),
        ],
    )?;
    Ok(())
}

pub fn delete_blocked_slots(conn: &Connection, slot: &SlotKey) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM blocked_slots WHERE date = ?1 AND time = ?2",
        params![format_date(&slot.date), slot.time.format(TIME_FORMAT).to_string()],
    )?;
    Ok(count)
}

fn parse_blocked_row(row: &rusqlite::Row) -> anyhow::Result<BlockedSlot> {
    let id: String = row.get(0)?;
    let date_str: String = row.get(1)?;
    let time_str: String = row.get(2)?;
    let created_at_str: String = row.get(5)?;

    Ok(BlockedSlot {
        slot: SlotKey::parse(&date_str, &time_str)
            .with_context(|| format!("blocked slot {id} has an invalid slot"))?,
        id,
        reason: row.get(3)?,
        blocked_by: row.get(4)?,
        created_at: parse_timestamp(&created_at_str)?,
    })
}

// ── Snapshots ──

pub fn load_snapshot(conn: &Connection) -> anyhow::Result<Snapshot> {
    Ok(Snapshot {
        appointments: list_appointments(conn, &AppointmentFilter::default())?,
        blocked: list_blocked_slots(conn)?,
    })
}

fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid timestamp: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::ServiceCatalog;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn new_appointment(date: &str, time: &str) -> NewAppointment {
        let haircut = ServiceCatalog::default().get("haircut").unwrap().clone();
        NewAppointment {
            customer_name: "Alice".to_string(),
            customer_phone: "5551234567".to_string(),
            slot: SlotKey::parse(date, time).unwrap(),
            services: vec![haircut.clone(), haircut],
            total_price: 800,
            booked_by: BookedBy::Customer,
            customer_type: None,
            notes: None,
        }
    }

    #[test]
    fn test_insert_and_get_appointment() {
        let conn = db::init_db(":memory:").unwrap();
        let new = new_appointment("2024-05-10", "14:00");
        insert_appointment(&conn, "a1", &new, AppointmentStatus::Pending, &dt("2024-05-09 08:00"))
            .unwrap();

        let stored = get_appointment(&conn, "a1").unwrap().unwrap();
        assert_eq!(stored.slot, new.slot);
        assert_eq!(stored.services.len(), 2);
        assert_eq!(stored.total_price, 800);
        assert_eq!(stored.status, AppointmentStatus::Pending);
        assert_eq!(stored.created_at, dt("2024-05-09 08:00"));
        assert!(stored.updated_at.is_none());

        assert!(get_appointment(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_update_status_is_compare_and_set() {
        let conn = db::init_db(":memory:").unwrap();
        let new = new_appointment("2024-05-10", "14:00");
        insert_appointment(&conn, "a1", &new, AppointmentStatus::Approved, &dt("2024-05-09 08:00"))
            .unwrap();

        let stale = StatusUpdate {
            id: "a1".to_string(),
            from: AppointmentStatus::Pending,
            to: AppointmentStatus::Rejected,
            at: dt("2024-05-09 09:00"),
        };
        assert!(!update_status(&conn, &stale).unwrap());

        let cancel = StatusUpdate {
            id: "a1".to_string(),
            from: AppointmentStatus::Approved,
            to: AppointmentStatus::Cancelled,
            at: dt("2024-05-09 09:00"),
        };
        assert!(update_status(&conn, &cancel).unwrap());

        let stored = get_appointment(&conn, "a1").unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Cancelled);
        assert_eq!(stored.cancelled_at, Some(dt("2024-05-09 09:00")));
        assert_eq!(stored.updated_at, Some(dt("2024-05-09 09:00")));
        assert!(stored.no_show_at.is_none());
    }

    #[test]
    fn test_list_appointments_filters() {
        let conn = db::init_db(":memory:").unwrap();
        insert_appointment(
            &conn,
            "a1",
            &new_appointment("2024-05-10", "14:00"),
            AppointmentStatus::Pending,
            &dt("2024-05-09 08:00"),
        )
        .unwrap();
        insert_appointment(
            &conn,
            "a2",
            &new_appointment("2024-05-11", "14:00"),
            AppointmentStatus::Approved,
            &dt("2024-05-09 09:00"),
        )
        .unwrap();

        let all = list_appointments(&conn, &AppointmentFilter::default()).unwrap();
        assert_eq!(all.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), ["a2", "a1"]);

        let pending =
            list_appointments(&conn, &AppointmentFilter::status(AppointmentStatus::Pending))
                .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "a1");

        let by_date = list_appointments(
            &conn,
            &AppointmentFilter {
                status: None,
                date: NaiveDate::from_ymd_opt(2024, 5, 11),
            },
        )
        .unwrap();
        assert_eq!(by_date.len(), 1);
        assert_eq!(by_date[0].id, "a2");
    }

    #[test]
    fn test_blocked_slots() {
        let conn = db::init_db(":memory:").unwrap();
        let slot = SlotKey::parse("2024-05-10", "14:00").unwrap();
        assert!(find_blocked_slot(&conn, &slot).unwrap().is_none());

        insert_blocked_slot(
            &conn,
            &BlockedSlot {
                id: "b1".to_string(),
                slot,
                reason: "Lunch".to_string(),
                blocked_by: "admin".to_string(),
                created_at: dt("2024-05-09 08:00"),
            },
        )
        .unwrap();

        let found = find_blocked_slot(&conn, &slot).unwrap().unwrap();
        assert_eq!(found.reason, "Lunch");
        assert_eq!(list_blocked_slots(&conn).unwrap().len(), 1);

        assert_eq!(delete_blocked_slots(&conn, &slot).unwrap(), 1);
        assert!(list_blocked_slots(&conn).unwrap().is_empty());
    }
}
