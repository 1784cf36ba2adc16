use chrono::{Datelike, NaiveDate};

use crate::models::{Appointment, AppointmentStatus, DailyStats, MonthlyStats, OverallStats};
use crate::store::Snapshot;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

fn approved(snapshot: &Snapshot) -> impl Iterator<Item = &Appointment> {
    snapshot.with_status(AppointmentStatus::Approved)
}

fn in_month(appt: &Appointment, year: i32, month: u32) -> bool {
    appt.slot.date.year() == year && appt.slot.date.month() == month
}

/// Approved appointments on `date`.
pub fn daily(snapshot: &Snapshot, date: NaiveDate) -> DailyStats {
    approved(snapshot)
        .filter(|a| a.slot.date == date)
        .fold(
            DailyStats {
                date: date.format("%Y-%m-%d").to_string(),
                ..Default::default()
            },
            |mut stats, a| {
                stats.count += 1;
                stats.revenue += a.total_price;
                stats.service_count += a.service_count();
                stats
            },
        )
}

/// Approved appointments in the month, with no-shows counted separately and
/// kept out of revenue.
pub fn monthly(snapshot: &Snapshot, year: i32, month: u32) -> MonthlyStats {
    let (total_appointments, total_revenue) = approved(snapshot)
        .filter(|a| in_month(a, year, month))
        .fold((0, 0), |(count, revenue), a| (count + 1, revenue + a.total_price));

    let no_show_count = snapshot
        .with_status(AppointmentStatus::NoShow)
        .filter(|a| in_month(a, year, month))
        .count();

    MonthlyStats {
        year,
        month,
        month_name: month
            .checked_sub(1)
            .and_then(|i| MONTH_NAMES.get(i as usize))
            .copied()
            .unwrap_or_default()
            .to_string(),
        total_appointments,
        total_revenue,
        no_show_count,
    }
}

pub fn overall(snapshot: &Snapshot) -> OverallStats {
    let mut stats = OverallStats {
        total_appointments: snapshot.appointments.len(),
        ..Default::default()
    };
    for appt in &snapshot.appointments {
        match appt.status {
            AppointmentStatus::Pending => stats.pending += 1,
            AppointmentStatus::Approved => {
                stats.approved += 1;
                stats.total_revenue += appt.total_price;
            }
            AppointmentStatus::Rejected => stats.rejected += 1,
            AppointmentStatus::Cancelled => stats.cancelled += 1,
            AppointmentStatus::NoShow => stats.no_show += 1,
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    use crate::models::{BookedBy, ServiceCatalog, SlotKey};

    fn appointment(date: &str, status: AppointmentStatus, service_ids: &[&str]) -> Appointment {
        let catalog = ServiceCatalog::default();
        let services: Vec<_> = service_ids
            .iter()
            .map(|id| catalog.get(id).unwrap().clone())
            .collect();
        Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            customer_name: "Test".to_string(),
            customer_phone: "5550000000".to_string(),
            slot: SlotKey::parse(date, "14:00").unwrap(),
            total_price: services.iter().map(|s| s.price).sum(),
            services,
            status,
            booked_by: BookedBy::Customer,
            customer_type: None,
            notes: None,
            created_at: NaiveDateTime::parse_from_str("2024-05-01 09:00", "%Y-%m-%d %H:%M")
                .unwrap(),
            updated_at: None,
            cancelled_at: None,
            no_show_at: None,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_daily_counts_only_approved() {
        let snapshot = Snapshot {
            appointments: vec![
                appointment("2024-05-10", AppointmentStatus::Approved, &["haircut", "shaving"]),
                appointment("2024-05-10", AppointmentStatus::Approved, &["hair-wash"]),
                appointment("2024-05-10", AppointmentStatus::Pending, &["haircut"]),
                appointment("2024-05-10", AppointmentStatus::NoShow, &["haircut"]),
                appointment("2024-05-11", AppointmentStatus::Approved, &["haircut"]),
            ],
            blocked: vec![],
        };

        let stats = daily(&snapshot, date("2024-05-10"));
        assert_eq!(stats.count, 2);
        assert_eq!(stats.revenue, 650);
        assert_eq!(stats.service_count, 3);
        assert_eq!(stats.date, "2024-05-10");
    }

    #[test]
    fn test_monthly_separates_no_shows() {
        let snapshot = Snapshot {
            appointments: vec![
                appointment("2024-05-03", AppointmentStatus::Approved, &["haircut"]),
                appointment("2024-05-20", AppointmentStatus::NoShow, &["shaving", "facemask"]),
                appointment("2024-06-01", AppointmentStatus::Approved, &["haircut"]),
                appointment("2023-05-03", AppointmentStatus::Approved, &["haircut"]),
                appointment("2024-05-04", AppointmentStatus::Cancelled, &["haircut"]),
            ],
            blocked: vec![],
        };

        let stats = monthly(&snapshot, 2024, 5);
        assert_eq!(stats.total_revenue, 400);
        assert_eq!(stats.total_appointments, 1);
        assert_eq!(stats.no_show_count, 1);
        assert_eq!(stats.month_name, "May");
    }

    #[test]
    fn test_overall_counts_by_status() {
        let snapshot = Snapshot {
            appointments: vec![
                appointment("2024-05-03", AppointmentStatus::Approved, &["haircut"]),
                appointment("2024-05-03", AppointmentStatus::Pending, &["haircut"]),
                appointment("2024-05-03", AppointmentStatus::Rejected, &["haircut"]),
                appointment("2024-05-03", AppointmentStatus::Cancelled, &["haircut"]),
                appointment("2024-05-03", AppointmentStatus::NoShow, &["haircut"]),
            ],
            blocked: vec![],
        };

        let stats = overall(&snapshot);
        assert_eq!(stats.total_appointments, 5);
        assert_eq!(
            (stats.pending, stats.approved, stats.rejected, stats.cancelled, stats.no_show),
            (1, 1, 1, 1, 1)
        );
        assert_eq!(stats.total_revenue, 400);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::default();
        assert_eq!(daily(&snapshot, date("2024-05-10")).count, 0);
        let stats = monthly(&snapshot, 2024, 13);
        assert_eq!(stats.total_appointments, 0);
        assert_eq!(stats.month_name, "");
    }
}
