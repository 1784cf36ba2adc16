use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::clock::ManualClock;
use crate::config::AppConfig;
use crate::models::{BookingRequest, SlotKey};
use crate::state::AppState;
use crate::store::SqliteStore;

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

pub fn test_state(now: NaiveDateTime) -> (Arc<AppState>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    let store = Arc::new(SqliteStore::open(":memory:").unwrap());
    let (state, _) = AppState::new(store, clock.clone(), AppConfig::default());
    (state, clock)
}

pub fn request(date: &str, time: &str, service_ids: &[&str]) -> BookingRequest {
    BookingRequest {
        customer_name: "Alice".to_string(),
        customer_phone: "555-123-4567".to_string(),
        slot: SlotKey::parse(date, time).unwrap(),
        service_ids: service_ids.iter().map(|s| s.to_string()).collect(),
        customer_type: None,
        notes: None,
    }
}
