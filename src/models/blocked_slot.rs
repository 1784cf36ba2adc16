use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::SlotKey;

pub const DEFAULT_BLOCK_REASON: &str = "Unavailable";
pub const DEFAULT_BLOCKED_BY: &str = "admin";

/// Operator-imposed unavailability, independent of any appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedSlot {
    pub id: String,
    #[serde(flatten)]
    pub slot: SlotKey,
    pub reason: String,
    pub blocked_by: String,
    pub created_at: NaiveDateTime,
}
