use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{Service, SlotKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub customer_name: String,
    /// Exactly ten digits, no formatting.
    pub customer_phone: String,
    #[serde(flatten)]
    pub slot: SlotKey,
    pub services: Vec<Service>,
    pub total_price: i64,
    pub status: AppointmentStatus,
    pub booked_by: BookedBy,
    pub customer_type: Option<CustomerType>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub no_show_at: Option<NaiveDateTime>,
}

impl Appointment {
    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AppointmentStatus::Pending),
            "approved" => Some(AppointmentStatus::Approved),
            "rejected" => Some(AppointmentStatus::Rejected),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "no_show" => Some(AppointmentStatus::NoShow),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookedBy {
    Customer,
    Operator,
}

impl BookedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookedBy::Customer => "customer",
            BookedBy::Operator => "operator",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "operator" => BookedBy::Operator,
            _ => BookedBy::Customer,
        }
    }
}

/// How an operator booking came in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CustomerType {
    Phone,
    Walkin,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Phone => "phone",
            CustomerType::Walkin => "walkin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "phone" => Some(CustomerType::Phone),
            "walkin" => Some(CustomerType::Walkin),
            _ => None,
        }
    }
}

/// A validated appointment ready to hand to the store, which assigns the id.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub customer_name: String,
    pub customer_phone: String,
    pub slot: SlotKey,
    pub services: Vec<Service>,
    pub total_price: i64,
    pub booked_by: BookedBy,
    pub customer_type: Option<CustomerType>,
    pub notes: Option<String>,
}

/// Raw booking input as it arrives from a customer or operator form.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(flatten)]
    pub slot: SlotKey,
    pub service_ids: Vec<String>,
    #[serde(default)]
    pub customer_type: Option<CustomerType>,
    #[serde(default)]
    pub notes: Option<String>,
}
