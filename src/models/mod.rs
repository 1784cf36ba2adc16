pub mod appointment;
pub mod blocked_slot;
pub mod service;
pub mod slot;
pub mod stats;

pub use appointment::{
    Appointment, AppointmentStatus, BookedBy, BookingRequest, CustomerType, NewAppointment,
};
pub use blocked_slot::BlockedSlot;
pub use service::{Service, ServiceCatalog};
pub use slot::{SlotGrid, SlotKey, SlotStatus};
pub use stats::{DailyStats, MonthlyStats, OverallStats};
