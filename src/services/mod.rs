pub mod analytics;
pub mod availability;
pub mod booking;
pub mod conflicts;
pub mod expiry;
pub mod live;

#[cfg(test)]
pub(crate) mod testing;
