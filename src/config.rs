use std::env;
use std::time::Duration as StdDuration;

use anyhow::Context;
use chrono::{Duration, FixedOffset};

use crate::models::{ServiceCatalog, SlotGrid};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// How long past its start a pending request may wait for an answer.
    pub pending_grace: Duration,
    /// How long past its start an approved appointment must be before it
    /// can be marked as a no-show.
    pub no_show_grace: Duration,
    pub expiry_sweep_interval: StdDuration,
    pub sweep_before_availability: bool,
    pub utc_offset: Option<FixedOffset>,
    pub grid: SlotGrid,
    pub catalog: ServiceCatalog,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let utc_offset = match env::var("SHOP_UTC_OFFSET_MINUTES") {
            Ok(raw) => {
                let minutes: i32 = raw
                    .parse()
                    .with_context(|| format!("invalid SHOP_UTC_OFFSET_MINUTES: {raw}"))?;
                Some(
                    FixedOffset::east_opt(minutes * 60)
                        .with_context(|| format!("SHOP_UTC_OFFSET_MINUTES out of range: {raw}"))?,
                )
            }
            Err(_) => None,
        };

        let window_days = parse_or("BOOKING_WINDOW_DAYS", 7u32);
        let grid = match env::var("SLOT_TIMES") {
            Ok(raw) => {
                let labels: Vec<&str> = raw.split(',').collect();
                SlotGrid::from_labels(&labels, window_days).context("invalid SLOT_TIMES")?
            }
            Err(_) => SlotGrid::from_labels(crate::models::slot::DEFAULT_TIME_LABELS, window_days)
                .context("invalid BOOKING_WINDOW_DAYS")?,
        };

        let catalog = match env::var("SERVICE_CATALOG") {
            Ok(raw) => ServiceCatalog::from_json(&raw).context("invalid SERVICE_CATALOG")?,
            Err(_) => ServiceCatalog::default(),
        };

        Ok(Self {
            port: parse_or("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "chairbook.db".to_string()),
            pending_grace: Duration::minutes(parse_or("PENDING_GRACE_MINUTES", 15)),
            no_show_grace: Duration::minutes(parse_or("NO_SHOW_GRACE_MINUTES", 30)),
            expiry_sweep_interval: StdDuration::from_secs(parse_or(
                "EXPIRY_SWEEP_INTERVAL_SECS",
                300,
            )),
            sweep_before_availability: parse_or("SWEEP_BEFORE_AVAILABILITY", true),
            utc_offset,
            grid,
            catalog,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "chairbook.db".to_string(),
            pending_grace: Duration::minutes(15),
            no_show_grace: Duration::minutes(30),
            expiry_sweep_interval: StdDuration::from_secs(300),
            sweep_before_availability: true,
            utc_offset: None,
            grid: SlotGrid::default(),
            catalog: ServiceCatalog::default(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
