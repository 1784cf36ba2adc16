use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::errors::AppError;
use crate::models::{DailyStats, MonthlyStats, OverallStats};
use crate::services::analytics;
use crate::services::conflicts::{self, ConflictSet};
use crate::state::AppState;
use crate::store::{AppointmentStore, Snapshot};

/// Views derived from one snapshot. Replaced wholesale on every change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overview {
    pub computed_at: Option<NaiveDateTime>,
    pub conflicts: Vec<ConflictSet>,
    pub today: DailyStats,
    pub month: MonthlyStats,
    pub overall: OverallStats,
}

pub fn compute(snapshot: &Snapshot, now: NaiveDateTime) -> Overview {
    let today = now.date();
    Overview {
        computed_at: Some(now),
        conflicts: conflicts::detect(snapshot),
        today: analytics::daily(snapshot, today),
        month: analytics::monthly(snapshot, today.year(), today.month()),
        overall: analytics::overall(snapshot),
    }
}

/// The published overview, or a fresh one when it was computed on an
/// earlier day (or never), since `today` and `month` follow the clock.
pub async fn current(state: &AppState) -> Result<Overview, AppError> {
    let published = state.overview.borrow().clone();
    let now = state.clock.now();
    if published.computed_at.is_some_and(|at| at.date() == now.date()) {
        return Ok(Overview::clone(&published));
    }

    let snapshot = state.store.snapshot().await?;
    Ok(compute(&snapshot, now))
}

/// Subscribes to store snapshots and republishes the derived overview.
pub struct LiveOverview {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl LiveOverview {
    pub fn start(
        store: Arc<dyn AppointmentStore>,
        clock: Arc<dyn Clock>,
        publish: watch::Sender<Arc<Overview>>,
    ) -> Self {
        let (shutdown, mut stop) = oneshot::channel();
        // Subscribe before the first read so no change falls in between.
        let mut snapshots = store.subscribe();

        let handle = tokio::spawn(async move {
            refresh(store.as_ref(), clock.as_ref(), &publish).await;

            loop {
                tokio::select! {
                    received = snapshots.recv() => match received {
                        Ok(snapshot) => {
                            let _ = publish.send(Arc::new(compute(&snapshot, clock.now())));
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "overview fell behind, reloading");
                            refresh(store.as_ref(), clock.as_ref(), &publish).await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = &mut stop => break,
                }
            }

            tracing::debug!("live overview stopped");
        });

        Self { shutdown, handle }
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "live overview task failed");
        }
    }
}

async fn refresh(
    store: &dyn AppointmentStore,
    clock: &dyn Clock,
    publish: &watch::Sender<Arc<Overview>>,
) {
    match store.snapshot().await {
        Ok(snapshot) => {
            let _ = publish.send(Arc::new(compute(&snapshot, clock.now())));
        }
        Err(e) => tracing::error!(error = %e, "failed to load snapshot for overview"),
    }
}
