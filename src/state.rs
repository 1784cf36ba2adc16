use std::sync::Arc;

use tokio::sync::watch;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::services::live::Overview;
use crate::store::AppointmentStore;

pub struct AppState {
    pub store: Arc<dyn AppointmentStore>,
    pub clock: Arc<dyn Clock>,
    pub config: AppConfig,
    /// Latest overview published by the live consumer.
    pub overview: watch::Receiver<Arc<Overview>>,
}

impl AppState {
    /// Returns the state and the sender the live consumer publishes on.
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        clock: Arc<dyn Clock>,
        config: AppConfig,
    ) -> (Arc<Self>, watch::Sender<Arc<Overview>>) {
        let (tx, overview) = watch::channel(Arc::new(Overview::default()));
        let state = Arc::new(Self {
            store,
            clock,
            config,
            overview,
        });
        (state, tx)
    }
}
