use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use tokio_stream::wrappers::{IntervalStream, WatchStream};
use tokio_stream::StreamExt;

use crate::state::AppState;

// GET /api/admin/events (SSE stream of the live overview)
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    // WatchStream yields the current overview first, then every replacement.
    let live_stream = WatchStream::new(state.overview.clone()).map(|overview| {
        let data = serde_json::to_string(overview.as_ref()).unwrap_or_default();
        Ok::<_, Infallible>(Event::default().data(data).event("overview"))
    });

    let keepalive_stream = StreamExt::map(
        IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Sse::new(StreamExt::merge(live_stream, keepalive_stream))
}
