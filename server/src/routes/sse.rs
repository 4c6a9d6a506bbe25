use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use bytes::Bytes;
use futures::stream::Stream;
use serde::Deserialize;
use simpcity_shared::{ChangeEvent, View};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::config::SSE_KEEPALIVE_SECS;
use crate::routes::error::ApiError;
use crate::state::{AppState, PreSerializedEvent};

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub view: Option<String>,
}

/// Upserts for rows outside the requested view are skipped; count and resync always pass.
fn wanted(filter: Option<View>, event: &PreSerializedEvent) -> bool {
    match (filter, event.view) {
        (Some(filter), Some(view)) => filter == view,
        _ => true,
    }
}

fn to_sse(event: &PreSerializedEvent) -> Option<Event> {
    let Some(payload) = event_payload(event.json.as_ref()) else {
        warn!(
            seq = event.seq,
            event = event.name,
            "event payload is not valid utf-8; dropping SSE event"
        );
        return None;
    };
    Some(
        Event::default()
            .id(event.seq.to_string())
            .event(event.name)
            .data(payload),
    )
}

pub async fn change_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let filter = query
        .view
        .as_deref()
        .map(str::parse::<View>)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    // Subscribe before reading the count so nothing published in between is lost.
    let rx = state.event_tx.subscribe();

    let stream = async_stream::stream! {
        let known_total = *state.total_count.read().await;
        if let Some(value) = known_total {
            let seq = state.current_seq();
            if let Some(event) = PreSerializedEvent::from_change(&ChangeEvent::TotalCount { seq, value })
                .as_ref()
                .and_then(to_sse)
            {
                yield Ok(event);
            }
        }

        let mut stream = BroadcastStream::new(rx);
        while let Some(result) = stream.next().await {
            match result {
                Ok(event) => {
                    if !wanted(filter, &event) {
                        continue;
                    }
                    if let Some(event) = to_sse(&event) {
                        yield Ok(event);
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(
                        skipped_events = skipped,
                        "SSE client lagged behind broadcast buffer; asking it to resync"
                    );
                    state.observability.record_sse_lagged();
                    let seq = state.current_seq();
                    if let Some(event) = PreSerializedEvent::from_change(&ChangeEvent::Resync { seq })
                        .as_ref()
                        .and_then(to_sse)
                    {
                        yield Ok(event);
                    }
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keep-alive"),
    ))
}

fn event_payload(bytes: &Bytes) -> Option<&str> {
    std::str::from_utf8(bytes.as_ref()).ok()
}
