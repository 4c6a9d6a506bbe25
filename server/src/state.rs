use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use simpcity_shared::{ChangeEvent, View};
use sqlx::PgPool;
use tokio::sync::{RwLock, broadcast};
use tracing::warn;

use crate::config::sse_broadcast_buffer;

/// Change event serialized once by the change feed and shared by every SSE client.
#[derive(Debug, Clone)]
pub struct PreSerializedEvent {
    pub seq: u64,
    pub name: &'static str,
    /// Set for row upserts so subscribers can filter by view.
    pub view: Option<View>,
    pub json: Arc<Bytes>,
}

impl PreSerializedEvent {
    pub fn from_change(event: &ChangeEvent) -> Option<Self> {
        match serde_json::to_vec(event) {
            Ok(json) => Some(Self {
                seq: event.seq(),
                name: event.event_name(),
                view: event.view(),
                json: Arc::new(Bytes::from(json)),
            }),
            Err(e) => {
                warn!(error = %e, event = event.event_name(), "failed to serialize change event");
                None
            }
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub next_seq: Arc<AtomicU64>,
    pub event_tx: broadcast::Sender<PreSerializedEvent>,
    /// Last total count observed by the change feed.
    pub total_count: Arc<RwLock<Option<i64>>>,
    /// None when running without a database (tests).
    pub db: Option<PgPool>,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    page_requests_total: AtomicU64,
    leaderboard_requests_total: AtomicU64,
    bootstrap_requests_total: AtomicU64,
    db_errors_total: AtomicU64,
    rejected_rows_total: AtomicU64,
    change_events_total: AtomicU64,
    sse_lagged_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ObservabilitySnapshot {
    pub page_requests_total: u64,
    pub leaderboard_requests_total: u64,
    pub bootstrap_requests_total: u64,
    pub db_errors_total: u64,
    pub rejected_rows_total: u64,
    pub change_events_total: u64,
    pub sse_lagged_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            page_requests_total: self.page_requests_total.load(Ordering::Relaxed),
            leaderboard_requests_total: self.leaderboard_requests_total.load(Ordering::Relaxed),
            bootstrap_requests_total: self.bootstrap_requests_total.load(Ordering::Relaxed),
            db_errors_total: self.db_errors_total.load(Ordering::Relaxed),
            rejected_rows_total: self.rejected_rows_total.load(Ordering::Relaxed),
            change_events_total: self.change_events_total.load(Ordering::Relaxed),
            sse_lagged_total: self.sse_lagged_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_page_request(&self) {
        self.page_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_leaderboard_request(&self) {
        self.leaderboard_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bootstrap_request(&self) {
        self.bootstrap_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_db_error(&self) {
        self.db_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_rows(&self, count: u64) {
        if count > 0 {
            self.rejected_rows_total.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_change_events(&self, count: u64) {
        self.change_events_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_sse_lagged(&self) {
        self.sse_lagged_total.fetch_add(1, Ordering::Relaxed);
    }
}

impl AppState {
    pub fn new(db: Option<PgPool>) -> Self {
        let (event_tx, _) = broadcast::channel(sse_broadcast_buffer());
        Self {
            next_seq: Arc::new(AtomicU64::new(0)),
            event_tx,
            total_count: Arc::new(RwLock::new(None)),
            db,
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }

    pub fn current_seq(&self) -> u64 {
        self.next_seq.load(Ordering::Relaxed)
    }

    /// Assigns the next sequence number to `build`'s event and broadcasts it.
    /// Having no subscribers is not an error.
    pub fn publish(&self, build: impl FnOnce(u64) -> ChangeEvent) -> Option<u64> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let event = PreSerializedEvent::from_change(&build(seq))?;
        let _ = self.event_tx.send(event);
        self.observability.record_change_events(1);
        Some(seq)
    }
}
