use std::fmt::Write as _;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let observability = state.observability.snapshot();
    let total_count = *state.total_count.read().await;
    Json(serde_json::json!({
        "status": "ok",
        "database_available": state.db.is_some(),
        "sse_subscribers": state.event_tx.receiver_count(),
        "last_seq": state.current_seq(),
        "total_count": total_count,
        "observability": {
            "page_requests_total": observability.page_requests_total,
            "leaderboard_requests_total": observability.leaderboard_requests_total,
            "bootstrap_requests_total": observability.bootstrap_requests_total,
            "db_errors_total": observability.db_errors_total,
            "rejected_rows_total": observability.rejected_rows_total,
            "change_events_total": observability.change_events_total,
            "sse_lagged_total": observability.sse_lagged_total,
        },
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = render_prometheus_metrics(
        state.db.is_some(),
        state.event_tx.receiver_count(),
        state.observability.snapshot(),
    );

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn write_metric(body: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    let _ = writeln!(body, "# HELP {name} {help}");
    let _ = writeln!(body, "# TYPE {name} {kind}");
    let _ = writeln!(body, "{name} {value}");
}

fn render_prometheus_metrics(
    database_available: bool,
    sse_subscribers: usize,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    write_metric(
        &mut body,
        "simpcity_database_available",
        "gauge",
        "Whether a database pool is configured (1 or 0).",
        u64::from(database_available),
    );
    write_metric(
        &mut body,
        "simpcity_sse_subscribers",
        "gauge",
        "Currently connected change-feed subscribers.",
        sse_subscribers as u64,
    );
    write_metric(
        &mut body,
        "simpcity_page_requests_total",
        "counter",
        "Total member page requests.",
        observability.page_requests_total,
    );
    write_metric(
        &mut body,
        "simpcity_leaderboard_requests_total",
        "counter",
        "Total unpaginated leaderboard requests.",
        observability.leaderboard_requests_total,
    );
    write_metric(
        &mut body,
        "simpcity_bootstrap_requests_total",
        "counter",
        "Total bootstrap requests.",
        observability.bootstrap_requests_total,
    );
    write_metric(
        &mut body,
        "simpcity_db_errors_total",
        "counter",
        "Total failed database queries.",
        observability.db_errors_total,
    );
    write_metric(
        &mut body,
        "simpcity_rejected_rows_total",
        "counter",
        "Total member rows skipped by validation.",
        observability.rejected_rows_total,
    );
    write_metric(
        &mut body,
        "simpcity_change_events_total",
        "counter",
        "Total change-feed events broadcast.",
        observability.change_events_total,
    );
    write_metric(
        &mut body,
        "simpcity_sse_lagged_total",
        "counter",
        "Total times an SSE subscriber fell behind and was told to resync.",
        observability.sse_lagged_total,
    );
    body
}
