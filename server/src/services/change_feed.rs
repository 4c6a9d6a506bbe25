use chrono::{DateTime, Utc};
use simpcity_shared::{ChangeEvent, MemberRecord, View};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{CHANGE_FEED_BATCH_SIZE, change_feed_poll_interval};
use crate::db::{self, ChangeCursor};
use crate::state::AppState;

/// Per-view positions in the `(updated_at, id)` ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursors {
    all_time: ChangeCursor,
    current: ChangeCursor,
}

impl Cursors {
    fn slot(&mut self, view: View) -> &mut ChangeCursor {
        match view {
            View::AllTime => &mut self.all_time,
            View::Current => &mut self.current,
        }
    }
}

fn origin() -> ChangeCursor {
    (DateTime::<Utc>::UNIX_EPOCH, 0)
}

/// Cursors only move forward.
fn advance(cursor: ChangeCursor, last_seen: Option<ChangeCursor>) -> ChangeCursor {
    match last_seen {
        Some(seen) if seen > cursor => seen,
        _ => cursor,
    }
}

fn total_changed(previous: Option<i64>, latest: i64) -> bool {
    previous != Some(latest)
}

/// Broadcasts one upsert per record, in the order given.
fn publish_upserts(state: &AppState, view: View, records: Vec<MemberRecord>) -> usize {
    let mut published = 0;
    for record in records {
        if state
            .publish(|seq| ChangeEvent::Upsert { seq, view, record })
            .is_some()
        {
            published += 1;
        }
    }
    published
}

/// Starts at the newest existing row so a restart does not replay the table.
async fn initial_cursors(pool: &sqlx::PgPool) -> Cursors {
    let mut cursors = Cursors {
        all_time: origin(),
        current: origin(),
    };
    for view in View::ALL {
        match db::latest_change(pool, view).await {
            Ok(Some(latest)) => *cursors.slot(view) = latest,
            Ok(None) => {}
            Err(e) => {
                warn!(view = %view, error = %e, "failed to read change cursor; starting from origin");
            }
        }
    }
    cursors
}

/// Polls both member tables and the stats row, turning new rows into change events.
pub async fn run(state: AppState) {
    let Some(pool) = state.db.as_ref().cloned() else {
        warn!("change feed disabled: no database configured");
        return;
    };

    let poll_interval = change_feed_poll_interval();
    let mut cursors = initial_cursors(&pool).await;
    info!(poll_secs = poll_interval.as_secs(), "Change feed started");

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        poll_once(&state, &pool, &mut cursors).await;
    }
}

async fn poll_once(state: &AppState, pool: &sqlx::PgPool, cursors: &mut Cursors) {
    for view in View::ALL {
        poll_view(state, pool, view, cursors.slot(view)).await;
    }

    match db::fetch_total_count(pool).await {
        Ok(latest) => {
            let mut known = state.total_count.write().await;
            if total_changed(*known, latest) {
                *known = Some(latest);
                drop(known);
                state.publish(|seq| ChangeEvent::TotalCount { seq, value: latest });
                debug!(total_count = latest, "total count changed");
            }
        }
        Err(e) => {
            state.observability.record_db_error();
            warn!(error = %e, "change feed failed to fetch total count");
        }
    }
}

/// Drains every batch newer than `cursor`, publishing as it goes.
async fn poll_view(state: &AppState, pool: &sqlx::PgPool, view: View, cursor: &mut ChangeCursor) {
    loop {
        let batch = match db::fetch_changed_since(pool, view, *cursor, CHANGE_FEED_BATCH_SIZE).await
        {
            Ok(batch) => batch,
            Err(e) => {
                state.observability.record_db_error();
                warn!(view = %view, error = %e, "change feed query failed");
                return;
            }
        };

        state.observability.record_rejected_rows(batch.rejected);
        let full = batch.fetched as i64 >= CHANGE_FEED_BATCH_SIZE;
        let next = advance(*cursor, batch.last_seen);
        let published = publish_upserts(state, view, batch.records);
        if published > 0 {
            debug!(view = %view, published, "published member upserts");
        }

        if !full || next == *cursor {
            *cursor = next;
            return;
        }
        *cursor = next;
        tokio::task::yield_now().await;
    }
}
