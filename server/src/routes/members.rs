use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use simpcity_shared::{Bootstrap, MemberPage, PAGE_SIZE, TotalCount, View};
use tracing::{error, warn};

use crate::config::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::db;
use crate::routes::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    fn resolve(&self) -> (u32, u32) {
        let offset = self.offset.unwrap_or(0);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        (offset, limit)
    }
}

fn parse_view(raw: &str) -> Result<View, ApiError> {
    raw.parse::<View>()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

pub async fn get_page(
    State(state): State<AppState>,
    Path(view): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<MemberPage>, ApiError> {
    state.observability.record_page_request();
    let view = parse_view(&view)?;
    let (offset, limit) = query.resolve();

    let Some(pool) = state.db.as_ref() else {
        return Err(ApiError::internal("member data is unavailable"));
    };

    match db::fetch_page(pool, view, offset, limit).await {
        Ok(page) => {
            state.observability.record_rejected_rows(page.rejected);
            Ok(Json(page.into_page()))
        }
        Err(e) => {
            state.observability.record_db_error();
            error!(view = %view, offset, limit, error = %e, "failed to fetch member page");
            Err(ApiError::internal(format!("Failed to fetch {view} members")))
        }
    }
}

pub async fn get_total_count(State(state): State<AppState>) -> Result<Json<TotalCount>, ApiError> {
    let Some(pool) = state.db.as_ref() else {
        return Err(ApiError::internal("stats are unavailable"));
    };

    match db::fetch_total_count(pool).await {
        Ok(value) => Ok(Json(TotalCount { value })),
        Err(e) => {
            state.observability.record_db_error();
            error!(error = %e, "failed to fetch total count");
            Err(ApiError::internal("Failed to fetch total count"))
        }
    }
}

/// First page of both views plus the total count. Each part degrades to empty on error.
pub async fn get_bootstrap(State(state): State<AppState>) -> Json<Bootstrap> {
    state.observability.record_bootstrap_request();
    let Some(pool) = state.db.as_ref() else {
        warn!("bootstrap requested without a database; returning empty data");
        return Json(Bootstrap::default());
    };

    let (all_time, current, total_count) = tokio::join!(
        db::fetch_page(pool, View::AllTime, 0, PAGE_SIZE),
        db::fetch_page(pool, View::Current, 0, PAGE_SIZE),
        db::fetch_total_count(pool),
    );

    let first_page = |view: View, result: Result<db::ValidatedRows, sqlx::Error>| match result
    {
        Ok(page) => {
            state.observability.record_rejected_rows(page.rejected);
            page.into_page()
        }
        Err(e) => {
            state.observability.record_db_error();
            error!(view = %view, error = %e, "failed to fetch bootstrap page");
            MemberPage::default()
        }
    };
    let all_time = first_page(View::AllTime, all_time);
    let current = first_page(View::Current, current);

    let total_count = total_count.unwrap_or_else(|e| {
        state.observability.record_db_error();
        error!(error = %e, "failed to fetch bootstrap total count");
        0
    });

    Json(Bootstrap {
        all_time,
        current,
        total_count,
    })
}
