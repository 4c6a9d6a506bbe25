use axum::Json;
use axum::extract::State;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use simpcity_shared::{MemberRecord, View};
use tracing::error;

use crate::db;
use crate::routes::error::ApiError;
use crate::state::AppState;

const LEADERBOARD_ERROR: &str = "Failed to fetch leaderboard data";

/// Entry shape of `GET /api/leaderboard`, kept for older consumers of the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub count: u64,
    #[serde(rename = "profilePic")]
    pub profile_pic: Option<String>,
    pub username: String,
    /// ISO-8601 with millisecond precision and a `Z` suffix.
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
}

impl From<MemberRecord> for LeaderboardEntry {
    fn from(record: MemberRecord) -> Self {
        Self {
            id: record.id.to_string(),
            user_id: record.user_id,
            count: record.count,
            profile_pic: record.profile_picture_url,
            username: record.username,
            updated_at: Some(record.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// Whole all-time leaderboard, count descending, unpaginated.
pub async fn get_leaderboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    state.observability.record_leaderboard_request();
    let Some(pool) = state.db.as_ref() else {
        error!("leaderboard requested without a database");
        return Err(ApiError::internal(LEADERBOARD_ERROR));
    };

    match db::fetch_ranked(pool, View::AllTime).await {
        Ok(rows) => {
            state.observability.record_rejected_rows(rows.rejected);
            Ok(Json(
                rows.records
                    .into_iter()
                    .map(LeaderboardEntry::from)
                    .collect(),
            ))
        }
        Err(e) => {
            state.observability.record_db_error();
            error!(error = %e, "Failed to fetch leaderboard data");
            Err(ApiError::internal(LEADERBOARD_ERROR))
        }
    }
}
