use std::path::Path;

use chrono::{DateTime, Utc};
use simpcity_shared::{MemberPage, MemberRecord, RawMemberRow, View};
use tracing::warn;

use crate::config::TOTAL_COUNT_KEY;

const WORKSPACE_MIGRATIONS_DIR: &str = "server/migrations";
const CRATE_MIGRATIONS_DIR: &str = "./migrations";

const MEMBER_COLUMNS: &str = "id, userid, username, profilepic, count, updated_at";

type MemberRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    i64,
    DateTime<Utc>,
);

/// Position in a table's `(updated_at, id)` ordering.
pub type ChangeCursor = (DateTime<Utc>, i64);

#[derive(Debug, Default)]
pub struct ValidatedRows {
    pub records: Vec<MemberRecord>,
    pub rejected: u64,
    /// Rows returned by the query, valid or not.
    pub fetched: usize,
    /// `(updated_at, id)` of the last fetched row, including rejected ones.
    pub last_seen: Option<ChangeCursor>,
}

impl ValidatedRows {
    /// Page body for clients. Carries the raw row count so dropped rows do not end pagination.
    pub fn into_page(self) -> MemberPage {
        MemberPage {
            records: self.records,
            fetched: u32::try_from(self.fetched).unwrap_or(u32::MAX),
        }
    }
}

fn migrations_path() -> &'static Path {
    let workspace_path = Path::new(WORKSPACE_MIGRATIONS_DIR);
    if workspace_path.exists() {
        return workspace_path;
    }
    Path::new(CRATE_MIGRATIONS_DIR)
}

pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::MigrateError> {
    let migrator = sqlx::Migrator::new(migrations_path()).await?;
    migrator.run(pool).await
}

fn validate_rows(view: View, rows: Vec<MemberRow>) -> ValidatedRows {
    let mut validated = ValidatedRows {
        records: Vec::with_capacity(rows.len()),
        rejected: 0,
        fetched: rows.len(),
        last_seen: None,
    };

    for (id, userid, username, profilepic, count, updated_at) in rows {
        validated.last_seen = Some((updated_at, id));
        let raw = RawMemberRow {
            id,
            userid,
            username,
            profilepic,
            count,
            updated_at,
        };
        match MemberRecord::try_from(raw) {
            Ok(record) => validated.records.push(record),
            Err(e) => {
                validated.rejected += 1;
                warn!(view = %view, error = %e, "skipping invalid member row");
            }
        }
    }

    validated
}

/// One page ordered by `count DESC, id ASC`.
pub async fn fetch_page(
    pool: &sqlx::PgPool,
    view: View,
    offset: u32,
    limit: u32,
) -> Result<ValidatedRows, sqlx::Error> {
    let sql = format!(
        "SELECT {MEMBER_COLUMNS} FROM {} ORDER BY count DESC, id ASC LIMIT $1 OFFSET $2",
        view.table()
    );
    let rows: Vec<MemberRow> = sqlx::query_as(&sql)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(pool)
        .await?;
    Ok(validate_rows(view, rows))
}

/// Every row of `view`, same ordering as [`fetch_page`].
pub async fn fetch_ranked(pool: &sqlx::PgPool, view: View) -> Result<ValidatedRows, sqlx::Error> {
    let sql = format!(
        "SELECT {MEMBER_COLUMNS} FROM {} ORDER BY count DESC, id ASC",
        view.table()
    );
    let rows: Vec<MemberRow> = sqlx::query_as(&sql).fetch_all(pool).await?;
    Ok(validate_rows(view, rows))
}

/// `stats.total_count`, or 0 when the row has not been written yet.
pub async fn fetch_total_count(pool: &sqlx::PgPool) -> Result<i64, sqlx::Error> {
    let value: Option<i64> = sqlx::query_scalar("SELECT value FROM stats WHERE key = $1")
        .bind(TOTAL_COUNT_KEY)
        .fetch_optional(pool)
        .await?;
    Ok(value.unwrap_or(0))
}

pub async fn latest_change(
    pool: &sqlx::PgPool,
    view: View,
) -> Result<Option<ChangeCursor>, sqlx::Error> {
    let sql = format!(
        "SELECT updated_at, id FROM {} ORDER BY updated_at DESC, id DESC LIMIT 1",
        view.table()
    );
    sqlx::query_as(&sql).fetch_optional(pool).await
}

/// Rows strictly after `cursor` in `(updated_at, id)` order, oldest first.
pub async fn fetch_changed_since(
    pool: &sqlx::PgPool,
    view: View,
    cursor: ChangeCursor,
    limit: i64,
) -> Result<ValidatedRows, sqlx::Error> {
    let sql = format!(
        "SELECT {MEMBER_COLUMNS} FROM {} \
         WHERE (updated_at, id) > ($1, $2) \
         ORDER BY updated_at ASC, id ASC \
         LIMIT $3",
        view.table()
    );
    let rows: Vec<MemberRow> = sqlx::query_as(&sql)
        .bind(cursor.0)
        .bind(cursor.1)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(validate_rows(view, rows))
}
