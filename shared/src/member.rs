use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Username the ingest side writes when it could not resolve a profile.
pub const UNKNOWN_USERNAME: &str = "unknown";
pub const PLACEHOLDER_AVATAR: &str = "/placeholder.svg";
const INSTAGRAM_PROFILE_BASE: &str = "https://www.instagram.com/";

/// One of the two independently paginated leaderboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    /// Everyone who has ever posted in the group.
    AllTime,
    /// Members currently in the group chat.
    Current,
}

impl View {
    pub const ALL: [View; 2] = [View::AllTime, View::Current];

    pub const fn as_str(self) -> &'static str {
        match self {
            View::AllTime => "all-time",
            View::Current => "current",
        }
    }

    /// Backing table. Only ever interpolated from this closed set.
    pub const fn table(self) -> &'static str {
        match self {
            View::AllTime => "leaderboard",
            View::Current => "current_members",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown view {0:?}")]
pub struct UnknownView(pub String);

impl FromStr for View {
    type Err = UnknownView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all-time" | "all_time" | "leaderboard" => Ok(View::AllTime),
            "current" | "current-members" | "current_members" => Ok(View::Current),
            other => Err(UnknownView(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
    pub count: u64,
    pub updated_at: DateTime<Utc>,
}

impl MemberRecord {
    pub fn is_displayable(&self) -> bool {
        self.username != UNKNOWN_USERNAME
    }

    pub fn avatar_url(&self) -> &str {
        self.profile_picture_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(PLACEHOLDER_AVATAR)
    }

    pub fn profile_url(&self) -> String {
        format!("{INSTAGRAM_PROFILE_BASE}{}", self.username)
    }
}

/// Row shape as stored in the `leaderboard` / `current_members` tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMemberRow {
    pub id: i64,
    pub userid: String,
    pub username: Option<String>,
    pub profilepic: Option<String>,
    pub count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("row {id} has an empty user id")]
    EmptyUserId { id: i64 },
    #[error("row {id} ({user_id}) has negative count {count}")]
    NegativeCount { id: i64, user_id: String, count: i64 },
}

impl TryFrom<RawMemberRow> for MemberRecord {
    type Error = RecordError;

    fn try_from(row: RawMemberRow) -> Result<Self, Self::Error> {
        let user_id = row.userid.trim().to_owned();
        if user_id.is_empty() {
            return Err(RecordError::EmptyUserId { id: row.id });
        }
        let count = u64::try_from(row.count).map_err(|_| RecordError::NegativeCount {
            id: row.id,
            user_id: user_id.clone(),
            count: row.count,
        })?;
        let username = row
            .username
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_USERNAME.to_owned());

        Ok(Self {
            id: row.id,
            user_id,
            username,
            profile_picture_url: row.profilepic.filter(|url| !url.trim().is_empty()),
            count,
            updated_at: row.updated_at,
        })
    }
}

/// Live change-feed event, pushed over SSE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    Upsert {
        seq: u64,
        view: View,
        record: MemberRecord,
    },
    TotalCount {
        seq: u64,
        value: i64,
    },
    /// The subscriber missed events and should reload from the first page.
    Resync {
        seq: u64,
    },
}

impl ChangeEvent {
    pub fn seq(&self) -> u64 {
        match self {
            ChangeEvent::Upsert { seq, .. }
            | ChangeEvent::TotalCount { seq, .. }
            | ChangeEvent::Resync { seq } => *seq,
        }
    }

    /// SSE `event:` name.
    pub fn event_name(&self) -> &'static str {
        match self {
            ChangeEvent::Upsert { .. } => "upsert",
            ChangeEvent::TotalCount { .. } => "total_count",
            ChangeEvent::Resync { .. } => "resync",
        }
    }

    pub fn view(&self) -> Option<View> {
        match self {
            ChangeEvent::Upsert { view, .. } => Some(*view),
            ChangeEvent::TotalCount { .. } | ChangeEvent::Resync { .. } => None,
        }
    }
}

/// One page of a view as served to clients.
///
/// `fetched` is how many rows the query returned before invalid rows were dropped, so a
/// full page with a rejected row still reads as full.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemberPage {
    #[serde(default)]
    pub records: Vec<MemberRecord>,
    #[serde(default)]
    pub fetched: u32,
}

impl From<Vec<MemberRecord>> for MemberPage {
    fn from(records: Vec<MemberRecord>) -> Self {
        let fetched = u32::try_from(records.len()).unwrap_or(u32::MAX);
        Self { records, fetched }
    }
}

/// First page of each view plus the total count, fetched once at mount.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bootstrap {
    #[serde(default)]
    pub all_time: MemberPage,
    #[serde(default)]
    pub current: MemberPage,
    #[serde(default)]
    pub total_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TotalCount {
    pub value: i64,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn raw(userid: &str, count: i64) -> RawMemberRow {
        RawMemberRow {
            id: 7,
            userid: userid.to_owned(),
            username: Some("simp".to_owned()),
            profilepic: None,
            count,
            updated_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn view_round_trips_through_path_names() {
        for view in View::ALL {
            assert_eq!(view.as_str().parse::<View>(), Ok(view));
        }
        assert_eq!("current_members".parse::<View>(), Ok(View::Current));
        assert!("weekly".parse::<View>().is_err());
    }

    #[test]
    fn view_serializes_as_kebab_case() {
        assert_eq!(
            serde_json::to_string(&View::AllTime).unwrap(),
            "\"all-time\""
        );
    }

    #[test]
    fn raw_row_rejects_negative_count_and_blank_user() {
        assert_eq!(
            MemberRecord::try_from(raw("u1", -3)),
            Err(RecordError::NegativeCount {
                id: 7,
                user_id: "u1".to_owned(),
                count: -3
            })
        );
        assert_eq!(
            MemberRecord::try_from(raw("  ", 3)),
            Err(RecordError::EmptyUserId { id: 7 })
        );
    }

    #[test]
    fn raw_row_coerces_missing_optional_fields() {
        let mut row = raw("u1", 12);
        row.username = None;
        row.profilepic = Some("   ".to_owned());

        let record = MemberRecord::try_from(row).unwrap();
        assert_eq!(record.username, UNKNOWN_USERNAME);
        assert!(!record.is_displayable());
        assert_eq!(record.profile_picture_url, None);
        assert_eq!(record.avatar_url(), PLACEHOLDER_AVATAR);
    }

    #[test]
    fn profile_url_points_at_instagram() {
        let record = MemberRecord::try_from(raw("u1", 1)).unwrap();
        assert_eq!(record.profile_url(), "https://www.instagram.com/simp");
    }

    #[test]
    fn member_page_keeps_fetched_count_on_the_wire() {
        let record = MemberRecord::try_from(raw("u1", 1)).unwrap();
        let page = MemberPage {
            records: vec![record],
            fetched: 20,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["fetched"], 20);
        assert_eq!(json["records"].as_array().map(Vec::len), Some(1));

        let legacy: MemberPage = serde_json::from_str("{}").unwrap();
        assert_eq!(legacy, MemberPage::default());
    }

    #[test]
    fn change_event_is_internally_tagged() {
        let event = ChangeEvent::TotalCount { seq: 4, value: 900 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "total_count");
        assert_eq!(json["value"], 900);
        assert_eq!(event.event_name(), "total_count");
        assert_eq!(event.seq(), 4);
    }
}
