use chrono::{DateTime, Local, Utc};
use leptos::prelude::*;
use simpcity_shared::{LevelProgress, MemberRecord, RankBadge, calculate_level, format_thousands};

/// One card's worth of derived data.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DisplayRow {
    /// 1-based rank within the loaded list. Hidden rows still take up a rank.
    pub position: usize,
    pub badge: RankBadge,
    pub level: LevelProgress,
    pub username: String,
    pub avatar_url: String,
    pub profile_url: String,
    pub xp_label: String,
}

/// Rows with an unknown username are skipped but keep their place in the ranking.
pub(crate) fn display_rows(records: &[MemberRecord]) -> Vec<DisplayRow> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.is_displayable())
        .map(|(index, record)| {
            let position = index + 1;
            DisplayRow {
                position,
                badge: RankBadge::for_position(position),
                level: calculate_level(record.count),
                username: record.username.clone(),
                avatar_url: record.avatar_url().to_owned(),
                profile_url: record.profile_url(),
                xp_label: format_thousands(record.count),
            }
        })
        .collect()
}

pub(crate) fn last_updated_label(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%d/%m/%Y, %-I:%M:%S %P")
        .to_string()
}

#[component]
pub(crate) fn MemberCard(row: DisplayRow) -> impl IntoView {
    let DisplayRow {
        position,
        badge,
        level,
        username,
        avatar_url,
        profile_url,
        xp_label,
    } = row;
    let progress_width = format!("width: {:.2}%;", level.progress.clamp(0.0, 100.0));
    let profile_title = format!("View {username}'s profile on Instagram");

    view! {
        <div style="background: rgba(17,24,39,0.8); border: 1px solid #374151; border-radius: 12px; padding: 16px; display: flex; align-items: center; gap: 14px;">
            <div style="width: 44px; height: 44px; border-radius: 50%; border: 2px solid #4b5563; display: flex; align-items: center; justify-content: center; font-weight: 700; flex-shrink: 0;">
                {format!("#{position}")}
            </div>
            <div style=format!("font-size: 1.5rem; color: {}; flex-shrink: 0;", badge.color())>{badge.glyph()}</div>
            <div style="position: relative; flex-shrink: 0;">
                <img
                    src=avatar_url
                    alt=username.clone()
                    style="width: 56px; height: 56px; border-radius: 50%; border: 2px solid #ff6600;"
                />
                <div style="position: absolute; bottom: -4px; right: -4px; background: #ff4da6; font-size: 0.7rem; font-weight: 700; padding: 1px 6px; border-radius: 9999px;">
                    {level.level}
                </div>
            </div>
            <div style="flex: 1; min-width: 0;">
                <div style="display: flex; align-items: center; gap: 8px; flex-wrap: wrap;">
                    <a
                        href=profile_url
                        target="_blank"
                        rel="noopener noreferrer"
                        title=profile_title
                        style="font-size: 1.1rem; font-weight: 700; text-decoration: underline; overflow: hidden; text-overflow: ellipsis; white-space: nowrap;"
                    >
                        {format!("@{username}")}
                    </a>
                    <span style="border: 1px solid #ff6600; color: #ff6600; font-size: 0.7rem; padding: 1px 8px; border-radius: 9999px;">
                        {format!("Level {}", level.level)}
                    </span>
                </div>
                <p style="color: #ff4da6; font-weight: 600; margin: 4px 0;">{format!("XP: {xp_label}")}</p>
                <div style="width: 100%; background: #374151; border-radius: 9999px; height: 8px; overflow: hidden;">
                    <div style=format!("height: 100%; background: linear-gradient(90deg, #ff6600, #ff4da6); border-radius: 9999px; transition: width 1s ease-out; {progress_width}") />
                </div>
                <div style="display: flex; justify-content: space-between; font-size: 0.7rem; color: #9ca3af; margin-top: 4px;">
                    <span>{level.current_level_xp}</span>
                    <span>{level.next_level_xp}</span>
                </div>
            </div>
        </div>
    }
}
