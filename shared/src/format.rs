use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankBadge {
    Crown,
    Trophy,
    Medal,
    Award,
}

impl RankBadge {
    /// `position` is 1-based.
    pub fn for_position(position: usize) -> Self {
        match position {
            1 => RankBadge::Crown,
            2 => RankBadge::Trophy,
            3 => RankBadge::Medal,
            _ => RankBadge::Award,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            RankBadge::Crown => "\u{1F451}",
            RankBadge::Trophy => "\u{1F3C6}",
            RankBadge::Medal => "\u{1F949}",
            RankBadge::Award => "\u{1F396}",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            RankBadge::Crown => "#facc15",
            RankBadge::Trophy => "#d1d5db",
            RankBadge::Medal => "#d97706",
            RankBadge::Award => "#ff6600",
        }
    }
}

/// en-US digit grouping: `1234567` -> `"1,234,567"`.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_signed_thousands(value: i64) -> String {
    let grouped = format_thousands(value.unsigned_abs());
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
