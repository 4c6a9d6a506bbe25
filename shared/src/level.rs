use serde::{Deserialize, Serialize};

/// XP needed to go from level 1 to level 2.
pub const BASE_LEVEL_XP: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    /// XP earned since reaching `level`.
    pub current_level_xp: u64,
    /// XP `level` requires in total before the next level-up.
    pub next_level_xp: u64,
    /// `current_level_xp / next_level_xp * 100`.
    pub progress: f64,
}

/// Each level costs 1.5x the previous one, floored to an integer.
///
/// The threshold sequence runs 100, 150, 225, 337, 505, ... so the floor only starts
/// to matter from the fourth level onward. Arithmetic is done in `u128` so very large
/// scores cannot overflow the running total.
pub fn calculate_level(xp: u64) -> LevelProgress {
    let xp = u128::from(xp);
    let mut level: u32 = 1;
    let mut required = u128::from(BASE_LEVEL_XP);
    let mut total: u128 = 0;

    while xp >= total + required {
        total += required;
        level += 1;
        required = required * 3 / 2;
    }

    let current_level_xp = u64::try_from(xp - total).unwrap_or(u64::MAX);
    let next_level_xp = u64::try_from(required).unwrap_or(u64::MAX);
    let progress = current_level_xp as f64 / next_level_xp as f64 * 100.0;

    LevelProgress {
        level,
        current_level_xp,
        next_level_xp,
        progress,
    }
}
