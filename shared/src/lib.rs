pub mod format;
pub mod level;
pub mod member;
pub mod source;
pub mod sync;

pub use format::{RankBadge, format_signed_thousands, format_thousands};
pub use level::{LevelProgress, calculate_level};
pub use member::*;
pub use source::{FetchError, RowSource};
pub use sync::{
    LeaderboardSync, LoadPhase, PAGE_SIZE, PageRequest, SyncError, UpsertOutcome, ViewState,
    merge_append,
};
