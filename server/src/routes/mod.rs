pub mod api;
pub mod error;
pub mod leaderboard;
pub mod members;
pub mod sse;
