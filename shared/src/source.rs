use std::future::Future;

use crate::member::{MemberPage, View};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Anything that can hand out one page of a view, ordered by count descending
/// with id ascending as the tiebreak.
///
/// Futures are not required to be `Send`; the browser client drives them on a
/// single-threaded executor.
pub trait RowSource {
    fn fetch_page(
        &self,
        view: View,
        offset: u32,
        limit: u32,
    ) -> impl Future<Output = Result<MemberPage, FetchError>>;
}
