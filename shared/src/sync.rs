//! Incremental list synchronization for the two leaderboard views.
//!
//! Each view keeps its own ordered, deduplicated record list and page cursor. Pages are
//! merged in fetch order, live upserts are applied in place or prepended, and neither path
//! re-sorts the list: a prepended record can sit above higher counts until the view is
//! reloaded from the first page.
//!
//! Upserts that land while a view is being replaced are replayed on top of the new first
//! page, and a reload asked for while a fetch is in flight is deferred until it finishes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::member::{Bootstrap, ChangeEvent, MemberPage, MemberRecord, View};
use crate::source::{FetchError, RowSource};

pub const PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Idle,
    /// Replacing the view (initial load or reset).
    Loading,
    /// Appending the next page.
    LoadingMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub view: View,
    pub page_index: u32,
    pub append: bool,
}

impl PageRequest {
    pub fn offset(&self) -> u32 {
        self.page_index.saturating_mul(PAGE_SIZE)
    }

    pub fn limit(&self) -> u32 {
        PAGE_SIZE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("{view} already has a page fetch in flight")]
    LoadInFlight { view: View },
    #[error("{view} can only append page {expected}, got page {requested}")]
    NonContiguousPage {
        view: View,
        expected: u32,
        requested: u32,
    },
    #[error("fetching {view} page {page_index} failed: {source}")]
    Fetch {
        view: View,
        page_index: u32,
        #[source]
        source: FetchError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Replaced { index: usize },
    Prepended,
}

#[derive(Debug, Clone)]
pub struct ViewState {
    records: Vec<MemberRecord>,
    loaded_ids: HashSet<String>,
    next_page: u32,
    has_more: bool,
    phase: LoadPhase,
    /// Set once any fetch for this view has finished, successfully or not.
    loaded: bool,
    reload_pending: bool,
    /// Upserts received during a replace load.
    buffered_upserts: Vec<MemberRecord>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            loaded_ids: HashSet::new(),
            next_page: 0,
            has_more: true,
            phase: LoadPhase::Idle,
            loaded: false,
            reload_pending: false,
            buffered_upserts: Vec::new(),
        }
    }
}

impl ViewState {
    pub fn records(&self) -> &[MemberRecord] {
        &self.records
    }

    pub fn loaded_ids(&self) -> &HashSet<String> {
        &self.loaded_ids
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    pub fn next_page_offset(&self) -> u32 {
        self.next_page.saturating_mul(PAGE_SIZE)
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase != LoadPhase::Idle
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Empty with nothing left in flight, after at least one fetch has finished.
    pub fn shows_no_data(&self) -> bool {
        self.loaded && self.records.is_empty() && !self.is_loading()
    }

    pub fn reload_pending(&self) -> bool {
        self.reload_pending
    }

    fn apply_page(&mut self, page_index: u32, page: MemberPage, append: bool) -> usize {
        let before = if append { self.records.len() } else { 0 };

        let (records, loaded_ids) = if append {
            merge_append(&self.records, &page.records, &self.loaded_ids)
        } else {
            merge_append(&[], &page.records, &HashSet::new())
        };
        self.records = records;
        self.loaded_ids = loaded_ids;
        self.next_page = page_index.saturating_add(1);
        // Rows the server dropped as invalid still count towards a full page.
        self.has_more = page.fetched >= PAGE_SIZE;
        self.loaded = true;

        self.records.len() - before
    }

    /// Re-applies upserts that arrived while the first page was being replaced. A page
    /// row that is already newer than the buffered upsert is kept.
    fn replay(&mut self, buffered: Vec<MemberRecord>) {
        for record in buffered {
            let stale = self
                .records
                .iter()
                .find(|existing| existing.user_id == record.user_id)
                .is_some_and(|existing| existing.updated_at > record.updated_at);
            if !stale {
                self.upsert(record);
            }
        }
    }

    fn upsert(&mut self, record: MemberRecord) -> UpsertOutcome {
        if self.phase == LoadPhase::Loading {
            self.buffered_upserts.push(record.clone());
        }
        match self
            .records
            .iter()
            .position(|existing| existing.user_id == record.user_id)
        {
            Some(index) => {
                self.records[index] = record;
                UpsertOutcome::Replaced { index }
            }
            None => {
                self.loaded_ids.insert(record.user_id.clone());
                self.records.insert(0, record);
                UpsertOutcome::Prepended
            }
        }
    }
}

/// Appends `incoming` after `existing`, skipping user ids already in `loaded_ids` or
/// repeated within `incoming`. Order of both inputs is preserved; nothing is re-sorted.
pub fn merge_append(
    existing: &[MemberRecord],
    incoming: &[MemberRecord],
    loaded_ids: &HashSet<String>,
) -> (Vec<MemberRecord>, HashSet<String>) {
    let mut ids = loaded_ids.clone();
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    merged.extend_from_slice(existing);

    for record in incoming {
        if ids.insert(record.user_id.clone()) {
            merged.push(record.clone());
        }
    }

    (merged, ids)
}

/// Client-side state for both views, the shared total count, and which view is shown.
#[derive(Debug, Clone)]
pub struct LeaderboardSync {
    all_time: ViewState,
    current: ViewState,
    active: View,
    total_count: i64,
    /// A `total_count` event has been applied.
    live_total: bool,
    last_updated: Option<DateTime<Utc>>,
}

impl Default for LeaderboardSync {
    fn default() -> Self {
        Self::new(View::Current)
    }
}

impl LeaderboardSync {
    pub fn new(active: View) -> Self {
        Self {
            all_time: ViewState::default(),
            current: ViewState::default(),
            active,
            total_count: 0,
            live_total: false,
            last_updated: None,
        }
    }

    /// Treats `page` as a completed replace load of page 0.
    pub fn seed(&mut self, view: View, page: impl Into<MemberPage>) {
        let page = page.into();
        self.note_updated(page.records.first().map(|record| record.updated_at));
        self.view_mut(view).apply_page(0, page, false);
    }

    pub fn view(&self, view: View) -> &ViewState {
        match view {
            View::AllTime => &self.all_time,
            View::Current => &self.current,
        }
    }

    fn view_mut(&mut self, view: View) -> &mut ViewState {
        match view {
            View::AllTime => &mut self.all_time,
            View::Current => &mut self.current,
        }
    }

    pub fn active_view(&self) -> View {
        self.active
    }

    pub fn active(&self) -> &ViewState {
        self.view(self.active)
    }

    pub fn total_count(&self) -> i64 {
        self.total_count
    }

    pub fn set_total_count(&mut self, value: i64) {
        self.total_count = value;
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    fn note_updated(&mut self, candidate: Option<DateTime<Utc>>) {
        if let Some(candidate) = candidate
            && self.last_updated.is_none_or(|current| candidate > current)
        {
            self.last_updated = Some(candidate);
        }
    }

    /// Claims the view's fetch slot and moves it into the matching load phase.
    ///
    /// Appends must continue from the last loaded page. Nothing is fetched here; hand the
    /// returned request to a [`RowSource`] and report the outcome via [`Self::finish_load`].
    pub fn begin_load(
        &mut self,
        view: View,
        page_index: u32,
        append: bool,
    ) -> Result<PageRequest, SyncError> {
        let state = self.view_mut(view);
        if state.is_loading() {
            return Err(SyncError::LoadInFlight { view });
        }
        if append && page_index != state.next_page {
            return Err(SyncError::NonContiguousPage {
                view,
                expected: state.next_page,
                requested: page_index,
            });
        }

        state.phase = if append {
            LoadPhase::LoadingMore
        } else {
            LoadPhase::Loading
        };
        Ok(PageRequest {
            view,
            page_index,
            append,
        })
    }

    /// Applies a finished fetch. The load phase is cleared whatever the outcome; on error
    /// the view is otherwise left untouched. Returns how many records became visible.
    ///
    /// A reload deferred by [`Self::request_reload`] stays pending; start it with
    /// [`Self::take_pending_reload`].
    pub fn finish_load(
        &mut self,
        request: PageRequest,
        outcome: Result<MemberPage, FetchError>,
    ) -> Result<usize, SyncError> {
        let state = self.view_mut(request.view);
        state.phase = LoadPhase::Idle;
        state.loaded = true;
        let buffered = std::mem::take(&mut state.buffered_upserts);

        match outcome {
            Ok(page) => {
                if !request.append {
                    self.note_updated(page.records.first().map(|record| record.updated_at));
                }
                let state = self.view_mut(request.view);
                let added = state.apply_page(request.page_index, page, request.append);
                state.replay(buffered);
                Ok(added)
            }
            Err(source) => {
                warn!(
                    view = %request.view,
                    page = request.page_index,
                    error = %source,
                    "page fetch failed"
                );
                Err(SyncError::Fetch {
                    view: request.view,
                    page_index: request.page_index,
                    source,
                })
            }
        }
    }

    /// Fetches and applies one page in a single call.
    pub async fn load_page<S: RowSource>(
        &mut self,
        source: &S,
        view: View,
        page_index: u32,
        append: bool,
    ) -> Result<usize, SyncError> {
        let request = self.begin_load(view, page_index, append)?;
        let outcome = source
            .fetch_page(request.view, request.offset(), request.limit())
            .await;
        self.finish_load(request, outcome)
    }

    /// Replace-loads page 0 of `view`. While another fetch for the view is in flight the
    /// reload is recorded instead and `None` is returned.
    pub fn request_reload(&mut self, view: View) -> Option<PageRequest> {
        let state = self.view_mut(view);
        if state.is_loading() {
            state.reload_pending = true;
            return None;
        }
        self.begin_load(view, 0, false).ok()
    }

    /// Begins the reload deferred by [`Self::request_reload`] once the view is idle.
    pub fn take_pending_reload(&mut self, view: View) -> Option<PageRequest> {
        let state = self.view_mut(view);
        if !state.reload_pending || state.is_loading() {
            return None;
        }
        state.reload_pending = false;
        self.begin_load(view, 0, false).ok()
    }

    /// Claims the first-page slot of every idle view for one combined bootstrap fetch.
    pub fn begin_bootstrap(&mut self) -> Vec<PageRequest> {
        View::ALL
            .into_iter()
            .filter_map(|view| self.begin_load(view, 0, false).ok())
            .collect()
    }

    /// Completes the loads claimed by [`Self::begin_bootstrap`]. The bootstrap total is
    /// only taken when no live count has arrived in the meantime.
    pub fn finish_bootstrap(
        &mut self,
        requests: &[PageRequest],
        outcome: Result<Bootstrap, FetchError>,
    ) -> Result<(), FetchError> {
        match outcome {
            Ok(bootstrap) => {
                if !self.live_total {
                    self.total_count = bootstrap.total_count;
                }
                let mut all_time = Some(bootstrap.all_time);
                let mut current = Some(bootstrap.current);
                for &request in requests {
                    let page = match request.view {
                        View::AllTime => all_time.take(),
                        View::Current => current.take(),
                    };
                    self.finish_load(request, Ok(page.unwrap_or_default())).ok();
                }
                Ok(())
            }
            Err(source) => {
                for &request in requests {
                    self.finish_load(request, Err(source.clone())).ok();
                }
                Err(source)
            }
        }
    }

    pub fn apply_live_upsert(&mut self, view: View, record: MemberRecord) -> UpsertOutcome {
        self.note_updated(Some(record.updated_at));
        self.view_mut(view).upsert(record)
    }

    /// Applies a change-feed event. Returns `true` when the event asks for a full reload.
    pub fn apply_change(&mut self, event: ChangeEvent) -> bool {
        match event {
            ChangeEvent::Upsert { view, record, .. } => {
                self.apply_live_upsert(view, record);
                false
            }
            ChangeEvent::TotalCount { value, .. } => {
                self.set_total_count(value);
                self.live_total = true;
                false
            }
            ChangeEvent::Resync { .. } => true,
        }
    }

    /// Switches the rendered view. Both views keep their loaded pages.
    /// Returns whether the active view changed.
    pub fn toggle_view(&mut self, target: View) -> bool {
        let changed = self.active != target;
        self.active = target;
        changed
    }

    /// Begins the next page of the active view, unless a fetch for it is already in
    /// flight or the view is exhausted.
    pub fn trigger_load_more(&mut self) -> Option<PageRequest> {
        let view = self.active;
        let state = self.view(view);
        if state.is_loading() || !state.has_more() {
            return None;
        }
        let next_page = state.next_page();
        self.begin_load(view, next_page, true).ok()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use chrono::TimeZone;
    use futures::executor::block_on;

    use super::*;

    fn record(id: i64, user: &str, count: u64) -> MemberRecord {
        MemberRecord {
            id,
            user_id: user.to_owned(),
            username: format!("name_{user}"),
            profile_picture_url: None,
            count,
            updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn page(start: i64, len: usize) -> Vec<MemberRecord> {
        (0..len)
            .map(|i| {
                let id = start + i as i64;
                record(id, &format!("u{id}"), 10_000 - id as u64)
            })
            .collect()
    }

    fn user_ids(records: &[MemberRecord]) -> Vec<&str> {
        records.iter().map(|r| r.user_id.as_str()).collect()
    }

    #[derive(Default)]
    struct MockSource {
        pages: HashMap<(View, u32), Result<Vec<MemberRecord>, FetchError>>,
        calls: RefCell<Vec<(View, u32, u32)>>,
    }

    impl MockSource {
        fn with_page(mut self, view: View, offset: u32, rows: Vec<MemberRecord>) -> Self {
            self.pages.insert((view, offset), Ok(rows));
            self
        }

        fn with_failure(mut self, view: View, offset: u32) -> Self {
            self.pages
                .insert((view, offset), Err(FetchError::Status(503)));
            self
        }
    }

    impl RowSource for MockSource {
        async fn fetch_page(
            &self,
            view: View,
            offset: u32,
            limit: u32,
        ) -> Result<MemberPage, FetchError> {
            self.calls.borrow_mut().push((view, offset, limit));
            self.pages
                .get(&(view, offset))
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
                .map(MemberPage::from)
        }
    }

    #[test]
    fn merge_append_skips_loaded_ids_and_keeps_order() {
        let existing = vec![record(1, "a", 50), record(2, "b", 40)];
        let loaded: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let incoming = vec![record(2, "b", 45), record(5, "e", 10), record(3, "c", 30)];

        let (merged, ids) = merge_append(&existing, &incoming, &loaded);

        assert_eq!(user_ids(&merged), vec!["a", "b", "e", "c"]);
        assert_eq!(merged[1].count, 40, "existing entry must not be overwritten");
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn merge_append_is_idempotent() {
        let incoming = page(0, 5);
        let (once, once_ids) = merge_append(&[], &incoming, &HashSet::new());
        let (twice, twice_ids) = merge_append(&once, &incoming, &once_ids);

        assert_eq!(once, twice);
        assert_eq!(once_ids, twice_ids);
    }

    #[test]
    fn merge_append_drops_duplicates_inside_incoming() {
        let incoming = vec![record(1, "a", 5), record(2, "a", 4), record(3, "b", 3)];
        let (merged, _) = merge_append(&[], &incoming, &HashSet::new());
        assert_eq!(user_ids(&merged), vec!["a", "b"]);
        assert_eq!(merged[0].id, 1);
    }

    #[test]
    fn live_upsert_of_known_user_replaces_in_place() {
        let mut sync = LeaderboardSync::new(View::AllTime);
        sync.seed(View::AllTime, page(0, 3));

        let mut bumped = record(1, "u1", 99_999);
        bumped.username = "renamed".to_owned();
        let outcome = sync.apply_live_upsert(View::AllTime, bumped);

        let records = sync.view(View::AllTime).records();
        assert_eq!(outcome, UpsertOutcome::Replaced { index: 1 });
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].username, "renamed");
        assert_eq!(records[1].count, 99_999);
    }

    #[test]
    fn live_upsert_of_new_user_prepends_without_resorting() {
        let mut sync = LeaderboardSync::new(View::AllTime);
        sync.seed(View::AllTime, page(0, 3));

        let outcome = sync.apply_live_upsert(View::AllTime, record(77, "newbie", 1));

        let records = sync.view(View::AllTime).records();
        assert_eq!(outcome, UpsertOutcome::Prepended);
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].user_id, "newbie");
        assert!(sync.view(View::AllTime).loaded_ids().contains("newbie"));
    }

    #[test]
    fn prepended_user_is_not_duplicated_by_a_later_page() {
        let mut sync = LeaderboardSync::new(View::AllTime);
        sync.seed(View::AllTime, page(0, 20));
        sync.apply_live_upsert(View::AllTime, record(25, "u25", 1));

        let source = MockSource::default().with_page(View::AllTime, 20, page(20, 20));
        let added = block_on(sync.load_page(&source, View::AllTime, 1, true)).unwrap();

        let records = sync.view(View::AllTime).records();
        assert_eq!(added, 19);
        assert_eq!(records.len(), 40);
        assert_eq!(records.iter().filter(|r| r.user_id == "u25").count(), 1);
    }

    #[test]
    fn upserts_are_scoped_to_their_view() {
        let mut sync = LeaderboardSync::default();
        sync.seed(View::AllTime, page(0, 2));
        sync.seed(View::Current, page(0, 2));

        sync.apply_live_upsert(View::Current, record(9, "x", 3));

        assert_eq!(sync.view(View::Current).records().len(), 3);
        assert_eq!(sync.view(View::AllTime).records().len(), 2);
    }

    #[test]
    fn load_more_is_a_no_op_while_a_fetch_is_in_flight() {
        let mut sync = LeaderboardSync::new(View::Current);
        sync.seed(View::Current, page(0, 20));

        let first = sync.trigger_load_more().expect("first trigger should begin a load");
        assert_eq!(first.page_index, 1);
        assert_eq!(first.offset(), 20);
        assert_eq!(sync.view(View::Current).phase(), LoadPhase::LoadingMore);

        assert_eq!(sync.trigger_load_more(), None);
        assert_eq!(
            sync.begin_load(View::Current, 1, true),
            Err(SyncError::LoadInFlight {
                view: View::Current
            })
        );

        sync.finish_load(first, Ok(page(20, 20).into())).unwrap();
        assert_eq!(sync.view(View::Current).phase(), LoadPhase::Idle);
        assert_eq!(sync.trigger_load_more().map(|r| r.page_index), Some(2));
    }

    #[test]
    fn load_more_is_a_no_op_when_exhausted() {
        let mut sync = LeaderboardSync::new(View::Current);
        sync.seed(View::Current, page(0, 7));

        assert!(!sync.view(View::Current).has_more());
        assert_eq!(sync.trigger_load_more(), None);
        assert_eq!(sync.view(View::Current).phase(), LoadPhase::Idle);
    }

    #[test]
    fn in_flight_guard_is_per_view() {
        let mut sync = LeaderboardSync::new(View::Current);
        sync.seed(View::Current, page(0, 20));
        sync.seed(View::AllTime, page(0, 20));

        let current = sync.trigger_load_more().unwrap();
        sync.toggle_view(View::AllTime);
        let all_time = sync.trigger_load_more().unwrap();

        assert_eq!(current.view, View::Current);
        assert_eq!(all_time.view, View::AllTime);
    }

    #[test]
    fn append_must_continue_from_last_page() {
        let mut sync = LeaderboardSync::new(View::AllTime);
        sync.seed(View::AllTime, page(0, 20));

        assert_eq!(
            sync.begin_load(View::AllTime, 3, true),
            Err(SyncError::NonContiguousPage {
                view: View::AllTime,
                expected: 1,
                requested: 3
            })
        );
        assert_eq!(sync.view(View::AllTime).phase(), LoadPhase::Idle);
    }

    #[test]
    fn failed_fetch_clears_phase_and_keeps_state() {
        let mut sync = LeaderboardSync::new(View::AllTime);
        sync.seed(View::AllTime, page(0, 20));
        let source = MockSource::default().with_failure(View::AllTime, 20);

        let err = block_on(sync.load_page(&source, View::AllTime, 1, true)).unwrap_err();

        let state = sync.view(View::AllTime);
        assert!(matches!(err, SyncError::Fetch { page_index: 1, .. }));
        assert_eq!(state.phase(), LoadPhase::Idle);
        assert_eq!(state.records().len(), 20);
        assert_eq!(state.next_page(), 1);
        assert!(state.has_more());
    }

    #[test]
    fn replace_load_resets_the_view() {
        let mut sync = LeaderboardSync::new(View::AllTime);
        sync.seed(View::AllTime, page(0, 20));
        sync.apply_live_upsert(View::AllTime, record(500, "late", 1));

        let request = sync.begin_load(View::AllTime, 0, false).unwrap();
        assert_eq!(sync.view(View::AllTime).phase(), LoadPhase::Loading);
        sync.finish_load(request, Ok(page(100, 4).into())).unwrap();

        let state = sync.view(View::AllTime);
        assert_eq!(user_ids(state.records()), vec!["u100", "u101", "u102", "u103"]);
        assert!(!state.loaded_ids().contains("late"));
        assert!(!state.has_more());
        assert_eq!(state.next_page(), 1);
    }

    #[test]
    fn has_more_turns_false_only_after_a_short_page() {
        let source = MockSource::default()
            .with_page(View::AllTime, 0, page(0, 20))
            .with_page(View::AllTime, 20, page(20, 20))
            .with_page(View::AllTime, 40, page(40, 5));
        let mut sync = LeaderboardSync::new(View::AllTime);

        block_on(sync.load_page(&source, View::AllTime, 0, false)).unwrap();
        assert!(sync.view(View::AllTime).has_more());

        let request = sync.trigger_load_more().unwrap();
        let rows = block_on(source.fetch_page(request.view, request.offset(), request.limit()));
        sync.finish_load(request, rows).unwrap();
        assert!(sync.view(View::AllTime).has_more());

        block_on(sync.load_page(&source, View::AllTime, 2, true)).unwrap();
        let state = sync.view(View::AllTime);
        assert!(!state.has_more());
        assert_eq!(state.records().len(), 45);
        assert_eq!(state.next_page_offset(), 60);
        assert_eq!(sync.trigger_load_more(), None);

        assert_eq!(
            *source.calls.borrow(),
            vec![
                (View::AllTime, 0, PAGE_SIZE),
                (View::AllTime, 20, PAGE_SIZE),
                (View::AllTime, 40, PAGE_SIZE),
            ]
        );
    }

    #[test]
    fn toggle_view_keeps_both_views_cached() {
        let mut sync = LeaderboardSync::default();
        let requests = sync.begin_bootstrap();
        sync.finish_bootstrap(
            &requests,
            Ok(Bootstrap {
                all_time: page(0, 20).into(),
                current: page(100, 3).into(),
                total_count: 1_234,
            }),
        )
        .unwrap();

        assert_eq!(sync.active_view(), View::Current);
        assert!(sync.toggle_view(View::AllTime));
        assert_eq!(sync.active().records().len(), 20);
        assert!(!sync.toggle_view(View::AllTime));
        assert!(sync.toggle_view(View::Current));
        assert_eq!(sync.active().records().len(), 3);
        assert_eq!(sync.total_count(), 1_234);
    }

    #[test]
    fn change_events_update_total_and_request_resync() {
        let mut sync = LeaderboardSync::default();

        assert!(!sync.apply_change(ChangeEvent::TotalCount { seq: 1, value: 77 }));
        assert_eq!(sync.total_count(), 77);

        assert!(!sync.apply_change(ChangeEvent::Upsert {
            seq: 2,
            view: View::Current,
            record: record(1, "a", 1),
        }));
        assert_eq!(sync.view(View::Current).records().len(), 1);

        assert!(sync.apply_change(ChangeEvent::Resync { seq: 3 }));
    }

    #[test]
    fn last_updated_tracks_newest_timestamp() {
        let mut sync = LeaderboardSync::default();
        assert_eq!(sync.last_updated(), None);

        sync.seed(View::AllTime, page(0, 2));
        let seeded = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(sync.last_updated(), Some(seeded));

        let mut newer = record(9, "n", 1);
        newer.updated_at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        sync.apply_live_upsert(View::Current, newer.clone());
        assert_eq!(sync.last_updated(), Some(newer.updated_at));

        let mut older = record(10, "o", 1);
        older.updated_at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        sync.apply_live_upsert(View::Current, older);
        assert_eq!(sync.last_updated(), Some(newer.updated_at));
    }

    #[test]
    fn full_page_with_dropped_rows_keeps_paginating() {
        let mut sync = LeaderboardSync::new(View::Current);
        let mut rows = page(0, 20);
        rows.remove(7);
        sync.seed(
            View::Current,
            MemberPage {
                records: rows,
                fetched: 20,
            },
        );

        let state = sync.view(View::Current);
        assert_eq!(state.records().len(), 19);
        assert!(state.has_more());
        assert_eq!(sync.trigger_load_more().map(|r| r.offset()), Some(20));
    }

    #[test]
    fn upsert_during_append_is_not_duplicated_by_the_page() {
        let mut sync = LeaderboardSync::new(View::AllTime);
        sync.seed(View::AllTime, page(0, 20));

        let request = sync.trigger_load_more().unwrap();
        let mut bumped = record(25, "u25", 50_000);
        bumped.updated_at = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(
            sync.apply_live_upsert(View::AllTime, bumped),
            UpsertOutcome::Prepended
        );
        let added = sync.finish_load(request, Ok(page(20, 20).into())).unwrap();

        let records = sync.view(View::AllTime).records();
        assert_eq!(added, 19);
        assert_eq!(records.len(), 40);
        let u25: Vec<_> = records.iter().filter(|r| r.user_id == "u25").collect();
        assert_eq!(u25.len(), 1);
        assert_eq!(u25[0].count, 50_000, "the later upsert must win over the page row");
    }

    #[test]
    fn upsert_during_replace_survives_the_new_first_page() {
        let mut sync = LeaderboardSync::new(View::Current);
        sync.seed(View::Current, page(0, 20));

        let request = sync.begin_load(View::Current, 0, false).unwrap();
        let mut newer = record(3, "u3", 77_777);
        newer.updated_at = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        sync.apply_live_upsert(View::Current, newer);
        sync.apply_live_upsert(View::Current, record(900, "joined", 2));
        sync.finish_load(request, Ok(page(0, 20).into())).unwrap();

        let records = sync.view(View::Current).records();
        assert_eq!(records.len(), 21);
        assert_eq!(records[0].user_id, "joined");
        let u3 = records.iter().find(|r| r.user_id == "u3").unwrap();
        assert_eq!(u3.count, 77_777);

        // Nothing stays buffered for the next replace.
        let request = sync.begin_load(View::Current, 0, false).unwrap();
        sync.finish_load(request, Ok(page(0, 20).into())).unwrap();
        assert_eq!(sync.view(View::Current).records().len(), 20);
    }

    #[test]
    fn buffered_upsert_older_than_the_page_row_is_dropped() {
        let mut sync = LeaderboardSync::new(View::Current);
        let request = sync.begin_load(View::Current, 0, false).unwrap();
        sync.apply_live_upsert(View::Current, record(1, "u1", 5));

        let mut fresh = page(0, 3);
        fresh[1].count = 8_000;
        fresh[1].updated_at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        sync.finish_load(request, Ok(fresh.into())).unwrap();

        assert_eq!(sync.view(View::Current).records()[1].count, 8_000);
    }

    #[test]
    fn reload_during_load_more_is_deferred_until_it_finishes() {
        let mut sync = LeaderboardSync::new(View::Current);
        sync.seed(View::Current, page(0, 20));
        let more = sync.trigger_load_more().unwrap();

        assert_eq!(sync.request_reload(View::Current), None);
        assert!(sync.view(View::Current).reload_pending());
        assert_eq!(sync.take_pending_reload(View::Current), None);

        sync.finish_load(more, Ok(page(20, 20).into())).unwrap();
        let reload = sync
            .take_pending_reload(View::Current)
            .expect("deferred reload should start once idle");
        assert_eq!(reload.page_index, 0);
        assert!(!reload.append);
        assert!(!sync.view(View::Current).reload_pending());
        assert_eq!(sync.take_pending_reload(View::Current), None);

        sync.finish_load(reload, Ok(page(0, 20).into())).unwrap();
        assert_eq!(sync.view(View::Current).records().len(), 20);
        assert_eq!(sync.view(View::Current).next_page(), 1);
    }

    #[test]
    fn deferred_reload_survives_a_failed_fetch() {
        let mut sync = LeaderboardSync::new(View::AllTime);
        sync.seed(View::AllTime, page(0, 20));
        sync.toggle_view(View::AllTime);
        let more = sync.trigger_load_more().unwrap();
        sync.request_reload(View::AllTime);

        assert!(sync.finish_load(more, Err(FetchError::Status(502))).is_err());
        assert!(sync.take_pending_reload(View::AllTime).is_some());
    }

    #[test]
    fn idle_reload_starts_immediately() {
        let mut sync = LeaderboardSync::new(View::Current);
        sync.seed(View::Current, page(0, 20));

        let request = sync.request_reload(View::Current).unwrap();
        assert_eq!(request.page_index, 0);
        assert!(!sync.view(View::Current).reload_pending());
        assert_eq!(sync.view(View::Current).phase(), LoadPhase::Loading);
    }

    #[test]
    fn no_data_waits_for_the_first_load_to_resolve() {
        let mut sync = LeaderboardSync::default();
        assert!(!sync.active().shows_no_data());

        let requests = sync.begin_bootstrap();
        assert_eq!(requests.len(), 2);
        assert!(sync.active().is_loading());
        assert!(!sync.active().shows_no_data());

        sync.finish_bootstrap(&requests, Ok(Bootstrap::default()))
            .unwrap();
        assert!(sync.active().shows_no_data());
        assert!(sync.view(View::AllTime).shows_no_data());
    }

    #[test]
    fn bootstrap_keeps_live_events_that_arrived_first() {
        let mut sync = LeaderboardSync::default();
        let requests = sync.begin_bootstrap();

        sync.apply_change(ChangeEvent::TotalCount { seq: 1, value: 5_000 });
        sync.apply_change(ChangeEvent::Upsert {
            seq: 2,
            view: View::Current,
            record: record(400, "early", 3),
        });
        assert_eq!(
            sync.begin_load(View::Current, 1, true),
            Err(SyncError::LoadInFlight {
                view: View::Current
            })
        );

        sync.finish_bootstrap(
            &requests,
            Ok(Bootstrap {
                all_time: page(0, 20).into(),
                current: page(100, 5).into(),
                total_count: 4_000,
            }),
        )
        .unwrap();

        assert_eq!(sync.total_count(), 5_000);
        let current = sync.view(View::Current);
        assert_eq!(current.records().len(), 6);
        assert_eq!(current.records()[0].user_id, "early");
        assert_eq!(current.phase(), LoadPhase::Idle);
        assert_eq!(sync.view(View::AllTime).records().len(), 20);
    }

    #[test]
    fn failed_bootstrap_releases_both_views() {
        let mut sync = LeaderboardSync::default();
        let requests = sync.begin_bootstrap();

        let err = sync
            .finish_bootstrap(&requests, Err(FetchError::Transport("offline".to_owned())))
            .unwrap_err();

        assert_eq!(err, FetchError::Transport("offline".to_owned()));
        for view in View::ALL {
            assert_eq!(sync.view(view).phase(), LoadPhase::Idle);
            assert!(sync.request_reload(view).is_some());
        }
    }
}
