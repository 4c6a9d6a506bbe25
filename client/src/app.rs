use std::cell::RefCell;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen_futures::spawn_local;

use simpcity_shared::{
    LeaderboardSync, PageRequest, RowSource, View, format_signed_thousands,
};

use crate::api::{self, HttpRowSource};
use crate::rows::{MemberCard, display_rows, last_updated_label};
use crate::scroll;
use crate::sse::{self, ConnectionStatus};

struct ScrollBinding {
    window: web_sys::Window,
    handler: Closure<dyn Fn()>,
}

impl ScrollBinding {
    fn unbind(self) {
        self.window
            .remove_event_listener_with_callback("scroll", self.handler.as_ref().unchecked_ref())
            .ok();
    }
}

thread_local! {
    static SCROLL_BINDING: RefCell<Option<ScrollBinding>> = const { RefCell::new(None) };
}

/// Runs an already-claimed page fetch and reports back into `sync`.
fn run_request(sync: RwSignal<LeaderboardSync>, request: PageRequest) {
    spawn_local(async move {
        let outcome = HttpRowSource
            .fetch_page(request.view, request.offset(), request.limit())
            .await;
        if let Some(Err(e)) = sync.try_update(|state| state.finish_load(request, outcome)) {
            web_sys::console::warn_1(&format!("{e}").into());
        }
        resume_pending_reload(sync, request.view);
    });
}

fn resume_pending_reload(sync: RwSignal<LeaderboardSync>, view: View) {
    if let Some(Some(request)) = sync.try_update(|state| state.take_pending_reload(view)) {
        run_request(sync, request);
    }
}

/// Replace-loads page 0 of `view`, or queues it behind a fetch already in flight.
fn reload_first_page(sync: RwSignal<LeaderboardSync>, view: View) {
    if let Some(Some(request)) = sync.try_update(|state| state.request_reload(view)) {
        run_request(sync, request);
    }
}

fn load_more(sync: RwSignal<LeaderboardSync>) {
    if let Some(Some(request)) = sync.try_update(LeaderboardSync::trigger_load_more) {
        run_request(sync, request);
    }
}

fn bind_infinite_scroll(sync: RwSignal<LeaderboardSync>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let handler = Closure::<dyn Fn()>::new(move || {
        let Some((scroll_y, viewport_height, document_height)) = scroll::window_metrics() else {
            return;
        };
        if scroll::is_near_bottom(scroll_y, viewport_height, document_height) {
            load_more(sync);
        }
    });
    window
        .add_event_listener_with_callback("scroll", handler.as_ref().unchecked_ref())
        .ok();

    SCROLL_BINDING.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(old) = slot.take() {
            old.unbind();
        }
        *slot = Some(ScrollBinding { window, handler });
    });
}

fn unbind_infinite_scroll() {
    SCROLL_BINDING.with(|slot| {
        if let Some(binding) = slot.borrow_mut().take() {
            binding.unbind();
        }
    });
}

#[component]
pub fn App() -> impl IntoView {
    let sync: RwSignal<LeaderboardSync> = RwSignal::new(LeaderboardSync::default());
    let connection: RwSignal<ConnectionStatus> = RwSignal::new(ConnectionStatus::Connecting);
    provide_context(sync);
    provide_context(connection);

    // Both views arrive in one round trip; fall back to per-view loads if that fails.
    let requests = sync
        .try_update(LeaderboardSync::begin_bootstrap)
        .unwrap_or_default();
    spawn_local(async move {
        let outcome = api::fetch_bootstrap().await;
        match sync.try_update(|state| state.finish_bootstrap(&requests, outcome)) {
            Some(Err(e)) => {
                web_sys::console::warn_1(&format!("bootstrap failed: {e}").into());
                for view in View::ALL {
                    reload_first_page(sync, view);
                }
            }
            _ => {
                for view in View::ALL {
                    resume_pending_reload(sync, view);
                }
            }
        }
    });

    let resync = move || {
        for view in View::ALL {
            reload_first_page(sync, view);
        }
    };
    sse::connect(sync, connection, resync);
    bind_infinite_scroll(sync);

    on_cleanup(|| {
        sse::disconnect();
        unbind_infinite_scroll();
    });

    view! {
        <div style="max-width: 56rem; margin: 0 auto; padding: 32px 16px 128px;">
            <Header />
            <ViewToggle />
            <MemberList />
        </div>
    }
}

#[component]
fn Header() -> impl IntoView {
    let sync: RwSignal<LeaderboardSync> = expect_context();
    let connection: RwSignal<ConnectionStatus> = expect_context();

    let status_label = move || match connection.get() {
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Live => "live",
        ConnectionStatus::Reconnecting => "reconnecting",
    };
    let total = move || format_signed_thousands(sync.with(LeaderboardSync::total_count));
    let last_updated = move || sync.with(LeaderboardSync::last_updated).map(last_updated_label);

    view! {
        <div style="text-align: center; margin-bottom: 24px;">
            <div style="font-size: 1.75rem; font-weight: 800; background: linear-gradient(90deg, #ff6600, #ff4da6); -webkit-background-clip: text; color: transparent;">
                "SimpCity"
            </div>
            <div style="font-size: 0.7rem; color: #6b7280; letter-spacing: 0.08em; text-transform: uppercase;">
                {status_label}
            </div>
        </div>
        <div style="text-align: center; margin-bottom: 24px;">
            <span style="display: inline-block; padding: 8px 16px; border-radius: 9999px; background: rgba(0,0,0,0.7); border: 1px solid #ff6600; font-weight: 700; font-size: 1.15rem;">
                {move || format!("Total Messages: {}", total())}
            </span>
        </div>
        <div style="text-align: center; margin-bottom: 32px; font-size: 0.85rem; color: #9ca3af;">
            "Leaderboard is updated once per day. Results are not realtime."
            {move || {
                last_updated()
                    .map(|label| {
                        view! {
                            <br />
                            <span style="font-size: 0.75rem; color: #6b7280;">
                                {format!("Last updated: {label}")}
                            </span>
                        }
                    })
            }}
        </div>
    }
}

#[component]
fn ViewToggle() -> impl IntoView {
    let sync: RwSignal<LeaderboardSync> = expect_context();

    let select = move |target: View| {
        let changed = sync.try_update(|state| state.toggle_view(target)).unwrap_or(false);
        if !changed {
            return;
        }
        scroll::scroll_to_top();
        // A view that has never loaded anything fetches its first page now.
        let needs_first_page = sync.with_untracked(|state| {
            let view = state.view(target);
            view.is_empty() && view.next_page() == 0 && !view.is_loading()
        });
        if needs_first_page {
            reload_first_page(sync, target);
        }
    };

    let button_style = move |target: View| {
        if sync.with(|state| state.active_view() == target) {
            "padding: 8px 16px; border-radius: 9999px; font-weight: 700; background: transparent; color: #ff6600; border: 1px solid #ff6600; cursor: pointer;"
        } else {
            "padding: 8px 16px; border-radius: 9999px; font-weight: 700; background: #000; color: #fff; border: 1px solid #374151; cursor: pointer;"
        }
    };

    view! {
        <div style="display: flex; justify-content: center; gap: 16px; margin-bottom: 24px;">
            <button style=move || button_style(View::Current) on:click=move |_| select(View::Current)>
                "Current Members"
            </button>
            <button style=move || button_style(View::AllTime) on:click=move |_| select(View::AllTime)>
                "All Time"
            </button>
        </div>
    }
}

#[component]
fn MemberList() -> impl IntoView {
    let sync: RwSignal<LeaderboardSync> = expect_context();

    let rows = move || sync.with(|state| display_rows(state.active().records()));
    let loading_first = move || sync.with(|state| state.active().is_loading() && state.active().is_empty());
    let loading_more = move || {
        sync.with(|state| state.active().is_loading() && !state.active().is_empty())
    };
    let reached_end = move || {
        sync.with(|state| {
            let active = state.active();
            !active.has_more() && !active.is_loading() && !active.is_empty()
        })
    };
    let no_data = move || sync.with(|state| state.active().shows_no_data());

    view! {
        <div style="display: flex; flex-direction: column; gap: 16px;">
            <For
                each=rows
                key=|row| (row.position, row.username.clone(), row.xp_label.clone())
                children=|row| view! { <MemberCard row=row /> }
            />
        </div>
        <Show when=loading_first>
            <div style="text-align: center; padding: 32px 0; color: #ff6600; font-weight: 600;">
                "Loading..."
            </div>
        </Show>
        <Show when=loading_more>
            <div style="text-align: center; padding: 32px 0; color: #ff6600; font-weight: 600;">
                "Loading more simps..."
            </div>
        </Show>
        <Show when=reached_end>
            <div style="text-align: center; padding: 32px 0; color: #9ca3af; font-weight: 600;">
                "You've reached the bottom! No more simps to show."
            </div>
        </Show>
        <Show when=no_data>
            <div style="text-align: center; padding: 48px 0; color: #9ca3af; font-size: 1.1rem;">
                "No data available"
            </div>
        </Show>
    }
}
