use std::cell::RefCell;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{EventSource, MessageEvent};

use simpcity_shared::{ChangeEvent, LeaderboardSync};

const CHANGE_EVENT_NAMES: [&str; 3] = ["upsert", "total_count", "resync"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Live,
    Reconnecting,
}

struct SseConnection {
    es: EventSource,
    on_open: Closure<dyn Fn()>,
    on_error: Closure<dyn Fn()>,
    change_handler: Closure<dyn Fn(MessageEvent)>,
}

impl SseConnection {
    fn close(self) {
        let _ = self.on_open.as_ref();
        let _ = self.on_error.as_ref();
        self.es.set_onopen(None);
        self.es.set_onerror(None);
        for name in CHANGE_EVENT_NAMES {
            self.es
                .remove_event_listener_with_callback(
                    name,
                    self.change_handler.as_ref().unchecked_ref(),
                )
                .ok();
        }
        self.es.close();
    }
}

thread_local! {
    static SSE_CONNECTION: RefCell<Option<SseConnection>> = const { RefCell::new(None) };
}

pub fn disconnect() {
    SSE_CONNECTION.with(|slot| {
        if let Some(connection) = slot.borrow_mut().take() {
            connection.close();
        }
    });
}

/// Subscribe to `/api/events` and fold every change into `sync`.
/// `on_resync` runs when the server asks for a full reload, and after a reconnect.
pub fn connect(
    sync: RwSignal<LeaderboardSync>,
    connection: RwSignal<ConnectionStatus>,
    on_resync: impl Fn() + Clone + 'static,
) {
    connection.set(ConnectionStatus::Connecting);

    let es = match EventSource::new("/api/events") {
        Ok(es) => es,
        Err(_) => {
            connection.set(ConnectionStatus::Reconnecting);
            return;
        }
    };

    let conn = connection;
    let resync = on_resync.clone();
    let on_open = Closure::<dyn Fn()>::new(move || {
        // Changes made while disconnected were never delivered.
        if conn.get_untracked() == ConnectionStatus::Reconnecting {
            resync();
        }
        conn.set(ConnectionStatus::Live);
    });
    es.set_onopen(Some(on_open.as_ref().unchecked_ref()));

    let change_handler = Closure::<dyn Fn(MessageEvent)>::new(move |e: MessageEvent| {
        let Some(data) = e.data().as_string() else {
            return;
        };
        let event = match serde_json::from_str::<ChangeEvent>(&data) {
            Ok(event) => event,
            Err(err) => {
                web_sys::console::warn_1(&format!("dropping malformed change event: {err}").into());
                return;
            }
        };
        let needs_resync = sync
            .try_update(|state| state.apply_change(event))
            .unwrap_or(false);
        if needs_resync {
            on_resync();
        }
    });
    for name in CHANGE_EVENT_NAMES {
        es.add_event_listener_with_callback(name, change_handler.as_ref().unchecked_ref())
            .ok();
    }

    let conn = connection;
    let on_error = Closure::<dyn Fn()>::new(move || {
        conn.set(ConnectionStatus::Reconnecting);
    });
    es.set_onerror(Some(on_error.as_ref().unchecked_ref()));

    // Replace any existing connection, ensuring handlers are unregistered cleanly.
    SSE_CONNECTION.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(old) = slot.take() {
            old.close();
        }
        *slot = Some(SseConnection {
            es,
            on_open,
            on_error,
            change_handler,
        });
    });
}
