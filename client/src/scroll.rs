/// Distance from the bottom of the page, in pixels, at which the next page is requested.
pub(crate) const LOAD_MORE_THRESHOLD_PX: f64 = 1000.0;

pub(crate) fn is_near_bottom(scroll_y: f64, viewport_height: f64, document_height: f64) -> bool {
    viewport_height + scroll_y >= document_height - LOAD_MORE_THRESHOLD_PX
}

/// `(scrollY, innerHeight, document scrollHeight)` for the current window.
pub(crate) fn window_metrics() -> Option<(f64, f64, f64)> {
    let window = web_sys::window()?;
    let scroll_y = window.scroll_y().ok()?;
    let inner_height = window.inner_height().ok()?.as_f64()?;
    let document_height = window.document()?.document_element()?.scroll_height() as f64;
    Some((scroll_y, inner_height, document_height))
}

pub(crate) fn scroll_to_top() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let options = web_sys::ScrollToOptions::new();
    options.set_top(0.0);
    options.set_behavior(web_sys::ScrollBehavior::Smooth);
    window.scroll_to_with_scroll_to_options(&options);
}
