use gloo_net::http::Request;
use serde::de::DeserializeOwned;
use simpcity_shared::{Bootstrap, FetchError, MemberPage, RowSource, View};

/// Pages served by `GET /api/members/{view}`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HttpRowSource;

fn page_url(view: View, offset: u32, limit: u32) -> String {
    format!("/api/members/{}?offset={offset}&limit={limit}", view.as_str())
}

async fn get_json<T: DeserializeOwned>(url: &str) -> Result<T, FetchError> {
    let resp = Request::get(url)
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    if !resp.ok() {
        return Err(FetchError::Status(resp.status()));
    }

    resp.json::<T>()
        .await
        .map_err(|e| FetchError::Decode(e.to_string()))
}

impl RowSource for HttpRowSource {
    async fn fetch_page(
        &self,
        view: View,
        offset: u32,
        limit: u32,
    ) -> Result<MemberPage, FetchError> {
        get_json(&page_url(view, offset, limit)).await
    }
}

pub(crate) async fn fetch_bootstrap() -> Result<Bootstrap, FetchError> {
    get_json("/api/bootstrap").await
}
