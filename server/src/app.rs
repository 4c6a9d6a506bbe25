use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use simpcity_shared::PLACEHOLDER_AVATAR;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

use crate::config::STATIC_DIR;
use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let static_assets = Router::new()
        .fallback_service(
            ServeDir::new(STATIC_DIR)
                .precompressed_br()
                .precompressed_gzip(),
        )
        .layer(middleware::from_fn(set_static_cache_control));

    let app = Router::new()
        .route(
            "/api/leaderboard",
            get(routes::leaderboard::get_leaderboard),
        )
        .route("/api/members/{view}", get(routes::members::get_page))
        .route(
            "/api/stats/total-count",
            get(routes::members::get_total_count),
        )
        .route("/api/bootstrap", get(routes::members::get_bootstrap))
        .route("/api/events", get(routes::sse::change_events))
        .route("/api/health", get(routes::api::health))
        .route("/api/metrics", get(routes::api::metrics));

    app.layer(CompressionLayer::new())
        .fallback_service(static_assets)
        .with_state(state)
}

/// Files Trunk emits for the client bundle carry this prefix plus a content hash.
const CLIENT_BUNDLE_PREFIX: &str = "simpcity-client-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaticAsset {
    /// `index.html`. Revalidated so a deploy swaps in the new bundle names.
    Shell,
    /// Content-hashed wasm/js of the client bundle.
    Bundle,
    /// Avatar shown when a member has no profile picture.
    PlaceholderAvatar,
}

impl StaticAsset {
    fn classify(path: &str) -> Option<Self> {
        if path == "/" || path == "/index.html" {
            return Some(Self::Shell);
        }
        if path == PLACEHOLDER_AVATAR {
            return Some(Self::PlaceholderAvatar);
        }
        is_client_bundle(path).then_some(Self::Bundle)
    }

    fn cache_control(self) -> &'static str {
        match self {
            Self::Shell => "no-cache",
            Self::Bundle => "public, max-age=31536000, immutable",
            Self::PlaceholderAvatar => "public, max-age=86400",
        }
    }
}

async fn set_static_cache_control(request: Request, next: Next) -> Response {
    let asset = StaticAsset::classify(request.uri().path());
    let mut response = next.run(request).await;

    if response.status().is_success()
        && let Some(asset) = asset
    {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(asset.cache_control()),
        );
    }

    response
}

fn is_client_bundle(path: &str) -> bool {
    let Some(filename) = path.strip_prefix('/') else {
        return false;
    };
    let Some(rest) = filename.strip_prefix(CLIENT_BUNDLE_PREFIX) else {
        return false;
    };
    let Some((stem, ext)) = rest.rsplit_once('.') else {
        return false;
    };
    let hash = match ext {
        "js" => stem,
        "wasm" => stem.strip_suffix("_bg").unwrap_or(stem),
        _ => return false,
    };

    hash.len() >= 8 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::net::SocketAddr;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio::task::JoinHandle;
    use tower::ServiceExt;

    use super::*;

    pub(crate) async fn spawn_test_server(state: AppState) -> (SocketAddr, JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = build_app(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });
        (addr, handle)
    }

    fn cache_control_for_path(path: &str) -> Option<&'static str> {
        StaticAsset::classify(path).map(StaticAsset::cache_control)
    }

    #[test]
    fn client_bundle_is_cached_forever() {
        assert_eq!(
            cache_control_for_path("/simpcity-client-71578f6b278221f3_bg.wasm"),
            Some("public, max-age=31536000, immutable")
        );
        assert_eq!(
            cache_control_for_path("/simpcity-client-71578f6b278221f3.js"),
            Some("public, max-age=31536000, immutable")
        );
    }

    #[test]
    fn unhashed_or_foreign_bundles_get_no_override() {
        assert_eq!(cache_control_for_path("/simpcity-client.js"), None);
        assert_eq!(cache_control_for_path("/simpcity-client-nothex00.js"), None);
        assert_eq!(cache_control_for_path("/other-71578f6b278221f3.js"), None);
        assert_eq!(cache_control_for_path("/simpcity-client-71578f6b278221f3.css"), None);
    }

    #[test]
    fn placeholder_avatar_gets_a_day() {
        assert_eq!(
            cache_control_for_path("/placeholder.svg"),
            Some("public, max-age=86400")
        );
        assert_eq!(cache_control_for_path("/favicon.ico"), None);
    }

    #[test]
    fn html_shell_is_revalidated() {
        assert_eq!(cache_control_for_path("/"), Some("no-cache"));
        assert_eq!(cache_control_for_path("/index.html"), Some("no-cache"));
    }

    #[tokio::test]
    async fn unknown_api_path_falls_through_to_static_assets() {
        let app = build_app(AppState::new(None));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/does-not-exist")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
