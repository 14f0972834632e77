use std::net::SocketAddr;

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::auth::require_token;
use crate::config::{AppConfig, StorageConfig};
use crate::state::AppState;
use crate::{orders, products, reviews, users};

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(products::router())
        .merge(reviews::router())
        .merge(orders::router())
        .merge(users::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    let mut app = Router::new()
        .nest("/api/v1", api)
        .route("/health", get(|| async { "ok" }));

    if let StorageConfig::Local { root } = &state.config.storage {
        app = app.nest_service("/static", ServeDir::new(root));
    }

    app.with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
