use anyhow::{Context, Result};
use axum::Router;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::middleware::{Next, from_fn};
use axum::response::IntoResponse;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::{
    OpenApi,
    openapi::{Info, OpenApiBuilder},
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::{assets, profiles, registration, settings::WebserverSettings, startup::AppContext};

#[derive(OpenApi)]
struct ApiDoc;

/// Builds the HTTP application with all routes and middlewares
pub fn app(context: Arc<AppContext>, settings: &WebserverSettings) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/registration", registration::router())
        .nest("/profiles", profiles::router())
        .nest("/assets", assets::router())
        .with_state(context)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(from_fn(error_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    let api = OpenApiBuilder::from(api)
        .info(Info::new("Storefront Registration API", env!("CARGO_PKG_VERSION")))
        .build();

    router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
}

pub async fn start(settings: &WebserverSettings, context: AppContext) -> Result<()> {
    let router = app(Arc::new(context), settings);

    let ip = settings
        .host
        .parse()
        .with_context(|| format!("Invalid webserver host {}", settings.host))?;
    let listener = TcpListener::bind(SocketAddr::new(ip, settings.port))
        .await
        .context("Binding webserver address")?;
    let server = axum::serve(listener, router.into_make_service());

    let socket_addr = server.local_addr()?;
    info!(
        "Starting webserver on {}:{}",
        settings.host,
        socket_addr.port()
    );

    server.await.context("Server error")?;

    Ok(())
}

async fn error_logging_middleware(request: Request<Body>, next: Next) -> impl IntoResponse {
    let path = request.uri().path().to_owned();
    let method = request.method().clone();

    let response = next.run(request).await;

    if !response.status().is_success() {
        let status = response.status();

        // Log error with context but without body
        tracing::error!(
            status = ?status,
            path = %path,
            method = %method,
            "Request error"
        );
    }

    response
}
