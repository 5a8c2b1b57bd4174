use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::error::AssetError;
use crate::startup::AppContext;

const ASSETS_TAG: &str = "assets";

/// Stored blobs are user content and must never run scripts on this origin
const ASSET_CONTENT_SECURITY_POLICY: &str = "default-src 'none'; sandbox";

pub fn router() -> OpenApiRouter<Arc<AppContext>> {
    OpenApiRouter::new().routes(routes!(get_asset))
}

#[utoipa::path(
    get,
    path = "/{*key}",
    params(("key" = String, Path, description = "Storage key of the asset")),
    responses(
        (status = 200, description = "Asset content"),
        (status = 400, description = "Malformed asset key"),
        (status = 404, description = "Asset not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = ASSETS_TAG
)]
async fn get_asset(
    State(context): State<Arc<AppContext>>,
    Path(key): Path<String>,
) -> Result<Response, AssetError> {
    let asset = context
        .asset_storage
        .fetch_asset(&key)
        .await?
        .ok_or(AssetError::NotFound(key))?;

    Ok((
        [
            (header::CONTENT_TYPE, asset.content_type.as_str()),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (header::CONTENT_SECURITY_POLICY, ASSET_CONTENT_SECURITY_POLICY),
        ],
        asset.bytes,
    )
        .into_response())
}

impl IntoResponse for AssetError {
    fn into_response(self) -> Response {
        let status = match &self {
            AssetError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            AssetError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => {
                error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        status.into_response()
    }
}
