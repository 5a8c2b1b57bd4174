use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::{entities::ProfileRecord, error::ProfileError};
use crate::startup::AppContext;

const PROFILES_TAG: &str = "profiles";

pub fn router() -> OpenApiRouter<Arc<AppContext>> {
    OpenApiRouter::new().routes(routes!(get_profile))
}

#[utoipa::path(
    get,
    path = "/{uid}",
    params(("uid" = String, Path, description = "Uid of the registered user")),
    responses(
        (status = 200, description = "Profile fetched successfully", body = ProfileRecord),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = PROFILES_TAG
)]
async fn get_profile(
    State(context): State<Arc<AppContext>>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, ProfileError> {
    context.profile_service.get_profile(&uid).await.map(Json)
}
