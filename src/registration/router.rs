use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::{
    entities::{ProfileImage, RegistrationInput},
    error::{RegistrationError, RegistrationErrorResponse},
    observer::RecordingObserver,
};
use crate::startup::AppContext;

const REGISTRATION_TAG: &str = "registration";

/// Multipart sign-up form
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct RegistrationForm {
    #[schema(example = "alice")]
    pub username: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    pub password: String,
    /// Profile picture, optional unless the server requires one
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub uid: String,
    #[schema(example = "alice")]
    pub display_name: Option<String>,
    /// Public URL of the stored profile picture
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[schema(example = "Account created")]
    pub message: String,
    /// Where the client should navigate next
    #[schema(example = "/login")]
    pub redirect: String,
}

pub fn router() -> OpenApiRouter<Arc<AppContext>> {
    OpenApiRouter::new().routes(routes!(post_registration))
}

#[utoipa::path(
    post,
    path = "/",
    request_body(content = RegistrationForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Account created and profile provisioned", body = RegistrationResponse),
        (status = 400, description = "Invalid input, email or password", body = RegistrationErrorResponse),
        (status = 409, description = "Email already in use or registration in progress", body = RegistrationErrorResponse),
        (status = 413, description = "Form exceeds the upload limit", body = RegistrationErrorResponse),
        (status = 502, description = "Account created but profile provisioning failed", body = RegistrationErrorResponse),
        (status = 504, description = "A backend step timed out", body = RegistrationErrorResponse),
        (status = 500, description = "Registration failed on server-side", body = RegistrationErrorResponse)
    ),
    tag = REGISTRATION_TAG
)]
async fn post_registration(
    State(context): State<Arc<AppContext>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<RegistrationResponse>), RegistrationError> {
    let input = read_registration_form(multipart).await?;
    let observer = RecordingObserver::new();

    let outcome = context
        .registration_service
        .register(input, &observer)
        .await?;

    let message = observer
        .last_notification()
        .map(|notification| notification.message)
        .unwrap_or_default();

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            uid: outcome.user.uid,
            display_name: outcome.user.display_name,
            photo_url: outcome.user.photo_url,
            created_at: outcome.profile.created_at,
            message,
            redirect: outcome.redirect,
        }),
    ))
}

async fn read_registration_form(
    mut multipart: Multipart,
) -> Result<RegistrationInput, RegistrationError> {
    let mut username = None;
    let mut email = None;
    let mut password = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("username") => username = Some(field.text().await.map_err(invalid_form)?),
            Some("email") => email = Some(field.text().await.map_err(invalid_form)?),
            Some("password") => password = Some(field.text().await.map_err(invalid_form)?),
            Some("image") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(invalid_form)?;

                // Browsers send an empty part when no file was picked
                if !bytes.is_empty() {
                    image = Some(ProfileImage::new(bytes.to_vec(), content_type, file_name));
                }
            }
            _ => {}
        }
    }

    Ok(RegistrationInput {
        username: username.ok_or_else(|| missing_field("username"))?,
        email: email.ok_or_else(|| missing_field("email"))?,
        password: password.ok_or_else(|| missing_field("password"))?,
        image,
    })
}

fn invalid_form(err: MultipartError) -> RegistrationError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return RegistrationError::PayloadTooLarge;
    }
    RegistrationError::InvalidInput(format!("malformed form data: {}", err.body_text()))
}

fn missing_field(name: &str) -> RegistrationError {
    RegistrationError::InvalidInput(format!("missing field {name}"))
}
