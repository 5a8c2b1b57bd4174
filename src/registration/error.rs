use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

use crate::{account::error::AccountError, assets::error::AssetError, profiles::error::ProfileError};

/// Network-bound steps of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    CreateAccount,
    Upload,
    UpdateProfile,
    WriteRecord,
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Self::CreateAccount => "account creation",
            Self::Upload => "profile image upload",
            Self::UpdateProfile => "profile update",
            Self::WriteRecord => "profile record write",
        };
        f.write_str(step)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Invalid registration input: {0}")]
    InvalidInput(String),

    #[error("Registration form exceeds the upload limit")]
    PayloadTooLarge,

    #[error("A registration for this email is already in progress")]
    AlreadyInProgress,

    #[error("Account creation failed: {0}")]
    AuthCreation(AccountError),

    #[error("Profile image upload failed: {0}")]
    Upload(AssetError),

    #[error("Profile update failed: {0}")]
    ProfileUpdate(AccountError),

    #[error("Profile record write failed: {0}")]
    RecordWrite(ProfileError),

    #[error("{0} timed out")]
    Timeout(RegistrationStep),
}

impl RegistrationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::PayloadTooLarge => "payload_too_large",
            Self::AlreadyInProgress => "already_in_progress",
            Self::AuthCreation(_) => "auth_creation",
            Self::Upload(_) => "upload",
            Self::ProfileUpdate(_) => "profile_update",
            Self::RecordWrite(_) => "record_write",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Message shown to the user. Backend details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(reason) => format!("Please check your input: {reason}"),
            Self::PayloadTooLarge => "The profile image is too large".to_string(),
            Self::AlreadyInProgress => {
                "A sign-up for this email is already being processed".to_string()
            }
            Self::AuthCreation(AccountError::InvalidEmail) => {
                "Please enter a valid email address".to_string()
            }
            Self::AuthCreation(AccountError::WeakPassword(min_length)) => {
                format!("Password must be at least {min_length} characters long")
            }
            Self::AuthCreation(AccountError::EmailAlreadyInUse) => {
                "An account with this email already exists".to_string()
            }
            Self::AuthCreation(_) => "Could not create your account, please try again".to_string(),
            Self::Upload(_) => "Your account was created but the profile image could not be uploaded"
                .to_string(),
            Self::ProfileUpdate(_) | Self::RecordWrite(_) => {
                "Your account was created but the profile could not be saved".to_string()
            }
            Self::Timeout(step) => format!("The {step} took too long, please try again"),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_)
            | Self::AuthCreation(AccountError::InvalidEmail | AccountError::WeakPassword(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::AlreadyInProgress | Self::AuthCreation(AccountError::EmailAlreadyInUse) => {
                StatusCode::CONFLICT
            }
            Self::AuthCreation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upload(_) | Self::ProfileUpdate(_) | Self::RecordWrite(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationErrorResponse {
    /// Machine-readable failure kind
    #[schema(example = "auth_creation")]
    pub kind: String,
    pub message: String,
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let body = RegistrationErrorResponse {
            kind: self.kind().to_string(),
            message: self.user_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
