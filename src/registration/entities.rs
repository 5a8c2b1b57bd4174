use image::ImageFormat;
use std::fmt;
use tracing::debug;

use crate::{account::entities::AuthenticatedUser, profiles::entities::ProfileRecord};

/// Profile picture submitted with a registration
#[derive(Clone, PartialEq, Eq)]
pub struct ProfileImage {
    pub bytes: Vec<u8>,
    /// Type detected from the file's magic bytes, never the client's claim
    pub content_type: String,
    pub file_name: Option<String>,
}

impl ProfileImage {
    /// Builds an image from an upload. Only PNG, JPEG, GIF and WebP content is
    /// recognized; anything else is typed `application/octet-stream`.
    pub fn new(bytes: Vec<u8>, declared_type: Option<String>, file_name: Option<String>) -> Self {
        let content_type = sniff_content_type(&bytes).unwrap_or(OCTET_STREAM);

        if let Some(declared_type) = declared_type.as_deref() {
            if declared_type != content_type {
                debug!(declared_type, content_type, "declared image type ignored");
            }
        }

        Self {
            bytes,
            content_type: content_type.to_string(),
            file_name,
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type != OCTET_STREAM
    }

    /// File extension used for the storage key
    pub fn extension(&self) -> &str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

impl fmt::Debug for ProfileImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileImage")
            .field("bytes", &self.bytes.len())
            .field("content_type", &self.content_type)
            .field("file_name", &self.file_name)
            .finish()
    }
}

const OCTET_STREAM: &str = "application/octet-stream";

/// Raster formats accepted as profile pictures. Scriptable formats such as SVG
/// are never recognized.
fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

/// Sign-up form contents
#[derive(Clone)]
pub struct RegistrationInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image: Option<ProfileImage>,
}

impl fmt::Debug for RegistrationInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationInput")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("image", &self.image)
            .finish()
    }
}

/// Progress of a single registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Idle,
    Submitting,
    AuthFailed,
    AuthSucceeded,
    Uploading,
    UploadFailed,
    UploadSucceeded,
    Provisioning,
    ProvisionFailed,
    Provisioned,
}

impl RegistrationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::AuthFailed | Self::UploadFailed | Self::ProvisionFailed | Self::Provisioned
        )
    }

    pub fn is_failed(self) -> bool {
        self.is_terminal() && self != Self::Provisioned
    }

    pub fn can_transition_to(self, next: RegistrationState) -> bool {
        use RegistrationState::*;

        matches!(
            (self, next),
            (Idle, Submitting)
                | (Submitting, AuthFailed | AuthSucceeded)
                | (AuthSucceeded, Uploading | Provisioning)
                | (Uploading, UploadFailed | UploadSucceeded)
                | (UploadSucceeded, Provisioning)
                | (Provisioning, ProvisionFailed | Provisioned)
        )
    }
}

/// Result of a fully provisioned registration
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub user: AuthenticatedUser,
    pub profile: ProfileRecord,
    /// Where the client should go next
    pub redirect: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Toast-style message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}
