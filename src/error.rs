// Error types for the Emotion Overlay application

use thiserror::Error;

/// Alert shown when the endpoint field does not look like an HTTP URL
pub const INVALID_URL_ALERT: &str = "Please enter a valid API URL";

/// Alert shown when the camera cannot be opened
pub const CAMERA_ALERT: &str =
    "Failed to access camera. Please grant permissions or check your device.";

/// Alert shown when a single poll fails anywhere between capture and response parsing
pub const FRAME_ALERT: &str =
    "Error processing frame. Make sure the API URL is correct and the backend is running.";

/// Main error type for the Emotion Overlay application
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Invalid endpoint URL: {0:?}")]
    InvalidEndpoint(String),

    #[error("Camera initialization failed: {0}")]
    CameraInit(String),

    #[error("Frame capture failed: {0}")]
    FrameCapture(String),

    #[error("Image encoding error: {0}")]
    Encode(#[from] image::ImageError),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Request task ended without a result")]
    Aborted,

    #[error("Response decoding failed: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OverlayError {
    /// User-facing alert text for this error
    pub fn alert_message(&self) -> &'static str {
        match self {
            OverlayError::InvalidEndpoint(_) => INVALID_URL_ALERT,
            OverlayError::CameraInit(_) => CAMERA_ALERT,
            OverlayError::Config(_) | OverlayError::Io(_) => "Failed to load configuration.",
            OverlayError::FrameCapture(_)
            | OverlayError::Encode(_)
            | OverlayError::Http(_)
            | OverlayError::Aborted
            | OverlayError::Decode(_) => FRAME_ALERT,
        }
    }
}

/// Result type alias for Emotion Overlay operations
pub type Result<T> = std::result::Result<T, OverlayError>;

// Conversion from nokhwa errors
impl From<nokhwa::NokhwaError> for OverlayError {
    fn from(err: nokhwa::NokhwaError) -> Self {
        match err {
            nokhwa::NokhwaError::StructureError { structure, error } => {
                OverlayError::CameraInit(format!("{structure}: {error}"))
            }
            nokhwa::NokhwaError::OpenDeviceError(device, error) => {
                OverlayError::CameraInit(format!("Device {device}: {error}"))
            }
            nokhwa::NokhwaError::GetPropertyError { property, error } => {
                OverlayError::CameraInit(format!("Property {property}: {error}"))
            }
            _ => OverlayError::CameraInit(err.to_string()),
        }
    }
}

// Conversion from ureq errors, non-2xx statuses included
impl From<ureq::Error> for OverlayError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => {
                OverlayError::Http(format!("endpoint returned status {status}"))
            }
            other => OverlayError::Http(other.to_string()),
        }
    }
}
