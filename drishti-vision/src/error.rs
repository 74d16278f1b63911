//! Error types for drishti-vision

use drishti_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Inference error: {0}")]
    Inference(String),
}

impl From<VisionError> for CoreError {
    fn from(err: VisionError) -> Self {
        CoreError::Vision(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_error_display() {
        let err = VisionError::Decode("truncated payload".to_string());
        assert!(err.to_string().contains("Decode error"));
        assert!(err.to_string().contains("truncated payload"));
    }

    #[test]
    fn test_vision_error_to_core_error() {
        let err: CoreError = VisionError::Inference("session failed".to_string()).into();
        match err {
            CoreError::Vision(msg) => assert!(msg.contains("session failed")),
            _ => panic!("Expected Vision error"),
        }
    }
}
