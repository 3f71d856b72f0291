use axum::extract::FromRequest;
use serde::Serialize;

use crate::errors::AppError;

/// Status discriminator carried by every response body.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Fail,
}

/// `{"status": "fail", "message": ...}`
#[derive(Debug, Serialize)]
pub struct Failure {
    pub status: Outcome,
    pub message: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: Outcome::Fail,
            message: message.into(),
        }
    }
}

/// `{"status": "success", "message": ...}`
#[derive(Debug, Serialize)]
pub struct Accepted {
    pub status: Outcome,
    pub message: String,
}

impl Accepted {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: Outcome::Success,
            message: message.into(),
        }
    }
}

/// JSON body extractor whose rejections come out in the `fail` envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
