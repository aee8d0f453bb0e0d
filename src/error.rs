use actix_multipart::MultipartError;
use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::classifier::ClassifierError;
use crate::models::ErrorResponse;

/// Everything that can go wrong while answering `POST /predict`.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("No image uploaded")]
    NoImage,

    #[error("No selected image")]
    EmptyFilename,

    #[error("Image exceeds the upload limit of {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Malformed upload: {0}")]
    Multipart(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("{0}")]
    Decode(#[from] image::ImageError),

    #[error("{0}")]
    Inference(#[from] ClassifierError),

    #[error("Prediction was interrupted")]
    Blocking,
}

impl From<MultipartError> for PredictError {
    fn from(e: MultipartError) -> Self {
        PredictError::Multipart(e.to_string())
    }
}

impl From<BlockingError> for PredictError {
    fn from(_: BlockingError) -> Self {
        PredictError::Blocking
    }
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::NoImage | PredictError::EmptyFilename | PredictError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            PredictError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            PredictError::ModelNotLoaded
            | PredictError::Decode(_)
            | PredictError::Inference(_)
            | PredictError::Blocking => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("predict failed: {self}");
        } else {
            log::warn!("predict rejected: {self}");
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
