use axum::{Json, http::StatusCode, response::IntoResponse};
use gallery::{app::AppError, storage::StorageError};
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    App(AppError),

    BadRequest(String),
}

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        ApiError::App(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
            status: u16,
        }

        let (status, message) = match self {
            ApiError::App(app_error) => match app_error {
                AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
                AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
                AppError::Conflict(message) => (StatusCode::CONFLICT, message),
                AppError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
                AppError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
                AppError::Storage(storage_error) => match storage_error {
                    StorageError::UnsupportedFile { kind } => (
                        StatusCode::BAD_REQUEST,
                        format!(
                            "Unsupported file type: {}",
                            kind.map(|k| k.mime_type()).unwrap_or("unknown")
                        ),
                    ),
                    StorageError::Image(image_error) => (
                        StatusCode::BAD_REQUEST,
                        format!("Invalid image: {image_error}"),
                    ),
                    StorageError::FileNotFound { file_name } => (
                        StatusCode::NOT_FOUND,
                        format!("File not found: {file_name}"),
                    ),
                    StorageError::Io(error) => {
                        tracing::error!(error = %error, "storage failure");
                        internal()
                    }
                },
                AppError::Upstream(error) => {
                    tracing::error!(error = %error, "image search API failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to fetch images from the image search API".to_string(),
                    )
                }
                AppError::Database(error) => {
                    tracing::error!(error = %error, "database failure");
                    internal()
                }
                AppError::Auth(error) => {
                    tracing::error!(error = %error, "authentication failure");
                    internal()
                }
            },
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };

        (
            status,
            Json(ErrorResponse {
                message,
                status: status.as_u16(),
            }),
        )
            .into_response()
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}
