use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl From<shoplist_core::Error> for AppError {
    fn from(error: shoplist_core::Error) -> Self {
        use shoplist_core::Error as CoreError;

        match error {
            CoreError::NotFound(message) => Self::NotFound(message),
            CoreError::InvalidInput(message) | CoreError::MalformedResponse(message) => {
                Self::BadRequest(message)
            }
            CoreError::Serialization(error) => Self::BadRequest(error.to_string()),
            other => {
                tracing::error!("Request failed: {other}");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_status_codes() {
        let cases = [
            (shoplist_core::Error::NotFound("list".into()), StatusCode::NOT_FOUND),
            (shoplist_core::Error::InvalidInput("name".into()), StatusCode::BAD_REQUEST),
            (shoplist_core::Error::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(AppError::from(error).into_response().status(), expected);
        }
    }
}
