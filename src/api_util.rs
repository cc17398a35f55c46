use crate::state_actor::StatusLogError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid status report: {0}")]
    BadReport(String),

    #[error(transparent)]
    StatusLog(#[from] StatusLogError),

    #[error("Failed to render status page: {0}")]
    Render(#[from] askama::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadReport(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::StatusLog(_) | Self::Render(_) => {
                error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
        .into_response()
    }
}
