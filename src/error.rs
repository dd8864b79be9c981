use crate::repository::RepoError;
use axum::{
    Json,
    extract::rejection::PathRejection,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

/// ViewError
///
/// Everything a public view can fail with. The not-found variants keep the detail for the
/// logs only: on the wire they all collapse into the same 404 body, so a caller cannot tell
/// a missing record from one hidden by the visibility rules.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("No published category with slug `{0}`")]
    CategoryNotFound(String),
    #[error("No visible post with id {0}")]
    PostNotFound(i64),
    #[error(transparent)]
    Repository(#[from] RepoError),
}

impl ViewError {
    pub fn status(&self) -> StatusCode {
        match self {
            ViewError::UnknownRoute(_)
            | ViewError::PathRejection(_)
            | ViewError::CategoryNotFound(_)
            | ViewError::PostNotFound(_) => StatusCode::NOT_FOUND,
            ViewError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == StatusCode::NOT_FOUND
    }
}

/// ErrorResponse
///
/// The JSON body of every error reply.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        let body = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
