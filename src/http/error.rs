use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::domain::Error;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicateKey(_) => StatusCode::CONFLICT,
            Error::InvalidInput(_) | Error::InvalidAmount(_) | Error::SelfTransfer => {
                StatusCode::BAD_REQUEST
            }
            Error::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::TransactionFailure(_) | Error::StoreUnavailable(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
