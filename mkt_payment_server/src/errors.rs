use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use mkt_payment_engine::OrderFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("{0} payments are not available on this server.")]
    ProviderNotConfigured(String),
    #[error("The payment provider could not be reached. Please try again later.")]
    UpstreamError,
    #[error("Authentication Error. {0}")]
    AuthenticationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Conflict. {0}")]
    Conflict(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UpstreamError => StatusCode::BAD_GATEWAY,
            Self::ProviderNotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::ValidationError(s) => Self::InvalidRequestBody(s),
            OrderFlowError::NotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::Conflict(s) => Self::Conflict(s),
            OrderFlowError::InsufficientStock { .. } => Self::Conflict(e.to_string()),
            // The provider's own message is logged where it happens. Buyers only see a generic message.
            OrderFlowError::UpstreamError(_) => Self::UpstreamError,
            OrderFlowError::PersistenceError(s) => Self::BackendError(s),
            OrderFlowError::ConfigurationError(p) => Self::ProviderNotConfigured(p),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        let cases = [
            (OrderFlowError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (OrderFlowError::NotFound("Listing l".into()), StatusCode::NOT_FOUND),
            (OrderFlowError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                OrderFlowError::InsufficientStock { listing_id: "l".into(), requested: 2, available: 1 },
                StatusCode::CONFLICT,
            ),
            (OrderFlowError::UpstreamError("timeout".into()), StatusCode::BAD_GATEWAY),
            (OrderFlowError::PersistenceError("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (OrderFlowError::ConfigurationError("Coinbase".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (e, status) in cases {
            assert_eq!(ServerError::from(e).status_code(), status);
        }
    }

    #[test]
    fn upstream_details_are_not_leaked() {
        let e = ServerError::from(OrderFlowError::UpstreamError("api key abc123 rejected".into()));
        assert!(!e.to_string().contains("abc123"));
    }
}
