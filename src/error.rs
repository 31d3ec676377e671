use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("{0}")]
    ClientInput(String),
    #[error("missing or invalid api key")]
    Auth,
    #[error("backend transport error: {0}")]
    BackendTransport(String),
    #[error("unexpected backend payload: {0}")]
    BackendSemantic(String),
}

impl ProxyError {
    pub fn client(msg: impl Into<String>) -> Self {
        ProxyError::ClientInput(msg.into())
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        ProxyError::BackendTransport(err.to_string())
    }

    pub fn semantic(err: impl std::fmt::Display) -> Self {
        ProxyError::BackendSemantic(err.to_string())
    }
}

impl ResponseError for ProxyError {
    fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::ClientInput(_) => StatusCode::BAD_REQUEST,
            ProxyError::Auth => StatusCode::FORBIDDEN,
            ProxyError::BackendTransport(_) | ProxyError::BackendSemantic(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            // The expected key must never leak into the response body.
            ProxyError::Auth => HttpResponse::Forbidden().finish(),
            _ => HttpResponse::build(self.status_code()).json(json!({
                "error": self.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ProxyError::client("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ProxyError::Auth.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ProxyError::transport("refused").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::semantic("missing field").status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_auth_response_has_empty_body() {
        use actix_web::body::MessageBody;
        let resp = ProxyError::Auth.error_response();
        let body = resp.into_body().try_into_bytes().unwrap();
        assert!(body.is_empty());
    }
}
