use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TransitError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("primary store quota exceeded: need {needed} bytes, quota {quota}")]
    QuotaExceeded { needed: u64, quota: u64 },

    #[error("both local stores rejected the write")]
    StorageFull,

    #[error("remote call attempted without a valid token or credential")]
    AuthRequired,

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("PDF build error: {0}")]
    Pdf(String),

    #[error("worker unavailable: {0}")]
    ChannelClosed(String),
}

/// Whether a failed operation is worth retrying against the same endpoint.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TransitError {
    fn is_retryable(&self) -> bool {
        match self {
            TransitError::Remote(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            TransitError::UpstreamStatus(code) => {
                code.is_server_error() || *code == StatusCode::TOO_MANY_REQUESTS
            }
            TransitError::Oauth2Token(_) => true,
            _ => false,
        }
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for TransitError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => TransitError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                TransitError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => {
                TransitError::Json(parse_err.into_inner())
            }
            RequestTokenError::Other(s) => TransitError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for TransitError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            TransitError::Validation(message) => {
                let body = ApiErrorBody {
                    code: "VALIDATION".to_string(),
                    message,
                };
                (StatusCode::BAD_REQUEST, body)
            }
            TransitError::NotFound(what) => {
                let body = ApiErrorBody {
                    code: "NOT_FOUND".to_string(),
                    message: format!("{what} not found"),
                };
                (StatusCode::NOT_FOUND, body)
            }
            TransitError::AuthRequired
            | TransitError::Oauth2Token(_)
            | TransitError::Oauth2Server { .. } => {
                let body = ApiErrorBody {
                    code: "AUTH_REQUIRED".to_string(),
                    message: "A valid remote token or credential is required.".to_string(),
                };
                (StatusCode::UNAUTHORIZED, body)
            }
            TransitError::StorageFull | TransitError::QuotaExceeded { .. } => {
                let body = ApiErrorBody {
                    code: "STORAGE_FULL".to_string(),
                    message: "Local storage rejected the write.".to_string(),
                };
                (StatusCode::INSUFFICIENT_STORAGE, body)
            }
            TransitError::Remote(_) | TransitError::UrlParse(_) => {
                let body = ApiErrorBody {
                    code: "REMOTE_UNAVAILABLE".to_string(),
                    message: "Remote service is unavailable.".to_string(),
                };
                (StatusCode::BAD_GATEWAY, body)
            }
            TransitError::UpstreamStatus(code) => {
                let (err_code, msg) = match code {
                    StatusCode::TOO_MANY_REQUESTS => ("RATE_LIMIT", "Remote rate limit exceeded."),
                    StatusCode::UNAUTHORIZED => ("AUTH_REQUIRED", "Remote authentication failed."),
                    StatusCode::FORBIDDEN => ("FORBIDDEN", "Remote permission denied."),
                    StatusCode::NOT_FOUND => ("NOT_FOUND", "Remote resource not found."),
                    _ => ("REMOTE_ERROR", "The remote service returned an error."),
                };
                (
                    code,
                    ApiErrorBody {
                        code: err_code.to_string(),
                        message: msg.to_string(),
                    },
                )
            }
            TransitError::Database(_)
            | TransitError::Json(_)
            | TransitError::Io(_)
            | TransitError::Pdf(_)
            | TransitError::ChannelClosed(_) => {
                let body = ApiErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };
        (
            status,
            Json(ApiErrorResponse {
                ok: false,
                error: error_body,
            }),
        )
            .into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub ok: bool,
    pub error: ApiErrorBody,
}
