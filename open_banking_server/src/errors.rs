use actix_web::{
    error::{JsonPayloadError, PathError, PayloadError, QueryPayloadError, ResponseError, UrlencodedError},
    http::{header::CONTENT_TYPE, StatusCode},
    HttpRequest,
    HttpResponse,
};
use log::error;
use open_banking_engine::traits::{AuditApiError, BankingApiError, ConsentApiError, OAuthApiError, TppApiError};
use thiserror::Error;

use crate::json_api::{ErrorDocument, JSON_API_MEDIA_TYPE};

/// The detail returned to callers in place of internal error text.
const GENERIC_INTERNAL_ERROR: &str = "An internal error occurred. Quote the x-fapi-interaction-id when reporting it.";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Request body is too large")]
    PayloadTooLarge,
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Could not read query string: {0}")]
    InvalidQuery(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    NoRecordFound(String),
    #[error("{0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    RateLimitExceeded(String),
}

impl ServerError {
    /// The `detail` member of the error object. Internal failures never leak their cause.
    pub fn detail(&self) -> String {
        if self.status_code().is_server_error() {
            GENERIC_INTERNAL_ERROR.to_string()
        } else {
            self.to_string()
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientScope(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::UNAUTHORIZED,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("💻️ {self}");
        }
        let body = ErrorDocument::new(status, self.detail());
        HttpResponse::build(status).insert_header((CONTENT_TYPE, JSON_API_MEDIA_TYPE)).json(body)
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("A valid bearer token is required")]
    Unauthenticated,
    #[error("Bearer token is invalid. {0}")]
    ValidationError(String),
    #[error("Bearer token has expired")]
    TokenExpired,
    #[error("A {0} token was presented where a different kind was expected")]
    WrongTokenUse(String),
    #[error("The x-tpp-id header is required")]
    MissingTpp,
    #[error("{0}")]
    TppRejected(String),
    #[error("Bearer token was issued to {issued_to}, not {presented_by}")]
    ClientMismatch { issued_to: String, presented_by: String },
    #[error("Insufficient scope. {0}")]
    InsufficientScope(String),
    #[error("Could not sign token. {0}")]
    SigningError(String),
}

impl From<TppApiError> for ServerError {
    fn from(e: TppApiError) -> Self {
        match e {
            TppApiError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            TppApiError::AlreadyExists(_) => Self::Conflict(e.to_string()),
            TppApiError::NotFound(_) | TppApiError::NotAuthorized(_) | TppApiError::Expired => {
                Self::AuthenticationError(AuthError::TppRejected(e.to_string()))
            },
            TppApiError::RateLimitExceeded { .. } => Self::RateLimitExceeded(e.to_string()),
            TppApiError::InvalidRegistration(_) => Self::BadRequest(e.to_string()),
        }
    }
}

impl From<ConsentApiError> for ServerError {
    fn from(e: ConsentApiError) -> Self {
        match e {
            ConsentApiError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            ConsentApiError::NotFound(_) => Self::NoRecordFound(e.to_string()),
            ConsentApiError::Unauthenticated => Self::AuthenticationError(AuthError::Unauthenticated),
            ConsentApiError::MissingTpp | ConsentApiError::UnknownTpp(_) | ConsentApiError::InvalidRequest(_) => {
                Self::BadRequest(e.to_string())
            },
            ConsentApiError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
            ConsentApiError::NoValidConsent(_) => Self::InsufficientPermissions(e.to_string()),
        }
    }
}

impl From<OAuthApiError> for ServerError {
    fn from(e: OAuthApiError) -> Self {
        match e {
            OAuthApiError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            OAuthApiError::InvalidRequest(_) | OAuthApiError::InvalidScope(_) | OAuthApiError::InvalidGrant(_) => {
                Self::BadRequest(e.to_string())
            },
            OAuthApiError::Tpp(e) => Self::from(e),
        }
    }
}

impl From<BankingApiError> for ServerError {
    fn from(e: BankingApiError) -> Self {
        match e {
            BankingApiError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            BankingApiError::NotFound(_) => Self::NoRecordFound(e.to_string()),
            BankingApiError::InvalidRequest(_) => Self::BadRequest(e.to_string()),
        }
    }
}

impl From<AuditApiError> for ServerError {
    fn from(e: AuditApiError) -> Self {
        Self::BackendError(e.to_string())
    }
}

//-----------------------------------------   Extractor error handlers   -----------------------------------------------
// Routed through `ServerError` so that malformed input gets the same envelope as every other failure.

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        JsonPayloadError::Overflow { .. }
        | JsonPayloadError::OverflowKnownLength { .. }
        | JsonPayloadError::Payload(PayloadError::Overflow) => ServerError::PayloadTooLarge.into(),
        err => ServerError::InvalidRequestBody(err.to_string()).into(),
    }
}

pub fn form_error_handler(err: UrlencodedError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        UrlencodedError::Overflow { .. } | UrlencodedError::Payload(PayloadError::Overflow) => {
            ServerError::PayloadTooLarge.into()
        },
        err => ServerError::InvalidRequestBody(err.to_string()).into(),
    }
}

/// Maps a failure to buffer the raw request body.
pub fn payload_error(err: &actix_web::Error) -> ServerError {
    match err.as_error::<PayloadError>() {
        Some(PayloadError::Overflow) => ServerError::PayloadTooLarge,
        _ => ServerError::InvalidRequestBody(err.to_string()),
    }
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ServerError::InvalidQuery(err.to_string()).into()
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    ServerError::InvalidRequestPath(err.to_string()).into()
}
