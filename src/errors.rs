// errors.rs
use astra::Response;
use thiserror::Error;

use crate::domain::filter_spec::InvalidFilterSpecError;

/// Errors originating from either the server logic
/// (routing, missing resources, etc.) or downstream layers (DB, exports).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Database Error: {0}")]
    DbError(String),

    #[error("Spreadsheet Error: {0}")]
    XlsxError(String),

    #[error("Internal Server Error")]
    InternalError,
}

impl ServerError {
    pub fn status(&self) -> u16 {
        match self {
            ServerError::NotFound => 404,
            ServerError::BadRequest(_) => 400,
            ServerError::DbError(_)
            | ServerError::XlsxError(_)
            | ServerError::InternalError => 500,
        }
    }
}

/// An invalid filter is the caller's fault, so it always surfaces as a 400.
impl From<InvalidFilterSpecError> for ServerError {
    fn from(err: InvalidFilterSpecError) -> Self {
        ServerError::BadRequest(err.to_string())
    }
}

// Type alias commonly used by route handlers.
pub type ResultResp = Result<Response, ServerError>;
