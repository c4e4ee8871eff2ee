use crate::errors::ServerError;
use astra::{Body, Response, ResponseBuilder};
use serde_json::json;
use tracing::{error, warn};

/// Convert a ServerError into a JSON error response
pub fn error_to_response(err: ServerError) -> Response {
    let status = err.status();
    if status >= 500 {
        error!(error = %err, "Request failed");
    } else {
        warn!(status, error = %err, "Request rejected");
    }

    let message = match &err {
        ServerError::NotFound => "Not Found".to_string(),
        ServerError::BadRequest(msg) => msg.clone(),
        // Internal details stay in the log.
        _ => "Internal Server Error".to_string(),
    };

    json_error_response(status, &message)
}

/// Build a `{"error": ...}` body
pub fn json_error_response(status: u16, message: &str) -> Response {
    let body = json!({ "error": message }).to_string();

    ResponseBuilder::new()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(body.clone()))
        .unwrap_or_else(|_| Response::new(Body::from(body)))
}
