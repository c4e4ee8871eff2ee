// responses/json.rs
use crate::errors::{ResultResp, ServerError};
use astra::{Body, ResponseBuilder};
use serde::Serialize;

/// Serialize `body` as the JSON response.
pub fn json_response<T: Serialize + ?Sized>(status: u16, body: &T) -> ResultResp {
    let json = serde_json::to_vec(body).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize response body");
        ServerError::InternalError
    })?;

    let resp = ResponseBuilder::new()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(json))
        .map_err(|_| ServerError::InternalError)?;

    Ok(resp)
}
