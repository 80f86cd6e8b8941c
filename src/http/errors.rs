//! Translation of [`MarqueeError`] into HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use crate::error::MarqueeError;

const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

impl MarqueeError {
    /// Status code and `error` payload for this outcome.
    ///
    /// Internal failures get a generic message; their detail only goes to the log.
    fn status_and_payload(&self) -> (StatusCode, Value) {
        match self {
            MarqueeError::Validation(errors) => (StatusCode::UNPROCESSABLE_ENTITY, json!(errors)),
            MarqueeError::BadRequest(detail) => (StatusCode::BAD_REQUEST, json!(detail)),
            MarqueeError::NotFound => (
                StatusCode::NOT_FOUND,
                json!("the requested resource could not be found"),
            ),
            MarqueeError::EditConflict => (
                StatusCode::CONFLICT,
                json!("unable to update the record due to an edit conflict, please try again"),
            ),
            MarqueeError::DuplicateValue { field } => {
                let mut fields = Map::new();
                fields.insert(
                    field.to_string(),
                    json!(format!("a record with this {} already exists", field)),
                );
                (StatusCode::UNPROCESSABLE_ENTITY, Value::Object(fields))
            }
            MarqueeError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, json!("rate limit exceeded")),
            MarqueeError::InvalidClientIdentity(_)
            | MarqueeError::Transient(_)
            | MarqueeError::PasswordHash(_)
            | MarqueeError::Config(_)
            | MarqueeError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, json!(SERVER_ERROR_MESSAGE)),
        }
    }
}

impl IntoResponse for MarqueeError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            error!(error = %self, "Request failed");
        } else {
            debug!(error = %self, "Request rejected");
        }
        let (status, payload) = self.status_and_payload();
        (status, Json(json!({ "error": payload }))).into_response()
    }
}
