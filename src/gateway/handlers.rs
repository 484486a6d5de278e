//! Gateway route handlers
//!
//! Handlers only pick a dependency proxy and translate its [`Reply`]; they
//! never inspect downstream bodies beyond the aggregation route.

mod deliveries;
mod details;
mod health;
mod orders;
mod users;

pub use deliveries::*;
pub use details::*;
pub use health::*;
pub use orders::*;
pub use users::*;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::proxy::Reply;

/// Client response for a proxied call. A fallback surfaces as 500 with the
/// dependency's fallback body and nothing else.
pub fn relay(reply: Reply) -> Response {
    match reply {
        Reply::Success { status, body } => (status, Json(body)).into_response(),
        Reply::NotFound(body) => (StatusCode::NOT_FOUND, Json(body)).into_response(),
        Reply::Rejected { status, body } => (status, Json(body)).into_response(),
        Reply::Fallback(body) => (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relay_status_mapping() {
        let cases = [
            (
                Reply::Success {
                    status: StatusCode::CREATED,
                    body: json!({"id": 1}),
                },
                StatusCode::CREATED,
            ),
            (Reply::NotFound(json!({"error": "User not found"})), StatusCode::NOT_FOUND),
            (
                Reply::Rejected {
                    status: StatusCode::BAD_REQUEST,
                    body: json!({"error": "Email already exists"}),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                Reply::Fallback(json!({"error": "Users service temporarily unavailable"})),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (reply, expected) in cases {
            assert_eq!(relay(reply).status(), expected);
        }
    }
}
