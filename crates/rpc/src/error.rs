use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tales::TaleError;
use tracing::{error, warn};

/// REST-boundary error: a `TaleError` rendered as the JSON error body
/// the API contract promises.
#[derive(Debug)]
pub struct ApiError(pub TaleError);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    message: String,
}

impl From<TaleError> for ApiError {
    fn from(err: TaleError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.0.status_code();
        let message = self.0.to_string();

        // 5xx means something we did not expect; 4xx is the caller's problem
        if status_code >= 500 {
            error!("Request failed with {}: {}", status_code, message);
        } else {
            warn!("Request rejected with {}: {}", status_code, message);
        }

        let status = StatusCode::from_u16(status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            Json(ErrorBody {
                status_code,
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_http_statuses() {
        let cases = [
            (TaleError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (TaleError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (TaleError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                TaleError::OnChainFailure("x".into()),
                StatusCode::EXPECTATION_FAILED,
            ),
            (
                TaleError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
