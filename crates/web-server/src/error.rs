use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] database::DbError),
}

impl AppError {
    /// Cancellation-class failures (caller abort, operation timeout, pool
    /// acquire timeout) are client-retriable; everything else is a plain
    /// server fault.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(db_err) if db_err.is_cancellation() => StatusCode::REQUEST_TIMEOUT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::Database(db_err) if db_err.is_cancellation() => {
                tracing::warn!(error = ?db_err, "Request aborted by cancellation or timeout.");
                "The operation was cancelled before it could complete"
            }
            AppError::Database(db_err) => {
                tracing::error!(error = ?db_err, "Database error.");
                "An internal database error occurred"
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
            "details": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::DbError;

    async fn envelope_of(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn cancellation_maps_to_request_timeout() {
        let (status, body) = envelope_of(AppError::Database(DbError::Cancelled)).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["success"], serde_json::json!(false));
        assert!(body["error"].as_str().unwrap().contains("cancelled"));
        assert!(body["details"].as_str().is_some());
    }

    #[tokio::test]
    async fn other_database_failures_map_to_server_error() {
        let (status, body) = envelope_of(AppError::Database(DbError::ConnectionConfig(
            "DATABASE_URL must be set.".to_string(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], serde_json::json!(false));
        assert!(body["details"]
            .as_str()
            .unwrap()
            .contains("DATABASE_URL must be set."));
    }
}
