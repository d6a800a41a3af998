use {
    crate::domain::error::EngineError,
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
};

/// Newtype over the domain error so the HTTP mapping lives in the adapter
/// layer. Only the non-webhook endpoints (checkout, admin refund) use this —
/// the webhook boundary never fails loudly.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            EngineError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                msg.clone(),
            ),
            EngineError::Signature(_) => (
                StatusCode::BAD_REQUEST,
                "signature_error",
                "invalid webhook signature".to_string(),
            ),
            EngineError::Provider(err) => {
                tracing::error!("provider error: {err}");
                (
                    StatusCode::BAD_GATEWAY,
                    "provider_error",
                    "upstream provider error".to_string(),
                )
            }
            EngineError::Delivery(err) => {
                tracing::error!("delivery error: {err}");
                (
                    StatusCode::BAD_GATEWAY,
                    "delivery_error",
                    "delivery failed".to_string(),
                )
            }
            EngineError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            EngineError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            EngineError::Config(err) => {
                tracing::error!("config error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
