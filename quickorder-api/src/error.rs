use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quickorder_catalog::ProductError;
use quickorder_core::{CoreError, RepositoryError};
use quickorder_order::{CartError, OrderError};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => Self::NotFoundError(format!("Not found: {}", what)),
            RepositoryError::Conflict(msg) => Self::ConflictError(msg),
            RepositoryError::Rejected(e) => e.into(),
            RepositoryError::Backend(e) => Self::Anyhow(anyhow::anyhow!(e)),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => Self::ValidationError(msg),
            CoreError::IdentityError(msg) => Self::AuthenticationError(msg),
            CoreError::InternalError(msg) => Self::InternalServerError(msg),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ItemNotFound(_) => Self::NotFoundError(err.to_string()),
            CartError::InvalidQuantity(_) | CartError::QuantityExceedsLimit(..) => {
                Self::ValidationError(err.to_string())
            }
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { .. } => Self::ConflictError(err.to_string()),
            _ => Self::ValidationError(err.to_string()),
        }
    }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        assert_eq!(status_of(CartError::InvalidQuantity(0).into()), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(CartError::ItemNotFound(Uuid::nil()).into()), StatusCode::NOT_FOUND);
        assert_eq!(status_of(OrderError::EmptyCart.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(OrderError::InvalidTransition { from: "completed".into(), to: "pending".into() }.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(RepositoryError::Conflict("dup".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(RepositoryError::from(CartError::ItemNotFound(Uuid::nil())).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CoreError::IdentityError("bad".into()).into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(anyhow::anyhow!("boom").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
