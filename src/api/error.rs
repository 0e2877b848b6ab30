//! HTTP error mapping.
//!
//! Every handler returns `Result<T, ApiError>`. Client errors carry their
//! message; store failures are logged and answered with a generic one.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::CartError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Supply userId or guestId")]
    MissingOwner,

    #[error("Authentication required")]
    Unauthorized,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) => match err {
                CartError::InvalidQuantity | CartError::EmptyGuestCart => StatusCode::BAD_REQUEST,
                CartError::ProductNotFound(_)
                | CartError::CartNotFound
                | CartError::ItemNotFound(_)
                | CartError::NothingToMerge => StatusCode::NOT_FOUND,
                CartError::Conflict => StatusCode::CONFLICT,
                CartError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                CartError::OwnershipViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Validation(_) | Self::MissingOwner => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Server Error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LineKey, ProductId, Size};
    use crate::store::StoreError;

    fn status_of(err: impl Into<ApiError>) -> StatusCode { err.into().into_response().status() }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_of(CartError::InvalidQuantity), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(CartError::EmptyGuestCart), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(CartError::CartNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(CartError::NothingToMerge), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(CartError::ItemNotFound(LineKey::new(ProductId::from("A"), Size::from("M")))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(CartError::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_of(CartError::StoreUnavailable(StoreError::Unavailable("down".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of(ApiError::MissingOwner), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_display() {
        assert_eq!(ApiError::from(CartError::EmptyGuestCart).to_string(), "Guest cart is empty");
        assert_eq!(
            ApiError::from(CartError::ItemNotFound(LineKey::new(ProductId::from("A"), Size::from("M")))).to_string(),
            "Product not found in cart: A/M"
        );
    }
}
