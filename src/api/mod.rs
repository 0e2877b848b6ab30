//! HTTP surface over the cart engine.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{CartItemRequest, CartQuery, MergeRequest, RemoveItemRequest, USER_ID_HEADER};

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::CartEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CartEngine>,
}

impl AppState {
    pub fn new(engine: CartEngine) -> Self { Self { engine: Arc::new(engine) } }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/v1/cart",
            get(handlers::get_cart)
                .post(handlers::add_to_cart)
                .put(handlers::update_cart_item)
                .delete(handlers::remove_cart_item),
        )
        .route("/api/v1/cart/merge", post(handlers::merge_cart))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}
