//! Cart route handlers.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use super::{ApiError, AppState};
use crate::domain::{Cart, GuestId, OwnerKey, ProductId, Size, UserId};
use crate::CartError;

/// Header the upstream auth layer sets to the signed-in user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartQuery {
    pub user_id: Option<String>,
    pub guest_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    #[validate(length(min = 1, max = 64))]
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub size: String,
    #[validate(length(max = 128))]
    pub guest_id: Option<String>,
    #[validate(length(max = 128))]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemRequest {
    #[validate(length(min = 1, max = 64))]
    pub product_id: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub size: String,
    #[validate(length(max = 128))]
    pub guest_id: Option<String>,
    #[validate(length(max = 128))]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    #[validate(length(min = 1, max = 128))]
    pub guest_id: String,
}

fn non_empty(value: Option<String>) -> Option<String> { value.filter(|v| !v.trim().is_empty()) }

fn owner_of(user_id: Option<String>, guest_id: Option<String>) -> Option<OwnerKey> {
    OwnerKey::from_parts(non_empty(user_id).map(UserId::new), non_empty(guest_id).map(GuestId::new))
}

fn authenticated_user(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(UserId::from)
        .ok_or(ApiError::Unauthorized)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "storefront-cart"}))
}

pub async fn get_cart(State(s): State<AppState>, Query(q): Query<CartQuery>) -> Result<Json<Cart>, ApiError> {
    let cart = s
        .engine
        .resolve(non_empty(q.user_id).map(UserId::new), non_empty(q.guest_id).map(GuestId::new))
        .await?
        .ok_or(CartError::CartNotFound)?;
    Ok(Json(cart))
}

/// Add a product. A caller with no ids yet gets a fresh guest cart.
pub async fn add_to_cart(State(s): State<AppState>, Json(r): Json<CartItemRequest>) -> Result<(StatusCode, Json<Cart>), ApiError> {
    r.validate()?;
    let owner = owner_of(r.user_id, r.guest_id).unwrap_or_else(|| OwnerKey::Guest(GuestId::generate()));
    let outcome = s.engine.add_item(&owner, &ProductId::new(r.product_id), &Size::new(r.size), r.quantity).await?;
    let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(outcome.cart)))
}

pub async fn update_cart_item(State(s): State<AppState>, Json(r): Json<CartItemRequest>) -> Result<Json<Cart>, ApiError> {
    r.validate()?;
    let owner = owner_of(r.user_id, r.guest_id).ok_or(ApiError::MissingOwner)?;
    let cart = s.engine.update_item(&owner, &ProductId::new(r.product_id), &Size::new(r.size), r.quantity).await?;
    Ok(Json(cart))
}

pub async fn remove_cart_item(State(s): State<AppState>, Json(r): Json<RemoveItemRequest>) -> Result<Json<Cart>, ApiError> {
    r.validate()?;
    let owner = owner_of(r.user_id, r.guest_id).ok_or(ApiError::MissingOwner)?;
    let cart = s.engine.remove_item(&owner, &ProductId::new(r.product_id), &Size::new(r.size)).await?;
    Ok(Json(cart))
}

pub async fn merge_cart(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<MergeRequest>) -> Result<Json<Cart>, ApiError> {
    let user_id = authenticated_user(&headers)?;
    r.validate()?;
    let cart = s.engine.merge(&GuestId::new(r.guest_id), &user_id).await?;
    Ok(Json(cart))
}
