//! Order submission and listing.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;

use crate::api::handlers::{
    ApiError, INTERNAL_SERVER_ERROR, INVALID_ORDER_NUMBER, INVALID_REQUEST_FORMAT,
};
use crate::auth::middleware::AuthUser;
use crate::luhn;
use crate::repository::RepositoryError;
use crate::AppState;

/// `POST /api/user/orders`: the body is the bare order number as text.
///
/// 202 queued for grading, 200 when this user already submitted the same
/// number, 409 when another user owns it, 422 on a checksum failure.
pub async fn load_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let order_id = std::str::from_utf8(&body)
        .map_err(|_| (StatusCode::BAD_REQUEST, INVALID_REQUEST_FORMAT))?
        .trim();

    match luhn::validate(order_id) {
        Err(_) => return Err((StatusCode::BAD_REQUEST, INVALID_REQUEST_FORMAT)),
        Ok(false) => return Err((StatusCode::UNPROCESSABLE_ENTITY, INVALID_ORDER_NUMBER)),
        Ok(true) => {}
    }

    match state.repo.load_order(order_id, user.user_id).await {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(RepositoryError::OrderOwnedBySelf) => Ok(StatusCode::OK),
        Err(RepositoryError::OrderOwnedByOther) => Err((StatusCode::CONFLICT, "")),
        Err(e) => {
            tracing::error!(
                user_id = user.user_id,
                order_id,
                "order submission failed: {}",
                e
            );
            Err((StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR))
        }
    }
}

/// `GET /api/user/orders`: oldest first; 204 when the user has none.
pub async fn get_orders(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let orders = state.repo.orders_for_user(user.user_id).await.map_err(|e| {
        tracing::error!(user_id = user.user_id, "order listing failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
    })?;

    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(orders).into_response())
}
