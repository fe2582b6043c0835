//! Balance, withdrawal, and withdrawal history.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::api::handlers::{
    ApiError, INSUFFICIENT_FUNDS, INTERNAL_SERVER_ERROR, INVALID_JSON, INVALID_ORDER_NUMBER,
    INVALID_REQUEST_FORMAT,
};
use crate::auth::middleware::AuthUser;
use crate::luhn;
use crate::models::WithdrawRequest;
use crate::repository::RepositoryError;
use crate::AppState;

/// `GET /api/user/balance`.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let balance = state.repo.balance(user.user_id).await.map_err(|e| {
        tracing::error!(user_id = user.user_id, "balance lookup failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
    })?;
    Ok(Json(balance).into_response())
}

/// `POST /api/user/balance/withdraw`: spends points against an order
/// number. The debit and the withdrawal record commit together or not at
/// all; 402 when the balance cannot cover the sum.
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: WithdrawRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(user_id = user.user_id, "rejected withdraw body: {}", e);
        (StatusCode::BAD_REQUEST, INVALID_JSON)
    })?;

    match luhn::validate(&request.order) {
        Err(_) | Ok(false) => {
            return Err((StatusCode::UNPROCESSABLE_ENTITY, INVALID_ORDER_NUMBER))
        }
        Ok(true) => {}
    }
    if request.sum <= Decimal::ZERO {
        return Err((StatusCode::BAD_REQUEST, INVALID_REQUEST_FORMAT));
    }

    match state
        .repo
        .withdraw(&request.order, user.user_id, request.sum)
        .await
    {
        Ok(()) => {
            tracing::info!(
                user_id = user.user_id,
                order = %request.order,
                sum = %request.sum,
                "withdrawal processed"
            );
            Ok(StatusCode::OK)
        }
        Err(RepositoryError::InsufficientFunds) => {
            Err((StatusCode::PAYMENT_REQUIRED, INSUFFICIENT_FUNDS))
        }
        Err(e) => {
            tracing::error!(
                user_id = user.user_id,
                order = %request.order,
                "withdrawal failed: {}",
                e
            );
            Err((StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR))
        }
    }
}

/// `GET /api/user/balance/withdrawals`: oldest first; 204 when none.
pub async fn get_withdrawals(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let withdrawals = state
        .repo
        .withdrawals_for_user(user.user_id)
        .await
        .map_err(|e| {
            tracing::error!(user_id = user.user_id, "withdrawal listing failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
        })?;

    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(withdrawals).into_response())
}
