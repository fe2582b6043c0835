//! API Handlers
//!
//! Errors go out as plain-text bodies with fixed messages; everything the
//! client should not see is logged server-side with user/order context.

pub mod auth;
pub mod balance;
pub mod order;

use axum::http::StatusCode;

pub const INVALID_JSON: &str = "Invalid JSON";
pub const LOGIN_ALREADY_IN_USE: &str = "Login already in use";
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const INVALID_REQUEST_FORMAT: &str = "Invalid request format";
pub const INVALID_ORDER_NUMBER: &str = "Invalid order number";
pub const INSUFFICIENT_FUNDS: &str = "Insufficient funds";

/// Status plus plain-text body.
pub type ApiError = (StatusCode, &'static str);
