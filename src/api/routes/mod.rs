use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::auth::middleware::auth_middleware;
use crate::AppState;

/// Routes mounted under `/api/user`. Register and login are public;
/// everything else requires a valid session cookie.
pub fn create_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let protected_routes = Router::new()
        .route(
            "/orders",
            post(handlers::order::load_order).get(handlers::order::get_orders),
        )
        .route("/balance", get(handlers::balance::get_balance))
        .route("/balance/withdraw", post(handlers::balance::withdraw))
        .route(
            "/balance/withdrawals",
            get(handlers::balance::get_withdrawals),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new().merge(public_routes).merge(protected_routes)
}
