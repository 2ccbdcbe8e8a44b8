use axum::{
    routing::{delete, get, post},
    Router,
};

pub mod products;
pub mod system;
pub mod users;

/// Routes reachable without a token: sign-in, registration and the storefront.
pub fn public_router() -> Router {
    Router::new()
        .route("/api/users/authenticate", post(users::authenticate))
        .route("/api/users", post(users::register))
        .route("/api/products/public/:language_id", get(products::public_paging))
}

/// Back-office routes; wrapped by the auth middleware.
pub fn protected_router() -> Router {
    Router::new()
        .route("/api/whoami", get(system::whoami))
        .route("/api/users/paging", get(users::paging))
        .route("/api/users/:id", get(users::get_by_id).put(users::update))
        .route("/api/products", post(products::create).put(products::update))
        .route("/api/products/paging", get(products::manage_paging))
        .route("/api/products/:product_id", delete(products::delete))
        // Second segment: language id for GET, new price for PATCH.
        .route(
            "/api/products/:product_id/:value",
            get(products::get_by_id).patch(products::update_price),
        )
}
