use axum::{
    routing::{get, post},
    Router,
};

pub mod account;
pub mod admin;
pub mod audit;
pub mod common;
pub mod customers;
pub mod inventory;
pub mod notifications;
pub mod parties;
pub mod purchases;
pub mod reports;
pub mod returns;
pub mod suppliers;
pub mod system;
pub mod workflows;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/inventory", inventory::router())
        .nest("/suppliers", suppliers::router())
        .nest("/customers", customers::router())
        .nest(
            "/purchases",
            purchases::router()
                .nest("/returns", returns::router())
                .nest("/workflows", workflows::router()),
        )
        .nest("/notifications", notifications::router())
        .nest("/audit", audit::router())
        .nest("/admin", admin::router())
        .nest("/reports", reports::router())
        .route("/account/password", post(account::change_password))
}
