use axum::routing::{get, post, put};
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/user", get(handlers::me))
        .route("/profile", put(handlers::update_profile))
        .route("/profile/photo", post(handlers::upload_photo))
        .route("/profile/password", put(handlers::update_password))
}
