pub mod admin;
pub mod auth;
pub mod cookies;
pub mod dashboard;
pub mod queries;
pub mod sound;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router. Every non-`/auth`/`/ping`
/// route authenticates via the [`auth::Authed`] body extractor, which
/// runs before the handler body and rejects with `{success:false,
/// msg:"Access Denied"}` on any mismatch — there is no separate
/// middleware layer to apply, since the extractor itself is the guard.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(admin::ping))
        .route("/auth", post(auth::login))
        .route("/add_query", post(queries::add_query))
        .route("/edit_query", post(queries::edit_query))
        .route("/delete_query", post(queries::delete_query))
        .route("/get_query", post(queries::get_query))
        .route("/get_all_queries", post(queries::get_all_queries))
        .route("/get_dashboard", post(dashboard::get_dashboard))
        .route("/save", post(dashboard::save))
        .route("/clean", post(dashboard::clean))
        .route("/refresh_data", post(cookies::refresh_data))
        .route("/get_sound", post(sound::get_sound))
        .route("/reload_config", post(admin::reload_config))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
