//! `/get_dashboard`, `/save`, `/clean`.

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::state::AppState;

use super::auth::Authed;
use super::queries::{ApiResult, EmptyBody};

/// `/get_dashboard`: run a scan, then return the snapshot.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Authed { username, body: _ }: Authed<EmptyBody>,
) -> Json<Value> {
    let Some(monitor) = state.registry.monitor(&username).await else {
        return Json(serde_json::json!({}));
    };
    let (snapshot, _msg) = monitor.scan().await;
    Json(serde_json::to_value(snapshot).unwrap_or(Value::Null))
}

pub async fn save(
    State(state): State<AppState>,
    Authed { username, body: _ }: Authed<EmptyBody>,
) -> Json<ApiResult> {
    let Some(monitor) = state.registry.monitor(&username).await else {
        return Json(ApiResult { success: false, msg: "no session".into() });
    };
    let (success, msg) = monitor.save().await;
    Json(ApiResult { success, msg })
}

pub async fn clean(
    State(state): State<AppState>,
    Authed { username, body: _ }: Authed<EmptyBody>,
) -> Json<ApiResult> {
    let Some(monitor) = state.registry.monitor(&username).await else {
        return Json(ApiResult { success: false, msg: "no session".into() });
    };
    let (success, msg) = monitor.clean_queries().await;
    Json(ApiResult { success, msg })
}
