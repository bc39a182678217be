//! Query CRUD endpoints: `/add_query`, `/edit_query`, `/delete_query`,
//! `/get_query`, `/get_all_queries`. Each is a thin adapter over the
//! matching [`crate::monitor::Monitor`] method — no business logic
//! lives here.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::state::AppState;

use super::auth::Authed;

#[derive(Serialize)]
pub struct ApiResult {
    pub success: bool,
    pub msg: String,
}

fn unknown_user(username: &str) -> Json<ApiResult> {
    Json(ApiResult {
        success: false,
        msg: format!("no session for user \"{username}\""),
    })
}

pub async fn add_query(
    State(state): State<AppState>,
    Authed { username, body }: Authed<Map<String, Value>>,
) -> Json<ApiResult> {
    let Some(monitor) = state.registry.monitor(&username).await else {
        return unknown_user(&username);
    };
    let (success, msg) = monitor.add_query(body).await;
    Json(ApiResult { success, msg })
}

pub async fn edit_query(
    State(state): State<AppState>,
    Authed { username, body }: Authed<Map<String, Value>>,
) -> Json<ApiResult> {
    let Some(monitor) = state.registry.monitor(&username).await else {
        return unknown_user(&username);
    };
    let (success, msg) = monitor.edit_query(body).await;
    Json(ApiResult { success, msg })
}

#[derive(serde::Deserialize)]
pub struct UidBody {
    pub uid: String,
}

pub async fn delete_query(
    State(state): State<AppState>,
    Authed { username, body }: Authed<UidBody>,
) -> Json<ApiResult> {
    let Some(monitor) = state.registry.monitor(&username).await else {
        return unknown_user(&username);
    };
    let (success, msg) = monitor.delete_query(&body.uid).await;
    Json(ApiResult { success, msg })
}

pub async fn get_query(
    State(state): State<AppState>,
    Authed { username, body }: Authed<UidBody>,
) -> Json<Value> {
    let Some(monitor) = state.registry.monitor(&username).await else {
        return Json(serde_json::json!({"success": false, "msg": "no session"}));
    };
    match monitor.get_query(&body.uid).await {
        Some(q) => Json(serde_json::to_value(q).unwrap_or(Value::Null)),
        None => Json(serde_json::json!({"success": false, "msg": format!("unknown uid \"{}\"", body.uid)})),
    }
}

#[derive(serde::Deserialize)]
pub struct EmptyBody {}

pub async fn get_all_queries(
    State(state): State<AppState>,
    Authed { username, body: _ }: Authed<EmptyBody>,
) -> Json<Value> {
    let Some(monitor) = state.registry.monitor(&username).await else {
        return Json(serde_json::json!({}));
    };
    let queries = monitor.all_queries().await;
    Json(serde_json::to_value(queries).unwrap_or(Value::Null))
}
