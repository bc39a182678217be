//! `/refresh_data`: hand a freshly-harvested cookie map to storage
//! without mutating queries.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

use super::auth::Authed;
use super::queries::ApiResult;

#[derive(serde::Deserialize)]
pub struct RefreshDataBody {
    pub cookies: HashMap<String, HashMap<String, String>>,
}

pub async fn refresh_data(
    State(state): State<AppState>,
    Authed { username, body }: Authed<RefreshDataBody>,
) -> Json<ApiResult> {
    let Some(monitor) = state.registry.monitor(&username).await else {
        return Json(ApiResult { success: false, msg: "no session".into() });
    };
    let (success, msg) = monitor.reload_cookies(body.cookies).await;
    Json(ApiResult { success, msg })
}
