//! `/reload_config` and `GET /ping`.

use axum::extract::State;
use axum::Json;
use subtle::ConstantTimeEq;

use crate::state::AppState;

use super::auth::Authed;
use super::queries::ApiResult;

#[derive(serde::Deserialize)]
pub struct ReloadConfigBody {
    pub passphrase: String,
}

/// Gates on a deployment-configured passphrase read once at startup.
/// If the configured environment variable is unset, this endpoint
/// permanently rejects — never falls back to a hard-coded default.
pub async fn reload_config(
    State(state): State<AppState>,
    Authed { username: _, body }: Authed<ReloadConfigBody>,
) -> Json<ApiResult> {
    let expected = match std::env::var(&state.config.admin.reload_passphrase_env) {
        Ok(v) if !v.is_empty() => v,
        _ => {
            return Json(ApiResult {
                success: false,
                msg: "reload passphrase is not configured".into(),
            })
        }
    };

    let candidate = body.passphrase.as_bytes();
    let ok = candidate.len() == expected.len() && candidate.ct_eq(expected.as_bytes()).into();
    if !ok {
        return Json(ApiResult {
            success: false,
            msg: "invalid passphrase".into(),
        });
    }

    state
        .registry
        .reload_config(state.config.captcha.keywords.clone())
        .await;
    Json(ApiResult {
        success: true,
        msg: "config reloaded".into(),
    })
}

pub async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({"success": true}))
}
