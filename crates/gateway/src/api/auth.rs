//! Body-based `{username, token}` authentication — an explicit
//! divergence from a bearer-header scheme, since every endpoint here
//! already carries a JSON body naming the acting user.

use axum::body::Body;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    username: String,
    token: String,
    #[serde(flatten)]
    body: T,
}

/// An authenticated request body of shape `T`, plus the username it
/// authenticated as.
pub struct Authed<T> {
    pub username: String,
    pub body: T,
}

#[derive(Serialize)]
pub struct ApiReject {
    pub success: bool,
    pub msg: String,
}

impl IntoResponse for ApiReject {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

fn access_denied() -> Response {
    ApiReject {
        success: false,
        msg: "Access Denied".to_string(),
    }
    .into_response()
}

#[async_trait::async_trait]
impl<T> FromRequest<AppState> for Authed<T>
where
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request<Body>, state: &AppState) -> Result<Self, Self::Rejection> {
        let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
            .await
            .map_err(|_| access_denied())?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes).map_err(|_| access_denied())?;

        if !state.registry.auth_user(&envelope.username, &envelope.token).await {
            return Err(access_denied());
        }

        Ok(Authed {
            username: envelope.username,
            body: envelope.body,
        })
    }
}

/// Unauthenticated request body for `/auth` itself.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[allow(dead_code)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub username: String,
    pub token: String,
    pub auth_success: bool,
}

/// `/auth` {username, password} -> {username, token, auth_success}.
///
/// Credential verification is treated as an external collaborator the
/// Monitor core never needs to know about; this gateway trusts any
/// non-blank username/password pair and mints (or returns) a session
/// token for an already-authenticated username. A real deployment
/// sits a credential service in front of this endpoint.
pub async fn login(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Json<LoginResponse> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Json(LoginResponse {
            username: req.username,
            token: String::new(),
            auth_success: false,
        });
    }

    let token = state.registry.login(req.username.trim()).await;
    Json(LoginResponse {
        username: req.username,
        token,
        auth_success: true,
    })
}
