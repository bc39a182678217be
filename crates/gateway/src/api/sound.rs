//! `/get_sound`: streams binary sound bytes with a filename header.

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

use super::auth::Authed;

#[derive(serde::Deserialize)]
pub struct GetSoundBody {
    pub alert_sound: String,
}

pub async fn get_sound(
    State(state): State<AppState>,
    Authed { username, body }: Authed<GetSoundBody>,
) -> Response {
    let Some(monitor) = state.registry.monitor(&username).await else {
        return (StatusCode::NOT_FOUND, "no session").into_response();
    };

    match monitor.get_sound_file(&body.alert_sound) {
        Ok((bytes, filename)) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                "X-Sound-Filename",
                HeaderValue::from_str(&filename).unwrap_or_else(|_| HeaderValue::from_static("sound")),
            );
            headers.insert(
                axum::http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}
