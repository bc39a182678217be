//! Gateway-local error taxonomy. The Monitor's own public contract
//! deliberately stays `(bool, String)` pairs rather than this type;
//! this exists for the handful of places the HTTP layer itself can
//! fail before ever reaching a Monitor method (bad config, storage
//! I/O at bootstrap, malformed startup state).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("domain: {0}")]
    Domain(#[from] vg_domain::Error),

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Io(_) | Error::Domain(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Json(_) | Error::Toml(_) => StatusCode::BAD_REQUEST,
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"success": false, "msg": self.to_string()}))).into_response()
    }
}
