//! Thin HTTP/JSON client over the gateway's `/auth`, `/add_query`,
//! `/edit_query`, `/delete_query`, `/get_all_queries`, `/get_dashboard`,
//! `/save`, `/clean`, `/refresh_data` endpoints (spec.md §6).
//!
//! Pure I/O: this crate holds no scheduling or validation logic of its
//! own — every decision already happened server-side in the Monitor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub struct Client {
    http: reqwest::Client,
    base_url: String,
    username: String,
    token: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiResult {
    pub success: bool,
    pub msg: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub token: String,
    pub auth_success: bool,
}

impl Client {
    pub fn new(base_url: String, username: String, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            username,
            token,
        }
    }

    /// `/auth` {username, password} -> {username, token, auth_success}.
    /// Free function rather than a method: no token exists yet.
    pub async fn login(base_url: &str, username: &str, password: &str) -> anyhow::Result<LoginResponse> {
        let http = reqwest::Client::new();
        let resp: LoginResponse = http
            .post(format!("{base_url}/auth"))
            .json(&LoginRequest { username, password })
            .send()
            .await?
            .json()
            .await?;
        Ok(resp)
    }

    /// Envelope every authenticated request body with `{username, token,
    /// ...fields}`, matching the gateway's `Authed<T>` extractor.
    fn envelope(&self, mut body: Map<String, Value>) -> Value {
        body.insert("username".into(), self.username.clone().into());
        body.insert("token".into(), self.token.clone().into());
        Value::Object(body)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: Map<String, Value>,
    ) -> anyhow::Result<T> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(&self.envelope(body))
            .send()
            .await?
            .json::<T>()
            .await?;
        Ok(resp)
    }

    pub async fn add_query(&self, fields: Map<String, Value>) -> anyhow::Result<ApiResult> {
        self.post_json("/add_query", fields).await
    }

    pub async fn edit_query(&self, fields: Map<String, Value>) -> anyhow::Result<ApiResult> {
        self.post_json("/edit_query", fields).await
    }

    pub async fn delete_query(&self, uid: &str) -> anyhow::Result<ApiResult> {
        let mut body = Map::new();
        body.insert("uid".into(), uid.into());
        self.post_json("/delete_query", body).await
    }

    pub async fn get_all_queries(&self) -> anyhow::Result<HashMap<String, Value>> {
        self.post_json("/get_all_queries", Map::new()).await
    }

    /// `/get_dashboard`: triggers a scan server-side, returns the
    /// post-scan snapshot.
    pub async fn get_dashboard(&self) -> anyhow::Result<HashMap<String, Value>> {
        self.post_json("/get_dashboard", Map::new()).await
    }

    pub async fn save(&self) -> anyhow::Result<ApiResult> {
        self.post_json("/save", Map::new()).await
    }

    pub async fn clean(&self) -> anyhow::Result<ApiResult> {
        self.post_json("/clean", Map::new()).await
    }

    pub async fn refresh_cookies(
        &self,
        cookies: HashMap<String, HashMap<String, String>>,
    ) -> anyhow::Result<ApiResult> {
        let mut body = Map::new();
        body.insert("cookies".into(), serde_json::to_value(cookies)?);
        self.post_json("/refresh_data", body).await
    }
}
