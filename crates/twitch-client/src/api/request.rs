use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;

use super::*;

impl Default for TwitchApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TwitchApiClient {
    pub fn new() -> Self {
        Self::with_base_url(HELIX_BASE)
    }

    /// Point the client at another Helix-compatible host (e.g. the Twitch CLI mock server).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub(super) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Build auth headers from the given credentials.
    fn auth_headers(&self, credentials: &Credentials) -> Result<HeaderMap, TwitchError> {
        credentials.validate()?;
        let bearer = format!("Bearer {}", credentials.access_token);
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|_| TwitchError::MissingCredential("access_token"))?,
        );
        headers.insert(
            "Client-Id",
            HeaderValue::from_str(&credentials.client_id)
                .map_err(|_| TwitchError::MissingCredential("client_id"))?,
        );
        Ok(headers)
    }

    /// Execute a GET request with auth headers.
    pub(super) async fn authenticated_get(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<String, TwitchError> {
        let headers = self.auth_headers(credentials)?;
        let resp = self.http.get(url).headers(headers).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!(url, "Got 401, access token needs to be replaced");
        }
        if !status.is_success() {
            return Err(TwitchError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(body)
    }

    /// Execute a POST request with auth headers and JSON body.
    pub(super) async fn authenticated_post(
        &self,
        url: &str,
        credentials: &Credentials,
        body: &impl Serialize,
    ) -> Result<String, TwitchError> {
        let headers = self.auth_headers(credentials)?;
        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let resp_body = resp.text().await?;

        if !status.is_success() {
            return Err(TwitchError::ApiError {
                status: status.as_u16(),
                message: resp_body,
            });
        }

        Ok(resp_body)
    }

    /// Execute a DELETE request with auth headers.
    pub(super) async fn authenticated_delete(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<(), TwitchError> {
        let headers = self.auth_headers(credentials)?;
        let resp = self.http.delete(url).headers(headers).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            return Err(TwitchError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(())
    }
}
