use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use pantry_auth::Session;
use pantry_core::config::PantryConfig;
use pantry_core::error::PantryError;

/// Authenticated HTTP client for the storefront API.
///
/// Cheap to clone; clones share the connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    api_url: url::Url,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(config: &PantryConfig, session: Arc<Session>) -> Result<Self, PantryError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(concat!("pantry/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PantryError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub(crate) fn url(&self, path: &str) -> String {
        let base = self.api_url.as_str().trim_end_matches('/');
        format!("{base}{path}")
    }

    /// Start a request carrying the session's bearer token.
    pub(crate) fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, PantryError> {
        let token = self
            .session
            .bearer_token()?
            .ok_or(PantryError::NotAuthenticated)?;
        Ok(self.client.request(method, self.url(path)).bearer_auth(token))
    }

    /// Start a request without credentials (login).
    pub(crate) fn anonymous(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    pub(crate) async fn send(request: RequestBuilder) -> Result<Response, PantryError> {
        let resp = request
            .send()
            .await
            .map_err(|e| PantryError::transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(PantryError::ApiError {
                status,
                message: error_message(&body),
            });
        }
        Ok(resp)
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        request: RequestBuilder,
    ) -> Result<T, PantryError> {
        let resp = Self::send(request).await?;
        resp.json().await.map_err(|e| PantryError::ApiError {
            status: 0,
            message: format!("JSON parse error: {e}"),
        })
    }
}

/// Pull `message` out of the backend's `{ "message": ... }` error bodies.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantry_auth::MemoryStore;

    #[test]
    fn test_error_message_prefers_json_message() {
        assert_eq!(error_message(r#"{"message":"Product not found"}"#), "Product not found");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let mut config = PantryConfig::default();
        config.api_url = url::Url::parse("https://shop.example.com/api/").unwrap();
        let session = Arc::new(Session::new(Arc::new(MemoryStore::new()), "k"));
        let client = ApiClient::new(&config, session).unwrap();
        assert_eq!(client.url("/wishlist"), "https://shop.example.com/api/wishlist");
    }

    #[test]
    fn test_authed_without_token_is_not_authenticated() {
        let session = Arc::new(Session::new(Arc::new(MemoryStore::new()), "k"));
        let client = ApiClient::new(&PantryConfig::default(), session).unwrap();
        let err = client.authed(Method::GET, "/wishlist").unwrap_err();
        assert!(matches!(err, PantryError::NotAuthenticated));
    }
}
