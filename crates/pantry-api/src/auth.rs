use reqwest::Method;
use serde::{Deserialize, Serialize};

use pantry_core::error::PantryError;
use pantry_core::models::identity::Identity;

use crate::client::ApiClient;

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    user: Identity,
}

#[derive(Deserialize)]
struct MeResponse {
    user: Identity,
}

/// Account endpoints of the storefront API.
#[derive(Clone)]
pub struct AuthApi {
    api: ApiClient,
}

impl AuthApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Exchange credentials for a bearer token and begin the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, PantryError> {
        let request = self
            .api
            .anonymous(Method::POST, "/auth/login")
            .json(&LoginBody { email, password });
        let resp: LoginResponse = ApiClient::send_json(request).await?;
        self.api.session().begin(&resp.token, resp.user.clone())?;
        Ok(resp.user)
    }

    /// The user the stored token belongs to.
    pub async fn me(&self) -> Result<Identity, PantryError> {
        let request = self.api.authed(Method::GET, "/auth/me")?;
        let resp: MeResponse = ApiClient::send_json(request).await?;
        Ok(resp.user)
    }

    /// Resume a session from a previously stored token.
    ///
    /// Returns `Ok(false)` if there is no token, or if the server no longer
    /// accepts it; in the latter case the token is discarded.
    pub async fn restore(&self) -> Result<bool, PantryError> {
        let session = self.api.session();
        if session.bearer_token()?.is_none() {
            return Ok(false);
        }
        match self.me().await {
            Ok(user) => {
                session.resume(user);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("stored session rejected: {e}");
                session.end()?;
                Ok(false)
            }
        }
    }

    /// End the session locally and on the server.
    ///
    /// The local sign-out happens even if the server call fails.
    pub async fn logout(&self) -> Result<(), PantryError> {
        let remote = match self.api.authed(Method::POST, "/auth/logout") {
            Ok(request) => ApiClient::send(request).await.map(|_| ()),
            Err(PantryError::NotAuthenticated) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = &remote {
            tracing::warn!("server logout failed: {e}");
        }
        self.api.session().end()
    }
}
