//! Google OAuth sign-in.
//!
//! Produces the consent URL and exchanges an authorization code for an
//! access token plus the user's profile. The resulting access token is the
//! [`Credential`](drive_recall_core::source::Credential) later passed to
//! ingest and file listing.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::OAuthConfig;

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// A signed-in user, as returned to the presentation layer.
#[derive(Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub access_token: String,
}

impl std::fmt::Debug for UserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSession")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("access_token", &"***")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    picture: Option<String>,
}

/// OAuth client for Google accounts.
pub struct GoogleIdentity {
    client: reqwest::Client,
    config: OAuthConfig,
    client_secret: String,
}

impl GoogleIdentity {
    pub fn new(config: &OAuthConfig, client_secret: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
            client_secret: client_secret.into(),
        })
    }

    /// Create the client with the secret from `GOOGLE_CLIENT_SECRET`.
    pub fn from_env(config: &OAuthConfig) -> Result<Self> {
        let secret = std::env::var("GOOGLE_CLIENT_SECRET")
            .map_err(|_| anyhow!("GOOGLE_CLIENT_SECRET environment variable not set"))?;
        Self::new(config, secret)
    }

    /// Consent page URL requesting offline Drive read access.
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let scope = SCOPES.join(" ");
        let url = Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .context("invalid oauth.auth_url")?;
        Ok(url.into())
    }

    /// Exchange an authorization code for a session.
    pub async fn exchange_code(&self, code: &str) -> Result<UserSession> {
        if code.trim().is_empty() {
            bail!("authorization code is empty");
        }

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| anyhow!("token request failed: {}", e.without_url()))?;
        if !response.status().is_success() {
            bail!("token endpoint returned {}", response.status());
        }
        let token: TokenResponse = response.json().await.context("invalid token response")?;

        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| anyhow!("userinfo request failed: {}", e.without_url()))?;
        if !response.status().is_success() {
            bail!("userinfo endpoint returned {}", response.status());
        }
        let info: UserInfo = response.json().await.context("invalid userinfo response")?;
        debug!(user = %info.id, "oauth code exchanged");

        Ok(UserSession {
            id: info.id,
            name: info.name,
            email: info.email,
            picture: info.picture,
            access_token: token.access_token,
        })
    }
}
