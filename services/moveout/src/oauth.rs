//! OAuth2 integration for the Google federated login path

use anyhow::Result;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::Deserialize;
use tracing::info;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// OAuth2 configuration for the Google provider
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl OAuthConfig {
    /// Create a new OAuthConfig from environment variables
    ///
    /// # Environment Variables
    /// - `GOOGLE_CLIENT_ID`: OAuth client id
    /// - `GOOGLE_CLIENT_SECRET`: OAuth client secret
    /// - `GOOGLE_REDIRECT_URI`: Callback URL registered with the provider
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("GOOGLE_CLIENT_ID environment variable not set"))?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET")
            .map_err(|_| anyhow::anyhow!("GOOGLE_CLIENT_SECRET environment variable not set"))?;
        let redirect_url = std::env::var("GOOGLE_REDIRECT_URI")
            .map_err(|_| anyhow::anyhow!("GOOGLE_REDIRECT_URI environment variable not set"))?;

        Ok(Self {
            client_id,
            client_secret,
            redirect_url,
        })
    }
}

/// OAuth2 client wrapper for Google
#[derive(Clone)]
pub struct OAuthClient {
    client: BasicClient,
}

impl OAuthClient {
    /// Create a new OAuth2 client for Google
    pub fn new_google(config: OAuthConfig) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(GOOGLE_AUTH_URL.to_string())?,
            Some(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?),
        )
        .set_redirect_uri(RedirectUrl::new(config.redirect_url)?);

        Ok(Self { client })
    }

    /// Generate the authorization URL the browser is redirected to
    pub fn generate_auth_url(&self) -> String {
        let (auth_url, _csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("profile".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .url();

        auth_url.to_string()
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(&self, code: String) -> Result<String> {
        info!("Exchanging authorization code for access token");

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(oauth2::reqwest::async_http_client)
            .await?;

        Ok(token_response.access_token().secret().clone())
    }

    /// Fetch the Google user profile with an access token
    pub async fn get_user_profile(&self, access_token: &str) -> Result<OAuthUserProfile> {
        info!("Fetching Google user profile");

        let client = reqwest::Client::new();
        let response = client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to get Google user profile: {}",
                response.status()
            ));
        }

        let google_user: GoogleUser = response.json().await?;
        Ok(OAuthUserProfile {
            email: google_user.email,
            verified_email: google_user.verified_email,
        })
    }
}

/// Google user profile response
#[derive(Debug, Deserialize)]
struct GoogleUser {
    email: String,
    #[serde(default)]
    verified_email: bool,
}

/// Profile fields the service needs from the provider
#[derive(Debug, Clone)]
pub struct OAuthUserProfile {
    pub email: String,
    pub verified_email: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient::new_google(OAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_url: "http://localhost:3000/api/auth/google/callback".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_auth_url_targets_google() {
        let url = client().generate_auth_url();
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("scope=profile+email"));
    }

    #[test]
    fn test_google_user_profile_parsing() {
        let profile: GoogleUser =
            serde_json::from_str(r#"{"id":"1","email":"a@x.com","verified_email":true}"#).unwrap();
        assert_eq!(profile.email, "a@x.com");
        assert!(profile.verified_email);
    }
}
