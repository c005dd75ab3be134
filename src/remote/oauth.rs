use crate::config::{GOOGLE_AUTH_URL, GOOGLE_TOKEN_URI, SheetsConfig};
use crate::error::TransitError;

use chrono::{DateTime, Duration, Utc};
use oauth2::{
    AuthUrl, Client as OAuth2Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
    RefreshToken, StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenResponse,
    },
};
use tracing::info;

/// Offline refresh credential for the spreadsheet API.
#[derive(Debug, Clone)]
pub struct RefreshCredential {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// In-memory token state for the spreadsheet adapter. Held behind the
/// adapter's lock; constructed once per session from configuration.
#[derive(Debug, Clone, Default)]
pub struct SheetsCredential {
    pub access_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub refresh: Option<RefreshCredential>,
}

impl SheetsCredential {
    pub fn from_config(cfg: &SheetsConfig) -> Self {
        let refresh = match (&cfg.client_id, &cfg.client_secret, &cfg.refresh_token) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                Some(RefreshCredential {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    refresh_token: refresh_token.clone(),
                })
            }
            _ => None,
        };
        Self {
            access_token: cfg.access_token.clone(),
            expiry: None,
            refresh,
        }
    }

    /// An injected token without a known expiry is trusted until the remote
    /// rejects it with 401.
    pub fn token_is_fresh(&self) -> bool {
        match (&self.access_token, &self.expiry) {
            (Some(_), None) => true,
            (Some(_), Some(expiry)) => *expiry > Utc::now() + Duration::seconds(30),
            (None, _) => false,
        }
    }

    pub fn set_access_token(&mut self, token: String, expires_in_secs: Option<i64>) {
        self.access_token = Some(token);
        self.expiry = expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs));
    }

    pub fn invalidate(&mut self) {
        self.access_token = None;
        self.expiry = None;
    }

    /// Exchange the refresh token for a new access token and store it.
    pub async fn refresh_with(&mut self, http_client: &reqwest::Client) -> Result<(), TransitError> {
        let refresh = self.refresh.as_ref().ok_or(TransitError::AuthRequired)?;
        let token_result =
            SheetsOauthEndpoints::refresh_access_token(refresh, http_client).await?;
        let expires_in = token_result
            .expires_in()
            .map(|d| Duration::from_std(d).unwrap_or_else(|_| Duration::seconds(3600)));
        self.access_token = Some(token_result.access_token().secret().clone());
        self.expiry = expires_in.map(|d| Utc::now() + d);
        Ok(())
    }
}

/// Stateless OAuth endpoints for the spreadsheet token flow.
pub(super) struct SheetsOauthEndpoints;

impl SheetsOauthEndpoints {
    pub(super) async fn refresh_access_token(
        refresh: &RefreshCredential,
        http_client: &reqwest::Client,
    ) -> Result<BasicTokenResponse, TransitError> {
        let client = build_oauth2_client(refresh)?;
        let token_result: BasicTokenResponse = client
            .exchange_refresh_token(&RefreshToken::new(refresh.refresh_token.clone()))
            .request_async(http_client)
            .await?;
        info!("sheets access token refreshed successfully");
        Ok(token_result)
    }
}

/// Build the OAuth2 client from the refresh credential.
fn build_oauth2_client(refresh: &RefreshCredential) -> Result<SheetsOauth2Client, TransitError> {
    let client = OAuth2Client::new(ClientId::new(refresh.client_id.clone()))
        .set_client_secret(ClientSecret::new(refresh.client_secret.clone()))
        .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.as_str().to_string())?)
        .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URI.as_str().to_string())?);
    Ok(client)
}

pub(super) type SheetsOauth2Client = OAuth2Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_token_without_expiry_is_fresh() {
        let mut cred = SheetsCredential::default();
        assert!(!cred.token_is_fresh());
        cred.set_access_token("tok".to_string(), None);
        assert!(cred.token_is_fresh());
    }

    #[test]
    fn expired_token_is_stale() {
        let mut cred = SheetsCredential::default();
        cred.set_access_token("tok".to_string(), Some(-60));
        assert!(!cred.token_is_fresh());
        cred.invalidate();
        assert_eq!(cred.access_token, None);
    }
}
