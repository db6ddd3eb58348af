use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::config::Config;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Failed to read token file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse token: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Not signed in or session expired")]
    TokenExpired,
    #[error("No refresh token available")]
    NoRefreshToken,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Provider(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenInfo {
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl TokenInfo {
    pub fn new(id_token: String, expires_in_seconds: i64) -> Self {
        Self {
            id_token,
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_seconds),
            token_type: "Bearer".to_string(),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: String) -> Self {
        self.refresh_token = Some(refresh_token);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn save_token(&self, token: &TokenInfo) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(token)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn load_token(&self) -> Result<TokenInfo, IdentityError> {
        let content = std::fs::read_to_string(&self.path)?;
        let token: TokenInfo = serde_json::from_str(&content)?;
        Ok(token)
    }

    pub fn clear(&self) -> Result<(), IdentityError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn needs_refresh(&self, token: &TokenInfo) -> bool {
        let buffer = chrono::Duration::minutes(5);
        token.expires_at <= Utc::now() + buffer
    }
}

/// Sign-in/sign-up payloads answer in camelCase with `expiresIn` as a
/// string of seconds.
#[derive(Debug, Deserialize)]
struct SignInResponse {
    #[serde(rename = "idToken")]
    id_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(rename = "expiresIn")]
    expires_in: String,
}

/// The token-refresh endpoint answers in snake_case instead.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: Option<String>,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

/// REST client for the identity provider. The rest of the crate never
/// sees credentials; it only receives a bearer token string.
pub struct IdentityClient {
    config: Config,
    storage: TokenStorage,
    client: reqwest::Client,
}

impl IdentityClient {
    pub fn new(config: Config) -> Self {
        let storage = TokenStorage::new(config.identity.token_cache.clone());
        Self {
            config,
            storage,
            client: reqwest::Client::new(),
        }
    }

    fn account_url(&self, action: &str) -> String {
        format!(
            "{}/v1/accounts:{}?key={}",
            self.config.identity.identity_url,
            action,
            urlencoding::encode(&self.config.identity.api_key)
        )
    }

    fn email_for(&self, username: &str) -> String {
        format!("{}{}", username, self.config.identity.email_domain)
    }

    pub async fn sign_in(&mut self, username: &str, password: &str) -> Result<TokenInfo, IdentityError> {
        self.credential_request("signInWithPassword", username, password)
            .await
    }

    pub async fn sign_up(&mut self, username: &str, password: &str) -> Result<TokenInfo, IdentityError> {
        self.credential_request("signUp", username, password).await
    }

    pub fn sign_out(&self) -> Result<(), IdentityError> {
        self.storage.clear()
    }

    async fn credential_request(
        &mut self,
        action: &str,
        username: &str,
        password: &str,
    ) -> Result<TokenInfo, IdentityError> {
        let body = serde_json::json!({
            "email": self.email_for(username),
            "password": password,
            "returnSecureToken": true,
        });

        tracing::info!("Identity request: {}", action);

        let response = self
            .client
            .post(self.account_url(action))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let payload: SignInResponse = response.json().await?;
        let expires_in = payload.expires_in.parse::<i64>().unwrap_or(3600);

        let mut token = TokenInfo::new(payload.id_token, expires_in);
        if let Some(refresh) = payload.refresh_token {
            token = token.with_refresh_token(refresh);
        }

        self.storage.save_token(&token)?;
        Ok(token)
    }

    pub async fn refresh_token(&mut self, token: &TokenInfo) -> Result<TokenInfo, IdentityError> {
        let refresh_token = token
            .refresh_token
            .as_ref()
            .ok_or(IdentityError::NoRefreshToken)?;

        let url = format!(
            "{}/v1/token?key={}",
            self.config.identity.token_url,
            urlencoding::encode(&self.config.identity.api_key)
        );

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];

        tracing::info!("Refreshing identity token");

        let response = self.client.post(url).form(&params).send().await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let payload: RefreshResponse = response.json().await?;
        let expires_in = payload.expires_in.parse::<i64>().unwrap_or(3600);

        let new_token = TokenInfo::new(payload.id_token, expires_in).with_refresh_token(
            payload
                .refresh_token
                .unwrap_or_else(|| refresh_token.clone()),
        );

        self.storage.save_token(&new_token)?;
        Ok(new_token)
    }

    /// Cached token if still valid, a refresh when close to expiry,
    /// otherwise `TokenExpired` so the caller can prompt for a login.
    pub async fn get_valid_token(&mut self) -> Result<TokenInfo, IdentityError> {
        match self.storage.load_token() {
            Ok(token) if token.is_valid() && !self.storage.needs_refresh(&token) => Ok(token),
            Ok(token) if token.refresh_token.is_some() => self.refresh_token(&token).await,
            Ok(token) if token.is_valid() => Ok(token),
            _ => Err(IdentityError::TokenExpired),
        }
    }

    async fn provider_error(response: reqwest::Response) -> IdentityError {
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => return IdentityError::Http(err),
        };

        let code = serde_json::from_str::<ProviderErrorBody>(&text)
            .map(|body| body.error.message)
            .unwrap_or(text);

        tracing::error!("Identity provider error: {}", code);
        IdentityError::Provider(friendly_message(&code))
    }
}

/// Maps the provider's error codes onto the messages the UI shows.
fn friendly_message(code: &str) -> String {
    match code.split(':').next().unwrap_or(code).trim() {
        "EMAIL_EXISTS" => "This username is already taken.".to_string(),
        "EMAIL_NOT_FOUND" => "Account not found. Please sign up first.".to_string(),
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Incorrect username or password.".to_string()
        }
        "WEAK_PASSWORD" => "Password should be at least 6 characters.".to_string(),
        "INVALID_EMAIL" => "Invalid username format.".to_string(),
        other => other.to_string(),
    }
}
