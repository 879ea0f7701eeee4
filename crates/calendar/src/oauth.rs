//! OAuth 2.0 token handling for the Calendar API
//!
//! Tokens live in a JSON file. A cached token is used while it has more than
//! a minute left, refreshed when it has a refresh token, and otherwise
//! replaced through the installed-app flow: a loopback listener receives the
//! browser redirect after the user consents.

use crate::errors::CalendarError;
use crate::CALENDAR_SCOPE;
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use concierge_common::config::CalendarConfig;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Tokens closer than this to expiry are treated as expired
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Hands out bearer tokens for API calls
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, CalendarError>;
}

/// A fixed bearer token
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, CalendarError> {
        Ok(self.0.clone())
    }
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// OAuth client registration from the Google console
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Read a downloaded `credentials.json` (either `installed` or `web` client)
    pub fn from_file(path: &Path) -> Result<Self, CalendarError> {
        let credentials_error = |message: String| CalendarError::Credentials {
            path: path.display().to_string(),
            message,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| credentials_error(e.to_string()))?;
        let file: SecretsFile = serde_json::from_str(&raw).map_err(|e| credentials_error(e.to_string()))?;

        file.installed
            .or(file.web)
            .ok_or_else(|| credentials_error("expected an \"installed\" or \"web\" client".to_string()))
    }
}

/// Token persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl StoredToken {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > ChronoDuration::seconds(EXPIRY_MARGIN_SECS)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    refresh_token: Option<String>,
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            // Refresh responses usually omit the refresh token
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + ChronoDuration::seconds(self.expires_in),
            scope: self.scope,
        }
    }
}

/// File-backed token provider for a user's Google account
pub struct GoogleTokenProvider {
    http: reqwest::Client,
    credentials_path: PathBuf,
    token_path: PathBuf,
    auth_timeout: Duration,
    cached: tokio::sync::Mutex<Option<StoredToken>>,
}

impl GoogleTokenProvider {
    pub fn new(config: &CalendarConfig) -> Result<Self, CalendarError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CalendarError::Authorization(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            credentials_path: config.credentials_path.clone(),
            token_path: config.token_path.clone(),
            auth_timeout: Duration::from_secs(config.auth_timeout_secs),
            cached: tokio::sync::Mutex::new(None),
        })
    }

    /// Read the token file, if there is one
    pub fn load_token(&self) -> Result<Option<StoredToken>, CalendarError> {
        if !self.token_path.is_file() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.token_path)
            .map_err(|e| CalendarError::TokenStore(format!("{}: {}", self.token_path.display(), e)))?;

        match serde_json::from_str(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(path = %self.token_path.display(), error = %e, "Ignoring unreadable token file");
                Ok(None)
            }
        }
    }

    pub fn save_token(&self, token: &StoredToken) -> Result<(), CalendarError> {
        let store_error = |e: String| CalendarError::TokenStore(format!("{}: {}", self.token_path.display(), e));

        if let Some(parent) = self.token_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| store_error(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(token).map_err(|e| store_error(e.to_string()))?;
        std::fs::write(&self.token_path, json).map_err(|e| store_error(e.to_string()))?;
        Ok(())
    }

    async fn token_request(
        &self,
        secrets: &ClientSecrets,
        form: &[(&str, &str)],
        previous_refresh: Option<String>,
    ) -> Result<StoredToken, CalendarError> {
        let response = self
            .http
            .post(&secrets.token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| CalendarError::Authorization(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CalendarError::Authorization(format!("Token response unreadable: {}", e)))?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => format!("HTTP {}: {}", status, body),
            };
            return Err(CalendarError::Authorization(reason));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| CalendarError::Authorization(format!("Malformed token response: {}", e)))?;

        Ok(token.into_token(previous_refresh))
    }

    /// Trade a refresh token for a new access token
    pub async fn refresh(&self, secrets: &ClientSecrets, refresh_token: &str) -> Result<StoredToken, CalendarError> {
        info!("Refreshing calendar access token");
        self.token_request(
            secrets,
            &[
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
            Some(refresh_token.to_string()),
        )
        .await
    }

    /// Trade an authorization code for tokens
    pub async fn exchange_code(
        &self,
        secrets: &ClientSecrets,
        code: &str,
        redirect_uri: &str,
    ) -> Result<StoredToken, CalendarError> {
        self.token_request(
            secrets,
            &[
                ("code", code),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ],
            None,
        )
        .await
    }

    /// Run the installed-app consent flow end to end
    async fn authorize(&self, secrets: &ClientSecrets) -> Result<StoredToken, CalendarError> {
        let pending = PendingAuthorization::start(secrets).await?;

        warn!(
            url = %pending.consent_url(),
            "Calendar access not authorized yet; open this URL in a browser to grant it"
        );

        let redirect_uri = pending.redirect_uri().to_string();
        let code = pending.wait(self.auth_timeout).await?;
        let token = self.exchange_code(secrets, &code, &redirect_uri).await?;

        info!("Calendar access authorized");
        Ok(token)
    }

    async fn obtain_token(&self, stored: Option<StoredToken>) -> Result<StoredToken, CalendarError> {
        match stored {
            Some(token) if token.is_valid(Utc::now()) => Ok(token),
            Some(StoredToken {
                refresh_token: Some(refresh_token),
                ..
            }) => {
                let secrets = ClientSecrets::from_file(&self.credentials_path)?;
                let token = self.refresh(&secrets, &refresh_token).await?;
                self.save_token(&token)?;
                Ok(token)
            }
            _ => {
                let secrets = ClientSecrets::from_file(&self.credentials_path)?;
                let token = self.authorize(&secrets).await?;
                self.save_token(&token)?;
                Ok(token)
            }
        }
    }
}

#[async_trait]
impl AccessTokenSource for GoogleTokenProvider {
    async fn access_token(&self) -> Result<String, CalendarError> {
        // Held across the whole refresh/consent so concurrent callers share one flow
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_valid(Utc::now())) {
            return Ok(token.access_token.clone());
        }

        let stored = match cached.take() {
            Some(token) => Some(token),
            None => self.load_token()?,
        };

        let token = self.obtain_token(stored).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);

        Ok(access_token)
    }
}

type CodeSender = oneshot::Sender<Result<String, CalendarError>>;

#[derive(Clone)]
struct RedirectState {
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<CodeSender>>>,
}

/// A consent flow waiting for the browser redirect
pub struct PendingAuthorization {
    consent_url: Url,
    redirect_uri: String,
    code_rx: oneshot::Receiver<Result<String, CalendarError>>,
    shutdown_tx: oneshot::Sender<()>,
}

impl PendingAuthorization {
    /// Bind the loopback listener and build the consent URL
    pub async fn start(secrets: &ClientSecrets) -> Result<Self, CalendarError> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| CalendarError::Authorization(format!("Cannot bind redirect listener: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| CalendarError::Authorization(e.to_string()))?
            .port();

        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(30)
            .map(char::from)
            .collect();

        let consent_url = Url::parse_with_params(
            &secrets.auth_uri,
            &[
                ("client_id", secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", CALENDAR_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| CalendarError::Authorization(format!("Invalid auth_uri: {}", e)))?;

        let (code_tx, code_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = Router::new()
            .route("/", get(handle_redirect))
            .with_state(RedirectState {
                expected_state: Arc::from(state.as_str()),
                sender: Arc::new(Mutex::new(Some(code_tx))),
            });

        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "Redirect listener failed");
            }
        });

        Ok(Self {
            consent_url,
            redirect_uri,
            code_rx,
            shutdown_tx,
        })
    }

    pub fn consent_url(&self) -> &Url {
        &self.consent_url
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Wait for the redirect and return the authorization code
    pub async fn wait(self, timeout: Duration) -> Result<String, CalendarError> {
        let outcome = tokio::time::timeout(timeout, self.code_rx).await;
        let _ = self.shutdown_tx.send(());

        match outcome {
            Err(_) => Err(CalendarError::Authorization(
                "Timed out waiting for the consent redirect".to_string(),
            )),
            Ok(Err(_)) => Err(CalendarError::Authorization(
                "Redirect listener stopped unexpectedly".to_string(),
            )),
            Ok(Ok(result)) => result,
        }
    }
}

async fn handle_redirect(
    State(state): State<RedirectState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    let outcome = parse_redirect(&params, &state.expected_state);
    let ok = outcome.is_ok();

    let sender = state.sender.lock().ok().and_then(|mut slot| slot.take());
    if let Some(sender) = sender {
        let _ = sender.send(outcome);
    }

    if ok {
        (
            StatusCode::OK,
            "The authentication flow has completed. You may close this window.",
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            "Authorization failed. Return to the application for details.",
        )
    }
}

fn parse_redirect(params: &HashMap<String, String>, expected_state: &str) -> Result<String, CalendarError> {
    if let Some(error) = params.get("error") {
        return Err(CalendarError::Authorization(format!("Consent denied: {}", error)));
    }

    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(CalendarError::Authorization(
            "State mismatch in consent redirect".to_string(),
        ));
    }

    params
        .get("code")
        .filter(|c| !c.is_empty())
        .cloned()
        .ok_or_else(|| CalendarError::Authorization("Consent redirect carried no code".to_string()))
}
