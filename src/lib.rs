#![doc = include_str!("../README.md")]

mod config;
mod playlist;
mod session;
mod track;
mod transfer;

pub use config::*;
pub use playlist::*;
pub use session::*;
pub use track::*;
pub use transfer::*;

use arc_swap::ArcSwapOption;
use async_recursion::async_recursion;
use reqwest::header::{AUTHORIZATION, HeaderMap, IF_NONE_MATCH, USER_AGENT};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::Display;
use std::sync::Arc;
use strum_macros::{AsRefStr, EnumString};
use tokio::sync::{Semaphore, SemaphorePermit};

pub(crate) static TIDAL_AUTH_API_BASE_URL: &str = "https://auth.tidal.com/v1";
pub(crate) static TIDAL_API_BASE_URL: &str = "https://api.tidal.com/v1";

static CLIENT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 12; wv) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/91.0.4472.114 Safari/537.36";

/// Sub-status Tidal attaches to a 401 when the access token has expired.
const EXPIRED_TOKEN_SUB_STATUS: u64 = 11003;

/// Token response from Tidal's OAuth2 endpoint.
///
/// Only the fields needed to keep a session alive are decoded; the profile
/// data Tidal sends alongside is ignored.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthzToken {
    /// Access token for API authentication
    pub access_token: String,
    /// Refresh token, only sent when Tidal rotates it
    pub refresh_token: Option<String>,
    /// Type of token (typically "Bearer")
    pub token_type: Option<String>,
    /// User the token belongs to
    pub user_id: Option<u64>,
}

/// Error response from the Tidal API.
///
/// This represents errors returned by Tidal's API endpoints and includes
/// both HTTP status codes and Tidal-specific error information.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TidalApiError {
    /// HTTP status code
    pub status: u16,
    /// Tidal-specific sub-status code
    #[serde(rename = "sub_status", alias = "subStatus", default)]
    pub sub_status: u64,
    /// Human-readable error message
    #[serde(rename = "userMessage", alias = "user_message", default)]
    pub user_message: String,
}

impl Display for TidalApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tidal API error: {} {} {}",
            self.status, self.sub_status, self.user_message
        )
    }
}

/// Errors that can occur while talking to Tidal or running a transfer.
///
/// `Authentication` is fatal for the whole run. The HTTP, API and JSON
/// variants are service errors; the transfer never recovers from them and
/// hands them straight back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed (network issues, timeouts, etc.)
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// Tidal API returned an error response
    #[error("{0}")]
    TidalApiError(TidalApiError),
    /// JSON serialization/deserialization failed
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// A header value could not be built from the configured credentials
    #[error(transparent)]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    /// A session could not be established for an account
    #[error("Authentication failed: {0}")]
    Authentication(#[source] Box<Error>),
    /// No authorization token available for refresh
    #[error("No authz token available to refresh client authorization")]
    NoAuthzToken,
    /// The access token expired and no client id is configured to refresh it
    #[error("Access token expired and no client id is configured to refresh it")]
    MissingClientId,
    /// User authentication required for this operation
    #[error("User authentication required - please login first")]
    UserAuthenticationRequired,
    /// Tidal created a playlist but did not report its identifier
    #[error("Tidal did not return an identifier for new playlist `{0}`")]
    MissingPlaylistId(String),
    /// A required configuration value is not set
    #[error("Missing configuration value {0}")]
    MissingConfig(String),
    /// A configuration value is set but unusable
    #[error("Invalid configuration value {0}: {1}")]
    InvalidConfig(String, String),
}

impl Error {
    /// Whether the error means an account could not be signed in.
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Error::Authentication(_)
                | Error::NoAuthzToken
                | Error::MissingClientId
                | Error::UserAuthenticationRequired
        )
    }

    /// Whether the error came from a request to the remote service.
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::TidalApiError(_)
                | Error::SerdeJson(_)
                | Error::MissingPlaylistId(_)
        )
    }
}

/// Callback function type for handling authorization token refresh events.
///
/// This callback is invoked whenever the client automatically refreshes
/// the access token.
pub type AuthzCallback = Arc<dyn Fn(Authz) + Send + Sync>;

/// HTTP session against the Tidal API for a single account.
///
/// The client owns the account's credentials, refreshes the access token when
/// Tidal reports it expired, and implements [`Session`] so it can be handed
/// to a [`SourceLoader`] or [`TargetSaver`].
///
/// # Example
///
/// ```no_run
/// use tidal_transfer::{Authz, TidalClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let authz = Authz::new(
///     "Bearer".to_string(),
///     "access_token".to_string(),
///     "refresh_token".to_string(),
///     None,
///     None,
/// );
/// let client = TidalClient::new("client_id".to_string())
///     .with_authz(authz)
///     .with_session_id("session_id".to_string());
///
/// let session = client.authenticate().await?;
/// println!("Signed in as user {}", session.user_id);
/// # Ok(())
/// # }
/// ```
pub struct TidalClient {
    pub client: reqwest::Client,
    client_id: Option<String>,
    api_base_url: String,
    auth_base_url: String,
    authz: ArcSwapOption<Authz>,
    authz_update_semaphore: Semaphore,
    session: ArcSwapOption<SessionInfo>,
    session_id: Option<String>,
    country_code: Option<String>,
    locale: Option<String>,
    device_type: Option<DeviceType>,
    on_authz_refresh_callback: Option<AuthzCallback>,
}

/// Authorization tokens for API access.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Authz {
    /// Scheme used in the `Authorization` header (typically "Bearer")
    pub token_type: String,
    /// Access token for API authentication
    pub access_token: String,
    /// Refresh token for obtaining new access tokens
    pub refresh_token: String,
    /// User ID associated with these tokens, once known
    pub user_id: Option<u64>,
    /// User's country code (affects content availability)
    pub country_code: Option<String>,
}

impl Authz {
    pub fn new(
        token_type: String,
        access_token: String,
        refresh_token: String,
        user_id: Option<u64>,
        country_code: Option<String>,
    ) -> Self {
        Self {
            token_type,
            access_token,
            refresh_token,
            user_id,
            country_code,
        }
    }

    fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl TidalClient {
    /// Create a new TidalClient with the given client ID.
    ///
    /// The client ID is only used when the access token has to be refreshed.
    pub fn new(client_id: String) -> Self {
        Self::with_optional_client_id(Some(client_id))
    }

    fn with_optional_client_id(client_id: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
            api_base_url: TIDAL_API_BASE_URL.to_string(),
            auth_base_url: TIDAL_AUTH_API_BASE_URL.to_string(),
            authz: ArcSwapOption::from(None),
            authz_update_semaphore: Semaphore::new(1),
            session: ArcSwapOption::from(None),
            session_id: None,
            country_code: None,
            locale: None,
            device_type: None,
            on_authz_refresh_callback: None,
        }
    }

    /// Build a client for one account from its configuration.
    ///
    /// Without a client id the client works until its access token expires.
    pub fn from_account(client_id: Option<&str>, account: &AccountConfig) -> Self {
        let authz = Authz::new(
            account.token_type.clone(),
            account.access_token.clone(),
            account.refresh_token.clone(),
            None,
            None,
        );

        Self::with_optional_client_id(client_id.map(str::to_string))
            .with_authz(authz)
            .with_session_id(account.session_id.clone())
    }

    /// Set a custom HTTP client using the builder pattern.
    ///
    /// Use this for timeouts, proxies or custom default headers.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Send catalog requests to `url` instead of the public Tidal API.
    pub fn with_api_base_url(mut self, url: String) -> Self {
        self.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Send token refreshes to `url` instead of Tidal's auth service.
    pub fn with_auth_base_url(mut self, url: String) -> Self {
        self.auth_base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Set existing authentication tokens using the builder pattern.
    pub fn with_authz(mut self, authz: Authz) -> Self {
        self.authz = ArcSwapOption::from_pointee(authz);
        self
    }

    /// Set the Tidal session identifier using the builder pattern.
    ///
    /// Playlist modifications carry it in the `x-tidal-sessionid` header.
    pub fn with_session_id(mut self, session_id: String) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Set the locale for API requests using the builder pattern.
    pub fn with_locale(mut self, locale: String) -> Self {
        self.locale = Some(locale);
        self
    }

    /// Set the device type for API requests using the builder pattern.
    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = Some(device_type);
        self
    }

    /// Set the country code for API requests using the builder pattern.
    ///
    /// This setting takes priority over the country code of the session.
    pub fn with_country_code(mut self, country_code: String) -> Self {
        self.country_code = Some(country_code);
        self
    }

    /// Set a callback function for authorization token refresh using the builder pattern.
    pub fn with_authz_refresh_callback<F>(mut self, authz_refresh_callback: F) -> Self
    where
        F: Fn(Authz) + Send + Sync + 'static,
    {
        self.on_authz_refresh_callback = Some(Arc::new(authz_refresh_callback));
        self
    }

    /// Get the current country code for API requests.
    ///
    /// Returns the explicitly set country code, then the session's country,
    /// then the token's country, and "US" as a final fallback.
    pub fn get_country_code(&self) -> String {
        if let Some(country_code) = &self.country_code {
            return country_code.clone();
        }
        if let Some(session) = self.get_session() {
            return session.country_code.clone();
        }
        self.get_authz()
            .and_then(|authz| authz.country_code.clone())
            .unwrap_or_else(|| "US".into())
    }

    /// Get the current locale for API requests, "en_US" by default.
    pub fn get_locale(&self) -> String {
        self.locale.clone().unwrap_or_else(|| "en_US".into())
    }

    /// Get the current device type for API requests, `DeviceType::Browser` by default.
    pub fn get_device_type(&self) -> DeviceType {
        self.device_type.unwrap_or_default()
    }

    /// Get the current user ID if authenticated.
    pub fn get_user_id(&self) -> Option<u64> {
        match self.get_session() {
            Some(session) => Some(session.user_id),
            None => self.get_authz().and_then(|authz| authz.user_id),
        }
    }

    /// Get the session identifier sent with playlist modifications.
    ///
    /// The configured identifier wins over the one reported by Tidal.
    pub fn get_session_id(&self) -> Option<String> {
        self.session_id
            .clone()
            .or_else(|| self.get_session().map(|session| session.session_id.clone()))
    }

    /// Get the session established by [`TidalClient::authenticate`].
    pub fn get_session(&self) -> Option<Arc<SessionInfo>> {
        self.session.load_full()
    }

    /// Get the client ID used to refresh the access token.
    pub fn get_client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Base URL catalog requests are sent to.
    pub fn get_api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Get the current authorization tokens.
    pub fn get_authz(&self) -> Option<Arc<Authz>> {
        self.authz.load_full()
    }

    /// Query parameters Tidal expects on every catalog request.
    pub(crate) fn default_params(&self) -> serde_json::Value {
        serde_json::json!({
            "countryCode": self.get_country_code(),
            "locale": self.get_locale(),
            "deviceType": self.get_device_type().as_ref(),
        })
    }

    /// Establish the session for the configured credentials.
    ///
    /// Asks Tidal which user and country the access token belongs to. Any
    /// failure, including a network error, is reported as
    /// [`Error::Authentication`] since nothing else can run without it.
    pub async fn authenticate(&self) -> Result<Arc<SessionInfo>, Error> {
        if self.get_authz().is_none() {
            return Err(Error::Authentication(Box::new(Error::NoAuthzToken)));
        }

        let url = format!("{}/sessions", self.api_base_url);
        let info: SessionInfo = self
            .do_request(reqwest::Method::GET, &url, None, None, None)
            .await
            .map_err(|e| Error::Authentication(Box::new(e)))?;

        let info = Arc::new(info);
        self.session.store(Some(info.clone()));

        log::debug!(
            "Session {} established for user {}",
            info.session_id,
            info.user_id
        );

        Ok(info)
    }

    #[async_recursion]
    async fn refresh_authz(&self) -> Result<(), Error> {
        let client_id = self.client_id.as_deref().ok_or(Error::MissingClientId)?;

        // Try to become the single refresher
        let permit: Option<SemaphorePermit> = self.authz_update_semaphore.try_acquire().ok();

        match permit {
            Some(permit) => {
                let url = format!("{}/oauth2/token", self.auth_base_url);

                let authz = self.get_authz().ok_or(Error::NoAuthzToken)?;

                let params = serde_json::json!({
                    "client_id": client_id,
                    "refresh_token": authz.refresh_token,
                    "grant_type": "refresh_token",
                    "scope": "r_usr w_usr w_sub",
                });

                // Never refresh from inside the refresh, the permit is still held
                let resp: AuthzToken = self
                    .send_request(reqwest::Method::POST, &url, Some(params), None, None, false)
                    .await?;

                let new_authz = Authz {
                    token_type: resp
                        .token_type
                        .unwrap_or_else(|| authz.token_type.clone()),
                    access_token: resp.access_token,
                    refresh_token: resp
                        .refresh_token
                        .unwrap_or_else(|| authz.refresh_token.clone()),
                    user_id: resp.user_id.or(authz.user_id),
                    country_code: authz.country_code.clone(),
                };

                self.authz.store(Some(Arc::new(new_authz.clone())));

                drop(permit);

                if let Some(cb) = &self.on_authz_refresh_callback {
                    cb(new_authz);
                }

                Ok(())
            }
            None => {
                // Someone else is refreshing, wait for them to finish.
                let _ = self.authz_update_semaphore.acquire().await;
                Ok(())
            }
        }
    }

    // Issue a request and decode the JSON body. POST params are form-encoded,
    // everything else goes in the query string. An expired access token is
    // refreshed and the request retried once.
    pub(crate) async fn do_request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        params: Option<serde_json::Value>,
        etag: Option<&str>,
        headers: Option<HeaderMap>,
    ) -> Result<T, Error> {
        self.send_request(method, url, params, etag, headers, true).await
    }

    #[async_recursion]
    async fn send_request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        params: Option<serde_json::Value>,
        etag: Option<&str>,
        headers: Option<HeaderMap>,
        refresh_expired: bool,
    ) -> Result<T, Error> {
        let mut req = self.client.request(method.clone(), url);

        if let Some(etag) = etag {
            req = req.header(IF_NONE_MATCH, etag);
        }

        if let Some(headers) = headers.clone() {
            req = req.headers(headers);
        }

        if let Some(authz) = self.get_authz() {
            req = req.header(AUTHORIZATION, authz.header_value());
        }

        req = req.header(USER_AGENT, CLIENT_USER_AGENT);

        if let Some(params) = params.as_ref() {
            req = match method {
                reqwest::Method::POST => req.form(params),
                _ => req.query(params),
            };
        }

        let resp = req.send().await?;
        let status_code = resp.status().as_u16();

        if resp.status().is_success() {
            let body = resp.bytes().await?;

            // If it's an empty body, just encode a null value
            let value = if body.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_slice(&body)?
            };

            if log::log_enabled!(log::Level::Trace) {
                log::trace!("Requested URL: {}", url);
                log::trace!(
                    "Response {}",
                    serde_json::to_string_pretty(&value).unwrap_or_default()
                );
            }

            return serde_json::from_value(value).map_err(|e| {
                log::debug!("Requested URL: {}", url);
                log::debug!("JSON deserialization error: {}", e);
                Error::SerdeJson(e)
            });
        }

        let body = resp.bytes().await?;
        let err =
            serde_json::from_slice::<TidalApiError>(&body).unwrap_or_else(|_| TidalApiError {
                status: status_code,
                sub_status: 0,
                user_message: String::from_utf8_lossy(&body).into_owned(),
            });

        if refresh_expired && status_code == 401 && err.sub_status == EXPIRED_TOKEN_SUB_STATUS {
            log::info!("Access token expired, refreshing");
            self.refresh_authz().await?;
            return self.send_request(method, url, params, etag, headers, false).await;
        }

        log::debug!("Requested URL: {}", url);
        log::debug!("TIDAL API Error: {}", err);

        Err(Error::TidalApiError(err))
    }
}

/// Device type for API requests.
#[derive(
    Debug, Serialize, Deserialize, Default, EnumString, AsRefStr, PartialEq, Eq, Clone, Copy,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    /// Browser-based client
    #[default]
    Browser,
}

/// A paginated list response from the Tidal API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Offset of the current page
    #[serde(default)]
    pub offset: usize,
    /// Maximum number of items per page
    #[serde(default)]
    pub limit: usize,
    /// Total number of items available
    #[serde(rename = "totalNumberOfItems", default)]
    pub total: usize,
}

impl<T> List<T> {
    // The number of items left to fetch
    pub fn num_left(&self) -> usize {
        self.total
            .saturating_sub(self.offset)
            .saturating_sub(self.items.len())
    }
}

// Utility function to deserialize a null value as a default value
pub(crate) fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    Option::deserialize(deserializer).map(|opt| opt.unwrap_or_default())
}
