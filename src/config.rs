//! Transfer configuration.
//!
//! Everything is read once at process start, from the environment and an
//! optional `.env` file in the working directory, into a [`TransferConfig`].
//! The rest of the crate only sees the resulting values.
//!
//! | variable | meaning |
//! |---|---|
//! | `TIDAL_AUTH_TOKEN_TYPE` | token type for both accounts, `Bearer` if unset |
//! | `TIDAL_SOURCE_SESSION_ID` | source account session id |
//! | `TIDAL_SOURCE_ACCESS_TOKEN` | source account access token |
//! | `TIDAL_SOURCE_REFRESH_TOKEN` | source account refresh token |
//! | `TIDAL_TARGET_SESSION_ID` | target account session id |
//! | `TIDAL_TARGET_ACCESS_TOKEN` | target account access token |
//! | `TIDAL_TARGET_REFRESH_TOKEN` | target account refresh token |
//! | `TIDAL_CLIENT_ID` | OAuth client id used to refresh tokens, optional |
//! | `TIDAL_TRANSFER_SKIP` | leading source playlists to skip, `0` if unset |

use crate::Error;
use serde::{Deserialize, Serialize};

/// Token type used when `TIDAL_AUTH_TOKEN_TYPE` is not set.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

const TOKEN_TYPE_VAR: &str = "TIDAL_AUTH_TOKEN_TYPE";
const CLIENT_ID_VAR: &str = "TIDAL_CLIENT_ID";
const SKIP_VAR: &str = "TIDAL_TRANSFER_SKIP";

/// Credentials of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub token_type: String,
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl AccountConfig {
    /// Read the credentials stored under `TIDAL_{prefix}_*`.
    pub fn from_lookup<F>(prefix: &str, token_type: &str, lookup: &F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            token_type: token_type.to_string(),
            session_id: required(lookup, &format!("TIDAL_{prefix}_SESSION_ID"))?,
            access_token: required(lookup, &format!("TIDAL_{prefix}_ACCESS_TOKEN"))?,
            refresh_token: required(lookup, &format!("TIDAL_{prefix}_REFRESH_TOKEN"))?,
        })
    }
}

/// Everything a transfer run needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// OAuth client id used when an access token has to be refreshed.
    /// Without one, an expired access token ends the run.
    pub client_id: Option<String>,
    /// Account playlists are read from
    pub source: AccountConfig,
    /// Account playlists are written to
    pub target: AccountConfig,
    /// Number of leading source playlists to skip
    pub skip: usize,
}

impl TransferConfig {
    /// Load `.env` if there is one, then read the process environment.
    pub fn from_env() -> Result<Self, Error> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::InvalidConfig(".env".to_string(), e.to_string())),
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let token_type =
            non_empty(TOKEN_TYPE_VAR).unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());

        let skip = match non_empty(SKIP_VAR) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    Error::InvalidConfig(SKIP_VAR.to_string(), e.to_string())
                })?,
            None => 0,
        };

        Ok(Self {
            client_id: non_empty(CLIENT_ID_VAR),
            source: AccountConfig::from_lookup("SOURCE", &token_type, &non_empty)?,
            target: AccountConfig::from_lookup("TARGET", &token_type, &non_empty)?,
            skip,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, Error>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| Error::MissingConfig(key.to_string()))
}
