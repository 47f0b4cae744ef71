//! Bearer credentials
//!
//! The identity provider's login flow lives elsewhere. This module only
//! holds the resulting access token, reads the user profile out of its
//! claims and hands the token to whoever needs it.

use crate::protocol::PresenceAnnouncement;
use crate::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::RwLock;
use tracing::debug;

/// Source of bearer tokens
///
/// Asked for a token on every connect and every REST call, so a refreshed
/// token is picked up without restarting the session.
pub trait CredentialProvider: Send + Sync {
    /// Current bearer token, or `Error::Authentication` when none is usable
    fn bearer_token(&self) -> impl Future<Output = Result<String>> + Send;
}

/// An access token and its expiry
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    /// Raw bearer token
    pub access_token: String,
    /// When the token stops being accepted, if known
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Credential without a known expiry
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    /// Credential from a JWT, taking the expiry from its `exp` claim
    pub fn from_jwt(access_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into();
        let claims = decode_claims(&access_token)?;
        let expires_at = claims.exp.and_then(|exp| DateTime::from_timestamp(exp, 0));
        Ok(Self {
            access_token,
            expires_at,
        })
    }

    /// Whether the token has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Claims carried by the token
    pub fn claims(&self) -> Result<TokenClaims> {
        decode_claims(&self.access_token)
    }
}

/// Claims read from an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user ID
    pub sub: String,
    /// Username
    #[serde(default)]
    pub preferred_username: Option<String>,
    /// Given name
    #[serde(default)]
    pub given_name: Option<String>,
    /// Family name
    #[serde(default)]
    pub family_name: Option<String>,
    /// Expiry as seconds since the epoch
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// Profile of the authenticated user
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.sub.clone(),
            username: self
                .preferred_username
                .clone()
                .unwrap_or_else(|| self.sub.clone()),
            first_name: self.given_name.clone(),
            last_name: self.family_name.clone(),
        }
    }
}

/// Decode the payload segment of a JWT
///
/// The signature is not verified; the backend does that.
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::Authentication("Access token is not a JWT".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::Authentication(format!("Invalid token payload: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Authentication(format!("Invalid token claims: {}", e)))
}

/// The local user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User ID
    pub id: String,
    /// Username
    pub username: String,
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
}

impl UserProfile {
    /// Profile with only an ID and username
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            first_name: None,
            last_name: None,
        }
    }
}

impl From<&UserProfile> for PresenceAnnouncement {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.id.clone(),
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
        }
    }
}

/// In-memory credential holder
///
/// The credential can be swapped at any time; the next connect or REST
/// call uses the new token.
#[derive(Debug, Default)]
pub struct TokenStore {
    credential: RwLock<Option<Credential>>,
}

impl TokenStore {
    /// Store holding `credential`
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(Some(credential)),
        }
    }

    /// Store with no credential
    pub fn empty() -> Self {
        Self::default()
    }

    /// Install a new credential
    pub async fn replace(&self, credential: Credential) {
        debug!("Access token replaced");
        *self.credential.write().await = Some(credential);
    }

    /// Forget the current credential
    pub async fn clear(&self) {
        *self.credential.write().await = None;
    }

    /// Current credential, usable or not
    pub async fn current(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }
}

impl CredentialProvider for TokenStore {
    async fn bearer_token(&self) -> Result<String> {
        let guard = self.credential.read().await;
        match guard.as_ref() {
            None => Err(Error::Authentication("No access token available".to_string())),
            Some(credential) if credential.access_token.trim().is_empty() => {
                Err(Error::Authentication("Access token is empty".to_string()))
            }
            Some(credential) if credential.is_expired(Utc::now()) => {
                Err(Error::Authentication("Access token has expired".to_string()))
            }
            Some(credential) => Ok(credential.access_token.clone()),
        }
    }
}
