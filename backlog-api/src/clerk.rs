//! Session verification against the Clerk backend API.

use crate::{
    config::ClerkConfig,
    server::auth::{AuthError, Authenticator},
};
use async_trait::async_trait;
use backlog_common::model::user::{Identity, UserId};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use serde::Deserialize;
use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "https://api.clerk.com";

const LEEWAY_SECS: u64 = 5;
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Unknown key ids trigger at most one key set fetch per interval.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub azp: Option<String>,
}

#[derive(Deserialize)]
struct ClerkUser {
    id: String,
    #[serde(default)]
    primary_email_address_id: Option<String>,
    #[serde(default)]
    email_addresses: Vec<ClerkEmailAddress>,
    #[serde(default)]
    banned: bool,
}

#[derive(Deserialize)]
struct ClerkEmailAddress {
    id: String,
    email_address: String,
}

impl ClerkUser {
    fn into_identity(self) -> Result<Identity, AuthError> {
        let email = self.primary_email_address_id.and_then(|primary| {
            self.email_addresses
                .into_iter()
                .find(|address| address.id == primary)
                .map(|address| address.email_address)
        });

        Ok(Identity {
            user_id: UserId::new(self.id)?,
            email,
            banned: self.banned,
        })
    }
}

pub struct ClerkAuthenticator {
    http: reqwest::Client,
    api_url: String,
    secret_key: String,
    authorized_parties: Vec<String>,
    /// Signing keys by key id.
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: Mutex<Option<Instant>>,
}

impl ClerkAuthenticator {
    pub fn new(config: &ClerkConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            secret_key: config.api_key.clone(),
            authorized_parties: config.authorized_parties.clone(),
            keys: RwLock::new(HashMap::new()),
            last_refresh: Mutex::new(None),
        })
    }

    async fn refresh_keys(&self) -> Result<(), AuthError> {
        let jwks: JwkSet = self
            .http
            .get(format!("{}/v1/jwks", self.api_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = &jwk.common.key_id else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid.clone(), key);
                }
                Err(err) => warn!(kid, error = %err, "Skipping unusable signing key"),
            }
        }

        info!(count = keys.len(), "Fetched session signing keys");
        *self.keys.write().await = keys;

        Ok(())
    }

    /// Refetches the key set when `kid` is not cached, unless the last fetch
    /// attempt was less than [`MIN_REFRESH_INTERVAL`] ago.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        {
            let mut last_refresh = self.last_refresh.lock().await;

            // Another request may have fetched the key while we waited.
            if let Some(key) = self.keys.read().await.get(kid) {
                return Ok(key.clone());
            }
            if last_refresh.is_some_and(|last| last.elapsed() < MIN_REFRESH_INTERVAL) {
                debug!(kid, "Unknown signing key, key set was refreshed recently");
                return Err(AuthError::UnknownKey(kid.to_owned()));
            }

            debug!(kid, "Unknown signing key, refreshing key set");
            *last_refresh = Some(Instant::now());
            self.refresh_keys().await?;
        }

        self.keys
            .read()
            .await
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::UnknownKey(kid.to_owned()))
    }

    pub async fn verify_session(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let header = decode_header(token)?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = LEEWAY_SECS;
        validation.validate_nbf = true;

        let claims = decode::<SessionClaims>(token, &key, &validation)?.claims;

        if !self.authorized_parties.is_empty()
            && !claims
                .azp
                .as_ref()
                .is_some_and(|azp| self.authorized_parties.contains(azp))
        {
            return Err(AuthError::UnauthorizedParty(claims.azp));
        }

        debug!(sub = %claims.sub, exp = claims.exp, "Verified session token");
        Ok(claims)
    }

    pub async fn fetch_user(&self, user_id: &UserId) -> Result<Identity, AuthError> {
        let user: ClerkUser = self
            .http
            .get(format!("{}/v1/users/{user_id}", self.api_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        user.into_identity()
    }
}

#[async_trait]
impl Authenticator for ClerkAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.verify_session(token).await?;
        let user_id = UserId::new(claims.sub)?;

        self.fetch_user(&user_id).await
    }
}

impl Debug for ClerkAuthenticator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClerkAuthenticator")
            .field("api_url", &self.api_url)
            .field("secret_key", &"[redacted]")
            .field("authorized_parties", &self.authorized_parties)
            .finish_non_exhaustive()
    }
}
