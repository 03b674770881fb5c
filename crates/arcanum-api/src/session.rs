use anyhow::anyhow;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use sha2::{Digest, Sha256};

use arcanum_db::Database;
use arcanum_db::models::UserRow;
use arcanum_types::api::{AuthResponse, Claims};

use crate::error::ApiError;

/// Signing material and token lifetimes, constructed once at startup and
/// injected — nothing in here reads the environment.
#[derive(Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

pub struct SessionManager {
    config: SessionConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::default();
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        // No clock-skew allowance on expiry
        validation.leeway = 0;

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Mint a fresh access/refresh pair for a user and persist the refresh
    /// hash. The raw refresh token leaves the server exactly once, in the
    /// returned pair; whatever refresh token the user held before is dead.
    pub fn issue_pair(
        &self,
        db: &Database,
        user: &UserRow,
        now: DateTime<Utc>,
    ) -> Result<AuthResponse, ApiError> {
        let access_token = self.mint_access_token(user, now)?;
        let (refresh_token, token_hash, expires_at) = self.mint_refresh_token(now);

        db.store_refresh_session(&user.id, &token_hash, &expires_at.to_rfc3339())?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a brand-new pair. Single-use: the
    /// presented token is spent by the exchange, and a replay — even a
    /// concurrent one — fails with `Unauthenticated`.
    pub fn rotate(
        &self,
        db: &Database,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthResponse, ApiError> {
        let presented_hash = hash_refresh_token(presented);
        let (refresh_token, new_hash, expires_at) = self.mint_refresh_token(now);

        let user = db
            .rotate_refresh_session(&presented_hash, &new_hash, &expires_at.to_rfc3339(), now)?
            .ok_or(ApiError::Unauthenticated)?;

        let access_token = self.mint_access_token(&user, now)?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
        })
    }

    /// Stateless check: signature, expiry, issuer, audience. Every failure
    /// mode collapses into `Unauthenticated` so callers cannot probe which
    /// check tripped.
    pub fn verify_access(&self, token: &str) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| ApiError::Unauthenticated)?;
        Ok(data.claims)
    }

    fn mint_access_token(&self, user: &UserRow, now: DateTime<Utc>) -> Result<String, ApiError> {
        let sub = user
            .id
            .parse()
            .map_err(|e| ApiError::Internal(anyhow!("corrupt user id '{}': {}", user.id, e)))?;

        let claims = Claims {
            sub,
            email: user.email.clone(),
            username: user.username.clone(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            exp: (now + self.config.access_ttl).timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(anyhow!("failed to sign access token: {}", e)))
    }

    /// 64 bytes of CSPRNG output, base64-encoded — opaque, no structure to
    /// forge. Returns (raw token, storage hash, expiry).
    fn mint_refresh_token(&self, now: DateTime<Utc>) -> (String, String, DateTime<Utc>) {
        let mut bytes = [0u8; 64];
        rand::rng().fill_bytes(&mut bytes);

        let token = B64.encode(bytes);
        let hash = hash_refresh_token(&token);

        (token, hash, now + self.config.refresh_ttl)
    }
}

/// SHA-256, not argon2: the input is already 512 bits of entropy, so a fast
/// preimage-resistant digest is the right storage transform — a slow
/// password hash would only add latency.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
