//! Bearer-token minting and verification, usable by both REST and the real-time channel.
//!
//! Tokens are HS256 JWTs carrying `{ sub, role, user_type, iat, exp }`. Verification is
//! synchronous and yields the [`Actor`] the rest of the system works with.

use chrono::{DateTime, TimeZone, Utc};
use clinic_core::constants::MIN_JWT_SECRET_LEN;
use clinic_core::{Actor, ClinicError, ClinicUuid, Role, UserType};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token configuration: {0}")]
    InvalidConfig(String),
    #[error("missing bearer token")]
    Missing,
    #[error("invalid token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("invalid token claims: {0}")]
    InvalidClaims(String),
}

pub type TokenResult<T> = std::result::Result<T, TokenError>;

impl From<TokenError> for ClinicError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidConfig(msg) => ClinicError::Internal(msg),
            other => ClinicError::Unauthenticated(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub user_type: UserType,
    pub iat: i64,
    pub exp: i64,
}

/// Token settings resolved at startup.
#[derive(Clone)]
pub struct TokenConfig {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenConfig {
    /// Validates the signing secret and lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidConfig`] if the secret is shorter than 32 bytes or the
    /// lifetime is zero.
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> TokenResult<Self> {
        let secret = secret.into();
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(TokenError::InvalidConfig(format!(
                "signing secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }
        if ttl.is_zero() {
            return Err(TokenError::InvalidConfig(
                "token lifetime must be greater than zero".into(),
            ));
        }
        Ok(Self { secret, ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// A freshly minted token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            validation,
            ttl: config.ttl,
        }
    }

    /// Issues a token for `actor`, valid for the configured lifetime.
    pub fn mint(&self, actor: &Actor) -> TokenResult<IssuedToken> {
        self.mint_at(actor, Utc::now())
    }

    fn mint_at(&self, actor: &Actor, now: DateTime<Utc>) -> TokenResult<IssuedToken> {
        let iat = now.timestamp();
        let exp = iat + self.ttl.as_secs() as i64;
        let claims = Claims {
            sub: actor.user_id.to_string(),
            role: actor.role,
            user_type: actor.user_type,
            iat,
            exp,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| TokenError::InvalidClaims("expiry out of range".into()))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Verifies a token's signature and expiry and returns the actor it names.
    pub fn verify(&self, token: &str) -> TokenResult<Actor> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        let user_id = ClinicUuid::parse(&data.claims.sub)
            .map_err(|e| TokenError::InvalidClaims(e.to_string()))?;
        Ok(Actor::new(user_id, data.claims.role, data.claims.user_type))
    }

    /// Verifies an `Authorization` header value of the form `Bearer <token>`.
    pub fn verify_header(&self, header: Option<&str>) -> TokenResult<Actor> {
        let token = header.and_then(bearer_token).ok_or(TokenError::Missing)?;
        self.verify(token)
    }
}

/// Extracts the token from a `Bearer <token>` header value. The scheme is case-insensitive.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
