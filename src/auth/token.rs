use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_TOKEN_TTL_HOURS;
use crate::error::{ArenaError, Result};

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
}

impl Claims {
    /// Creates new claims for a user, valid for `hours`
    pub fn new(username: String, hours: u64) -> Self {
        let now = chrono::Utc::now().timestamp().max(0) as usize;
        Self {
            sub: username,
            exp: now.saturating_add((hours as usize).saturating_mul(3600)),
            iat: now,
        }
    }
}

/// Resolves a request's credentials to a verified user identity
pub trait Authenticator: Send + Sync {
    /// `authorization` is the raw Authorization header, if present
    fn authenticate(&self, authorization: Option<&str>) -> Result<String>;
}

/// Manages JWT token operations
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_hours: u64,
}

impl TokenManager {
    /// Creates a new token manager with a secret
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, DEFAULT_TOKEN_TTL_HOURS)
    }

    pub fn with_ttl(secret: &str, ttl_hours: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl_hours,
        }
    }

    /// Generates a JWT token for the given claims
    pub fn generate_token(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| ArenaError::AuthError(format!("Failed to generate token: {}", e)))
    }

    /// Issue a token for a freshly authenticated user
    pub fn issue(&self, username: &str) -> Result<String> {
        self.generate_token(&Claims::new(username.to_string(), self.ttl_hours))
    }

    /// Validates and decodes a JWT token (expiry included)
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| ArenaError::AuthError(format!("Invalid token: {}", e)))
    }

    /// Validates a token and returns the username if valid
    pub fn validate_and_get_user(&self, token: &str) -> Result<String> {
        let claims = self.validate_token(token)?.claims;
        if claims.sub.is_empty() {
            return Err(ArenaError::AuthError("Token has no subject".to_string()));
        }
        Ok(claims.sub)
    }
}

impl Authenticator for TokenManager {
    fn authenticate(&self, authorization: Option<&str>) -> Result<String> {
        let token = authorization
            .and_then(extract_bearer_token)
            .ok_or(ArenaError::Unauthorized)?;
        self.validate_and_get_user(&token)
    }
}

/// Extracts bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<String> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
