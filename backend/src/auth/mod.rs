use anyhow::{Context, Result};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    pub sub: String,
    pub role: String,
    pub email: Option<String>,
    pub exp: usize,
}

/// Caller resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: Uuid,
    pub email: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthIdentity>;
}

/// Verifies access tokens issued by Supabase Auth (HS256, project JWT secret).
pub struct SupabaseJwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SupabaseJwtVerifier {
    pub fn new(jwt_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["authenticated"]);

        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<SupabaseClaims> {
        let token_data = decode::<SupabaseClaims>(token, &self.decoding_key, &self.validation)
            .context("JWT validation failed")?;
        Ok(token_data.claims)
    }
}

#[async_trait]
impl IdentityVerifier for SupabaseJwtVerifier {
    async fn verify(&self, token: &str) -> Result<AuthIdentity> {
        let claims = self.validate(token)?;
        let user_id = Uuid::parse_str(&claims.sub).context("Invalid user ID in token")?;

        Ok(AuthIdentity {
            user_id,
            email: claims.email,
        })
    }
}

/// Token part of an `Authorization` header value. A value without the
/// `Bearer` scheme is passed through and left for the verifier to reject.
pub fn bearer_token(header_value: &str) -> &str {
    let trimmed = header_value.trim();
    match trimmed.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim_start(),
        _ => trimmed,
    }
}
