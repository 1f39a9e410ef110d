use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Error validating the token : {0}")]
    TokenValidationError(#[from] jsonwebtoken::errors::Error),
    #[error("Token subject is not a user id : {0}")]
    InvalidSubject(String),
}

/// Claims of an access token issued by the identity service.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// Verifies an HS256 access token and returns the user it was issued to.
pub fn verify_jwt_token(secret: &str, token: &str) -> Result<Uuid, TokenError> {
    let validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    let decoded = jsonwebtoken::decode::<TokenClaims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Uuid::parse_str(&decoded.claims.sub).map_err(|_| TokenError::InvalidSubject(decoded.claims.sub))
}
