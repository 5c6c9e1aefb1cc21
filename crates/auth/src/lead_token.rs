//! Signed tokens handed to a lead once their email is verified.
//!
//! The chat widget presents the token on every request; it binds the bearer
//! to one lead and the conversation opened for them.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use realty_config::AuthConfig;
use realty_database::format_timestamp;

use crate::{ttl_from_seconds, AuthError, AuthResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadClaims {
    /// Lead public id.
    pub sub: String,
    /// Conversation public id.
    pub conversation: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadToken {
    pub token: String,
    pub expires_at: String,
}

#[derive(Clone)]
pub struct LeadTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl LeadTokenIssuer {
    pub fn new(secret: &str, issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self::new(
            &config.lead_token_secret,
            config.lead_token_issuer.clone(),
            ttl_from_seconds("auth.lead_token_ttl_seconds", config.lead_token_ttl_seconds)?,
        ))
    }

    pub fn mint(&self, lead_public_id: &str, conversation_public_id: &str) -> AuthResult<LeadToken> {
        let issued_at = Utc::now();
        let expires_at = issued_at + self.ttl;

        let claims = LeadClaims {
            sub: lead_public_id.to_string(),
            conversation: conversation_public_id.to_string(),
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::TokenCreation(err.to_string()))?;

        Ok(LeadToken {
            token,
            expires_at: format_timestamp(expires_at),
        })
    }

    pub fn verify(&self, token: &str) -> AuthResult<LeadClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        decode::<LeadClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::LeadTokenExpired,
                _ => AuthError::InvalidLeadToken,
            })
    }

    pub fn expiry_of(claims: &LeadClaims) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(claims.exp, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> LeadTokenIssuer {
        LeadTokenIssuer::new("test-secret-that-is-long-enough", "realty-test", Duration::hours(1))
    }

    #[test]
    fn minted_tokens_verify() {
        let issuer = issuer();
        let token = issuer.mint("lead_abc", "conv_xyz").unwrap();
        let claims = issuer.verify(&token.token).unwrap();

        assert_eq!(claims.sub, "lead_abc");
        assert_eq!(claims.conversation, "conv_xyz");
        assert_eq!(claims.iss, "realty-test");
        assert_eq!(claims.exp - claims.iat, 3_600);
        assert!(LeadTokenIssuer::expiry_of(&claims).is_some());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let issuer = LeadTokenIssuer::new("test-secret-that-is-long-enough", "realty-test", Duration::seconds(-30));
        let token = issuer.mint("lead_abc", "conv_xyz").unwrap();

        assert!(matches!(issuer.verify(&token.token), Err(AuthError::LeadTokenExpired)));
    }

    #[test]
    fn foreign_secret_or_issuer_is_rejected() {
        let token = issuer().mint("lead_abc", "conv_xyz").unwrap();

        let other_secret = LeadTokenIssuer::new("another-secret-entirely", "realty-test", Duration::hours(1));
        assert!(matches!(other_secret.verify(&token.token), Err(AuthError::InvalidLeadToken)));

        let other_issuer = LeadTokenIssuer::new("test-secret-that-is-long-enough", "elsewhere", Duration::hours(1));
        assert!(matches!(other_issuer.verify(&token.token), Err(AuthError::InvalidLeadToken)));

        assert!(matches!(issuer().verify("not.a.token"), Err(AuthError::InvalidLeadToken)));
    }
}
