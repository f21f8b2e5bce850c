//! Signing and parsing of bearer credentials.

use super::claims::CredentialClaims;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError<C> {
    #[error("credential is malformed")]
    Malformed,
    /// The signature verified but the credential is past its expiry. The
    /// claims are still handed back so the caller can decide what to do.
    #[error("credential has expired")]
    Expired(C),
    #[error("credential signature is invalid")]
    InvalidSignature,
}

/// Stateless HS256 signer/verifier bound to one secret and one lifetime.
pub struct CredentialCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl CredentialCodec {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self> {
        if secret.trim().is_empty() {
            bail!("Credential secret must not be empty");
        }
        if ttl <= Duration::zero() {
            bail!("Credential lifetime must be positive, got {}", ttl);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by hand so expired claims can still be returned.
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue<C: CredentialClaims>(&self, claims: C) -> Result<String> {
        self.issue_at(claims, Utc::now())
    }

    pub fn issue_at<C: CredentialClaims>(&self, mut claims: C, now: DateTime<Utc>) -> Result<String> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .with_context(|| format!("Credential lifetime {} overflows the clock", self.ttl))?;
        claims.stamp(now.timestamp(), expires_at.timestamp());
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to sign credential")
    }

    pub fn parse<C: CredentialClaims>(&self, credential: &str) -> Result<C, CredentialError<C>> {
        self.parse_at(credential, Utc::now())
    }

    pub fn parse_at<C: CredentialClaims>(
        &self,
        credential: &str,
        now: DateTime<Utc>,
    ) -> Result<C, CredentialError<C>> {
        let data = decode::<C>(credential, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_)
                | ErrorKind::MissingRequiredClaim(_) => CredentialError::Malformed,
                _ => CredentialError::InvalidSignature,
            }
        })?;

        let claims = data.claims;
        if claims.expires_at() <= now.timestamp() {
            return Err(CredentialError::Expired(claims));
        }
        Ok(claims)
    }
}
