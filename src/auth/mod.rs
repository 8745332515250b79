//! Token issuance, validation and request authorization
//!
//! Bearer tokens are PASETO strings of the form `<version>.<purpose>.<payload>`.
//! The `<version>.<purpose>.` prefix is the sole dispatch key for validation
//! and is decoded once into a [`TokenKind`].

pub mod authorization;
pub mod keys;
pub mod paseto;

pub use authorization::{AuthorizationService, Authorize};
pub use keys::{GeneratedKeyPair, KeyError};
pub use paseto::{build_provider, PasetoProvider, Scheme};

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// PASETO scheme generation, selected once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenVersion {
    #[display("v2")]
    V2,
    #[display("v4")]
    V4,
}

/// Token payload mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TokenPurpose {
    /// Symmetrically encrypted
    #[display("local")]
    Local,
    /// Asymmetrically signed, payload readable
    #[display("public")]
    Public,
}

/// Decoded `<version>.<purpose>` header of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{version}.{purpose}")]
pub struct TokenKind {
    pub version: TokenVersion,
    pub purpose: TokenPurpose,
}

impl TokenKind {
    pub fn parse(token: &str) -> Result<Self, TokenError> {
        let mut segments = token.splitn(3, '.');
        let (Some(version), Some(purpose), Some(_payload)) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(TokenError::UnsupportedTokenFormat);
        };

        let version = match version {
            "v2" => TokenVersion::V2,
            "v4" => TokenVersion::V4,
            _ => return Err(TokenError::UnsupportedTokenFormat),
        };
        let purpose = match purpose {
            "local" => TokenPurpose::Local,
            "public" => TokenPurpose::Public,
            _ => return Err(TokenError::UnsupportedTokenFormat),
        };

        Ok(Self { version, purpose })
    }
}

/// The only claims a gateway token carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenClaims {
    pub issued_at: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
}

impl TokenClaims {
    /// Claims valid from now until `now + expiration`
    pub fn issued_now(expiration: Duration) -> Self {
        let now = Utc::now();
        let lifetime = chrono::Duration::from_std(expiration).unwrap_or(chrono::Duration::MAX);
        Self {
            issued_at: now,
            not_before: now,
            expiration: now.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

/// Key roles, reported when a capability is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum KeyRole {
    #[display("symmetric")]
    Symmetric,
    #[display("public")]
    Public,
    #[display("private")]
    Private,
}

/// Token provider errors
///
/// Every cryptographic or claim failure during validation collapses into
/// [`TokenError::InvalidToken`] so callers cannot tell a forged token from an
/// expired one.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("unable to read either a public key ({public}) or a symmetric key ({symmetric}) for signing and verification")]
    NoKeyMaterial { public: String, symmetric: String },

    #[error("{0} key is not configured")]
    KeyNotConfigured(KeyRole),

    #[error("unsupported token format")]
    UnsupportedTokenFormat,

    #[error("invalid token")]
    InvalidToken,

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("failed to build token claims: {0}")]
    Claims(String),
}

/// Versioned token capability shared by the middleware and admin operations
pub trait TokenProvider: Send + Sync {
    fn version(&self) -> TokenVersion;

    /// Fresh hex encoded symmetric key; does not touch loaded keys
    fn generate_symmetric_key(&self) -> Result<String, TokenError>;

    /// Fresh ed25519 key pair; does not touch loaded keys
    fn generate_asymmetric_key_pair(&self) -> Result<GeneratedKeyPair, TokenError>;

    /// Produce a local token with the loaded symmetric key
    fn encrypt_token(&self, claims: &TokenClaims) -> Result<String, TokenError>;

    /// Produce a public token with the loaded private key
    fn sign_token(&self, claims: &TokenClaims) -> Result<String, TokenError>;

    fn validate_token(&self, token: &str) -> Result<(), TokenError>;
}
