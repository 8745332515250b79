//! Versioned PASETO token provider
//!
//! Exactly one scheme generation is active per process. The generations
//! differ only in algorithm identifiers and key types, which the [`Scheme`]
//! trait captures; [`PasetoProvider`] implements the shared control flow
//! once for both.
//!
//! ## Key loading
//!
//! At construction the provider tries to load:
//! 1. the public key (SSH authorized-key line, ed25519 only)
//! 2. the symmetric key (hex from configuration)
//! 3. the private key (PEM), opportunistically
//!
//! Construction fails only when neither 1 nor 2 could be loaded. A missing
//! private key leaves the provider able to validate but not sign.

use crate::auth::keys::{self, GeneratedKeyPair, KeyError};
use crate::auth::{
    KeyRole, TokenClaims, TokenError, TokenKind, TokenProvider, TokenPurpose, TokenVersion,
};
use crate::config::PasetoSettings;
use chrono::SecondsFormat;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::errors::Error as PasetoError;
use pasetors::keys::{
    AsymmetricKeyPair, AsymmetricPublicKey, AsymmetricSecretKey, Generate, SymmetricKey,
};
use pasetors::token::UntrustedToken;
use pasetors::version2::{self, V2};
use pasetors::version4::{self, V4};
use pasetors::{Local, Public};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Algorithm and key-type bindings for one PASETO generation
pub trait Scheme: Send + Sync + 'static {
    const VERSION: TokenVersion;

    type SymmetricKey: Send + Sync;
    type PublicKey: Send + Sync;
    type SecretKey: Send + Sync;

    fn symmetric_key(bytes: &[u8]) -> Result<Self::SymmetricKey, PasetoError>;
    fn public_key(bytes: &[u8]) -> Result<Self::PublicKey, PasetoError>;
    fn secret_key(bytes: &[u8]) -> Result<Self::SecretKey, PasetoError>;

    fn generate_symmetric_key() -> Result<Vec<u8>, PasetoError>;
    /// Returns `(public, secret)` raw key bytes
    fn generate_key_pair() -> Result<(Vec<u8>, Vec<u8>), PasetoError>;

    fn encrypt(key: &Self::SymmetricKey, payload: &[u8]) -> Result<String, PasetoError>;
    fn sign(key: &Self::SecretKey, payload: &[u8]) -> Result<String, PasetoError>;

    /// Decrypt a local token and return its payload
    fn decrypt(key: &Self::SymmetricKey, token: &str) -> Result<String, PasetoError>;
    /// Verify a public token and return its payload
    fn verify(key: &Self::PublicKey, token: &str) -> Result<String, PasetoError>;
}

impl Scheme for V2 {
    const VERSION: TokenVersion = TokenVersion::V2;

    type SymmetricKey = SymmetricKey<V2>;
    type PublicKey = AsymmetricPublicKey<V2>;
    type SecretKey = AsymmetricSecretKey<V2>;

    fn symmetric_key(bytes: &[u8]) -> Result<Self::SymmetricKey, PasetoError> {
        SymmetricKey::<V2>::from(bytes)
    }

    fn public_key(bytes: &[u8]) -> Result<Self::PublicKey, PasetoError> {
        AsymmetricPublicKey::<V2>::from(bytes)
    }

    fn secret_key(bytes: &[u8]) -> Result<Self::SecretKey, PasetoError> {
        AsymmetricSecretKey::<V2>::from(bytes)
    }

    fn generate_symmetric_key() -> Result<Vec<u8>, PasetoError> {
        Ok(SymmetricKey::<V2>::generate()?.as_bytes().to_vec())
    }

    fn generate_key_pair() -> Result<(Vec<u8>, Vec<u8>), PasetoError> {
        let pair = AsymmetricKeyPair::<V2>::generate()?;
        Ok((
            pair.public.as_bytes().to_vec(),
            pair.secret.as_bytes().to_vec(),
        ))
    }

    fn encrypt(key: &Self::SymmetricKey, payload: &[u8]) -> Result<String, PasetoError> {
        version2::LocalToken::encrypt(key, payload, None)
    }

    fn sign(key: &Self::SecretKey, payload: &[u8]) -> Result<String, PasetoError> {
        version2::PublicToken::sign(key, payload, None)
    }

    fn decrypt(key: &Self::SymmetricKey, token: &str) -> Result<String, PasetoError> {
        let untrusted = UntrustedToken::<Local, V2>::try_from(token)?;
        let trusted = version2::LocalToken::decrypt(key, &untrusted, None)?;
        Ok(trusted.payload().to_owned())
    }

    fn verify(key: &Self::PublicKey, token: &str) -> Result<String, PasetoError> {
        let untrusted = UntrustedToken::<Public, V2>::try_from(token)?;
        let trusted = version2::PublicToken::verify(key, &untrusted, None)?;
        Ok(trusted.payload().to_owned())
    }
}

impl Scheme for V4 {
    const VERSION: TokenVersion = TokenVersion::V4;

    type SymmetricKey = SymmetricKey<V4>;
    type PublicKey = AsymmetricPublicKey<V4>;
    type SecretKey = AsymmetricSecretKey<V4>;

    fn symmetric_key(bytes: &[u8]) -> Result<Self::SymmetricKey, PasetoError> {
        SymmetricKey::<V4>::from(bytes)
    }

    fn public_key(bytes: &[u8]) -> Result<Self::PublicKey, PasetoError> {
        AsymmetricPublicKey::<V4>::from(bytes)
    }

    fn secret_key(bytes: &[u8]) -> Result<Self::SecretKey, PasetoError> {
        AsymmetricSecretKey::<V4>::from(bytes)
    }

    fn generate_symmetric_key() -> Result<Vec<u8>, PasetoError> {
        Ok(SymmetricKey::<V4>::generate()?.as_bytes().to_vec())
    }

    fn generate_key_pair() -> Result<(Vec<u8>, Vec<u8>), PasetoError> {
        let pair = AsymmetricKeyPair::<V4>::generate()?;
        Ok((
            pair.public.as_bytes().to_vec(),
            pair.secret.as_bytes().to_vec(),
        ))
    }

    fn encrypt(key: &Self::SymmetricKey, payload: &[u8]) -> Result<String, PasetoError> {
        version4::LocalToken::encrypt(key, payload, None, None)
    }

    fn sign(key: &Self::SecretKey, payload: &[u8]) -> Result<String, PasetoError> {
        version4::PublicToken::sign(key, payload, None, None)
    }

    fn decrypt(key: &Self::SymmetricKey, token: &str) -> Result<String, PasetoError> {
        let untrusted = UntrustedToken::<Local, V4>::try_from(token)?;
        let trusted = version4::LocalToken::decrypt(key, &untrusted, None, None)?;
        Ok(trusted.payload().to_owned())
    }

    fn verify(key: &Self::PublicKey, token: &str) -> Result<String, PasetoError> {
        let untrusted = UntrustedToken::<Public, V4>::try_from(token)?;
        let trusted = version4::PublicToken::verify(key, &untrusted, None, None)?;
        Ok(trusted.payload().to_owned())
    }
}

/// Token provider for a single PASETO generation
pub struct PasetoProvider<S: Scheme> {
    public_key: Option<S::PublicKey>,
    symmetric_key: Option<S::SymmetricKey>,
    private_key: Option<S::SecretKey>,
    _scheme: PhantomData<S>,
}

impl<S: Scheme> PasetoProvider<S> {
    /// Load key material as described in the module documentation
    pub fn new(settings: &PasetoSettings) -> Result<Self, TokenError> {
        let public_key = keys::read_public_key(&settings.public_path)
            .and_then(|bytes| S::public_key(&bytes).map_err(rejected));
        let symmetric_key = keys::decode_symmetric_key(&settings.secret_key)
            .and_then(|bytes| S::symmetric_key(&bytes).map_err(rejected));

        let (public_key, symmetric_key) = match (public_key, symmetric_key) {
            (Err(public_error), Err(symmetric_error)) => {
                warn!(
                    version = %S::VERSION,
                    asymmetric_public_key_error = %public_error,
                    symmetric_key_error = %symmetric_error,
                    "Failed to read either a public key or a symmetric key for signing and verification"
                );
                return Err(TokenError::NoKeyMaterial {
                    public: public_error.to_string(),
                    symmetric: symmetric_error.to_string(),
                });
            }
            (public_key, symmetric_key) => (
                loaded(public_key, KeyRole::Public, settings),
                loaded(symmetric_key, KeyRole::Symmetric, settings),
            ),
        };

        let private_key = keys::read_private_key(&settings.key_path)
            .and_then(|bytes| S::secret_key(&bytes).map_err(rejected));
        let private_key = loaded(private_key, KeyRole::Private, settings);

        info!(
            version = %S::VERSION,
            public_key = public_key.is_some(),
            symmetric_key = symmetric_key.is_some(),
            private_key = private_key.is_some(),
            "PASETO provider ready"
        );

        Ok(Self {
            public_key,
            symmetric_key,
            private_key,
            _scheme: PhantomData,
        })
    }

    pub fn can_sign(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn can_encrypt(&self) -> bool {
        self.symmetric_key.is_some()
    }

    fn check_claims(payload: &str) -> Result<(), TokenError> {
        let claims = Claims::from_string(payload).map_err(|_| TokenError::InvalidToken)?;
        ClaimsValidationRules::new()
            .validate_claims(&claims)
            .map_err(|_| TokenError::InvalidToken)
    }
}

fn rejected(error: PasetoError) -> KeyError {
    KeyError::Rejected(error.to_string())
}

fn loaded<K>(key: Result<K, KeyError>, role: KeyRole, settings: &PasetoSettings) -> Option<K> {
    match key {
        Ok(key) => Some(key),
        Err(error) => {
            let path = match role {
                KeyRole::Public => Some(&settings.public_path),
                KeyRole::Private => Some(&settings.key_path),
                KeyRole::Symmetric => None,
            };
            warn!(
                key = %role,
                path = ?path,
                error = %error,
                "Key unavailable, continuing with reduced capabilities"
            );
            None
        }
    }
}

impl<S: Scheme> TokenProvider for PasetoProvider<S> {
    fn version(&self) -> TokenVersion {
        S::VERSION
    }

    fn generate_symmetric_key(&self) -> Result<String, TokenError> {
        generate_symmetric_key(S::VERSION)
    }

    fn generate_asymmetric_key_pair(&self) -> Result<GeneratedKeyPair, TokenError> {
        generate_asymmetric_key_pair(S::VERSION)
    }

    fn encrypt_token(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let key = self
            .symmetric_key
            .as_ref()
            .ok_or(TokenError::KeyNotConfigured(KeyRole::Symmetric))?;
        let payload = claims_payload(claims)?;
        S::encrypt(key, payload.as_bytes()).map_err(|e| TokenError::Claims(e.to_string()))
    }

    fn sign_token(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let key = self
            .private_key
            .as_ref()
            .ok_or(TokenError::KeyNotConfigured(KeyRole::Private))?;
        let payload = claims_payload(claims)?;
        S::sign(key, payload.as_bytes()).map_err(|e| TokenError::Claims(e.to_string()))
    }

    fn validate_token(&self, token: &str) -> Result<(), TokenError> {
        let kind = TokenKind::parse(token)?;
        if kind.version != S::VERSION {
            warn!(kind = %kind, expected = %S::VERSION, "Token version does not match provider");
            return Err(TokenError::UnsupportedTokenFormat);
        }

        let payload = match kind.purpose {
            TokenPurpose::Local => match &self.symmetric_key {
                Some(key) => S::decrypt(key, token),
                None => {
                    warn!(kind = %kind, "No symmetric key loaded, rejecting token");
                    return Err(TokenError::InvalidToken);
                }
            },
            TokenPurpose::Public => match &self.public_key {
                Some(key) => S::verify(key, token),
                None => {
                    warn!(kind = %kind, "No public key loaded, rejecting token");
                    return Err(TokenError::InvalidToken);
                }
            },
        }
        .map_err(|error| {
            debug!(kind = %kind, error = %error, "Token failed cryptographic checks");
            TokenError::InvalidToken
        })?;

        Self::check_claims(&payload)
    }
}

fn claims_payload(claims: &TokenClaims) -> Result<String, TokenError> {
    let to_claims = || -> Result<String, PasetoError> {
        let mut token_claims = Claims::new()?;
        token_claims.issued_at(&claims.issued_at.to_rfc3339_opts(SecondsFormat::Secs, true))?;
        token_claims.not_before(&claims.not_before.to_rfc3339_opts(SecondsFormat::Secs, true))?;
        token_claims.expiration(&claims.expiration.to_rfc3339_opts(SecondsFormat::Secs, true))?;
        token_claims.to_string()
    };
    to_claims().map_err(|e| TokenError::Claims(e.to_string()))
}

/// Generate a hex encoded symmetric key for the given generation
pub fn generate_symmetric_key(version: TokenVersion) -> Result<String, TokenError> {
    let bytes = match version {
        TokenVersion::V2 => V2::generate_symmetric_key(),
        TokenVersion::V4 => V4::generate_symmetric_key(),
    }
    .map_err(|e| TokenError::KeyGeneration(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// Generate a fresh ed25519 key pair, independent of any loaded key
pub fn generate_asymmetric_key_pair(
    version: TokenVersion,
) -> Result<GeneratedKeyPair, TokenError> {
    let (public, secret) = match version {
        TokenVersion::V2 => V2::generate_key_pair(),
        TokenVersion::V4 => V4::generate_key_pair(),
    }
    .map_err(|e| TokenError::KeyGeneration(e.to_string()))?;
    keys::encode_key_pair(&public, &secret).map_err(|e| TokenError::KeyGeneration(e.to_string()))
}

/// Select and construct the provider for the configured generation
pub fn build_provider(settings: &PasetoSettings) -> Result<Arc<dyn TokenProvider>, TokenError> {
    Ok(match settings.version {
        TokenVersion::V2 => Arc::new(PasetoProvider::<V2>::new(settings)?),
        TokenVersion::V4 => Arc::new(PasetoProvider::<V4>::new(settings)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use rstest::rstest;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    struct KeyFixture {
        _dir: TempDir,
        settings: PasetoSettings,
    }

    fn fixture(version: TokenVersion) -> KeyFixture {
        let dir = tempfile::tempdir().unwrap();
        let pair = generate_asymmetric_key_pair(version).unwrap();
        let key_path = dir.path().join("paseto.key");
        let public_path = dir.path().join("paseto.pub");
        std::fs::write(&key_path, &pair.private_key).unwrap();
        std::fs::write(&public_path, &pair.public_key).unwrap();

        KeyFixture {
            settings: PasetoSettings {
                version,
                expiration_seconds: 3600,
                key_path,
                public_path,
                secret_key: generate_symmetric_key(version).unwrap(),
            },
            _dir: dir,
        }
    }

    fn valid_claims() -> TokenClaims {
        TokenClaims::issued_now(Duration::from_secs(3600))
    }

    #[rstest]
    #[case(TokenVersion::V2)]
    #[case(TokenVersion::V4)]
    fn test_signed_token_round_trip(#[case] version: TokenVersion) {
        let keys = fixture(version);
        let provider = build_provider(&keys.settings).unwrap();

        let token = provider.sign_token(&valid_claims()).unwrap();
        assert!(token.starts_with(&format!("{version}.public.")));
        assert!(provider.validate_token(&token).is_ok());
    }

    #[rstest]
    #[case(TokenVersion::V2)]
    #[case(TokenVersion::V4)]
    fn test_encrypted_token_round_trip(#[case] version: TokenVersion) {
        let keys = fixture(version);
        let provider = build_provider(&keys.settings).unwrap();

        let token = provider.encrypt_token(&valid_claims()).unwrap();
        assert!(token.starts_with(&format!("{version}.local.")));
        assert!(provider.validate_token(&token).is_ok());
    }

    #[test]
    fn test_generations_do_not_interoperate() {
        let v2 = build_provider(&fixture(TokenVersion::V2).settings).unwrap();
        let v4 = build_provider(&fixture(TokenVersion::V4).settings).unwrap();

        let v2_token = v2.sign_token(&valid_claims()).unwrap();
        let v4_token = v4.encrypt_token(&valid_claims()).unwrap();

        assert!(matches!(
            v4.validate_token(&v2_token),
            Err(TokenError::UnsupportedTokenFormat)
        ));
        assert!(matches!(
            v2.validate_token(&v4_token),
            Err(TokenError::UnsupportedTokenFormat)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = fixture(TokenVersion::V4);
        let provider = build_provider(&keys.settings).unwrap();
        let now = Utc::now();
        let claims = TokenClaims {
            issued_at: now - ChronoDuration::hours(2),
            not_before: now - ChronoDuration::hours(2),
            expiration: now - ChronoDuration::hours(1),
        };

        let signed = provider.sign_token(&claims).unwrap();
        let encrypted = provider.encrypt_token(&claims).unwrap();
        assert!(matches!(
            provider.validate_token(&signed),
            Err(TokenError::InvalidToken)
        ));
        assert!(matches!(
            provider.validate_token(&encrypted),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_not_yet_valid_token_is_rejected() {
        let keys = fixture(TokenVersion::V2);
        let provider = build_provider(&keys.settings).unwrap();
        let now = Utc::now();
        let claims = TokenClaims {
            issued_at: now,
            not_before: now + ChronoDuration::hours(1),
            expiration: now + ChronoDuration::hours(2),
        };

        let token = provider.encrypt_token(&claims).unwrap();
        assert!(matches!(
            provider.validate_token(&token),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_forged_and_expired_tokens_are_indistinguishable() {
        let keys = fixture(TokenVersion::V4);
        let provider = build_provider(&keys.settings).unwrap();
        let other = build_provider(&fixture(TokenVersion::V4).settings).unwrap();

        let forged = other.sign_token(&valid_claims()).unwrap();
        let now = Utc::now();
        let expired = provider
            .sign_token(&TokenClaims {
                issued_at: now - ChronoDuration::hours(2),
                not_before: now - ChronoDuration::hours(2),
                expiration: now - ChronoDuration::hours(1),
            })
            .unwrap();

        let forged_error = provider.validate_token(&forged).unwrap_err();
        let expired_error = provider.validate_token(&expired).unwrap_err();
        assert_eq!(forged_error.to_string(), expired_error.to_string());
    }

    #[test]
    fn test_unknown_prefix_is_unsupported() {
        let keys = fixture(TokenVersion::V4);
        let provider = build_provider(&keys.settings).unwrap();

        for token in ["v3.local.abc", "v4.secret.abc", "garbage", ""] {
            assert!(matches!(
                provider.validate_token(token),
                Err(TokenError::UnsupportedTokenFormat)
            ));
        }
    }

    #[test]
    fn test_tampered_token_is_invalid() {
        let keys = fixture(TokenVersion::V4);
        let provider = build_provider(&keys.settings).unwrap();
        let mut token = provider.encrypt_token(&valid_claims()).unwrap();
        let last = token.pop().unwrap();
        token.push(if last == 'A' { 'B' } else { 'A' });

        assert!(matches!(
            provider.validate_token(&token),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_missing_private_key_degrades_to_validate_only() {
        let mut keys = fixture(TokenVersion::V4);
        let signer = build_provider(&keys.settings).unwrap();
        keys.settings.key_path = Path::new("/nonexistent/paseto.key").to_path_buf();

        let provider = PasetoProvider::<V4>::new(&keys.settings).unwrap();
        assert!(!provider.can_sign());
        assert!(provider.can_encrypt());
        assert!(matches!(
            provider.sign_token(&valid_claims()),
            Err(TokenError::KeyNotConfigured(KeyRole::Private))
        ));

        let token = signer.sign_token(&valid_claims()).unwrap();
        assert!(provider.validate_token(&token).is_ok());
    }

    #[test]
    fn test_malformed_private_key_degrades_to_validate_only() {
        let keys = fixture(TokenVersion::V4);
        let document = pem::encode(&pem::Pem::new(keys::PRIVATE_KEY_PEM_TAG, vec![1u8, 2, 3]));
        std::fs::write(&keys.settings.key_path, document).unwrap();

        let provider = PasetoProvider::<V4>::new(&keys.settings).unwrap();
        assert!(!provider.can_sign());
        assert!(provider.can_encrypt());

        let token = provider.encrypt_token(&valid_claims()).unwrap();
        assert!(provider.validate_token(&token).is_ok());
    }

    #[test]
    fn test_non_ed25519_public_key_without_symmetric_key_is_fatal() {
        let mut keys = fixture(TokenVersion::V2);
        std::fs::write(&keys.settings.public_path, keys::ECDSA_AUTHORIZED_KEY).unwrap();
        keys.settings.secret_key = String::new();

        match build_provider(&keys.settings) {
            Err(TokenError::NoKeyMaterial { public, .. }) => {
                assert!(public.contains("ecdsa-sha2-nistp256"), "{public}");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("provider built without usable key material"),
        }
    }

    #[test]
    fn test_public_key_alone_is_enough() {
        let mut keys = fixture(TokenVersion::V2);
        keys.settings.secret_key = String::new();

        let provider = PasetoProvider::<V2>::new(&keys.settings).unwrap();
        assert!(!provider.can_encrypt());
        assert!(matches!(
            provider.encrypt_token(&valid_claims()),
            Err(TokenError::KeyNotConfigured(KeyRole::Symmetric))
        ));
    }

    #[test]
    fn test_local_token_rejected_without_symmetric_key() {
        let mut keys = fixture(TokenVersion::V4);
        let encrypter = build_provider(&keys.settings).unwrap();
        keys.settings.secret_key = "not-hex".to_string();
        let provider = build_provider(&keys.settings).unwrap();

        let token = encrypter.encrypt_token(&valid_claims()).unwrap();
        assert!(matches!(
            provider.validate_token(&token),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_no_key_material_is_fatal() {
        let settings = PasetoSettings {
            version: TokenVersion::V4,
            expiration_seconds: 60,
            key_path: "/nonexistent/paseto.key".into(),
            public_path: "/nonexistent/paseto.pub".into(),
            secret_key: String::new(),
        };

        assert!(matches!(
            build_provider(&settings),
            Err(TokenError::NoKeyMaterial { .. })
        ));
    }

    #[test]
    fn test_generated_keys_are_fresh() {
        let first = generate_symmetric_key(TokenVersion::V4).unwrap();
        let second = generate_symmetric_key(TokenVersion::V4).unwrap();
        assert_eq!(first.len(), 64);
        assert_ne!(first, second);

        let first = generate_asymmetric_key_pair(TokenVersion::V4).unwrap();
        let second = generate_asymmetric_key_pair(TokenVersion::V4).unwrap();
        assert_ne!(first.public_key, second.public_key);
    }
}
