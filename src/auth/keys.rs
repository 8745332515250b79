//! Key material codecs
//!
//! Public keys are stored as a single SSH authorized-key line, private keys
//! as PEM blocks tagged `ED25519 PRIVATE KEY` holding the 64 byte ed25519
//! keypair (seed followed by public key), symmetric keys as hex strings.

use ssh_key::public::{Ed25519PublicKey, KeyData};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// PEM tag used for persisted private keys
pub const PRIVATE_KEY_PEM_TAG: &str = "ED25519 PRIVATE KEY";

/// Length of an ed25519 public key
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of an ed25519 keypair as stored in the PEM block
pub const PRIVATE_KEY_LENGTH: usize = 64;

/// Failures reading or encoding key material
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("failed to read key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid authorized key: {0}")]
    AuthorizedKey(#[from] ssh_key::Error),

    #[error("public key must be ed25519, found {0}")]
    NotEd25519(String),

    #[error("invalid PEM: {0}")]
    Pem(#[from] pem::PemError),

    #[error("unexpected PEM tag {0:?}")]
    UnexpectedPemTag(String),

    #[error("private key must be {PRIVATE_KEY_LENGTH} bytes, found {0}")]
    PrivateKeyLength(usize),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("symmetric key is not configured")]
    EmptySymmetricKey,

    #[error("key rejected: {0}")]
    Rejected(String),
}

/// Freshly generated asymmetric key pair in its persisted encodings
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedKeyPair {
    /// Authorized-key line, newline terminated
    pub public_key: String,
    /// PEM document
    pub private_key: String,
}

impl std::fmt::Debug for GeneratedKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedKeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

fn read_file(path: &Path) -> Result<String, KeyError> {
    std::fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse an SSH authorized-key line into raw ed25519 public key bytes
pub fn parse_public_key(line: &str) -> Result<[u8; PUBLIC_KEY_LENGTH], KeyError> {
    let key = ssh_key::PublicKey::from_openssh(line.trim())?;
    match key.key_data() {
        KeyData::Ed25519(Ed25519PublicKey(bytes)) => Ok(*bytes),
        other => Err(KeyError::NotEd25519(other.algorithm().to_string())),
    }
}

pub fn read_public_key(path: &Path) -> Result<[u8; PUBLIC_KEY_LENGTH], KeyError> {
    parse_public_key(&read_file(path)?)
}

/// Parse a PEM document into raw ed25519 keypair bytes
pub fn parse_private_key(document: &str) -> Result<Vec<u8>, KeyError> {
    let block = pem::parse(document)?;
    if block.tag() != PRIVATE_KEY_PEM_TAG {
        return Err(KeyError::UnexpectedPemTag(block.tag().to_string()));
    }

    match block.contents().len() {
        PRIVATE_KEY_LENGTH => Ok(block.contents().to_vec()),
        other => Err(KeyError::PrivateKeyLength(other)),
    }
}

pub fn read_private_key(path: &Path) -> Result<Vec<u8>, KeyError> {
    parse_private_key(&read_file(path)?)
}

pub fn decode_symmetric_key(encoded: &str) -> Result<Vec<u8>, KeyError> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(KeyError::EmptySymmetricKey);
    }
    Ok(hex::decode(encoded)?)
}

/// Encode raw ed25519 key bytes into the persisted text formats
pub fn encode_key_pair(public: &[u8], secret: &[u8]) -> Result<GeneratedKeyPair, KeyError> {
    let public: [u8; PUBLIC_KEY_LENGTH] = public
        .try_into()
        .map_err(|_| KeyError::Rejected(format!("public key is {} bytes", public.len())))?;
    if secret.len() != PRIVATE_KEY_LENGTH {
        return Err(KeyError::PrivateKeyLength(secret.len()));
    }

    let authorized = ssh_key::PublicKey::new(KeyData::Ed25519(Ed25519PublicKey(public)), "");
    let mut public_key = authorized.to_openssh()?;
    public_key.push('\n');

    let private_key = pem::encode(&pem::Pem::new(PRIVATE_KEY_PEM_TAG, secret.to_vec()));

    Ok(GeneratedKeyPair {
        public_key,
        private_key,
    })
}

/// Valid authorized-key line for a non-ed25519 key
#[cfg(test)]
pub(crate) const ECDSA_AUTHORIZED_KEY: &str = "ecdsa-sha2-nistp256 AAAAE2VjZHNhLXNoYTItbmlzdHAyNTYAAAAIbmlzdHAyNTYAAABBBEK/K1tjDfjNA/FH2huf9arspk0FFvhft8YzNgMpwotI4E/IA+n/eyK5MSqmoOkn1gs0QIQwzsG2xECZdBVfKPM=\n";
