//! Identity-scoped persistence of the local keypair.
//!
//! One active keypair per identity. The private half is encrypted at rest
//! with Argon2id + AES-256-GCM under a store passphrase; the public half is
//! written alongside it in plaintext JSON so it can be read (and republished)
//! without the passphrase.
//!
//! # Private key file format (SPKEY01)
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ Magic: "SPKEY01\n" (8 bytes) │
//! ├──────────────────────────────┤
//! │ Header Length: u32 LE        │
//! ├──────────────────────────────┤
//! │ Header (JSON: KDF params,    │
//! │ salt, nonce, metadata)       │
//! ├──────────────────────────────┤
//! │ Sealed key (32 + 16 bytes)   │
//! └──────────────────────────────┘
//! ```
//!
//! Concurrent `persist` calls for the same identity race last-write-wins;
//! key setup is assumed to happen once, interactively.

use std::path::{Path, PathBuf};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SealpostError};
use crate::keys::{Keypair, PortablePublicKey, PrivateKey, StoredKeypair};

/// Magic bytes for the encrypted private key file.
pub const MAGIC_KEYFILE: &[u8; 8] = b"SPKEY01\n";

/// Minimum store passphrase length.
pub const MIN_PASSPHRASE_LENGTH: usize = 12;

/// Argon2id parameters recorded in the key file header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory in KiB.
    pub memory_kib: u32,
    /// Time iterations.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MiB
            iterations: 3,
            parallelism: 4,
        }
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct StoreKey([u8; 32]);

fn derive_store_key(passphrase: &str, salt: &[u8; 32], params: &KdfParams) -> Result<StoreKey> {
    let argon_params = Params::new(params.memory_kib, params.iterations, params.parallelism, Some(32))
        .map_err(|e| SealpostError::CryptoUnavailable(format!("Argon2 params: {}", e)))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = [0u8; 32];
    argon
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| SealpostError::CryptoUnavailable(format!("Argon2 derivation: {}", e)))?;
    Ok(StoreKey(key))
}

/// Header of the encrypted private key file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyFileHeader {
    version: u8,
    kdf: String,
    kdf_params: KdfParams,
    salt: String,
    nonce: String,
    key_version: u8,
    created_at: DateTime<Utc>,
}

/// Plaintext JSON file holding the exported public half.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PublicKeyFile {
    version: u8,
    public_key: PortablePublicKey,
    created_at: DateTime<Utc>,
}

/// Filesystem-backed store of per-identity keypairs.
#[derive(Debug, Clone)]
pub struct KeyStore {
    root: PathBuf,
}

impl KeyStore {
    /// Open a keystore rooted at `root`. The directory is created on the
    /// first `persist`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn validate_identity(identity: &str) -> Result<()> {
        let ok = !identity.is_empty()
            && identity
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
        if !ok {
            return Err(SealpostError::InvalidIdentity(identity.to_string()));
        }
        Ok(())
    }

    fn private_path(&self, identity: &str) -> PathBuf {
        self.root.join(format!("{}.key", identity.to_ascii_lowercase()))
    }

    fn public_path(&self, identity: &str) -> PathBuf {
        self.root.join(format!("{}.pub", identity.to_ascii_lowercase()))
    }

    /// Write the pair for `identity`, overwriting any prior pair.
    pub fn persist(
        &self,
        identity: &str,
        stored: &StoredKeypair,
        passphrase: &str,
    ) -> Result<()> {
        Self::validate_identity(identity)?;
        if passphrase.len() < MIN_PASSPHRASE_LENGTH {
            return Err(SealpostError::PassphraseTooShort(MIN_PASSPHRASE_LENGTH));
        }
        std::fs::create_dir_all(&self.root)?;

        let encrypted = seal_private_key(stored, passphrase)?;
        std::fs::write(self.private_path(identity), encrypted)?;

        let public_file = PublicKeyFile {
            version: 1,
            public_key: PortablePublicKey::from_public(&stored.keypair.public),
            created_at: stored.created_at,
        };
        let json = serde_json::to_string_pretty(&public_file)?;
        std::fs::write(self.public_path(identity), json)?;

        info!(identity = %identity, "persisted keypair");
        Ok(())
    }

    /// Load the pair for `identity`.
    ///
    /// Returns `Ok(None)` when no pair has been persisted: callers treat
    /// that as "needs setup", not as an error. A present-but-undecryptable
    /// file (wrong passphrase, corruption) is an error.
    pub fn load(&self, identity: &str, passphrase: &str) -> Result<Option<StoredKeypair>> {
        Self::validate_identity(identity)?;
        let path = self.private_path(identity);
        if !path.exists() {
            debug!(identity = %identity, "no keypair on disk");
            return Ok(None);
        }
        let encrypted = std::fs::read(&path)?;
        let stored = open_private_key(&encrypted, passphrase)?;
        Ok(Some(stored))
    }

    /// Read the exported public half without the passphrase.
    pub fn load_public(&self, identity: &str) -> Result<Option<PortablePublicKey>> {
        Self::validate_identity(identity)?;
        let path = self.public_path(identity);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let file: PublicKeyFile = serde_json::from_str(&contents)?;
        Ok(Some(file.public_key))
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn seal_private_key(stored: &StoredKeypair, passphrase: &str) -> Result<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; 32];
    rng.fill_bytes(&mut salt);
    let mut nonce = [0u8; 12];
    rng.fill_bytes(&mut nonce);

    let kdf_params = KdfParams::default();
    let store_key = derive_store_key(passphrase, &salt, &kdf_params)?;

    let cipher = Aes256Gcm::new_from_slice(&store_key.0)
        .map_err(|e| SealpostError::Encryption(e.to_string()))?;
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            stored.keypair.private.as_bytes().as_slice(),
        )
        .map_err(|_| SealpostError::Encryption("key file encryption failed".into()))?;

    let b64 = base64::engine::general_purpose::STANDARD;
    let header = KeyFileHeader {
        version: 1,
        kdf: "argon2id".to_string(),
        kdf_params,
        salt: b64.encode(salt),
        nonce: b64.encode(nonce),
        key_version: stored.version,
        created_at: stored.created_at,
    };
    let header_json = serde_json::to_vec(&header)?;

    let mut output = Vec::with_capacity(8 + 4 + header_json.len() + sealed.len());
    output.extend_from_slice(MAGIC_KEYFILE);
    output.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
    output.extend_from_slice(&header_json);
    output.extend_from_slice(&sealed);
    Ok(output)
}

fn open_private_key(encrypted: &[u8], passphrase: &str) -> Result<StoredKeypair> {
    if encrypted.len() < 12 {
        return Err(SealpostError::Format("key file too short".into()));
    }
    if &encrypted[0..8] != MAGIC_KEYFILE {
        return Err(SealpostError::Format("not a sealpost key file".into()));
    }
    let header_len = u32::from_le_bytes(
        encrypted[8..12]
            .try_into()
            .map_err(|_| SealpostError::Format("invalid header length".into()))?,
    ) as usize;
    // Sealed key is 32 bytes plus the 16-byte tag.
    if encrypted.len() < 12 + header_len + 48 {
        return Err(SealpostError::Format("key file truncated".into()));
    }

    let header: KeyFileHeader = serde_json::from_slice(&encrypted[12..12 + header_len])?;

    let b64 = base64::engine::general_purpose::STANDARD;
    let salt: [u8; 32] = b64
        .decode(&header.salt)
        .ok()
        .and_then(|v| v.try_into().ok())
        .ok_or_else(|| SealpostError::Format("invalid salt".into()))?;
    let nonce: [u8; 12] = b64
        .decode(&header.nonce)
        .ok()
        .and_then(|v| v.try_into().ok())
        .ok_or_else(|| SealpostError::Format("invalid nonce".into()))?;

    let store_key = derive_store_key(passphrase, &salt, &header.kdf_params)?;
    let cipher =
        Aes256Gcm::new_from_slice(&store_key.0).map_err(|_| SealpostError::Decryption)?;
    let mut decrypted = cipher
        .decrypt(Nonce::from_slice(&nonce), &encrypted[12 + header_len..])
        .map_err(|_| SealpostError::Decryption)?;

    if decrypted.len() != 32 {
        decrypted.zeroize();
        return Err(SealpostError::Decryption);
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decrypted);
    decrypted.zeroize();

    let keypair = Keypair::from_private(PrivateKey::from_bytes(key_bytes));
    key_bytes.zeroize();

    Ok(StoredKeypair {
        keypair,
        created_at: header.created_at,
        version: header.key_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_VERSION;
    use tempfile::tempdir;

    const PASS: &str = "secure-passphrase-123";

    #[test]
    fn test_persist_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        let stored = StoredKeypair::new(Keypair::generate());
        store.persist("alice.bsky.social", &stored, PASS).unwrap();

        let loaded = store.load("alice.bsky.social", PASS).unwrap().unwrap();
        assert_eq!(
            loaded.keypair.private.as_bytes(),
            stored.keypair.private.as_bytes()
        );
        assert_eq!(
            loaded.keypair.public.as_bytes(),
            stored.keypair.public.as_bytes()
        );
        assert_eq!(loaded.version, KEY_VERSION);
        assert_eq!(loaded.created_at, stored.created_at);
    }

    #[test]
    fn test_load_missing_is_none_not_error() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        assert!(store.load("nobody", PASS).unwrap().is_none());
        assert!(store.load_public("nobody").unwrap().is_none());
    }

    #[test]
    fn test_identity_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        let stored = StoredKeypair::new(Keypair::generate());
        store.persist("Alice.Example", &stored, PASS).unwrap();

        let loaded = store.load("alice.example", PASS).unwrap();
        assert!(loaded.is_some());
    }

    #[test]
    fn test_persist_overwrites_prior_pair() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        let first = StoredKeypair::new(Keypair::generate());
        let second = StoredKeypair::new(Keypair::generate());
        store.persist("alice", &first, PASS).unwrap();
        store.persist("alice", &second, PASS).unwrap();

        let loaded = store.load("alice", PASS).unwrap().unwrap();
        assert_eq!(
            loaded.keypair.public.as_bytes(),
            second.keypair.public.as_bytes()
        );
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        store
            .persist("alice", &StoredKeypair::new(Keypair::generate()), PASS)
            .unwrap();
        let result = store.load("alice", "wrong-passphrase!");
        assert!(matches!(result, Err(SealpostError::Decryption)));
    }

    #[test]
    fn test_short_passphrase_rejected() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        let result = store.persist("alice", &StoredKeypair::new(Keypair::generate()), "short");
        assert!(matches!(result, Err(SealpostError::PassphraseTooShort(_))));
    }

    #[test]
    fn test_invalid_identity_rejected() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        for bad in ["", "../escape", "a/b", "user name"] {
            let result = store.persist(bad, &StoredKeypair::new(Keypair::generate()), PASS);
            assert!(
                matches!(result, Err(SealpostError::InvalidIdentity(_))),
                "identity {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_public_file_readable_without_passphrase() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        let stored = StoredKeypair::new(Keypair::generate());
        store.persist("alice", &stored, PASS).unwrap();

        let portable = store.load_public("alice").unwrap().unwrap();
        assert_eq!(
            portable.to_public().unwrap().as_bytes(),
            stored.keypair.public.as_bytes()
        );
    }

    #[test]
    fn test_private_file_has_magic_and_no_plaintext_key() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        let stored = StoredKeypair::new(Keypair::generate());
        store.persist("alice", &stored, PASS).unwrap();

        let raw = std::fs::read(dir.path().join("alice.key")).unwrap();
        assert_eq!(&raw[0..8], MAGIC_KEYFILE);
        let key = stored.keypair.private.as_bytes();
        assert!(!raw.windows(key.len()).any(|w| w == key.as_slice()));
    }

    #[test]
    fn test_tampered_key_file_fails() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        store
            .persist("alice", &StoredKeypair::new(Keypair::generate()), PASS)
            .unwrap();
        let path = dir.path().join("alice.key");
        let mut raw = std::fs::read(&path).unwrap();
        let len = raw.len();
        raw[len - 1] ^= 0xFF;
        std::fs::write(&path, raw).unwrap();

        assert!(store.load("alice", PASS).is_err());
    }
}
