//! Encrypted token keystore.
//!
//! Access tokens live outside the sync database, in a single
//! AES-256-GCM-encrypted file keyed by repository id. The 32-byte key is
//! generated on first use and stored next to the token file; both have
//! their own lifecycle independent of the database.
//!
//! File layout: `[version byte | 12-byte nonce | ciphertext+tag]`, with the
//! plaintext being a JSON map of repository id to token.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use tracing::{debug, info};

use crate::errors::KeystoreError;

const KEY_FILE: &str = "keystore.key";
const TOKENS_FILE: &str = "tokens.enc";

const VERSION_ENCRYPTED: u8 = 0x01;
const NONCE_LEN: usize = 12;
/// Context binding for the AEAD; a token file moved between purposes will
/// not decrypt.
const AAD: &[u8] = b"vaultsync.tokens.v1";

/// Encrypted repository-id → token store.
#[derive(Debug)]
pub struct TokenStore {
    tokens_path: PathBuf,
    key: [u8; 32],
    entries: Mutex<HashMap<i64, String>>,
}

impl TokenStore {
    /// Open (or create) the keystore inside `dir`.
    ///
    /// Generates a fresh random key on first use; afterwards the existing
    /// key file is required to read the token file.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, KeystoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let key = Self::load_or_create_key(&dir.join(KEY_FILE))?;
        let tokens_path = dir.join(TOKENS_FILE);
        let entries = if tokens_path.exists() {
            let encoded = std::fs::read_to_string(&tokens_path)?;
            let blob = BASE64
                .decode(encoded.trim())
                .map_err(|e| KeystoreError::DecryptionFailed(e.to_string()))?;
            Self::decrypt_entries(&key, &blob)?
        } else {
            HashMap::new()
        };

        info!(path = %tokens_path.display(), entries = entries.len(), "opened token keystore");
        Ok(Self {
            tokens_path,
            key,
            entries: Mutex::new(entries),
        })
    }

    /// Fetch the token for a repository, if one is stored.
    pub fn get_token(&self, repo_id: i64) -> Result<Option<String>, KeystoreError> {
        Ok(self.entries().get(&repo_id).cloned())
    }

    /// Store (or replace) the token for a repository.
    pub fn put_token(&self, repo_id: i64, token: impl Into<String>) -> Result<(), KeystoreError> {
        let snapshot = {
            let mut entries = self.entries();
            entries.insert(repo_id, token.into());
            entries.clone()
        };
        self.persist(&snapshot)?;
        debug!(repo_id, "stored token");
        Ok(())
    }

    /// Remove the token for a repository. No-op if absent.
    pub fn delete_token(&self, repo_id: i64) -> Result<(), KeystoreError> {
        let snapshot = {
            let mut entries = self.entries();
            if entries.remove(&repo_id).is_none() {
                return Ok(());
            }
            entries.clone()
        };
        self.persist(&snapshot)?;
        debug!(repo_id, "deleted token");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<i64, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_or_create_key(path: &Path) -> Result<[u8; 32], KeystoreError> {
        if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            let bytes = hex::decode(raw.trim()).map_err(|e| KeystoreError::InvalidKey {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
            let key: [u8; 32] = bytes.try_into().map_err(|_| KeystoreError::InvalidKey {
                path: path.display().to_string(),
                detail: "expected 32 bytes".into(),
            })?;
            return Ok(key);
        }

        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        std::fs::write(path, hex::encode(key))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        info!(path = %path.display(), "generated keystore key");
        Ok(key)
    }

    fn persist(&self, entries: &HashMap<i64, String>) -> Result<(), KeystoreError> {
        let plaintext = serde_json::to_vec(entries)
            .map_err(|e| KeystoreError::EncryptionFailed(e.to_string()))?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: &plaintext,
                    aad: AAD,
                },
            )
            .map_err(|e| KeystoreError::EncryptionFailed(e.to_string()))?;

        let mut blob = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        blob.push(VERSION_ENCRYPTED);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        std::fs::write(&self.tokens_path, BASE64.encode(blob))?;
        Ok(())
    }

    fn decrypt_entries(
        key: &[u8; 32],
        blob: &[u8],
    ) -> Result<HashMap<i64, String>, KeystoreError> {
        if blob.is_empty() {
            return Ok(HashMap::new());
        }
        if blob[0] != VERSION_ENCRYPTED || blob.len() < 1 + NONCE_LEN {
            return Err(KeystoreError::DecryptionFailed(
                "unrecognized token file format".into(),
            ));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        let nonce = Nonce::from_slice(&blob[1..1 + NONCE_LEN]);
        let plaintext = cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &blob[1 + NONCE_LEN..],
                    aad: AAD,
                },
            )
            .map_err(|e| KeystoreError::DecryptionFailed(e.to_string()))?;

        serde_json::from_slice(&plaintext).map_err(|e| KeystoreError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::open(dir.path()).unwrap();

        assert_eq!(store.get_token(1).unwrap(), None);
        store.put_token(1, "ghp_secret").unwrap();
        assert_eq!(store.get_token(1).unwrap().as_deref(), Some("ghp_secret"));

        store.put_token(1, "ghp_rotated").unwrap();
        assert_eq!(store.get_token(1).unwrap().as_deref(), Some("ghp_rotated"));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TokenStore::open(dir.path()).unwrap();
            store.put_token(7, "tok-7").unwrap();
            store.put_token(8, "tok-8").unwrap();
        }
        let store = TokenStore::open(dir.path()).unwrap();
        assert_eq!(store.get_token(7).unwrap().as_deref(), Some("tok-7"));
        assert_eq!(store.get_token(8).unwrap().as_deref(), Some("tok-8"));
    }

    #[test]
    fn test_delete_is_noop_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::open(dir.path()).unwrap();
        store.delete_token(42).unwrap();

        store.put_token(42, "t").unwrap();
        store.delete_token(42).unwrap();
        assert_eq!(store.get_token(42).unwrap(), None);
    }

    #[test]
    fn test_token_file_is_not_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::open(dir.path()).unwrap();
        store.put_token(1, "very-visible-secret").unwrap();

        let encoded = std::fs::read_to_string(dir.path().join(TOKENS_FILE)).unwrap();
        assert!(!encoded.contains("very-visible-secret"));
        let blob = BASE64.decode(encoded.trim()).unwrap();
        assert!(!String::from_utf8_lossy(&blob).contains("very-visible-secret"));
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TokenStore::open(dir.path()).unwrap();
            store.put_token(1, "secret").unwrap();
        }
        // Replace the key; the token file must no longer decrypt.
        std::fs::write(dir.path().join(KEY_FILE), hex::encode([9u8; 32])).unwrap();
        let err = TokenStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, KeystoreError::DecryptionFailed(_)));
    }

    #[test]
    fn test_invalid_key_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(KEY_FILE), "not-hex").unwrap();
        let err = TokenStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, KeystoreError::InvalidKey { .. }));
    }
}
