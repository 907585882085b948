//! Secure Storage Module
//!
//! Persists the bearer token and the user profile. On Windows the data is
//! encrypted with DPAPI; other platforms store it in the app data directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, error, debug};

use crate::auth::{token_hint, UserProfile};

#[cfg(windows)]
use windows::Win32::Security::Cryptography::{
    CryptProtectData, CryptUnprotectData, CRYPTPROTECT_UI_FORBIDDEN,
};
#[cfg(windows)]
use windows::Win32::Security::Cryptography::CRYPT_INTEGER_BLOB;

/// Storage key of the bearer token
pub const TOKEN_KEY: &str = "auth_token";
/// Storage key of the user profile
pub const USER_KEY: &str = "user_data";

/// Raw key-value medium backing the credential store
pub trait KeyValueStore: Send + Sync {
    fn set_item(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn delete_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Token and profile persistence.
///
/// Reads return `None` when no session is stored. Writes return only once
/// the data is on the medium.
pub trait CredentialStore: Send + Sync {
    fn set_token(&self, token: &str) -> Result<(), StorageError>;
    fn get_token(&self) -> Result<Option<String>, StorageError>;
    fn set_user_profile(&self, user: &UserProfile) -> Result<(), StorageError>;
    fn get_user_profile(&self) -> Result<Option<UserProfile>, StorageError>;
    fn clear_session(&self) -> Result<(), StorageError>;
}

/// JSON helpers over any key-value medium
pub trait KeyValueExt: KeyValueStore {
    fn save<T: Serialize>(&self, key: &str, data: &T) -> Result<(), StorageError> {
        let json = serde_json::to_vec(data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.set_item(key, &json)
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get_item(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueExt for S {}

impl<S: KeyValueStore> CredentialStore for S {
    fn set_token(&self, token: &str) -> Result<(), StorageError> {
        debug!("Saving token: {}...", token_hint(token));
        self.set_item(TOKEN_KEY, token.as_bytes())
    }

    fn get_token(&self) -> Result<Option<String>, StorageError> {
        match self.get_item(TOKEN_KEY)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StorageError::Decryption(e.to_string())),
            None => Ok(None),
        }
    }

    fn set_user_profile(&self, user: &UserProfile) -> Result<(), StorageError> {
        self.save(USER_KEY, user)
    }

    fn get_user_profile(&self) -> Result<Option<UserProfile>, StorageError> {
        self.load(USER_KEY)
    }

    fn clear_session(&self) -> Result<(), StorageError> {
        self.delete_item(TOKEN_KEY)?;
        self.delete_item(USER_KEY)
    }
}

/// File storage, DPAPI-encrypted on Windows
pub struct SecureStorage {
    storage_path: PathBuf,
}

impl SecureStorage {
    /// Storage in the platform's local data directory
    pub fn new() -> Self {
        let storage_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("HznCourier");
        Self::at(storage_path)
    }

    /// Storage rooted at a specific directory
    pub fn at(storage_path: impl Into<PathBuf>) -> Self {
        let storage_path = storage_path.into();

        // Ensure directory exists
        if let Err(e) = std::fs::create_dir_all(&storage_path) {
            error!("Failed to create storage directory: {}", e);
        }

        debug!("Secure storage initialized at: {:?}", storage_path);

        Self { storage_path }
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    fn file_for(&self, key: &str) -> PathBuf {
        self.storage_path.join(format!("{}.dat", key))
    }

    #[cfg(windows)]
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        dpapi(data, |input, output| unsafe {
            CryptProtectData(input, None, None, None, None, CRYPTPROTECT_UI_FORBIDDEN, output)
        })
        .ok_or_else(|| StorageError::Encryption("DPAPI encryption failed".into()))
    }

    #[cfg(windows)]
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        dpapi(data, |input, output| unsafe {
            CryptUnprotectData(input, None, None, None, None, CRYPTPROTECT_UI_FORBIDDEN, output)
        })
        .ok_or_else(|| StorageError::Decryption("DPAPI decryption failed".into()))
    }

    #[cfg(not(windows))]
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        // No OS keystore bound on this platform
        Ok(data.to_vec())
    }

    #[cfg(not(windows))]
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        Ok(data.to_vec())
    }
}

/// Run a DPAPI transform and copy out the buffer it allocates
#[cfg(windows)]
fn dpapi<F>(data: &[u8], transform: F) -> Option<Vec<u8>>
where
    F: FnOnce(*const CRYPT_INTEGER_BLOB, *mut CRYPT_INTEGER_BLOB) -> windows::core::Result<()>,
{
    let input = CRYPT_INTEGER_BLOB {
        cbData: data.len() as u32,
        pbData: data.as_ptr() as *mut u8,
    };
    let mut output = CRYPT_INTEGER_BLOB {
        cbData: 0,
        pbData: std::ptr::null_mut(),
    };

    transform(&input, &mut output).ok()?;

    unsafe {
        let bytes = std::slice::from_raw_parts(output.pbData, output.cbData as usize).to_vec();
        // DPAPI allocates the output with LocalAlloc
        windows::Win32::Foundation::LocalFree(
            windows::Win32::Foundation::HLOCAL(output.pbData as *mut std::ffi::c_void)
        );
        Some(bytes)
    }
}

impl KeyValueStore for SecureStorage {
    fn set_item(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let encrypted = self.encrypt(value)?;

        std::fs::write(self.file_for(key), encrypted)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        info!("Saved encrypted data for key: {}", key);
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let encrypted = match std::fs::read(self.file_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e.to_string())),
        };

        self.decrypt(&encrypted).map(Some)
    }

    fn delete_item(&self, key: &str) -> Result<(), StorageError> {
        let file_path = self.file_for(key);

        if file_path.exists() {
            std::fs::remove_file(&file_path)
                .map_err(|e| StorageError::Io(e.to_string()))?;
            info!("Deleted stored data for key: {}", key);
        }

        Ok(())
    }
}

impl Default for SecureStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-local storage, the equivalent of browser storage on web builds
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn set_item(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn delete_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Storage lock poisoned")]
    Poisoned,
}
