use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto;
use crate::models::{AppData, DailyEntry};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;
const DATA_FILE: &str = "data.cykel";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("data directory not found")]
    NoDataDir,
    #[error("no saved data")]
    NotFound,
    #[error("data was written by a newer version (schema {0})")]
    UnsupportedSchema(u32),
}

/// Versioned wrapper around everything that is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaEnvelope {
    pub schema_version: u32,
    pub app_version: String,
    pub data: AppData,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredPayload {
    Envelope(SchemaEnvelope),
    /// Before the envelope existed only the day entries were stored.
    Legacy(Vec<DailyEntry>),
}

/// Where sealed bytes live. Implementations know nothing about the format.
pub trait LogStore: Send + Sync {
    fn exists(&self) -> Result<bool, StorageError>;
    fn read(&self) -> Result<Vec<u8>, StorageError>;
    fn write(&self, bytes: &[u8]) -> Result<(), StorageError>;
    fn wipe(&self) -> Result<(), StorageError>;
}

/// Single sealed file inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(DATA_FILE),
        })
    }

    /// `<local data dir>/cykel/data.cykel`
    pub fn default_location() -> Result<Self, StorageError> {
        let dir = dirs::data_local_dir()
            .ok_or(StorageError::NoDataDir)?
            .join("cykel");
        Self::in_dir(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogStore for FileStore {
    fn exists(&self) -> Result<bool, StorageError> {
        Ok(self.path.exists())
    }

    fn read(&self) -> Result<Vec<u8>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<(), StorageError> {
        // replace atomically
        let tmp = self.path.with_extension("cykel.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn wipe(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-process store for tests and hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for MemoryStore {
    fn exists(&self) -> Result<bool, StorageError> {
        Ok(self.bytes.lock().map(|b| b.is_some()).unwrap_or(false))
    }

    fn read(&self) -> Result<Vec<u8>, StorageError> {
        self.bytes
            .lock()
            .ok()
            .and_then(|b| b.clone())
            .ok_or(StorageError::NotFound)
    }

    fn write(&self, bytes: &[u8]) -> Result<(), StorageError> {
        if let Ok(mut slot) = self.bytes.lock() {
            *slot = Some(bytes.to_vec());
        }
        Ok(())
    }

    fn wipe(&self) -> Result<(), StorageError> {
        if let Ok(mut slot) = self.bytes.lock() {
            *slot = None;
        }
        Ok(())
    }
}

/// Decode a decrypted payload, upgrading older layouts.
fn decode(plaintext: &[u8]) -> Result<AppData, StorageError> {
    match serde_json::from_slice::<StoredPayload>(plaintext)? {
        StoredPayload::Envelope(envelope) => {
            if envelope.schema_version > CURRENT_SCHEMA_VERSION {
                return Err(StorageError::UnsupportedSchema(envelope.schema_version));
            }
            if envelope.schema_version < CURRENT_SCHEMA_VERSION {
                tracing::info!(
                    from = envelope.schema_version,
                    to = CURRENT_SCHEMA_VERSION,
                    "migrating schema"
                );
            }
            Ok(envelope.data)
        }
        StoredPayload::Legacy(entries) => {
            tracing::info!(entries = entries.len(), "no schema envelope found, loaded legacy entry list");
            Ok(AppData {
                entries,
                ..AppData::default()
            })
        }
    }
}

/// Seal and write `data` under the current schema version.
pub fn save(store: &dyn LogStore, passphrase: &str, data: &AppData) -> Result<(), StorageError> {
    let envelope = SchemaEnvelope {
        schema_version: CURRENT_SCHEMA_VERSION,
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        data: data.clone(),
    };
    let json = Zeroizing::new(serde_json::to_vec(&envelope)?);
    let sealed = crypto::seal(passphrase, &json)?;
    store.write(&sealed)
}

/// Read, open and decode the stored data.
pub fn load(store: &dyn LogStore, passphrase: &str) -> Result<AppData, StorageError> {
    let sealed = store.read()?;
    let plaintext = crypto::open(passphrase, &sealed)?;
    decode(&plaintext)
}
