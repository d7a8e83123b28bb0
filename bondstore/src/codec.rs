//! Persistence codec - text-safe JSON documents on a whole-document medium
//!
//! Binary fields are base64 encoded so the document survives line/text
//! oriented media. Loading never fails: a missing document, an unavailable
//! medium or a corrupt document all yield an empty store, so the device can
//! always pair fresh.

use log::{debug, error, info};

use crate::error::StoreError;
use crate::keystore::KeyStore;
use crate::storage::Storage;

/// A store that can be written to and read back from a medium
pub trait Persist: Default + Sized {
    /// Name used in log lines
    const LABEL: &'static str;

    fn encode(&self) -> Result<Vec<u8>, StoreError>;

    fn decode(data: &[u8]) -> Result<Self, StoreError>;
}

impl Persist for KeyStore {
    const LABEL: &'static str = "keystore";

    fn encode(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(StoreError::Encode)
    }

    fn decode(data: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Encode and write the whole store
pub fn save<T: Persist, S: Storage>(state: &T, storage: &mut S) -> Result<(), StoreError> {
    let data = state.encode()?;
    storage
        .write(&data)
        .map_err(|e| StoreError::Medium(Box::new(e)))?;
    debug!("{}: saved {} bytes", T::LABEL, data.len());
    Ok(())
}

/// Read and decode the store; `Ok(None)` when nothing is stored
pub fn try_load<T: Persist, S: Storage>(storage: &S) -> Result<Option<T>, StoreError> {
    let data = storage.read().map_err(|e| StoreError::Medium(Box::new(e)))?;
    data.map(|d| T::decode(&d)).transpose()
}

/// Read the store, falling back to an empty one
pub fn load<T: Persist, S: Storage>(storage: &S) -> T {
    match try_load(storage) {
        Ok(Some(state)) => {
            info!("{}: loaded from storage", T::LABEL);
            state
        }
        Ok(None) => T::default(),
        Err(StoreError::Medium(e)) => {
            debug!("{}: storage unavailable ({e}), starting empty", T::LABEL);
            T::default()
        }
        Err(e) => {
            error!("{}: format error, not loaded: {e}", T::LABEL);
            T::default()
        }
    }
}
