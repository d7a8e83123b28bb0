//! Flat secrets variant - a single (type, key) -> value mapping
//!
//! The radio stack treats every secret as an opaque blob and keeps the
//! format knowledge on its side. Entries keep insertion order; that order
//! drives enumeration by index.

use bondstore_proto::ble::SecretEvent;
use bondstore_proto::{layout, Field, Payload};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::bridge::Deferred;
use crate::codec::{self, Persist};
use crate::error::{BridgeError, StoreError};
use crate::storage::Storage;

/// Persisted as `[type, base64(key), base64(value)]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SecretEntry(
    u8,
    #[serde(with = "b64")] Vec<u8>,
    #[serde(with = "b64")] Vec<u8>,
);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretStore {
    entries: Vec<SecretEntry>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, sec_type: u8, key: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.0 == sec_type && e.1 == key)
    }

    /// Insert, or overwrite in place keeping the entry's position
    pub fn set(&mut self, sec_type: u8, key: &[u8], value: &[u8]) {
        match self.position(sec_type, key) {
            Some(i) => self.entries[i].2 = value.to_vec(),
            None => self.entries.push(SecretEntry(sec_type, key.to_vec(), value.to_vec())),
        }
    }

    /// Returns whether an entry was removed
    pub fn remove(&mut self, sec_type: u8, key: &[u8]) -> bool {
        match self.position(sec_type, key) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, sec_type: u8, key: &[u8]) -> Option<&[u8]> {
        self.position(sec_type, key)
            .map(|i| self.entries[i].2.as_slice())
    }

    /// The `index`-th value of `sec_type`, in mapping order
    pub fn nth(&self, sec_type: u8, index: usize) -> Option<&[u8]> {
        self.entries
            .iter()
            .filter(|e| e.0 == sec_type)
            .nth(index)
            .map(|e| e.2.as_slice())
    }

    /// `(type, key, value)` in mapping order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &[u8], &[u8])> {
        self.entries
            .iter()
            .map(|e| (e.0, e.1.as_slice(), e.2.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Persist for SecretStore {
    const LABEL: &'static str = "secrets";

    fn encode(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(StoreError::Encode)
    }

    fn decode(data: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Bridges get/set-secret events to a [`SecretStore`]
#[derive(Debug)]
pub struct SecretBridge<S: Storage> {
    secrets: SecretStore,
    deferred: Deferred<S>,
}

impl<S: Storage> SecretBridge<S> {
    pub fn new(secrets: SecretStore, storage: S, queue_depth: usize) -> Self {
        Self {
            secrets,
            deferred: Deferred::new(storage, queue_depth),
        }
    }

    pub fn open(storage: S, queue_depth: usize) -> Self {
        let secrets: SecretStore = codec::load(&storage);
        info!("Loaded {} secrets", secrets.len());
        Self::new(secrets, storage, queue_depth)
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    pub fn storage(&self) -> &S {
        self.deferred.storage()
    }

    /// Handle one radio-stack event.
    ///
    /// Set replies with a bool (for a delete: whether something was removed),
    /// get replies with the value bytes or `None`.
    pub fn handle(&mut self, event: u8, fields: &[Field]) -> Result<Option<Field>, BridgeError> {
        match SecretEvent::from_code(event).ok_or(BridgeError::UnknownEvent(event))? {
            SecretEvent::Set => {
                let p = Payload::new(layout::SET_SECRET, fields);
                let sec_type: u8 = p.uint("sec_type")?;
                let key = p.bytes("key")?;
                let changed = match p.opt_bytes("value")? {
                    Some(value) => {
                        debug!("set secret: type {sec_type}, {} byte key", key.len());
                        self.secrets.set(sec_type, key, value);
                        true
                    }
                    None => self.secrets.remove(sec_type, key),
                };
                if changed {
                    self.deferred.request("secret set");
                }
                Ok(Some(Field::Bool(changed)))
            }
            SecretEvent::Get => {
                let p = Payload::new(layout::GET_SECRET, fields);
                let sec_type: u8 = p.uint("sec_type")?;
                let value = match p.opt_bytes("key")? {
                    Some(key) => self.secrets.get(sec_type, key),
                    None => self.secrets.nth(sec_type, p.opt_uint("index")?.unwrap_or(0)),
                };
                Ok(value.map(Field::from))
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.deferred.pending()
    }

    pub fn run_pending(&mut self) -> Result<usize, StoreError> {
        self.deferred.run(&self.secrets)
    }
}

mod b64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&data_encoding::BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        data_encoding::BASE64.decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
