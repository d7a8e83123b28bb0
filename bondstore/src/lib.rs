//! Bondstore - persistent bonding keystore for BLE peripherals
//!
//! The radio stack raises bonding events (read / write / delete a bond
//! record) from its callback context. [`EventBridge`] answers them from an
//! in-memory [`KeyStore`] and defers persistence to the main loop, which
//! calls [`EventBridge::run_pending`] to rewrite the whole document on a
//! [`Storage`] medium.
//!
//! [`SecretBridge`] is the flat variant for stacks that hand over opaque
//! `(type, key) -> value` secrets instead of typed records.

mod address;
mod bridge;
mod codec;
mod config;
mod error;
mod keystore;
mod queue;
mod record;
mod secrets;
mod storage;

pub use address::{Address, AddressError, ADDR_TYPE_PUBLIC, ADDR_TYPE_RANDOM};
pub use bridge::{EventBridge, SaveRequest};
pub use codec::{load, save, try_load, Persist};
pub use config::{bondstore_home, Config, ConfigError};
pub use error::{BridgeError, StoreError};
pub use keystore::KeyStore;
pub use queue::TaskQueue;
pub use record::{BondKind, BondQuery, BondRecord, CccdRecord, SecurityRecord};
pub use secrets::{SecretBridge, SecretStore};
pub use storage::{FileStorage, MemoryStorage, Storage};

pub use bondstore_proto::{ble, Field, FieldError};
