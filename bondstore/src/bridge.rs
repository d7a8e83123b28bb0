//! Event bridge - radio-stack bonding events to keystore operations
//!
//! `handle` runs inside the radio stack's callback: it only touches memory
//! and never performs storage I/O. Mutations queue a save request which the
//! main loop runs later through `run_pending`.

use bondstore_proto::ble::BondEvent;
use bondstore_proto::Field;
use log::{debug, error, info};

use crate::codec::{self, Persist};
use crate::error::{BridgeError, StoreError};
use crate::keystore::KeyStore;
use crate::queue::TaskQueue;
use crate::record::{BondKind, BondQuery, BondRecord};
use crate::storage::Storage;

/// Deferred request to rewrite the whole store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveRequest {
    pub reason: &'static str,
}

/// Storage medium plus the queue of saves waiting for the main loop
#[derive(Debug)]
pub(crate) struct Deferred<S> {
    storage: S,
    queue: TaskQueue<SaveRequest>,
}

impl<S: Storage> Deferred<S> {
    pub(crate) fn new(storage: S, depth: usize) -> Self {
        Self {
            storage,
            queue: TaskQueue::new(depth),
        }
    }

    pub(crate) fn request(&self, reason: &'static str) {
        if !self.queue.schedule(SaveRequest { reason }) {
            // every save rewrites the whole store, the queued ones cover this
            debug!("save queue full, dropping request ({reason})");
        }
    }

    /// Run queued saves as a single physical write
    pub(crate) fn run<T: Persist>(&mut self, state: &T) -> Result<usize, StoreError> {
        let requests = self.queue.drain();
        if requests.is_empty() {
            return Ok(0);
        }

        debug!(
            "{}: {} queued save(s): {:?}",
            T::LABEL,
            requests.len(),
            requests.iter().map(|r| r.reason).collect::<Vec<_>>()
        );
        match codec::save(state, &mut self.storage) {
            Ok(()) => Ok(1),
            Err(e) => {
                // not retried; the next mutation saves the full state again
                error!("{}: save failed: {e}", T::LABEL);
                Err(e)
            }
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn storage(&self) -> &S {
        &self.storage
    }

    pub(crate) fn into_storage(self) -> S {
        self.storage
    }
}

/// Bridges radio-stack bonding events to a [`KeyStore`]
#[derive(Debug)]
pub struct EventBridge<S: Storage> {
    store: KeyStore,
    deferred: Deferred<S>,
}

impl<S: Storage> EventBridge<S> {
    /// Wrap an already loaded store
    pub fn new(store: KeyStore, storage: S, queue_depth: usize) -> Self {
        Self {
            store,
            deferred: Deferred::new(storage, queue_depth),
        }
    }

    /// Load the store from `storage` (empty if absent or corrupt)
    pub fn open(storage: S, queue_depth: usize) -> Self {
        let store: KeyStore = codec::load(&storage);
        info!(
            "Loaded bonds: {} own, {} peer, {} cccd",
            store.len(BondKind::OwnSecurity),
            store.len(BondKind::PeerSecurity),
            store.len(BondKind::ClientConfigDescriptor)
        );
        Self::new(store, storage, queue_depth)
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    pub fn storage(&self) -> &S {
        self.deferred.storage()
    }

    pub fn into_parts(self) -> (KeyStore, S) {
        (self.store, self.deferred.into_storage())
    }

    /// Handle one radio-stack event.
    ///
    /// Reads return the matched record's fields (without the kind), deletes
    /// return the removed record's fields, writes return `None`. `Ok(None)`
    /// from a read tells the stack to pair fresh.
    pub fn handle(&mut self, event: u8, fields: &[Field]) -> Result<Option<Vec<Field>>, BridgeError> {
        let event = BondEvent::from_code(event).ok_or(BridgeError::UnknownEvent(event))?;
        self.handle_event(event, fields)
    }

    pub fn handle_event(&mut self, event: BondEvent, fields: &[Field]) -> Result<Option<Vec<Field>>, BridgeError> {
        match event {
            BondEvent::Read => {
                let (kind, query) = BondQuery::from_fields(fields)?;
                let found = self.read(kind, &query);
                debug!("bond read {kind} {}: found={}", query.address, found.is_some());
                Ok(found.map(|r| r.to_fields()))
            }
            BondEvent::Write => {
                let record = BondRecord::from_fields(fields)?;
                self.write(record);
                Ok(None)
            }
            BondEvent::Delete => {
                let (kind, query) = BondQuery::from_fields(fields)?;
                Ok(self.delete(kind, &query).map(|r| r.to_fields()))
            }
        }
    }

    pub fn read(&self, kind: BondKind, query: &BondQuery) -> Option<BondRecord> {
        self.store.find(kind, query)
    }

    /// Store a record, replacing the one with the same identity
    pub fn write(&mut self, record: BondRecord) {
        info!("BLE: writing {} bond for {}", record.kind(), record.address());
        if self.store.replace(record).is_some() {
            debug!("replaced previous bond with the same identity");
        }
        self.deferred.request("bond written");
    }

    pub fn delete(&mut self, kind: BondKind, query: &BondQuery) -> Option<BondRecord> {
        let removed = self.store.find_and_remove(kind, query);
        if let Some(r) = &removed {
            info!("BLE: deleting {kind} bond for {}", r.address());
            self.deferred.request("bond deleted");
        }
        removed
    }

    /// Forget every bond and persist the empty store
    pub fn clear(&mut self) {
        self.store.clear();
        self.deferred.request("cleared");
    }

    /// Number of saves waiting for the main loop
    pub fn pending(&self) -> usize {
        self.deferred.pending()
    }

    /// Main-loop side: persist queued saves. Returns the number of physical
    /// writes performed (0 or 1).
    pub fn run_pending(&mut self) -> Result<usize, StoreError> {
        self.deferred.run(&self.store)
    }
}
