//! In-memory bond keystore: one insertion-ordered sequence per bond kind

use log::debug;
use serde::{Deserialize, Serialize};

use crate::record::{BondKind, BondQuery, BondRecord, CccdRecord, Matches, SecurityRecord};

/// Bond keystore.
///
/// Insertion order is significant: when several records match the same
/// partial identity, the query's `skip` walks them in the order they were
/// added. The container itself does not enforce uniqueness; use
/// [`KeyStore::replace`] on write paths so re-pairing does not duplicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStore {
    #[serde(rename = "KEYSTORE_OUR_SEC")]
    our_sec: Vec<SecurityRecord>,
    #[serde(rename = "KEYSTORE_PEER_SEC")]
    peer_sec: Vec<SecurityRecord>,
    #[serde(rename = "KEYSTORE_CCCD")]
    cccd: Vec<CccdRecord>,
}

/// Index of the `skip`-th record matching `query`; only matches are counted
fn position<R: Matches>(records: &[R], query: &BondQuery) -> Option<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.matches(query))
        .nth(query.skip)
        .map(|(i, _)| i)
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the end of its kind's sequence
    pub fn add(&mut self, record: BondRecord) {
        debug!("keystore: add {} record for {}", record.kind(), record.address());
        match record {
            BondRecord::OwnSecurity(r) => self.our_sec.push(r),
            BondRecord::PeerSecurity(r) => self.peer_sec.push(r),
            BondRecord::Cccd(r) => self.cccd.push(r),
        }
    }

    /// Evict the record with the same resolvable identity (if any), then add.
    /// Returns the evicted record.
    ///
    /// A record with an all-zero address has no identity and evicts nothing.
    pub fn replace(&mut self, record: BondRecord) -> Option<BondRecord> {
        let evicted = if record.address().is_unspecified() {
            None
        } else {
            self.find_and_remove(record.kind(), &record.identity())
        };
        self.add(record);
        evicted
    }

    /// Look up the `query.skip`-th matching record of `kind`
    pub fn find(&self, kind: BondKind, query: &BondQuery) -> Option<BondRecord> {
        match kind {
            BondKind::OwnSecurity => {
                position(&self.our_sec, query).map(|i| BondRecord::OwnSecurity(self.our_sec[i].clone()))
            }
            BondKind::PeerSecurity => {
                position(&self.peer_sec, query).map(|i| BondRecord::PeerSecurity(self.peer_sec[i].clone()))
            }
            BondKind::ClientConfigDescriptor => {
                position(&self.cccd, query).map(|i| BondRecord::Cccd(self.cccd[i].clone()))
            }
        }
    }

    /// Like [`KeyStore::find`], removing the match from its sequence
    pub fn find_and_remove(&mut self, kind: BondKind, query: &BondQuery) -> Option<BondRecord> {
        let removed = match kind {
            BondKind::OwnSecurity => {
                position(&self.our_sec, query).map(|i| BondRecord::OwnSecurity(self.our_sec.remove(i)))
            }
            BondKind::PeerSecurity => {
                position(&self.peer_sec, query).map(|i| BondRecord::PeerSecurity(self.peer_sec.remove(i)))
            }
            BondKind::ClientConfigDescriptor => {
                position(&self.cccd, query).map(|i| BondRecord::Cccd(self.cccd.remove(i)))
            }
        };
        if let Some(r) = &removed {
            debug!("keystore: removed {} record for {}", kind, r.address());
        }
        removed
    }

    pub fn len(&self, kind: BondKind) -> usize {
        match kind {
            BondKind::OwnSecurity => self.our_sec.len(),
            BondKind::PeerSecurity => self.peer_sec.len(),
            BondKind::ClientConfigDescriptor => self.cccd.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.our_sec.is_empty() && self.peer_sec.is_empty() && self.cccd.is_empty()
    }

    /// All records of a kind, in insertion order
    pub fn records(&self, kind: BondKind) -> Vec<BondRecord> {
        match kind {
            BondKind::OwnSecurity => self.our_sec.iter().cloned().map(BondRecord::OwnSecurity).collect(),
            BondKind::PeerSecurity => self.peer_sec.iter().cloned().map(BondRecord::PeerSecurity).collect(),
            BondKind::ClientConfigDescriptor => self.cccd.iter().cloned().map(BondRecord::Cccd).collect(),
        }
    }

    pub fn own_security(&self) -> &[SecurityRecord] {
        &self.our_sec
    }

    pub fn peer_security(&self) -> &[SecurityRecord] {
        &self.peer_sec
    }

    pub fn cccds(&self) -> &[CccdRecord] {
        &self.cccd
    }

    /// Forget every bond
    pub fn clear(&mut self) {
        self.our_sec.clear();
        self.peer_sec.clear();
        self.cccd.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, ADDR_TYPE_PUBLIC, ADDR_TYPE_RANDOM};

    const PEER: Address = Address([0xAA; 6]);

    fn sec(ediv: u16, rand: [u8; 8], ltk: u8) -> SecurityRecord {
        SecurityRecord {
            address_type: ADDR_TYPE_PUBLIC,
            address: PEER,
            key_size: 16,
            ediv: Some(ediv),
            rand: Some(rand),
            long_term_key: Some(vec![ltk; 16]),
            identity_resolving_key: Some(vec![0x22; 16]),
            signing_key: None,
            authenticated: false,
            secure_connection: true,
        }
    }

    fn cccd(addr: u8, handle: u16, flags: u16) -> CccdRecord {
        CccdRecord {
            address_type: ADDR_TYPE_RANDOM,
            address: Address::from([addr; 6]),
            characteristic_value_handle: handle,
            flags,
            value_changed: false,
        }
    }

    #[test]
    fn address_only_lookup_and_ediv_mismatch() {
        let mut ks = KeyStore::new();
        ks.add(BondRecord::OwnSecurity(sec(5, [1, 2, 3, 4, 0, 0, 0, 0], 0x33)));

        let address_only = BondQuery::address(0, PEER);
        assert!(ks.find(BondKind::OwnSecurity, &address_only).is_some());

        let wrong_ediv = address_only.clone().with_ediv_rand(6, [1, 2, 3, 4, 0, 0, 0, 0]);
        assert_eq!(ks.find(BondKind::OwnSecurity, &wrong_ediv), None);

        // kinds are partitioned
        assert_eq!(ks.find(BondKind::PeerSecurity, &address_only), None);
    }

    #[test]
    fn skip_enumerates_matches_in_insertion_order() {
        let mut ks = KeyStore::new();
        for i in 0..3u8 {
            ks.add(BondRecord::PeerSecurity(sec(i.into(), [i; 8], i)));
        }
        // an unrelated record in between must not consume a skip
        ks.peer_sec.insert(1, SecurityRecord { address: Address([0xBB; 6]), ..sec(9, [9; 8], 9) });

        for i in 0..3u8 {
            let q = BondQuery::address(0, PEER).with_skip(i.into());
            match ks.find(BondKind::PeerSecurity, &q) {
                Some(BondRecord::PeerSecurity(r)) => assert_eq!(r.ediv, Some(i.into())),
                other => panic!("skip {i}: unexpected {other:?}"),
            }
        }
        let q = BondQuery::address(0, PEER).with_skip(3);
        assert_eq!(ks.find(BondKind::PeerSecurity, &q), None);
    }

    #[test]
    fn replace_on_rewrite() {
        let mut ks = KeyStore::new();
        ks.replace(BondRecord::PeerSecurity(sec(1, [1; 8], 0x01)));
        let evicted = ks.replace(BondRecord::PeerSecurity(sec(2, [2; 8], 0x02)));

        assert!(evicted.is_some());
        assert_eq!(ks.len(BondKind::PeerSecurity), 1);
        assert_eq!(ks.peer_security()[0].long_term_key, Some(vec![0x02; 16]));
    }

    #[test]
    fn unspecified_address_write_evicts_nothing() {
        let mut ks = KeyStore::new();
        ks.add(BondRecord::Cccd(cccd(1, 10, 1)));
        ks.add(BondRecord::PeerSecurity(sec(1, [1; 8], 0x01)));

        let blank = BondRecord::Cccd(cccd(0, 10, 2));
        assert_eq!(ks.replace(blank.clone()), None);
        let blank_sec = SecurityRecord { address: Address::UNSPECIFIED, ..sec(2, [2; 8], 0x02) };
        assert_eq!(ks.replace(BondRecord::PeerSecurity(blank_sec)), None);

        assert_eq!(ks.len(BondKind::ClientConfigDescriptor), 2);
        assert_eq!(ks.cccds()[0], cccd(1, 10, 1));
        assert_eq!(ks.len(BondKind::PeerSecurity), 2);
        assert_eq!(ks.peer_security()[0].address, PEER);
    }

    #[test]
    fn delete_is_final() {
        let mut ks = KeyStore::new();
        ks.add(BondRecord::Cccd(cccd(1, 10, 1)));
        let q = BondQuery::address(1, Address([1; 6])).with_handle(10);

        assert!(ks.find_and_remove(BondKind::ClientConfigDescriptor, &q).is_some());
        assert_eq!(ks.find(BondKind::ClientConfigDescriptor, &q), None);
        assert_eq!(ks.find_and_remove(BondKind::ClientConfigDescriptor, &q), None);
        assert!(ks.is_empty());
    }

    #[test]
    fn cccd_wildcard_returns_first_with_handle() {
        let mut ks = KeyStore::new();
        ks.add(BondRecord::Cccd(cccd(1, 20, 1)));
        ks.add(BondRecord::Cccd(cccd(2, 10, 2)));
        ks.add(BondRecord::Cccd(cccd(3, 10, 3)));

        let q = BondQuery::any().with_handle(10);
        assert_eq!(ks.find(BondKind::ClientConfigDescriptor, &q), Some(BondRecord::Cccd(cccd(2, 10, 2))));
        assert_eq!(
            ks.find(BondKind::ClientConfigDescriptor, &q.with_skip(1)),
            Some(BondRecord::Cccd(cccd(3, 10, 3)))
        );
    }

    #[test]
    fn remove_keeps_order_of_the_rest() {
        let mut ks = KeyStore::new();
        for h in [1, 2, 3] {
            ks.add(BondRecord::Cccd(cccd(h as u8, h, 0)));
        }
        ks.find_and_remove(BondKind::ClientConfigDescriptor, &BondQuery::any().with_handle(2));
        let handles: Vec<u16> = ks.cccds().iter().map(|c| c.characteristic_value_handle).collect();
        assert_eq!(handles, vec![1, 3]);
    }
}
