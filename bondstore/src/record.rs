//! Bond records - typed security and CCCD entries, queries and their matching rules

use bondstore_proto::ble::{bond_type, RAND_LEN};
use bondstore_proto::{layout, Field, Payload};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::BridgeError;

/// Kind of bond record; each kind lives in its own ordered sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondKind {
    /// Security material we distributed to the peer
    OwnSecurity,
    /// Security material the peer distributed to us
    PeerSecurity,
    /// Notify/indicate subscription state per characteristic
    ClientConfigDescriptor,
}

impl BondKind {
    pub const ALL: [BondKind; 3] = [
        BondKind::OwnSecurity,
        BondKind::PeerSecurity,
        BondKind::ClientConfigDescriptor,
    ];

    /// Wire discriminator used by the radio stack
    pub fn discriminator(&self) -> i64 {
        match self {
            BondKind::OwnSecurity => bond_type::OUR_SEC,
            BondKind::PeerSecurity => bond_type::PEER_SEC,
            BondKind::ClientConfigDescriptor => bond_type::CCCD,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BondKind::OwnSecurity => "own",
            BondKind::PeerSecurity => "peer",
            BondKind::ClientConfigDescriptor => "cccd",
        }
    }

    fn is_security(&self) -> bool {
        !matches!(self, BondKind::ClientConfigDescriptor)
    }
}

impl TryFrom<i64> for BondKind {
    type Error = BridgeError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            bond_type::OUR_SEC => Ok(BondKind::OwnSecurity),
            bond_type::PEER_SEC => Ok(BondKind::PeerSecurity),
            bond_type::CCCD => Ok(BondKind::ClientConfigDescriptor),
            other => Err(BridgeError::InvalidBondKind(other)),
        }
    }
}

impl std::fmt::Display for BondKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for BondKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BondKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown bond kind {s:?}, expected own, peer or cccd"))
    }
}

/// Own or peer security record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRecord {
    #[serde(rename = "addr_type")]
    pub address_type: u8,
    #[serde(rename = "addr", with = "b64_address")]
    pub address: Address,
    pub key_size: u8,
    #[serde(default)]
    pub ediv: Option<u16>,
    #[serde(default, with = "b64_rand")]
    pub rand: Option<[u8; RAND_LEN]>,
    #[serde(rename = "ltk", default, with = "b64_opt")]
    pub long_term_key: Option<Vec<u8>>,
    #[serde(rename = "irk", default, with = "b64_opt")]
    pub identity_resolving_key: Option<Vec<u8>>,
    #[serde(rename = "csrk", default, with = "b64_opt")]
    pub signing_key: Option<Vec<u8>>,
    pub authenticated: bool,
    pub secure_connection: bool,
}

/// Client characteristic configuration descriptor record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CccdRecord {
    #[serde(rename = "addr_type")]
    pub address_type: u8,
    #[serde(rename = "addr", with = "b64_address")]
    pub address: Address,
    #[serde(rename = "chr_val_handle")]
    pub characteristic_value_handle: u16,
    pub flags: u16,
    pub value_changed: bool,
}

/// A bond record tagged with its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BondRecord {
    OwnSecurity(SecurityRecord),
    PeerSecurity(SecurityRecord),
    Cccd(CccdRecord),
}

impl BondRecord {
    pub fn kind(&self) -> BondKind {
        match self {
            BondRecord::OwnSecurity(_) => BondKind::OwnSecurity,
            BondRecord::PeerSecurity(_) => BondKind::PeerSecurity,
            BondRecord::Cccd(_) => BondKind::ClientConfigDescriptor,
        }
    }

    pub fn address(&self) -> Address {
        match self {
            BondRecord::OwnSecurity(r) | BondRecord::PeerSecurity(r) => r.address,
            BondRecord::Cccd(r) => r.address,
        }
    }

    pub fn address_type(&self) -> u8 {
        match self {
            BondRecord::OwnSecurity(r) | BondRecord::PeerSecurity(r) => r.address_type,
            BondRecord::Cccd(r) => r.address_type,
        }
    }

    /// Query matching any record with the same resolvable identity.
    ///
    /// Security records are identified by address alone, so a re-pairing
    /// with new EDIV/RAND still replaces the old record.
    pub fn identity(&self) -> BondQuery {
        let query = BondQuery::address(self.address_type(), self.address());
        match self {
            BondRecord::Cccd(r) => query.with_handle(r.characteristic_value_handle),
            _ => query,
        }
    }

    /// Decode a full record from a bond-write payload
    pub fn from_fields(fields: &[Field]) -> Result<Self, BridgeError> {
        let kind = BondKind::try_from(Payload::new(layout::SEC, fields).int("bond_type")?)?;

        if kind.is_security() {
            let p = Payload::new(layout::SEC, fields);
            let record = SecurityRecord {
                address_type: p.uint("addr_type")?,
                address: Address(p.array("addr")?),
                key_size: p.uint("key_size")?,
                ediv: p.opt_uint("ediv")?,
                rand: p.opt_array("rand")?,
                long_term_key: p.opt_bytes("ltk")?.map(<[u8]>::to_vec),
                identity_resolving_key: p.opt_bytes("irk")?.map(<[u8]>::to_vec),
                signing_key: p.opt_bytes("csrk")?.map(<[u8]>::to_vec),
                authenticated: p.bool("authenticated")?,
                secure_connection: p.bool("secure_connection")?,
            };
            Ok(match kind {
                BondKind::OwnSecurity => BondRecord::OwnSecurity(record),
                _ => BondRecord::PeerSecurity(record),
            })
        } else {
            let p = Payload::new(layout::CCCD, fields);
            Ok(BondRecord::Cccd(CccdRecord {
                address_type: p.uint("addr_type")?,
                address: Address(p.array("addr")?),
                characteristic_value_handle: p.uint("chr_val_handle")?,
                flags: p.uint("flags")?,
                value_changed: p.bool("value_changed")?,
            }))
        }
    }

    /// Positional reply for the radio stack: the record layout minus `bond_type`
    pub fn to_fields(&self) -> Vec<Field> {
        match self {
            BondRecord::OwnSecurity(r) | BondRecord::PeerSecurity(r) => vec![
                r.address_type.into(),
                r.address.to_bytes().into(),
                r.key_size.into(),
                r.ediv.into(),
                r.rand.into(),
                r.long_term_key.clone().into(),
                r.identity_resolving_key.clone().into(),
                r.signing_key.clone().into(),
                r.authenticated.into(),
                r.secure_connection.into(),
            ],
            BondRecord::Cccd(r) => vec![
                r.address_type.into(),
                r.address.to_bytes().into(),
                r.characteristic_value_handle.into(),
                r.flags.into(),
                r.value_changed.into(),
            ],
        }
    }
}

/// Identity fields supplied by the radio stack for a lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BondQuery {
    pub address_type: u8,
    /// All-zero drops the address from the match key
    pub address: Address,
    pub ediv: Option<u16>,
    pub rand: Option<[u8; RAND_LEN]>,
    pub characteristic_value_handle: Option<u16>,
    /// Number of matching records to pass over before returning one
    pub skip: usize,
}

impl BondQuery {
    pub fn address(address_type: u8, address: Address) -> Self {
        Self {
            address_type,
            address,
            ..Default::default()
        }
    }

    /// Matches every record of a kind
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_ediv_rand(mut self, ediv: u16, rand: [u8; RAND_LEN]) -> Self {
        self.ediv = Some(ediv);
        self.rand = Some(rand);
        self
    }

    pub fn with_handle(mut self, handle: u16) -> Self {
        self.characteristic_value_handle = Some(handle);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Decode a lookup/delete payload into its kind and query
    pub fn from_fields(fields: &[Field]) -> Result<(BondKind, Self), BridgeError> {
        let p = Payload::new(layout::KEY, fields);
        let kind = BondKind::try_from(p.int("bond_type")?)?;
        let query = BondQuery {
            address_type: p.uint("addr_type")?,
            address: Address(p.array("addr")?),
            ediv: p.opt_uint("ediv")?,
            rand: p.opt_array("rand")?,
            // handle 0 is the stack's "any characteristic"
            characteristic_value_handle: p.opt_uint("chr_val_handle")?.filter(|&h: &u16| h != 0),
            skip: p.opt_uint("skip")?.unwrap_or(0),
        };
        Ok((kind, query))
    }

    fn address_matches(&self, address_type: u8, address: &Address) -> bool {
        self.address.is_unspecified() || (self.address_type == address_type && self.address == *address)
    }
}

/// Match-key comparison between a stored record and a query
pub(crate) trait Matches {
    fn matches(&self, query: &BondQuery) -> bool;
}

impl Matches for SecurityRecord {
    fn matches(&self, query: &BondQuery) -> bool {
        query.address_matches(self.address_type, &self.address)
            && query.ediv.is_none_or(|e| self.ediv == Some(e))
            && query.rand.is_none_or(|r| self.rand == Some(r))
    }
}

impl Matches for CccdRecord {
    fn matches(&self, query: &BondQuery) -> bool {
        query.address_matches(self.address_type, &self.address)
            && query
                .characteristic_value_handle
                .is_none_or(|h| self.characteristic_value_handle == h)
    }
}

mod b64_address {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::address::Address;

    pub fn serialize<S>(addr: &Address, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&data_encoding::BASE64.encode(&addr.0))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Address, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        let bytes = data_encoding::BASE64.decode(s.as_bytes())
            .map_err(serde::de::Error::custom)?;
        bytes.try_into()
            .map(Address)
            .map_err(|_| serde::de::Error::custom("expected 6 address bytes"))
    }
}

mod b64_rand {
    use bondstore_proto::ble::RAND_LEN;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(opt: &Option<[u8; RAND_LEN]>, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        match opt {
            Some(bytes) => serializer.serialize_some(&data_encoding::BASE64.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; RAND_LEN]>, D::Error>
    where D: Deserializer<'de> {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(s) => {
                let bytes = data_encoding::BASE64.decode(s.as_bytes())
                    .map_err(serde::de::Error::custom)?;
                let arr: [u8; RAND_LEN] = bytes.try_into()
                    .map_err(|_| serde::de::Error::custom("expected 8 rand bytes"))?;
                Ok(Some(arr))
            }
            None => Ok(None),
        }
    }
}

pub(crate) mod b64_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(opt: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        match opt {
            Some(bytes) => serializer.serialize_some(&data_encoding::BASE64.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where D: Deserializer<'de> {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| data_encoding::BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sec(addr: u8, ediv: u16) -> SecurityRecord {
        SecurityRecord {
            address_type: 1,
            address: Address([addr; 6]),
            key_size: 16,
            ediv: Some(ediv),
            rand: Some([ediv as u8; 8]),
            long_term_key: Some(vec![0x11; 16]),
            identity_resolving_key: None,
            signing_key: None,
            authenticated: true,
            secure_connection: false,
        }
    }

    #[test]
    fn kind_discriminators() {
        for kind in BondKind::ALL {
            assert_eq!(BondKind::try_from(kind.discriminator()).unwrap(), kind);
            assert_eq!(kind.name().parse::<BondKind>().unwrap(), kind);
        }
        assert!(matches!(BondKind::try_from(7), Err(BridgeError::InvalidBondKind(7))));
    }

    #[test]
    fn address_only_query_ignores_ediv_rand() {
        let r = sec(0xAA, 5);
        assert!(r.matches(&BondQuery::address(1, Address([0xAA; 6]))));
        assert!(!r.matches(&BondQuery::address(0, Address([0xAA; 6]))));
        assert!(r.matches(&BondQuery::address(1, Address([0xAA; 6])).with_ediv_rand(5, [5; 8])));
        assert!(!r.matches(&BondQuery::address(1, Address([0xAA; 6])).with_ediv_rand(6, [5; 8])));
    }

    #[test]
    fn unspecified_address_is_wildcard() {
        let c = CccdRecord {
            address_type: 0,
            address: Address([0x42; 6]),
            characteristic_value_handle: 9,
            flags: 1,
            value_changed: false,
        };
        assert!(c.matches(&BondQuery::any().with_handle(9)));
        assert!(!c.matches(&BondQuery::any().with_handle(10)));
        assert!(sec(1, 1).matches(&BondQuery::any()));
    }

    #[test]
    fn positional_round_trip() {
        let record = BondRecord::PeerSecurity(sec(0x01, 7));
        let mut fields = vec![Field::Int(bond_type::PEER_SEC)];
        fields.extend(record.to_fields());
        assert_eq!(fields.len(), layout::SEC.len());
        assert_eq!(BondRecord::from_fields(&fields).unwrap(), record);
    }

    #[test]
    fn query_from_short_payload() {
        let fields = vec![Field::Int(3), Field::Int(0), Field::Bytes(vec![0; 6]), Field::None, Field::None, Field::Int(12)];
        let (kind, q) = BondQuery::from_fields(&fields).unwrap();
        assert_eq!(kind, BondKind::ClientConfigDescriptor);
        assert_eq!(q, BondQuery::any().with_handle(12));
    }

    #[test]
    fn zero_handle_matches_any_characteristic() {
        let fields = vec![Field::Int(3), Field::Int(0), Field::Bytes(vec![0x42; 6]), Field::None, Field::None, Field::Int(0)];
        let (_, q) = BondQuery::from_fields(&fields).unwrap();
        assert_eq!(q.characteristic_value_handle, None);

        let c = CccdRecord {
            address_type: 0,
            address: Address([0x42; 6]),
            characteristic_value_handle: 0x2A6E,
            flags: 1,
            value_changed: false,
        };
        assert!(c.matches(&q));
    }

    #[test]
    fn identity_ignores_ediv_rand() {
        let id = BondRecord::OwnSecurity(sec(0x0F, 3)).identity();
        assert_eq!(id, BondQuery::address(1, Address([0x0F; 6])));
    }
}
