//! Peer device addresses

use bondstore_proto::ble::ADDR_LEN;

/// Address type: public (0) or random (1)
pub const ADDR_TYPE_PUBLIC: u8 = 0;
pub const ADDR_TYPE_RANDOM: u8 = 1;

/// A 6-byte device address. All-zero means "unspecified / don't care".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; ADDR_LEN]);

impl Address {
    pub const UNSPECIFIED: Address = Address([0; ADDR_LEN]);

    pub fn new(bytes: [u8; ADDR_LEN]) -> Self {
        Self(bytes)
    }

    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; ADDR_LEN]
    }

    pub fn to_bytes(&self) -> [u8; ADDR_LEN] {
        self.0
    }
}

impl From<[u8; ADDR_LEN]> for Address {
    fn from(bytes: [u8; ADDR_LEN]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| format!("{b:02X}")).collect();
        f.write_str(&parts.join(":"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("expected 6 colon-separated octets, got {0}")]
    Octets(usize),
    #[error("invalid octet {0:?}")]
    Octet(String),
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != ADDR_LEN {
            return Err(AddressError::Octets(parts.len()));
        }

        let mut bytes = [0u8; ADDR_LEN];
        for (slot, part) in bytes.iter_mut().zip(parts) {
            if part.len() != 2 || !part.bytes().all(|c| c.is_ascii_hexdigit()) {
                return Err(AddressError::Octet(part.to_string()));
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| AddressError::Octet(part.to_string()))?;
        }
        Ok(Self(bytes))
    }
}
