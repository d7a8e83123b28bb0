//! Bonding event codes and discriminators raised by the radio stack
//!
//! The numeric values are fixed by the radio stack's event interface; they
//! are part of the wire contract and must not be renumbered.

/// Bond read: the stack asks whether a stored record matches a query
pub const IRQ_BOND_READ: u8 = 29;

/// Bond write: the stack hands over a freshly negotiated record
pub const IRQ_BOND_WRITE: u8 = 30;

/// Bond delete: the stack asks to forget a record
pub const IRQ_BOND_DELETE: u8 = 31;

/// Secrets variant: look up a secret blob (shares the code of bond read)
pub const IRQ_GET_SECRET: u8 = 29;

/// Secrets variant: store or delete a secret blob (shares the code of bond write)
pub const IRQ_SET_SECRET: u8 = 30;

/// Bond record kind discriminators, first positional field of every payload
pub mod bond_type {
    /// Our own security material (what we handed to the peer)
    pub const OUR_SEC: i64 = 1;

    /// The peer's security material
    pub const PEER_SEC: i64 = 2;

    /// Client characteristic configuration descriptor state
    pub const CCCD: i64 = 3;
}

/// Address length in bytes
pub const ADDR_LEN: usize = 6;

/// EDIV/RAND random number length in bytes
pub const RAND_LEN: usize = 8;

/// Events of the typed bond-record variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondEvent {
    Read,
    Write,
    Delete,
}

impl BondEvent {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            IRQ_BOND_READ => Some(Self::Read),
            IRQ_BOND_WRITE => Some(Self::Write),
            IRQ_BOND_DELETE => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Read => IRQ_BOND_READ,
            Self::Write => IRQ_BOND_WRITE,
            Self::Delete => IRQ_BOND_DELETE,
        }
    }
}

/// Events of the flat secrets variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEvent {
    Get,
    Set,
}

impl SecretEvent {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            IRQ_GET_SECRET => Some(Self::Get),
            IRQ_SET_SECRET => Some(Self::Set),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_codes() {
        for event in [BondEvent::Read, BondEvent::Write, BondEvent::Delete] {
            assert_eq!(BondEvent::from_code(event.code()), Some(event));
        }
        assert_eq!(BondEvent::Delete.code(), 31);
        assert_eq!(BondEvent::from_code(28), None);
        assert_eq!(SecretEvent::from_code(IRQ_BOND_WRITE), Some(SecretEvent::Set));
    }
}
