//! Bondstore radio-event protocol - positional payload fields and layouts
//!
//! The radio stack hands every bonding event over as a flat, positional list
//! of values. The layouts below name each position so the library can decode
//! a payload into typed records without guessing.

pub mod ble;

/// One positional value of a radio-stack event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    None,
    Bool(bool),
    Int(i64),
    Bytes(Vec<u8>),
}

impl Field {
    pub fn is_none(&self) -> bool {
        matches!(self, Field::None)
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Field::Int(v)
    }
}

impl From<u8> for Field {
    fn from(v: u8) -> Self {
        Field::Int(v.into())
    }
}

impl From<u16> for Field {
    fn from(v: u16) -> Self {
        Field::Int(v.into())
    }
}

impl From<usize> for Field {
    fn from(v: usize) -> Self {
        Field::Int(v as i64)
    }
}

impl From<bool> for Field {
    fn from(v: bool) -> Self {
        Field::Bool(v)
    }
}

impl From<Vec<u8>> for Field {
    fn from(v: Vec<u8>) -> Self {
        Field::Bytes(v)
    }
}

impl From<&[u8]> for Field {
    fn from(v: &[u8]) -> Self {
        Field::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Field {
    fn from(v: [u8; N]) -> Self {
        Field::Bytes(v.to_vec())
    }
}

impl<T: Into<Field>> From<Option<T>> for Field {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Field::None,
        }
    }
}

/// Payload layouts: the name of each positional field, in order
pub mod layout {
    /// Lookup / delete query. Trailing fields may be omitted.
    pub const KEY: &[&str] = &[
        "bond_type",
        "addr_type",
        "addr",
        "ediv",
        "rand",
        "chr_val_handle",
        "skip",
    ];

    /// Own / peer security record
    pub const SEC: &[&str] = &[
        "bond_type",
        "addr_type",
        "addr",
        "key_size",
        "ediv",
        "rand",
        "ltk",
        "irk",
        "csrk",
        "authenticated",
        "secure_connection",
    ];

    /// Client characteristic configuration descriptor record
    pub const CCCD: &[&str] = &[
        "bond_type",
        "addr_type",
        "addr",
        "chr_val_handle",
        "flags",
        "value_changed",
    ];

    /// Secrets variant: store (value `None` deletes)
    pub const SET_SECRET: &[&str] = &["sec_type", "key", "value"];

    /// Secrets variant: lookup (key `None` enumerates by index)
    pub const GET_SECRET: &[&str] = &["sec_type", "index", "key"];
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("missing field {0}")]
    Missing(&'static str),
    #[error("field {field} must be {expected}")]
    Type {
        field: &'static str,
        expected: &'static str,
    },
    #[error("field {field} must be {expected} bytes long, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("field {field} out of range: {value}")]
    Range { field: &'static str, value: i64 },
}

/// Named, typed view over a positional payload
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    layout: &'static [&'static str],
    fields: &'a [Field],
}

impl<'a> Payload<'a> {
    pub fn new(layout: &'static [&'static str], fields: &'a [Field]) -> Self {
        Self { layout, fields }
    }

    /// Raw field by name; `None` when the payload is shorter than the layout
    pub fn get(&self, name: &'static str) -> Option<&'a Field> {
        let idx = self.layout.iter().position(|n| *n == name)?;
        self.fields.get(idx)
    }

    fn present(&self, name: &'static str) -> Option<&'a Field> {
        self.get(name).filter(|f| !f.is_none())
    }

    pub fn opt_int(&self, name: &'static str) -> Result<Option<i64>, FieldError> {
        match self.present(name) {
            None => Ok(None),
            Some(Field::Int(v)) => Ok(Some(*v)),
            Some(Field::Bool(b)) => Ok(Some(*b as i64)),
            Some(_) => Err(FieldError::Type {
                field: name,
                expected: "an integer",
            }),
        }
    }

    pub fn int(&self, name: &'static str) -> Result<i64, FieldError> {
        self.opt_int(name)?.ok_or(FieldError::Missing(name))
    }

    /// Optional integer narrowed to `T`, range checked
    pub fn opt_uint<T: TryFrom<i64>>(&self, name: &'static str) -> Result<Option<T>, FieldError> {
        match self.opt_int(name)? {
            None => Ok(None),
            Some(v) => T::try_from(v)
                .map(Some)
                .map_err(|_| FieldError::Range { field: name, value: v }),
        }
    }

    pub fn uint<T: TryFrom<i64>>(&self, name: &'static str) -> Result<T, FieldError> {
        self.opt_uint(name)?.ok_or(FieldError::Missing(name))
    }

    /// Booleans arrive either as a bool or as 0 / non-zero
    pub fn bool(&self, name: &'static str) -> Result<bool, FieldError> {
        match self.present(name) {
            None => Err(FieldError::Missing(name)),
            Some(Field::Bool(b)) => Ok(*b),
            Some(Field::Int(v)) => Ok(*v != 0),
            Some(_) => Err(FieldError::Type {
                field: name,
                expected: "a bool",
            }),
        }
    }

    pub fn opt_bytes(&self, name: &'static str) -> Result<Option<&'a [u8]>, FieldError> {
        match self.present(name) {
            None => Ok(None),
            Some(Field::Bytes(b)) => Ok(Some(b.as_slice())),
            Some(_) => Err(FieldError::Type {
                field: name,
                expected: "bytes",
            }),
        }
    }

    pub fn bytes(&self, name: &'static str) -> Result<&'a [u8], FieldError> {
        self.opt_bytes(name)?.ok_or(FieldError::Missing(name))
    }

    /// Optional fixed-length byte field
    pub fn opt_array<const N: usize>(&self, name: &'static str) -> Result<Option<[u8; N]>, FieldError> {
        match self.opt_bytes(name)? {
            None => Ok(None),
            Some(b) => b.try_into().map(Some).map_err(|_| FieldError::Length {
                field: name,
                expected: N,
                actual: b.len(),
            }),
        }
    }

    pub fn array<const N: usize>(&self, name: &'static str) -> Result<[u8; N], FieldError> {
        self.opt_array(name)?.ok_or(FieldError::Missing(name))
    }
}
