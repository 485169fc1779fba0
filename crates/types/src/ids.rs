// Path: crates/types/src/ids.rs
//! Fixed-width identifiers.
//!
//! Everything that names an object on the chain is either a 20-byte
//! [`Address`] (accounts) or a 32-byte [`Id`] (transactions, programs,
//! blocks). Both render as lowercase hex.

use std::fmt;

/// Length in bytes of an [`Address`].
pub const ADDRESS_LEN: usize = 20;
/// Length in bytes of an [`Id`].
pub const ID_LEN: usize = 32;
/// Length in bytes of a recoverable SECP256K1R signature (r ‖ s ‖ v).
pub const SIGNATURE_LEN: usize = 65;

/// A 20-byte account address, derived from a recovered public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address. Never a valid sender.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

/// A 32-byte content-derived identifier (SHA-256 of an object's canonical
/// byte representation).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Id(pub [u8; ID_LEN]);

/// ID of a transaction: hash of its canonical signed encoding.
pub type TxId = Id;
/// ID of a program: the ID of the transaction that deployed it.
pub type ProgramId = Id;
/// ID of a block: hash of its canonical encoding.
pub type BlockId = Id;

impl Id {
    /// The all-zero id, used as the genesis parent.
    pub const ZERO: Id = Id([0u8; ID_LEN]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ID_LEN]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Id {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; ID_LEN]> for Id {
    fn from(bytes: [u8; ID_LEN]) -> Self {
        Id(bytes)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", hex::encode(self.0))
    }
}
