//! Core protocol types: hashes, asset identifiers, amounts, and programs.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};

use crate::serialization::{write_varint63, write_varstr31};

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

/// The largest representable asset amount: 2^63 - 1.
///
/// Amounts are summed in checked i64 arithmetic during validation, so no
/// individual amount may exceed the i64 range.
pub const MAX_AMOUNT: u64 = i64::MAX as u64;

/// Asset version committed into asset identifiers. Only version 1 exists.
pub const ASSET_VERSION: u64 = 1;

/// A 256-bit SHA3-256 digest.
///
/// The zero hash doubles as the "empty" sentinel for optional reference
/// data and anchor fields.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Build a hash from a byte slice; fails unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Hash> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Hash(arr))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Hash::from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Identity of an asset, derived from the chain's initial block and the
/// asset's issuance program. See [`compute_asset_id`].
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AssetId(pub [u8; 32]);

impl AssetId {
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<AssetId> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(AssetId(arr))
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", hex::encode(self.0))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for AssetId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        AssetId::from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
}

impl From<Hash> for AssetId {
    fn from(h: Hash) -> Self {
        AssetId(h.0)
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A quantity of a single asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    pub asset_id: AssetId,
    pub amount: u64,
}

/// A VM program together with the VM version it targets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Program {
    pub vm_version: u64,
    #[serde(with = "hex_bytes")]
    pub code: Vec<u8>,
}

impl Program {
    pub fn new(vm_version: u64, code: Vec<u8>) -> Program {
        Program { vm_version, code }
    }
}

/// SHA3-256 over the concatenation of `chunks`.
pub fn sha3_256(chunks: &[&[u8]]) -> Hash {
    let mut hasher = Sha3_256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    Hash(hasher.finalize().into())
}

/// Derive an asset id from its issuance program and chain of origin.
///
/// The preimage commits to the initial block id, the (sole) asset
/// version, the issuance program's VM version and code, and the hash of
/// the asset definition document.
pub fn compute_asset_id(
    issuance_program: &Program,
    initial_block_id: &Hash,
    asset_definition_hash: &Hash,
) -> AssetId {
    let mut preimage = Vec::with_capacity(80 + issuance_program.code.len());
    preimage.extend_from_slice(initial_block_id.as_bytes());
    write_varint63(&mut preimage, ASSET_VERSION);
    write_varint63(&mut preimage, issuance_program.vm_version);
    write_varstr31(&mut preimage, &issuance_program.code);
    preimage.extend_from_slice(asset_definition_hash.as_bytes());
    AssetId(sha3_256(&[&preimage]).0)
}

/// Serde adapter serializing byte strings as lowercase hex text.
pub(crate) mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(de::Error::custom)
    }
}
