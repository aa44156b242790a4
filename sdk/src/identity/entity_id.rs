//! Hierarchical entity addresses.
//!
//! Every addressable thing on the network (accounts, nodes, blobs) is named
//! by a `shard.realm.num` triple. The triple is totally ordered
//! lexicographically, which the derived `Ord` gives us for free as long as
//! the field order below stays `shard`, `realm`, `num`.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::{parse_digits, IdError};

/// A `shard.realm.num` entity address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityId {
    /// Shard number.
    pub shard: u64,
    /// Realm number within the shard.
    pub realm: u64,
    /// Entity number within the realm.
    pub num: u64,
}

/// Address of an account (payers, node owners).
pub type AccountId = EntityId;

/// Address of a temporary storage blob used by chunked submissions.
pub type BlobId = EntityId;

impl EntityId {
    /// Creates an entity address from its three components.
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    /// Shorthand for an address in shard 0, realm 0.
    pub const fn from_num(num: u64) -> Self {
        Self::new(0, 0, num)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for EntityId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let mut next = |what: &'static str| -> Result<u64, IdError> {
            let part = parts
                .next()
                .ok_or_else(|| IdError::unparsable(s, "expected shard.realm.num"))?;
            parse_digits::<u64>(part).ok_or_else(|| IdError::unparsable(s, what))
        };

        let shard = next("shard is not a non-negative integer")?;
        let realm = next("realm is not a non-negative integer")?;
        let num = next("num is not a non-negative integer")?;

        if parts.next().is_some() {
            return Err(IdError::unparsable(s, "expected shard.realm.num"));
        }

        Ok(Self { shard, realm, num })
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
