//! Partitioned document identifiers.
//!
//! Ids take the form `<full type>:<uuid v1>`, which lets CouchDB range and
//! partition queries address every document of one type by prefix.

use crate::{Error, Result, TypeName, PARTITION_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

/// Random node id for v1 UUIDs, fixed for the life of the process.
fn node_id() -> &'static [u8; 6] {
    static NODE: OnceLock<[u8; 6]> = OnceLock::new();
    NODE.get_or_init(|| {
        let seed = Uuid::new_v4();
        let mut node = [0u8; 6];
        node.copy_from_slice(&seed.as_bytes()[..6]);
        // multicast bit marks the node id as random rather than a MAC address
        node[0] |= 0x01;
        node
    })
}

/// A document id scoped to one type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartitionedId {
    full_type: String,
    suffix: String,
}

impl PartitionedId {
    /// Generates a fresh id for the given type using a time-based v1 UUID.
    #[must_use]
    pub fn generate(type_name: &TypeName) -> Self {
        Self {
            full_type: type_name.full().to_string(),
            suffix: Uuid::now_v1(node_id()).to_string(),
        }
    }

    /// Parses an id of the form `<full type>:<suffix>` with exactly one separator.
    pub fn parse(s: &str) -> Result<Self> {
        let (full_type, suffix) = s
            .split_once(PARTITION_SEPARATOR)
            .ok_or_else(|| Error::InvalidId(format!("{s:?} has no partition separator")))?;
        if full_type.is_empty() || suffix.is_empty() {
            return Err(Error::InvalidId(format!("{s:?} has an empty partition or suffix")));
        }
        if suffix.contains(PARTITION_SEPARATOR) {
            return Err(Error::InvalidId(format!("{s:?} has more than one separator")));
        }
        Ok(Self {
            full_type: full_type.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// The partition (full type) half of the id.
    pub fn full_type(&self) -> &str {
        &self.full_type
    }

    /// The unique half of the id.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns true if the id lives in the given type's partition.
    pub fn belongs_to(&self, type_name: &TypeName) -> bool {
        self.full_type == type_name.full()
    }
}

impl fmt::Display for PartitionedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{PARTITION_SEPARATOR}{}", self.full_type, self.suffix)
    }
}

impl FromStr for PartitionedId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PartitionedId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PartitionedId> for String {
    fn from(id: PartitionedId) -> Self {
        id.to_string()
    }
}
