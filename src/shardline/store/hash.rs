//! Shard hash strategies
//!
//! The strategy is resolved once from its configuration name. Unknown names
//! fail configuration loading instead of leaving the router without a hasher.

use crate::shardline::error::ConfigError;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// Closed set of supported key-to-shard hash functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum HashStrategy {
    /// FNV-1 32-bit content hash (deterministic)
    Fnv32,
    /// FNV-1a 32-bit content hash (deterministic)
    Fnv32a,
    /// Pseudo-random spreading, no key affinity
    Random,
    /// Numeric segment of a `<id>_<kind>_<suffix>` composite key
    NumericSuffix,
}

impl HashStrategy {
    /// Hash a routing key
    pub fn hash(&self, key: &str) -> u64 {
        match self {
            HashStrategy::Fnv32 => u64::from(fnv32(key.as_bytes())),
            HashStrategy::Fnv32a => u64::from(fnv32a(key.as_bytes())),
            HashStrategy::Random => rand::random::<u64>(),
            HashStrategy::NumericSuffix => numeric_suffix(key),
        }
    }

    /// Whether the same key always produces the same hash
    pub fn is_deterministic(&self) -> bool {
        !matches!(self, HashStrategy::Random)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HashStrategy::Fnv32 => "fnv32",
            HashStrategy::Fnv32a => "fnv32a",
            HashStrategy::Random => "random",
            HashStrategy::NumericSuffix => "numeric-suffix",
        }
    }
}

impl Default for HashStrategy {
    fn default() -> Self {
        HashStrategy::Fnv32
    }
}

impl fmt::Display for HashStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashStrategy {
    type Err = ConfigError;

    /// Accepts the canonical names and the legacy upper-case registry names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fnv32" | "content-hash" => Ok(HashStrategy::Fnv32),
            "fnv32a" => Ok(HashStrategy::Fnv32a),
            "random" | "randsum" | "pseudo-random" => Ok(HashStrategy::Random),
            "numeric-suffix" | "remainder" => Ok(HashStrategy::NumericSuffix),
            _ => Err(ConfigError::UnknownHasher(s.to_string())),
        }
    }
}

impl Serialize for HashStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl TryFrom<String> for HashStrategy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn fnv32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV32_OFFSET_BASIS, |hash, b| {
        hash.wrapping_mul(FNV32_PRIME) ^ u32::from(*b)
    })
}

fn fnv32a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV32_OFFSET_BASIS, |hash, b| {
        (hash ^ u32::from(*b)).wrapping_mul(FNV32_PRIME)
    })
}

/// Keys shaped like `<id>_transmit_new` route on the last two digits of `<id>`.
/// Anything else routes to 0.
fn numeric_suffix(key: &str) -> u64 {
    let segments: Vec<&str> = key.split('_').collect();
    if segments.len() < 3 {
        return 0;
    }
    let id = segments[0];
    let tail = id
        .char_indices()
        .rev()
        .nth(1)
        .map(|(i, _)| &id[i..])
        .unwrap_or(id);
    tail.parse::<u64>().unwrap_or(0)
}
