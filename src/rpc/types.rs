//! Chain-level value types shared by the RPC client, candidate detectors, and
//! the scanner.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_LENGTH: usize = 8;

/// Account address on the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Builds an address from up to eight bytes, left-padding with zeros.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > ADDRESS_LENGTH {
            bail!(
                "address must be at most {ADDRESS_LENGTH} bytes, got {}",
                bytes.len()
            );
        }
        let mut out = [0u8; ADDRESS_LENGTH];
        out[ADDRESS_LENGTH - bytes.len()..].copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self(value.to_be_bytes())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            bail!("address cannot be empty");
        }
        if digits.len() > ADDRESS_LENGTH * 2 {
            bail!("address {trimmed} is longer than {ADDRESS_LENGTH} bytes");
        }
        let padded = format!("{digits:0>width$}", width = ADDRESS_LENGTH * 2);
        let bytes = hex::decode(&padded).with_context(|| format!("invalid address {trimmed}"))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub id: String,
}

/// Event emitted by a transaction; `payload` is left undecoded so extractors
/// can pick whichever field carries the address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub block_height: u64,
    pub transaction_id: String,
    #[serde(default)]
    pub event_index: u32,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub id: String,
    pub payer: Address,
    pub proposer: Address,
    #[serde(default)]
    pub authorizers: Vec<Address>,
}
