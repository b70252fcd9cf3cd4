//! Raw record shapes as emitted by a bitcoind-compatible chain adapter
//! (`getrawtransaction` verbosity 1 or 2, `getblock` header fields).

use serde::{Deserialize, Serialize};
use shared_types::{Address, Amount, AmountParseError};
use std::collections::BTreeSet;

/// A raw transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<RawInput>,
    #[serde(default)]
    pub vout: Vec<RawOutput>,
    /// Fee in coins, only present at verbosity 2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<RawAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocktime: Option<u64>,
}

/// One `vin` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInput {
    Coinbase {
        coinbase: String,
    },
    Spend {
        txid: String,
        vout: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prevout: Option<RawPrevout>,
    },
}

impl RawInput {
    pub fn is_coinbase(&self) -> bool {
        matches!(self, RawInput::Coinbase { .. })
    }
}

/// The consumed output, inlined on the input at verbosity 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPrevout {
    pub value: RawAmount,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: RawScriptPubKey,
}

/// One `vout` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutput {
    pub n: u32,
    pub value: RawAmount,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: RawScriptPubKey,
}

/// Destination script; older nodes emit `addresses`, newer ones `address`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawScriptPubKey {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl RawScriptPubKey {
    /// Union of both address fields, deduplicated and ordered. Blank entries
    /// are dropped.
    pub fn address_set(&self) -> BTreeSet<Address> {
        self.addresses
            .iter()
            .chain(self.address.iter())
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(Address::from)
            .collect()
    }
}

/// A coin amount as it appears on the wire: a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

impl RawAmount {
    /// Exact conversion to base units.
    pub fn to_amount(&self) -> Result<Amount, AmountParseError> {
        match self {
            RawAmount::Number(number) => Amount::parse_decimal(&number.to_string()),
            RawAmount::Text(text) => Amount::parse_decimal(text),
        }
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

/// Block header fields the normalizer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub height: u64,
    pub hash: String,
    pub time: u64,
}
