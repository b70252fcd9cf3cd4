//! # Core Domain Entities
//!
//! Defines the flow-graph entities every engine reads and writes.
//!
//! ## Clusters
//!
//! - **Identity**: `Address`, `TxId`, `UtxoId`, `ClusterId`
//! - **Value**: `Amount` (exact integer base units)
//! - **Transactions**: `FlowTransaction`, `FlowInput`, `FlowOutput`
//! - **Graph**: `UtxoNode`, `SpendEdge`, `CoSpendEdge`, `ChangeLink`
//! - **Evidence**: `AddressActivity`, `TransactionRecord`

use crate::errors::{AmountParseError, UtxoIdParseError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Numeric tolerance used when checking that spend proportions sum to ≤ 1.
pub const PROPORTION_EPSILON: f64 = 1e-9;

/// Base units per whole coin (satoshis per BTC).
pub const BASE_UNITS_PER_COIN: u64 = 100_000_000;

/// Fractional digits carried by a decimal coin amount.
pub const COIN_DECIMALS: u32 = 8;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A chain address as rendered by the chain adapter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A transaction hash as rendered by the chain adapter (hex).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TxId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of one transaction output, rendered as `tx_id:output_index`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtxoId {
    pub tx_id: TxId,
    pub output_index: u32,
}

impl UtxoId {
    pub fn new(tx_id: impl Into<TxId>, output_index: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            output_index,
        }
    }
}

impl fmt::Display for UtxoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.output_index)
    }
}

impl FromStr for UtxoId {
    type Err = UtxoIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tx, index) = s
            .rsplit_once(':')
            .ok_or_else(|| UtxoIdParseError(s.to_string()))?;
        if tx.is_empty() {
            return Err(UtxoIdParseError(s.to_string()));
        }
        let output_index = index
            .parse::<u32>()
            .map_err(|_| UtxoIdParseError(s.to_string()))?;
        Ok(Self::new(tx, output_index))
    }
}

impl Serialize for UtxoId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UtxoId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifier of a persisted address cluster.
///
/// Derived from the lexicographically smallest member so that the same
/// member set always maps to the same id, whichever process computed it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Cluster id anchored on a single member address.
    pub fn from_anchor(anchor: &Address) -> Self {
        let digest = Sha256::digest(anchor.as_str().as_bytes());
        let encoded = hex::encode(digest);
        Self(format!("cl-{}", &encoded[..16]))
    }

    /// Cluster id for a member set (anchored on its smallest member).
    pub fn for_members<'a, I>(members: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        members.into_iter().min().map(Self::from_anchor)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CLUSTER B: VALUE
// =============================================================================

/// An exact amount in integer base units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_base_units(units: u64) -> Self {
        Self(units)
    }

    pub const fn base_units(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Exact sum of many amounts.
    pub fn sum<I: IntoIterator<Item = Amount>>(amounts: I) -> u128 {
        amounts.into_iter().map(|a| a.0 as u128).sum()
    }

    /// Share of `total` this amount represents (0 when `total` is zero).
    pub fn ratio_of(self, total: u128) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.0 as f64 / total as f64
        }
    }

    /// Parse a decimal coin amount (e.g. `"0.015"`, `"1e-8"`) into base units.
    ///
    /// Parsing is exact: no intermediate float is involved, and any digit
    /// below one base unit is rejected rather than rounded.
    pub fn parse_decimal(text: &str) -> Result<Self, AmountParseError> {
        let invalid = || AmountParseError::Invalid(text.to_string());
        let trimmed = text.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (mantissa, exponent) = match body.find(|c: char| c == 'e' || c == 'E') {
            Some(pos) => {
                let exponent = body[pos + 1..].parse::<i64>().map_err(|_| invalid())?;
                (&body[..pos], exponent)
            }
            None => (body, 0),
        };

        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let digits = format!("{int_part}{frac_part}");
        let significant = digits.trim_start_matches('0');
        if significant.is_empty() {
            return Ok(Amount::ZERO);
        }
        if negative {
            return Err(AmountParseError::Negative(text.to_string()));
        }

        let overflow = || AmountParseError::Overflow(text.to_string());
        let mut value: u128 = significant.parse().map_err(|_| overflow())?;
        let shift = i64::try_from(frac_part.len())
            .ok()
            .and_then(|frac_len| exponent.checked_sub(frac_len))
            .and_then(|shift| shift.checked_add(COIN_DECIMALS as i64))
            .ok_or_else(overflow)?;
        if shift >= 0 {
            for _ in 0..shift {
                value = value.checked_mul(10).ok_or_else(overflow)?;
            }
        } else {
            for _ in 0..shift.unsigned_abs() {
                if value % 10 != 0 {
                    return Err(AmountParseError::TooPrecise(text.to_string()));
                }
                value /= 10;
            }
        }

        u64::try_from(value).map(Amount).map_err(|_| overflow())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:08}",
            self.0 / BASE_UNITS_PER_COIN,
            self.0 % BASE_UNITS_PER_COIN
        )
    }
}

// =============================================================================
// CLUSTER C: TRANSACTIONS
// =============================================================================

/// Value and owners of the output an input consumes, when the chain adapter
/// supplies them inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrevOutput {
    pub value: Amount,
    pub addresses: BTreeSet<Address>,
}

/// A reference to a previously created output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowInput {
    pub prev_tx_id: TxId,
    pub prev_output_index: u32,
    /// Inline copy of the consumed output, if the adapter provided one.
    pub prevout: Option<PrevOutput>,
}

impl FlowInput {
    pub fn outpoint(&self) -> UtxoId {
        UtxoId::new(self.prev_tx_id.clone(), self.prev_output_index)
    }
}

/// One output created by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowOutput {
    pub output_index: u32,
    pub value: Amount,
    pub addresses: BTreeSet<Address>,
    /// Set when the output was identified as change returning to the spender.
    pub is_change: bool,
}

/// A normalized transaction: the unit the taint engine consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowTransaction {
    pub tx_id: TxId,
    pub inputs: Vec<FlowInput>,
    pub outputs: Vec<FlowOutput>,
    /// Declared fee (zero when the adapter did not supply one).
    pub fee: Amount,
    pub is_coinbase: bool,
    pub is_coinjoin: bool,
    /// Unix seconds, taken from the containing block when known.
    pub timestamp: Option<u64>,
    pub block_height: Option<u64>,
}

impl FlowTransaction {
    pub fn utxo_id(&self, output_index: u32) -> UtxoId {
        UtxoId::new(self.tx_id.clone(), output_index)
    }

    pub fn output(&self, output_index: u32) -> Option<&FlowOutput> {
        self.outputs.iter().find(|o| o.output_index == output_index)
    }

    /// Exact sum of all output values.
    pub fn total_output_value(&self) -> u128 {
        Amount::sum(self.outputs.iter().map(|o| o.value))
    }

    /// Every address receiving an output of this transaction.
    pub fn output_addresses(&self) -> BTreeSet<Address> {
        self.outputs
            .iter()
            .flat_map(|o| o.addresses.iter().cloned())
            .collect()
    }

    pub fn has_change_output(&self) -> bool {
        self.outputs.iter().any(|o| o.is_change)
    }

    /// Returns a copy of this transaction with `output_index` flagged as change.
    ///
    /// Unknown indices leave the transaction untouched.
    pub fn with_change_output(mut self, output_index: u32) -> Self {
        if let Some(output) = self
            .outputs
            .iter_mut()
            .find(|o| o.output_index == output_index)
        {
            output.is_change = true;
        }
        self
    }
}

// =============================================================================
// CLUSTER D: GRAPH
// =============================================================================

/// One transaction output as persisted in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtxoNode {
    pub utxo_id: UtxoId,
    pub value: Amount,
    pub owning_addresses: BTreeSet<Address>,
    pub is_change: bool,
    pub is_coinjoin: bool,
    pub spent: bool,
    /// Fraction of the value traceable to a flagged source, in `[0, 1]`.
    pub taint_score: f64,
    pub block_height: Option<u64>,
    pub timestamp: Option<u64>,
}

impl UtxoNode {
    /// Build the node for `output` of `tx` carrying `taint_score`.
    pub fn from_output(tx: &FlowTransaction, output: &FlowOutput, taint_score: f64) -> Self {
        Self {
            utxo_id: tx.utxo_id(output.output_index),
            value: output.value,
            owning_addresses: output.addresses.clone(),
            is_change: output.is_change,
            is_coinjoin: tx.is_coinjoin,
            spent: false,
            taint_score: clamp_taint(taint_score),
            block_height: tx.block_height,
            timestamp: tx.timestamp,
        }
    }

    /// Tainted value in base units (value × taint).
    pub fn tainted_value(&self) -> f64 {
        self.value.as_f64() * self.taint_score
    }

    pub fn is_owned_by(&self, address: &Address) -> bool {
        self.owning_addresses.contains(address)
    }
}

/// Directed flow of value (and taint) from a consumed output into a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendEdge {
    pub from: UtxoId,
    pub to: UtxoId,
    pub tx_hash: TxId,
    /// Fraction of the source output's value flowing into `to`.
    pub proportion: f64,
    /// Part of `to`'s taint score attributable to `from`.
    pub taint_contribution: f64,
}

impl SpendEdge {
    pub fn key(&self) -> (UtxoId, UtxoId) {
        (self.from.clone(), self.to.clone())
    }
}

/// One directed row of the symmetric co-spend relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoSpendEdge {
    pub address: Address,
    pub neighbor: Address,
    pub tx_count: u64,
    pub evidence_tx_ids: BTreeSet<TxId>,
}

/// Evidence that `change_address` received change from `input_address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLink {
    pub input_address: Address,
    pub change_address: Address,
    pub change_count: u64,
    pub evidence_tx_ids: BTreeSet<TxId>,
}

impl ChangeLink {
    /// The endpoint of this link that is not `address`.
    pub fn other(&self, address: &Address) -> &Address {
        if &self.input_address == address {
            &self.change_address
        } else {
            &self.input_address
        }
    }
}

// =============================================================================
// CLUSTER E: EVIDENCE
// =============================================================================

/// Side of a transaction an address appeared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActivityRole {
    Input,
    Output,
}

/// A timestamped appearance of an address in a transaction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AddressActivity {
    pub address: Address,
    pub tx_id: TxId,
    pub timestamp: u64,
    pub role: ActivityRole,
}

/// A processed transaction together with the resolved addresses of its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction: FlowTransaction,
    pub input_addresses: BTreeSet<Address>,
}

impl TransactionRecord {
    pub fn tx_id(&self) -> &TxId {
        &self.transaction.tx_id
    }
}

/// Clamp a taint score into `[0, 1]`, mapping NaN to 0.
pub fn clamp_taint(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Truncate a taint score to `decimals` places, never rounding up.
pub fn truncate_taint(score: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (clamp_taint(score) * factor).floor() / factor
}

/// Render a taint score for display (truncated, never rounded up).
pub fn format_taint(score: f64, decimals: u32) -> String {
    format!(
        "{:.*}",
        decimals as usize,
        truncate_taint(score, decimals)
    )
}
