//! Change-output detection.
//!
//! A transaction usually pays someone and returns the rest to the spender.
//! The detector looks for the output that goes back to the spender using
//! three signals:
//!
//! | Signal | Strength | Applies to |
//! |--------|----------|------------|
//! | Address reuse: output pays an input address | decisive | any tx |
//! | Script kind matches the inputs, payment's does not | supporting | 2 outputs |
//! | Value is non-round, payment's is round | supporting | 2 outputs |
//!
//! An output is chosen on address reuse, or when both supporting signals
//! point at it.

use serde::{Deserialize, Serialize};
use shared_types::{Address, Amount, FlowOutput, FlowTransaction};
use std::collections::BTreeSet;

/// Values that are a multiple of this (0.001 coin) look like chosen
/// payment amounts.
pub const ROUND_VALUE_UNIT: u64 = 100_000;

/// Output script family, inferred from the address encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    Taproot,
    SegwitV0,
    P2sh,
    P2pkh,
    Unknown,
}

impl ScriptKind {
    pub fn of(address: &Address) -> Self {
        let a = address.as_str();
        let lower = a.to_ascii_lowercase();
        if ["bc1p", "tb1p", "bcrt1p"].iter().any(|p| lower.starts_with(p)) {
            ScriptKind::Taproot
        } else if ["bc1q", "tb1q", "bcrt1q"].iter().any(|p| lower.starts_with(p)) {
            ScriptKind::SegwitV0
        } else if a.starts_with('3') || a.starts_with('2') {
            ScriptKind::P2sh
        } else if a.starts_with('1') || a.starts_with('m') || a.starts_with('n') {
            ScriptKind::P2pkh
        } else {
            ScriptKind::Unknown
        }
    }
}

/// Evidence supporting a change attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSignal {
    AddressReuse,
    ScriptKindMatch,
    NonRoundValue,
}

/// The output attributed to the spender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDetection {
    pub output_index: u32,
    pub signals: Vec<ChangeSignal>,
}

pub fn is_round_value(value: Amount) -> bool {
    let units = value.base_units();
    units >= ROUND_VALUE_UNIT && units % ROUND_VALUE_UNIT == 0
}

/// Kind shared by every output address, if there is exactly one.
fn output_kind(output: &FlowOutput) -> Option<ScriptKind> {
    let kinds: BTreeSet<ScriptKind> = output.addresses.iter().map(ScriptKind::of).collect();
    match kinds.len() {
        1 => kinds.into_iter().next().filter(|k| *k != ScriptKind::Unknown),
        _ => None,
    }
}

/// Find the change output of `tx`, given the owners of its inputs.
///
/// Coinbase and coinjoin transactions have no change. An output already
/// flagged as change is returned as-is.
pub fn detect_change(
    tx: &FlowTransaction,
    input_addresses: &BTreeSet<Address>,
) -> Option<ChangeDetection> {
    if tx.is_coinbase || tx.is_coinjoin || tx.outputs.len() < 2 {
        return None;
    }
    if let Some(flagged) = tx.outputs.iter().find(|o| o.is_change) {
        return Some(ChangeDetection {
            output_index: flagged.output_index,
            signals: Vec::new(),
        });
    }

    let reused: Vec<&FlowOutput> = tx
        .outputs
        .iter()
        .filter(|o| !o.addresses.is_disjoint(input_addresses))
        .collect();
    if reused.len() == 1 {
        let output = reused[0];
        let mut signals = vec![ChangeSignal::AddressReuse];
        if tx.outputs.len() == 2 {
            signals.extend(supporting_signals(tx, output, input_addresses));
        }
        return Some(ChangeDetection {
            output_index: output.output_index,
            signals,
        });
    }
    if !reused.is_empty() || tx.outputs.len() != 2 {
        return None;
    }

    let mut candidates = tx.outputs.iter().filter_map(|output| {
        let signals = supporting_signals(tx, output, input_addresses);
        (signals.len() >= 2).then(|| ChangeDetection {
            output_index: output.output_index,
            signals,
        })
    });
    let first = candidates.next();
    if candidates.next().is_some() {
        return None;
    }
    first
}

fn supporting_signals(
    tx: &FlowTransaction,
    output: &FlowOutput,
    input_addresses: &BTreeSet<Address>,
) -> Vec<ChangeSignal> {
    let Some(other) = tx
        .outputs
        .iter()
        .find(|o| o.output_index != output.output_index)
    else {
        return Vec::new();
    };

    let mut signals = Vec::new();
    let input_kinds: BTreeSet<ScriptKind> = input_addresses.iter().map(ScriptKind::of).collect();
    if input_kinds.len() == 1 {
        let input_kind = input_kinds.into_iter().next();
        let kind = output_kind(output);
        if kind.is_some() && kind == input_kind && output_kind(other) != input_kind {
            signals.push(ChangeSignal::ScriptKindMatch);
        }
    }
    if !is_round_value(output.value) && is_round_value(other.value) {
        signals.push(ChangeSignal::NonRoundValue);
    }
    signals
}
