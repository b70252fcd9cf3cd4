//! Peeling-chain pattern.
//!
//! A peel is a two-output spend where most of the value returns as change
//! and a smaller slice is paid out. Long runs of peels are typical of hot
//! wallets paying withdrawals, or of launderers shaving funds off a hub.

use serde::{Deserialize, Serialize};
use shared_types::{Address, TransactionRecord};
use std::collections::BTreeSet;

/// Change share at or above which a two-output spend counts as a peel.
pub const MIN_PEEL_CHANGE_RATIO: f64 = 0.5;

/// Peels needed before a chain is reported.
pub const MIN_CHAIN_PEELS: u64 = 2;

/// Peels above which the entity is a high-volume operator.
pub const HIGH_VOLUME_PEELS: u64 = 10;

/// Average change ratio separating hot wallets from tumblers.
pub const HOT_WALLET_CHANGE_RATIO: f64 = 0.9;

/// One observed peel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peel {
    pub change_ratio: f64,
    /// Where the change went; the walk continues from these.
    pub change_addresses: BTreeSet<Address>,
}

/// Classify a spending transaction as a peel.
pub fn peel_of(record: &TransactionRecord) -> Option<Peel> {
    let tx = &record.transaction;
    if tx.is_coinjoin || tx.outputs.len() != 2 {
        return None;
    }
    let change_pos = tx.outputs.iter().position(|o| o.is_change).or_else(|| {
        tx.outputs
            .iter()
            .position(|o| !o.addresses.is_disjoint(&record.input_addresses))
    })?;
    let change = &tx.outputs[change_pos];
    let payment = &tx.outputs[1 - change_pos];

    let total = change.value.base_units() as u128 + payment.value.base_units() as u128;
    if total == 0 {
        return None;
    }
    let change_ratio = change.value.ratio_of(total);
    (change_ratio >= MIN_PEEL_CHANGE_RATIO).then(|| Peel {
        change_ratio,
        change_addresses: change.addresses.clone(),
    })
}

/// Entity suggested by a peeling pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeelEntityType {
    Unknown,
    PaymentProcessor,
    ExchangeHotWallet,
    PossibleTumbler,
}

impl PeelEntityType {
    pub fn classify(peel_count: u64, avg_change_ratio: f64) -> Self {
        if peel_count < MIN_CHAIN_PEELS {
            PeelEntityType::Unknown
        } else if peel_count < HIGH_VOLUME_PEELS {
            PeelEntityType::PaymentProcessor
        } else if avg_change_ratio >= HOT_WALLET_CHANGE_RATIO {
            PeelEntityType::ExchangeHotWallet
        } else {
            PeelEntityType::PossibleTumbler
        }
    }
}
