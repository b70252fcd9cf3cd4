//! Raw → canonical transaction conversion.

use super::coinjoin::detect_coinjoin;
use super::errors::{MalformedReason, NormalizeError, NormalizeResult};
use super::raw::{RawBlock, RawInput, RawTransaction};
use shared_types::{Amount, FlowInput, FlowOutput, FlowTransaction, PrevOutput, TxId, UtxoId};
use std::collections::HashSet;
use tracing::debug;

/// Normalize a raw transaction, optionally in the context of its block.
///
/// Timestamp precedence: `raw_block.time`, then `blocktime`, then `time`.
pub fn normalize(
    raw_tx: &RawTransaction,
    raw_block: Option<&RawBlock>,
) -> NormalizeResult<FlowTransaction> {
    let tx_id = raw_tx.txid.trim();
    let reject = |reason| NormalizeError::malformed(tx_id, reason);

    if tx_id.is_empty() {
        return Err(reject(MalformedReason::EmptyTxId));
    }
    if raw_tx.vin.is_empty() {
        return Err(reject(MalformedReason::NoInputs));
    }
    if raw_tx.vout.is_empty() {
        return Err(reject(MalformedReason::NoOutputs));
    }

    let coinbase_inputs = raw_tx.vin.iter().filter(|i| i.is_coinbase()).count();
    let is_coinbase = coinbase_inputs > 0;
    if is_coinbase && coinbase_inputs != raw_tx.vin.len() {
        return Err(reject(MalformedReason::MixedCoinbase));
    }

    let mut inputs = Vec::new();
    let mut seen_outpoints: HashSet<UtxoId> = HashSet::new();
    for (input_index, raw_input) in raw_tx.vin.iter().enumerate() {
        let RawInput::Spend {
            txid,
            vout,
            prevout,
        } = raw_input
        else {
            continue;
        };
        if txid.trim().is_empty() {
            return Err(reject(MalformedReason::EmptyPrevTxId(input_index)));
        }
        let input = FlowInput {
            prev_tx_id: TxId::new(txid.trim()),
            prev_output_index: *vout,
            prevout: match prevout {
                Some(prev) => Some(PrevOutput {
                    value: prev.value.to_amount().map_err(|source| {
                        reject(MalformedReason::InvalidPrevoutValue {
                            input_index,
                            source,
                        })
                    })?,
                    addresses: prev.script_pub_key.address_set(),
                }),
                None => None,
            },
        };
        let outpoint = input.outpoint();
        if !seen_outpoints.insert(outpoint.clone()) {
            return Err(reject(MalformedReason::DuplicateOutpoint(
                outpoint.to_string(),
            )));
        }
        inputs.push(input);
    }

    let mut outputs = Vec::with_capacity(raw_tx.vout.len());
    let mut seen_indices = HashSet::new();
    for raw_output in &raw_tx.vout {
        if !seen_indices.insert(raw_output.n) {
            return Err(reject(MalformedReason::DuplicateOutputIndex(raw_output.n)));
        }
        let value = raw_output.value.to_amount().map_err(|source| {
            reject(MalformedReason::InvalidValue {
                output_index: raw_output.n,
                source,
            })
        })?;
        outputs.push(FlowOutput {
            output_index: raw_output.n,
            value,
            addresses: raw_output.script_pub_key.address_set(),
            is_change: false,
        });
    }

    let fee = match &raw_tx.fee {
        Some(raw_fee) => raw_fee
            .to_amount()
            .map_err(|e| reject(MalformedReason::InvalidFee(e)))?,
        None => Amount::ZERO,
    };

    let is_coinjoin = !is_coinbase && detect_coinjoin(inputs.len(), &outputs);
    let timestamp = raw_block
        .map(|b| b.time)
        .or(raw_tx.blocktime)
        .or(raw_tx.time);

    debug!(
        tx_id,
        inputs = inputs.len(),
        outputs = outputs.len(),
        is_coinbase,
        is_coinjoin,
        "Normalized transaction"
    );

    Ok(FlowTransaction {
        tx_id: TxId::new(tx_id),
        inputs,
        outputs,
        fee,
        is_coinbase,
        is_coinjoin,
        timestamp,
        block_height: raw_block.map(|b| b.height),
    })
}
