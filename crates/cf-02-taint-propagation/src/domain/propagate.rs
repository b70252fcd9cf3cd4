//! The propagation function: one transaction in, edges and taints out.

use super::allocation::{Allocation, ChangeFunding};
use super::model::{FeeTaintPolicy, TaintModel};
use crate::error::{TaintError, TaintResult};
use crate::types::TaintConfig;
use serde::{Deserialize, Serialize};
use shared_types::{
    clamp_taint, Address, Amount, FlowTransaction, SpendEdge, UtxoId, UtxoNode,
};
use std::collections::{BTreeMap, BTreeSet};

/// Where the value of an unresolved input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Inline `prevout` supplied by the chain adapter.
    Prevout,
    /// `(Σoutputs + fee − Σknown inputs)` split evenly over missing inputs.
    Inferred,
}

/// Non-fatal conditions found while propagating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropagationWarning {
    /// The consumed output is not in the graph; it contributes zero taint
    /// and gets no spend edge.
    MissingInput {
        outpoint: UtxoId,
        value: Amount,
        value_source: ValueSource,
    },
    /// Declared fee disagrees with `Σinputs − Σoutputs`.
    FeeMismatch { declared: Amount, effective: Amount },
}

/// Result of propagating one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationOutcome {
    /// Spend edges from every resolved input to the outputs it funds.
    pub edges: Vec<SpendEdge>,
    /// Taint score per output index.
    pub output_taints: BTreeMap<u32, f64>,
    /// Fee actually used for allocation.
    pub fee: Amount,
    /// Tainted value consumed as fee, in base units.
    pub fee_taint: f64,
    pub warnings: Vec<PropagationWarning>,
}

impl PropagationOutcome {
    pub fn taint_of(&self, output_index: u32) -> f64 {
        self.output_taints
            .get(&output_index)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn missing_inputs(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, PropagationWarning::MissingInput { .. }))
            .count()
    }
}

/// One input with its value and taint settled.
#[derive(Debug, Clone)]
struct InputState {
    outpoint: UtxoId,
    value: u64,
    taint: f64,
    addresses: BTreeSet<Address>,
    /// Present in the graph (gets spend edges).
    resolved: bool,
}

/// Propagate taint across `tx`.
///
/// `input_utxos[i]` is the stored node consumed by `tx.inputs[i]`, or `None`
/// when the graph does not know it.
pub fn propagate(
    tx: &FlowTransaction,
    input_utxos: &[Option<UtxoNode>],
    config: &TaintConfig,
) -> TaintResult<PropagationOutcome> {
    config.model.validate()?;

    let output_values: Vec<u64> = tx.outputs.iter().map(|o| o.value.base_units()).collect();

    if tx.is_coinbase || tx.inputs.is_empty() {
        return Ok(PropagationOutcome {
            edges: Vec::new(),
            output_taints: tx.outputs.iter().map(|o| (o.output_index, 0.0)).collect(),
            fee: Amount::ZERO,
            fee_taint: 0.0,
            warnings: Vec::new(),
        });
    }

    let mut warnings = Vec::new();
    let inputs = settle_inputs(tx, input_utxos, &mut warnings)?;
    let input_values: Vec<u64> = inputs.iter().map(|i| i.value).collect();

    let total_in: u128 = input_values.iter().map(|&v| v as u128).sum();
    let total_out = tx.total_output_value();
    let fee = Amount::from_base_units(u64::try_from(total_in - total_out).unwrap_or(u64::MAX));
    if !tx.fee.is_zero() && tx.fee != fee {
        warnings.push(PropagationWarning::FeeMismatch {
            declared: tx.fee,
            effective: fee,
        });
    }

    let mut allocation = build_allocation(tx, &inputs, &input_values, &output_values, config);
    if config.fee_policy == FeeTaintPolicy::FoldIntoOutputs {
        allocation.fold_fee_into_outputs(&output_values);
    }

    let hop = config.model.hop_multiplier();
    let tainted_in: f64 = inputs.iter().map(|i| i.value as f64 * i.taint).sum();
    let mix = if total_in == 0 {
        0.0
    } else {
        tainted_in / total_in as f64
    };

    let mut edges = Vec::new();
    let mut output_taints = BTreeMap::new();
    for (j, output) in tx.outputs.iter().enumerate() {
        let inflow = allocation.inflow(j);
        let to = tx.utxo_id(output.output_index);

        if inflow <= 0.0 {
            output_taints.insert(output.output_index, clamp_taint(mix * hop));
            continue;
        }

        let tainted: f64 = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| allocation.flows[i][j] * input.taint)
            .sum();
        output_taints.insert(output.output_index, clamp_taint(tainted / inflow * hop));

        for (i, input) in inputs.iter().enumerate() {
            let flow = allocation.flows[i][j];
            if !input.resolved || input.value == 0 || flow <= 0.0 {
                continue;
            }
            edges.push(SpendEdge {
                from: input.outpoint.clone(),
                to: to.clone(),
                tx_hash: tx.tx_id.clone(),
                proportion: (flow / input.value as f64).min(1.0),
                taint_contribution: clamp_taint(flow * input.taint / inflow * hop),
            });
        }
    }

    let fee_taint: f64 = inputs
        .iter()
        .zip(&allocation.fee)
        .map(|(input, fee)| fee * input.taint)
        .sum::<f64>()
        * hop;

    Ok(PropagationOutcome {
        edges,
        output_taints,
        fee,
        fee_taint: fee_taint.max(0.0),
        warnings,
    })
}

/// Resolve every input's value and taint, inferring what the graph lacks.
fn settle_inputs(
    tx: &FlowTransaction,
    input_utxos: &[Option<UtxoNode>],
    warnings: &mut Vec<PropagationWarning>,
) -> TaintResult<Vec<InputState>> {
    let mut inputs = Vec::with_capacity(tx.inputs.len());
    let mut unknown = Vec::new();

    for (i, input) in tx.inputs.iter().enumerate() {
        let outpoint = input.outpoint();
        match (input_utxos.get(i).and_then(Option::as_ref), &input.prevout) {
            (Some(node), _) => inputs.push(InputState {
                outpoint,
                value: node.value.base_units(),
                taint: clamp_taint(node.taint_score),
                addresses: node.owning_addresses.clone(),
                resolved: true,
            }),
            (None, Some(prevout)) => {
                warnings.push(PropagationWarning::MissingInput {
                    outpoint: outpoint.clone(),
                    value: prevout.value,
                    value_source: ValueSource::Prevout,
                });
                inputs.push(InputState {
                    outpoint,
                    value: prevout.value.base_units(),
                    taint: 0.0,
                    addresses: prevout.addresses.clone(),
                    resolved: false,
                });
            }
            (None, None) => {
                unknown.push(inputs.len());
                inputs.push(InputState {
                    outpoint,
                    value: 0,
                    taint: 0.0,
                    addresses: BTreeSet::new(),
                    resolved: false,
                });
            }
        }
    }

    let known: u128 = inputs.iter().map(|i| i.value as u128).sum();
    let total_out = tx.total_output_value();

    if unknown.is_empty() {
        if known < total_out {
            return Err(TaintError::InvariantViolation {
                tx_id: tx.tx_id.to_string(),
                detail: format!("inputs total {known} below outputs total {total_out}"),
            });
        }
        return Ok(inputs);
    }

    let target = total_out + tx.fee.base_units() as u128;
    let remainder = target.saturating_sub(known);
    let count = unknown.len() as u128;
    let (base, extra) = (remainder / count, remainder % count);
    for (k, &pos) in unknown.iter().enumerate() {
        let share = base + u128::from((k as u128) < extra);
        let value = u64::try_from(share).unwrap_or(u64::MAX);
        inputs[pos].value = value;
        warnings.push(PropagationWarning::MissingInput {
            outpoint: inputs[pos].outpoint.clone(),
            value: Amount::from_base_units(value),
            value_source: ValueSource::Inferred,
        });
    }

    let settled: u128 = inputs.iter().map(|i| i.value as u128).sum();
    if settled < total_out {
        return Err(TaintError::InvariantViolation {
            tx_id: tx.tx_id.to_string(),
            detail: format!("inputs total {settled} below outputs total {total_out}"),
        });
    }
    Ok(inputs)
}

fn build_allocation(
    tx: &FlowTransaction,
    inputs: &[InputState],
    input_values: &[u64],
    output_values: &[u64],
    config: &TaintConfig,
) -> Allocation {
    if config.model == TaintModel::Fifo {
        return Allocation::fifo(input_values, output_values);
    }

    let change: Vec<ChangeFunding> = if config.exclude_change_from_distribution {
        tx.outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_change)
            .map(|(j, o)| ChangeFunding {
                output: j,
                source_input: change_source(inputs, &o.addresses),
            })
            .collect()
    } else {
        Vec::new()
    };

    if change.is_empty() || !config.model.supports_change_exclusion() {
        Allocation::proportional(input_values, output_values)
    } else {
        Allocation::with_change_excluded(input_values, output_values, &change)
    }
}

/// The input that owns the change address, else the largest (ties → first).
fn change_source(inputs: &[InputState], change_addresses: &BTreeSet<Address>) -> usize {
    if let Some(pos) = inputs
        .iter()
        .position(|i| !i.addresses.is_disjoint(change_addresses))
    {
        return pos;
    }
    let mut best = 0;
    for (pos, input) in inputs.iter().enumerate() {
        if input.value > inputs[best].value {
            best = pos;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{FlowInput, FlowOutput, PrevOutput, TxId};

    fn node(tx: &str, value: u64, taint: f64, owner: &str) -> UtxoNode {
        UtxoNode {
            utxo_id: UtxoId::new(tx, 0),
            value: Amount::from_base_units(value),
            owning_addresses: [Address::from(owner)].into_iter().collect(),
            is_change: false,
            is_coinjoin: false,
            spent: false,
            taint_score: taint,
            block_height: None,
            timestamp: None,
        }
    }

    fn tx(inputs: &[&str], outputs: &[(u64, &str)]) -> FlowTransaction {
        FlowTransaction {
            tx_id: TxId::from("spend"),
            inputs: inputs
                .iter()
                .map(|prev| FlowInput {
                    prev_tx_id: TxId::from(*prev),
                    prev_output_index: 0,
                    prevout: None,
                })
                .collect(),
            outputs: outputs
                .iter()
                .enumerate()
                .map(|(i, (value, owner))| FlowOutput {
                    output_index: i as u32,
                    value: Amount::from_base_units(*value),
                    addresses: [Address::from(*owner)].into_iter().collect(),
                    is_change: false,
                })
                .collect(),
            fee: Amount::ZERO,
            is_coinbase: false,
            is_coinjoin: false,
            timestamp: None,
            block_height: None,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_single_input_split_keeps_full_taint() {
        let t = tx(&["a"], &[(6, "1X"), (4, "1Y")]);
        let out = propagate(&t, &[Some(node("a", 10, 1.0, "1A"))], &TaintConfig::default()).unwrap();
        assert!(close(out.taint_of(0), 1.0));
        assert!(close(out.taint_of(1), 1.0));
        assert_eq!(out.edges.len(), 2);
        assert!(close(out.edges[0].proportion, 0.6));
        assert!(close(out.edges[1].proportion, 0.4));
    }

    #[test]
    fn test_value_weighted_mix() {
        let t = tx(&["a", "b"], &[(10, "1X")]);
        let out = propagate(
            &t,
            &[Some(node("a", 6, 1.0, "1A")), Some(node("b", 4, 0.0, "1B"))],
            &TaintConfig::default(),
        )
        .unwrap();
        assert!(close(out.taint_of(0), 0.6));
        let contributions: f64 = out.edges.iter().map(|e| e.taint_contribution).sum();
        assert!(close(contributions, 0.6));
    }

    #[test]
    fn test_fee_taint_is_reported() {
        let t = tx(&["a"], &[(90, "1X")]);
        let out = propagate(&t, &[Some(node("a", 100, 0.5, "1A"))], &TaintConfig::default()).unwrap();
        assert_eq!(out.fee.base_units(), 10);
        assert!(close(out.fee_taint, 5.0));
        assert!(close(out.taint_of(0), 0.5));
    }

    #[test]
    fn test_fold_policy_zeroes_fee_taint() {
        let t = tx(&["a", "b"], &[(90, "1X")]);
        let config = TaintConfig {
            fee_policy: FeeTaintPolicy::FoldIntoOutputs,
            ..TaintConfig::default()
        };
        let out = propagate(
            &t,
            &[Some(node("a", 50, 1.0, "1A")), Some(node("b", 50, 0.0, "1B"))],
            &config,
        )
        .unwrap();
        assert_eq!(out.fee_taint, 0.0);
        assert!(close(out.taint_of(0), 0.5));
        let proportion_a: f64 = out
            .edges
            .iter()
            .filter(|e| e.from.tx_id.as_str() == "a")
            .map(|e| e.proportion)
            .sum();
        assert!(close(proportion_a, 1.0));
    }

    #[test]
    fn test_change_exclusion_single_input() {
        let t = tx(&["a"], &[(7, "1Pay"), (2, "1A")]).with_change_output(1);
        let config = TaintConfig {
            exclude_change_from_distribution: true,
            ..TaintConfig::default()
        };
        let out = propagate(&t, &[Some(node("a", 10, 0.8, "1A"))], &config).unwrap();
        assert!(close(out.taint_of(0), 0.8));
        assert!(close(out.taint_of(1), 0.8));
    }

    #[test]
    fn test_change_exclusion_shifts_taint_to_payment() {
        // Clean input owns the change; the payment carries all the dirty value.
        let t = tx(&["dirty", "clean"], &[(50, "1Pay"), (50, "1Clean")]).with_change_output(1);
        let config = TaintConfig {
            exclude_change_from_distribution: true,
            ..TaintConfig::default()
        };
        let out = propagate(
            &t,
            &[
                Some(node("dirty", 50, 1.0, "1Dirty")),
                Some(node("clean", 50, 0.0, "1Clean")),
            ],
            &config,
        )
        .unwrap();
        assert!(close(out.taint_of(1), 0.0));
        assert!(close(out.taint_of(0), 1.0));
    }

    #[test]
    fn test_fifo_order() {
        let t = tx(&["a", "b"], &[(6, "1X"), (4, "1Y")]);
        let config = TaintConfig {
            model: TaintModel::Fifo,
            ..TaintConfig::default()
        };
        let out = propagate(
            &t,
            &[Some(node("a", 6, 1.0, "1A")), Some(node("b", 4, 0.0, "1B"))],
            &config,
        )
        .unwrap();
        assert!(close(out.taint_of(0), 1.0));
        assert!(close(out.taint_of(1), 0.0));
        assert_eq!(out.edges.len(), 2);
    }

    #[test]
    fn test_haircut_applies_per_hop() {
        let config = TaintConfig {
            model: TaintModel::Haircut { factor: 0.9 },
            ..TaintConfig::default()
        };
        let first = propagate(
            &tx(&["a"], &[(10, "1X")]),
            &[Some(node("a", 10, 1.0, "1A"))],
            &config,
        )
        .unwrap();
        assert!(close(first.taint_of(0), 0.9));

        let second = propagate(
            &tx(&["b"], &[(10, "1Y")]),
            &[Some(node("b", 10, first.taint_of(0), "1X"))],
            &config,
        )
        .unwrap();
        assert!(close(second.taint_of(0), 0.81));
    }

    #[test]
    fn test_invalid_haircut_rejected() {
        let config = TaintConfig {
            model: TaintModel::Haircut { factor: 1.0 },
            ..TaintConfig::default()
        };
        let result = propagate(&tx(&["a"], &[(1, "1X")]), &[None], &config);
        assert!(matches!(result, Err(TaintError::InvalidModel(_))));
    }

    #[test]
    fn test_missing_input_inferred_and_diluting() {
        let mut t = tx(&["a", "gone"], &[(100, "1X")]);
        t.fee = Amount::from_base_units(10);
        let out = propagate(&t, &[Some(node("a", 60, 1.0, "1A")), None], &TaintConfig::default())
            .unwrap();

        assert_eq!(out.missing_inputs(), 1);
        assert!(matches!(
            out.warnings[0],
            PropagationWarning::MissingInput {
                value_source: ValueSource::Inferred,
                ..
            }
        ));
        // 60 known + 50 inferred, 10 fee.
        assert!(close(out.taint_of(0), 60.0 / 110.0));
        assert_eq!(out.edges.len(), 1);
        assert_eq!(out.fee.base_units(), 10);
    }

    #[test]
    fn test_missing_input_uses_prevout_value() {
        let mut t = tx(&["gone"], &[(40, "1X")]);
        t.inputs[0].prevout = Some(PrevOutput {
            value: Amount::from_base_units(50),
            addresses: BTreeSet::new(),
        });
        let out = propagate(&t, &[None], &TaintConfig::default()).unwrap();
        assert!(matches!(
            out.warnings[0],
            PropagationWarning::MissingInput {
                value_source: ValueSource::Prevout,
                ..
            }
        ));
        assert_eq!(out.fee.base_units(), 10);
        assert!(out.edges.is_empty());
    }

    #[test]
    fn test_outputs_exceeding_inputs_is_violation() {
        let t = tx(&["a"], &[(11, "1X")]);
        let result = propagate(&t, &[Some(node("a", 10, 0.3, "1A"))], &TaintConfig::default());
        assert!(matches!(result, Err(TaintError::InvariantViolation { .. })));
    }

    #[test]
    fn test_declared_fee_mismatch_warns() {
        let mut t = tx(&["a"], &[(90, "1X")]);
        t.fee = Amount::from_base_units(5);
        let out = propagate(&t, &[Some(node("a", 100, 0.0, "1A"))], &TaintConfig::default()).unwrap();
        assert!(out
            .warnings
            .iter()
            .any(|w| matches!(w, PropagationWarning::FeeMismatch { .. })));
        assert_eq!(out.fee.base_units(), 10);
    }

    #[test]
    fn test_coinbase_starts_clean() {
        let mut t = tx(&[], &[(625, "1Miner")]);
        t.is_coinbase = true;
        let out = propagate(&t, &[], &TaintConfig::default()).unwrap();
        assert_eq!(out.taint_of(0), 0.0);
        assert!(out.edges.is_empty());
    }
}
