//! Value allocation matrix.
//!
//! Every model reduces to the same shape: `flows[i][j]` is the value of input
//! `i` that ends up in output `j`, `fee[i]` the value of input `i` consumed as
//! fee. Proportions, contributions and taints are all derived from it.
//!
//! For each input `i`: `Σ_j flows[i][j] + fee[i] = value(i)`.
//!
//! Flows are `f64` because they only feed ratios (proportions and taint
//! weights). Ledger values stay in exact `Amount` base units and are never
//! read back from this matrix.

/// Per-input, per-output value allocation in base units.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub flows: Vec<Vec<f64>>,
    pub fee: Vec<f64>,
}

/// A change output to fund ahead of payments, and the input that funds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFunding {
    pub output: usize,
    pub source_input: usize,
}

impl Allocation {
    fn zeroed(inputs: usize, outputs: usize) -> Self {
        Self {
            flows: vec![vec![0.0; outputs]; inputs],
            fee: vec![0.0; inputs],
        }
    }

    /// Every input is spread over outputs and fee in proportion to value.
    pub fn proportional(inputs: &[u64], outputs: &[u64]) -> Self {
        let mut allocation = Self::zeroed(inputs.len(), outputs.len());
        let total_in: u128 = inputs.iter().map(|&v| v as u128).sum();
        if total_in == 0 {
            return allocation;
        }
        let total_out: u128 = outputs.iter().map(|&v| v as u128).sum();
        let fee = total_in.saturating_sub(total_out) as f64;
        let total_in = total_in as f64;

        for (i, &value) in inputs.iter().enumerate() {
            let value = value as f64;
            for (j, &out) in outputs.iter().enumerate() {
                allocation.flows[i][j] = value * out as f64 / total_in;
            }
            allocation.fee[i] = value * fee / total_in;
        }
        allocation
    }

    /// Inputs are consumed into outputs in declaration order. Value left over
    /// after the last output is fee. Exact integer arithmetic.
    pub fn fifo(inputs: &[u64], outputs: &[u64]) -> Self {
        let mut allocation = Self::zeroed(inputs.len(), outputs.len());
        let mut out_pos = 0;
        let mut out_remaining = outputs.first().copied().unwrap_or(0);

        for (i, &value) in inputs.iter().enumerate() {
            let mut available = value;
            while available > 0 && out_pos < outputs.len() {
                let take = available.min(out_remaining);
                allocation.flows[i][out_pos] += take as f64;
                available -= take;
                out_remaining -= take;
                if out_remaining == 0 {
                    out_pos += 1;
                    out_remaining = outputs.get(out_pos).copied().unwrap_or(0);
                }
            }
            allocation.fee[i] = available as f64;
        }
        allocation
    }

    /// Fund each change output from its source input first (remainder pro
    /// rata from the others), then spread what is left over the payment
    /// outputs and the fee.
    pub fn with_change_excluded(inputs: &[u64], outputs: &[u64], change: &[ChangeFunding]) -> Self {
        let mut allocation = Self::zeroed(inputs.len(), outputs.len());
        let mut capacity: Vec<f64> = inputs.iter().map(|&v| v as f64).collect();

        for funding in change {
            let (c, source) = (funding.output, funding.source_input);
            if c >= outputs.len() || source >= inputs.len() {
                continue;
            }
            let need = outputs[c] as f64;
            let from_source = need.min(capacity[source]);
            allocation.flows[source][c] += from_source;
            capacity[source] -= from_source;

            let rest = need - from_source;
            let others: f64 = capacity
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != source)
                .map(|(_, cap)| cap)
                .sum();
            if rest > 0.0 && others > 0.0 {
                let rest = rest.min(others);
                for i in (0..inputs.len()).filter(|&i| i != source) {
                    let share = rest * capacity[i] / others;
                    allocation.flows[i][c] += share;
                    capacity[i] -= share;
                }
            }
        }

        let is_change = |j: usize| change.iter().any(|f| f.output == j);
        let pool: f64 = capacity.iter().sum();
        if pool <= 0.0 {
            return allocation;
        }
        let payments: f64 = outputs
            .iter()
            .enumerate()
            .filter(|(j, _)| !is_change(*j))
            .map(|(_, &v)| v as f64)
            .sum();
        let fee = (pool - payments).max(0.0);

        for (i, cap) in capacity.iter().enumerate() {
            for (j, &out) in outputs.iter().enumerate() {
                if !is_change(j) {
                    allocation.flows[i][j] = cap * out as f64 / pool;
                }
            }
            allocation.fee[i] = cap * fee / pool;
        }
        allocation
    }

    /// Move every input's fee share into the outputs, pro rata to output value.
    pub fn fold_fee_into_outputs(&mut self, outputs: &[u64]) {
        let total_out: f64 = outputs.iter().map(|&v| v as f64).sum();
        if total_out <= 0.0 {
            return;
        }
        for (row, fee) in self.flows.iter_mut().zip(self.fee.iter_mut()) {
            for (flow, &out) in row.iter_mut().zip(outputs) {
                *flow += *fee * out as f64 / total_out;
            }
            *fee = 0.0;
        }
    }

    /// Total value flowing into output `j`.
    pub fn inflow(&self, j: usize) -> f64 {
        self.flows.iter().map(|row| row[j]).sum()
    }
}
