//! Equal-output coinjoin detection.

use shared_types::{Amount, FlowOutput};
use std::collections::HashMap;

/// Minimum number of identical output values for a coinjoin.
pub const MIN_EQUAL_OUTPUTS: usize = 3;

/// Minimum number of inputs for a coinjoin.
pub const MIN_COINJOIN_INPUTS: usize = 2;

/// Size of the largest group of non-zero outputs sharing one value.
pub fn equal_output_count(outputs: &[FlowOutput]) -> usize {
    let mut groups: HashMap<Amount, usize> = HashMap::new();
    for output in outputs.iter().filter(|o| !o.value.is_zero()) {
        *groups.entry(output.value).or_default() += 1;
    }
    groups.into_values().max().unwrap_or(0)
}

/// A transaction looks like a coinjoin when at least three outputs share a
/// value and every equal output could be paid by a distinct input.
pub fn detect_coinjoin(input_count: usize, outputs: &[FlowOutput]) -> bool {
    if input_count < MIN_COINJOIN_INPUTS {
        return false;
    }
    let equal = equal_output_count(outputs);
    equal >= MIN_EQUAL_OUTPUTS && input_count >= equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn outputs(values: &[u64]) -> Vec<FlowOutput> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| FlowOutput {
                output_index: i as u32,
                value: Amount::from_base_units(*v),
                addresses: BTreeSet::new(),
                is_change: false,
            })
            .collect()
    }

    #[test]
    fn test_equal_outputs_with_enough_inputs() {
        let outs = outputs(&[100, 100, 100, 37, 12]);
        assert_eq!(equal_output_count(&outs), 3);
        assert!(detect_coinjoin(3, &outs));
        assert!(detect_coinjoin(5, &outs));
    }

    #[test]
    fn test_too_few_inputs_for_equal_outputs() {
        let outs = outputs(&[100, 100, 100, 100]);
        assert!(!detect_coinjoin(3, &outs));
        assert!(!detect_coinjoin(1, &outputs(&[5, 5, 5])));
    }

    #[test]
    fn test_two_equal_outputs_is_not_enough() {
        assert!(!detect_coinjoin(4, &outputs(&[100, 100, 7])));
        assert!(!detect_coinjoin(4, &outputs(&[0, 0, 0])));
    }
}
