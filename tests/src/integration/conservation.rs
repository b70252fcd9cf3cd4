//! # Taint Conservation
//!
//! Random spends over randomly seeded outputs. For every transaction:
//!
//! ```text
//! Σ out.taint · out.value  ≈  Σ in.taint · in.value − fee_taint
//! ```
//!
//! and every stored score stays inside `[0, 1]`.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use cf_02_taint_propagation::TaintApi;
    use forensics_runtime::ForensicsConfig;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use shared_graph_store::GraphStore;
    use shared_types::UtxoId;

    const FUNDING_OUTPUTS: usize = 24;
    const SPENDS: usize = 60;

    #[tokio::test]
    async fn test_random_spends_conserve_taint() {
        let mut rng = StdRng::seed_from_u64(0x7a17);
        let mut config = ForensicsConfig::default();
        config.ingestion.detect_change = false;
        let (forensics, store) = forensics(&config);

        let mut unspent: Vec<(UtxoId, u64)> = Vec::new();
        for i in 0..FUNDING_OUTPUTS {
            let txid = format!("fund{i}");
            let value = rng.gen_range(10_000..5 * SATS_PER_COIN);
            let address = format!("1Owner{}", i % 7);
            ingest(&forensics, coinbase(&txid, &[(address.as_str(), value)], None)).await;
            forensics
                .ingestion()
                .taint()
                .seed_utxo_taint(&utxo(&txid, 0), rng.gen_range(0.0..=1.0))
                .await
                .unwrap();
            unspent.push((utxo(&txid, 0), value));
        }

        for n in 0..SPENDS {
            if unspent.is_empty() {
                break;
            }
            let input_count = rng.gen_range(1..=unspent.len().min(3));
            let inputs: Vec<(UtxoId, u64)> = (0..input_count)
                .map(|_| unspent.swap_remove(rng.gen_range(0..unspent.len())))
                .collect();
            let total_in: u64 = inputs.iter().map(|(_, v)| v).sum();

            let fee = rng.gen_range(0..=total_in / 100);
            let mut remaining = total_in - fee;
            let output_count = rng.gen_range(1..=3usize);
            let mut values = Vec::with_capacity(output_count);
            for k in 0..output_count {
                let still_to_fund = (output_count - k - 1) as u64;
                let value = if still_to_fund == 0 {
                    remaining
                } else {
                    rng.gen_range(1..=remaining - still_to_fund)
                };
                remaining -= value;
                values.push(value);
            }

            let txid = format!("spend{n}");
            let addresses: Vec<String> = (0..output_count)
                .map(|_| format!("1Owner{}", rng.gen_range(0..7)))
                .collect();
            let prev: Vec<String> = inputs.iter().map(|(id, _)| id.tx_id.to_string()).collect();
            let vin: Vec<(&str, u32)> = inputs
                .iter()
                .zip(&prev)
                .map(|((id, _), tx)| (tx.as_str(), id.output_index))
                .collect();
            let pays: Vec<(&str, u64)> = addresses
                .iter()
                .map(String::as_str)
                .zip(values.iter().copied())
                .collect();

            let ids: Vec<UtxoId> = inputs.iter().map(|(id, _)| id.clone()).collect();
            let tainted_in: f64 = store
                .get_utxos(&ids)
                .await
                .unwrap()
                .into_iter()
                .map(|node| node.expect("input stored").tainted_value())
                .sum();

            let summary = ingest(&forensics, spend(&txid, &vin, &pays, None)).await;

            let mut tainted_out = 0.0;
            for (k, value) in values.iter().enumerate() {
                let node = node(&*store, &txid, k as u32).await;
                assert!((0.0..=1.0).contains(&node.taint_score));
                tainted_out += node.tainted_value();
                unspent.push((node.utxo_id.clone(), *value));
            }

            let tolerance = 1e-6 * total_in as f64 + 1e-6;
            assert!(
                (tainted_out - (tainted_in - summary.fee_taint)).abs() <= tolerance,
                "{txid}: in {tainted_in}, out {tainted_out}, fee taint {}",
                summary.fee_taint
            );
        }
    }
}
