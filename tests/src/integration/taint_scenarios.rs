//! # Taint Scenarios
//!
//! Raw transactions through the full ingestion pipeline, then taint scores
//! read back from the graph store.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use cf_02_taint_propagation::{FeeTaintPolicy, TaintApi, TaintModel};
    use forensics_runtime::ForensicsConfig;

    const COIN: u64 = SATS_PER_COIN;

    // =========================================================================
    // PROPORTIONAL MODEL
    // =========================================================================

    #[tokio::test]
    async fn test_single_input_split_keeps_full_taint() {
        let mut config = ForensicsConfig::default();
        config.ingestion.detect_change = false;
        let (forensics, store) = forensics(&config);

        ingest(&forensics, coinbase("fund", &[("1Alice", 10 * COIN)], None)).await;
        forensics
            .ingestion()
            .taint()
            .seed_utxo_taint(&utxo("fund", 0), 1.0)
            .await
            .unwrap();

        let summary = ingest(
            &forensics,
            spend(
                "split",
                &[("fund", 0)],
                &[("1Bob", 6 * COIN), ("1Carol", 4 * COIN)],
                None,
            ),
        )
        .await;
        assert_eq!(summary.inputs_processed, 1);
        assert_eq!(summary.outputs_created, 2);
        assert_eq!(summary.change_output, None);

        assert_close(node(&*store, "split", 0).await.taint_score, 1.0);
        assert_close(node(&*store, "split", 1).await.taint_score, 1.0);
    }

    #[tokio::test]
    async fn test_two_inputs_mix_by_value() {
        let (forensics, store) = forensics(&ForensicsConfig::default());

        ingest(&forensics, coinbase("dirty", &[("1Alice", 6 * COIN)], None)).await;
        ingest(&forensics, coinbase("clean", &[("1Bob", 4 * COIN)], None)).await;
        forensics
            .ingestion()
            .taint()
            .seed_utxo_taint(&utxo("dirty", 0), 1.0)
            .await
            .unwrap();

        let summary = ingest(
            &forensics,
            spend(
                "mix",
                &[("dirty", 0), ("clean", 0)],
                &[("1Carol", 10 * COIN)],
                None,
            ),
        )
        .await;
        assert_eq!(summary.co_spend_edges, 1);
        assert_close(summary.fee_taint, 0.0);
        assert_close(node(&*store, "mix", 0).await.taint_score, 0.6);
    }

    #[tokio::test]
    async fn test_change_exclusion_with_single_input() {
        let mut config = ForensicsConfig::default();
        config.taint.exclude_change_from_distribution = true;
        let (forensics, store) = forensics(&config);

        ingest(&forensics, coinbase("fund", &[("1Alice", 10 * COIN)], None)).await;
        forensics
            .ingestion()
            .taint()
            .seed_utxo_taint(&utxo("fund", 0), 0.8)
            .await
            .unwrap();

        let summary = ingest(
            &forensics,
            spend(
                "pay",
                &[("fund", 0)],
                &[("1Shop", 3 * COIN), ("1Alice", 7 * COIN)],
                None,
            ),
        )
        .await;
        assert_eq!(summary.change_output, Some(1));

        let payment = node(&*store, "pay", 0).await;
        let change = node(&*store, "pay", 1).await;
        assert!(change.is_change);
        assert!(!payment.is_change);
        assert_close(change.taint_score, 0.8);
        assert_close(payment.taint_score, 0.8);
    }

    #[tokio::test]
    async fn test_coinbase_outputs_start_clean() {
        let (forensics, store) = forensics(&ForensicsConfig::default());
        let summary = ingest(&forensics, coinbase("cb", &[("1Miner", 50 * COIN)], None)).await;
        assert_eq!(summary.inputs_processed, 0);
        assert_close(node(&*store, "cb", 0).await.taint_score, 0.0);
    }

    // =========================================================================
    // HAIRCUT MODEL
    // =========================================================================

    #[tokio::test]
    async fn test_haircut_decays_per_hop() {
        let mut config = ForensicsConfig::default();
        config.taint.model = TaintModel::Haircut { factor: 0.9 };
        let (forensics, store) = forensics(&config);

        ingest(&forensics, coinbase("fund", &[("1Alice", 10 * COIN)], None)).await;
        forensics
            .ingestion()
            .taint()
            .seed_utxo_taint(&utxo("fund", 0), 1.0)
            .await
            .unwrap();

        ingest(
            &forensics,
            spend("hop1", &[("fund", 0)], &[("1Bob", 10 * COIN)], None),
        )
        .await;
        assert_close(node(&*store, "hop1", 0).await.taint_score, 0.9);

        ingest(
            &forensics,
            spend("hop2", &[("hop1", 0)], &[("1Carol", 10 * COIN)], None),
        )
        .await;
        assert_close(node(&*store, "hop2", 0).await.taint_score, 0.81);
    }

    // =========================================================================
    // FEES AND SEEDING
    // =========================================================================

    #[tokio::test]
    async fn test_fee_taint_tracked_separately() {
        let (forensics, store) = forensics(&ForensicsConfig::default());

        ingest(&forensics, coinbase("fund", &[("1Alice", 10 * COIN)], None)).await;
        forensics
            .ingestion()
            .taint()
            .seed_utxo_taint(&utxo("fund", 0), 1.0)
            .await
            .unwrap();

        let summary = ingest(
            &forensics,
            spend("fee", &[("fund", 0)], &[("1Bob", 9 * COIN)], None),
        )
        .await;
        assert!((summary.fee_taint - COIN as f64).abs() < 1e-3);
        assert_close(node(&*store, "fee", 0).await.taint_score, 1.0);
    }

    #[tokio::test]
    async fn test_fold_policy_reports_no_fee_taint() {
        let mut config = ForensicsConfig::default();
        config.taint.fee_policy = FeeTaintPolicy::FoldIntoOutputs;
        let (forensics, _store) = forensics(&config);

        ingest(&forensics, coinbase("fund", &[("1Alice", 10 * COIN)], None)).await;
        forensics
            .ingestion()
            .taint()
            .seed_utxo_taint(&utxo("fund", 0), 1.0)
            .await
            .unwrap();

        let summary = ingest(
            &forensics,
            spend("fee", &[("fund", 0)], &[("1Bob", 9 * COIN)], None),
        )
        .await;
        assert_close(summary.fee_taint, 0.0);
    }

    #[tokio::test]
    async fn test_address_seed_reaches_later_spends() {
        let (forensics, store) = forensics(&ForensicsConfig::default());

        ingest(
            &forensics,
            coinbase("fund", &[("1Thief", 5 * COIN), ("1Thief", 5 * COIN)], None),
        )
        .await;
        let seeded = forensics
            .ingestion()
            .taint()
            .seed_address_taint(&"1Thief".into(), 1.0)
            .await
            .unwrap();
        assert_eq!(seeded, 2);

        ingest(
            &forensics,
            spend(
                "launder",
                &[("fund", 0), ("fund", 1)],
                &[("1Mule", 10 * COIN)],
                None,
            ),
        )
        .await;
        assert_close(node(&*store, "launder", 0).await.taint_score, 1.0);
    }
}
