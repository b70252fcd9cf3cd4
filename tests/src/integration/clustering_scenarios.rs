//! # Clustering Scenarios
//!
//! Co-spend, change and coinjoin evidence produced by ingestion, then
//! clustered through the container.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use cf_03_address_clustering::{ClusterEvidence, ClusteringApi, PeelEntityType};
    use forensics_runtime::ForensicsConfig;
    use shared_graph_store::GraphStore;
    use shared_types::Address;

    const COIN: u64 = SATS_PER_COIN;
    /// Spends sit this far apart so no two of them correlate in time.
    const SPACING: u64 = 3_600;

    /// Fund `a` and `b` with fresh coinbases and spend both together.
    async fn co_spend<S: GraphStore>(
        forensics: &forensics_runtime::ForensicsContainer<S>,
        tag: &str,
        a: &str,
        b: &str,
        time: u64,
    ) {
        let (fund_a, fund_b) = (format!("{tag}-a"), format!("{tag}-b"));
        ingest(forensics, coinbase(&fund_a, &[(a, COIN)], None)).await;
        ingest(forensics, coinbase(&fund_b, &[(b, COIN)], None)).await;
        ingest(
            forensics,
            spend(
                tag,
                &[(fund_a.as_str(), 0), (fund_b.as_str(), 0)],
                &[("1Sink", 2 * COIN)],
                Some(time),
            ),
        )
        .await;
    }

    #[tokio::test]
    async fn test_mixer_pairs_are_not_merged() {
        let (forensics, store) = forensics(&ForensicsConfig::default());
        let (x, y, z) = (Address::from("1X"), Address::from("1Y"), Address::from("1Z"));

        let mut time = 1_700_000_000;
        for i in 0..5 {
            co_spend(&forensics, &format!("xy{i}"), "1X", "1Y", time).await;
            time += SPACING;
        }
        for i in 0..80 {
            co_spend(&forensics, &format!("xz{i}"), "1X", "1Z", time).await;
            time += SPACING;
        }

        let report = forensics
            .cluster_addresses(std::slice::from_ref(&x), 2)
            .await
            .unwrap();

        let cluster = report.cluster_of(&x).expect("X should be clustered");
        assert_eq!(report.cluster_of(&y), Some(cluster));
        assert_eq!(report.cluster_of(&z), None);
        assert!(report.evidence.iter().any(|e| matches!(
            e,
            ClusterEvidence::CoSpend { neighbor, tx_count: 80, merged: false, .. } if *neighbor == z
        )));

        assert!(store.cluster_of(&z).await.unwrap().is_none());
        assert_eq!(
            store.cluster_of(&y).await.unwrap(),
            store.cluster_of(&x).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_clustering_twice_is_stable() {
        let (forensics, _store) = forensics(&ForensicsConfig::default());
        co_spend(&forensics, "t1", "1A", "1B", 1_700_000_000).await;
        co_spend(&forensics, "t2", "1B", "1C", 1_700_010_000).await;

        let seeds = [Address::from("1A")];
        let first = forensics.cluster_addresses(&seeds, 3).await.unwrap();
        let second = forensics.cluster_addresses(&seeds, 3).await.unwrap();

        assert_eq!(first.clusters, second.clusters);
        assert_eq!(first.clusters.len(), 1);
        assert_eq!(first.clusters.values().next().map(|m| m.len()), Some(3));
    }

    #[tokio::test]
    async fn test_repeated_change_merges_owner() {
        let (forensics, store) = forensics(&ForensicsConfig::default());
        let alice = Address::from("1Alice");

        // Non-round change on the input's script kind, round payment to a
        // segwit address: both supporting signals point at the change.
        for (i, time) in [(0, 1_700_000_000u64), (1, 1_700_100_000)] {
            let fund = format!("fund{i}");
            ingest(&forensics, coinbase(&fund, &[("1Alice", 10 * COIN)], None)).await;
            let summary = ingest(
                &forensics,
                spend(
                    &format!("pay{i}"),
                    &[(fund.as_str(), 0)],
                    &[("bc1qshop", 3 * COIN), ("1AliceChange", 698_765_432)],
                    Some(time),
                ),
            )
            .await;
            assert_eq!(summary.change_output, Some(1));
        }

        let links = store.change_links(&alice).await.unwrap();
        let to_change = links
            .iter()
            .find(|l| l.change_address.as_str() == "1AliceChange")
            .expect("change link recorded");
        assert_eq!(to_change.change_count, 2);

        let report = forensics
            .cluster_addresses(std::slice::from_ref(&alice), 1)
            .await
            .unwrap();
        assert_eq!(
            report.cluster_of(&alice),
            report.cluster_of(&Address::from("1AliceChange"))
        );
        assert!(report.cluster_of(&alice).is_some());
    }

    #[tokio::test]
    async fn test_coinjoin_inputs_stay_apart() {
        let (forensics, _store) = forensics(&ForensicsConfig::default());
        let participants = ["1P0", "1P1", "1P2", "1P3"];
        for (i, p) in participants.iter().enumerate() {
            ingest(&forensics, coinbase(&format!("f{i}"), &[(*p, 2 * COIN)], None)).await;
        }
        let inputs: Vec<(String, u32)> = (0..4).map(|i| (format!("f{i}"), 0)).collect();
        let inputs: Vec<(&str, u32)> = inputs.iter().map(|(t, v)| (t.as_str(), *v)).collect();
        let summary = ingest(
            &forensics,
            spend(
                "mix",
                &inputs,
                &[
                    ("1Q0", COIN),
                    ("1Q1", COIN),
                    ("1Q2", COIN),
                    ("1Q3", COIN),
                    ("1R0", 99_000_000),
                ],
                Some(1_700_000_000),
            ),
        )
        .await;
        assert!(summary.is_coinjoin);
        assert_eq!(summary.co_spend_edges, 0);

        let report = forensics
            .cluster_addresses(&[Address::from("1P0")], 2)
            .await
            .unwrap();
        assert!(report.clusters.is_empty());
    }

    #[tokio::test]
    async fn test_peeling_chain_after_ingestion() {
        let (forensics, _store) = forensics(&ForensicsConfig::default());
        ingest(&forensics, coinbase("peel0", &[("1Hot0", 100 * COIN)], None)).await;

        let mut value = 100 * COIN;
        for hop in 1..=12u64 {
            let prev = format!("peel{}", hop - 1);
            let (payee, next) = (format!("bc1qpayee{hop}"), format!("1Hot{hop}"));
            let change = value - COIN - 1_000;
            ingest(
                &forensics,
                spend(
                    &format!("peel{hop}"),
                    &[(prev.as_str(), if hop == 1 { 0 } else { 1 })],
                    &[(payee.as_str(), COIN), (next.as_str(), change)],
                    Some(1_700_000_000 + hop * SPACING),
                ),
            )
            .await;
            value = change;
        }

        let report = forensics
            .clustering()
            .detect_peeling_chain(&Address::from("1Hot0"))
            .await
            .unwrap();
        assert!(report.is_peeling_chain);
        assert_eq!(report.peel_count, 12);
        assert_eq!(report.visited.len(), 13);
        assert_eq!(report.likely_entity_type, PeelEntityType::ExchangeHotWallet);
    }
}
