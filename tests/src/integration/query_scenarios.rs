//! # Query Scenarios
//!
//! Follow stolen funds through ingested transactions.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use cf_02_taint_propagation::TaintApi;
    use cf_04_graph_query::QueryApi;
    use forensics_runtime::{ForensicsConfig, ForensicsContainer};
    use shared_graph_store::InMemoryGraphStore;
    use shared_types::Address;

    const COIN: u64 = SATS_PER_COIN;

    /// hack:0 ─→ split:0 ─→ cashout:0
    ///        └→ split:1
    async fn laundering_graph(config: &ForensicsConfig) -> ForensicsContainer<InMemoryGraphStore> {
        let (forensics, _store) = forensics(config);
        ingest(&forensics, coinbase("hack", &[("1Victim", 10 * COIN)], None)).await;
        forensics
            .ingestion()
            .taint()
            .seed_utxo_taint(&utxo("hack", 0), 1.0)
            .await
            .unwrap();
        ingest(
            &forensics,
            spend(
                "split",
                &[("hack", 0)],
                &[("1MuleA", 6 * COIN), ("1MuleB", 399_000_000)],
                Some(1_700_000_000),
            ),
        )
        .await;
        ingest(
            &forensics,
            spend(
                "cashout",
                &[("split", 0)],
                &[("1Exchange", 599_000_000)],
                Some(1_700_003_600),
            ),
        )
        .await;
        forensics
    }

    #[tokio::test]
    async fn test_forward_trace_reaches_cashout() {
        let forensics = laundering_graph(&ForensicsConfig::default()).await;

        let trace = forensics
            .trace_utxo_flow(&utxo("hack", 0), 5)
            .await
            .unwrap();
        assert_eq!(trace.nodes.len(), 4);
        assert_eq!(trace.edges.len(), 3);
        assert_eq!(trace.hops, 2);
        assert!(!trace.truncated);

        let cashout = trace.node(&utxo("cashout", 0)).expect("cashout reached");
        assert_close(cashout.taint_score, 1.0);
    }

    #[tokio::test]
    async fn test_history_ends_in_unspent_outputs() {
        let forensics = laundering_graph(&ForensicsConfig::default()).await;

        let history = forensics
            .query()
            .get_utxo_history(&utxo("hack", 0))
            .await
            .unwrap()
            .expect("origin exists");
        let mut terminals: Vec<String> = history
            .terminals
            .iter()
            .map(|n| n.utxo_id.to_string())
            .collect();
        terminals.sort();
        assert_eq!(terminals.len(), 2);
        assert!(history.origin.spent);
        assert!(history.terminals.iter().all(|n| !n.spent));
    }

    #[tokio::test]
    async fn test_shortest_path_carries_proportion() {
        let forensics = laundering_graph(&ForensicsConfig::default()).await;

        let path = forensics
            .query()
            .find_flow_path(&utxo("hack", 0), &utxo("cashout", 0), 5)
            .await
            .unwrap()
            .expect("path exists");
        assert_eq!(path.hops(), 2);
        assert!((path.carried_proportion() - 0.599).abs() < 1e-6);

        let none = forensics
            .query()
            .find_flow_path(&utxo("cashout", 0), &utxo("hack", 0), 5)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_sources_and_address_roots() {
        let forensics = laundering_graph(&ForensicsConfig::default()).await;

        let sources = forensics
            .trace_utxo_sources(&utxo("cashout", 0), 5)
            .await
            .unwrap();
        assert_eq!(sources.nodes.len(), 3);
        assert!(sources.node(&utxo("hack", 0)).is_some());

        let by_address = forensics
            .query()
            .trace_address_flow(&Address::from("1Victim"), 5)
            .await
            .unwrap();
        assert_eq!(by_address.roots, vec![utxo("hack", 0)]);
        assert_eq!(by_address.nodes.len(), 4);
    }

    #[tokio::test]
    async fn test_node_cap_truncates_trace() {
        let mut config = ForensicsConfig::default();
        config.query.max_traversal_nodes = 2;
        let forensics = laundering_graph(&config).await;

        let trace = forensics
            .trace_utxo_flow(&utxo("hack", 0), 5)
            .await
            .unwrap();
        assert!(trace.truncated);
        assert_eq!(trace.nodes.len(), 2);
    }
}
