//! # Resilience
//!
//! Transient store faults under the retrying decorator, and heuristic
//! failures that must not halt a clustering run.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use cf_03_address_clustering::Heuristic;
    use forensics_runtime::{ForensicsConfig, ForensicsContainer, IngestError, IngestionEvent};
    use shared_graph_store::{InMemoryGraphStore, ResilientGraphStore};
    use shared_types::{Address, GraphStoreError};
    use std::sync::Arc;

    const COIN: u64 = SATS_PER_COIN;

    fn resilient(
        config: &ForensicsConfig,
    ) -> (
        ForensicsContainer<ResilientGraphStore<InMemoryGraphStore>>,
        Arc<InMemoryGraphStore>,
    ) {
        let inner = Arc::new(InMemoryGraphStore::new());
        let store = ResilientGraphStore::new(
            Arc::clone(&inner),
            config.store.retry_policy(),
            config.store.query_timeout(),
        );
        (ForensicsContainer::with_store(Arc::new(store), config), inner)
    }

    fn fast_retries() -> ForensicsConfig {
        let mut config = ForensicsConfig::default();
        config.store.initial_backoff_ms = 1;
        config.store.max_backoff_ms = 5;
        config
    }

    #[tokio::test]
    async fn test_transient_write_failures_are_retried() {
        let (forensics, inner) = resilient(&fast_retries());
        inner.inject_failures(2);

        let summary = ingest(&forensics, coinbase("cb", &[("1Miner", 50 * COIN)], None)).await;
        assert_eq!(summary.outputs_created, 1);
        assert_eq!(inner.utxo_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_the_transaction_only() {
        let (forensics, inner) = resilient(&fast_retries());
        ingest(&forensics, coinbase("before", &[("1Miner", COIN)], None)).await;

        inner.fail_writes(3);
        let err = forensics
            .ingestion()
            .save_bitcoin_transaction(&IngestionEvent::unconfirmed(coinbase(
                "lost",
                &[("1Miner", COIN)],
                None,
            )))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Store(GraphStoreError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(inner.utxo_count(), 1);

        ingest(&forensics, coinbase("after", &[("1Miner", COIN)], None)).await;
        assert_eq!(inner.utxo_count(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_address_is_reported_not_fatal() {
        let (forensics, inner) = resilient(&fast_retries());
        for (tag, b) in [("t1", "1B"), ("t2", "1C")] {
            let (fa, fb) = (format!("{tag}-a"), format!("{tag}-b"));
            ingest(&forensics, coinbase(&fa, &[("1A", COIN)], None)).await;
            ingest(&forensics, coinbase(&fb, &[(b, COIN)], None)).await;
            ingest(
                &forensics,
                spend(
                    tag,
                    &[(fa.as_str(), 0), (fb.as_str(), 0)],
                    &[("1Sink", 2 * COIN)],
                    None,
                ),
            )
            .await;
        }

        inner.fail_reads_for(Address::from("1C"));
        let report = forensics
            .cluster_addresses(&[Address::from("1A")], 2)
            .await
            .unwrap();

        assert!(report
            .failures
            .iter()
            .any(|f| f.address.as_str() == "1C" && f.heuristic == Heuristic::CoSpend));
        let cluster = report.cluster_of(&Address::from("1A")).expect("A clustered");
        assert_eq!(report.cluster_of(&Address::from("1B")), Some(cluster));
        assert_eq!(report.cluster_of(&Address::from("1C")), Some(cluster));
    }
}
