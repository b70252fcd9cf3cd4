//! Timeout and retry decorator for any [`GraphStore`].

use crate::ports::{GraphMutation, GraphStore};
use crate::{DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_RETRY_ATTEMPTS};
use async_trait::async_trait;
use shared_types::{
    Address, AddressActivity, ChangeLink, ClusterId, CoSpendEdge, GraphStoreError, SpendEdge,
    StoreResult, TransactionRecord, TxId, UtxoId, UtxoNode,
};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff schedule for transient failures.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.saturating_sub(1) as i32);
        if self.initial_backoff.as_secs_f64() * factor >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        self.initial_backoff.mul_f64(factor)
    }
}

/// Wraps a store with a per-call timeout and bounded retries.
///
/// `Unavailable` and `Timeout` are retried; every other error is returned
/// immediately. When all attempts fail the caller gets `RetriesExhausted`.
pub struct ResilientGraphStore<S: GraphStore> {
    inner: Arc<S>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl<S: GraphStore> ResilientGraphStore<S> {
    pub fn new(inner: Arc<S>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            inner,
            policy,
            timeout,
        }
    }

    /// Decorator with the default policy and a 30 s timeout.
    pub fn with_defaults(inner: Arc<S>) -> Self {
        Self::new(
            inner,
            RetryPolicy::default(),
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        )
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, f: F) -> StoreResult<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = StoreResult<T>> + Send,
        T: Send,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let result = match tokio::time::timeout(self.timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(GraphStoreError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if attempt < attempts {
                        let backoff = self.policy.backoff_for(attempt);
                        warn!(
                            operation,
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %err,
                            "Transient graph store failure, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(GraphStoreError::RetriesExhausted {
            operation: operation.to_string(),
            attempts,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl<S: GraphStore> GraphStore for ResilientGraphStore<S> {
    async fn write_batch(&self, mutations: Vec<GraphMutation>) -> StoreResult<()> {
        self.call("write_batch", || self.inner.write_batch(mutations.clone()))
            .await
    }

    async fn get_utxos(&self, ids: &[UtxoId]) -> StoreResult<Vec<Option<UtxoNode>>> {
        self.call("get_utxos", || self.inner.get_utxos(ids)).await
    }

    async fn outgoing_spends(&self, id: &UtxoId) -> StoreResult<Vec<SpendEdge>> {
        self.call("outgoing_spends", || self.inner.outgoing_spends(id))
            .await
    }

    async fn incoming_spends(&self, id: &UtxoId) -> StoreResult<Vec<SpendEdge>> {
        self.call("incoming_spends", || self.inner.incoming_spends(id))
            .await
    }

    async fn address_utxos(
        &self,
        address: &Address,
        spent: Option<bool>,
    ) -> StoreResult<Vec<UtxoNode>> {
        self.call("address_utxos", || self.inner.address_utxos(address, spent))
            .await
    }

    async fn co_spend_neighbors(&self, address: &Address) -> StoreResult<Vec<CoSpendEdge>> {
        self.call("co_spend_neighbors", || {
            self.inner.co_spend_neighbors(address)
        })
        .await
    }

    async fn change_links(&self, address: &Address) -> StoreResult<Vec<ChangeLink>> {
        self.call("change_links", || self.inner.change_links(address))
            .await
    }

    async fn address_activity(&self, address: &Address) -> StoreResult<Vec<AddressActivity>> {
        self.call("address_activity", || self.inner.address_activity(address))
            .await
    }

    async fn address_counterparties(&self, address: &Address) -> StoreResult<BTreeSet<Address>> {
        self.call("address_counterparties", || {
            self.inner.address_counterparties(address)
        })
        .await
    }

    async fn spending_transactions(
        &self,
        address: &Address,
    ) -> StoreResult<Vec<TransactionRecord>> {
        self.call("spending_transactions", || {
            self.inner.spending_transactions(address)
        })
        .await
    }

    async fn get_transaction(&self, tx_id: &TxId) -> StoreResult<Option<TransactionRecord>> {
        self.call("get_transaction", || self.inner.get_transaction(tx_id))
            .await
    }

    async fn cluster_of(&self, address: &Address) -> StoreResult<Option<ClusterId>> {
        self.call("cluster_of", || self.inner.cluster_of(address))
            .await
    }

    async fn cluster_members(&self, cluster_id: &ClusterId) -> StoreResult<BTreeSet<Address>> {
        self.call("cluster_members", || self.inner.cluster_members(cluster_id))
            .await
    }
}
