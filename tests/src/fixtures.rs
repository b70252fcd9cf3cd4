//! Raw transaction builders and service setup shared by the scenarios.

use cf_01_transaction_normalizer::{
    RawAmount, RawBlock, RawInput, RawOutput, RawScriptPubKey, RawTransaction,
};
use forensics_runtime::{ForensicsConfig, ForensicsContainer, IngestionEvent, SaveSummary};
use shared_graph_store::{GraphStore, InMemoryGraphStore};
use shared_types::{TxId, UtxoId, UtxoNode};
use std::sync::Arc;

pub const SATS_PER_COIN: u64 = 100_000_000;

/// Container over a bare in-memory store the test can inspect.
pub fn forensics(config: &ForensicsConfig) -> (ForensicsContainer<InMemoryGraphStore>, Arc<InMemoryGraphStore>) {
    let store = Arc::new(InMemoryGraphStore::new());
    (ForensicsContainer::with_store(Arc::clone(&store), config), store)
}

/// Coin-denominated decimal text for a base-unit amount.
pub fn coins(sats: u64) -> RawAmount {
    RawAmount::Text(format!("{}.{:08}", sats / SATS_PER_COIN, sats % SATS_PER_COIN))
}

pub fn output(n: u32, address: &str, sats: u64) -> RawOutput {
    RawOutput {
        n,
        value: coins(sats),
        script_pub_key: RawScriptPubKey {
            addresses: Vec::new(),
            address: Some(address.to_string()),
        },
    }
}

fn outputs(pays: &[(&str, u64)]) -> Vec<RawOutput> {
    pays.iter()
        .enumerate()
        .map(|(n, (address, sats))| output(n as u32, address, *sats))
        .collect()
}

/// Coinbase paying `pays`, in order.
pub fn coinbase(txid: &str, pays: &[(&str, u64)], time: Option<u64>) -> RawTransaction {
    RawTransaction {
        txid: txid.to_string(),
        vin: vec![RawInput::Coinbase {
            coinbase: format!("03{txid}"),
        }],
        vout: outputs(pays),
        fee: None,
        time,
        blocktime: None,
    }
}

/// Spend of `inputs` (`(txid, vout)`) paying `pays`.
pub fn spend(
    txid: &str,
    inputs: &[(&str, u32)],
    pays: &[(&str, u64)],
    time: Option<u64>,
) -> RawTransaction {
    RawTransaction {
        txid: txid.to_string(),
        vin: inputs
            .iter()
            .map(|(prev, vout)| RawInput::Spend {
                txid: prev.to_string(),
                vout: *vout,
                prevout: None,
            })
            .collect(),
        vout: outputs(pays),
        fee: None,
        time,
        blocktime: None,
    }
}

pub fn block(height: u64, time: u64) -> RawBlock {
    RawBlock {
        height,
        hash: format!("{height:064x}"),
        time,
    }
}

pub fn utxo(txid: &str, index: u32) -> UtxoId {
    UtxoId::new(TxId::from(txid), index)
}

/// Ingest one unconfirmed transaction, failing the test on error.
pub async fn ingest<S: GraphStore>(container: &ForensicsContainer<S>, tx: RawTransaction) -> SaveSummary {
    let txid = tx.txid.clone();
    match container
        .ingestion()
        .save_bitcoin_transaction(&IngestionEvent::unconfirmed(tx))
        .await
    {
        Ok(summary) => summary,
        Err(err) => panic!("ingesting {txid} failed: {err}"),
    }
}

/// Stored node for `(txid, index)`, failing the test if absent.
pub async fn node<S: GraphStore>(store: &S, txid: &str, index: u32) -> UtxoNode {
    match store.get_utxo(&utxo(txid, index)).await {
        Ok(Some(node)) => node,
        other => panic!("utxo {txid}:{index} not readable: {other:?}"),
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
