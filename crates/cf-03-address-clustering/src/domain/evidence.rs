//! Clustering evidence recorded while a transaction is ingested.

use shared_graph_store::GraphMutation;
use shared_types::{ActivityRole, Address, AddressActivity, FlowTransaction, TransactionRecord};
use std::collections::BTreeSet;

/// Store mutations carrying one transaction's clustering evidence.
#[derive(Debug, Clone, Default)]
pub struct TransactionEvidence {
    pub mutations: Vec<GraphMutation>,
    /// Distinct co-spend address pairs recorded.
    pub co_spend_pairs: usize,
    /// Input → change address links recorded.
    pub change_links: usize,
}

/// Evidence for `tx` given the owners of its inputs.
///
/// Coinjoin transactions contribute a transaction record and activity rows
/// but no co-spend or change evidence.
pub fn transaction_evidence(
    tx: &FlowTransaction,
    input_addresses: &BTreeSet<Address>,
) -> TransactionEvidence {
    let mut evidence = TransactionEvidence::default();

    if let Some(timestamp) = tx.timestamp {
        let rows = input_addresses
            .iter()
            .map(|a| (a.clone(), ActivityRole::Input))
            .chain(
                tx.output_addresses()
                    .into_iter()
                    .map(|a| (a, ActivityRole::Output)),
            );
        for (address, role) in rows {
            evidence
                .mutations
                .push(GraphMutation::RecordActivity(AddressActivity {
                    address,
                    tx_id: tx.tx_id.clone(),
                    timestamp,
                    role,
                }));
        }
    }

    if !tx.is_coinbase && !tx.is_coinjoin {
        let ordered: Vec<&Address> = input_addresses.iter().collect();
        for (i, a) in ordered.iter().enumerate() {
            for b in &ordered[i + 1..] {
                evidence.mutations.push(GraphMutation::co_spend(
                    (*a).clone(),
                    (*b).clone(),
                    tx.tx_id.clone(),
                ));
                evidence.co_spend_pairs += 1;
            }
        }

        for change in tx.outputs.iter().filter(|o| o.is_change) {
            for input_address in input_addresses {
                for change_address in change.addresses.iter().filter(|c| *c != input_address) {
                    evidence.mutations.push(GraphMutation::change_link(
                        input_address.clone(),
                        change_address.clone(),
                        tx.tx_id.clone(),
                    ));
                    evidence.change_links += 1;
                }
            }
        }
    }

    evidence
        .mutations
        .push(GraphMutation::RecordTransaction(TransactionRecord {
            transaction: tx.clone(),
            input_addresses: input_addresses.clone(),
        }));
    evidence
}
