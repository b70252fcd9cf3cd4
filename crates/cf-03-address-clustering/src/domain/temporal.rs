//! Temporal correlation between two addresses' activity.

use shared_types::AddressActivity;

/// Number of `events` that have an event of `candidate` in a different
/// transaction within `window_secs`.
///
/// Events in the same transaction are not independent evidence and never
/// count.
pub fn sync_count(
    events: &[AddressActivity],
    candidate: &[AddressActivity],
    window_secs: u64,
) -> u64 {
    let mut sorted: Vec<&AddressActivity> = candidate.iter().collect();
    sorted.sort_by_key(|e| e.timestamp);

    let mut count = 0;
    for event in events {
        let low = event.timestamp.saturating_sub(window_secs);
        let high = event.timestamp.saturating_add(window_secs);
        let start = sorted.partition_point(|c| c.timestamp < low);
        let correlated = sorted[start..]
            .iter()
            .take_while(|c| c.timestamp <= high)
            .any(|c| c.tx_id != event.tx_id);
        if correlated {
            count += 1;
        }
    }
    count
}
