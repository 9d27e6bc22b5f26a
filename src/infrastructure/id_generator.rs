// ID Generator - Snowflake-like IDs for posts, timeline items, comments and notifications
// 64-bit ID format: [timestamp:41][node_id:10][sequence:12]
// IDs generated by one node are strictly increasing, which keeps the
// (created_at, id) keyset order aligned with insertion order.

use std::sync::Mutex;

use crate::core::strong_types::current_time_millis;

/// Custom epoch (2024-01-01T00:00:00Z) so the 41 timestamp bits last ~69 years
const EPOCH_MILLIS: u64 = 1_704_067_200_000;
const NODE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

/// Thread-safe snowflake generator; one instance per process
#[derive(Debug)]
pub struct IdGenerator {
    node_id: u16,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    /// Create a generator for the given node. Node ids above 1023 are masked.
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id: node_id & MAX_NODE_ID,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    /// Generate the next unique ID
    pub fn next_id(&self) -> i64 {
        loop {
            let now = (current_time_millis() as u64).saturating_sub(EPOCH_MILLIS);
            {
                let mut state = match self.state.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };

                // Clock went backwards: keep issuing from the last timestamp.
                let timestamp = now.max(state.last_timestamp);

                if timestamp == state.last_timestamp {
                    if state.sequence < MAX_SEQUENCE {
                        state.sequence += 1;
                        return compose(timestamp, self.node_id, state.sequence);
                    }
                } else {
                    state.last_timestamp = timestamp;
                    state.sequence = 0;
                    return compose(timestamp, self.node_id, 0);
                }
            }
            // Sequence exhausted for this millisecond: spin until the clock
            // moves on, at most 1ms, without parking the runtime thread.
            std::hint::spin_loop();
        }
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// Extract node ID from a generated ID
    pub fn extract_node_id(id: i64) -> u16 {
        (((id as u64) >> SEQUENCE_BITS) & MAX_NODE_ID as u64) as u16
    }

    /// Extract the Unix millisecond timestamp from a generated ID
    pub fn extract_timestamp(id: i64) -> u64 {
        ((id as u64) >> (NODE_BITS + SEQUENCE_BITS)) + EPOCH_MILLIS
    }
}

fn compose(timestamp: u64, node_id: u16, sequence: u64) -> i64 {
    ((timestamp << (NODE_BITS + SEQUENCE_BITS)) | ((node_id as u64) << SEQUENCE_BITS) | sequence)
        as i64
}
