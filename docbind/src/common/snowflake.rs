use crate::common::get_current_time_or_zero;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::Rng;

const NODE_ID_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_NODE_ID: u64 = (1 << NODE_ID_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_LEFT_SHIFT: u64 = SEQUENCE_BITS + NODE_ID_BITS;
// 2022-01-01T00:00:00Z
const EPOCH: u64 = 1_640_995_200_000;

struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
    /// Milliseconds `last_timestamp` runs ahead of the clock after sequence rollovers.
    borrowed: u64,
}

impl GeneratorState {
    /// How far the clock went backwards, not counting borrowed milliseconds.
    fn clock_drift(&self, now: u64) -> Option<u64> {
        let behind = self.last_timestamp.saturating_sub(now);
        (behind > self.borrowed).then_some(behind)
    }
}

/// Snowflake-style generator behind every [ObjectId](crate::ObjectId).
///
/// Layout: 42 bits of milliseconds since `EPOCH`, 10 bits of node id, 12 bits
/// of per-millisecond sequence. Ids from one generator are strictly increasing.
pub(crate) struct ObjectIdGenerator {
    node_id: u64,
    state: Mutex<GeneratorState>,
}

impl ObjectIdGenerator {
    pub(crate) fn new() -> Self {
        let node_id = Self::random_node_id();
        log::debug!("Object id generator initialized with node id {}", node_id);
        ObjectIdGenerator {
            node_id,
            state: Mutex::new(GeneratorState {
                last_timestamp: 0,
                sequence: 0,
                borrowed: 0,
            }),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        let mut state = self.state.lock();
        let mut timestamp = (get_current_time_or_zero() as u64).max(EPOCH);

        if let Some(drift) = state.clock_drift(timestamp) {
            log::warn!("Clock moved backwards by {}ms, reusing last timestamp", drift);
        }
        if timestamp < state.last_timestamp {
            timestamp = state.last_timestamp;
        } else {
            state.borrowed = 0;
        }

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // sequence exhausted for this millisecond, borrow the next one
                timestamp += 1;
                state.borrowed += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = timestamp;

        ((timestamp - EPOCH) << TIMESTAMP_LEFT_SHIFT)
            | (self.node_id << SEQUENCE_BITS)
            | state.sequence
    }

    fn random_node_id() -> u64 {
        let uuid = uuid::Uuid::new_v4();
        let bytes = uuid.as_bytes();
        let seed = u64::from(bytes[bytes.len() - 1]) << 2 | OsRng.gen_range(0..4u64);
        seed & MAX_NODE_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_unique_increasing_ids() {
        let generator = ObjectIdGenerator::new();
        let ids: Vec<u64> = (0..10_000).map(|_| generator.next_id()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn embeds_node_id() {
        let generator = ObjectIdGenerator::new();
        let id = generator.next_id();
        assert_eq!((id >> SEQUENCE_BITS) & MAX_NODE_ID, generator.node_id);
    }

    #[test]
    fn borrowed_milliseconds_are_not_clock_drift() {
        let now = get_current_time_or_zero() as u64;
        let mut state = GeneratorState {
            last_timestamp: now + 1,
            sequence: 0,
            borrowed: 1,
        };
        assert_eq!(state.clock_drift(now), None);
        assert_eq!(state.clock_drift(now + 1), None);

        state.last_timestamp = now + 3;
        assert_eq!(state.clock_drift(now), Some(3));
    }

    #[test]
    fn sequence_rollover_borrows_next_millisecond() {
        let generator = ObjectIdGenerator::new();
        let future = get_current_time_or_zero() as u64 + 1_000;
        {
            let mut state = generator.state.lock();
            state.last_timestamp = future;
            state.sequence = SEQUENCE_MASK;
        }
        let id = generator.next_id();
        assert_eq!(id >> TIMESTAMP_LEFT_SHIFT, future + 1 - EPOCH);
        assert_eq!(generator.state.lock().borrowed, 1);
    }

    #[test]
    fn survives_clock_going_backwards() {
        let generator = ObjectIdGenerator::new();
        let future = get_current_time_or_zero() as u64 + 1_000;
        generator.state.lock().last_timestamp = future;
        let id = generator.next_id();
        assert_eq!(id >> TIMESTAMP_LEFT_SHIFT, future - EPOCH);
    }
}
