//! The persistent key-value substrate the reflection codec and DApp
//! executor read and write instance records through. Grounded on the
//! teacher's `storage::Storage` (a `RefCell<BTreeMap<String, Vec<u8>>>`
//! with domain-keyed `get`/`set`), generalized from `String` domain keys
//! to `u64` instance ids plus one reserved environment slot, and made
//! flush-atomic (spec §5: "a failed transaction must not affect store
//! contents" — the teacher's storage never needed this boundary because
//! its tests write straight through).

use avm_types::EnvironmentState;
use std::collections::BTreeMap;
use std::fmt;

/// Reserved id for the environment record, distinct from
/// `InstanceId::EPHEMERAL` (`u64::MAX`) so the two reserved values never
/// collide.
pub const ENVIRONMENT_SLOT: u64 = u64::MAX - 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    EnvironmentSlotMissing,
    MalformedEnvironmentSlot,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::EnvironmentSlotMissing => write!(f, "environment slot has never been written"),
            StoreError::MalformedEnvironmentSlot => write!(f, "environment slot does not hold 12 bytes"),
        }
    }
}

impl std::error::Error for StoreError {}

/// The persistence layer's storage interface (spec §6). `write` stages a
/// change; nothing is visible to `read` until `flush_writes` commits it.
pub trait Store: std::any::Any {
    fn read(&self, id: u64) -> Option<Vec<u8>>;
    fn write(&mut self, id: u64, bytes: Vec<u8>);
    fn flush_writes(&mut self) -> Result<(), StoreError>;
    fn simple_hash_code(&self) -> [u8; 32];

    fn read_environment(&self) -> EnvironmentState {
        match self.read(ENVIRONMENT_SLOT) {
            Some(bytes) if bytes.len() == 12 => {
                let mut buf = [0u8; 12];
                buf.copy_from_slice(&bytes);
                EnvironmentState::decode(&buf)
            }
            _ => EnvironmentState {
                next_instance_id: 1,
                next_hash_code: 0,
            },
        }
    }

    fn write_environment(&mut self, env: EnvironmentState) {
        self.write(ENVIRONMENT_SLOT, env.encode().to_vec());
    }
}

/// The default in-memory implementation: a staged write buffer plus a
/// committed map. `flush_writes` moves staged into committed atomically;
/// dropping the processor (reverting a transaction) simply discards
/// whatever is staged and never touches `committed`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    committed: BTreeMap<u64, Vec<u8>>,
    staged: BTreeMap<u64, Vec<u8>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every staged write without committing it (spec §5: a
    /// reverted transaction leaves the store exactly as it found it).
    pub fn discard_staged(&mut self) {
        self.staged.clear();
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}

impl Store for InMemoryStore {
    fn read(&self, id: u64) -> Option<Vec<u8>> {
        self.staged.get(&id).or_else(|| self.committed.get(&id)).cloned()
    }

    fn write(&mut self, id: u64, bytes: Vec<u8>) {
        self.staged.insert(id, bytes);
    }

    fn flush_writes(&mut self) -> Result<(), StoreError> {
        for (id, bytes) in core::mem::take(&mut self.staged) {
            self.committed.insert(id, bytes);
        }
        Ok(())
    }

    /// A deterministic, order-independent digest over every committed
    /// entry (spec §6: used as the transaction receipt's storage root).
    /// XORs a per-entry hash rather than a Merkle tree, since the spec
    /// asks only for a simple content hash, not a membership proof.
    fn simple_hash_code(&self) -> [u8; 32] {
        let mut acc = [0u8; 32];
        for (id, bytes) in &self.committed {
            let mut h = [0u8; 32];
            h[0..8].copy_from_slice(&id.to_be_bytes());
            let mut running = 0u64;
            for (i, b) in bytes.iter().enumerate() {
                running = running.wrapping_add((*b as u64).wrapping_mul(i as u64 + 1));
            }
            h[8..16].copy_from_slice(&running.to_be_bytes());
            h[16] = (bytes.len() % 256) as u8;
            for i in 0..32 {
                acc[i] ^= h[i];
            }
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_is_invisible_until_flushed() {
        let mut store = InMemoryStore::new();
        store.write(1, vec![0xAB]);
        assert_eq!(store.read(1), Some(vec![0xAB])); // staged reads are visible to the same transaction
        store.discard_staged();
        assert_eq!(store.read(1), None);
    }

    #[test]
    fn flush_writes_commits_atomically() {
        let mut store = InMemoryStore::new();
        store.write(1, vec![1]);
        store.write(2, vec![2]);
        store.flush_writes().unwrap();
        store.discard_staged();
        assert_eq!(store.read(1), Some(vec![1]));
        assert_eq!(store.read(2), Some(vec![2]));
    }

    #[test]
    fn revert_leaves_committed_state_untouched() {
        let mut store = InMemoryStore::new();
        store.write(1, vec![1]);
        store.flush_writes().unwrap();
        let committed_hash = store.simple_hash_code();

        store.write(1, vec![99]);
        store.write(2, vec![2]);
        store.discard_staged();

        assert_eq!(store.read(1), Some(vec![1]));
        assert_eq!(store.read(2), None);
        assert_eq!(store.simple_hash_code(), committed_hash);
    }

    #[test]
    fn environment_slot_round_trips_and_is_distinct_from_ephemeral_sentinel() {
        let mut store = InMemoryStore::new();
        assert_eq!(store.read_environment().next_instance_id, 1);

        let env = EnvironmentState {
            next_instance_id: 42,
            next_hash_code: -7,
        };
        store.write_environment(env);
        store.flush_writes().unwrap();

        let roundtripped = store.read_environment();
        assert_eq!(roundtripped.next_instance_id, 42);
        assert_eq!(roundtripped.next_hash_code, -7);
        assert_ne!(ENVIRONMENT_SLOT, u64::MAX);
    }
}
