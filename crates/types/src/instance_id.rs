use core::fmt;

/// Monotonically assigned 64-bit id that persistently identifies one
/// object across transactions (spec §3 "Instance id").
///
/// `ROOT` is the sentinel for the statics container; `EPHEMERAL` is the
/// sentinel for a callee-space stub that is never persisted. We park
/// `EPHEMERAL` at `u64::MAX` rather than `u64::MIN` (which the prose calls
/// "a reserved minimum value") so that `0` stays free for `ROOT` and real
/// monotonic ids, which start at 1, never collide with either sentinel.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u64);

impl InstanceId {
    pub const ROOT: InstanceId = InstanceId(0);
    pub const EPHEMERAL: InstanceId = InstanceId(u64::MAX);

    pub fn is_ephemeral(self) -> bool {
        self == Self::EPHEMERAL
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ephemeral() {
            write!(f, "InstanceId(ephemeral)")
        } else {
            write!(f, "InstanceId({})", self.0)
        }
    }
}

/// Monotonic allocator seeded from `EnvironmentState::next_instance_id`.
/// Never recycles ids within a transaction (spec §4.6 "Id allocation").
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new(next: u64) -> Self {
        Self { next: next.max(1) }
    }

    pub fn next_id(&mut self) -> InstanceId {
        let id = InstanceId(self.next);
        self.next = self
            .next
            .checked_add(1)
            .expect("instance id counter overflowed u64");
        id
    }

    pub fn peek_next(&self) -> u64 {
        self.next
    }
}
