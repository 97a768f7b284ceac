//! §4.8/§7.3 Loopback codec: an in-memory, single-use pipe that replays
//! one object's field stream without ever touching the store. Used by
//! the reentrant graph processor to move field values between
//! caller-space and callee-space objects during same-DApp nested calls.

use crate::shadow::{FieldSlot, FieldSlotMut, PrimitiveValue, Shadow};
use avm_types::InstanceId;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopbackEntry {
    Primitive(PrimitiveValue),
    Reference(Option<InstanceId>),
}

/// Drains in FIFO order: `drain_serialize` pushes, `drain_deserialize`
/// pops. A given `LoopbackCodec` is meant to carry exactly one object's
/// worth of fields across one translation — `verify_done` enforces that.
#[derive(Debug, Default)]
pub struct LoopbackCodec {
    queue: VecDeque<LoopbackEntry>,
}

impl LoopbackCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes every field of `obj`, in declaration order, with no store
    /// access (spec §7.3).
    pub fn drain_serialize(&mut self, obj: &dyn Shadow) {
        for slot in obj.fields() {
            let entry = match slot {
                FieldSlot::Primitive(v) => LoopbackEntry::Primitive(v),
                FieldSlot::Reference { referent, .. } => LoopbackEntry::Reference(referent),
            };
            self.queue.push_back(entry);
        }
    }

    /// Pops in the same order `drain_serialize` pushed, writing into
    /// `obj`'s fields. `translate` remaps a non-null reference id (e.g.
    /// caller-space -> callee-space) as each reference is consumed.
    pub fn drain_deserialize<F>(&mut self, obj: &mut dyn Shadow, mut translate: F)
    where
        F: FnMut(InstanceId) -> InstanceId,
    {
        for slot in obj.fields_mut() {
            match slot {
                FieldSlotMut::Primitive(p) => {
                    if let Some(LoopbackEntry::Primitive(v)) = self.queue.pop_front() {
                        *p = v;
                    } else {
                        panic!("loopback codec: structural mismatch (expected a primitive entry)");
                    }
                }
                FieldSlotMut::Reference(r) => {
                    if let Some(LoopbackEntry::Reference(referent)) = self.queue.pop_front() {
                        *r = referent.map(&mut translate);
                    } else {
                        panic!("loopback codec: structural mismatch (expected a reference entry)");
                    }
                }
            }
        }
    }

    /// Structural mismatch between what was serialized and what was
    /// deserialized is a fatal internal error (spec §4.8): two shadows of
    /// the same declared class must always agree on field shape.
    pub fn verify_done(&self) {
        if !self.queue.is_empty() {
            panic!("loopback codec: {} entries left undrained", self.queue.len());
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
