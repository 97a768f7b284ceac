//! §4.7/§7.4 Reentrant graph processor: keeps a caller-space and a
//! callee-space object graph apart during a same-DApp nested call, then
//! either discards the callee graph (revert) or merges it content-wise
//! back into the caller graph (commit) — never by reference substitution.
//!
//! Grounded on the teacher's `state::State` for the "swap in a fresh
//! working copy, merge back on success" shape, generalized from whole
//! accounts to individual static fields and realized with the
//! `LoopbackCodec` instead of a byte-for-byte state diff.

use crate::loopback::LoopbackCodec;
use crate::shadow::{FeeSink, FieldSlotMut, Loader, PrimitiveValue, Shadow, ShadowHeader};
use crate::PersistError;
use avm_types::{Energy, IdAllocator, InstanceId};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

pub const FIELD_ACCESS_FEE: Energy = Energy(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackBufferEntry {
    Primitive(PrimitiveValue),
    Reference(Option<InstanceId>),
}

struct Inner {
    caller_to_callee: BTreeMap<InstanceId, InstanceId>,
    callee_to_caller: BTreeMap<InstanceId, InstanceId>,
    back_buffer: VecDeque<BackBufferEntry>,
    /// Objects the caller side exposes for loopback reads — the statics
    /// plus anything already resolved during this nested call. Populated
    /// via `register_caller_object` before a callee stub can be faulted.
    caller_objects: BTreeMap<InstanceId, Box<dyn Shadow>>,
    callee_objects: BTreeMap<InstanceId, Box<dyn Shadow>>,
    done: BTreeSet<InstanceId>,
    /// Counts down from a high watermark so every minted callee-space id
    /// is distinct without consuming the persisted `IdAllocator`'s
    /// sequence (spec: these ids are never written to the store).
    next_ephemeral: u64,
}

fn mint_ephemeral(next_ephemeral: &mut u64) -> InstanceId {
    let id = InstanceId(*next_ephemeral);
    *next_ephemeral = next_ephemeral
        .checked_sub(1)
        .expect("reentrant processor minted more callee-space stubs than the ephemeral range holds");
    id
}

/// Shared handle so the processor can also serve as a `Loader` (installed
/// into callee-space stubs) while the DApp executor still holds it to
/// drive capture/revert/commit — the same `Rc<RefCell<_>>` split the
/// teacher uses between `Storage` and whatever borrows it.
pub struct ReentrantProcessor {
    inner: Rc<RefCell<Inner>>,
}

impl Clone for ReentrantProcessor {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl ReentrantProcessor {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                caller_to_callee: BTreeMap::new(),
                callee_to_caller: BTreeMap::new(),
                back_buffer: VecDeque::new(),
                caller_objects: BTreeMap::new(),
                callee_objects: BTreeMap::new(),
                done: BTreeSet::new(),
                next_ephemeral: InstanceId::EPHEMERAL.0 - 1,
            })),
        }
    }

    /// Makes a caller-space object available for the loopback read a
    /// later stub fault will need (spec §4.7: "forces the caller
    /// resident ... pipes the caller's fields through `LoopbackCodec`").
    pub fn register_caller_object(&self, id: InstanceId, obj: Box<dyn Shadow>) {
        self.inner.borrow_mut().caller_objects.insert(id, obj);
    }

    pub fn register_callee_object(&self, id: InstanceId, obj: Box<dyn Shadow>) {
        self.inner.borrow_mut().callee_objects.insert(id, obj);
    }

    pub fn callee_for(&self, caller_id: InstanceId) -> Option<InstanceId> {
        self.inner.borrow().caller_to_callee.get(&caller_id).copied()
    }

    /// Swaps every reference static to a freshly minted callee-space stub
    /// (one per distinct caller object, via `caller_to_callee`), and
    /// records the pre-call value of every static — primitive or
    /// reference — into the back buffer so `revert_to_stored_fields` can
    /// restore it verbatim.
    pub fn capture_and_replace_static_state(&self, statics: &mut [&mut dyn Shadow]) {
        let mut inner = self.inner.borrow_mut();
        for static_obj in statics.iter_mut() {
            for slot in static_obj.fields_mut() {
                match slot {
                    FieldSlotMut::Primitive(p) => {
                        inner.back_buffer.push_back(BackBufferEntry::Primitive(*p));
                    }
                    FieldSlotMut::Reference(r) => {
                        inner.back_buffer.push_back(BackBufferEntry::Reference(*r));
                        if let Some(caller_id) = *r {
                            let callee_id = match inner.caller_to_callee.get(&caller_id).copied() {
                                Some(id) => id,
                                None => {
                                    let id = mint_ephemeral(&mut inner.next_ephemeral);
                                    inner.caller_to_callee.insert(caller_id, id);
                                    inner.callee_to_caller.insert(id, caller_id);
                                    id
                                }
                            };
                            *r = Some(callee_id);
                        }
                    }
                }
            }
        }
    }

    /// Wraps `self` as a `Loader` installable into a callee-space stub's
    /// header.
    pub fn as_loader(&self) -> Rc<dyn Loader> {
        Rc::new(LoaderHandle { processor: self.clone() })
    }

    /// The `Loader` implementation's body (spec §4.7 "start deserialize
    /// instance"): resolves the stub's caller via `callee_to_caller`,
    /// forces it resident, pipes its fields through a `LoopbackCodec`
    /// translating each reference via `caller_to_callee` (minting new
    /// callee stubs for caller-referents not yet mirrored), and
    /// deserializes into the callee instance.
    fn start_deserialize_instance(
        &self,
        target: &mut dyn Shadow,
        ids: &mut IdAllocator,
        fees: &mut dyn FeeSink,
    ) -> Result<(), PersistError> {
        let mut inner = self.inner.borrow_mut();
        let callee_id = target.header().id;
        let caller_id = *inner
            .callee_to_caller
            .get(&callee_id)
            .ok_or(PersistError::DanglingReference(callee_id))?;

        {
            let caller_obj = inner
                .caller_objects
                .get_mut(&caller_id)
                .ok_or(PersistError::DanglingReference(caller_id))?;
            ShadowHeader::hydrate(caller_obj.as_mut(), ids, fees)?;
        }

        let mut codec = LoopbackCodec::new();
        {
            let caller_obj = inner.caller_objects.get(&caller_id).expect("checked above");
            for _ in caller_obj.fields() {
                fees.debit(FIELD_ACCESS_FEE)?;
            }
            codec.drain_serialize(caller_obj.as_ref());
        }

        let Inner { caller_to_callee, callee_to_caller, next_ephemeral, .. } = &mut *inner;
        codec.drain_deserialize(target, |caller_ref| {
            *caller_to_callee.entry(caller_ref).or_insert_with(|| {
                let id = mint_ephemeral(next_ephemeral);
                callee_to_caller.insert(id, caller_ref);
                id
            })
        });
        codec.verify_done();
        Ok(())
    }

    /// Drains the back buffer over `statics`, restoring exact pre-call
    /// primitives/references. The callee graph becomes unreachable once
    /// the processor itself is dropped.
    pub fn revert_to_stored_fields(&self, statics: &mut [&mut dyn Shadow]) {
        let mut inner = self.inner.borrow_mut();
        for static_obj in statics.iter_mut() {
            for slot in static_obj.fields_mut() {
                match (slot, inner.back_buffer.pop_front()) {
                    (FieldSlotMut::Primitive(p), Some(BackBufferEntry::Primitive(v))) => *p = v,
                    (FieldSlotMut::Reference(r), Some(BackBufferEntry::Reference(v))) => *r = v,
                    _ => panic!("reentrant processor: back buffer does not match statics shape"),
                }
            }
        }
    }

    /// Discards the back buffer, then walks post-call `statics`: for each
    /// callee reference, a caller counterpart (`callee_to_caller`) wins
    /// and is written back; otherwise the callee object is promoted into
    /// the caller graph. Tie-break rules (spec §4.7) are enforced
    /// exactly: caller reference wins on dual presence, callee-only
    /// references are promoted as-is, and a null-in-caller/non-null-in-
    /// callee field promotes the callee object and recurses into
    /// processing it.
    ///
    /// Only ever follows `callee_to_caller`/`caller_to_callee` — there is
    /// no secondary path that could observe a half-updated pointer, so
    /// the processor can never commit a half-merged graph (the
    /// `modify249` question, resolved here per SPEC_FULL.md §7.4).
    pub fn commit_graph_to_stored_fields_and_restore(
        &self,
        statics: &mut [&mut dyn Shadow],
        mut materialize_caller: impl FnMut(InstanceId) -> Box<dyn Shadow>,
    ) -> Vec<Box<dyn Shadow>> {
        let mut inner = self.inner.borrow_mut();
        inner.back_buffer.clear();

        let mut work: VecDeque<InstanceId> = VecDeque::new();
        let mut promoted = Vec::new();

        for static_obj in statics.iter_mut() {
            for slot in static_obj.fields_mut() {
                if let FieldSlotMut::Reference(r) = slot {
                    if let Some(callee_id) = *r {
                        match inner.callee_to_caller.get(&callee_id).copied() {
                            Some(caller_id) => *r = Some(caller_id),
                            None if inner.done.insert(callee_id) => work.push_back(callee_id),
                            None => {}
                        }
                    }
                }
            }
        }

        while let Some(callee_id) = work.pop_front() {
            let callee_obj = match inner.callee_objects.remove(&callee_id) {
                Some(o) => o,
                None => continue,
            };
            let caller_id = inner.callee_to_caller.get(&callee_id).copied();

            let mut target: Box<dyn Shadow> = match caller_id {
                Some(id) => {
                    let mut dst = materialize_caller(id);
                    let mut codec = LoopbackCodec::new();
                    codec.drain_serialize(callee_obj.as_ref());
                    let callee_to_caller = &inner.callee_to_caller;
                    codec.drain_deserialize(dst.as_mut(), |callee_ref| {
                        callee_to_caller.get(&callee_ref).copied().unwrap_or(callee_ref)
                    });
                    codec.verify_done();
                    dst
                }
                None => callee_obj,
            };

            for slot in target.fields_mut() {
                if let FieldSlotMut::Reference(r) = slot {
                    if let Some(id) = *r {
                        if !inner.callee_to_caller.contains_key(&id) && inner.done.insert(id) {
                            work.push_back(id);
                        }
                    }
                }
            }

            inner.done.remove(&callee_id);
            promoted.push(target);
        }

        promoted
    }
}

impl Default for ReentrantProcessor {
    fn default() -> Self {
        Self::new()
    }
}

struct LoaderHandle {
    processor: ReentrantProcessor,
}

impl Loader for LoaderHandle {
    fn load(&self, target: &mut dyn Shadow, ids: &mut IdAllocator, fees: &mut dyn FeeSink) -> Result<(), PersistError> {
        self.processor.start_deserialize_instance(target, ids, fees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::FieldSlot;

    struct Node {
        header: ShadowHeader,
        value: PrimitiveValue,
        next: Option<InstanceId>,
    }

    fn node_factory() -> Box<dyn Shadow> {
        Box::new(Node {
            header: ShadowHeader::new(InstanceId(0)),
            value: PrimitiveValue::Int(0),
            next: None,
        })
    }

    impl Shadow for Node {
        fn header(&self) -> &ShadowHeader {
            &self.header
        }
        fn header_mut(&mut self) -> &mut ShadowHeader {
            &mut self.header
        }
        fn class_name(&self) -> &'static str {
            "test/Node"
        }
        fn fields(&self) -> Vec<FieldSlot> {
            vec![
                FieldSlot::Primitive(self.value),
                FieldSlot::Reference { referent: self.next, factory: node_factory },
            ]
        }
        fn fields_mut(&mut self) -> Vec<FieldSlotMut<'_>> {
            vec![FieldSlotMut::Primitive(&mut self.value), FieldSlotMut::Reference(&mut self.next)]
        }
    }

    struct NoopFees;
    impl FeeSink for NoopFees {
        fn debit(&mut self, _amount: Energy) -> Result<(), crate::shadow::OutOfEnergy> {
            Ok(())
        }
    }

    #[test]
    fn revert_restores_exact_pre_call_values() {
        let processor = ReentrantProcessor::new();
        let mut node = Node {
            header: ShadowHeader::new(InstanceId::ROOT),
            value: PrimitiveValue::Int(41),
            next: Some(InstanceId(7)),
        };

        {
            let mut refs: Vec<&mut dyn Shadow> = vec![&mut node];
            processor.capture_and_replace_static_state(&mut refs);
        }

        node.value = PrimitiveValue::Int(999);
        node.next = None;

        {
            let mut refs: Vec<&mut dyn Shadow> = vec![&mut node];
            processor.revert_to_stored_fields(&mut refs);
        }

        assert_eq!(node.value, PrimitiveValue::Int(41));
        assert_eq!(node.next, Some(InstanceId(7)));
    }

    #[test]
    fn capture_replaces_reference_statics_with_distinct_callee_space_stubs() {
        let processor = ReentrantProcessor::new();
        let mut node_a = Node {
            header: ShadowHeader::new(InstanceId::ROOT),
            value: PrimitiveValue::Int(1),
            next: Some(InstanceId(3)),
        };
        let mut node_b = Node {
            header: ShadowHeader::new(InstanceId(1)),
            value: PrimitiveValue::Int(2),
            next: Some(InstanceId(4)),
        };
        {
            let mut refs: Vec<&mut dyn Shadow> = vec![&mut node_a, &mut node_b];
            processor.capture_and_replace_static_state(&mut refs);
        }

        assert_ne!(node_a.next, Some(InstanceId(3)));
        assert_ne!(node_b.next, Some(InstanceId(4)));
        assert_ne!(node_a.next, node_b.next);
        assert_eq!(processor.callee_for(InstanceId(3)), node_a.next);
        assert_eq!(processor.callee_for(InstanceId(4)), node_b.next);
    }

    #[test]
    fn commit_rewrites_callee_references_back_to_their_caller_counterparts() {
        let processor = ReentrantProcessor::new();
        let caller_id = InstanceId(5);
        let callee_id = InstanceId(u64::MAX - 3);
        processor.inner.borrow_mut().callee_to_caller.insert(callee_id, caller_id);

        let mut root = Node {
            header: ShadowHeader::new(InstanceId::ROOT),
            value: PrimitiveValue::Int(0),
            next: Some(callee_id),
        };
        {
            let mut refs: Vec<&mut dyn Shadow> = vec![&mut root];
            let _ = processor.commit_graph_to_stored_fields_and_restore(&mut refs, |_| node_factory());
        }

        assert_eq!(root.next, Some(caller_id));
    }
}
