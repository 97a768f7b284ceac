//! §4.6/§7.2 Reflection structure codec: the primary persistence path.
//! Breadth-first over an explicit work queue rather than native recursion
//! (spec §9 design note: "use an id→instance table plus a work queue"),
//! so a deeply nested object graph never blows the Rust call stack doing
//! the VM's own bookkeeping.
//!
//! Deviates from the struct shape first sketched for this module
//! (`store: &'s mut dyn Store`) to `store: Rc<RefCell<dyn Store>>`: a
//! lazily-installed `Loader` must be able to read the store long after
//! the codec that created it has gone out of scope, and a borrowed
//! reference can't outlive that. Grounded on the teacher's
//! `state::State::new_from_storage(storage: Rc<Storage>)`, which already
//! reaches for a shared handle over the store for the same reason.

use crate::shadow::{FeeSink, FieldSlot, FieldSlotMut, Loader, PrimitiveValue, Shadow, ShadowHeader};
use crate::PersistError;
use avm_types::wire::Cursor;
use avm_types::{Energy, IdAllocator, InstanceId};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;
use storage::Store;

/// Energy debited per field touched (read or write) by the reflection
/// codec, distinct from the bytecode-level metering in `transform`.
pub const FIELD_ACCESS_FEE: Energy = Energy(1);

fn write_primitive(v: &PrimitiveValue, out: &mut Vec<u8>) {
    v.write_be(out);
}

fn read_primitive(existing: &PrimitiveValue, cursor: &mut Cursor<'_>) -> Result<PrimitiveValue, PersistError> {
    let wire_err = |_| PersistError::Wire;
    Ok(match existing {
        PrimitiveValue::Bool(_) => PrimitiveValue::Bool(cursor.read_u8().map_err(wire_err)? != 0),
        PrimitiveValue::Byte(_) => PrimitiveValue::Byte(cursor.read_u8().map_err(wire_err)? as i8),
        PrimitiveValue::Char(_) => PrimitiveValue::Char(cursor.read_u16().map_err(wire_err)?),
        PrimitiveValue::Short(_) => PrimitiveValue::Short(cursor.read_u16().map_err(wire_err)? as i16),
        PrimitiveValue::Int(_) => PrimitiveValue::Int(cursor.read_i32().map_err(wire_err)?),
        PrimitiveValue::Long(_) => PrimitiveValue::Long(cursor.read_u64().map_err(wire_err)? as i64),
        PrimitiveValue::Float(_) => PrimitiveValue::Float(f32::from_bits(cursor.read_u32().map_err(wire_err)?)),
        PrimitiveValue::Double(_) => PrimitiveValue::Double(f64::from_bits(cursor.read_u64().map_err(wire_err)?)),
    })
}

/// Serializes one object's declared fields, in the order `fields()`
/// yields them, into a flat record: a raw big-endian payload for each
/// primitive, a `0u8` null tag or `1u8` followed by the referent's id for
/// each reference (spec §7.2). The manual-serializer suffix, if any, is
/// appended last.
pub fn encode_instance(obj: &dyn Shadow) -> Vec<u8> {
    let mut out = Vec::new();
    for slot in obj.fields() {
        match slot {
            FieldSlot::Primitive(v) => write_primitive(&v, &mut out),
            FieldSlot::Reference { referent, .. } => match referent {
                None => out.push(0),
                Some(id) => {
                    out.push(1);
                    out.extend_from_slice(&id.0.to_be_bytes());
                }
            },
        }
    }
    if obj.is_manual_serializer() {
        obj.manual_serialize(&mut out);
    }
    out
}

/// Inverse of `encode_instance`: overwrites `obj`'s fields in place from
/// `bytes`, in the same declared order. The two must agree on field
/// count/order/type for a given class — the same invariant a real JVM's
/// reflective field list guarantees for a fixed class.
pub fn decode_instance(obj: &mut dyn Shadow, bytes: &[u8]) -> Result<(), PersistError> {
    let mut cursor = Cursor::new(bytes);
    for slot in obj.fields_mut() {
        match slot {
            FieldSlotMut::Primitive(p) => {
                *p = read_primitive(p, &mut cursor)?;
            }
            FieldSlotMut::Reference(r) => {
                let tag = cursor.read_u8().map_err(|_| PersistError::Wire)?;
                *r = if tag == 0 {
                    None
                } else {
                    let id = cursor.read_u64().map_err(|_| PersistError::Wire)?;
                    Some(InstanceId(id))
                };
            }
        }
    }
    if obj.is_manual_serializer() {
        obj.manual_deserialize(&mut cursor);
    }
    Ok(())
}

/// Installed into a stub's `ShadowHeader` on first reference; reads the
/// instance's record from the store and fills in its fields (spec §4.6:
/// "the first field access on a stub invokes it and clears the slot").
pub struct StoreLoader {
    store: Rc<RefCell<dyn Store>>,
}

impl StoreLoader {
    pub fn new(store: Rc<RefCell<dyn Store>>) -> Self {
        Self { store }
    }
}

impl Loader for StoreLoader {
    fn load(&self, target: &mut dyn Shadow, _ids: &mut IdAllocator, fees: &mut dyn FeeSink) -> Result<(), PersistError> {
        let id = target.header().id;
        let bytes = self
            .store
            .borrow()
            .read(id.0)
            .ok_or(PersistError::DanglingReference(id))?;
        for _ in target.fields_mut() {
            fees.debit(FIELD_ACCESS_FEE)?;
        }
        decode_instance(target, &bytes)
    }
}

pub struct ReflectCodec {
    store: Rc<RefCell<dyn Store>>,
    ids: IdAllocator,
}

impl ReflectCodec {
    pub fn new(store: Rc<RefCell<dyn Store>>, ids: IdAllocator) -> Self {
        Self { store, ids }
    }

    pub fn ids(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    pub fn into_ids(self) -> IdAllocator {
        self.ids
    }

    /// Installs a `StoreLoader` stub for `id`, without touching field
    /// values; fields remain "unspecified" until first access (spec §3
    /// Invariants).
    pub fn deserialize_stub(&self, id: InstanceId, factory: fn() -> Box<dyn Shadow>) -> Box<dyn Shadow> {
        let mut obj = factory();
        *obj.header_mut() = ShadowHeader::stub(id, Rc::new(StoreLoader::new(self.store.clone())));
        obj
    }

    /// Breadth-first over every object reachable from `roots`. `roots`
    /// must include every resident (non-stub) object the transaction
    /// touched — an object reachable only through an unresolved stub is
    /// assumed already durable and is left alone (it was never mutated).
    pub fn serialize_graph(&mut self, roots: &[&dyn Shadow], fees: &mut dyn FeeSink) -> Result<(), PersistError> {
        let live: BTreeMap<InstanceId, &dyn Shadow> = roots.iter().map(|o| (o.header().id, *o)).collect();
        let mut queue: VecDeque<InstanceId> = roots.iter().map(|o| o.header().id).collect();
        let mut visited: BTreeSet<InstanceId> = BTreeSet::new();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let obj = match live.get(&id) {
                Some(o) => *o,
                None => continue,
            };
            for slot in obj.fields() {
                fees.debit(FIELD_ACCESS_FEE)?;
                if let FieldSlot::Reference { referent: Some(rid), .. } = slot {
                    if !visited.contains(&rid) {
                        queue.push_back(rid);
                    }
                }
            }
            let bytes = encode_instance(obj);
            self.store.borrow_mut().write(id.0, bytes);
        }
        Ok(())
    }

    /// Forces every given static root resident, running its loader if it
    /// is still a stub (spec §4.9 step 5, "hydrate").
    pub fn load_statics(&mut self, roots: &mut [&mut dyn Shadow], fees: &mut dyn FeeSink) -> Result<(), PersistError> {
        for root in roots.iter_mut() {
            ShadowHeader::hydrate(*root, &mut self.ids, fees)?;
        }
        Ok(())
    }

    /// Persists every static root's reachable graph and records the
    /// bootstrap pointer table under `InstanceId::ROOT` (spec §7.2: "id
    /// `InstanceId::ROOT` is reserved for the statics container record
    /// itself").
    pub fn save_statics(&mut self, roots: &[&dyn Shadow], fees: &mut dyn FeeSink) -> Result<(), PersistError> {
        let mut pointer_table = Vec::new();
        for root in roots {
            pointer_table.extend_from_slice(&root.header().id.0.to_be_bytes());
        }
        self.store.borrow_mut().write(InstanceId::ROOT.0, pointer_table);
        self.serialize_graph(roots, fees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::InMemoryStore;

    struct Counter {
        header: ShadowHeader,
        value: PrimitiveValue,
        next: Option<InstanceId>,
    }

    fn counter_factory() -> Box<dyn Shadow> {
        Box::new(Counter {
            header: ShadowHeader::new(InstanceId(0)),
            value: PrimitiveValue::Int(0),
            next: None,
        })
    }

    impl Shadow for Counter {
        fn header(&self) -> &ShadowHeader {
            &self.header
        }
        fn header_mut(&mut self) -> &mut ShadowHeader {
            &mut self.header
        }
        fn class_name(&self) -> &'static str {
            "test/Counter"
        }
        fn fields(&self) -> Vec<FieldSlot> {
            vec![
                FieldSlot::Primitive(self.value),
                FieldSlot::Reference { referent: self.next, factory: counter_factory },
            ]
        }
        fn fields_mut(&mut self) -> Vec<FieldSlotMut<'_>> {
            vec![
                FieldSlotMut::Primitive(&mut self.value),
                FieldSlotMut::Reference(&mut self.next),
            ]
        }
    }

    struct NoopFees;
    impl FeeSink for NoopFees {
        fn debit(&mut self, _amount: Energy) -> Result<(), crate::shadow::OutOfEnergy> {
            Ok(())
        }
    }

    #[test]
    fn round_trips_a_two_node_chain_through_the_store() {
        let store: Rc<RefCell<dyn Store>> = Rc::new(RefCell::new(InMemoryStore::new()));
        let mut codec = ReflectCodec::new(store.clone(), IdAllocator::new(1));
        let mut fees = NoopFees;

        let tail = Counter {
            header: ShadowHeader::new(InstanceId(2)),
            value: PrimitiveValue::Int(99),
            next: None,
        };
        let head = Counter {
            header: ShadowHeader::new(InstanceId(1)),
            value: PrimitiveValue::Int(1),
            next: Some(InstanceId(2)),
        };

        codec
            .serialize_graph(&[&head as &dyn Shadow, &tail as &dyn Shadow], &mut fees)
            .unwrap();
        store.borrow_mut().flush_writes().unwrap();

        let bytes = store.borrow().read(1).expect("head record was written");
        let mut reloaded = Counter {
            header: ShadowHeader::new(InstanceId(1)),
            value: PrimitiveValue::Int(0),
            next: None,
        };
        decode_instance(&mut reloaded, &bytes).unwrap();

        assert_eq!(reloaded.value, PrimitiveValue::Int(1));
        assert_eq!(reloaded.next, Some(InstanceId(2)));

        let loaded_via_stub = codec.deserialize_stub(InstanceId(1), counter_factory);
        assert!(loaded_via_stub.header().is_stub());
    }

    struct FailAfter(u32);
    impl FeeSink for FailAfter {
        fn debit(&mut self, _amount: Energy) -> Result<(), crate::shadow::OutOfEnergy> {
            if self.0 == 0 {
                return Err(crate::shadow::OutOfEnergy);
            }
            self.0 -= 1;
            Ok(())
        }
    }

    #[test]
    fn two_roots_sharing_a_referent_serialize_it_only_once() {
        let store: Rc<RefCell<dyn Store>> = Rc::new(RefCell::new(InMemoryStore::new()));
        let mut codec = ReflectCodec::new(store.clone(), IdAllocator::new(1));
        let mut fees = NoopFees;

        let shared = Counter {
            header: ShadowHeader::new(InstanceId(3)),
            value: PrimitiveValue::Int(7),
            next: None,
        };
        let left = Counter {
            header: ShadowHeader::new(InstanceId(1)),
            value: PrimitiveValue::Int(1),
            next: Some(InstanceId(3)),
        };
        let right = Counter {
            header: ShadowHeader::new(InstanceId(2)),
            value: PrimitiveValue::Int(2),
            next: Some(InstanceId(3)),
        };

        codec
            .serialize_graph(&[&left as &dyn Shadow, &right as &dyn Shadow, &shared as &dyn Shadow], &mut fees)
            .unwrap();
        store.borrow_mut().flush_writes().unwrap();

        // A diamond reached from two roots is still written under one
        // id; loading it back from either side lands on the same record.
        let bytes = store.borrow().read(3).expect("shared record was written exactly once");
        let mut reloaded = Counter {
            header: ShadowHeader::new(InstanceId(3)),
            value: PrimitiveValue::Int(0),
            next: None,
        };
        decode_instance(&mut reloaded, &bytes).unwrap();
        assert_eq!(reloaded.value, PrimitiveValue::Int(7));
    }

    #[test]
    fn running_out_of_energy_mid_save_fails_without_partial_state_confusion() {
        let store: Rc<RefCell<dyn Store>> = Rc::new(RefCell::new(InMemoryStore::new()));
        let mut codec = ReflectCodec::new(store.clone(), IdAllocator::new(1));
        let mut fees = FailAfter(0);

        let tail = Counter {
            header: ShadowHeader::new(InstanceId(2)),
            value: PrimitiveValue::Int(99),
            next: None,
        };
        let head = Counter {
            header: ShadowHeader::new(InstanceId(1)),
            value: PrimitiveValue::Int(1),
            next: Some(InstanceId(2)),
        };

        let result = codec.serialize_graph(&[&head as &dyn Shadow, &tail as &dyn Shadow], &mut fees);
        assert!(matches!(result, Err(PersistError::OutOfEnergy)));
    }
}
