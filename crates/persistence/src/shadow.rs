//! §4.6/§3 Shadow object model: the Rust-native stand-in for JVM
//! reflection over a persisted object graph. Every persisted class
//! implements `Shadow` by hand (no proc-macro, matching the teacher's
//! preference for plain structs over macro magic in `program::Account`).

use avm_types::InstanceId;
use std::rc::Rc;

/// A primitive field's runtime value. Reference fields carry their own
/// `InstanceId` (or `None` for null) rather than living in this enum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveValue {
    Bool(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl PrimitiveValue {
    pub fn write_be(&self, out: &mut Vec<u8>) {
        match self {
            PrimitiveValue::Bool(v) => out.push(*v as u8),
            PrimitiveValue::Byte(v) => out.push(*v as u8),
            PrimitiveValue::Char(v) => out.extend_from_slice(&v.to_be_bytes()),
            PrimitiveValue::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
            PrimitiveValue::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            PrimitiveValue::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
            PrimitiveValue::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
            PrimitiveValue::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
        }
    }
}

/// A read view of one declared field, in declaration order: either a
/// primitive value, or a reference slot carrying the current referent id
/// (if resident) and a factory that materializes the declared runtime
/// type as a stub (the direct analogue of JVM reflection's "declared
/// field type", spec §3).
pub enum FieldSlot {
    Primitive(PrimitiveValue),
    Reference {
        referent: Option<InstanceId>,
        factory: fn() -> Box<dyn Shadow>,
    },
}

/// A write view of one declared field, used by the codecs to push values
/// back into an object during deserialization.
pub enum FieldSlotMut<'a> {
    Primitive(&'a mut PrimitiveValue),
    Reference(&'a mut Option<InstanceId>),
}

/// Installed into `ShadowHeader.loader`; invoked the first time a stub's
/// fields are accessed, then cleared. Implemented by `StoreLoader` (the
/// primary-storage path) and by `ReentrantProcessor` itself (the
/// caller-to-callee loopback path, spec §4.7).
pub trait Loader {
    fn load(
        &self,
        target: &mut dyn Shadow,
        ids: &mut avm_types::IdAllocator,
        fees: &mut dyn FeeSink,
    ) -> Result<(), crate::PersistError>;
}

/// Debited for every field access, stub instantiation, and payload byte
/// moved through a codec (spec §4.6 "Fee interaction"). Propagates energy
/// exhaustion as the spec's control-flow exception rather than a silent
/// failure.
pub trait FeeSink {
    fn debit(&mut self, amount: avm_types::Energy) -> Result<(), OutOfEnergy>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfEnergy;

/// The identity and lazy-load state every persisted object carries
/// (spec §3: "instance id" + "lazy loader (nullable)").
pub struct ShadowHeader {
    pub id: InstanceId,
    pub loader: Option<Rc<dyn Loader>>,
    /// Guards against re-entering the same stub's loader while it is
    /// already running (spec §4.6: a fatal internal error, not a
    /// recoverable one — the object graph is malformed if this happens).
    in_progress: core::cell::Cell<bool>,
}

impl ShadowHeader {
    pub fn new(id: InstanceId) -> Self {
        Self {
            id,
            loader: None,
            in_progress: core::cell::Cell::new(false),
        }
    }

    pub fn stub(id: InstanceId, loader: Rc<dyn Loader>) -> Self {
        Self {
            id,
            loader: Some(loader),
            in_progress: core::cell::Cell::new(false),
        }
    }

    pub fn is_stub(&self) -> bool {
        self.loader.is_some()
    }

    /// Runs `loader.load` exactly once, clearing the loader on success so
    /// a second call is a no-op. Panics if re-entered while already
    /// running (spec §4.6).
    pub fn hydrate(
        target: &mut dyn Shadow,
        ids: &mut avm_types::IdAllocator,
        fees: &mut dyn FeeSink,
    ) -> Result<(), crate::PersistError> {
        let loader = match target.header().loader.clone() {
            Some(l) => l,
            None => return Ok(()),
        };
        if target.header().in_progress.get() {
            panic!("shadow header re-entered its own loader while already hydrating");
        }
        target.header().in_progress.set(true);
        let result = loader.load(target, ids, fees);
        target.header().in_progress.set(false);
        if result.is_ok() {
            target.header_mut().loader = None;
        }
        result
    }
}

impl core::fmt::Debug for ShadowHeader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShadowHeader")
            .field("id", &self.id)
            .field("is_stub", &self.is_stub())
            .finish()
    }
}

/// A persisted object's reflective surface. `manual_serialize`/
/// `manual_deserialize` are the escape hatch a class declares by setting
/// `is_manual_serializer` on its `ClassFile` (spec §4.6): the automatic
/// field walk stops at the first such class in the chain and hands off.
pub trait Shadow {
    fn header(&self) -> &ShadowHeader;
    fn header_mut(&mut self) -> &mut ShadowHeader;
    fn class_name(&self) -> &'static str;
    fn fields(&self) -> Vec<FieldSlot>;
    fn fields_mut(&mut self) -> Vec<FieldSlotMut<'_>>;

    fn is_manual_serializer(&self) -> bool {
        false
    }
    fn manual_serialize(&self, _out: &mut Vec<u8>) {}
    fn manual_deserialize(&mut self, _cursor: &mut avm_types::wire::Cursor<'_>) {}
}
