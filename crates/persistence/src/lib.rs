//! The persistence + reentrancy engine (spec §4.6–§4.8, §3 data model):
//! reflective (de)serialization of object graphs via the `Shadow` trait,
//! a loopback codec for in-memory field-stream replay, and the reentrant
//! graph processor that keeps caller-space and callee-space object graphs
//! apart during same-DApp nested calls.

pub mod loopback;
pub mod reentrant;
pub mod reflect_codec;
pub mod shadow;

pub use loopback::{LoopbackCodec, LoopbackEntry};
pub use reentrant::{BackBufferEntry, ReentrantProcessor};
pub use reflect_codec::ReflectCodec;
pub use shadow::{FeeSink, FieldSlot, FieldSlotMut, Loader, OutOfEnergy, PrimitiveValue, Shadow, ShadowHeader};

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistError {
    OutOfEnergy,
    /// A declared reference field pointed at an id with no corresponding
    /// store record and no in-flight stub — the store or the graph is
    /// corrupt.
    DanglingReference(avm_types::InstanceId),
    Wire,
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::OutOfEnergy => write!(f, "ran out of energy during a persistence operation"),
            PersistError::DanglingReference(id) => write!(f, "dangling reference to {id:?}"),
            PersistError::Wire => write!(f, "malformed persisted record"),
        }
    }
}

impl std::error::Error for PersistError {}

impl From<OutOfEnergy> for PersistError {
    fn from(_: OutOfEnergy) -> Self {
        PersistError::OutOfEnergy
    }
}
