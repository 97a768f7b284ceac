//! §8 The account-based virtual machine: wires `classfile`/`transform`'s
//! static IR and `persistence`'s reflective object graphs into a
//! DApp executor that runs transactions end to end.
//!
//! §0 execution substrate note: there is no bytecode interpreter here.
//! A transformed `ClassFile` is still produced and validated by
//! `transform::pipeline`, but the thing `DappExecutor` actually invokes
//! per call is an `EntryPoint` trait object — a closure standing in for
//! "the DApp's compiled dispatch logic" the way the teacher's examples
//! crate stands in for "a compiled RISC-V ELF".

pub mod bridge;
pub mod config;
pub mod dapp;
pub mod executor;
pub mod helper;
pub mod interpreter;
pub mod stack;
pub mod transaction;

pub use bridge::{CallOutcome, CreateOutcome, HostShim, RuntimeBridge};
pub use config::Config;
pub use dapp::{entry_point, EntryPoint, ExecCtx, StaticRoot, TransformedDapp};
pub use executor::DappExecutor;
pub use helper::Helper;
pub use stack::{Frame, FrameState, ReentrantDappStack};
pub use transaction::{Event, Transaction, TransactionReceipt, TxContext};

use avm_types::{InstanceId, TxStatus};
use core::fmt;

/// Every way a running DApp call can abort short of returning normally
/// (spec §7, §10). Distinct from `persistence::PersistError`: a
/// `PersistError` is a cause, always converted into one of these before
/// it crosses the executor boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlowException {
    OutOfEnergy,
    OutOfStack,
    CallDepthLimit,
    Revert,
    Invalid,
    Abort,
    UncaughtThrow(InstanceId),
    VmFailure,
}

impl ControlFlowException {
    /// Spec §7's status-code column.
    pub fn status(self) -> TxStatus {
        match self {
            ControlFlowException::OutOfEnergy => TxStatus::FailedOutOfEnergy,
            ControlFlowException::OutOfStack => TxStatus::FailedOutOfStack,
            ControlFlowException::CallDepthLimit => TxStatus::FailedCallDepthLimitExceeded,
            ControlFlowException::Revert => TxStatus::FailedRevert,
            ControlFlowException::Invalid => TxStatus::FailedInvalid,
            ControlFlowException::Abort => TxStatus::FailedAbort,
            ControlFlowException::UncaughtThrow(_) => TxStatus::FailedException,
            ControlFlowException::VmFailure => TxStatus::Failed,
        }
    }

    /// Whether the full energy budget is charged (as opposed to only
    /// what was used up to the point of failure), per spec §7's
    /// "energy charged on failure" column.
    pub fn charges_full_budget(self) -> bool {
        !matches!(self, ControlFlowException::Revert | ControlFlowException::Abort)
    }

    /// `Abort` charges nothing at all; everything else charges at least
    /// what was used so far (spec §7).
    pub fn charges_nothing(self) -> bool {
        matches!(self, ControlFlowException::Abort)
    }

    pub fn uncaught_exception_id(self) -> Option<InstanceId> {
        match self {
            ControlFlowException::UncaughtThrow(id) => Some(id),
            _ => None,
        }
    }

    /// Spec §8 scenario 6: exhausting a resource shared across the whole
    /// call tree (energy, native stack, call depth) is not something a
    /// `call()`/`create()` boundary can absorb into a plain failure
    /// result — it unwinds past every nested frame to the transaction's
    /// own status, the same way these propagate past a `try`/`catch` in
    /// user bytecode (§7's "caught by user? no"). Per-callee outcomes
    /// (`Revert`, `Invalid`, `Abort`, an uncaught user throw, or a
    /// catch-all VM failure) are exactly what `call()`/`create()` exist
    /// to report back as a graceful failure instead.
    pub fn propagates_past_nested_call(self) -> bool {
        matches!(
            self,
            ControlFlowException::OutOfEnergy | ControlFlowException::OutOfStack | ControlFlowException::CallDepthLimit
        )
    }
}

impl fmt::Display for ControlFlowException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlFlowException::OutOfEnergy => write!(f, "out of energy"),
            ControlFlowException::OutOfStack => write!(f, "stack depth limit exceeded"),
            ControlFlowException::CallDepthLimit => write!(f, "call depth limit exceeded"),
            ControlFlowException::Revert => write!(f, "reverted"),
            ControlFlowException::Invalid => write!(f, "invalid operation"),
            ControlFlowException::Abort => write!(f, "aborted"),
            ControlFlowException::UncaughtThrow(id) => write!(f, "uncaught exception from {id:?}"),
            ControlFlowException::VmFailure => write!(f, "internal vm failure"),
        }
    }
}

impl std::error::Error for ControlFlowException {}

impl From<persistence::PersistError> for ControlFlowException {
    fn from(e: persistence::PersistError) -> Self {
        match e {
            persistence::PersistError::OutOfEnergy => ControlFlowException::OutOfEnergy,
            persistence::PersistError::DanglingReference(_) => ControlFlowException::VmFailure,
            persistence::PersistError::Wire => ControlFlowException::VmFailure,
        }
    }
}
