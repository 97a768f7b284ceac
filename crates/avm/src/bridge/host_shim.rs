//! Grounded verbatim on the teacher's `avm::host_interface::HostShim`: a
//! raw pointer to the executor rather than `&mut DappExecutor`, because a
//! nested call re-enters `DappExecutor::run_call` while the outer call's
//! `&mut self` borrow is still notionally alive on the Rust call stack.
//! Safety argument, carried over from the teacher almost word for word:
//! the executor is never moved or dropped while any `HostShim` pointing
//! at it is live (every `HostShim` is constructed, used, and dropped
//! entirely within one `ExecCtx`'s lifetime), and Rust's recursive calls
//! into `run_call` never alias the pointee mutably at the same time —
//! only one frame is ever actively mutating it at once, the others are
//! suspended on the native call stack waiting for the nested call to
//! return.

use crate::bridge::{CallOutcome, CreateOutcome, RuntimeBridge};
use crate::executor::DappExecutor;
use avm_types::{Address, Energy, InstanceId};
use blake2::{Blake2b512, Digest as Blake2Digest};
use sha2::{Digest as Sha2Digest, Sha256};
use sha3::Keccak256;

pub struct HostShim {
    /// See module doc for the safety argument behind this raw pointer.
    executor: *mut DappExecutor,
    caller_frame: usize,
}

impl HostShim {
    /// # Safety
    /// `executor` must outlive every `HostShim` constructed from it, and
    /// no other live reference (`&` or `&mut`) to `*executor` may exist
    /// for the duration this shim is used.
    pub unsafe fn new(executor: *mut DappExecutor, caller_frame: usize) -> Self {
        Self { executor, caller_frame }
    }

    fn executor(&mut self) -> &mut DappExecutor {
        // SAFETY: see the type's constructor contract.
        unsafe { &mut *self.executor }
    }
}

impl RuntimeBridge for HostShim {
    fn call(&mut self, address: Address, value: u64, data: &[u8], energy_limit: Energy) -> CallOutcome {
        let caller_frame = self.caller_frame;
        self.executor().nested_call(caller_frame, address, value, data, energy_limit)
    }

    fn create(&mut self, value: u64, code: Vec<u8>, energy_limit: Energy) -> CreateOutcome {
        let caller_frame = self.caller_frame;
        self.executor().nested_create(caller_frame, value, code, energy_limit)
    }

    fn get_storage(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let caller_frame = self.caller_frame;
        self.executor().user_storage_get(caller_frame, key)
    }

    fn put_storage(&mut self, key: &[u8], value: Vec<u8>) {
        let caller_frame = self.caller_frame;
        self.executor().user_storage_put(caller_frame, key, value);
    }

    fn log(&mut self, topics: Vec<Vec<u8>>, data: Vec<u8>) {
        let caller_frame = self.caller_frame;
        self.executor().emit_log(caller_frame, topics, data);
    }

    /// Unwinds with a sentinel payload the executor's `catch_unwind`
    /// recognizes and maps to `ControlFlowException::Revert` (spec §7),
    /// the same "panic is the control-flow transport" technique the
    /// teacher's `avm.rs` uses to contain a VM-internal panic.
    fn revert(&mut self) -> ! {
        std::panic::panic_any(crate::executor::ControlFlowUnwind::Revert);
    }

    fn invalid(&mut self) -> ! {
        std::panic::panic_any(crate::executor::ControlFlowUnwind::Invalid);
    }

    fn throw_uncaught(&mut self, exception_id: InstanceId) -> ! {
        std::panic::panic_any(crate::executor::ControlFlowUnwind::UncaughtThrow(exception_id));
    }

    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().into()
    }

    fn blake2b(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = Blake2b512::new();
        hasher.update(data);
        let full: [u8; 64] = hasher.finalize().into();
        let mut out = [0u8; 32];
        out.copy_from_slice(&full[..32]);
        out
    }

    fn keccak256(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update(data);
        hasher.finalize().into()
    }
}
