//! §6 Runtime bridge surface: the calls a DApp's entry point makes back
//! into the VM (`call`/`create`/storage/log/hash/revert). Grounded on the
//! teacher's `avm::host_interface::HostInterface` trait — same split
//! between "the interface an entry point programs against" and "the
//! concrete shim implementing it against a live executor".

pub mod host_shim;

pub use host_shim::HostShim;

use avm_types::{Address, Energy, InstanceId};

#[derive(Debug, Clone)]
pub enum CallOutcome {
    Success { return_data: Vec<u8> },
    Failed,
}

#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Success { contract_address: Address },
    /// Spec §8 scenario 6: "the innermost creation returns a null
    /// address" rather than propagating — only the top-level caller of
    /// the chain observes the control-flow exception.
    Failed,
}

/// What an `EntryPoint` calls back into (spec §6). Implemented by
/// `HostShim` against a live `DappExecutor`; a `fake` implementation in
/// tests can exercise entry points without a whole executor.
pub trait RuntimeBridge {
    fn call(&mut self, address: Address, value: u64, data: &[u8], energy_limit: Energy) -> CallOutcome;
    fn create(&mut self, value: u64, code: Vec<u8>, energy_limit: Energy) -> CreateOutcome;
    fn get_storage(&mut self, key: &[u8]) -> Option<Vec<u8>>;
    fn put_storage(&mut self, key: &[u8], value: Vec<u8>);
    fn log(&mut self, topics: Vec<Vec<u8>>, data: Vec<u8>);
    fn revert(&mut self) -> !;
    fn invalid(&mut self) -> !;
    /// Spec §4.2/§7: a handler guard that matched a VM-internal marker
    /// rethrows unconditionally; this is where that rethrow ultimately
    /// lands — unwinding the call the same way `revert`/`invalid` do.
    fn throw_uncaught(&mut self, exception_id: InstanceId) -> !;
    fn sha256(&self, data: &[u8]) -> [u8; 32];
    fn blake2b(&self, data: &[u8]) -> [u8; 32];
    fn keccak256(&self, data: &[u8]) -> [u8; 32];
}
