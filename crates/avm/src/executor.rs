//! §4.9/§8.3 `DappExecutor::run_tx`: the nine-step transaction lifecycle.
//! Grounded on the teacher's `avm::avm::AVM::run_tx`/`call_contract`:
//! validate the call, set up a shared meter, push a context, run inside
//! `catch_unwind`, and fold the outcome into a receipt — generalized from
//! the teacher's fixed three `TransactionType`s to this spec's single
//! "call a DApp" shape plus reentrant same-address nested calls.

use crate::bridge::{CallOutcome, CreateOutcome, HostShim, RuntimeBridge};
use crate::config::Config;
use crate::dapp::{ExecCtx, TransformedDapp};
use crate::helper::Helper;
use crate::stack::{Frame, FrameState, ReentrantDappStack};
use crate::transaction::{Event, Transaction, TransactionReceipt, TxContext};
use crate::ControlFlowException;
use avm_types::{Address, Energy, IdAllocator, InstanceId, TransactionResult, TxStatus};
use persistence::{FeeSink, ReentrantProcessor, ReflectCodec, Shadow};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use storage::Store;

/// The panic payload `HostShim::revert`/`invalid` unwind with — the
/// teacher's "panic carries the VM failure" technique (`avm.rs`'s
/// `catch_unwind(AssertUnwindSafe(...))`), specialized to the two
/// control-flow kinds a DApp can trigger deliberately rather than by
/// exhausting a resource.
#[derive(Debug, Clone, Copy)]
pub enum ControlFlowUnwind {
    Revert,
    Invalid,
    UncaughtThrow(InstanceId),
}

struct Account {
    dapp: Rc<TransformedDapp>,
}

/// Owns the shared per-task `Helper` (spec §9: "a thread-local for the
/// duration of one task"), the account registry nested calls resolve
/// against, and the reentrant frame stack.
///
/// The account registry is a simplification: the spec scopes "the outer
/// transaction scheduler" that deploys and looks up DApps as an external
/// collaborator (Non-goal). `DappExecutor` stands in for it with a flat
/// in-memory map so `call`/`create` have something to resolve against.
pub struct DappExecutor {
    store: Rc<RefCell<dyn Store>>,
    accounts: HashMap<Address, Account>,
    /// Keyed by the raw `code` bytes a `create` call carries (spec §6).
    /// Standing in for "transform `code` into a `TransformedDapp`": a
    /// demo registers the template it wants `create` to resolve to ahead
    /// of time, since this repo has no live bytes-to-`ClassFile` pipeline
    /// wired into the executor.
    creation_templates: HashMap<Vec<u8>, Rc<TransformedDapp>>,
    user_storage: HashMap<(Address, Vec<u8>), Vec<u8>>,
    stack: ReentrantDappStack,
    helper: Option<Helper>,
    next_address: u64,
    block_epoch_seconds: u64,
    block_number: u64,
    block_difficulty: u64,
    verbose: bool,
    writer: Option<Rc<RefCell<dyn Write>>>,
}

/// Same-address nested calls beyond this many frames fail with
/// `CallDepthLimit` (spec §8 scenario 6). Distinct from `Helper`'s
/// per-method stack-depth ceiling, which bounds basic-block-level call
/// frames within a single entry point rather than DApp-to-DApp nesting.
pub const CALL_DEPTH_CEILING: usize = 16;

fn shadow_refs_mut<'a>(statics: &'a mut [Box<dyn Shadow>]) -> Vec<&'a mut (dyn Shadow + 'a)> {
    statics.iter_mut().map(|b| -> &mut (dyn Shadow + 'a) { &mut **b }).collect()
}

fn shadow_refs<'a>(statics: &'a [Box<dyn Shadow>]) -> Vec<&'a (dyn Shadow + 'a)> {
    statics.iter().map(|b| -> &(dyn Shadow + 'a) { &**b }).collect()
}

impl DappExecutor {
    pub fn new(store: Rc<RefCell<dyn Store>>, block_epoch_seconds: u64, block_number: u64, block_difficulty: u64) -> Self {
        Self {
            store,
            accounts: HashMap::new(),
            creation_templates: HashMap::new(),
            user_storage: HashMap::new(),
            stack: ReentrantDappStack::new(),
            helper: None,
            next_address: 1,
            block_epoch_seconds,
            block_number,
            block_difficulty,
            verbose: false,
            writer: None,
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn set_log_writer(&mut self, writer: Rc<RefCell<dyn Write>>) {
        self.writer = Some(writer);
    }

    fn log(&self, message: &str) {
        if !self.verbose {
            return;
        }
        match &self.writer {
            Some(w) => {
                let _ = writeln!(w.borrow_mut(), "{message}");
            }
            None => println!("{message}"),
        }
    }

    pub fn deploy(&mut self, address: Address, dapp: Rc<TransformedDapp>) {
        self.accounts.insert(address, Account { dapp });
    }

    /// Registers `dapp` as what a `create` call carrying `code` resolves
    /// to (spec §6). A demo calls this once during setup for every DApp
    /// another of its DApps might create at runtime.
    pub fn register_creation_template(&mut self, code: Vec<u8>, dapp: Rc<TransformedDapp>) {
        self.creation_templates.insert(code, dapp);
    }

    pub fn next_address(&mut self) -> Address {
        let mut bytes = [0u8; 20];
        bytes[12..20].copy_from_slice(&self.next_address.to_be_bytes());
        self.next_address += 1;
        Address::new(bytes)
    }

    /// §4.9's nine steps: (1) validate input length, (2) resolve the
    /// target account, (3) build/reuse the task helper, (4) hydrate
    /// statics from the store, (5) push a frame, (6) run the entry point
    /// under `catch_unwind`, (7) map the outcome to a status, (8) commit
    /// or discard the store's staged writes, (9) assemble the receipt.
    pub fn run_tx(&mut self, tx: Transaction) -> TransactionReceipt {
        self.log(&format!("run_tx: {} -> {}", tx.from, tx.to));

        if tx.data.len() > Config::MAX_INPUT_LEN {
            let result = self.fail_without_charging(ControlFlowException::Invalid);
            return TransactionReceipt::new(tx, result);
        }

        if !self.accounts.contains_key(&tx.to) {
            let result = self.fail_without_charging(ControlFlowException::VmFailure);
            return TransactionReceipt::new(tx, result);
        }

        let env = self.store.borrow().read_environment();
        self.helper = Some(Helper::new(tx.energy_limit, env.next_instance_id, env.next_hash_code, Config::STACK_DEPTH_CEILING));

        let ctx = TxContext::top_level(&tx, self.block_epoch_seconds, self.block_number, self.block_difficulty);
        let outcome = self.run_call(tx.to, ctx);

        let mut helper = self.helper.take().expect("helper installed at the top of run_tx");
        let next_env = avm_types::EnvironmentState {
            next_instance_id: helper.ids_mut().peek_next(),
            next_hash_code: helper.peek_next_hash_code(),
        };

        let (result, events) = match outcome {
            Ok((return_data, events)) => {
                self.store.borrow_mut().write_environment(next_env);
                self.store.borrow_mut().flush_writes().expect("in-memory store flush cannot fail");
                let root_hash = self.store.borrow().simple_hash_code();
                (TransactionResult::success(return_data, helper.used_energy(), root_hash), events)
            }
            Err(exc) => {
                self.discard_staged_writes();
                let root_hash = self.store.borrow().simple_hash_code();
                let energy_used = if exc.charges_nothing() {
                    Energy::ZERO
                } else if exc.charges_full_budget() {
                    tx.energy_limit
                } else {
                    helper.used_energy()
                };
                (
                    TransactionResult::failed(exc.status(), energy_used, root_hash, exc.uncaught_exception_id()),
                    Vec::new(),
                )
            }
        };

        TransactionReceipt::new(tx, result).set_events(events)
    }

    /// Spec §5/§7: "a failed transaction must not affect store
    /// contents". Every write made during the transaction — by the
    /// top-level call or any nested call that itself "succeeded" before
    /// the overall transaction failed — is only ever staged until
    /// `flush_writes` runs at the end of a successful `run_tx`, so
    /// discarding here unwinds the whole transaction atomically.
    fn discard_staged_writes(&mut self) {
        let mut store = self.store.borrow_mut();
        let any: &mut dyn std::any::Any = &mut *store;
        if let Some(in_memory) = any.downcast_mut::<storage::InMemoryStore>() {
            in_memory.discard_staged();
        }
    }

    fn fail_without_charging(&self, exc: ControlFlowException) -> TransactionResult {
        let root_hash = self.store.borrow().simple_hash_code();
        TransactionResult::failed(exc.status(), Energy::ZERO, root_hash, None)
    }

    /// Runs one DApp call (top-level or nested) to completion: hydrates
    /// its statics, invokes its entry point, and saves or discards the
    /// resulting graph. Returns the entry point's return data plus the
    /// events it and any further nested call collected.
    fn run_call(&mut self, address: Address, ctx: TxContext) -> Result<(Vec<u8>, Vec<Event>), ControlFlowException> {
        if self.stack.len() >= CALL_DEPTH_CEILING {
            return Err(ControlFlowException::CallDepthLimit);
        }

        let dapp = self.accounts.get(&address).expect("caller already checked account exists").dapp.clone();
        let env = self.store.borrow().read_environment();
        // Spec §4.7: a same-address call from a `RUNNING` frame reuses
        // that frame's statics in place rather than re-hydrating from the
        // store. `statics_owner` names whichever frame's `statics` field
        // the entry point will actually read and write.
        let caller_index = self.stack.top_of_address_index(address);

        let frame_index = self.stack.push(Frame::new(address, dapp.clone(), env));
        self.stack.get_mut(frame_index).unwrap().state = FrameState::Hydrated;

        let mut fresh_codec = None;
        let statics_owner = match caller_index {
            Some(caller_idx) => {
                if self.stack.get(caller_idx).unwrap().reentrant.is_none() {
                    self.stack.get_mut(caller_idx).unwrap().reentrant = Some(ReentrantProcessor::new());
                }
                let caller = self.stack.get_mut(caller_idx).unwrap();
                let processor = caller.reentrant.clone().expect("just installed above");
                let mut refs: Vec<&mut dyn Shadow> = shadow_refs_mut(&mut caller.statics);
                processor.capture_and_replace_static_state(&mut refs);
                caller_idx
            }
            None => {
                let mut codec = ReflectCodec::new(self.store.clone(), IdAllocator::new(env.next_instance_id));
                // A root id the store has never seen is a fresh deployment
                // (spec §3: fields start "unspecified", which the factory's
                // defaults realize); only a previously-saved root gets the
                // lazy `StoreLoader` stub treatment.
                let mut statics: Vec<Box<dyn Shadow>> = dapp
                    .static_roots
                    .iter()
                    .enumerate()
                    .map(|(i, root)| {
                        let id = avm_types::InstanceId(i as u64 + 1);
                        if self.store.borrow().read(id.0).is_some() {
                            codec.deserialize_stub(id, root.factory)
                        } else {
                            let mut obj = (root.factory)();
                            *obj.header_mut() = persistence::ShadowHeader::new(id);
                            obj
                        }
                    })
                    .collect();
                let helper = self.helper.as_mut().expect("helper installed by run_tx before any run_call");
                {
                    let mut refs: Vec<&mut dyn Shadow> = shadow_refs_mut(&mut statics);
                    if let Err(e) = codec.load_statics(&mut refs, helper) {
                        self.stack.pop();
                        return Err(e.into());
                    }
                }
                self.stack.get_mut(frame_index).unwrap().statics = statics;
                fresh_codec = Some(codec);
                frame_index
            }
        };

        self.stack.get_mut(frame_index).unwrap().state = FrameState::Running;

        let exec_result = {
            let executor_ptr: *mut DappExecutor = self as *mut DappExecutor;
            let statics_ptr: *mut Vec<Box<dyn Shadow>> = &mut self.stack.get_mut(statics_owner).unwrap().statics;
            // SAFETY: `shim` is used and dropped entirely within this
            // block, before `self` (and therefore `helper`/the statics
            // vector pointed to by `statics_ptr`) are touched again
            // outside the closure.
            let mut shim = unsafe { HostShim::new(executor_ptr, frame_index) };
            let helper_ptr: *mut Helper = self.helper.as_mut().expect("helper installed by run_tx before any run_call");
            let entry = dapp.entry.clone();
            let input = ctx.data.clone();
            catch_unwind(AssertUnwindSafe(|| {
                // SAFETY: no other reference to `*helper_ptr`/`*statics_ptr`
                // is alive for the duration of this call.
                let helper_ref = unsafe { &mut *helper_ptr };
                // Runs the transformed main method's spliced metering and
                // stack-tracking opcodes against the live helper before the
                // entry point's own dispatch logic runs (spec §0/§4.9 step
                // 6), so `wrap_exceptions`/`meter_class`/`track_stack`'s
                // output is real work a transaction actually pays for.
                if let Some(method) = dapp.main_method() {
                    if let Err(exc) = crate::interpreter::run_instrumented(method, helper_ref) {
                        std::panic::panic_any(exc);
                    }
                }
                let statics_ref = unsafe { &mut *statics_ptr };
                let mut exec_ctx = ExecCtx {
                    helper: helper_ref,
                    bridge: &mut shim,
                    statics: statics_ref.as_mut_slice(),
                    tx: &ctx,
                };
                entry.invoke(&mut exec_ctx, &input)
            }))
        };

        let outcome = match exec_result {
            Ok(return_data) => Ok(return_data),
            Err(payload) => Err(Self::classify_panic(payload)),
        };

        match (outcome, caller_index) {
            (Ok(return_data), Some(caller_idx)) => {
                let caller = self.stack.get_mut(caller_idx).unwrap();
                let processor = caller.reentrant.clone().expect("installed before running");
                let mut refs: Vec<&mut dyn Shadow> = shadow_refs_mut(&mut caller.statics);
                let promoted = processor.commit_graph_to_stored_fields_and_restore(&mut refs, |id| {
                    panic!("nested call promoted an unregistered callee object {id:?}; no demo in this repo exercises deep reentrant graphs yet")
                });
                debug_assert!(promoted.is_empty(), "no demo DApp creates reference-typed statics yet");
                self.stack.get_mut(frame_index).unwrap().state = FrameState::Committed;
                let events = self.stack.get_mut(frame_index).unwrap().events.drain(..).collect::<Vec<_>>();
                self.stack.pop();
                Ok((return_data, events))
            }
            (Ok(return_data), None) => {
                let helper = self.helper.as_mut().expect("helper still installed");
                let frame = self.stack.get_mut(frame_index).unwrap();
                let refs: Vec<&dyn Shadow> = shadow_refs(&frame.statics);
                let codec = fresh_codec.as_mut().expect("non-reentrant path always builds a codec");
                if let Err(e) = codec.save_statics(&refs, helper) {
                    self.stack.get_mut(frame_index).unwrap().state = FrameState::Reverted;
                    self.stack.pop();
                    return Err(e.into());
                }
                self.stack.get_mut(frame_index).unwrap().state = FrameState::Committed;
                let events = self.stack.get_mut(frame_index).unwrap().events.drain(..).collect::<Vec<_>>();
                self.stack.pop();
                Ok((return_data, events))
            }
            (Err(exc), Some(caller_idx)) => {
                let caller = self.stack.get_mut(caller_idx).unwrap();
                let processor = caller.reentrant.clone().expect("installed before running");
                let mut refs: Vec<&mut dyn Shadow> = shadow_refs_mut(&mut caller.statics);
                processor.revert_to_stored_fields(&mut refs);
                self.stack.get_mut(frame_index).unwrap().state = FrameState::Reverted;
                self.stack.pop();
                Err(exc)
            }
            (Err(exc), None) => {
                self.stack.get_mut(frame_index).unwrap().state = FrameState::Reverted;
                self.stack.pop();
                Err(exc)
            }
        }
    }

    fn classify_panic(payload: Box<dyn std::any::Any + Send>) -> ControlFlowException {
        if let Some(unwind) = payload.downcast_ref::<ControlFlowUnwind>() {
            return match unwind {
                ControlFlowUnwind::Revert => ControlFlowException::Revert,
                ControlFlowUnwind::Invalid => ControlFlowException::Invalid,
                ControlFlowUnwind::UncaughtThrow(id) => ControlFlowException::UncaughtThrow(*id),
            };
        }
        if let Some(exc) = payload.downcast_ref::<ControlFlowException>() {
            return *exc;
        }
        ControlFlowException::VmFailure
    }

    // --- Called back through `HostShim`, indexed by the calling frame. ---

    pub(crate) fn nested_call(&mut self, caller_frame: usize, address: Address, value: u64, data: &[u8], energy_limit: Energy) -> CallOutcome {
        let _ = value;
        let sender = self.stack.get(caller_frame).map(|f| f.address).unwrap_or(Address::ZERO);
        let ctx = TxContext {
            sender,
            origin: sender,
            data: data.to_vec(),
            value,
            energy_limit,
            block_epoch_seconds: self.block_epoch_seconds,
            block_number: self.block_number,
            block_difficulty: self.block_difficulty,
        };
        match self.run_call(address, ctx) {
            Ok((return_data, events)) => {
                if let Some(frame) = self.stack.get_mut(caller_frame) {
                    frame.events.extend(events);
                }
                CallOutcome::Success { return_data }
            }
            Err(exc) if exc.propagates_past_nested_call() => std::panic::panic_any(exc),
            Err(_) => CallOutcome::Failed,
        }
    }

    /// Spec §8 scenario 6: a failed nested creation returns a null
    /// address to its immediate caller rather than propagating the
    /// control-flow exception further up. `code` resolves against
    /// whatever a demo registered with `register_creation_template`;
    /// unresolved code is as much a creation failure as hitting the
    /// call-depth ceiling.
    pub(crate) fn nested_create(&mut self, caller_frame: usize, value: u64, code: Vec<u8>, energy_limit: Energy) -> CreateOutcome {
        let _ = (value, energy_limit, caller_frame);
        if self.stack.len() + 1 >= CALL_DEPTH_CEILING {
            return CreateOutcome::Failed;
        }
        let Some(dapp) = self.creation_templates.get(&code).cloned() else {
            return CreateOutcome::Failed;
        };
        let address = self.next_address();
        self.deploy(address, dapp);
        CreateOutcome::Success { contract_address: address }
    }

    pub(crate) fn user_storage_get(&mut self, caller_frame: usize, key: &[u8]) -> Option<Vec<u8>> {
        let address = self.stack.get(caller_frame)?.address;
        self.user_storage.get(&(address, key.to_vec())).cloned()
    }

    pub(crate) fn user_storage_put(&mut self, caller_frame: usize, key: &[u8], value: Vec<u8>) {
        if let Some(address) = self.stack.get(caller_frame).map(|f| f.address) {
            self.user_storage.insert((address, key.to_vec()), value);
        }
    }

    pub(crate) fn emit_log(&mut self, caller_frame: usize, topics: Vec<Vec<u8>>, data: Vec<u8>) {
        if let Some(frame) = self.stack.get_mut(caller_frame) {
            frame.events.push(Event { topics, data });
        }
    }
}

// Narrow downcast hook so `DappExecutor` can discard staged writes
// without widening `storage::Store` with a revert method every
// implementation would have to carry.
impl dyn Store {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::{FieldSlot, FieldSlotMut, PrimitiveValue, ShadowHeader};
    use storage::InMemoryStore;

    struct Counter {
        header: ShadowHeader,
        value: PrimitiveValue,
    }

    fn counter_factory() -> Box<dyn Shadow> {
        Box::new(Counter {
            header: ShadowHeader::new(avm_types::InstanceId(0)),
            value: PrimitiveValue::Int(0),
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
            "demo/Counter"
        }
        fn fields(&self) -> Vec<FieldSlot> {
            vec![FieldSlot::Primitive(self.value)]
        }
        fn fields_mut(&mut self) -> Vec<FieldSlotMut<'_>> {
            vec![FieldSlotMut::Primitive(&mut self.value)]
        }
    }

    fn echo_dapp() -> Rc<TransformedDapp> {
        Rc::new(TransformedDapp::new(
            "demo/Echo".into(),
            HashMap::new(),
            vec![crate::dapp::StaticRoot {
                class_name: "demo/Echo",
                field_name: "counter",
                factory: counter_factory,
            }],
            crate::dapp::entry_point(|_ctx, input| input.to_vec()),
        ))
    }

    #[test]
    fn identity_echo_succeeds_and_charges_energy() {
        let store: Rc<RefCell<dyn Store>> = Rc::new(RefCell::new(InMemoryStore::new()));
        let mut executor = DappExecutor::new(store, 0, 0, 0);
        let to = executor.next_address();
        executor.deploy(to, echo_dapp());

        let tx = Transaction {
            from: Address::ZERO,
            to,
            data: vec![1, 2, 3],
            value: 0,
            energy_limit: Energy(10_000),
            nonce: 0,
        };
        let receipt = executor.run_tx(tx);
        assert_eq!(receipt.result.status, TxStatus::Success);
        assert_eq!(receipt.result.return_data, vec![1, 2, 3]);
        assert!(receipt.result.energy_used > Energy::ZERO);
    }

    #[test]
    fn call_to_unknown_address_fails_without_charging() {
        let store: Rc<RefCell<dyn Store>> = Rc::new(RefCell::new(InMemoryStore::new()));
        let mut executor = DappExecutor::new(store, 0, 0, 0);
        let tx = Transaction {
            from: Address::ZERO,
            to: Address::new([9; 20]),
            data: vec![],
            value: 0,
            energy_limit: Energy(10_000),
            nonce: 0,
        };
        let receipt = executor.run_tx(tx);
        assert_eq!(receipt.result.status, TxStatus::Failed);
        assert_eq!(receipt.result.energy_used, Energy::ZERO);
    }

    fn adder_dapp() -> Rc<TransformedDapp> {
        Rc::new(TransformedDapp::new(
            "demo/Adder".into(),
            HashMap::new(),
            Vec::new(),
            crate::dapp::entry_point(|_ctx, input| vec![input.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))]),
        ))
    }

    #[test]
    fn a_call_reaching_another_account_returns_its_result_as_an_event_free_success() {
        let store: Rc<RefCell<dyn Store>> = Rc::new(RefCell::new(InMemoryStore::new()));
        let mut executor = DappExecutor::new(store, 0, 0, 0);
        let adder = executor.next_address();
        executor.deploy(adder, adder_dapp());

        let caller_dapp = Rc::new(TransformedDapp::new(
            "demo/Caller".into(),
            HashMap::new(),
            Vec::new(),
            crate::dapp::entry_point(move |ctx, input| match ctx.bridge.call(adder, 0, input, Energy(1_000)) {
                CallOutcome::Success { return_data } => return_data,
                CallOutcome::Failed => vec![0xff],
            }),
        ));
        let caller = executor.next_address();
        executor.deploy(caller, caller_dapp);

        let tx = Transaction {
            from: Address::ZERO,
            to: caller,
            data: vec![2, 3, 4],
            value: 0,
            energy_limit: Energy(10_000),
            nonce: 0,
        };
        let receipt = executor.run_tx(tx);
        assert_eq!(receipt.result.status, TxStatus::Success);
        assert_eq!(receipt.result.return_data, vec![9]);
    }

    #[test]
    fn a_same_address_reentrant_call_chain_beyond_the_depth_ceiling_propagates_to_the_whole_transaction() {
        let store: Rc<RefCell<dyn Store>> = Rc::new(RefCell::new(InMemoryStore::new()));
        let mut executor = DappExecutor::new(store, 0, 0, 0);
        let looper = executor.next_address();
        let looper_dapp = Rc::new(TransformedDapp::new(
            "demo/Looper".into(),
            HashMap::new(),
            Vec::new(),
            crate::dapp::entry_point(move |ctx, input| match ctx.bridge.call(looper, 0, input, Energy(1_000)) {
                CallOutcome::Success { return_data } => return_data,
                CallOutcome::Failed => vec![],
            }),
        ));
        executor.deploy(looper, looper_dapp);

        let tx = Transaction {
            from: Address::ZERO,
            to: looper,
            data: vec![],
            value: 0,
            energy_limit: Energy(1_000_000),
            nonce: 0,
        };
        let receipt = executor.run_tx(tx);
        assert_eq!(receipt.result.status, TxStatus::FailedCallDepthLimitExceeded);
        assert_eq!(receipt.result.energy_used, Energy(1_000_000));
    }

    #[test]
    fn creating_an_unregistered_template_returns_a_null_address() {
        let store: Rc<RefCell<dyn Store>> = Rc::new(RefCell::new(InMemoryStore::new()));
        let mut executor = DappExecutor::new(store, 0, 0, 0);
        let factory = executor.next_address();
        let factory_dapp = Rc::new(TransformedDapp::new(
            "demo/Factory".into(),
            HashMap::new(),
            Vec::new(),
            crate::dapp::entry_point(|ctx, input| match ctx.bridge.create(0, input.to_vec(), Energy(1_000)) {
                CreateOutcome::Success { contract_address } => contract_address.0.to_vec(),
                CreateOutcome::Failed => vec![0],
            }),
        ));
        executor.deploy(factory, factory_dapp);

        let tx = Transaction {
            from: Address::ZERO,
            to: factory,
            data: b"no-such-template".to_vec(),
            value: 0,
            energy_limit: Energy(10_000),
            nonce: 0,
        };
        let receipt = executor.run_tx(tx);
        assert_eq!(receipt.result.status, TxStatus::Success);
        assert_eq!(receipt.result.return_data, vec![0]);
    }

    #[test]
    fn creating_a_registered_template_deploys_it_at_a_fresh_address() {
        let store: Rc<RefCell<dyn Store>> = Rc::new(RefCell::new(InMemoryStore::new()));
        let mut executor = DappExecutor::new(store, 0, 0, 0);
        executor.register_creation_template(b"echo".to_vec(), echo_dapp());
        let factory = executor.next_address();
        let factory_dapp = Rc::new(TransformedDapp::new(
            "demo/Factory".into(),
            HashMap::new(),
            Vec::new(),
            crate::dapp::entry_point(|ctx, _input| match ctx.bridge.create(0, b"echo".to_vec(), Energy(1_000)) {
                CreateOutcome::Success { contract_address } => vec![1, contract_address.0[19]],
                CreateOutcome::Failed => vec![0],
            }),
        ));
        executor.deploy(factory, factory_dapp);

        let tx = Transaction {
            from: Address::ZERO,
            to: factory,
            data: vec![],
            value: 0,
            energy_limit: Energy(10_000),
            nonce: 0,
        };
        let receipt = executor.run_tx(tx);
        assert_eq!(receipt.result.status, TxStatus::Success);
        assert_eq!(receipt.result.return_data[0], 1);
    }

    #[test]
    fn an_uncaught_throw_fails_the_transaction_with_the_exception_id() {
        let store: Rc<RefCell<dyn Store>> = Rc::new(RefCell::new(InMemoryStore::new()));
        let mut executor = DappExecutor::new(store, 0, 0, 0);
        let thrower = executor.next_address();
        let thrower_dapp = Rc::new(TransformedDapp::new(
            "demo/Thrower".into(),
            HashMap::new(),
            Vec::new(),
            crate::dapp::entry_point(|ctx, _input| ctx.bridge.throw_uncaught(avm_types::InstanceId(42))),
        ));
        executor.deploy(thrower, thrower_dapp);

        let tx = Transaction {
            from: Address::ZERO,
            to: thrower,
            data: vec![],
            value: 0,
            energy_limit: Energy(10_000),
            nonce: 0,
        };
        let receipt = executor.run_tx(tx);
        assert_eq!(receipt.result.status, TxStatus::FailedException);
        assert_eq!(receipt.result.uncaught_exception, Some(avm_types::InstanceId(42)));
    }

    #[test]
    fn oversized_input_is_rejected_before_any_energy_is_spent() {
        let store: Rc<RefCell<dyn Store>> = Rc::new(RefCell::new(InMemoryStore::new()));
        let mut executor = DappExecutor::new(store, 0, 0, 0);
        let to = executor.next_address();
        executor.deploy(to, echo_dapp());

        let tx = Transaction {
            from: Address::ZERO,
            to,
            data: vec![0u8; Config::MAX_INPUT_LEN + 1],
            value: 0,
            energy_limit: Energy(10_000),
            nonce: 0,
        };
        let receipt = executor.run_tx(tx);
        assert_eq!(receipt.result.status, TxStatus::FailedInvalid);
        assert_eq!(receipt.result.energy_used, Energy::ZERO);
    }
}
