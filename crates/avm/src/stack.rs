//! §4.10/§8.4 Reentrant DApp stack: a per-task LIFO of frames.
//! `RuntimeBridge::call` consults `top_of_address` first — a hit reuses
//! that frame's DApp instance and environment (the reentrant persistence
//! path); a miss performs a fresh top-level hydration.
//!
//! Grounded on the teacher's `avm::execution_context::ContextStack`
//! (`push`/`pop`/`current`), generalized with the `FrameState` machine
//! the teacher's flat stack doesn't need — the teacher has no
//! reentrant-persistence concept to gate.

use crate::dapp::TransformedDapp;
use crate::transaction::Event;
use avm_types::{Address, EnvironmentState};
use persistence::ReentrantProcessor;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Created,
    Hydrated,
    Running,
    Committed,
    Reverted,
}

pub struct Frame {
    pub address: Address,
    pub dapp: Rc<TransformedDapp>,
    pub environment: EnvironmentState,
    pub state: FrameState,
    /// Installed once the frame is reused for a same-address nested call
    /// (spec §4.7); absent on a fresh top-level frame.
    pub reentrant: Option<ReentrantProcessor>,
    pub events: Vec<Event>,
    /// The frame's hydrated static roots, in `TransformedDapp::static_roots`
    /// order. Lives here rather than as a local in the executor so a
    /// same-address nested call can reach back into its caller's live
    /// objects through the stack (spec §4.7).
    pub statics: Vec<Box<dyn persistence::Shadow>>,
}

impl Frame {
    pub fn new(address: Address, dapp: Rc<TransformedDapp>, environment: EnvironmentState) -> Self {
        Self {
            address,
            dapp,
            environment,
            state: FrameState::Created,
            reentrant: None,
            events: Vec::new(),
            statics: Vec::new(),
        }
    }

    /// Nested calls on the same address are legal only while `RUNNING`
    /// (spec §4.10).
    pub fn accepts_reentry(&self) -> bool {
        self.state == FrameState::Running
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("address", &self.address)
            .field("environment", &self.environment)
            .field("state", &self.state)
            .field("events", &self.events)
            .field("statics_len", &self.statics.len())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ReentrantDappStack {
    frames: Vec<Frame>,
}

impl ReentrantDappStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: Frame) -> usize {
        self.frames.push(frame);
        self.frames.len() - 1
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.frames.get_mut(index)
    }

    /// Only ever consults frames that can legally accept a nested call
    /// into the same address (spec §4.10: "reuses that frame's DApp
    /// instance ... only from RUNNING").
    pub fn top_of_address_index(&self, a: Address) -> Option<usize> {
        self.frames.iter().enumerate().rev().find(|(_, f)| f.address == a && f.accepts_reentry()).map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn dummy_dapp() -> Rc<TransformedDapp> {
        Rc::new(TransformedDapp {
            main_class: "app/Main".into(),
            classes: HashMap::new(),
            static_roots: Vec::new(),
            entry: crate::dapp::entry_point(|_ctx, data| data.to_vec()),
        })
    }

    #[test]
    fn top_of_address_index_ignores_non_running_frames() {
        let mut stack = ReentrantDappStack::new();
        let addr = Address::new([1; 20]);
        stack.push(Frame::new(addr, dummy_dapp(), EnvironmentState::default()));
        assert!(stack.top_of_address_index(addr).is_none());

        stack.get_mut(0).unwrap().state = FrameState::Running;
        assert_eq!(stack.top_of_address_index(addr), Some(0));
    }

    #[test]
    fn pop_returns_frames_in_lifo_order() {
        let mut stack = ReentrantDappStack::new();
        let a = Address::new([1; 20]);
        let b = Address::new([2; 20]);
        stack.push(Frame::new(a, dummy_dapp(), EnvironmentState::default()));
        stack.push(Frame::new(b, dummy_dapp(), EnvironmentState::default()));
        assert_eq!(stack.pop().unwrap().address, b);
        assert_eq!(stack.pop().unwrap().address, a);
        assert!(stack.pop().is_none());
    }
}
