//! §4.4 Stack tracking: splices `Helper::enter_frame`/`exit_frame` calls
//! into every method body, against a configured depth ceiling.

use classfile::opcode::Opcode;
use classfile::{splice_with_remap, ClassFile};

pub const DEFAULT_STACK_CEILING: u16 = 50;

/// Inserts `Helper::enter_frame(ceiling)` at the top of every non-empty
/// method body and `Helper::exit_frame()` before every
/// `Return`/`AReturn`/`IReturn`/`Athrow` exit (spec §4.4, §5.5).
pub fn track_stack(cf: &ClassFile, ceiling: u16) -> ClassFile {
    let mut out = cf.clone();
    for method in out.methods.iter_mut() {
        if method.code.is_empty() {
            continue;
        }

        let mut insertions: Vec<(usize, Vec<Opcode>)> = vec![(0, vec![Opcode::EnterFrame(ceiling)])];
        for (i, op) in method.code.iter().enumerate() {
            if matches!(op, Opcode::Return | Opcode::AReturn | Opcode::IReturn | Opcode::Athrow) {
                insertions.push((i, vec![Opcode::ExitFrame]));
            }
        }

        let (new_code, new_handlers) = splice_with_remap(&method.code, &insertions, &method.exception_table);
        method.code = new_code;
        method.exception_table = new_handlers;
    }
    out
}

/// Runtime-side counterpart: the shared depth counter against the
/// ceiling. Lives here (rather than only in `avm::helper::Helper`) so
/// the invariant "no execution path enters a frame at depth greater than
/// the configured ceiling" (spec §8) is directly unit-testable without
/// constructing a whole `Helper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEntryOutcome {
    Entered(u16),
    StackOverflow,
}

#[derive(Debug, Clone)]
pub struct StackDepthCounter {
    depth: u16,
    ceiling: u16,
}

impl StackDepthCounter {
    pub fn new(ceiling: u16) -> Self {
        Self { depth: 0, ceiling }
    }

    /// Shared across reentrant calls into the same DApp (spec §4.4:
    /// "recursive entry from reentrant calls shares the same counter").
    pub fn enter_frame(&mut self) -> FrameEntryOutcome {
        if self.depth >= self.ceiling {
            return FrameEntryOutcome::StackOverflow;
        }
        self.depth += 1;
        FrameEntryOutcome::Entered(self.depth)
    }

    pub fn exit_frame(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }
}
