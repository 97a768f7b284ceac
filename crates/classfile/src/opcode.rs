//! The instruction vocabulary the transform pipeline operates over.
//! Narrow by design: just enough opcodes to express every rewrite rule in
//! spec §4.1–§4.5 and every rejection rule in the validator.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    Nop,
    /// Load a constant pool entry (string/class literal) onto the stack.
    Ldc(u16),
    New(u16),
    NewArray(u8),
    AnewArray(u16),
    GetField(u16),
    PutField(u16),
    GetStatic(u16),
    PutStatic(u16),
    InvokeVirtual(u16),
    InvokeSpecial(u16),
    InvokeStatic(u16),
    /// Method-handle / invoke-dynamic constants: fatal per spec §4.1.
    InvokeDynamic(u16),
    Athrow,
    /// Absolute index (within the same method body) of the branch target.
    Goto(usize),
    IfEq(usize),
    Return,
    AReturn,
    IReturn,
    /// Disallowed floating-point opcode family (spec §1 non-goals).
    FAdd,
    DAdd,
    /// Rejected as unimplemented (spec §4.1 edge policy).
    ArraySort,
    /// Synthetic: charge `Helper::charge_energy(amount)` (spec §4.3).
    /// Carries its operand directly rather than a preceding int-literal
    /// push, since this IR's constant pool has no integer-literal kind
    /// and no real operand stack to push one onto.
    ChargeEnergy(u64),
    /// Synthetic: charge `Helper::charge_allocation(bytes)` (spec §4.3),
    /// same operand-carrying adaptation as `ChargeEnergy`.
    ChargeAllocation(u32),
    /// Synthetic: `Helper::enter_frame()` at the top of a method body
    /// (spec §4.4). The `u16` records the ceiling the method was
    /// metered against; `Helper` enforces its own runtime ceiling
    /// regardless, so this is informational rather than load-bearing.
    EnterFrame(u16),
    /// Synthetic: `Helper::exit_frame()` before a method exit (spec §4.4).
    ExitFrame,
    /// Synthetic: stands in for spec §4.2's "check the caught value
    /// against the VM-internal marker types and rethrow unconditionally
    /// if matched" dispatch prepended to every exception handler. A
    /// single marker rather than the real conditional-rethrow sequence,
    /// since this IR has no opcode for branching on an object's runtime
    /// type.
    GuardControlFlowMarkers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start_pc: usize,
    pub end_pc: usize,
    pub handler_pc: usize,
    /// `None` means catch-all (`finally`-style).
    pub catch_type: Option<String>,
}

impl Opcode {
    /// True when this instruction always ends the current basic block.
    pub fn ends_block(&self) -> bool {
        self.is_invoke()
            || matches!(
                self,
                Opcode::Goto(_)
                    | Opcode::IfEq(_)
                    | Opcode::Return
                    | Opcode::AReturn
                    | Opcode::IReturn
                    | Opcode::Athrow
            )
    }

    /// Absolute index of the instruction this opcode can jump to, if any.
    pub fn branch_target(&self, _at: usize) -> Option<usize> {
        match self {
            Opcode::Goto(t) | Opcode::IfEq(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_allocation(&self) -> bool {
        matches!(self, Opcode::New(_) | Opcode::NewArray(_) | Opcode::AnewArray(_))
    }

    pub fn is_invoke(&self) -> bool {
        matches!(
            self,
            Opcode::InvokeVirtual(_) | Opcode::InvokeSpecial(_) | Opcode::InvokeStatic(_)
        )
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self, Opcode::FAdd | Opcode::DAdd)
    }
}
