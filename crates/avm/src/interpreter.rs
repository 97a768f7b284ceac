//! §0/§5.5 execution substrate: walks a transformed method's synthetic
//! metering/stack-tracking opcodes against the live `Helper`, immediately
//! ahead of the `EntryPoint` closure that does the DApp's actual
//! business-logic dispatch (see `dapp`'s module doc for the split between
//! the two). Grounded on the teacher's `vm::decoder`'s "walk the
//! instruction stream position by position" style, narrowed to only the
//! opcodes the transform pipeline's passes actually insert.

use crate::helper::Helper;
use crate::ControlFlowException;
use avm_types::Energy;
use classfile::opcode::Opcode;
use classfile::Method;

/// Runs every `ChargeEnergy`/`ChargeAllocation`/`EnterFrame`/`ExitFrame`
/// in `method.code` against `helper`, in order, so the metering and
/// stack-tracking passes (spec §4.3/§4.4) have a real caller rather than
/// only their own unit tests. Every other opcode — including
/// `GuardControlFlowMarkers`, `Goto`, `IfEq`, and anything an
/// `EntryPoint` closure's own dispatch logic stands in for — is a no-op
/// pass-through here: there is no operand stack to drive a real branch
/// decision, so a conditional is always treated as not taken.
pub fn run_instrumented(method: &Method, helper: &mut Helper) -> Result<(), ControlFlowException> {
    for op in &method.code {
        match op {
            Opcode::ChargeEnergy(amount) => helper.charge_energy(Energy(*amount))?,
            Opcode::ChargeAllocation(bytes) => helper.charge_allocation(*bytes)?,
            Opcode::EnterFrame(_ceiling) => helper.enter_frame()?,
            Opcode::ExitFrame => helper.exit_frame(),
            _ => {}
        }
    }
    Ok(())
}
