//! §4.2 Exception wrapping: splices a box call before every throw site
//! and a control-flow-marker guard at every handler's entry.

use crate::ControlFlowKind;
use classfile::opcode::Opcode;
use classfile::{splice_with_remap, ClassFile, ConstantPool, ConstantPoolEntry};

const BOX_METHOD_OWNER: &str = "shadow/lang/ThrowableWrapper";
const BOX_METHOD_NAME: &str = "box";
const BOX_METHOD_DESCRIPTOR: &str = "(Lshadow/lang/Object;)Lshadow/lang/Object;";

fn find_or_push_box_method_ref(cp: &mut ConstantPool) -> u16 {
    for (idx, entry) in cp.iter() {
        if let ConstantPoolEntry::MethodRef { owner, name, .. } = entry {
            if owner == BOX_METHOD_OWNER && name == BOX_METHOD_NAME {
                return idx;
            }
        }
    }
    cp.push(ConstantPoolEntry::MethodRef {
        owner: BOX_METHOD_OWNER.into(),
        name: BOX_METHOD_NAME.into(),
        descriptor: BOX_METHOD_DESCRIPTOR.into(),
    })
}

/// For every `Athrow`, splices a synthetic `InvokeStatic` to
/// `shadow/lang/ThrowableWrapper::box` immediately before it. For every
/// exception handler, splices a `GuardControlFlowMarkers` at its
/// `handler_pc` — standing in for "check the caught value against the
/// VM-internal marker types and rethrow unconditionally if matched"
/// (spec §4.2); see `Opcode::GuardControlFlowMarkers`'s doc comment for
/// why this is one marker rather than the real conditional dispatch.
pub fn wrap_exceptions(cf: &ClassFile) -> ClassFile {
    let mut out = cf.clone();
    let mut cp = out.constant_pool.clone();
    let box_ref = find_or_push_box_method_ref(&mut cp);

    for method in out.methods.iter_mut() {
        if method.code.is_empty() {
            continue;
        }

        let mut insertions: Vec<(usize, Vec<Opcode>)> = Vec::new();
        for (i, op) in method.code.iter().enumerate() {
            if matches!(op, Opcode::Athrow) {
                insertions.push((i, vec![Opcode::InvokeStatic(box_ref)]));
            }
        }
        for handler in &method.exception_table {
            insertions.push((handler.handler_pc, vec![Opcode::GuardControlFlowMarkers]));
        }

        let (new_code, new_handlers) = splice_with_remap(&method.code, &insertions, &method.exception_table);
        method.code = new_code;
        method.exception_table = new_handlers;
    }

    out.constant_pool = cp;
    out
}

/// Whether `catch_type` names one of the closed set of VM-internal
/// control-flow marker types a handler must unconditionally rethrow
/// before reaching user code (spec §4.2).
pub fn is_control_flow_marker(catch_type: &str) -> bool {
    ControlFlowKind::ALL
        .iter()
        .any(|k| k.marker_class() == catch_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use classfile::opcode::ExceptionHandler;
    use classfile::{Method, MethodDescriptor};

    fn method_with_throw() -> Method {
        Method {
            name: "run".into(),
            descriptor: MethodDescriptor { params: vec![], ret: None },
            code: vec![Opcode::Athrow, Opcode::Nop],
            exception_table: vec![ExceptionHandler {
                start_pc: 0,
                end_pc: 1,
                handler_pc: 1,
                catch_type: Some("app/MyException".into()),
            }],
            is_native: false,
            max_stack: 1,
        }
    }

    fn class_with(methods: Vec<Method>) -> ClassFile {
        ClassFile {
            this_class: "app/X".into(),
            super_class: None,
            interfaces: vec![],
            constant_pool: ConstantPool::new(),
            fields: vec![],
            methods,
            is_manual_serializer: false,
            signature: None,
        }
    }

    #[test]
    fn splices_a_box_call_before_every_athrow() {
        let cf = class_with(vec![method_with_throw()]);
        let wrapped = wrap_exceptions(&cf);
        let code = &wrapped.methods[0].code;
        assert!(matches!(code[0], Opcode::InvokeStatic(_)));
        assert_eq!(code[1], Opcode::Athrow);
        let Opcode::InvokeStatic(idx) = code[0] else { unreachable!() };
        assert_eq!(
            wrapped.constant_pool.get(idx),
            Some(&ConstantPoolEntry::MethodRef {
                owner: BOX_METHOD_OWNER.into(),
                name: BOX_METHOD_NAME.into(),
                descriptor: BOX_METHOD_DESCRIPTOR.into(),
            })
        );
    }

    #[test]
    fn splices_a_guard_at_every_handler_pc() {
        let cf = class_with(vec![method_with_throw()]);
        let wrapped = wrap_exceptions(&cf);
        let handler = &wrapped.methods[0].exception_table[0];
        assert_eq!(wrapped.methods[0].code[handler.handler_pc], Opcode::GuardControlFlowMarkers);
    }

    #[test]
    fn reuses_the_same_box_method_ref_across_methods() {
        let cf = class_with(vec![method_with_throw(), method_with_throw()]);
        let wrapped = wrap_exceptions(&cf);
        let Opcode::InvokeStatic(a) = wrapped.methods[0].code[0] else { unreachable!() };
        let Opcode::InvokeStatic(b) = wrapped.methods[1].code[0] else { unreachable!() };
        assert_eq!(a, b);
    }

    #[test]
    fn recognizes_every_control_flow_marker() {
        for kind in ControlFlowKind::ALL {
            assert!(is_control_flow_marker(kind.marker_class()));
        }
        assert!(!is_control_flow_marker("app/MyException"));
    }
}
