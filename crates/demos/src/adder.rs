//! Spec §8 scenario 2: "contract `add(int a, int b) -> int`", wired
//! through the crate's big-endian fixed-width integer encoding (§6).

use avm::{entry_point, TransformedDapp};
use classfile::opcode::Opcode;
use classfile::{ClassFile, ConstantPool, ConstantPoolEntry, Descriptor, Field, Method, MethodDescriptor};
use std::rc::Rc;

const MAIN_CLASS: &str = "demos/Adder";

/// `input` is two 4-byte big-endian `i32`s back to back; the method has
/// no declared statics, so every call is independent (spec §8 scenario 2
/// asks for determinism across repeated calls, not persisted state).
fn add(input: &[u8]) -> Vec<u8> {
    let a = i32::from_be_bytes(input[0..4].try_into().expect("caller supplies two 4-byte ints"));
    let b = i32::from_be_bytes(input[4..8].try_into().expect("caller supplies two 4-byte ints"));
    a.wrapping_add(b).to_be_bytes().to_vec()
}

/// The raw main class: a `run` method whose body invokes the (static,
/// unimplemented-in-bytecode) `addInts` helper — standing in for the
/// real two-operand addition the `EntryPoint` closure below actually
/// performs — plus a declared `[I` history field purely to give
/// `TransformedDapp::from_source`'s array-wrapper scan (spec §4.5)
/// something real to synthesize against.
fn raw_class() -> ClassFile {
    let mut cp = ConstantPool::new();
    let add_ref = cp.push(ConstantPoolEntry::MethodRef {
        owner: MAIN_CLASS.into(),
        name: "addInts".into(),
        descriptor: "(II)I".into(),
    });
    ClassFile {
        this_class: MAIN_CLASS.into(),
        super_class: None,
        interfaces: vec![],
        constant_pool: cp,
        fields: vec![Field {
            name: "history".into(),
            descriptor: Descriptor::Array(Box::new(Descriptor::Primitive('I'))),
            is_static: false,
            is_synthetic: false,
        }],
        methods: vec![Method {
            name: "run".into(),
            descriptor: MethodDescriptor { params: vec![], ret: Some(Descriptor::Primitive('I')) },
            code: vec![Opcode::InvokeStatic(add_ref), Opcode::IReturn],
            exception_table: vec![],
            is_native: false,
            max_stack: 2,
        }],
        is_manual_serializer: false,
        signature: None,
    }
}

pub fn dapp() -> Rc<TransformedDapp> {
    Rc::new(
        TransformedDapp::from_source(
            MAIN_CLASS.into(),
            vec![raw_class()],
            Vec::new(),
            entry_point(|_ctx, input| add(input)),
        )
        .expect("demos/Adder transforms cleanly"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_two_big_endian_ints() {
        let mut input = 42i32.to_be_bytes().to_vec();
        input.extend_from_slice(&13i32.to_be_bytes());
        assert_eq!(add(&input), 55i32.to_be_bytes().to_vec());
    }

    #[test]
    fn main_method_carries_an_invoke_cost_charge() {
        let dapp = dapp();
        let method = dapp.main_method().expect("main class has a method");
        assert!(method.code.iter().any(|op| matches!(op, Opcode::ChargeEnergy(_))));
    }

    #[test]
    fn an_array_wrapper_is_synthesized_for_the_history_field() {
        let dapp = dapp();
        assert!(dapp.classes.keys().any(|name| name.starts_with("shadow/array/")));
    }
}
