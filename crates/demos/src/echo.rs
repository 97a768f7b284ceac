//! Spec §8 scenario 1: "deploy a contract whose method `echo(bytes)`
//! returns its input".

use avm::{entry_point, TransformedDapp};
use classfile::opcode::Opcode;
use classfile::{ClassFile, ConstantPool, Method, MethodDescriptor};
use std::rc::Rc;

const MAIN_CLASS: &str = "demos/Echo";

/// The raw main class: a single `run` method whose body does nothing
/// beyond returning, so `TransformedDapp::from_source` still runs it
/// through the real pipeline (wrap/meter/track) even though there's no
/// business logic for the transform passes to act on here — the
/// `EntryPoint` closure below carries that instead (spec §0).
fn raw_class() -> ClassFile {
    ClassFile {
        this_class: MAIN_CLASS.into(),
        super_class: None,
        interfaces: vec![],
        constant_pool: ConstantPool::new(),
        fields: vec![],
        methods: vec![Method {
            name: "run".into(),
            descriptor: MethodDescriptor { params: vec![], ret: None },
            code: vec![Opcode::Return],
            exception_table: vec![],
            is_native: false,
            max_stack: 0,
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
            entry_point(|_ctx, input| input.to_vec()),
        )
        .expect("demos/Echo transforms cleanly"),
    )
}
