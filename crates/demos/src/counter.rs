//! A persistent-state DApp, exercising the store round-trip
//! (`ReflectCodec::load_statics`/`save_statics`) end to end through
//! `DappExecutor::run_tx` rather than against `persistence` fixtures
//! directly — the diamond-graph identity/reentrancy invariants (spec §8
//! scenarios 3-4) are covered at that lower level instead (see
//! `persistence`'s own tests); this demo only needs one scalar static to
//! show a later transaction observing an earlier one's write.

use avm::{entry_point, StaticRoot, TransformedDapp};
use avm_types::InstanceId;
use classfile::opcode::Opcode;
use classfile::{ClassFile, ConstantPool, ConstantPoolEntry, Descriptor, Field, Method, MethodDescriptor};
use persistence::{FieldSlot, FieldSlotMut, PrimitiveValue, Shadow, ShadowHeader};
use std::rc::Rc;

const MAIN_CLASS: &str = "demos/Counter";

struct Count {
    header: ShadowHeader,
    value: PrimitiveValue,
}

fn factory() -> Box<dyn Shadow> {
    Box::new(Count {
        header: ShadowHeader::new(InstanceId(0)),
        value: PrimitiveValue::Int(0),
    })
}

impl Shadow for Count {
    fn header(&self) -> &ShadowHeader {
        &self.header
    }
    fn header_mut(&mut self) -> &mut ShadowHeader {
        &mut self.header
    }
    fn class_name(&self) -> &'static str {
        MAIN_CLASS
    }
    fn fields(&self) -> Vec<FieldSlot> {
        vec![FieldSlot::Primitive(self.value)]
    }
    fn fields_mut(&mut self) -> Vec<FieldSlotMut<'_>> {
        vec![FieldSlotMut::Primitive(&mut self.value)]
    }
}

/// The raw main class: a declared static `count` field, and a `run`
/// method whose body is the read-then-write of it (spec §4.3's field
/// access cost) — the `EntryPoint` closure below does the actual
/// arithmetic against `ctx.statics` through the `Shadow` surface.
fn raw_class() -> ClassFile {
    let mut cp = ConstantPool::new();
    let field_ref = cp.push(ConstantPoolEntry::FieldRef {
        owner: MAIN_CLASS.into(),
        name: "count".into(),
        descriptor: "I".into(),
    });
    ClassFile {
        this_class: MAIN_CLASS.into(),
        super_class: None,
        interfaces: vec![],
        constant_pool: cp,
        fields: vec![Field {
            name: "count".into(),
            descriptor: Descriptor::Primitive('I'),
            is_static: true,
            is_synthetic: false,
        }],
        methods: vec![Method {
            name: "run".into(),
            descriptor: MethodDescriptor { params: vec![], ret: Some(Descriptor::Primitive('I')) },
            code: vec![Opcode::GetStatic(field_ref), Opcode::PutStatic(field_ref), Opcode::IReturn],
            exception_table: vec![],
            is_native: false,
            max_stack: 1,
        }],
        is_manual_serializer: false,
        signature: None,
    }
}

/// `input` is a single 4-byte big-endian `i32` delta; the method adds it
/// to the persisted count and returns the new total, also as 4 bytes.
pub fn dapp() -> Rc<TransformedDapp> {
    let root = StaticRoot {
        class_name: MAIN_CLASS,
        field_name: "count",
        factory,
    };
    Rc::new(
        TransformedDapp::from_source(
            MAIN_CLASS.into(),
            vec![raw_class()],
            vec![root],
            entry_point(|ctx, input| {
                let delta = i32::from_be_bytes(input.try_into().expect("caller supplies a 4-byte delta"));
                let slot = ctx.statics.get_mut(0).expect("one static root declared");
                let mut fields = slot.fields_mut();
                let FieldSlotMut::Primitive(value) = fields.remove(0) else {
                    panic!("count field is declared primitive");
                };
                let PrimitiveValue::Int(current) = *value else {
                    panic!("count field is declared int");
                };
                let updated = current.wrapping_add(delta);
                *value = PrimitiveValue::Int(updated);
                updated.to_be_bytes().to_vec()
            }),
        )
        .expect("demos/Counter transforms cleanly"),
    )
}
