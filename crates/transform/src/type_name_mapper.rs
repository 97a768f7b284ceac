//! §4.1 Type-name mapper.

use crate::SHADOW_METHOD_PREFIX;
use classfile::constant_pool::ConstantPoolEntry;
use classfile::descriptor::{
    map_method_references, map_references, parse_descriptor, parse_method_descriptor,
    render_descriptor, render_method_descriptor,
};
use classfile::opcode::Opcode;
use classfile::{ClassFile, Field, Method, HOST_LANG_ROOT, SHADOW_LANG_ROOT};

fn rewrite_name(name: &str) -> String {
    if name == HOST_LANG_ROOT || name.starts_with(&format!("{HOST_LANG_ROOT}/")) {
        name.replacen(HOST_LANG_ROOT, SHADOW_LANG_ROOT, 1)
    } else {
        name.to_string()
    }
}

fn is_host_rooted(name: &str) -> bool {
    name == HOST_LANG_ROOT || name.starts_with(&format!("{HOST_LANG_ROOT}/"))
}

fn rewrite_method_name(owner: &str, name: &str) -> String {
    if is_host_rooted(owner) && name != "<init>" && name != "<clinit>" {
        format!("{SHADOW_METHOD_PREFIX}{name}")
    } else {
        name.to_string()
    }
}

/// Rewrites a single descriptor string through the token parser, per
/// spec §4.1 ("parsed token-by-token ... both parameter and return types
/// are rewritten"). Exposed standalone because it is also the subject of
/// the idempotency/undo property tests in spec §8.
pub fn rewrite_field_descriptor(descriptor: &str) -> String {
    let d = parse_descriptor(descriptor).expect("malformed field descriptor");
    render_descriptor(&map_references(&d, &rewrite_name))
}

pub fn rewrite_method_descriptor(descriptor: &str) -> String {
    let d = parse_method_descriptor(descriptor).expect("malformed method descriptor");
    render_method_descriptor(&map_method_references(&d, &rewrite_name))
}

/// Transforms every reference to a host runtime type into its shadow
/// counterpart, and applies the reserved-marker prefix to invocations
/// whose owner lives in the host root (spec §4.1).
pub fn map_class_file(cf: &ClassFile) -> ClassFile {
    let mut out = cf.clone();
    out.super_class = out.super_class.map(|s| rewrite_name(&s));
    out.interfaces = out.interfaces.into_iter().map(|i| rewrite_name(&i)).collect();
    out.signature = None; // advisory attribute, always dropped.

    let mut constant_pool = out.constant_pool.clone();
    for (idx, entry) in cf.constant_pool.iter() {
        let rewritten = match entry {
            ConstantPoolEntry::ClassRef(name) => Some(ConstantPoolEntry::ClassRef(rewrite_name(name))),
            ConstantPoolEntry::FieldRef { owner, name, descriptor } => Some(ConstantPoolEntry::FieldRef {
                owner: rewrite_name(owner),
                name: name.clone(),
                descriptor: rewrite_field_descriptor(descriptor),
            }),
            ConstantPoolEntry::MethodRef { owner, name, descriptor } => Some(ConstantPoolEntry::MethodRef {
                owner: rewrite_name(owner),
                name: rewrite_method_name(owner, name),
                descriptor: rewrite_method_descriptor(descriptor),
            }),
            ConstantPoolEntry::MethodHandle | ConstantPoolEntry::InvokeDynamic => {
                panic!("type-name mapper: method-handle/invoke-dynamic constants are fatal (spec §4.1)")
            }
            _ => None,
        };
        if let Some(rewritten) = rewritten {
            constant_pool.replace(idx, rewritten);
        }
    }
    out.constant_pool = constant_pool;

    out.fields = cf
        .fields
        .iter()
        .map(|f| Field {
            name: f.name.clone(),
            descriptor: map_references(&f.descriptor, &rewrite_name),
            is_static: f.is_static,
            is_synthetic: f.is_synthetic,
        })
        .collect();

    out.methods = cf
        .methods
        .iter()
        .map(|m| Method {
            name: m.name.clone(),
            descriptor: map_method_references(&m.descriptor, &rewrite_name),
            code: rewrite_code(&m.code),
            exception_table: m.exception_table.clone(),
            is_native: m.is_native,
            max_stack: m.max_stack,
        })
        .collect();

    out
}

fn rewrite_code(code: &[Opcode]) -> Vec<Opcode> {
    for op in code {
        if matches!(op, Opcode::InvokeDynamic(_)) {
            panic!("type-name mapper: invoke-dynamic site is fatal (spec §4.1)");
        }
        if matches!(op, Opcode::ArraySort) {
            panic!("type-name mapper: array sort within constants is unimplemented (spec §4.1)");
        }
    }
    code.to_vec()
}
