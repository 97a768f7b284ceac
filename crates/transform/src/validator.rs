//! Validator: rejects disallowed opcodes, reserved package names, native
//! methods, and malformed class files.

use classfile::opcode::Opcode;
use classfile::{basic_blocks, ClassFile, VM_PACKAGE_PREFIXES};
use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    DisallowedOpcode { method: String, opcode: &'static str },
    ReservedPackage { class: String },
    NativeMethod { method: String },
    UnreachableCode { method: String, index: usize },
    DanglingConstantPoolIndex { method: String, opcode_index: usize, cp_index: u16 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DisallowedOpcode { method, opcode } => {
                write!(f, "method `{method}` uses disallowed opcode `{opcode}`")
            }
            ValidationError::ReservedPackage { class } => {
                write!(f, "class `{class}` uses a VM-reserved package name")
            }
            ValidationError::NativeMethod { method } => {
                write!(f, "method `{method}` is native, which is not permitted in a DApp")
            }
            ValidationError::UnreachableCode { method, index } => {
                write!(f, "method `{method}` has unreachable code at index {index}")
            }
            ValidationError::DanglingConstantPoolIndex { method, opcode_index, cp_index } => {
                write!(
                    f,
                    "method `{method}` instruction {opcode_index} references missing constant pool entry {cp_index}"
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

fn opcode_cp_index(op: &Opcode) -> Option<u16> {
    match op {
        Opcode::Ldc(i)
        | Opcode::New(i)
        | Opcode::AnewArray(i)
        | Opcode::GetField(i)
        | Opcode::PutField(i)
        | Opcode::GetStatic(i)
        | Opcode::PutStatic(i)
        | Opcode::InvokeVirtual(i)
        | Opcode::InvokeSpecial(i)
        | Opcode::InvokeStatic(i)
        | Opcode::InvokeDynamic(i) => Some(*i),
        _ => None,
    }
}

fn opcode_name(op: &Opcode) -> &'static str {
    match op {
        Opcode::InvokeDynamic(_) => "invokedynamic",
        Opcode::ArraySort => "arraysort",
        Opcode::FAdd => "fadd",
        Opcode::DAdd => "dadd",
        _ => "unknown",
    }
}

pub fn validate(cf: &ClassFile) -> Result<(), ValidationError> {
    if VM_PACKAGE_PREFIXES.iter().any(|p| cf.this_class.starts_with(p)) {
        return Err(ValidationError::ReservedPackage {
            class: cf.this_class.clone(),
        });
    }

    for method in &cf.methods {
        if method.is_native {
            return Err(ValidationError::NativeMethod {
                method: format!("{}::{}", cf.this_class, method.name),
            });
        }

        for (i, op) in method.code.iter().enumerate() {
            if matches!(op, Opcode::InvokeDynamic(_) | Opcode::ArraySort | Opcode::FAdd | Opcode::DAdd) {
                return Err(ValidationError::DisallowedOpcode {
                    method: format!("{}::{}", cf.this_class, method.name),
                    opcode: opcode_name(op),
                });
            }
            if let Some(cp_index) = opcode_cp_index(op) {
                if cf.constant_pool.get(cp_index).is_none() {
                    return Err(ValidationError::DanglingConstantPoolIndex {
                        method: format!("{}::{}", cf.this_class, method.name),
                        opcode_index: i,
                        cp_index,
                    });
                }
            }
        }

        if method.code.is_empty() {
            continue;
        }
        let blocks = basic_blocks(&method.code);
        let last_block = blocks.last().expect("non-empty code has at least one block");
        let last_op = &method.code[last_block.end - 1];
        let terminates = matches!(
            last_op,
            Opcode::Return | Opcode::AReturn | Opcode::IReturn | Opcode::Athrow | Opcode::Goto(_)
        );
        if !terminates {
            return Err(ValidationError::UnreachableCode {
                method: format!("{}::{}", cf.this_class, method.name),
                index: last_block.end - 1,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use classfile::{ConstantPool, ConstantPoolEntry, Method, MethodDescriptor};

    fn class(this_class: &str, methods: Vec<Method>) -> ClassFile {
        let mut cp = ConstantPool::new();
        cp.push(ConstantPoolEntry::Utf8("placeholder".into()));
        ClassFile {
            this_class: this_class.into(),
            super_class: None,
            interfaces: vec![],
            constant_pool: cp,
            fields: vec![],
            methods,
            is_manual_serializer: false,
            signature: None,
        }
    }

    fn method(code: Vec<Opcode>) -> Method {
        Method {
            name: "run".into(),
            descriptor: MethodDescriptor { params: vec![], ret: None },
            code,
            exception_table: vec![],
            is_native: false,
            max_stack: 1,
        }
    }

    #[test]
    fn accepts_well_formed_class() {
        let cf = class("app/X", vec![method(vec![Opcode::Nop, Opcode::Return])]);
        assert!(validate(&cf).is_ok());
    }

    #[test]
    fn rejects_reserved_package() {
        let cf = class("avm/Evil", vec![]);
        assert_eq!(
            validate(&cf),
            Err(ValidationError::ReservedPackage { class: "avm/Evil".into() })
        );
    }

    #[test]
    fn rejects_native_methods() {
        let mut m = method(vec![Opcode::Return]);
        m.is_native = true;
        let cf = class("app/X", vec![m]);
        assert!(matches!(validate(&cf), Err(ValidationError::NativeMethod { .. })));
    }

    #[test]
    fn rejects_invoke_dynamic() {
        let cf = class("app/X", vec![method(vec![Opcode::InvokeDynamic(0)])]);
        assert!(matches!(validate(&cf), Err(ValidationError::DisallowedOpcode { .. })));
    }

    #[test]
    fn rejects_dangling_constant_pool_index() {
        let cf = class("app/X", vec![method(vec![Opcode::New(99), Opcode::Return])]);
        assert!(matches!(
            validate(&cf),
            Err(ValidationError::DanglingConstantPoolIndex { .. })
        ));
    }

    #[test]
    fn rejects_method_body_not_ending_in_a_terminator() {
        let cf = class("app/X", vec![method(vec![Opcode::Nop])]);
        assert!(matches!(validate(&cf), Err(ValidationError::UnreachableCode { .. })));
    }
}
