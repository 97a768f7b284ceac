//! In-memory class-file IR consumed by the `transform` pipeline.
//!
//! Real `.class` byte parsing is out of scope (SPEC_FULL.md §0): this IR
//! *is* the class file for every purpose the transformation chain needs.
//! The shape (constant pool, fields, methods-as-instruction-vectors) and
//! the "walk the stream instruction by instruction" style are grounded on
//! the teacher's `vm::decoder`/`vm::instruction`/`vm::isa`.

pub mod constant_pool;
pub mod descriptor;
pub mod hierarchy;
pub mod opcode;

pub use constant_pool::{ConstantPool, ConstantPoolEntry};
pub use descriptor::{Descriptor, MethodDescriptor};
pub use hierarchy::HierarchyForest;
pub use opcode::{ExceptionHandler, Opcode};

pub const HOST_LANG_ROOT: &str = "java/lang";
pub const SHADOW_LANG_ROOT: &str = "shadow/lang";
pub const SHADOW_ROOT_CLASS: &str = "shadow/lang/Object";
pub const VM_PACKAGE_PREFIXES: [&str; 2] = ["avm/", "shadow/internal/"];

/// One static or instance field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub descriptor: Descriptor,
    pub is_static: bool,
    pub is_synthetic: bool,
}

/// One method: name, descriptor, and its body as a flat instruction vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub code: Vec<Opcode>,
    pub exception_table: Vec<ExceptionHandler>,
    pub is_native: bool,
    pub max_stack: u16,
}

impl Method {
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>" || self.name == "<clinit>"
    }
}

/// One class: the unit the `transform` pipeline rewrites pass by pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub constant_pool: ConstantPool,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    /// spec §4.6: "stopping when a class declares itself manual" — the
    /// automatic field-reflection walk stops at such a class and hands
    /// control to its own manual (de)serializer.
    pub is_manual_serializer: bool,
    /// Signature attributes are advisory; the type-name mapper always nulls
    /// this out (spec §4.1).
    pub signature: Option<String>,
}

impl ClassFile {
    /// Statics declared directly on this class, in declaration order
    /// (spec §3 "declared field order").
    pub fn static_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_static)
    }

    pub fn instance_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.is_static)
    }
}

/// Splits a method body into basic blocks: a block ends after any
/// branch/return/athrow/invoke instruction, or immediately before any
/// instruction that is the target of some branch. Grounded on the
/// teacher's `vm::decoder` style of walking an instruction stream
/// position by position rather than building a full CFG object graph.
pub fn basic_blocks(code: &[Opcode]) -> Vec<core::ops::Range<usize>> {
    if code.is_empty() {
        return Vec::new();
    }

    let mut targets = std::collections::BTreeSet::new();
    for (i, op) in code.iter().enumerate() {
        if let Some(target) = op.branch_target(i) {
            targets.insert(target);
        }
    }

    let mut starts = std::collections::BTreeSet::new();
    starts.insert(0usize);
    for (i, op) in code.iter().enumerate() {
        if op.ends_block() && i + 1 < code.len() {
            starts.insert(i + 1);
        }
    }
    starts.extend(targets.into_iter().filter(|&t| t < code.len()));

    let mut starts: Vec<usize> = starts.into_iter().collect();
    starts.sort_unstable();

    let mut blocks = Vec::with_capacity(starts.len());
    for (idx, &start) in starts.iter().enumerate() {
        let end = starts.get(idx + 1).copied().unwrap_or(code.len());
        blocks.push(start..end);
    }
    blocks
}

/// Inserts `insertions` (each an original-code index and the opcodes to
/// place immediately before it; an index equal to `code.len()` appends
/// at the end) into `code`, then remaps every `Goto`/`IfEq` branch target
/// and every exception handler's `start_pc`/`end_pc`/`handler_pc`. A
/// target that pointed at an original instruction now lands on whatever
/// was inserted directly before it, if anything — jumping straight into
/// a metered block or a guarded handler must still run its charge/guard,
/// not skip past it. Shared by every `transform` pass that splices
/// synthetic opcodes into a method body (spec §4.3/§4.4/§4.2) rather than
/// each pass reimplementing index bookkeeping.
pub fn splice_with_remap(
    code: &[Opcode],
    insertions: &[(usize, Vec<Opcode>)],
    handlers: &[opcode::ExceptionHandler],
) -> (Vec<Opcode>, Vec<opcode::ExceptionHandler>) {
    let mut by_index: std::collections::HashMap<usize, Vec<Opcode>> = std::collections::HashMap::new();
    for (at, ops) in insertions {
        by_index.entry(*at).or_default().extend(ops.iter().cloned());
    }

    let mut new_code = Vec::with_capacity(code.len());
    let mut old_to_new = vec![0usize; code.len() + 1];
    for old_index in 0..=code.len() {
        // Record the target position *before* inserting: a branch or
        // handler that targeted this original instruction must land on
        // whatever now comes first here, inserted charge/guard opcodes
        // included, so jumping straight into a block can't skip its
        // charge.
        old_to_new[old_index] = new_code.len();
        if let Some(ops) = by_index.get(&old_index) {
            new_code.extend(ops.iter().cloned());
        }
        if old_index < code.len() {
            new_code.push(code[old_index].clone());
        }
    }

    for op in new_code.iter_mut() {
        match op {
            Opcode::Goto(t) | Opcode::IfEq(t) => *t = old_to_new[*t],
            _ => {}
        }
    }

    let new_handlers = handlers
        .iter()
        .map(|h| opcode::ExceptionHandler {
            start_pc: old_to_new[h.start_pc],
            end_pc: old_to_new[h.end_pc],
            handler_pc: old_to_new[h.handler_pc],
            catch_type: h.catch_type.clone(),
        })
        .collect();

    (new_code, new_handlers)
}
