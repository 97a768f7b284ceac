//! §5.8 The transform pipeline: an explicit ordered composition of passes,
//! not a dynamic visitor chain (spec §9). `transform_chain` is the single
//! entry point the DApp executor's load path calls once per class, ahead
//! of execution.

use crate::array_wrapper::ArrayWrapperCache;
use crate::class_metering::{meter_class, OpcodeCostTable, SizeTable};
use crate::exception_wrapping::wrap_exceptions;
use crate::stack_tracking::{track_stack, DEFAULT_STACK_CEILING};
use crate::type_name_mapper::map_class_file;
use crate::validator::{validate, ValidationError};
use classfile::{ClassFile, HierarchyForest};
use std::collections::HashMap;

/// Shared state the chain threads through every class in a DApp: the cost
/// table, the hierarchy forest built once for the whole package, the
/// memoized object-size table, the array wrapper cache, and the stack
/// ceiling. Grounded on the teacher's `Program`/`Compiler` context structs
/// that carry shared tables across a whole translation unit rather than
/// recomputing them per function.
pub struct TransformContext {
    pub costs: OpcodeCostTable,
    pub forest: HierarchyForest,
    pub sizes: SizeTable,
    pub array_wrappers: ArrayWrapperCache,
    pub stack_ceiling: u16,
}

impl TransformContext {
    /// Builds the forest and pre-computes every declared class's object
    /// size up front: `meter_class`'s mandated signature (spec §5.4) takes
    /// `&SizeTable` immutably, so the whole DApp's parent-chain walk has to
    /// happen here, once, rather than lazily during metering.
    pub fn new(classes: &[ClassFile]) -> Self {
        let forest = HierarchyForest::build(classes);
        let by_name: HashMap<String, ClassFile> = classes
            .iter()
            .map(|cf| (cf.this_class.clone(), cf.clone()))
            .collect();

        let mut sizes = SizeTable::new();
        for cf in classes {
            sizes.size_of(&cf.this_class, &by_name, &forest);
        }

        Self {
            costs: OpcodeCostTable::default(),
            forest,
            sizes,
            array_wrappers: ArrayWrapperCache::new(),
            stack_ceiling: DEFAULT_STACK_CEILING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    Validation(ValidationError),
}

impl core::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PipelineError::Validation(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ValidationError> for PipelineError {
    fn from(e: ValidationError) -> Self {
        PipelineError::Validation(e)
    }
}

/// Runs one class through the full pipeline: validate the untrusted input,
/// map type names, wrap exceptions, splice metering charges, splice
/// stack-tracking frame calls, then validate the transformed output once
/// more (spec §5.8: "the validator runs before the chain, as well as once
/// more after"). Returns the fully rewritten `ClassFile` — every pass
/// mutates `code` in place rather than producing a side report.
/// `classes` is accepted for callers that still need the whole DApp's
/// class map at the call site; the chain itself only needs what `ctx`
/// already carries (the hierarchy forest and the pre-computed size table).
pub fn transform_chain(
    raw: ClassFile,
    _classes: &HashMap<String, ClassFile>,
    ctx: &mut TransformContext,
) -> Result<ClassFile, PipelineError> {
    validate(&raw)?;

    let mapped = map_class_file(&raw);
    let wrapped = wrap_exceptions(&mapped);
    let metered = meter_class(&wrapped, &ctx.costs, &ctx.forest, &ctx.sizes);
    let tracked = track_stack(&metered, ctx.stack_ceiling);

    validate(&tracked)?;

    Ok(tracked)
}

/// Ensures an array wrapper class exists for `element`, synthesizing and
/// caching it on first use (spec §4.5). Called once per array type
/// encountered while transforming a DApp's classes, ahead of the chain.
pub fn ensure_array_wrapper<'a>(
    ctx: &'a mut TransformContext,
    element: &classfile::Descriptor,
) -> &'a ClassFile {
    ctx.array_wrappers.get_or_synth(element)
}
