//! §4.5 Array wrapper generator: synthesizes wrapper classes replacing
//! host primitive/reference arrays so length/element access can be
//! metered and arrays participate in the persistence protocol.

use crate::class_metering::ARRAY_HEADER_BYTES;
use classfile::descriptor::render_descriptor;
use classfile::{ClassFile, ConstantPool, Descriptor, Field, Method, MethodDescriptor, SHADOW_ROOT_CLASS};
use std::collections::HashMap;

fn mangle(element: &Descriptor) -> String {
    render_descriptor(element)
        .replace('/', "_")
        .replace(';', "")
        .replace('[', "arr_")
        .replace('L', "ref_")
}

fn element_size(element: &Descriptor) -> u32 {
    match element {
        Descriptor::Primitive('J') | Descriptor::Primitive('D') => 8,
        Descriptor::Primitive('C') | Descriptor::Primitive('S') => 2,
        Descriptor::Primitive('Z') | Descriptor::Primitive('B') => 1,
        Descriptor::Primitive(_) => 4, // I, F
        Descriptor::Reference(_) | Descriptor::Array(_) => 8,
    }
}

/// Synthesizes `shadow/array/<mangled-element>`: a `length` field, a
/// hidden backing `data` field, and `length()`/`get(i)`/`set(i, v)`
/// methods. The constructor's allocation charge (`header + length *
/// element_size`) is realized the same way `class_metering` realizes
/// other allocation charges — as a `Charge::Allocation` the pipeline
/// splices in, keyed off the synthesized class's own size table entry.
pub fn synth_array_wrapper(element: &Descriptor) -> ClassFile {
    let name = format!("shadow/array/{}", mangle(element));
    let length_field = Field {
        name: "length".into(),
        descriptor: Descriptor::Primitive('I'),
        is_static: false,
        is_synthetic: false,
    };
    let data_field = Field {
        name: "data".into(),
        descriptor: Descriptor::Array(Box::new(element.clone())),
        is_static: false,
        is_synthetic: true,
    };

    let ctor = Method {
        name: "<init>".into(),
        descriptor: MethodDescriptor {
            params: vec![Descriptor::Primitive('I')],
            ret: None,
        },
        code: vec![],
        exception_table: vec![],
        is_native: false,
        max_stack: 2,
    };
    let length_method = Method {
        name: "length".into(),
        descriptor: MethodDescriptor { params: vec![], ret: Some(Descriptor::Primitive('I')) },
        code: vec![],
        exception_table: vec![],
        is_native: false,
        max_stack: 1,
    };
    let get_method = Method {
        name: "get".into(),
        descriptor: MethodDescriptor { params: vec![Descriptor::Primitive('I')], ret: Some(element.clone()) },
        code: vec![],
        exception_table: vec![],
        is_native: false,
        max_stack: 2,
    };
    let set_method = Method {
        name: "set".into(),
        descriptor: MethodDescriptor {
            params: vec![Descriptor::Primitive('I'), element.clone()],
            ret: None,
        },
        code: vec![],
        exception_table: vec![],
        is_native: false,
        max_stack: 3,
    };
    let hash_method = Method {
        name: "hashCode".into(),
        descriptor: MethodDescriptor { params: vec![], ret: Some(Descriptor::Primitive('I')) },
        code: vec![],
        exception_table: vec![],
        is_native: false,
        max_stack: 1,
    };

    ClassFile {
        this_class: name,
        super_class: Some(SHADOW_ROOT_CLASS.to_string()),
        interfaces: vec![],
        constant_pool: ConstantPool::new(),
        fields: vec![length_field, data_field],
        methods: vec![ctor, length_method, get_method, set_method, hash_method],
        is_manual_serializer: false,
        signature: None,
    }
}

pub fn allocation_size(element: &Descriptor, length: u32) -> u32 {
    ARRAY_HEADER_BYTES + length * element_size(element)
}

/// Memoized by element descriptor so repeated array types reuse one
/// synthesized class (mirrors `class_metering::SizeTable`'s cache shape).
#[derive(Debug, Default)]
pub struct ArrayWrapperCache {
    cache: HashMap<Descriptor, ClassFile>,
}

impl ArrayWrapperCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_synth(&mut self, element: &Descriptor) -> &ClassFile {
        self.cache
            .entry(element.clone())
            .or_insert_with(|| synth_array_wrapper(element))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesizes_length_get_set_and_hash() {
        let wrapper = synth_array_wrapper(&Descriptor::Primitive('I'));
        let names: Vec<_> = wrapper.methods.iter().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&"length"));
        assert!(names.contains(&"get"));
        assert!(names.contains(&"set"));
        assert!(names.contains(&"hashCode"));
        assert_eq!(wrapper.fields.len(), 2);
    }

    #[test]
    fn allocation_size_is_header_plus_length_times_element_size() {
        assert_eq!(allocation_size(&Descriptor::Primitive('I'), 10), ARRAY_HEADER_BYTES + 40);
        assert_eq!(allocation_size(&Descriptor::Reference("app/Foo".into()), 2), ARRAY_HEADER_BYTES + 16);
    }

    #[test]
    fn cache_reuses_the_same_wrapper_for_repeated_element_types() {
        let mut cache = ArrayWrapperCache::new();
        let a = cache.get_or_synth(&Descriptor::Primitive('I')).this_class.clone();
        let b = cache.get_or_synth(&Descriptor::Primitive('I')).this_class.clone();
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
    }
}
