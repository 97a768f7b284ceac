//! Class hierarchy forest: the parent/interface graph used by metering
//! (declared-field sizing, spec §4.3) and the validator (shadow-root
//! reachability). Built once per DApp, ahead of the transform chain.

use crate::ClassFile;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct HierarchyForest {
    parents: BTreeMap<String, String>,
    interfaces: BTreeMap<String, Vec<String>>,
}

impl HierarchyForest {
    pub fn build(classes: &[ClassFile]) -> Self {
        let mut parents = BTreeMap::new();
        let mut interfaces = BTreeMap::new();
        for cf in classes {
            if let Some(sup) = &cf.super_class {
                parents.insert(cf.this_class.clone(), sup.clone());
            }
            interfaces.insert(cf.this_class.clone(), cf.interfaces.clone());
        }
        Self { parents, interfaces }
    }

    pub fn parent_of(&self, class: &str) -> Option<&str> {
        self.parents.get(class).map(String::as_str)
    }

    /// Ancestors from `class` up to (and not including) the point where
    /// the parent is unknown to this forest (e.g. the shadow root itself,
    /// which has no user-declared parent class file).
    pub fn ancestors<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let mut current = Some(class);
        core::iter::from_fn(move || {
            let c = current?;
            current = self.parents.get(c).map(String::as_str);
            Some(c)
        })
    }

    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        if self.ancestors(sub).any(|a| a == sup) {
            return true;
        }
        self.interfaces
            .get(sub)
            .is_some_and(|ifaces| ifaces.iter().any(|i| i == sup))
    }

    pub fn is_known(&self, class: &str) -> bool {
        self.parents.contains_key(class) || self.interfaces.contains_key(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConstantPool;

    fn class(name: &str, parent: Option<&str>) -> ClassFile {
        ClassFile {
            this_class: name.into(),
            super_class: parent.map(String::from),
            interfaces: vec![],
            constant_pool: ConstantPool::new(),
            fields: vec![],
            methods: vec![],
            is_manual_serializer: false,
            signature: None,
        }
    }

    #[test]
    fn ancestors_walk_up_the_chain() {
        let classes = vec![
            class("app/C", Some("app/B")),
            class("app/B", Some("app/A")),
            class("app/A", Some("shadow/lang/Object")),
        ];
        let forest = HierarchyForest::build(&classes);
        let chain: Vec<_> = forest.ancestors("app/C").collect();
        assert_eq!(chain, vec!["app/C", "app/B", "app/A", "shadow/lang/Object"]);
    }

    #[test]
    fn is_subtype_follows_the_forest() {
        let classes = vec![class("app/B", Some("app/A")), class("app/A", None)];
        let forest = HierarchyForest::build(&classes);
        assert!(forest.is_subtype("app/B", "app/A"));
        assert!(!forest.is_subtype("app/A", "app/B"));
    }
}
