//! Trait definitions and their registered instances, keyed by head
//! constructor (spec.md §4.4).

use std::collections::{BTreeMap, BTreeSet};

use vex_types::Scheme;

use crate::error::SymbolError;
use crate::symbol::DispatchStrategy;

/// A trait method's signature and how calls to it are dispatched when the
/// receiver isn't a statically known concrete constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitMethodDescriptor {
    pub name: String,
    pub scheme: Scheme,
    pub dispatch: DispatchStrategy,
    pub has_default: bool,
}

/// A functional dependency `determiners -> determined` over a trait's type
/// parameters (e.g. an associated-type-like relation pinned by the instance
/// head).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionalDependency {
    pub determiners: Vec<String>,
    pub determined: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitDescriptor {
    pub name: String,
    pub type_params: Vec<String>,
    pub methods: BTreeMap<String, TraitMethodDescriptor>,
    pub functional_dependencies: Vec<FunctionalDependency>,
}

impl TraitDescriptor {
    pub fn new(name: impl Into<String>, type_params: Vec<String>) -> Self {
        Self { name: name.into(), type_params, methods: BTreeMap::new(), functional_dependencies: Vec::new() }
    }

    pub fn add_method(&mut self, method: TraitMethodDescriptor) {
        self.methods.insert(method.name.clone(), method);
    }
}

/// A single `impl Trait for Head` registration.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    pub trait_name: String,
    pub head: String,
    pub scheme: Scheme,
    /// Methods this instance implements directly, as opposed to inheriting
    /// the trait's default.
    pub overridden_methods: BTreeSet<String>,
}

pub enum ResolvedMethod {
    /// Call resolves to the instance's own implementation.
    Instance,
    /// Call resolves to the trait's default implementation.
    Default,
}

#[derive(Debug, Clone, Default)]
pub struct TraitRegistry {
    traits: BTreeMap<String, TraitDescriptor>,
    instances: BTreeMap<(String, String), InstanceRecord>,
}

impl TraitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_trait(&mut self, descriptor: TraitDescriptor) {
        self.traits.insert(descriptor.name.clone(), descriptor);
    }

    pub fn trait_descriptor(&self, trait_name: &str) -> Result<&TraitDescriptor, SymbolError> {
        self.traits.get(trait_name).ok_or_else(|| SymbolError::UnknownTrait(trait_name.to_string()))
    }

    /// Registers an instance of `trait_name` for head constructor `head`.
    /// Fails if one is already registered (coherence: at most one instance
    /// per trait/head pair).
    pub fn register_instance(&mut self, record: InstanceRecord) -> Result<(), SymbolError> {
        let key = (record.trait_name.clone(), record.head.clone());
        if self.instances.contains_key(&key) {
            return Err(SymbolError::AmbiguousInstance { trait_name: key.0, head: key.1 });
        }
        self.instances.insert(key, record);
        Ok(())
    }

    pub fn instance(&self, trait_name: &str, head: &str) -> Result<&InstanceRecord, SymbolError> {
        self.instances.get(&(trait_name.to_string(), head.to_string())).ok_or_else(|| {
            SymbolError::NoInstance { trait_name: trait_name.to_string(), head: head.to_string() }
        })
    }

    /// Resolves which implementation a call to `trait_name::method` on a
    /// value whose type's head constructor is `head` should use.
    pub fn resolve_method(
        &self,
        trait_name: &str,
        head: &str,
        method: &str,
    ) -> Result<ResolvedMethod, SymbolError> {
        let descriptor = self.trait_descriptor(trait_name)?;
        let method_descriptor = descriptor.methods.get(method).ok_or_else(|| SymbolError::MethodNotImplemented {
            trait_name: trait_name.to_string(),
            head: head.to_string(),
            method: method.to_string(),
        })?;
        let instance = self.instance(trait_name, head)?;
        if instance.overridden_methods.contains(method) {
            Ok(ResolvedMethod::Instance)
        } else if method_descriptor.has_default {
            Ok(ResolvedMethod::Default)
        } else {
            Err(SymbolError::MethodNotImplemented {
                trait_name: trait_name.to_string(),
                head: head.to_string(),
                method: method.to_string(),
            })
        }
    }

    /// Every head constructor with a registered instance of `trait_name`,
    /// sorted (spec.md determinism invariant).
    pub fn implementors(&self, trait_name: &str) -> Vec<&str> {
        self.instances
            .keys()
            .filter(|(t, _)| t == trait_name)
            .map(|(_, head)| head.as_str())
            .collect()
    }

    /// Every trait with a registered instance for head constructor `head`,
    /// sorted (spec.md determinism invariant) — the reverse lookup method
    /// dispatch on a concrete receiver needs: "which traits does this type
    /// implement".
    pub fn traits_for_head<'a>(&'a self, head: &str) -> Vec<&'a str> {
        self.instances.keys().filter(|(_, h)| h == head).map(|(t, _)| t.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vex_types::Type;

    fn descriptor_with_default() -> TraitDescriptor {
        let mut d = TraitDescriptor::new("Display", vec!["Self".to_string()]);
        d.add_method(TraitMethodDescriptor {
            name: "show".to_string(),
            scheme: Scheme::monomorphic(Type::func(vec![Type::var("Self")], Type::constant("String"))),
            dispatch: DispatchStrategy::ArgumentPosition(0),
            has_default: true,
        });
        d
    }

    #[test]
    fn resolves_to_default_when_not_overridden() {
        let mut reg = TraitRegistry::new();
        reg.register_trait(descriptor_with_default());
        reg.register_instance(InstanceRecord {
            trait_name: "Display".to_string(),
            head: "Point".to_string(),
            scheme: Scheme::monomorphic(Type::constant("Point")),
            overridden_methods: BTreeSet::new(),
        })
        .expect("registers");
        assert!(matches!(
            reg.resolve_method("Display", "Point", "show").expect("resolves"),
            ResolvedMethod::Default
        ));
    }

    #[test]
    fn resolves_to_instance_when_overridden() {
        let mut reg = TraitRegistry::new();
        reg.register_trait(descriptor_with_default());
        let mut overridden = BTreeSet::new();
        overridden.insert("show".to_string());
        reg.register_instance(InstanceRecord {
            trait_name: "Display".to_string(),
            head: "Point".to_string(),
            scheme: Scheme::monomorphic(Type::constant("Point")),
            overridden_methods: overridden,
        })
        .expect("registers");
        assert!(matches!(
            reg.resolve_method("Display", "Point", "show").expect("resolves"),
            ResolvedMethod::Instance
        ));
    }

    #[test]
    fn duplicate_instance_registration_is_ambiguous() {
        let mut reg = TraitRegistry::new();
        reg.register_trait(descriptor_with_default());
        let record = InstanceRecord {
            trait_name: "Display".to_string(),
            head: "Point".to_string(),
            scheme: Scheme::monomorphic(Type::constant("Point")),
            overridden_methods: BTreeSet::new(),
        };
        reg.register_instance(record.clone()).expect("first registers");
        assert!(matches!(
            reg.register_instance(record),
            Err(SymbolError::AmbiguousInstance { .. })
        ));
    }

    #[test]
    fn missing_instance_is_reported() {
        let mut reg = TraitRegistry::new();
        reg.register_trait(descriptor_with_default());
        assert!(matches!(
            reg.resolve_method("Display", "Point", "show"),
            Err(SymbolError::NoInstance { .. })
        ));
    }
}
