//! A resolved identifier: its kind, scheme and (for trait methods) dispatch
//! strategy (spec.md §3.2).

use vex_types::Scheme;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Constructor,
    TraitMethod,
    ModuleMember,
}

/// How a trait method call picks its instance when the receiver type isn't
/// statically a concrete constructor (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStrategy {
    /// Resolve from the inferred type of argument `i`.
    ArgumentPosition(usize),
    /// Resolve from the head constructor of the call's return type.
    ReturnType,
    /// A witness value is threaded explicitly through the call.
    Witness,
    /// Requires an explicit type hint at the call site (phantom-type methods).
    ExplicitHint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub scheme: Scheme,
    pub dispatch: Option<DispatchStrategy>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, scheme: Scheme) -> Self {
        Self { name: name.into(), kind, scheme, dispatch: None }
    }

    pub fn with_dispatch(mut self, strategy: DispatchStrategy) -> Self {
        self.dispatch = Some(strategy);
        self
    }
}
