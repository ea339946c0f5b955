//! Module loading (spec.md §4.8): resolves a chunk's `pending_imports` into
//! bound values, memoizing compiled modules and detecting import cycles by
//! marking a specifier in-progress before recursing into it.
//!
//! Deliberately decoupled from `vex-compiler` the same way `vex-bytecode`
//! decouples itself from `vex-vm` via `HostContext`: the VM doesn't know how
//! to turn a module specifier into a `FunctionDescriptor`, only how to run
//! one once it has it. A host (CLI, embedder, test harness) supplies that
//! translation via [`ModuleSource`].

use std::collections::BTreeMap;
use std::rc::Rc;

use vex_bytecode::{ErrorValue, FunctionDescriptor, Value};

use crate::error::{fault, MODULE_ERROR};

/// Turns a module specifier (e.g. `"std/io"`, a relative path) into a
/// compiled, not-yet-run module body. Implemented by whatever owns the
/// compiler pipeline; the VM only runs what comes back.
pub trait ModuleSource {
    fn load(&mut self, specifier: &str) -> Result<Rc<FunctionDescriptor>, Rc<ErrorValue>>;
}

enum ModuleState {
    InProgress,
    Loaded(Value),
}

#[derive(Default)]
pub struct ModuleLoader {
    cache: BTreeMap<String, ModuleState>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached module's exported value (its module body's
    /// expression result, typically a record of exports) if already loaded,
    /// `Err` if `specifier` is mid-load on the current import chain (a
    /// cycle), or `None` if it needs loading.
    pub fn begin(&mut self, specifier: &str) -> Result<Option<Value>, Rc<ErrorValue>> {
        match self.cache.get(specifier) {
            Some(ModuleState::Loaded(value)) => Ok(Some(value.clone())),
            Some(ModuleState::InProgress) => {
                Err(fault(MODULE_ERROR, format!("import cycle detected at `{specifier}`")))
            }
            None => {
                self.cache.insert(specifier.to_string(), ModuleState::InProgress);
                Ok(None)
            }
        }
    }

    pub fn finish(&mut self, specifier: &str, exports: Value) {
        self.cache.insert(specifier.to_string(), ModuleState::Loaded(exports));
    }
}
