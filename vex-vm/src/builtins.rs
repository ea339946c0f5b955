//! The builtin registry: host functions exposed to Vex code under a fixed
//! name, looked up the same way a user-defined global is (spec.md §6.4,
//! `register_builtin`).

use std::rc::Rc;

use vex_bytecode::{Builtin, BuiltinFn, Value};

use crate::vm::Vm;

impl Vm {
    /// Registers a host function under `name`, callable from Vex code like
    /// any other global. `arity` is checked exactly at call sites; builtins
    /// don't support defaults or variadics (a thin host function can do that
    /// bookkeeping itself before delegating).
    pub fn register_builtin(
        &mut self,
        name: impl Into<String>,
        arity: usize,
        func: impl Fn(&mut dyn vex_bytecode::HostContext, &[Value]) -> Result<Value, Rc<vex_bytecode::ErrorValue>> + 'static,
    ) {
        let name = name.into();
        let builtin = Builtin { name: name.clone(), arity, func: Rc::new(func) as Rc<BuiltinFn> };
        self.globals.insert(name, Value::Builtin(Rc::new(builtin)));
    }
}
