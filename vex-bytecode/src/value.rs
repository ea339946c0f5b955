//! The runtime value universe (spec.md §3.3). Single-threaded, so shared
//! mutable data uses `Rc`/`RefCell` rather than `Arc`/`Mutex` (spec.md §5).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;

use crate::chunk::FunctionDescriptor;

/// A captured variable cell. Open while its home frame is live (the VM
/// resolves `Open(slot)` against that frame's locals); closed once the frame
/// returns, at which point the cell owns the value directly (spec.md §3.3,
/// §4.7 "upvalue closing").
#[derive(Debug, Clone)]
pub enum Upvalue {
    Open(usize),
    Closed(Value),
}

#[derive(Debug, Clone)]
pub struct Closure {
    pub descriptor: Rc<FunctionDescriptor>,
    pub upvalues: Vec<Rc<RefCell<Upvalue>>>,
}

/// A host function registered via `register_builtin` (spec.md §6.4). Type
/// erased over the VM so this crate doesn't depend on `vex-vm`; `vex-vm`'s
/// `Vm` implements [`HostContext`].
pub trait HostContext {
    fn call_value(&mut self, callee: &Value, args: &[Value]) -> Result<Value, Rc<ErrorValue>>;
}

pub type BuiltinFn = dyn Fn(&mut dyn HostContext, &[Value]) -> Result<Value, Rc<ErrorValue>>;

pub struct Builtin {
    pub name: String,
    pub arity: usize,
    pub func: Rc<BuiltinFn>,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).field("arity", &self.arity).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    pub kind: String,
    pub message: String,
    pub location: Option<(String, usize, usize)>,
    pub stack_trace: Vec<String>,
}

impl ErrorValue {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into(), location: None, stack_trace: Vec::new() }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: usize, column: usize) -> Self {
        self.location = Some((file.into(), line, column));
        self
    }

    /// Extends the stack trace with one more frame, called as the VM unwinds
    /// (spec.md §4.7).
    pub fn push_frame(&mut self, frame_description: impl Into<String>) {
        self.stack_trace.push(frame_description.into());
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone)]
pub enum Task {
    Pending(Value),
    Resolved(Value),
    Failed(Rc<ErrorValue>),
}

/// An ordered, hashable subset of `Value` usable as a `Map` key. Floats and
/// compound values are not supported as keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MapKey {
    Integer(i64),
    Boolean(bool),
    Char(char),
    String(String),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Integer(i) => write!(f, "{i}"),
            MapKey::Boolean(b) => write!(f, "{b}"),
            MapKey::Char(c) => write!(f, "{c}"),
            MapKey::String(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Clone)]
pub enum Value {
    Integer(i64),
    BigInt(Rc<BigInt>),
    Float(f64),
    Boolean(bool),
    Char(char),
    /// `String` and `List<Char>` share this runtime shape (spec.md §3.1/§3.3).
    String(Rc<RefCell<Vec<char>>>),
    Bytes(Rc<Vec<u8>>),
    Bits(Rc<Vec<bool>>),
    Nil,
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Record { type_name: Option<Rc<str>>, fields: Rc<RefCell<BTreeMap<String, Value>>> },
    Map(Rc<RefCell<BTreeMap<MapKey, Value>>>),
    Adt { type_name: Rc<str>, constructor: Rc<str>, payload: Rc<Vec<Value>> },
    Closure(Rc<Closure>),
    Builtin(Rc<Builtin>),
    HostObject(Rc<dyn std::any::Any>),
    Error(Rc<ErrorValue>),
    Task(Rc<RefCell<Task>>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(Rc::new(RefCell::new(s.into().chars().collect())))
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(chars) => Some(chars.borrow().iter().collect()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::BigInt(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Boolean(_) => "Boolean",
            Value::Char(_) => "Char",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Bits(_) => "Bits",
            Value::Nil => "Nil",
            Value::List(_) => "List",
            Value::Tuple(_) => "Tuple",
            Value::Record { .. } => "Record",
            Value::Map(_) => "Map",
            Value::Adt { .. } => "Adt",
            Value::Closure(_) => "Closure",
            Value::Builtin(_) => "Builtin",
            Value::HostObject(_) => "HostObject",
            Value::Error(_) => "Error",
            Value::Task(_) => "Task",
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Nil)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}[{}]", self.type_name())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::BigInt(b) => write!(f, "{b}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::String(chars) => {
                let s: String = chars.borrow().iter().collect();
                write!(f, "{s}")
            }
            Value::Bytes(b) => write!(f, "{b:?}"),
            Value::Bits(bits) => {
                for bit in bits.iter() {
                    write!(f, "{}", if *bit { '1' } else { '0' })?;
                }
                Ok(())
            }
            Value::Nil => write!(f, "nil"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
            Value::Record { type_name, fields } => {
                if let Some(name) = type_name {
                    write!(f, "{name} ")?;
                }
                write!(f, "{{")?;
                for (i, (k, v)) in fields.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Adt { constructor, payload, .. } => {
                write!(f, "{constructor}")?;
                if !payload.is_empty() {
                    write!(f, "(")?;
                    for (i, v) in payload.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{v}")?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Value::Closure(c) => write!(f, "<closure {}>", c.descriptor.name),
            Value::Builtin(b) => write!(f, "<builtin {}>", b.name),
            Value::HostObject(_) => write!(f, "<host object>"),
            Value::Error(e) => write!(f, "{e}"),
            Value::Task(_) => write!(f, "<task>"),
        }
    }
}

pub mod arith;
