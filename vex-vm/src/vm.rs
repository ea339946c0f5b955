//! The stack-based bytecode interpreter (spec.md §4.7).
//!
//! A single operand stack is shared by every call frame (clox-style);
//! each [`CallFrame`] only remembers its own base index into that stack.
//! Cancellation is checked at the three points spec.md calls out: loop
//! back-edges, calls, and returns, rather than on every dispatch step.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use vex_bytecode::{value::arith, Chunk, Closure, Constant, DefaultValue, ErrorValue, FunctionDescriptor, HostContext, Instruction, MapKey, Upvalue, UpvalueDescriptor, Value};

use crate::cancellation::CancellationToken;
use crate::error::{fault, ARITY_ERROR, CANCELLED, INDEX_ERROR, NAME_ERROR, STACK_OVERFLOW, TYPE_ERROR};
use crate::frame::CallFrame;
use crate::module_loader::{ModuleLoader, ModuleSource};
use crate::upvalues::OpenUpvalues;

/// Recursion guard independent of the host's actual Rust stack; the spec
/// leaves the exact bound unspecified, chosen generously enough that no
/// reasonable non-divergent program trips it.
const MAX_CALL_DEPTH: usize = 4096;

pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    pub(crate) globals: std::collections::BTreeMap<String, Value>,
    open_upvalues: OpenUpvalues,
    cancellation: CancellationToken,
    module_loader: ModuleLoader,
    module_source: Option<Box<dyn ModuleSource>>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            frames: Vec::new(),
            globals: std::collections::BTreeMap::new(),
            open_upvalues: OpenUpvalues::default(),
            cancellation: CancellationToken::new(),
            module_loader: ModuleLoader::new(),
            module_source: None,
        }
    }

    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.cancellation = token;
    }

    pub fn set_module_source(&mut self, source: impl ModuleSource + 'static) {
        self.module_source = Some(Box::new(source));
    }

    /// Runs a compiled top-level function (typically the whole program's
    /// entry chunk) to completion and returns its final value.
    pub fn run(&mut self, descriptor: Rc<FunctionDescriptor>) -> Result<Value, Rc<ErrorValue>> {
        self.resolve_imports(&descriptor.chunk)?;
        let closure = Rc::new(Closure { descriptor, upvalues: Vec::new() });
        self.call_closure(closure, Vec::new())
    }

    fn resolve_imports(&mut self, chunk: &Chunk) -> Result<(), Rc<ErrorValue>> {
        for pending in &chunk.pending_imports {
            if let Some(exports) = self.module_loader.begin(&pending.specifier)? {
                self.bind_module_exports(&pending.specifier, exports);
                continue;
            }
            let Some(source) = self.module_source.as_mut() else {
                return Err(fault("ModuleError", format!("no module source configured to resolve `{}`", pending.specifier)));
            };
            let descriptor = source.load(&pending.specifier)?;
            let closure = Rc::new(Closure { descriptor, upvalues: Vec::new() });
            let exports = self.call_closure(closure, Vec::new())?;
            self.module_loader.finish(&pending.specifier, exports.clone());
            self.bind_module_exports(&pending.specifier, exports);
        }
        Ok(())
    }

    /// A module's exported value is a record; each field becomes a global
    /// bound under its own name (spec.md §4.8).
    fn bind_module_exports(&mut self, specifier: &str, exports: Value) {
        match exports {
            Value::Record { fields, .. } => {
                for (name, value) in fields.borrow().iter() {
                    self.globals.insert(name.clone(), value.clone());
                }
            }
            other => {
                self.globals.insert(specifier.to_string(), other);
            }
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, args: Vec<Value>) -> Result<Value, Rc<ErrorValue>> {
        let base = self.stack.len();
        self.stack.extend(args);
        self.frames.push(CallFrame::new(closure, base));
        let target_depth = self.frames.len() - 1;
        self.run_until_depth(target_depth)
    }

    /// Runs the dispatch loop until the frame stack drops back to
    /// `target_depth` (i.e. the frame pushed by the caller has returned),
    /// then returns its result. Nested `call_value` re-entrancy (from a
    /// builtin calling back into Vex code) nests another nested run loop on
    /// the same Rust call stack, each bottoming out at its own target depth.
    fn run_until_depth(&mut self, target_depth: usize) -> Result<Value, Rc<ErrorValue>> {
        loop {
            if self.frames.len() <= target_depth {
                return Ok(self.stack.pop().unwrap_or(Value::Nil));
            }
            let frame_index = self.frames.len() - 1;
            let ip = self.frames[frame_index].ip;
            // Clone the owning `Rc` rather than borrowing `self.frames`
            // directly, so `step` below is free to take `&mut self`.
            let closure = Rc::clone(&self.frames[frame_index].closure);
            let chunk = &closure.descriptor.chunk;
            let Some(instruction) = chunk.instructions.get(ip).cloned() else {
                return Err(fault("InternalError", "instruction pointer past end of chunk"));
            };
            let line = chunk.line_for(ip);
            self.frames[frame_index].ip += 1;

            match self.step(frame_index, &instruction, chunk, line) {
                Ok(StepResult::Continue) => {}
                Ok(StepResult::Returned { to_depth }) => {
                    if to_depth <= target_depth {
                        return Ok(self.stack.pop().unwrap_or(Value::Nil));
                    }
                }
                Err(mut err) => {
                    let name = self.frames[frame_index].closure.descriptor.name.clone();
                    Rc::make_mut(&mut err).push_frame(format!("{name} (line {line})"));
                    // Unwind every frame at or above target_depth, recording
                    // each caller's own call site so the trace reads as a
                    // real call chain rather than just the failing frame.
                    while self.frames.len() > target_depth {
                        let frame = self.frames.pop().expect("loop guard ensures a frame exists");
                        self.open_upvalues.close_from(frame.base, &self.stack);
                        self.stack.truncate(frame.base);
                        if let Some(caller) = self.frames.last() {
                            let call_line = caller.chunk().line_for(caller.ip.saturating_sub(1));
                            Rc::make_mut(&mut err).push_frame(format!("{} (line {call_line})", caller.closure.descriptor.name));
                        }
                    }
                    // When the error reaches the top-level script frame, drop
                    // it from the trace if inner frames already explain where
                    // things went wrong, matching the reference interpreter's
                    // reports (spec.md §4.7/§7).
                    if target_depth == 0 && err.stack_trace.len() > 1 {
                        Rc::make_mut(&mut err).stack_trace.pop();
                    }
                    return Err(err);
                }
            }
        }
    }

    fn check_cancellation(&self) -> Result<(), Rc<ErrorValue>> {
        if self.cancellation.is_cancelled() {
            Err(fault(CANCELLED, "execution cancelled"))
        } else {
            Ok(())
        }
    }

    fn step(&mut self, frame_index: usize, instruction: &Instruction, chunk: &Chunk, line: usize) -> Result<StepResult, Rc<ErrorValue>> {
        match instruction {
            Instruction::Constant(idx) => {
                let value = constant_literal(chunk, *idx)?;
                self.stack.push(value);
            }
            Instruction::Nil => self.stack.push(Value::Nil),
            Instruction::True => self.stack.push(Value::Boolean(true)),
            Instruction::False => self.stack.push(Value::Boolean(false)),

            Instruction::Pop => {
                self.pop()?;
            }
            Instruction::PopBelow { depth } => {
                let top = self.pop()?;
                let at = self.stack.len().saturating_sub(*depth as usize);
                if at < self.stack.len() {
                    self.stack.truncate(at);
                }
                self.stack.push(top);
            }
            Instruction::Dup => {
                let top = self.peek(0)?.clone();
                self.stack.push(top);
            }

            Instruction::GetLocal(slot) => {
                let base = self.frames[frame_index].base;
                let value = self.stack.get(base + *slot as usize).cloned().unwrap_or(Value::Nil);
                self.stack.push(value);
            }
            Instruction::SetLocal(slot) => {
                let base = self.frames[frame_index].base;
                let value = self.peek(0)?.clone();
                if let Some(slot_ref) = self.stack.get_mut(base + *slot as usize) {
                    *slot_ref = value;
                }
            }
            Instruction::GetUpvalue(idx) => {
                let cell = self.frames[frame_index].closure.upvalues.get(*idx as usize).cloned();
                let Some(cell) = cell else {
                    return Err(fault(NAME_ERROR, "unresolved upvalue"));
                };
                let value = self.read_upvalue(&cell);
                self.stack.push(value);
            }
            Instruction::SetUpvalue(idx) => {
                let cell = self.frames[frame_index].closure.upvalues.get(*idx as usize).cloned();
                let Some(cell) = cell else {
                    return Err(fault(NAME_ERROR, "unresolved upvalue"));
                };
                let value = self.peek(0)?.clone();
                self.write_upvalue(&cell, value);
            }
            Instruction::GetGlobal(idx) => {
                let name = constant_name(chunk, *idx)?;
                let value = self
                    .globals
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| fault(NAME_ERROR, format!("undefined global `{name}`")))?;
                self.stack.push(value);
            }
            Instruction::SetGlobal(idx) => {
                let name = constant_name(chunk, *idx)?;
                let value = self.peek(0)?.clone();
                if !self.globals.contains_key(&name) {
                    return Err(fault(NAME_ERROR, format!("undefined global `{name}`")));
                }
                self.globals.insert(name, value);
            }
            Instruction::DefineGlobal(idx) => {
                let name = constant_name(chunk, *idx)?;
                let value = self.pop()?;
                self.globals.insert(name, value);
            }

            Instruction::Add => self.binary_arith(arith::add)?,
            Instruction::Sub => self.binary_arith(arith::sub)?,
            Instruction::Mul => self.binary_arith(arith::mul)?,
            Instruction::Div => self.binary_arith(arith::div)?,
            Instruction::FloorDiv => self.binary_arith(arith::floor_div)?,
            Instruction::Rem => self.binary_arith(arith::rem)?,
            Instruction::Concat => self.binary_arith(arith::concat)?,
            Instruction::Neg => {
                let v = self.pop()?;
                let zero = match &v {
                    Value::Float(_) => Value::Float(0.0),
                    _ => Value::Integer(0),
                };
                let negated = arith::sub(&zero, &v).map_err(|e| fault(TYPE_ERROR, e.to_string()))?;
                self.stack.push(negated);
            }
            Instruction::Not => {
                let v = self.pop()?;
                self.stack.push(Value::Boolean(!v.is_truthy()));
            }
            Instruction::Eq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(Value::Boolean(values_equal(&a, &b)));
            }
            Instruction::NotEq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(Value::Boolean(!values_equal(&a, &b)));
            }
            Instruction::Lt => self.compare(|o| o == Ordering::Less)?,
            Instruction::LtEq => self.compare(|o| o != Ordering::Greater)?,
            Instruction::Gt => self.compare(|o| o == Ordering::Greater)?,
            Instruction::GtEq => self.compare(|o| o != Ordering::Less)?,
            Instruction::And => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(Value::Boolean(a.is_truthy() && b.is_truthy()));
            }
            Instruction::Or => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(Value::Boolean(a.is_truthy() || b.is_truthy()));
            }

            Instruction::Jump(offset) => {
                self.jump(frame_index, *offset);
            }
            Instruction::JumpIfFalse(offset) => {
                let cond = self.pop()?.is_truthy();
                if !cond {
                    self.jump(frame_index, *offset);
                }
            }
            Instruction::Loop(offset) => {
                self.check_cancellation()?;
                self.jump(frame_index, -(*offset as i32));
            }

            Instruction::MakeList(count) => {
                let items = self.pop_n(*count as usize)?;
                self.stack.push(Value::List(Rc::new(RefCell::new(items))));
            }
            Instruction::MakeTuple(count) => {
                let items = self.pop_n(*count as usize)?;
                self.stack.push(Value::Tuple(Rc::new(items)));
            }
            Instruction::MakeMap(count) => {
                let pairs = self.pop_n(*count as usize * 2)?;
                let mut map = std::collections::BTreeMap::new();
                for kv in pairs.chunks(2) {
                    let key = to_map_key(&kv[0])?;
                    map.insert(key, kv[1].clone());
                }
                self.stack.push(Value::Map(Rc::new(RefCell::new(map))));
            }
            Instruction::MakeRecord { type_name, field_count } => {
                let pairs = self.pop_n(*field_count as usize * 2)?;
                let mut fields = std::collections::BTreeMap::new();
                for kv in pairs.chunks(2) {
                    let key = kv[0].as_string().ok_or_else(|| fault(TYPE_ERROR, "record field name must be a string"))?;
                    fields.insert(key, kv[1].clone());
                }
                let type_name = match type_name {
                    Some(idx) => Some(Rc::from(constant_name(chunk, *idx)?.as_str())),
                    None => None,
                };
                self.stack.push(Value::Record { type_name, fields: Rc::new(RefCell::new(fields)) });
            }
            Instruction::ExtendRecord(extra_field_count) => {
                let pairs = self.pop_n(*extra_field_count as usize * 2)?;
                let base = self.pop()?;
                let Value::Record { type_name, fields } = base else {
                    return Err(fault(TYPE_ERROR, "spread target is not a record"));
                };
                let mut merged = fields.borrow().clone();
                for kv in pairs.chunks(2) {
                    let key = kv[0].as_string().ok_or_else(|| fault(TYPE_ERROR, "record field name must be a string"))?;
                    merged.insert(key, kv[1].clone());
                }
                self.stack.push(Value::Record { type_name, fields: Rc::new(RefCell::new(merged)) });
            }
            Instruction::MakeAdt { type_name, constructor, payload_count } => {
                let payload = self.pop_n(*payload_count as usize)?;
                let type_name = constant_name(chunk, *type_name)?;
                let constructor = constant_name(chunk, *constructor)?;
                self.stack.push(Value::Adt {
                    type_name: Rc::from(type_name.as_str()),
                    constructor: Rc::from(constructor.as_str()),
                    payload: Rc::new(payload),
                });
            }

            Instruction::GetField(idx) => {
                let name = constant_name(chunk, *idx)?;
                let object = self.pop()?;
                self.stack.push(get_field(&object, &name)?);
            }
            Instruction::SetField(idx) => {
                let name = constant_name(chunk, *idx)?;
                let value = self.pop()?;
                let object = self.pop()?;
                match &object {
                    Value::Record { fields, .. } => {
                        fields.borrow_mut().insert(name, value);
                    }
                    _ => return Err(fault(TYPE_ERROR, format!("cannot set field `{name}` on a {}", object.type_name()))),
                }
                self.stack.push(object);
            }
            Instruction::GetIndex => {
                let index = self.pop()?;
                let object = self.pop()?;
                self.stack.push(get_index(&object, &index)?);
            }
            Instruction::SetIndex => {
                let value = self.pop()?;
                let index = self.pop()?;
                let object = self.pop()?;
                set_index(&object, &index, value)?;
                self.stack.push(object);
            }
            Instruction::Len => {
                let object = self.pop()?;
                let len = match &object {
                    Value::List(items) => items.borrow().len(),
                    Value::String(chars) => chars.borrow().len(),
                    Value::Tuple(items) => items.len(),
                    Value::Bytes(bytes) => bytes.len(),
                    _ => return Err(fault(TYPE_ERROR, format!("{} has no length", object.type_name()))),
                };
                self.stack.push(Value::Integer(len as i64));
            }

            Instruction::GetTupleElem(i) => {
                let value = self.pop()?;
                let elem = match &value {
                    Value::Tuple(items) => items.get(*i as usize).cloned(),
                    // An ADT's constructor payload is positional like a tuple;
                    // pattern lowering for enum variants reuses this opcode
                    // rather than introducing a separate one.
                    Value::Adt { payload, .. } => payload.get(*i as usize).cloned(),
                    _ => return Err(fault(TYPE_ERROR, "expected a tuple or constructor payload")),
                };
                let elem = elem.ok_or_else(|| fault(INDEX_ERROR, "tuple index out of range"))?;
                self.stack.push(elem);
            }
            Instruction::GetListElem(i) => {
                let value = self.pop()?;
                let Value::List(items) = &value else {
                    return Err(fault(TYPE_ERROR, "expected a list"));
                };
                let elem = items.borrow().get(*i as usize).cloned().ok_or_else(|| fault(INDEX_ERROR, "list index out of range"))?;
                self.stack.push(elem);
            }
            Instruction::UnwrapOrReturn => {
                let value = self.pop()?;
                match &value {
                    Value::Nil => return self.do_return(frame_index, value),
                    Value::Adt { constructor, .. } if constructor.as_ref() == "Fail" => {
                        return self.do_return(frame_index, value);
                    }
                    Value::Adt { payload, .. } => {
                        self.stack.push(payload.first().cloned().unwrap_or(Value::Nil));
                    }
                    _ => self.stack.push(value),
                }
            }
            Instruction::OptionalChainField(idx) => {
                let object = self.pop()?;
                if matches!(object, Value::Nil) {
                    self.stack.push(Value::Nil);
                } else {
                    let name = constant_name(chunk, *idx)?;
                    self.stack.push(get_field(&object, &name)?);
                }
            }

            Instruction::TestConstructor(idx) => {
                let expected = constant_name(chunk, *idx)?;
                let matches = match self.peek(0)? {
                    Value::Adt { constructor, .. } => constructor.as_ref() == expected,
                    _ => false,
                };
                self.stack.push(Value::Boolean(matches));
            }
            Instruction::TestLiteral(idx) => {
                let literal = constant_literal(chunk, *idx)?;
                let matches = values_equal(self.peek(0)?, &literal);
                self.stack.push(Value::Boolean(matches));
            }

            Instruction::Closure { function, upvalues } => {
                let closure = self.make_closure(frame_index, chunk, *function, upvalues)?;
                self.stack.push(Value::Closure(Rc::new(closure)));
            }
            Instruction::Call(argc) => {
                return self.do_call(frame_index, *argc as usize, false);
            }
            Instruction::TailCall(argc) => {
                return self.do_call(frame_index, *argc as usize, true);
            }
            Instruction::Return => {
                let value = self.pop()?;
                return self.do_return(frame_index, value);
            }
            Instruction::Halt => {
                self.open_upvalues.close_from(0, &self.stack);
                self.frames.clear();
                return Ok(StepResult::Returned { to_depth: 0 });
            }
        }
        Ok(StepResult::Continue)
    }

    fn jump(&mut self, frame_index: usize, offset: i32) {
        let frame = &mut self.frames[frame_index];
        frame.ip = (frame.ip as i64 + offset as i64) as usize;
    }

    fn pop(&mut self) -> Result<Value, Rc<ErrorValue>> {
        self.stack.pop().ok_or_else(|| fault("InternalError", "stack underflow"))
    }

    fn peek(&self, depth_from_top: usize) -> Result<&Value, Rc<ErrorValue>> {
        let len = self.stack.len();
        if depth_from_top >= len {
            return Err(fault("InternalError", "stack underflow"));
        }
        Ok(&self.stack[len - 1 - depth_from_top])
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, Rc<ErrorValue>> {
        if self.stack.len() < n {
            return Err(fault("InternalError", "stack underflow"));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn binary_arith(&mut self, op: fn(&Value, &Value) -> Result<Value, arith::ArithError>) -> Result<(), Rc<ErrorValue>> {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = op(&a, &b).map_err(|e| fault(TYPE_ERROR, e.to_string()))?;
        self.stack.push(result);
        Ok(())
    }

    fn compare(&mut self, accept: impl Fn(Ordering) -> bool) -> Result<(), Rc<ErrorValue>> {
        let b = self.pop()?;
        let a = self.pop()?;
        let ordering = compare_values(&a, &b)?;
        self.stack.push(Value::Boolean(accept(ordering)));
        Ok(())
    }

    fn read_upvalue(&self, cell: &Rc<RefCell<Upvalue>>) -> Value {
        match &*cell.borrow() {
            Upvalue::Open(slot) => self.stack.get(*slot).cloned().unwrap_or(Value::Nil),
            Upvalue::Closed(value) => value.clone(),
        }
    }

    fn write_upvalue(&mut self, cell: &Rc<RefCell<Upvalue>>, value: Value) {
        let slot = match &*cell.borrow() {
            Upvalue::Open(slot) => Some(*slot),
            Upvalue::Closed(_) => None,
        };
        match slot {
            Some(slot) => {
                if let Some(slot_ref) = self.stack.get_mut(slot) {
                    *slot_ref = value;
                }
            }
            None => *cell.borrow_mut() = Upvalue::Closed(value),
        }
    }

    fn make_closure(&mut self, frame_index: usize, chunk: &Chunk, function_idx: u32, upvalue_descs: &[UpvalueDescriptor]) -> Result<Closure, Rc<ErrorValue>> {
        let Some(Constant::Function(descriptor)) = chunk.constants.get(function_idx as usize) else {
            return Err(fault("InternalError", "closure constant is not a function"));
        };
        let descriptor = Rc::new(descriptor.clone());
        let base = self.frames[frame_index].base;
        let enclosing = Rc::clone(&self.frames[frame_index].closure);
        let mut upvalues = Vec::with_capacity(upvalue_descs.len());
        for desc in upvalue_descs {
            let cell = if desc.is_local {
                self.open_upvalues.find_or_create(base + desc.index as usize)
            } else {
                enclosing.upvalues.get(desc.index as usize).cloned().ok_or_else(|| fault("InternalError", "unresolved enclosing upvalue"))?
            };
            upvalues.push(cell);
        }
        Ok(Closure { descriptor, upvalues })
    }

    fn do_call(&mut self, frame_index: usize, argc: usize, is_tail: bool) -> Result<StepResult, Rc<ErrorValue>> {
        let callee_idx = self.stack.len().checked_sub(argc + 1).ok_or_else(|| fault("InternalError", "stack underflow on call"))?;
        let callee = self.stack.remove(callee_idx);
        match callee {
            Value::Closure(closure) => {
                let args_start = self.stack.len() - argc;
                self.prepare_arguments(&closure.descriptor, args_start)?;
                self.check_cancellation()?;
                if is_tail {
                    let old_base = self.frames[frame_index].base;
                    let args: Vec<Value> = self.stack.split_off(args_start);
                    self.open_upvalues.close_from(old_base, &self.stack);
                    self.stack.truncate(old_base);
                    self.stack.extend(args);
                    self.frames[frame_index] = CallFrame::new(closure, old_base);
                    Ok(StepResult::Continue)
                } else {
                    if self.frames.len() >= MAX_CALL_DEPTH {
                        return Err(fault(STACK_OVERFLOW, "call stack exceeded maximum depth"));
                    }
                    self.frames.push(CallFrame::new(closure, args_start));
                    Ok(StepResult::Continue)
                }
            }
            Value::Builtin(builtin) => {
                if argc != builtin.arity {
                    return Err(fault(ARITY_ERROR, format!("`{}` expects {} argument(s), found {}", builtin.name, builtin.arity, argc)));
                }
                let args = self.pop_n(argc)?;
                self.check_cancellation()?;
                let result = (builtin.func)(self, &args)?;
                self.stack.push(result);
                Ok(StepResult::Continue)
            }
            other => Err(fault(TYPE_ERROR, format!("{} is not callable", other.type_name()))),
        }
    }

    /// Pads missing trailing arguments with their compiled default values,
    /// and validates arity otherwise (spec.md §4.6 default-value compilation).
    fn prepare_arguments(&mut self, descriptor: &Rc<FunctionDescriptor>, args_start: usize) -> Result<(), Rc<ErrorValue>> {
        let provided = self.stack.len() - args_start;
        if provided < descriptor.required_arity {
            return Err(fault(ARITY_ERROR, format!("`{}` expects at least {} argument(s), found {}", descriptor.name, descriptor.required_arity, provided)));
        }
        if provided > descriptor.arity && !descriptor.is_variadic {
            return Err(fault(ARITY_ERROR, format!("`{}` expects at most {} argument(s), found {}", descriptor.name, descriptor.arity, provided)));
        }
        if descriptor.is_variadic && provided > descriptor.arity.saturating_sub(1) {
            let variadic_start = args_start + descriptor.arity.saturating_sub(1);
            let extra = self.stack.split_off(variadic_start);
            self.stack.push(Value::List(Rc::new(RefCell::new(extra))));
            return Ok(());
        }
        for i in provided..descriptor.arity {
            let default_index = i.saturating_sub(descriptor.required_arity);
            let Some(default) = descriptor.defaults.get(default_index) else {
                self.stack.push(Value::Nil);
                continue;
            };
            let value = match default {
                DefaultValue::Constant(idx) => constant_literal(&descriptor.chunk, *idx)?,
                DefaultValue::Chunk(chunk) => {
                    let descriptor = Rc::new(FunctionDescriptor {
                        name: format!("{}$default{i}", descriptor.name),
                        arity: 0,
                        required_arity: 0,
                        is_variadic: false,
                        defaults: Vec::new(),
                        local_count: 0,
                        upvalue_count: 0,
                        chunk: chunk.clone(),
                        local_names: Vec::new(),
                    });
                    let closure = Rc::new(Closure { descriptor, upvalues: Vec::new() });
                    self.call_closure(closure, Vec::new())?
                }
            };
            self.stack.push(value);
        }
        Ok(())
    }

    fn do_return(&mut self, frame_index: usize, value: Value) -> Result<StepResult, Rc<ErrorValue>> {
        let base = self.frames[frame_index].base;
        self.open_upvalues.close_from(base, &self.stack);
        self.stack.truncate(base);
        self.stack.push(value);
        self.frames.pop();
        Ok(StepResult::Returned { to_depth: frame_index })
    }
}

enum StepResult {
    Continue,
    Returned { to_depth: usize },
}

impl HostContext for Vm {
    fn call_value(&mut self, callee: &Value, args: &[Value]) -> Result<Value, Rc<ErrorValue>> {
        match callee {
            Value::Closure(closure) => self.call_closure(Rc::clone(closure), args.to_vec()),
            Value::Builtin(builtin) => {
                if args.len() != builtin.arity {
                    return Err(fault(ARITY_ERROR, format!("`{}` expects {} argument(s), found {}", builtin.name, builtin.arity, args.len())));
                }
                (builtin.func)(self, args)
            }
            other => Err(fault(TYPE_ERROR, format!("{} is not callable", other.type_name()))),
        }
    }
}

fn constant_literal(chunk: &Chunk, idx: u32) -> Result<Value, Rc<ErrorValue>> {
    match chunk.constants.get(idx as usize) {
        Some(Constant::Integer(i)) => Ok(Value::Integer(*i)),
        Some(Constant::BigInt(b)) => Ok(Value::BigInt(Rc::new(b.clone()))),
        Some(Constant::Float(f)) => Ok(Value::Float(*f)),
        Some(Constant::Boolean(b)) => Ok(Value::Boolean(*b)),
        Some(Constant::Char(c)) => Ok(Value::Char(*c)),
        Some(Constant::Str(s)) => Ok(Value::string(s.clone())),
        Some(Constant::Bytes(b)) => Ok(Value::Bytes(Rc::new(b.clone()))),
        Some(Constant::Bits(b)) => Ok(Value::Bits(Rc::new(b.clone()))),
        Some(Constant::Nil) => Ok(Value::Nil),
        Some(Constant::Function(_)) => Err(fault("InternalError", "function constant used as a literal")),
        None => Err(fault("InternalError", "constant index out of range")),
    }
}

fn constant_name(chunk: &Chunk, idx: u32) -> Result<String, Rc<ErrorValue>> {
    match chunk.constants.get(idx as usize) {
        Some(Constant::Str(s)) => Ok(s.clone()),
        _ => Err(fault("InternalError", "expected a name constant")),
    }
}

fn to_map_key(value: &Value) -> Result<MapKey, Rc<ErrorValue>> {
    match value {
        Value::Integer(i) => Ok(MapKey::Integer(*i)),
        Value::Boolean(b) => Ok(MapKey::Boolean(*b)),
        Value::Char(c) => Ok(MapKey::Char(*c)),
        Value::String(s) => Ok(MapKey::String(s.borrow().iter().collect())),
        other => Err(fault(TYPE_ERROR, format!("{} cannot be used as a map key", other.type_name()))),
    }
}

fn get_field(object: &Value, name: &str) -> Result<Value, Rc<ErrorValue>> {
    match object {
        Value::Record { fields, .. } => {
            fields.borrow().get(name).cloned().ok_or_else(|| fault(NAME_ERROR, format!("no field `{name}`")))
        }
        _ => Err(fault(TYPE_ERROR, format!("{} has no fields", object.type_name()))),
    }
}

fn get_index(object: &Value, index: &Value) -> Result<Value, Rc<ErrorValue>> {
    match object {
        Value::List(items) => {
            let Value::Integer(i) = index else { return Err(fault(TYPE_ERROR, "list index must be an integer")) };
            items.borrow().get(*i as usize).cloned().ok_or_else(|| fault(INDEX_ERROR, "list index out of range"))
        }
        Value::Tuple(items) => {
            let Value::Integer(i) = index else { return Err(fault(TYPE_ERROR, "tuple index must be an integer")) };
            items.get(*i as usize).cloned().ok_or_else(|| fault(INDEX_ERROR, "tuple index out of range"))
        }
        Value::Map(entries) => {
            let key = to_map_key(index)?;
            Ok(entries.borrow().get(&key).cloned().unwrap_or(Value::Nil))
        }
        Value::String(chars) => {
            let Value::Integer(i) = index else { return Err(fault(TYPE_ERROR, "string index must be an integer")) };
            chars.borrow().get(*i as usize).map(|c| Value::Char(*c)).ok_or_else(|| fault(INDEX_ERROR, "string index out of range"))
        }
        _ => Err(fault(TYPE_ERROR, format!("{} is not indexable", object.type_name()))),
    }
}

fn set_index(object: &Value, index: &Value, value: Value) -> Result<(), Rc<ErrorValue>> {
    match object {
        Value::List(items) => {
            let Value::Integer(i) = index else { return Err(fault(TYPE_ERROR, "list index must be an integer")) };
            let mut items = items.borrow_mut();
            let slot = items.get_mut(*i as usize).ok_or_else(|| fault(INDEX_ERROR, "list index out of range"))?;
            *slot = value;
            Ok(())
        }
        Value::Map(entries) => {
            let key = to_map_key(index)?;
            entries.borrow_mut().insert(key, value);
            Ok(())
        }
        _ => Err(fault(TYPE_ERROR, format!("{} does not support index assignment", object.type_name()))),
    }
}

/// Structural equality across the whole value universe (spec.md §8); unlike
/// ordering, every pair of values is comparable, mismatched types simply
/// compare unequal.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Integer(x), Value::Float(y)) | (Value::Float(y), Value::Integer(x)) => *x as f64 == *y,
        (Value::BigInt(x), Value::BigInt(y)) => x == y,
        (Value::Integer(x), Value::BigInt(y)) | (Value::BigInt(y), Value::Integer(x)) => num_bigint::BigInt::from(*x) == **y,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Char(x), Value::Char(y)) => x == y,
        (Value::String(x), Value::String(y)) => *x.borrow() == *y.borrow(),
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::Bits(x), Value::Bits(y)) => x == y,
        (Value::Nil, Value::Nil) => true,
        (Value::List(x), Value::List(y)) => {
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Tuple(x), Value::Tuple(y)) => x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b)),
        (Value::Record { fields: x, .. }, Value::Record { fields: y, .. }) => {
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len() && x.iter().zip(y.iter()).all(|((kx, vx), (ky, vy))| kx == ky && values_equal(vx, vy))
        }
        (Value::Map(x), Value::Map(y)) => {
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len() && x.iter().zip(y.iter()).all(|((kx, vx), (ky, vy))| kx == ky && values_equal(vx, vy))
        }
        (Value::Adt { type_name: tx, constructor: cx, payload: px }, Value::Adt { type_name: ty, constructor: cy, payload: py }) => {
            tx == ty && cx == cy && px.len() == py.len() && px.iter().zip(py.iter()).all(|(a, b)| values_equal(a, b))
        }
        _ => false,
    }
}

/// Ordering is only defined between like numeric/textual types; anything
/// else is a host-level `TypeError` (spec.md §6.5).
fn compare_values(a: &Value, b: &Value) -> Result<Ordering, Rc<ErrorValue>> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(x.cmp(y)),
        (Value::BigInt(x), Value::BigInt(y)) => Ok(x.cmp(y)),
        (Value::Integer(x), Value::BigInt(y)) => Ok(num_bigint::BigInt::from(*x).cmp(y)),
        (Value::BigInt(x), Value::Integer(y)) => Ok((**x).cmp(&num_bigint::BigInt::from(*y))),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).ok_or_else(|| fault(TYPE_ERROR, "NaN is not ordered")),
        (Value::Integer(x), Value::Float(y)) => (*x as f64).partial_cmp(y).ok_or_else(|| fault(TYPE_ERROR, "NaN is not ordered")),
        (Value::Float(x), Value::Integer(y)) => x.partial_cmp(&(*y as f64)).ok_or_else(|| fault(TYPE_ERROR, "NaN is not ordered")),
        (Value::Char(x), Value::Char(y)) => Ok(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Ok(x.borrow().iter().collect::<String>().cmp(&y.borrow().iter().collect::<String>())),
        (a, b) => Err(fault(TYPE_ERROR, format!("`{}` and `{}` are not ordered", a.type_name(), b.type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vex_bytecode::{Chunk, FunctionDescriptor, UpvalueDescriptor};

    fn main_descriptor(chunk: Chunk) -> Rc<FunctionDescriptor> {
        Rc::new(FunctionDescriptor {
            name: "main".to_string(),
            arity: 0,
            required_arity: 0,
            is_variadic: false,
            defaults: Vec::new(),
            local_count: 0,
            upvalue_count: 0,
            chunk,
            local_names: Vec::new(),
        })
    }

    #[test]
    fn evaluates_constant_arithmetic() {
        let mut chunk = Chunk::new();
        let a = chunk.add_constant(Constant::Integer(2));
        let b = chunk.add_constant(Constant::Integer(3));
        let c = chunk.add_constant(Constant::Integer(4));
        chunk.emit(Instruction::Constant(a), 1);
        chunk.emit(Instruction::Constant(b), 1);
        chunk.emit(Instruction::Constant(c), 1);
        chunk.emit(Instruction::Mul, 1);
        chunk.emit(Instruction::Add, 1);
        chunk.emit(Instruction::Halt, 1);

        let mut vm = Vm::new();
        let result = vm.run(main_descriptor(chunk)).expect("runs");
        assert!(matches!(result, Value::Integer(14)));
    }

    #[test]
    fn calls_a_global_function_with_arity_check() {
        let mut double_chunk = Chunk::new();
        let two = double_chunk.add_constant(Constant::Integer(2));
        double_chunk.emit(Instruction::GetLocal(0), 1);
        double_chunk.emit(Instruction::Constant(two), 1);
        double_chunk.emit(Instruction::Mul, 1);
        double_chunk.emit(Instruction::Return, 1);
        let double_descriptor = FunctionDescriptor {
            name: "double".to_string(),
            arity: 1,
            required_arity: 1,
            is_variadic: false,
            defaults: Vec::new(),
            local_count: 1,
            upvalue_count: 0,
            chunk: double_chunk,
            local_names: vec!["x".to_string()],
        };

        let mut main_chunk = Chunk::new();
        let name = main_chunk.add_constant(Constant::Str("double".to_string()));
        let function = main_chunk.add_constant(Constant::Function(double_descriptor));
        let arg = main_chunk.add_constant(Constant::Integer(21));
        main_chunk.emit(Instruction::Closure { function, upvalues: Vec::new() }, 1);
        main_chunk.emit(Instruction::DefineGlobal(name), 1);
        main_chunk.emit(Instruction::GetGlobal(name), 2);
        main_chunk.emit(Instruction::Constant(arg), 2);
        main_chunk.emit(Instruction::Call(1), 2);
        main_chunk.emit(Instruction::Halt, 2);

        let mut vm = Vm::new();
        let result = vm.run(main_descriptor(main_chunk)).expect("runs");
        assert!(matches!(result, Value::Integer(42)));
    }

    #[test]
    fn closes_upvalues_after_the_capturing_frame_returns() {
        let mut inner_chunk = Chunk::new();
        inner_chunk.emit(Instruction::GetUpvalue(0), 1);
        inner_chunk.emit(Instruction::GetLocal(0), 1);
        inner_chunk.emit(Instruction::Add, 1);
        inner_chunk.emit(Instruction::Return, 1);
        let inner_descriptor = FunctionDescriptor {
            name: "inner".to_string(),
            arity: 1,
            required_arity: 1,
            is_variadic: false,
            defaults: Vec::new(),
            local_count: 1,
            upvalue_count: 1,
            chunk: inner_chunk,
            local_names: vec!["y".to_string()],
        };

        let mut adder_chunk = Chunk::new();
        let inner_fn = adder_chunk.add_constant(Constant::Function(inner_descriptor));
        adder_chunk.emit(Instruction::Closure { function: inner_fn, upvalues: vec![UpvalueDescriptor { is_local: true, index: 0 }] }, 1);
        adder_chunk.emit(Instruction::Return, 1);
        let adder_descriptor = FunctionDescriptor {
            name: "adder".to_string(),
            arity: 1,
            required_arity: 1,
            is_variadic: false,
            defaults: Vec::new(),
            local_count: 1,
            upvalue_count: 0,
            chunk: adder_chunk,
            local_names: vec!["x".to_string()],
        };

        let mut main_chunk = Chunk::new();
        let name = main_chunk.add_constant(Constant::Str("adder".to_string()));
        let function = main_chunk.add_constant(Constant::Function(adder_descriptor));
        let ten = main_chunk.add_constant(Constant::Integer(10));
        let five = main_chunk.add_constant(Constant::Integer(5));
        main_chunk.emit(Instruction::Closure { function, upvalues: Vec::new() }, 1);
        main_chunk.emit(Instruction::DefineGlobal(name), 1);
        main_chunk.emit(Instruction::GetGlobal(name), 2);
        main_chunk.emit(Instruction::Constant(ten), 2);
        main_chunk.emit(Instruction::Call(1), 2);
        main_chunk.emit(Instruction::Constant(five), 3);
        main_chunk.emit(Instruction::Call(1), 3);
        main_chunk.emit(Instruction::Halt, 3);

        let mut vm = Vm::new();
        let result = vm.run(main_descriptor(main_chunk)).expect("runs");
        assert!(matches!(result, Value::Integer(15)));
    }

    #[test]
    fn tail_calls_do_not_grow_the_frame_stack() {
        let mut countdown_chunk = Chunk::new();
        let zero = countdown_chunk.add_constant(Constant::Integer(0));
        let one = countdown_chunk.add_constant(Constant::Integer(1));
        let name = countdown_chunk.add_constant(Constant::Str("countdown".to_string()));
        countdown_chunk.emit(Instruction::GetLocal(0), 1);
        countdown_chunk.emit(Instruction::Constant(zero), 1);
        countdown_chunk.emit(Instruction::LtEq, 1);
        countdown_chunk.emit(Instruction::JumpIfFalse(2), 1);
        countdown_chunk.emit(Instruction::Constant(zero), 2);
        countdown_chunk.emit(Instruction::Return, 2);
        countdown_chunk.emit(Instruction::GetGlobal(name), 3);
        countdown_chunk.emit(Instruction::GetLocal(0), 3);
        countdown_chunk.emit(Instruction::Constant(one), 3);
        countdown_chunk.emit(Instruction::Sub, 3);
        countdown_chunk.emit(Instruction::TailCall(1), 3);
        let countdown_descriptor = FunctionDescriptor {
            name: "countdown".to_string(),
            arity: 1,
            required_arity: 1,
            is_variadic: false,
            defaults: Vec::new(),
            local_count: 1,
            upvalue_count: 0,
            chunk: countdown_chunk,
            local_names: vec!["n".to_string()],
        };

        let mut main_chunk = Chunk::new();
        let name_const = main_chunk.add_constant(Constant::Str("countdown".to_string()));
        let function = main_chunk.add_constant(Constant::Function(countdown_descriptor));
        let start = main_chunk.add_constant(Constant::Integer(100_000));
        main_chunk.emit(Instruction::Closure { function, upvalues: Vec::new() }, 1);
        main_chunk.emit(Instruction::DefineGlobal(name_const), 1);
        main_chunk.emit(Instruction::GetGlobal(name_const), 2);
        main_chunk.emit(Instruction::Constant(start), 2);
        main_chunk.emit(Instruction::Call(1), 2);
        main_chunk.emit(Instruction::Halt, 2);

        let mut vm = Vm::new();
        let result = vm.run(main_descriptor(main_chunk)).expect("100,000 tail calls must not overflow MAX_CALL_DEPTH");
        assert!(matches!(result, Value::Integer(0)));
    }

    #[test]
    fn cancellation_token_stops_a_tight_loop() {
        let mut chunk = Chunk::new();
        let token = CancellationToken::new();
        token.cancel();
        // `Loop` is the only opcode that checks cancellation outside of
        // call/return, so a backward jump is enough to observe it.
        chunk.emit(Instruction::Nil, 1);
        chunk.emit(Instruction::Pop, 1);
        // ip is 3 (past this instruction) when `Loop` dispatches; jumping
        // back by 3 lands on index 0, repeating the body.
        chunk.emit(Instruction::Loop(3), 1);

        let mut vm = Vm::new();
        vm.set_cancellation_token(token);
        let err = vm.run(main_descriptor(chunk)).expect_err("cancelled");
        assert_eq!(err.kind, CANCELLED);
    }
}
