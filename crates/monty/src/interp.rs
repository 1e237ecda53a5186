//! The tree-walking evaluator.
//!
//! A single-threaded walk over the prepared tree. Each Python call pushes a
//! [`Frame`] (a slot vector plus bookkeeping); the walk recurses in Rust, so
//! the configurable recursion limit doubles as the host-stack guard. The
//! cancellation token and resource limits are checked at every loop back-edge
//! and call. Exceptions travel as `RunError`; each frame appends itself to
//! the traceback as the error unwinds through it.

use crate::{
    args::ArgValues,
    builtins::{BuiltinFunction, Builtins, call_builtin, call_type, collect_candidates, min_max_pick},
    capability::{OsAccess, missing_capability},
    exception::{ExcInstance, ExcPayload, ExcType, ExceptionRaise, FrameName, RunError, RunResult},
    expressions::{
        ArgExprs, AssignTarget, AugTarget, Comprehension, DeleteTarget, DictItem, Expr, ExprItem, ExprLoc,
        FunctionDefNode, Identifier, Literal, NameScope, Node, Operator, Try, UnpackItem,
    },
    fstring::{ConversionFlag, FStringPart, FormatSpec, format_value},
    function::{BoundMethod, Closure},
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StringId},
    io::PrintWriter,
    methods,
    modules::{ModuleId, datetime_mod},
    ops,
    parse::CodeRange,
    repr::{repr_value, str_value},
    resource::ResourceTracker,
    types::{
        Type,
        datetime::{self, DateTime},
        dict::{Dict, hash_key},
        iter::{ValueIter, iterate_to_vec},
        range::Range,
        set::{Set, storage_from_values},
        slice::{Slice, resolve_index},
    },
    value::{Value, value_as_str},
};

/// One entry of the Python call stack.
pub(crate) struct Frame {
    pub locals: Vec<Value>,
    /// Line of the statement currently executing, for traceback assembly.
    pub current_pos: CodeRange,
}

impl Frame {
    fn new(locals: Vec<Value>) -> Self {
        Self {
            locals,
            current_pos: CodeRange::default(),
        }
    }
}

/// Statement-level control flow.
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub(crate) struct Interp<'a, T: ResourceTracker> {
    pub heap: &'a mut Heap<T>,
    pub interns: &'a Interns,
    pub globals: &'a mut Vec<Value>,
    pub print: &'a mut dyn PrintWriter,
    pub os: Option<&'a OsAccess>,
    /// Python call depth (module level is 0).
    depth: usize,
    /// Exception instances currently being handled, innermost last; the
    /// source of implicit `__context__` chaining.
    handled: Vec<Value>,
}

impl<'a, T: ResourceTracker> Interp<'a, T> {
    pub(crate) fn new(
        heap: &'a mut Heap<T>,
        interns: &'a Interns,
        globals: &'a mut Vec<Value>,
        print: &'a mut dyn PrintWriter,
        os: Option<&'a OsAccess>,
    ) -> Self {
        Self {
            heap,
            interns,
            globals,
            print,
            os,
            depth: 0,
            handled: Vec::new(),
        }
    }

    /// Runs the module body; the result is the value of a trailing expression
    /// statement, `None` otherwise.
    pub(crate) fn run_module(&mut self, nodes: &[Node]) -> RunResult<Value> {
        let mut frame = Frame::new(Vec::new());
        let result = self.run_module_inner(&mut frame, nodes);
        match result {
            Ok(value) => Ok(value),
            Err(mut err) => {
                err.as_raise_mut().push_frame(FrameName::Module, frame.current_pos);
                Err(err)
            }
        }
    }

    fn run_module_inner(&mut self, frame: &mut Frame, nodes: &[Node]) -> RunResult<Value> {
        let Some((last, rest)) = nodes.split_last() else {
            return Ok(Value::None);
        };
        for node in rest {
            match self.exec_node(frame, node)? {
                Flow::Normal => {}
                _ => unreachable!("loop control flow cannot escape the module body"),
            }
        }
        if let Node::Expr(expr) = last {
            frame.current_pos = expr.position;
            self.eval(frame, expr)
        } else {
            self.exec_node(frame, last)?;
            Ok(Value::None)
        }
    }

    // === statements ===

    fn exec_block(&mut self, frame: &mut Frame, nodes: &[Node]) -> RunResult<Flow> {
        for node in nodes {
            match self.exec_node(frame, node)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_node(&mut self, frame: &mut Frame, node: &Node) -> RunResult<Flow> {
        if let Some(position) = node_position(node) {
            frame.current_pos = position;
        }
        let result = self.exec_node_inner(frame, node);
        match result {
            Err(mut err) => {
                // implicit chaining: a new exception raised while another is
                // being handled records it as __context__
                let raise = err.as_raise_mut();
                if !raise.context_decided && raise.context.is_none() {
                    raise.context = self.handled.last().copied();
                    raise.context_decided = raise.context.is_some();
                }
                Err(err)
            }
            ok => ok,
        }
    }

    fn exec_node_inner(&mut self, frame: &mut Frame, node: &Node) -> RunResult<Flow> {
        match node {
            Node::Pass | Node::Global { .. } | Node::Nonlocal { .. } => Ok(Flow::Normal),
            Node::Expr(expr) => {
                self.eval(frame, expr)?;
                Ok(Flow::Normal)
            }
            Node::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            Node::Raise { exc, cause, position } => self.exec_raise(frame, exc.as_ref(), cause.as_ref(), *position),
            Node::Assert { test, msg, .. } => {
                let value = self.eval(frame, test)?;
                if value.py_bool(self.heap, self.interns) {
                    return Ok(Flow::Normal);
                }
                match msg {
                    Some(msg) => {
                        let message = self.eval(frame, msg)?;
                        let instance = ExcInstance::new(ExcType::AssertionError, vec![message]);
                        let id = self.heap.allocate(HeapData::Exception(instance))?;
                        Err(self.raise_instance(Value::Ref(id)))
                    }
                    None => Err(ExcType::AssertionError.bare()),
                }
            }
            Node::Assign { targets, value } => {
                let value = self.eval(frame, value)?;
                for target in targets {
                    self.assign_target(frame, target, value)?;
                }
                Ok(Flow::Normal)
            }
            Node::AugAssign { target, op, value, .. } => {
                let rhs = self.eval(frame, value)?;
                match target {
                    AugTarget::Name(identifier) => {
                        let current = self.load_name(frame, identifier)?;
                        let result = ops::aug_op(op, current, rhs, self.heap, self.interns)?;
                        self.store_name(frame, identifier, result);
                    }
                    AugTarget::Subscript { object, index } => {
                        let object = self.eval(frame, object)?;
                        let index = self.eval(frame, index)?;
                        let current = self.getitem(object, index)?;
                        let result = ops::aug_op(op, current, rhs, self.heap, self.interns)?;
                        self.setitem(object, index, result)?;
                    }
                    AugTarget::Attr { object, attr } => {
                        let object = self.eval(frame, object)?;
                        let attr = self.interns.get_str(*attr);
                        // reading succeeds for data attributes, but nothing in
                        // the value model accepts attribute assignment
                        return Err(ExcType::attribute_error(object.py_type(self.heap), attr));
                    }
                }
                Ok(Flow::Normal)
            }
            Node::For {
                target,
                iter,
                body,
                or_else,
                ..
            } => {
                let iterable = self.eval(frame, iter)?;
                let mut it = ValueIter::new(iterable, self.heap, self.interns)?;
                let mut broke = false;
                loop {
                    self.heap.tracker_ref().check_interrupt()?;
                    let Some(item) = it.next(self.heap)? else {
                        break;
                    };
                    self.assign_target(frame, target, item)?;
                    match self.exec_block(frame, body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => {
                            broke = true;
                            break;
                        }
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                if !broke {
                    return self.exec_block(frame, or_else);
                }
                Ok(Flow::Normal)
            }
            Node::While { test, body, or_else } => {
                let mut broke = false;
                loop {
                    self.heap.tracker_ref().check_interrupt()?;
                    let condition = self.eval(frame, test)?;
                    if !condition.py_bool(self.heap, self.interns) {
                        break;
                    }
                    match self.exec_block(frame, body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => {
                            broke = true;
                            break;
                        }
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                if !broke {
                    return self.exec_block(frame, or_else);
                }
                Ok(Flow::Normal)
            }
            Node::If { test, body, or_else } => {
                let condition = self.eval(frame, test)?;
                if condition.py_bool(self.heap, self.interns) {
                    self.exec_block(frame, body)
                } else {
                    self.exec_block(frame, or_else)
                }
            }
            Node::Break(_) => Ok(Flow::Break),
            Node::Continue(_) => Ok(Flow::Continue),
            Node::FunctionDef(def) => {
                let closure = self.make_closure(frame, def)?;
                let binding = def.binding.as_ref().expect("statement defs carry a binding");
                self.store_name(frame, binding, closure);
                Ok(Flow::Normal)
            }
            Node::FunctionDefRaw(_) => unreachable!("raw node survived prepare"),
            Node::Try(t) => self.exec_try(frame, t),
            Node::With {
                context, var, body, ..
            } => self.exec_with(frame, context, var.as_ref(), body),
            Node::Delete { target, .. } => {
                match target {
                    DeleteTarget::Name(identifier) => self.delete_name(frame, identifier)?,
                    DeleteTarget::Subscript { object, index } => {
                        let object = self.eval(frame, object)?;
                        let index = self.eval(frame, index)?;
                        self.delitem(object, index)?;
                    }
                    DeleteTarget::Attr { object, attr } => {
                        let object = self.eval(frame, object)?;
                        let attr = self.interns.get_str(*attr);
                        return Err(ExcType::attribute_error(object.py_type(self.heap), attr));
                    }
                }
                Ok(Flow::Normal)
            }
            Node::Import { module, binding, .. } => {
                self.store_name(frame, binding, Value::Module(*module));
                Ok(Flow::Normal)
            }
            Node::ImportFrom { module, names, .. } => {
                let ModuleId::Datetime = module;
                for (import_name, binding) in names {
                    let name = self.interns.get_str(*import_name);
                    let value = datetime_mod::importable(name)
                        .expect("import names are validated at compile time");
                    self.store_name(frame, binding, value);
                }
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_raise(
        &mut self,
        frame: &mut Frame,
        exc: Option<&ExprLoc>,
        cause: Option<&ExprLoc>,
        _position: CodeRange,
    ) -> RunResult<Flow> {
        let Some(exc) = exc else {
            // bare raise re-raises the innermost handled exception
            return match self.handled.last().copied() {
                Some(instance) => Err(RunError::Exc(Box::new(ExceptionRaise {
                    payload: ExcPayload::Instance(instance),
                    frames: Vec::new(),
                    context: None,
                    context_decided: true,
                }))),
                None => Err(ExcType::RuntimeError.msg("No active exception to re-raise")),
            };
        };

        let value = self.eval(frame, exc)?;
        let instance = self.as_exception_instance(value)?;

        let mut context_decided = false;
        if let Some(cause_expr) = cause {
            context_decided = true;
            let cause_value = self.eval(frame, cause_expr)?;
            let cause_instance = match cause_value {
                Value::None => None,
                other => Some(self.as_exception_instance(other)?),
            };
            if let Value::Ref(id) = instance
                && let HeapData::Exception(exc) = self.heap.get_mut(id)
            {
                exc.cause = cause_instance;
            }
        }

        let context = if context_decided { None } else { self.handled.last().copied() };
        Err(RunError::Exc(Box::new(ExceptionRaise {
            payload: ExcPayload::Instance(instance),
            frames: Vec::new(),
            context,
            context_decided: true,
        })))
    }

    /// Normalizes `raise X`: a class constructs an empty instance, an
    /// instance passes through, anything else is the canonical `TypeError`.
    fn as_exception_instance(&mut self, value: Value) -> RunResult<Value> {
        match value {
            Value::Builtin(Builtins::Exc(exc_type)) => {
                let instance = ExcInstance::new(exc_type, Vec::new());
                Ok(Value::Ref(self.heap.allocate(HeapData::Exception(instance))?))
            }
            Value::Ref(id) if matches!(self.heap.get(id), HeapData::Exception(_)) => Ok(value),
            _ => Err(ExcType::type_error("exceptions must derive from BaseException")),
        }
    }

    fn raise_instance(&self, instance: Value) -> RunError {
        RunError::Exc(Box::new(ExceptionRaise {
            payload: ExcPayload::Instance(instance),
            frames: Vec::new(),
            context: self.handled.last().copied(),
            context_decided: true,
        }))
    }

    fn exec_try(&mut self, frame: &mut Frame, t: &Try) -> RunResult<Flow> {
        let body_result = self.exec_block(frame, &t.body);

        let pending: RunResult<Flow> = match body_result {
            Ok(Flow::Normal) => self.exec_block(frame, &t.or_else),
            Ok(flow) => Ok(flow),
            Err(err) => self.run_handlers(frame, t, err),
        };

        if t.finally.is_empty() {
            return pending;
        }
        match self.exec_block(frame, &t.finally)? {
            // a finally that completes normally lets the pending outcome through
            Flow::Normal => pending,
            // return/break/continue in finally override the pending outcome
            flow => Ok(flow),
        }
    }

    fn run_handlers(&mut self, frame: &mut Frame, t: &Try, mut err: RunError) -> RunResult<Flow> {
        let exc_type = {
            let raise = err.as_raise_mut();
            raise.exc_type(self.heap)
        };
        for handler in &t.handlers {
            let matches = match &handler.exc_type {
                None => true,
                Some(matcher) => {
                    let matcher_value = self.eval(frame, matcher)?;
                    self.handler_matches(matcher_value, exc_type)?
                }
            };
            if !matches {
                continue;
            }
            // materialize the exception so `as e` and re-raise see a value
            let instance = err.as_raise_mut().materialize(self.heap)?;
            if let Some(name) = &handler.name {
                self.store_name(frame, name, instance);
            }
            self.handled.push(instance);
            let result = self.exec_block(frame, &handler.body);
            self.handled.pop();
            if let Some(name) = &handler.name {
                // CPython unbinds the as-name when the handler exits
                self.unbind_name(frame, name);
            }
            return result;
        }
        Err(err)
    }

    /// `except matcher:` — a class or tuple of classes.
    fn handler_matches(&mut self, matcher: Value, raised: ExcType) -> RunResult<bool> {
        match matcher {
            Value::Builtin(Builtins::Exc(handler_type)) => Ok(raised.is_subclass_of(handler_type)),
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Tuple(t) => {
                    let items = t.as_slice().to_vec();
                    for item in items {
                        if self.handler_matches(item, raised)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                _ => Err(ExcType::type_error(
                    "catching classes that do not inherit from BaseException is not allowed",
                )),
            },
            _ => Err(ExcType::type_error(
                "catching classes that do not inherit from BaseException is not allowed",
            )),
        }
    }

    fn exec_with(
        &mut self,
        frame: &mut Frame,
        context: &ExprLoc,
        var: Option<&AssignTarget>,
        body: &[Node],
    ) -> RunResult<Flow> {
        let manager = self.eval(frame, context)?;
        let entered = self.attr_call_str(manager, "__enter__", ArgValues::empty(), frame.current_pos)?;
        if let Some(var) = var {
            self.assign_target(frame, var, entered)?;
        }
        let result = self.exec_block(frame, body);
        match result {
            Ok(flow) => {
                let args = ArgValues::positional(vec![Value::None, Value::None, Value::None]);
                self.attr_call_str(manager, "__exit__", args, frame.current_pos)?;
                Ok(flow)
            }
            Err(mut err) => {
                // exit sees (type, value, traceback); truthy return suppresses
                let instance = err.as_raise_mut().materialize(self.heap)?;
                let exc_type = err.as_raise_mut().exc_type(self.heap);
                let args = ArgValues::positional(vec![
                    Value::Builtin(Builtins::Exc(exc_type)),
                    instance,
                    Value::None,
                ]);
                let suppress = self.attr_call_str(manager, "__exit__", args, frame.current_pos)?;
                if suppress.py_bool(self.heap, self.interns) {
                    Ok(Flow::Normal)
                } else {
                    Err(err)
                }
            }
        }
    }

    // === names ===

    fn load_name(&mut self, frame: &Frame, identifier: &Identifier) -> RunResult<Value> {
        let name = || self.interns.get_str(identifier.name_id);
        match identifier.scope {
            NameScope::Local => match frame.locals[identifier.slot as usize] {
                Value::Undefined => Err(ExcType::unbound_local(name())),
                value => Ok(value),
            },
            NameScope::Cell => {
                let Value::Ref(cell_id) = frame.locals[identifier.slot as usize] else {
                    return Err(ExcType::unbound_local(name()));
                };
                match self.heap.get(cell_id) {
                    HeapData::Cell(Value::Undefined) => Err(ExcType::unbound_local(name())),
                    HeapData::Cell(value) => Ok(*value),
                    _ => unreachable!("cell slot holds non-cell"),
                }
            }
            NameScope::Global => {
                if identifier.slot != u32::MAX {
                    match self.globals[identifier.slot as usize] {
                        Value::Undefined => {}
                        value => return Ok(value),
                    }
                }
                crate::builtins::lookup_builtin(name()).ok_or_else(|| ExcType::name_error(name()))
            }
        }
    }

    fn store_name(&mut self, frame: &mut Frame, identifier: &Identifier, value: Value) {
        match identifier.scope {
            NameScope::Local => frame.locals[identifier.slot as usize] = value,
            NameScope::Cell => {
                let Value::Ref(cell_id) = frame.locals[identifier.slot as usize] else {
                    unreachable!("cell slot missing its cell");
                };
                let HeapData::Cell(slot) = self.heap.get_mut(cell_id) else {
                    unreachable!("cell slot holds non-cell");
                };
                *slot = value;
            }
            NameScope::Global => {
                debug_assert!(identifier.slot != u32::MAX, "assignment to unslotted global");
                self.globals[identifier.slot as usize] = value;
            }
        }
    }

    fn unbind_name(&mut self, frame: &mut Frame, identifier: &Identifier) {
        match identifier.scope {
            NameScope::Local => frame.locals[identifier.slot as usize] = Value::Undefined,
            NameScope::Cell => {
                if let Value::Ref(cell_id) = frame.locals[identifier.slot as usize]
                    && let HeapData::Cell(slot) = self.heap.get_mut(cell_id)
                {
                    *slot = Value::Undefined;
                }
            }
            NameScope::Global => {
                if identifier.slot != u32::MAX {
                    self.globals[identifier.slot as usize] = Value::Undefined;
                }
            }
        }
    }

    fn delete_name(&mut self, frame: &mut Frame, identifier: &Identifier) -> RunResult<()> {
        // a delete of an unbound name raises like a read would
        self.load_name(frame, identifier)?;
        self.unbind_name(frame, identifier);
        Ok(())
    }

    // === assignment ===

    fn assign_target(&mut self, frame: &mut Frame, target: &AssignTarget, value: Value) -> RunResult<()> {
        match target {
            AssignTarget::Name(identifier) => {
                self.store_name(frame, identifier, value);
                Ok(())
            }
            AssignTarget::Subscript { object, index, .. } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                self.setitem(object, index, value)
            }
            AssignTarget::Attr { object, attr, .. } => {
                let object = self.eval(frame, object)?;
                let attr = self.interns.get_str(*attr);
                Err(ExcType::attribute_error(object.py_type(self.heap), attr))
            }
            AssignTarget::Unpack { items, .. } => self.unpack_assign(frame, items, value),
        }
    }

    fn unpack_assign(&mut self, frame: &mut Frame, items: &[UnpackItem], value: Value) -> RunResult<()> {
        let values = iterate_to_vec(value, self.heap, self.interns)?;
        let star_index = items.iter().position(|item| matches!(item, UnpackItem::Starred(_)));

        match star_index {
            None => {
                if values.len() < items.len() {
                    return Err(ExcType::value_error(format!(
                        "not enough values to unpack (expected {}, got {})",
                        items.len(),
                        values.len()
                    )));
                }
                if values.len() > items.len() {
                    return Err(ExcType::value_error(format!(
                        "too many values to unpack (expected {})",
                        items.len()
                    )));
                }
                for (item, value) in items.iter().zip(values) {
                    let UnpackItem::Plain(target) = item else { unreachable!() };
                    self.assign_target(frame, target, value)?;
                }
                Ok(())
            }
            Some(star) => {
                let min_needed = items.len() - 1;
                if values.len() < min_needed {
                    return Err(ExcType::value_error(format!(
                        "not enough values to unpack (expected at least {min_needed}, got {})",
                        values.len()
                    )));
                }
                let after = items.len() - star - 1;
                let middle_len = values.len() - min_needed;
                let mut cursor = values.into_iter();
                for item in &items[..star] {
                    let UnpackItem::Plain(target) = item else { unreachable!() };
                    let value = cursor.next().expect("length checked");
                    self.assign_target(frame, target, value)?;
                }
                let middle: Vec<Value> = cursor.by_ref().take(middle_len).collect();
                let middle = self.heap.alloc_list(middle)?;
                let UnpackItem::Starred(star_target) = &items[star] else { unreachable!() };
                self.assign_target(frame, star_target, middle)?;
                for item in &items[star + 1..star + 1 + after] {
                    let UnpackItem::Plain(target) = item else { unreachable!() };
                    let value = cursor.next().expect("length checked");
                    self.assign_target(frame, target, value)?;
                }
                Ok(())
            }
        }
    }

    // === expressions ===

    pub(crate) fn eval(&mut self, frame: &mut Frame, expr: &ExprLoc) -> RunResult<Value> {
        match &expr.expr {
            Expr::Literal(literal) => Ok(self.literal_value(literal)),
            Expr::Name(identifier) => self.load_name(frame, identifier),
            Expr::Tuple(items) => {
                let values = self.eval_items(frame, items)?;
                Ok(self.heap.alloc_tuple(values)?)
            }
            Expr::List(items) => {
                let values = self.eval_items(frame, items)?;
                Ok(self.heap.alloc_list(values)?)
            }
            Expr::Set(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(frame, item)?);
                }
                let storage = storage_from_values(values, self.heap, self.interns)?;
                Ok(Value::Ref(self.heap.allocate(HeapData::Set(Set::new(storage)))?))
            }
            Expr::Dict(items) => {
                let mut dict = Dict::new();
                for item in items {
                    match item {
                        DictItem::Pair(key_expr, value_expr) => {
                            let key = self.eval(frame, key_expr)?;
                            let value = self.eval(frame, value_expr)?;
                            let hash = hash_key(key, self.heap, self.interns)?;
                            dict.insert(key, hash, value, self.heap, self.interns)?;
                        }
                        DictItem::Unpack(mapping_expr) => {
                            let mapping = self.eval(frame, mapping_expr)?;
                            let Value::Ref(id) = mapping else {
                                return Err(ExcType::type_error(format!(
                                    "'{}' object is not a mapping",
                                    mapping.py_type(self.heap)
                                )));
                            };
                            let HeapData::Dict(source) = self.heap.get(id) else {
                                return Err(ExcType::type_error(format!(
                                    "'{}' object is not a mapping",
                                    mapping.py_type(self.heap)
                                )));
                            };
                            let entries: Vec<_> = source.entries().to_vec();
                            for entry in entries {
                                dict.insert(entry.key, entry.hash, entry.value, self.heap, self.interns)?;
                            }
                        }
                    }
                }
                Ok(Value::Ref(self.heap.allocate(HeapData::Dict(dict))?))
            }
            Expr::Op { left, op, right } => match op {
                Operator::And => {
                    let left = self.eval(frame, left)?;
                    if left.py_bool(self.heap, self.interns) {
                        self.eval(frame, right)
                    } else {
                        Ok(left)
                    }
                }
                Operator::Or => {
                    let left = self.eval(frame, left)?;
                    if left.py_bool(self.heap, self.interns) {
                        Ok(left)
                    } else {
                        self.eval(frame, right)
                    }
                }
                _ => {
                    let left = self.eval(frame, left)?;
                    let right = self.eval(frame, right)?;
                    ops::binary_op(op, left, right, self.heap, self.interns)
                }
            },
            Expr::CmpOp { left, comparisons } => {
                let mut current = self.eval(frame, left)?;
                for (op, comparator) in comparisons {
                    let right = self.eval(frame, comparator)?;
                    let outcome = ops::cmp_op(op, current, right, self.heap, self.interns)?;
                    if !outcome.py_bool(self.heap, self.interns) {
                        return Ok(Value::Bool(false));
                    }
                    current = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Not(inner) => {
                let value = self.eval(frame, inner)?;
                Ok(Value::Bool(!value.py_bool(self.heap, self.interns)))
            }
            Expr::UnaryMinus(inner) => {
                let value = self.eval(frame, inner)?;
                ops::unary_minus(value, self.heap, self.interns)
            }
            Expr::UnaryPlus(inner) => {
                let value = self.eval(frame, inner)?;
                ops::unary_plus(value, self.heap, self.interns)
            }
            Expr::UnaryInvert(inner) => {
                let value = self.eval(frame, inner)?;
                ops::unary_invert(value, self.heap, self.interns)
            }
            Expr::Subscript { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                self.getitem(object, index)
            }
            Expr::Slice { lower, upper, step } => {
                let start = match lower {
                    Some(e) => self.eval(frame, e)?,
                    None => Value::None,
                };
                let stop = match upper {
                    Some(e) => self.eval(frame, e)?,
                    None => Value::None,
                };
                let step = match step {
                    Some(e) => self.eval(frame, e)?,
                    None => Value::None,
                };
                Ok(Value::Ref(self.heap.allocate(HeapData::Slice(Slice { start, stop, step }))?))
            }
            Expr::Call { callable, args } => {
                let callable = self.eval(frame, callable)?;
                let args = self.eval_args(frame, args)?;
                self.call_value(callable, args, frame.current_pos)
            }
            Expr::AttrGet { object, attr } => {
                let object = self.eval(frame, object)?;
                self.getattr(object, *attr)
            }
            Expr::AttrCall { object, attr, args } => {
                let object = self.eval(frame, object)?;
                let args = self.eval_args(frame, args)?;
                let attr = self.interns.get_str(*attr).to_owned();
                self.attr_call_str(object, &attr, args, frame.current_pos)
            }
            Expr::FString(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        FStringPart::Literal(id) => out.push_str(self.interns.get_str(*id)),
                        FStringPart::Interpolation {
                            expr,
                            conversion,
                            spec,
                        } => {
                            let value = self.eval(frame, expr)?;
                            let spec = match spec {
                                Some(id) => FormatSpec::parse(self.interns.get_str(*id))?,
                                None => FormatSpec::parse("")?,
                            };
                            let rendered = match conversion {
                                ConversionFlag::Repr | ConversionFlag::Ascii => {
                                    let text = repr_value(&value, self.heap, self.interns)?;
                                    let as_str = self.heap.alloc_str(text)?;
                                    format_value(&as_str, &spec, self.heap, self.interns)?
                                }
                                ConversionFlag::Str => {
                                    let text = str_value(&value, self.heap, self.interns)?;
                                    let as_str = self.heap.alloc_str(text)?;
                                    format_value(&as_str, &spec, self.heap, self.interns)?
                                }
                                ConversionFlag::None => format_value(&value, &spec, self.heap, self.interns)?,
                            };
                            out.push_str(&rendered);
                        }
                    }
                }
                Ok(self.heap.alloc_str(out)?)
            }
            Expr::IfElse { test, body, orelse } => {
                let condition = self.eval(frame, test)?;
                if condition.py_bool(self.heap, self.interns) {
                    self.eval(frame, body)
                } else {
                    self.eval(frame, orelse)
                }
            }
            Expr::Lambda(def) => self.make_closure(frame, def),
            Expr::LambdaRaw(_) => unreachable!("raw node survived prepare"),
            Expr::ListComp { elt, generators } | Expr::GeneratorExp { elt, generators } => {
                let mut items = Vec::new();
                self.run_comp(frame, generators, 0, &mut |interp, frame| {
                    let value = interp.eval(frame, elt)?;
                    interp.heap.tracker().on_container_insert()?;
                    items.push(value);
                    Ok(())
                })?;
                Ok(self.heap.alloc_list(items)?)
            }
            Expr::SetComp { elt, generators } => {
                let mut items = Vec::new();
                self.run_comp(frame, generators, 0, &mut |interp, frame| {
                    let value = interp.eval(frame, elt)?;
                    interp.heap.tracker().on_container_insert()?;
                    items.push(value);
                    Ok(())
                })?;
                let storage = storage_from_values(items, self.heap, self.interns)?;
                Ok(Value::Ref(self.heap.allocate(HeapData::Set(Set::new(storage)))?))
            }
            Expr::DictComp { key, value, generators } => {
                let mut pairs = Vec::new();
                self.run_comp(frame, generators, 0, &mut |interp, frame| {
                    let k = interp.eval(frame, key)?;
                    let v = interp.eval(frame, value)?;
                    interp.heap.tracker().on_container_insert()?;
                    pairs.push((k, v));
                    Ok(())
                })?;
                let mut dict = Dict::new();
                for (k, v) in pairs {
                    let hash = hash_key(k, self.heap, self.interns)?;
                    dict.insert(k, hash, v, self.heap, self.interns)?;
                }
                Ok(Value::Ref(self.heap.allocate(HeapData::Dict(dict))?))
            }
            Expr::Named { target, value } => {
                let value = self.eval(frame, value)?;
                self.store_name(frame, target, value);
                Ok(value)
            }
        }
    }

    fn literal_value(&self, literal: &Literal) -> Value {
        match literal {
            Literal::None => Value::None,
            Literal::Ellipsis => Value::Ellipsis,
            Literal::NotImplemented => Value::NotImplemented,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Str(id) => Value::InternString(*id),
            Literal::Bytes(id) => Value::InternBytes(*id),
            Literal::LongInt(id) => Value::InternLongInt(*id),
        }
    }

    fn eval_items(&mut self, frame: &mut Frame, items: &[ExprItem]) -> RunResult<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ExprItem::Plain(expr) => values.push(self.eval(frame, expr)?),
                ExprItem::Starred(expr) => {
                    let iterable = self.eval(frame, expr)?;
                    values.extend(iterate_to_vec(iterable, self.heap, self.interns)?);
                }
            }
        }
        Ok(values)
    }

    fn eval_args(&mut self, frame: &mut Frame, args: &ArgExprs) -> RunResult<ArgValues> {
        let pos = self.eval_items(frame, &args.pos)?;
        let mut kwargs: Vec<(String, Value)> = Vec::with_capacity(args.kwargs.len());
        for (name_id, expr) in &args.kwargs {
            let name = self.interns.get_str(*name_id).to_owned();
            let value = self.eval(frame, expr)?;
            if kwargs.iter().any(|(existing, _)| *existing == name) {
                return Err(ExcType::type_error(format!(
                    "got multiple values for keyword argument '{name}'"
                )));
            }
            kwargs.push((name, value));
        }
        for star in &args.star_kwargs {
            let mapping = self.eval(frame, star)?;
            let Value::Ref(id) = mapping else {
                return Err(ExcType::type_error(format!(
                    "argument after ** must be a mapping, not {}",
                    mapping.py_type(self.heap)
                )));
            };
            let HeapData::Dict(_) = self.heap.get(id) else {
                return Err(ExcType::type_error(format!(
                    "argument after ** must be a mapping, not {}",
                    mapping.py_type(self.heap)
                )));
            };
            for (key, value) in methods::dict_entries(id, self.heap) {
                let Some(name) = value_as_str(&key, self.heap, self.interns) else {
                    return Err(ExcType::type_error("keywords must be strings"));
                };
                let name = name.to_owned();
                if kwargs.iter().any(|(existing, _)| *existing == name) {
                    return Err(ExcType::type_error(format!(
                        "got multiple values for keyword argument '{name}'"
                    )));
                }
                kwargs.push((name, value));
            }
        }
        Ok(ArgValues { pos, kwargs })
    }

    fn run_comp(
        &mut self,
        frame: &mut Frame,
        generators: &[Comprehension],
        index: usize,
        emit: &mut dyn FnMut(&mut Self, &mut Frame) -> RunResult<()>,
    ) -> RunResult<()> {
        let generator = &generators[index];
        let iterable = self.eval(frame, &generator.iter)?;
        let mut it = ValueIter::new(iterable, self.heap, self.interns)?;
        'items: loop {
            self.heap.tracker_ref().check_interrupt()?;
            let Some(item) = it.next(self.heap)? else {
                break;
            };
            self.assign_target(frame, &generator.target, item)?;
            for condition in &generator.ifs {
                let keep = self.eval(frame, condition)?;
                if !keep.py_bool(self.heap, self.interns) {
                    continue 'items;
                }
            }
            if index + 1 < generators.len() {
                self.run_comp(frame, generators, index + 1, emit)?;
            } else {
                emit(self, frame)?;
            }
        }
        Ok(())
    }

    // === function definition and calls ===

    fn make_closure(&mut self, frame: &mut Frame, def: &FunctionDefNode) -> RunResult<Value> {
        let mut defaults = Vec::with_capacity(def.default_exprs.len());
        for expr in &def.default_exprs {
            defaults.push(self.eval(frame, expr)?);
        }
        let mut kw_defaults = Vec::with_capacity(def.kw_default_exprs.len());
        for (name, expr) in &def.kw_default_exprs {
            kw_defaults.push((*name, self.eval(frame, expr)?));
        }
        let mut captured = Vec::with_capacity(def.free_var_enclosing_slots.len());
        for slot in &def.free_var_enclosing_slots {
            let Value::Ref(cell_id) = frame.locals[*slot as usize] else {
                unreachable!("captured slot missing its cell");
            };
            captured.push(cell_id);
        }
        let closure = Closure {
            function_id: def.function_id,
            defaults,
            kw_defaults,
            captured,
        };
        Ok(Value::Ref(self.heap.allocate(HeapData::Closure(closure))?))
    }

    pub(crate) fn call_value(&mut self, callable: Value, args: ArgValues, position: CodeRange) -> RunResult<Value> {
        match callable {
            Value::Builtin(Builtins::Function(function)) => self.call_builtin_function(function, args, position),
            Value::Builtin(Builtins::Type(t)) => call_type(t, args, self.heap, self.interns),
            Value::Builtin(Builtins::Exc(exc)) => call_type(Type::Exception(exc), args, self.heap, self.interns),
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Closure(_) => self.call_closure(id, args, position),
                HeapData::BoundMethod(method) => {
                    let BoundMethod { receiver, method } = *method;
                    let name = self.interns.get_str(method).to_owned();
                    self.attr_call_str(receiver, &name, args, position)
                }
                _ => Err(ExcType::not_callable(callable.py_type(self.heap))),
            },
            _ => Err(ExcType::not_callable(callable.py_type(self.heap))),
        }
    }

    fn call_builtin_function(
        &mut self,
        function: BuiltinFunction,
        args: ArgValues,
        position: CodeRange,
    ) -> RunResult<Value> {
        let key = args.kwarg("key").filter(|k| !matches!(k, Value::None));
        match (function, key) {
            (BuiltinFunction::Sorted, Some(key)) => {
                args.reject_unknown_kwargs("sorted", &["key", "reverse"])?;
                args.check_arity("sorted", 1, 1)?;
                let reverse = args
                    .kwarg("reverse")
                    .map(|v| v.py_bool(self.heap, self.interns))
                    .unwrap_or(false);
                let iterable = args.pos_arg(0).expect("arity checked");
                let values = iterate_to_vec(iterable, self.heap, self.interns)?;
                let pairs = self.keyed_pairs(values, key, position)?;
                let sorted = ops::sort_pairs(pairs, self.heap, self.interns, reverse)?;
                let result: Vec<Value> = sorted.into_iter().map(|(_, v)| v).collect();
                Ok(self.heap.alloc_list(result)?)
            }
            (BuiltinFunction::Min | BuiltinFunction::Max, Some(key)) => {
                let is_max = function == BuiltinFunction::Max;
                let fname = if is_max { "max" } else { "min" };
                args.reject_unknown_kwargs(fname, &["key", "default"])?;
                let default = args.kwarg("default");
                let candidates = collect_candidates(&args, fname, default.is_some(), self.heap, self.interns)?;
                let pairs = self.keyed_pairs(candidates, key, position)?;
                match min_max_pick(pairs, is_max, self.heap, self.interns)? {
                    Some(value) => Ok(value),
                    None => {
                        default.ok_or_else(|| ExcType::value_error(format!("{fname}() arg is an empty sequence")))
                    }
                }
            }
            _ => call_builtin(function, args, self.heap, self.interns, self.print),
        }
    }

    /// Calls `key(item)` for each item, pairing keys with their items.
    fn keyed_pairs(
        &mut self,
        values: Vec<Value>,
        key: Value,
        position: CodeRange,
    ) -> RunResult<Vec<(Value, Value)>> {
        let mut pairs = Vec::with_capacity(values.len());
        for value in values {
            let computed = self.call_value(key, ArgValues::positional(vec![value]), position)?;
            pairs.push((computed, value));
        }
        Ok(pairs)
    }

    fn call_closure(&mut self, closure_id: HeapId, args: ArgValues, position: CodeRange) -> RunResult<Value> {
        let HeapData::Closure(closure) = self.heap.get(closure_id) else {
            unreachable!("checked closure");
        };
        let closure = closure.clone();
        let interns = self.interns;
        let func = interns.get_function(closure.function_id);

        self.heap.tracker_ref().check_recursion_depth(self.depth)?;
        self.heap.tracker_ref().check_interrupt()?;

        let locals = self.bind_args(func, &closure, args)?;
        let mut frame = Frame {
            locals,
            current_pos: position,
        };
        self.depth += 1;
        let result = self.exec_block(&mut frame, &func.body);
        self.depth -= 1;
        match result {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(_) => Ok(Value::None),
            Err(mut err) => {
                err.as_raise_mut()
                    .push_frame(FrameName::Function(func.name_id), frame.current_pos);
                Err(err)
            }
        }
    }

    /// Binds call arguments into a fresh local slot vector per the prepared
    /// signature, seeding cells afterwards.
    fn bind_args(
        &mut self,
        func: &crate::expressions::FunctionDef,
        closure: &Closure,
        args: ArgValues,
    ) -> RunResult<Vec<Value>> {
        let signature = &func.signature;
        let interns = self.interns;
        let fname = interns.get_str(func.name_id);
        let mut locals = vec![Value::Undefined; func.namespace_size];

        let param_count = signature.params.len();
        let vararg_slot = param_count;
        let kwonly_start = vararg_slot + usize::from(signature.vararg.is_some());
        let kwarg_slot = kwonly_start + signature.kwonly.len();

        // positional arguments
        let ArgValues { pos, kwargs } = args;
        let mut extra_positional = Vec::new();
        for (index, value) in pos.into_iter().enumerate() {
            if index < param_count {
                locals[index] = value;
            } else {
                extra_positional.push(value);
            }
        }
        if !extra_positional.is_empty() && signature.vararg.is_none() {
            let given = param_count + extra_positional.len();
            return Err(ExcType::type_error(format!(
                "{fname}() takes {param_count} positional argument{} but {given} were given",
                if param_count == 1 { "" } else { "s" }
            )));
        }
        if signature.vararg.is_some() {
            let tuple = self.heap.alloc_tuple(extra_positional)?;
            locals[vararg_slot] = tuple;
        }

        // keyword arguments
        let mut extra_kwargs: Vec<(String, Value)> = Vec::new();
        for (name, value) in kwargs {
            let slot = signature
                .params
                .iter()
                .position(|p| interns.get_str(*p) == name)
                .or_else(|| {
                    signature
                        .kwonly
                        .iter()
                        .position(|p| interns.get_str(*p) == name)
                        .map(|i| kwonly_start + i)
                });
            match slot {
                Some(slot) => {
                    if !matches!(locals[slot], Value::Undefined) {
                        return Err(ExcType::type_error(format!(
                            "{fname}() got multiple values for argument '{name}'"
                        )));
                    }
                    locals[slot] = value;
                }
                None => {
                    if signature.kwarg.is_none() {
                        return Err(ExcType::type_error(format!(
                            "{fname}() got an unexpected keyword argument '{name}'"
                        )));
                    }
                    extra_kwargs.push((name, value));
                }
            }
        }
        if signature.kwarg.is_some() {
            let mut dict = Dict::new();
            for (name, value) in extra_kwargs {
                let key = self.heap.alloc_str(name)?;
                let hash = hash_key(key, self.heap, self.interns)?;
                dict.insert(key, hash, value, self.heap, self.interns)?;
            }
            locals[kwarg_slot] = Value::Ref(self.heap.allocate(HeapData::Dict(dict))?);
        }

        // defaults for missing positional-or-keyword parameters
        let defaults_start = param_count - signature.num_defaults;
        let mut missing: Vec<String> = Vec::new();
        for index in 0..param_count {
            if matches!(locals[index], Value::Undefined) {
                if index >= defaults_start {
                    locals[index] = closure.defaults[index - defaults_start];
                } else {
                    missing.push(format!("'{}'", interns.get_str(signature.params[index])));
                }
            }
        }
        if !missing.is_empty() {
            return Err(ExcType::type_error(format!(
                "{fname}() missing {} required positional argument{}: {}",
                missing.len(),
                if missing.len() == 1 { "" } else { "s" },
                missing.join(" and ")
            )));
        }

        // keyword-only defaults
        for (offset, name_id) in signature.kwonly.iter().enumerate() {
            let slot = kwonly_start + offset;
            if matches!(locals[slot], Value::Undefined) {
                match closure.kw_defaults.iter().find(|(n, _)| n == name_id) {
                    Some((_, value)) => locals[slot] = *value,
                    None => {
                        return Err(ExcType::type_error(format!(
                            "{fname}() missing 1 required keyword-only argument: '{}'",
                            interns.get_str(*name_id)
                        )));
                    }
                }
            }
        }

        // wrap captured parameters and seed fresh cells
        for slot in &func.cell_param_slots {
            let value = locals[*slot as usize];
            let cell = self.heap.allocate(HeapData::Cell(value))?;
            locals[*slot as usize] = Value::Ref(cell);
        }
        for slot in &func.cell_init_slots {
            let cell = self.heap.allocate(HeapData::Cell(Value::Undefined))?;
            locals[*slot as usize] = Value::Ref(cell);
        }
        for (index, slot) in func.free_var_slots.iter().enumerate() {
            locals[*slot as usize] = Value::Ref(closure.captured[index]);
        }

        Ok(locals)
    }

    // === attributes ===

    fn getattr(&mut self, object: Value, attr_id: StringId) -> RunResult<Value> {
        let attr = self.interns.get_str(attr_id);
        match object {
            Value::Module(ModuleId::Datetime) => datetime_mod::module_attr(attr),
            Value::Builtin(Builtins::Type(t)) => {
                if let Some(value) = methods::type_attr(t, attr, self.heap)? {
                    return Ok(value);
                }
                if methods::type_has_classmethod(t, attr) {
                    let method = BoundMethod {
                        receiver: object,
                        method: attr_id,
                    };
                    return Ok(Value::Ref(self.heap.allocate(HeapData::BoundMethod(method))?));
                }
                Err(ExcType::AttributeError.msg(format!("type object '{t}' has no attribute '{attr}'")))
            }
            _ => {
                if let Some(value) = methods::get_attr(object, attr, self.heap)? {
                    return Ok(value);
                }
                if methods::has_method(object.py_type(self.heap), attr) {
                    let method = BoundMethod {
                        receiver: object,
                        method: attr_id,
                    };
                    return Ok(Value::Ref(self.heap.allocate(HeapData::BoundMethod(method))?));
                }
                Err(ExcType::attribute_error(object.py_type(self.heap), attr))
            }
        }
    }

    /// `obj.method(args)` by name; also the call path for bound methods.
    fn attr_call_str(
        &mut self,
        object: Value,
        attr: &str,
        args: ArgValues,
        position: CodeRange,
    ) -> RunResult<Value> {
        // module attribute calls: datetime.timedelta(...)
        if let Value::Module(ModuleId::Datetime) = object {
            let target = datetime_mod::module_attr(attr)?;
            return self.call_value(target, args, position);
        }
        // classmethods on type objects, including the clock-backed ones
        if let Value::Builtin(Builtins::Type(t)) = object {
            return self.type_classmethod_call(t, attr, args, position);
        }
        // list.sort(key=...) re-enters script code; intercept before dispatch
        if let Value::Ref(id) = object
            && matches!(self.heap.get(id), HeapData::List(_))
            && attr == "sort"
            && let Some(key) = args.kwarg("key").filter(|k| !matches!(k, Value::None))
        {
            args.reject_unknown_kwargs("sort", &["key", "reverse"])?;
            args.check_arity("sort", 0, 0)?;
            let reverse = args
                .kwarg("reverse")
                .map(|v| v.py_bool(self.heap, self.interns))
                .unwrap_or(false);
            let items = methods::snapshot_list(id, self.heap);
            let pairs = self.keyed_pairs(items, key, position)?;
            let sorted = ops::sort_pairs(pairs, self.heap, self.interns, reverse)?;
            let values: Vec<Value> = sorted.into_iter().map(|(_, v)| v).collect();
            let HeapData::List(list) = self.heap.get_mut(id) else { unreachable!() };
            *list.as_vec_mut() = values;
            return Ok(Value::None);
        }

        if let Some(result) = methods::call_method(object, attr, args, self.heap, self.interns)? {
            return Ok(result);
        }
        Err(ExcType::attribute_error(object.py_type(self.heap), attr))
    }

    fn type_classmethod_call(
        &mut self,
        t: Type,
        attr: &str,
        args: ArgValues,
        position: CodeRange,
    ) -> RunResult<Value> {
        match (t, attr) {
            (Type::Date, "today") => {
                args.exactly_none("today")?;
                let clock = self.clock()?;
                let date = datetime::date_from_clock(&clock)?;
                Ok(Value::Ref(self.heap.allocate(HeapData::Date(date))?))
            }
            (Type::Date, "fromordinal") => {
                let ordinal = args.exactly_one("fromordinal")?;
                let ordinal = ordinal.expect_index(self.heap, self.interns, "fromordinal")?;
                let date = datetime::Date::fromordinal(ordinal)?;
                Ok(Value::Ref(self.heap.allocate(HeapData::Date(date))?))
            }
            (Type::DateTime, "now") => {
                args.no_kwargs("now")?;
                args.check_arity("now", 0, 1)?;
                let tz = match args.pos_arg(0) {
                    None | Some(Value::None) => None,
                    Some(tz) => Some(tz),
                };
                let clock = self.clock()?;
                let dt = datetime::datetime_from_clock(&clock, tz, self.heap)?;
                Ok(Value::Ref(self.heap.allocate(HeapData::DateTime(dt))?))
            }
            (Type::DateTime, "combine") => {
                args.no_kwargs("combine")?;
                args.check_arity("combine", 2, 2)?;
                let date_value = args.pos_arg(0).expect("arity checked");
                let time_value = args.pos_arg(1).expect("arity checked");
                let (Value::Ref(date_id), Value::Ref(time_id)) = (date_value, time_value) else {
                    return Err(ExcType::type_error("combine() requires a date and a time"));
                };
                let (HeapData::Date(date), HeapData::Time(time)) =
                    (self.heap.get(date_id), self.heap.get(time_id))
                else {
                    return Err(ExcType::type_error("combine() requires a date and a time"));
                };
                let dt = DateTime {
                    date: *date,
                    time: *time,
                };
                Ok(Value::Ref(self.heap.allocate(HeapData::DateTime(dt))?))
            }
            _ => {
                // plain class attributes can hold callables (timezone.utc is
                // not callable, so this path is attribute-error in practice)
                match methods::type_attr(t, attr, self.heap)? {
                    Some(value) => self.call_value(value, args, position),
                    None => {
                        Err(ExcType::AttributeError.msg(format!("type object '{t}' has no attribute '{attr}'")))
                    }
                }
            }
        }
    }

    fn clock(&self) -> RunResult<crate::types::datetime::LocalClock> {
        match self.os {
            Some(os) => os.clock_local(),
            None => Err(missing_capability("clock_local")),
        }
    }

    // === subscripts ===

    fn getitem(&mut self, object: Value, index: Value) -> RunResult<Value> {
        // slice subscripts
        if let Value::Ref(index_id) = index
            && let HeapData::Slice(slice) = self.heap.get(index_id)
        {
            let slice = *slice;
            return self.get_slice(object, &slice);
        }

        if let Some(s) = value_as_str(&object, self.heap, self.interns) {
            let chars: Vec<char> = s.chars().collect();
            let raw = index.expect_index(self.heap, self.interns, "string")?;
            let Some(position) = resolve_index(raw, chars.len()) else {
                return Err(ExcType::IndexError.msg("string index out of range"));
            };
            return Ok(self.heap.alloc_str(chars[position].to_string())?);
        }
        if let Some(b) = crate::value::value_as_bytes(&object, self.heap, self.interns) {
            let b = b.to_vec();
            let raw = index.expect_index(self.heap, self.interns, "bytes")?;
            let Some(position) = resolve_index(raw, b.len()) else {
                return Err(ExcType::IndexError.msg("index out of range"));
            };
            return Ok(Value::Int(i64::from(b[position])));
        }

        let Value::Ref(id) = object else {
            return Err(ExcType::not_subscriptable(object.py_type(self.heap)));
        };
        match self.heap.get(id) {
            HeapData::List(list) => {
                let len = list.len();
                let raw = index.expect_index(self.heap, self.interns, "list")?;
                let Some(position) = resolve_index(raw, len) else {
                    return Err(ExcType::IndexError.msg("list index out of range"));
                };
                let HeapData::List(list) = self.heap.get(id) else { unreachable!() };
                Ok(list.get(position).expect("resolved in range"))
            }
            HeapData::Tuple(tuple) => {
                let len = tuple.len();
                let raw = index.expect_index(self.heap, self.interns, "tuple")?;
                let Some(position) = resolve_index(raw, len) else {
                    return Err(ExcType::IndexError.msg("tuple index out of range"));
                };
                let HeapData::Tuple(tuple) = self.heap.get(id) else { unreachable!() };
                Ok(tuple.get(position).expect("resolved in range"))
            }
            HeapData::Dict(_) => {
                let hash = hash_key(index, self.heap, self.interns)?;
                let result = methods::with_dict(self.heap, id, |dict, heap| {
                    dict.get(index, hash, heap, self.interns)
                })?;
                match result {
                    Some(value) => Ok(value),
                    None => Err(ExcType::key_error(self.heap, index)),
                }
            }
            HeapData::Range(range) => {
                let range = *range;
                let raw = index.expect_index(self.heap, self.interns, "range")?;
                let len = range.len();
                let Some(position) = resolve_index(raw, len) else {
                    return Err(ExcType::IndexError.msg("range object index out of range"));
                };
                let value = range
                    .get(position)
                    .ok_or_else(|| ExcType::overflow_error("range element too large"))?;
                Ok(Value::Int(value))
            }
            _ => Err(ExcType::not_subscriptable(object.py_type(self.heap))),
        }
    }

    fn get_slice(&mut self, object: Value, slice: &Slice) -> RunResult<Value> {
        if let Some(s) = value_as_str(&object, self.heap, self.interns) {
            let chars: Vec<char> = s.chars().collect();
            let resolved = slice.resolve(chars.len(), self.heap, self.interns)?;
            let picked: String = resolved.indices().map(|i| chars[i]).collect();
            return Ok(self.heap.alloc_str(picked)?);
        }
        if let Some(b) = crate::value::value_as_bytes(&object, self.heap, self.interns) {
            let b = b.to_vec();
            let resolved = slice.resolve(b.len(), self.heap, self.interns)?;
            let picked: Vec<u8> = resolved.indices().map(|i| b[i]).collect();
            return Ok(self.heap.alloc_bytes(picked)?);
        }
        let Value::Ref(id) = object else {
            return Err(ExcType::not_subscriptable(object.py_type(self.heap)));
        };
        match self.heap.get(id) {
            HeapData::List(list) => {
                let items = list.as_slice().to_vec();
                let resolved = slice.resolve(items.len(), self.heap, self.interns)?;
                let picked: Vec<Value> = resolved.indices().map(|i| items[i]).collect();
                Ok(self.heap.alloc_list(picked)?)
            }
            HeapData::Tuple(tuple) => {
                let items = tuple.as_slice().to_vec();
                let resolved = slice.resolve(items.len(), self.heap, self.interns)?;
                let picked: Vec<Value> = resolved.indices().map(|i| items[i]).collect();
                Ok(self.heap.alloc_tuple(picked)?)
            }
            HeapData::Range(range) => {
                let range = *range;
                let resolved = slice.resolve(range.len(), self.heap, self.interns)?;
                let start = range.get(resolved.start).unwrap_or(range.stop());
                let step = range.step() * resolved.step;
                let stop = start + step * resolved.len as i64;
                let sliced = Range::new(start, stop, step)?;
                Ok(Value::Ref(self.heap.allocate(HeapData::Range(sliced))?))
            }
            _ => Err(ExcType::not_subscriptable(object.py_type(self.heap))),
        }
    }

    fn setitem(&mut self, object: Value, index: Value, value: Value) -> RunResult<()> {
        let Value::Ref(id) = object else {
            return Err(ExcType::type_error(format!(
                "'{}' object does not support item assignment",
                object.py_type(self.heap)
            )));
        };
        // slice assignment
        if let Value::Ref(index_id) = index
            && let HeapData::Slice(slice) = self.heap.get(index_id)
            && matches!(self.heap.get(id), HeapData::List(_))
        {
            let slice = *slice;
            return self.set_list_slice(id, &slice, value);
        }
        match self.heap.get(id) {
            HeapData::List(list) => {
                let len = list.len();
                let raw = index.expect_index(self.heap, self.interns, "list")?;
                let Some(position) = resolve_index(raw, len) else {
                    return Err(ExcType::IndexError.msg("list assignment index out of range"));
                };
                let HeapData::List(list) = self.heap.get_mut(id) else { unreachable!() };
                list.as_vec_mut()[position] = value;
                Ok(())
            }
            HeapData::Dict(_) => {
                let hash = hash_key(index, self.heap, self.interns)?;
                methods::with_dict(self.heap, id, |dict, heap| {
                    dict.insert(index, hash, value, heap, self.interns)
                })?;
                Ok(())
            }
            _ => Err(ExcType::type_error(format!(
                "'{}' object does not support item assignment",
                object.py_type(self.heap)
            ))),
        }
    }

    fn set_list_slice(&mut self, id: HeapId, slice: &Slice, value: Value) -> RunResult<()> {
        let items = methods::snapshot_list(id, self.heap);
        let resolved = slice.resolve(items.len(), self.heap, self.interns)?;
        let replacement = iterate_to_vec(value, self.heap, self.interns)?;
        if resolved.step == 1 {
            let mut new_items = Vec::with_capacity(items.len() + replacement.len());
            new_items.extend_from_slice(&items[..resolved.start]);
            new_items.extend_from_slice(&replacement);
            new_items.extend_from_slice(&items[resolved.start.max(resolved.stop.min(items.len()))..]);
            let HeapData::List(list) = self.heap.get_mut(id) else { unreachable!() };
            *list.as_vec_mut() = new_items;
            Ok(())
        } else {
            if replacement.len() != resolved.len {
                return Err(ExcType::value_error(format!(
                    "attempt to assign sequence of size {} to extended slice of size {}",
                    replacement.len(),
                    resolved.len
                )));
            }
            let mut new_items = items;
            for (target, value) in resolved.indices().zip(replacement) {
                new_items[target] = value;
            }
            let HeapData::List(list) = self.heap.get_mut(id) else { unreachable!() };
            *list.as_vec_mut() = new_items;
            Ok(())
        }
    }

    fn delitem(&mut self, object: Value, index: Value) -> RunResult<()> {
        let Value::Ref(id) = object else {
            return Err(ExcType::type_error(format!(
                "'{}' object doesn't support item deletion",
                object.py_type(self.heap)
            )));
        };
        if let Value::Ref(index_id) = index
            && let HeapData::Slice(slice) = self.heap.get(index_id)
            && matches!(self.heap.get(id), HeapData::List(_))
        {
            let slice = *slice;
            let items = methods::snapshot_list(id, self.heap);
            let resolved = slice.resolve(items.len(), self.heap, self.interns)?;
            let drop: ahash::AHashSet<usize> = resolved.indices().collect();
            let kept: Vec<Value> = items
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !drop.contains(i))
                .map(|(_, v)| v)
                .collect();
            let HeapData::List(list) = self.heap.get_mut(id) else { unreachable!() };
            *list.as_vec_mut() = kept;
            return Ok(());
        }
        match self.heap.get(id) {
            HeapData::List(list) => {
                let len = list.len();
                let raw = index.expect_index(self.heap, self.interns, "list")?;
                let Some(position) = resolve_index(raw, len) else {
                    return Err(ExcType::IndexError.msg("list assignment index out of range"));
                };
                let HeapData::List(list) = self.heap.get_mut(id) else { unreachable!() };
                list.as_vec_mut().remove(position);
                Ok(())
            }
            HeapData::Dict(_) => {
                let hash = hash_key(index, self.heap, self.interns)?;
                let removed = methods::with_dict(self.heap, id, |dict, heap| {
                    dict.remove(index, hash, heap, self.interns)
                })?;
                match removed {
                    Some(_) => Ok(()),
                    None => Err(ExcType::key_error(self.heap, index)),
                }
            }
            _ => Err(ExcType::type_error(format!(
                "'{}' object doesn't support item deletion",
                object.py_type(self.heap)
            ))),
        }
    }
}

/// Position for traceback bookkeeping, when the statement carries one.
fn node_position(node: &Node) -> Option<CodeRange> {
    match node {
        Node::Expr(expr) => Some(expr.position),
        Node::Return { position, .. }
        | Node::Raise { position, .. }
        | Node::Assert { position, .. }
        | Node::AugAssign { position, .. }
        | Node::For { position, .. }
        | Node::With { position, .. }
        | Node::Delete { position, .. }
        | Node::Import { position, .. }
        | Node::ImportFrom { position, .. }
        | Node::Break(position)
        | Node::Continue(position) => Some(*position),
        Node::Assign { value, .. } => Some(value.position),
        Node::While { test, .. } | Node::If { test, .. } => Some(test.position),
        Node::FunctionDef(def) => Some(def.position),
        Node::Try(t) => t.body.first().and_then(node_position),
        _ => None,
    }
}

