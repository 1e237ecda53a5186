//! The public embedding interface.
//!
//! `Monty::new` compiles a source string (parse + scope resolution); `run`
//! evaluates it against a fresh arena with host-supplied inputs, resource
//! limits, capabilities and print writer, and returns the value of the final
//! expression converted back to an [`Object`]. Compiled programs serialize
//! with `dump`/`load` so hosts can cache them.

use crate::{
    capability::OsAccess,
    exception::{ExcPayload, FrameName, RawFrame, RunError},
    exception_public::{Exception, StackFrame},
    expressions::Node,
    heap::{Heap, HeapData},
    intern::{Interns, StringId},
    interp::Interp,
    io::{PrintWriter, StdPrint},
    object::{Object, object_to_value, value_to_object},
    parse::parse,
    prepare::prepare,
    repr::exception_str,
    resource::{NoLimitTracker, ResourceTracker},
    value::Value,
};

/// A compiled, reusable Monty program.
///
/// # Example
/// ```
/// use monty::{Monty, Object};
///
/// let m = Monty::new("x + 1".to_owned(), "<monty>", vec!["x".to_owned()]).unwrap();
/// let result = m.run_no_limits(vec![Object::Int(41)]).unwrap();
/// assert_eq!(result, Object::Int(42));
/// ```
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Monty {
    code: String,
    script_name: String,
    interns: Interns,
    nodes: Vec<Node>,
    global_names: Vec<StringId>,
    input_slots: Vec<u32>,
}

/// Per-run configuration.
pub struct RunOptions<'a, T: ResourceTracker> {
    /// Resource limits (memory, recursion depth, cancellation).
    pub tracker: T,
    /// Host capabilities; `None` makes capability-requiring operations raise
    /// `OSError`.
    pub os: Option<&'a OsAccess>,
    /// Where `print()` writes.
    pub print: &'a mut dyn PrintWriter,
    /// Seed for str/bytes hashing; `0` reproduces the reference interpreter
    /// under `PYTHONHASHSEED=0`.
    pub hash_seed: u64,
}

impl Monty {
    /// Compiles `code`. `input_names` declares host-supplied globals, bound
    /// positionally by [`Monty::run`].
    pub fn new(code: String, script_name: &str, input_names: Vec<String>) -> Result<Self, Exception> {
        let parsed = parse(&code).map_err(|err| err.into_exception(script_name, &code))?;
        let prepared = prepare(parsed, &input_names).map_err(|err| err.into_exception(script_name, &code))?;
        Ok(Self {
            code,
            script_name: script_name.to_owned(),
            interns: prepared.interns,
            nodes: prepared.nodes,
            global_names: prepared.global_names,
            input_slots: prepared.input_slots,
        })
    }

    /// The source this program was compiled from.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Serializes the compiled program.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores a program serialized with [`Monty::dump`].
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    /// Runs to completion with no limits, printing to stdout.
    pub fn run_no_limits(&self, inputs: Vec<Object>) -> Result<Object, Exception> {
        self.run(
            inputs,
            RunOptions {
                tracker: NoLimitTracker,
                os: None,
                print: &mut StdPrint,
                hash_seed: 0,
            },
        )
    }

    /// Runs to completion. The arena, frames and traceback storage live for
    /// exactly this call and are released when it returns, whatever the
    /// outcome.
    pub fn run<T: ResourceTracker>(
        &self,
        inputs: Vec<Object>,
        options: RunOptions<'_, T>,
    ) -> Result<Object, Exception> {
        if inputs.len() != self.input_slots.len() {
            return Err(self.host_error(format!(
                "expected {} input value(s), got {}",
                self.input_slots.len(),
                inputs.len()
            )));
        }

        let mut heap = Heap::new(options.tracker, options.hash_seed);
        let mut globals = vec![Value::Undefined; self.global_names.len()];

        // bridge the inputs in
        for (object, slot) in inputs.iter().zip(&self.input_slots) {
            match object_to_value(object, &mut heap, &self.interns) {
                Ok(value) => globals[*slot as usize] = value,
                Err(err) => return Err(self.surface_error(err, &heap)),
            }
        }

        let result = {
            let mut interp = Interp::new(&mut heap, &self.interns, &mut globals, options.print, options.os);
            interp.run_module(&self.nodes)
        };

        match result {
            Ok(value) => {
                value_to_object(&value, &heap, &self.interns).map_err(|err| self.surface_error(err, &heap))
            }
            Err(err) => Err(self.surface_error(err, &heap)),
        }
    }

    /// Builds the host-facing exception from an in-flight raise: kind,
    /// message, resolved traceback and any cause/context chain.
    fn surface_error(&self, err: RunError, heap: &Heap<impl ResourceTracker>) -> Exception {
        let raise = err.into_raise();
        match &raise.payload {
            ExcPayload::Simple(simple) => {
                let frames = self.resolve_frames(&raise.frames);
                let mut exception = Exception::new(
                    simple.exc_type,
                    simple.message.clone(),
                    self.script_name.clone(),
                    frames,
                );
                if let Some(context) = raise.context
                    && let Some(chained) = self.instance_exception(context, heap, 0)
                {
                    exception = exception.with_context(chained);
                }
                exception
            }
            ExcPayload::Instance(instance) => {
                let mut combined = self
                    .instance_exception_with_extra(*instance, heap, &raise.frames, 0)
                    .unwrap_or_else(|| self.host_error("exception payload was not an exception".to_owned()));
                if let Some(context) = raise.context
                    && combined.context().is_none()
                    && combined.cause().is_none()
                    && let Some(chained) = self.instance_exception(context, heap, 0)
                {
                    combined = combined.with_context(chained);
                }
                combined
            }
        }
    }

    fn instance_exception(
        &self,
        value: Value,
        heap: &Heap<impl ResourceTracker>,
        depth: usize,
    ) -> Option<Exception> {
        self.instance_exception_with_extra(value, heap, &[], depth)
    }

    fn instance_exception_with_extra(
        &self,
        value: Value,
        heap: &Heap<impl ResourceTracker>,
        extra_frames: &[RawFrame],
        depth: usize,
    ) -> Option<Exception> {
        // chains are acyclic in practice; the depth cap is a backstop
        if depth > 8 {
            return None;
        }
        let Value::Ref(id) = value else { return None };
        let HeapData::Exception(instance) = heap.get(id) else {
            return None;
        };
        let message = exception_str(instance, heap, &self.interns).ok().filter(|m| !m.is_empty());
        let mut raw_frames = instance.traceback.clone();
        raw_frames.extend_from_slice(extra_frames);
        let frames = self.resolve_frames(&raw_frames);
        let mut exception = Exception::new(instance.exc_type, message, self.script_name.clone(), frames);
        if let Some(cause) = instance.cause
            && let Some(chained) = self.instance_exception(cause, heap, depth + 1)
        {
            exception = exception.with_cause(chained);
        } else if let Some(context) = instance.context
            && let Some(chained) = self.instance_exception(context, heap, depth + 1)
        {
            exception = exception.with_context(chained);
        }
        Some(exception)
    }

    /// Innermost-first raw frames become outermost-first display frames with
    /// their source lines attached.
    fn resolve_frames(&self, raw: &[RawFrame]) -> Vec<StackFrame> {
        raw.iter()
            .rev()
            .map(|frame| {
                let function_name = match frame.name {
                    FrameName::Module => "<module>".to_owned(),
                    FrameName::Function(name_id) => self.interns.get_str(name_id).to_owned(),
                };
                let line_number = frame.position.line;
                let source_line = self
                    .code
                    .lines()
                    .nth(line_number.saturating_sub(1) as usize)
                    .unwrap_or("")
                    .trim()
                    .to_owned();
                StackFrame {
                    function_name,
                    line_number,
                    source_line,
                }
            })
            .collect()
    }

    fn host_error(&self, message: String) -> Exception {
        Exception::new(
            crate::exception::ExcType::TypeError,
            Some(message),
            self.script_name.clone(),
            Vec::new(),
        )
    }
}
