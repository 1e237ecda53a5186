//! Scope resolution: raw tree in, prepared tree out.
//!
//! Two passes. The analysis pass builds a scope tree recording, per function,
//! which names are bound, read, declared `global`/`nonlocal`, and which
//! nested scopes exist; from that it computes free variables (names captured
//! from an enclosing function) and cell variables (own bindings captured by a
//! descendant). The rewrite pass then resolves every identifier to a
//! `(NameScope, slot)` pair, lowers raw function definitions into intern-table
//! bodies plus [`FunctionDefNode`] definition sites, and drops the declaration
//! statements.
//!
//! The name rules implemented here: assignment binds locally unless declared
//! `global`/`nonlocal`; reads search local → enclosing cells → module globals
//! → builtins; a nested function reads (and mutates objects bound to) module
//! globals with no declaration at all.

use ahash::AHashSet;
use indexmap::IndexSet;

use crate::{
    expressions::{
        ArgExprs, AssignTarget, AugTarget, Comprehension, DeleteTarget, DictItem, Expr, ExprItem, ExprLoc,
        FunctionDef, FunctionDefNode, Identifier, NameScope, Node, ParsedSignature, RawFunctionDef, Signature, Try,
        UnpackItem,
    },
    fstring::FStringPart,
    intern::{Interns, StringId},
    parse::{CodeRange, ParseError, ParseResult},
};

/// A compiled module: resolved body plus its tables.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub nodes: Vec<Node>,
    pub interns: Interns,
    /// Name of each module-global slot, for NameError messages and builtin
    /// fallback.
    pub global_names: Vec<StringId>,
    /// Module-global slots reserved for host inputs, in declaration order.
    pub input_slots: Vec<u32>,
}

pub(crate) fn prepare(parsed: ParseResult, input_names: &[String]) -> Result<Prepared, ParseError> {
    let ParseResult { nodes, interner } = parsed;
    let mut interns = interner;

    let input_ids: Vec<StringId> = input_names.iter().map(|name| interns.intern(name)).collect();

    let mut analysis = Analysis::default();
    let module_scope = analysis.new_scope(None, Vec::new());
    for id in &input_ids {
        analysis.scopes[module_scope].bindings.insert(*id);
    }
    analysis.collect_block(module_scope, &nodes)?;
    analysis.resolve_captures(module_scope)?;

    // the intern table is frozen now, apart from prepared function bodies
    let mut interns = interns.finish();

    let mut rewriter = Rewriter {
        analysis: &analysis,
        interns: &mut interns,
        cursor: vec![0; analysis.scopes.len()],
    };
    let nodes = rewriter.rewrite_block(module_scope, nodes)?;

    let global_names = analysis.scopes[module_scope].slot_names();
    let input_slots = input_ids
        .iter()
        .map(|id| analysis.scopes[module_scope].slot_of(*id).expect("input was bound"))
        .collect();

    Ok(Prepared {
        nodes,
        interns,
        global_names,
        input_slots,
    })
}

type ScopeId = usize;

#[derive(Debug, Default)]
struct Analysis {
    scopes: Vec<ScopeInfo>,
}

#[derive(Debug, Default)]
struct ScopeInfo {
    parent: Option<ScopeId>,
    /// Bound names; for functions the parameters come first, in slot order.
    bindings: IndexSet<StringId>,
    param_count: usize,
    globals: AHashSet<StringId>,
    nonlocals: AHashSet<StringId>,
    /// Names read somewhere in this scope's own body.
    reads: AHashSet<StringId>,
    /// Nested function scopes, in source order.
    children: Vec<ScopeId>,
    /// Computed: names captured from enclosing functions, in stable order.
    free: IndexSet<StringId>,
    /// Computed: own bindings captured by some descendant.
    cells: AHashSet<StringId>,
}

impl ScopeInfo {
    fn is_module(&self) -> bool {
        self.parent.is_none()
    }

    fn binds(&self, name: StringId) -> bool {
        self.bindings.contains(&name) && !self.globals.contains(&name) && !self.nonlocals.contains(&name)
    }

    fn slot_of(&self, name: StringId) -> Option<u32> {
        self.bindings
            .get_index_of(&name)
            .map(|i| u32::try_from(i).expect("slot fits u32"))
    }

    fn free_slot_of(&self, name: StringId) -> Option<u32> {
        self.free
            .get_index_of(&name)
            .map(|i| u32::try_from(self.bindings.len() + i).expect("slot fits u32"))
    }

    fn namespace_size(&self) -> usize {
        self.bindings.len() + self.free.len()
    }

    fn slot_names(&self) -> Vec<StringId> {
        self.bindings.iter().copied().collect()
    }
}

impl Analysis {
    fn new_scope(&mut self, parent: Option<ScopeId>, params: Vec<StringId>) -> ScopeId {
        let id = self.scopes.len();
        let mut scope = ScopeInfo {
            parent,
            param_count: params.len(),
            ..ScopeInfo::default()
        };
        for param in params {
            scope.bindings.insert(param);
        }
        self.scopes.push(scope);
        if let Some(parent) = parent {
            self.scopes[parent].children.push(id);
        }
        id
    }

    fn bind(&mut self, scope: ScopeId, name: StringId) {
        let info = &mut self.scopes[scope];
        if !info.globals.contains(&name) && !info.nonlocals.contains(&name) {
            info.bindings.insert(name);
        }
    }

    fn read(&mut self, scope: ScopeId, name: StringId) {
        self.scopes[scope].reads.insert(name);
    }

    // --- binding/read collection ---

    fn collect_block(&mut self, scope: ScopeId, nodes: &[Node]) -> Result<(), ParseError> {
        // declarations apply to the whole scope, so gather them first
        for node in nodes {
            self.collect_declarations(scope, node)?;
        }
        for node in nodes {
            self.collect_node(scope, node)?;
        }
        Ok(())
    }

    fn collect_declarations(&mut self, scope: ScopeId, node: &Node) -> Result<(), ParseError> {
        match node {
            Node::Global { names, position } => {
                if self.scopes[scope].is_module() {
                    return Ok(());
                }
                for name in names {
                    if self.scopes[scope].nonlocals.contains(name) {
                        return Err(ParseError::new("name is nonlocal and global", *position));
                    }
                    self.scopes[scope].globals.insert(*name);
                    // assignment through the declaration needs a module slot
                    // even when the module body itself never binds the name
                    self.scopes[0].bindings.insert(*name);
                }
                Ok(())
            }
            Node::Nonlocal { names, position } => {
                if self.scopes[scope].is_module() {
                    return Err(ParseError::new(
                        "nonlocal declaration not allowed at module level",
                        *position,
                    ));
                }
                for name in names {
                    if self.scopes[scope].globals.contains(name) {
                        return Err(ParseError::new("name is nonlocal and global", *position));
                    }
                    self.scopes[scope].nonlocals.insert(*name);
                }
                Ok(())
            }
            Node::If { body, or_else, .. } | Node::While { body, or_else, .. } => {
                for child in body.iter().chain(or_else) {
                    self.collect_declarations(scope, child)?;
                }
                Ok(())
            }
            Node::For { body, or_else, .. } => {
                for child in body.iter().chain(or_else) {
                    self.collect_declarations(scope, child)?;
                }
                Ok(())
            }
            Node::With { body, .. } => {
                for child in body {
                    self.collect_declarations(scope, child)?;
                }
                Ok(())
            }
            Node::Try(t) => {
                for child in t
                    .body
                    .iter()
                    .chain(t.handlers.iter().flat_map(|h| h.body.iter()))
                    .chain(&t.or_else)
                    .chain(&t.finally)
                {
                    self.collect_declarations(scope, child)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn collect_node(&mut self, scope: ScopeId, node: &Node) -> Result<(), ParseError> {
        match node {
            Node::Pass | Node::Break(_) | Node::Continue(_) | Node::Global { .. } | Node::Nonlocal { .. } => Ok(()),
            Node::Expr(expr) => self.collect_expr(scope, expr),
            Node::Return { value, .. } => value.as_ref().map_or(Ok(()), |v| self.collect_expr(scope, v)),
            Node::Raise { exc, cause, .. } => {
                if let Some(exc) = exc {
                    self.collect_expr(scope, exc)?;
                }
                if let Some(cause) = cause {
                    self.collect_expr(scope, cause)?;
                }
                Ok(())
            }
            Node::Assert { test, msg, .. } => {
                self.collect_expr(scope, test)?;
                msg.as_ref().map_or(Ok(()), |m| self.collect_expr(scope, m))
            }
            Node::Assign { targets, value } => {
                self.collect_expr(scope, value)?;
                for target in targets {
                    self.collect_target(scope, target)?;
                }
                Ok(())
            }
            Node::AugAssign { target, value, .. } => {
                self.collect_expr(scope, value)?;
                match target {
                    AugTarget::Name(identifier) => {
                        // augmented assignment both reads and binds
                        self.read(scope, identifier.name_id);
                        self.bind(scope, identifier.name_id);
                    }
                    AugTarget::Subscript { object, index } => {
                        self.collect_expr(scope, object)?;
                        self.collect_expr(scope, index)?;
                    }
                    AugTarget::Attr { object, .. } => self.collect_expr(scope, object)?,
                }
                Ok(())
            }
            Node::For {
                target,
                iter,
                body,
                or_else,
                ..
            } => {
                self.collect_expr(scope, iter)?;
                self.collect_target(scope, target)?;
                self.collect_nodes(scope, body)?;
                self.collect_nodes(scope, or_else)
            }
            Node::While { test, body, or_else } => {
                self.collect_expr(scope, test)?;
                self.collect_nodes(scope, body)?;
                self.collect_nodes(scope, or_else)
            }
            Node::If { test, body, or_else } => {
                self.collect_expr(scope, test)?;
                self.collect_nodes(scope, body)?;
                self.collect_nodes(scope, or_else)
            }
            Node::FunctionDefRaw(def) => {
                self.bind(scope, def.name_id);
                self.collect_function(scope, def)
            }
            Node::FunctionDef(_) => unreachable!("prepared node in raw tree"),
            Node::Try(t) => {
                self.collect_nodes(scope, &t.body)?;
                for handler in &t.handlers {
                    if let Some(exc_type) = &handler.exc_type {
                        self.collect_expr(scope, exc_type)?;
                    }
                    if let Some(name) = &handler.name {
                        self.bind(scope, name.name_id);
                    }
                    self.collect_nodes(scope, &handler.body)?;
                }
                self.collect_nodes(scope, &t.or_else)?;
                self.collect_nodes(scope, &t.finally)
            }
            Node::With {
                context, var, body, ..
            } => {
                self.collect_expr(scope, context)?;
                if let Some(var) = var {
                    self.collect_target(scope, var)?;
                }
                self.collect_nodes(scope, body)
            }
            Node::Delete { target, .. } => match target {
                DeleteTarget::Name(identifier) => {
                    self.bind(scope, identifier.name_id);
                    Ok(())
                }
                DeleteTarget::Subscript { object, index } => {
                    self.collect_expr(scope, object)?;
                    self.collect_expr(scope, index)
                }
                DeleteTarget::Attr { object, .. } => self.collect_expr(scope, object),
            },
            Node::Import { binding, .. } => {
                self.bind(scope, binding.name_id);
                Ok(())
            }
            Node::ImportFrom { names, .. } => {
                for (_, binding) in names {
                    self.bind(scope, binding.name_id);
                }
                Ok(())
            }
        }
    }

    fn collect_nodes(&mut self, scope: ScopeId, nodes: &[Node]) -> Result<(), ParseError> {
        for node in nodes {
            self.collect_node(scope, node)?;
        }
        Ok(())
    }

    fn collect_target(&mut self, scope: ScopeId, target: &AssignTarget) -> Result<(), ParseError> {
        match target {
            AssignTarget::Name(identifier) => {
                self.bind(scope, identifier.name_id);
                Ok(())
            }
            AssignTarget::Subscript { object, index, .. } => {
                self.collect_expr(scope, object)?;
                self.collect_expr(scope, index)
            }
            AssignTarget::Attr { object, .. } => self.collect_expr(scope, object),
            AssignTarget::Unpack { items, .. } => {
                for item in items {
                    match item {
                        UnpackItem::Plain(t) | UnpackItem::Starred(t) => self.collect_target(scope, t)?,
                    }
                }
                Ok(())
            }
        }
    }

    fn collect_function(&mut self, parent: ScopeId, def: &RawFunctionDef) -> Result<(), ParseError> {
        // defaults evaluate in the enclosing scope
        for param in def.signature.params.iter().chain(&def.signature.kwonly) {
            if let Some(default) = &param.default {
                self.collect_expr(parent, default)?;
            }
        }
        let params: Vec<StringId> = def.signature.param_names().collect();
        let child = self.new_scope(Some(parent), params);
        self.collect_block(child, &def.body)
    }

    fn collect_expr(&mut self, scope: ScopeId, expr: &ExprLoc) -> Result<(), ParseError> {
        match &expr.expr {
            Expr::Literal(_) => Ok(()),
            Expr::Name(identifier) => {
                self.read(scope, identifier.name_id);
                Ok(())
            }
            Expr::Tuple(items) | Expr::List(items) => {
                for item in items {
                    match item {
                        ExprItem::Plain(e) | ExprItem::Starred(e) => self.collect_expr(scope, e)?,
                    }
                }
                Ok(())
            }
            Expr::Set(items) => {
                for item in items {
                    self.collect_expr(scope, item)?;
                }
                Ok(())
            }
            Expr::Dict(items) => {
                for item in items {
                    match item {
                        DictItem::Pair(k, v) => {
                            self.collect_expr(scope, k)?;
                            self.collect_expr(scope, v)?;
                        }
                        DictItem::Unpack(m) => self.collect_expr(scope, m)?,
                    }
                }
                Ok(())
            }
            Expr::Op { left, right, .. } => {
                self.collect_expr(scope, left)?;
                self.collect_expr(scope, right)
            }
            Expr::CmpOp { left, comparisons } => {
                self.collect_expr(scope, left)?;
                for (_, comparator) in comparisons {
                    self.collect_expr(scope, comparator)?;
                }
                Ok(())
            }
            Expr::Not(e) | Expr::UnaryMinus(e) | Expr::UnaryPlus(e) | Expr::UnaryInvert(e) => {
                self.collect_expr(scope, e)
            }
            Expr::Subscript { object, index } => {
                self.collect_expr(scope, object)?;
                self.collect_expr(scope, index)
            }
            Expr::Slice { lower, upper, step } => {
                for part in [lower, upper, step].into_iter().flatten() {
                    self.collect_expr(scope, part)?;
                }
                Ok(())
            }
            Expr::Call { callable, args } => {
                self.collect_expr(scope, callable)?;
                self.collect_args(scope, args)
            }
            Expr::AttrGet { object, .. } => self.collect_expr(scope, object),
            Expr::AttrCall { object, args, .. } => {
                self.collect_expr(scope, object)?;
                self.collect_args(scope, args)
            }
            Expr::FString(parts) => {
                for part in parts {
                    if let FStringPart::Interpolation { expr, .. } = part {
                        self.collect_expr(scope, expr)?;
                    }
                }
                Ok(())
            }
            Expr::IfElse { test, body, orelse } => {
                self.collect_expr(scope, test)?;
                self.collect_expr(scope, body)?;
                self.collect_expr(scope, orelse)
            }
            Expr::LambdaRaw(def) => self.collect_function(scope, def),
            Expr::Lambda(_) => unreachable!("prepared node in raw tree"),
            Expr::ListComp { elt, generators }
            | Expr::SetComp { elt, generators }
            | Expr::GeneratorExp { elt, generators } => {
                self.collect_comprehension(scope, generators)?;
                self.collect_expr(scope, elt)
            }
            Expr::DictComp { key, value, generators } => {
                self.collect_comprehension(scope, generators)?;
                self.collect_expr(scope, key)?;
                self.collect_expr(scope, value)
            }
            Expr::Named { target, value } => {
                self.bind(scope, target.name_id);
                self.collect_expr(scope, value)
            }
        }
    }

    fn collect_comprehension(&mut self, scope: ScopeId, generators: &[Comprehension]) -> Result<(), ParseError> {
        // comprehension targets bind in the enclosing scope (the known
        // deviation: comprehensions do not get their own scope here)
        for generator in generators {
            self.collect_expr(scope, &generator.iter)?;
            self.collect_target(scope, &generator.target)?;
            for condition in &generator.ifs {
                self.collect_expr(scope, condition)?;
            }
        }
        Ok(())
    }

    fn collect_args(&mut self, scope: ScopeId, args: &ArgExprs) -> Result<(), ParseError> {
        for item in &args.pos {
            match item {
                ExprItem::Plain(e) | ExprItem::Starred(e) => self.collect_expr(scope, e)?,
            }
        }
        for (_, value) in &args.kwargs {
            self.collect_expr(scope, value)?;
        }
        for star in &args.star_kwargs {
            self.collect_expr(scope, star)?;
        }
        Ok(())
    }

    // --- capture resolution ---

    /// Computes `free` and `cells` for the whole tree rooted at `scope`.
    fn resolve_captures(&mut self, root: ScopeId) -> Result<(), ParseError> {
        // children first, so a scope sees its descendants' needs
        let children = self.scopes[root].children.clone();
        for child in children {
            self.resolve_captures(child)?;
        }
        if self.scopes[root].is_module() {
            return Ok(());
        }

        // candidates: everything this scope needs but does not bind itself
        let mut candidates: Vec<StringId> = Vec::new();
        let mut seen = AHashSet::new();
        let info = &self.scopes[root];
        for name in info.nonlocals.iter().copied() {
            if seen.insert(name) {
                candidates.push(name);
            }
        }
        let mut reads: Vec<StringId> = info.reads.iter().copied().collect();
        reads.sort_unstable();
        for name in reads {
            if !info.binds(name) && !info.globals.contains(&name) && seen.insert(name) {
                candidates.push(name);
            }
        }
        // pass-through: a grandchild's free variable that we don't bind
        let child_free: Vec<StringId> = self.scopes[root]
            .children
            .clone()
            .into_iter()
            .flat_map(|c| self.scopes[c].free.iter().copied().collect::<Vec<_>>())
            .collect();
        for name in child_free {
            let info = &self.scopes[root];
            if !info.binds(name) && !info.globals.contains(&name) && seen.insert(name) {
                candidates.push(name);
            }
        }

        for name in candidates {
            let is_nonlocal = self.scopes[root].nonlocals.contains(&name);
            // search enclosing function scopes for a binding
            let mut ancestor = self.scopes[root].parent;
            let mut found = None;
            while let Some(a) = ancestor {
                if self.scopes[a].is_module() {
                    break;
                }
                if self.scopes[a].binds(name) {
                    found = Some(a);
                    break;
                }
                ancestor = self.scopes[a].parent;
            }
            match found {
                Some(owner) => {
                    self.scopes[owner].cells.insert(name);
                    // intermediate scopes pass the cell through
                    let mut walker = self.scopes[root].parent;
                    while let Some(w) = walker {
                        if w == owner {
                            break;
                        }
                        self.scopes[w].free.insert(name);
                        walker = self.scopes[w].parent;
                    }
                    self.scopes[root].free.insert(name);
                }
                None if is_nonlocal => {
                    return Err(ParseError::new(
                        "no binding for nonlocal found",
                        CodeRange::default(),
                    ));
                }
                // plain reads fall through to module globals / builtins
                None => {}
            }
        }
        Ok(())
    }
}

// === rewrite pass ===

struct Rewriter<'a> {
    analysis: &'a Analysis,
    interns: &'a mut Interns,
    /// Per-scope cursor over `children`, so the rewrite walk pairs each raw
    /// function definition with the scope the analysis pass created for it.
    cursor: Vec<usize>,
}

impl Rewriter<'_> {
    fn next_child(&mut self, scope: ScopeId) -> ScopeId {
        let index = self.cursor[scope];
        self.cursor[scope] += 1;
        self.analysis.scopes[scope].children[index]
    }

    /// Resolves an identifier in `scope` (module globals allocate on demand
    /// for names that fall through to the builtin table).
    fn resolve(&self, scope: ScopeId, identifier: Identifier) -> Identifier {
        let info = &self.analysis.scopes[scope];
        let name = identifier.name_id;

        if info.is_module() {
            let slot = info.slot_of(name).unwrap_or(u32::MAX);
            return Identifier {
                scope: NameScope::Global,
                slot,
                ..identifier
            };
        }
        if info.globals.contains(&name) {
            let module = self.module_scope();
            let slot = self.analysis.scopes[module].slot_of(name).unwrap_or(u32::MAX);
            return Identifier {
                scope: NameScope::Global,
                slot,
                ..identifier
            };
        }
        if info.binds(name) {
            let slot = info.slot_of(name).expect("bound name has slot");
            let scope_kind = if info.cells.contains(&name) {
                NameScope::Cell
            } else {
                NameScope::Local
            };
            return Identifier {
                scope: scope_kind,
                slot,
                ..identifier
            };
        }
        if let Some(slot) = info.free_slot_of(name) {
            return Identifier {
                scope: NameScope::Cell,
                slot,
                ..identifier
            };
        }
        // falls through to module globals, then builtins, at runtime
        let module = self.module_scope();
        let slot = self.analysis.scopes[module].slot_of(name).unwrap_or(u32::MAX);
        Identifier {
            scope: NameScope::Global,
            slot,
            ..identifier
        }
    }

    fn module_scope(&self) -> ScopeId {
        0
    }

    fn rewrite_block(&mut self, scope: ScopeId, nodes: Vec<Node>) -> Result<Vec<Node>, ParseError> {
        nodes.into_iter().map(|node| self.rewrite_node(scope, node)).collect()
    }

    fn rewrite_node(&mut self, scope: ScopeId, node: Node) -> Result<Node, ParseError> {
        let node = match node {
            Node::Pass | Node::Break(_) | Node::Continue(_) => node,
            Node::Global { .. } | Node::Nonlocal { .. } => Node::Pass,
            Node::Expr(expr) => Node::Expr(self.rewrite_expr(scope, expr)?),
            Node::Return { value, position } => Node::Return {
                value: value.map(|v| self.rewrite_expr(scope, v)).transpose()?,
                position,
            },
            Node::Raise { exc, cause, position } => Node::Raise {
                exc: exc.map(|e| self.rewrite_expr(scope, e)).transpose()?,
                cause: cause.map(|c| self.rewrite_expr(scope, c)).transpose()?,
                position,
            },
            Node::Assert { test, msg, position } => Node::Assert {
                test: self.rewrite_expr(scope, test)?,
                msg: msg.map(|m| self.rewrite_expr(scope, m)).transpose()?,
                position,
            },
            Node::Assign { targets, value } => Node::Assign {
                value: self.rewrite_expr(scope, value)?,
                targets: targets
                    .into_iter()
                    .map(|t| self.rewrite_target(scope, t))
                    .collect::<Result<_, _>>()?,
            },
            Node::AugAssign {
                target,
                op,
                value,
                position,
            } => {
                // keep the child-scope cursor in step with the analysis walk:
                // value first, then the target
                let value = self.rewrite_expr(scope, value)?;
                let target = match target {
                    AugTarget::Name(identifier) => AugTarget::Name(self.resolve(scope, identifier)),
                    AugTarget::Subscript { object, index } => AugTarget::Subscript {
                        object: self.rewrite_expr(scope, object)?,
                        index: self.rewrite_expr(scope, index)?,
                    },
                    AugTarget::Attr { object, attr } => AugTarget::Attr {
                        object: self.rewrite_expr(scope, object)?,
                        attr,
                    },
                };
                Node::AugAssign {
                    target,
                    op,
                    value,
                    position,
                }
            }
            Node::For {
                target,
                iter,
                body,
                or_else,
                position,
            } => {
                // analysis order: iter before target
                let iter = self.rewrite_expr(scope, iter)?;
                let target = self.rewrite_target(scope, target)?;
                Node::For {
                    target,
                    iter,
                    body: self.rewrite_block(scope, body)?,
                    or_else: self.rewrite_block(scope, or_else)?,
                    position,
                }
            }
            Node::While { test, body, or_else } => Node::While {
                test: self.rewrite_expr(scope, test)?,
                body: self.rewrite_block(scope, body)?,
                or_else: self.rewrite_block(scope, or_else)?,
            },
            Node::If { test, body, or_else } => Node::If {
                test: self.rewrite_expr(scope, test)?,
                body: self.rewrite_block(scope, body)?,
                or_else: self.rewrite_block(scope, or_else)?,
            },
            Node::FunctionDefRaw(def) => {
                let binding = Identifier::unresolved(def.name_id, def.position);
                let def_node = self.rewrite_function(scope, *def)?;
                let binding = self.resolve(scope, binding);
                Node::FunctionDef(Box::new(FunctionDefNode {
                    binding: Some(binding),
                    ..def_node
                }))
            }
            Node::FunctionDef(_) => unreachable!("already prepared"),
            Node::Try(t) => {
                let Try {
                    body,
                    handlers,
                    or_else,
                    finally,
                } = *t;
                // analysis order: body before handlers
                let body = self.rewrite_block(scope, body)?;
                let handlers = handlers
                    .into_iter()
                    .map(|handler| {
                        Ok(crate::expressions::ExceptHandler {
                            exc_type: handler.exc_type.map(|e| self.rewrite_expr(scope, e)).transpose()?,
                            name: handler.name.map(|n| self.resolve(scope, n)),
                            body: self.rewrite_block(scope, handler.body)?,
                            position: handler.position,
                        })
                    })
                    .collect::<Result<Vec<_>, ParseError>>()?;
                Node::Try(Box::new(Try {
                    body,
                    handlers,
                    or_else: self.rewrite_block(scope, or_else)?,
                    finally: self.rewrite_block(scope, finally)?,
                }))
            }
            Node::With {
                context,
                var,
                body,
                position,
            } => Node::With {
                context: self.rewrite_expr(scope, context)?,
                var: var.map(|v| self.rewrite_target(scope, v)).transpose()?,
                body: self.rewrite_block(scope, body)?,
                position,
            },
            Node::Delete { target, position } => Node::Delete {
                target: match target {
                    DeleteTarget::Name(identifier) => DeleteTarget::Name(self.resolve(scope, identifier)),
                    DeleteTarget::Subscript { object, index } => DeleteTarget::Subscript {
                        object: self.rewrite_expr(scope, object)?,
                        index: self.rewrite_expr(scope, index)?,
                    },
                    DeleteTarget::Attr { object, attr } => DeleteTarget::Attr {
                        object: self.rewrite_expr(scope, object)?,
                        attr,
                    },
                },
                position,
            },
            Node::Import {
                module,
                binding,
                position,
            } => Node::Import {
                module,
                binding: self.resolve(scope, binding),
                position,
            },
            Node::ImportFrom { module, names, position } => Node::ImportFrom {
                module,
                names: names
                    .into_iter()
                    .map(|(import, binding)| (import, self.resolve(scope, binding)))
                    .collect(),
                position,
            },
        };
        Ok(node)
    }

    fn rewrite_target(&mut self, scope: ScopeId, target: AssignTarget) -> Result<AssignTarget, ParseError> {
        Ok(match target {
            AssignTarget::Name(identifier) => AssignTarget::Name(self.resolve(scope, identifier)),
            AssignTarget::Subscript { object, index, position } => AssignTarget::Subscript {
                object: Box::new(self.rewrite_expr(scope, *object)?),
                index: Box::new(self.rewrite_expr(scope, *index)?),
                position,
            },
            AssignTarget::Attr { object, attr, position } => AssignTarget::Attr {
                object: Box::new(self.rewrite_expr(scope, *object)?),
                attr,
                position,
            },
            AssignTarget::Unpack { items, position } => AssignTarget::Unpack {
                items: items
                    .into_iter()
                    .map(|item| {
                        Ok(match item {
                            UnpackItem::Plain(t) => UnpackItem::Plain(self.rewrite_target(scope, t)?),
                            UnpackItem::Starred(t) => UnpackItem::Starred(self.rewrite_target(scope, t)?),
                        })
                    })
                    .collect::<Result<Vec<_>, ParseError>>()?,
                position,
            },
        })
    }

    /// Lowers a raw function: prepares its body in its own scope, stores the
    /// body in the intern table and returns the definition site (binding is
    /// filled by the caller; lambdas leave it `None`).
    fn rewrite_function(&mut self, parent: ScopeId, def: RawFunctionDef) -> Result<FunctionDefNode, ParseError> {
        let RawFunctionDef {
            name_id,
            position,
            signature,
            body,
        } = def;

        // defaults are evaluated at definition time, in the enclosing scope
        let mut default_exprs = Vec::new();
        let mut kw_default_exprs = Vec::new();
        let ParsedSignature {
            params,
            vararg,
            kwonly,
            kwarg,
        } = signature;
        let mut param_names = Vec::with_capacity(params.len());
        let mut num_defaults = 0;
        for param in params {
            param_names.push(param.name);
            if let Some(default) = param.default {
                num_defaults += 1;
                default_exprs.push(self.rewrite_expr(parent, default)?);
            }
        }
        let mut kwonly_names = Vec::with_capacity(kwonly.len());
        for param in kwonly {
            kwonly_names.push(param.name);
            if let Some(default) = param.default {
                kw_default_exprs.push((param.name, self.rewrite_expr(parent, default)?));
            }
        }

        let child = self.next_child(parent);
        let body = self.rewrite_block(child, body)?;

        let info = &self.analysis.scopes[child];
        // cells that are parameters get wrapped after binding; other cells
        // are seeded empty at frame entry
        let mut cell_init_slots = Vec::new();
        let mut cell_param_slots = Vec::new();
        for name in &info.cells {
            let slot = info.slot_of(*name).expect("cell is a binding");
            if (slot as usize) < info.param_count {
                cell_param_slots.push(slot);
            } else {
                cell_init_slots.push(slot);
            }
        }
        cell_init_slots.sort_unstable();
        cell_param_slots.sort_unstable();

        let free_var_slots: Vec<u32> = info
            .free
            .iter()
            .map(|name| info.free_slot_of(*name).expect("free name has slot"))
            .collect();

        // where the enclosing frame keeps each captured cell
        let parent_info = &self.analysis.scopes[parent];
        let free_var_enclosing_slots: Vec<u32> = info
            .free
            .iter()
            .map(|name| {
                parent_info
                    .slot_of(*name)
                    .or_else(|| parent_info.free_slot_of(*name))
                    .expect("captured name exists in enclosing scope")
            })
            .collect();

        let function = FunctionDef {
            name_id,
            signature: Signature {
                params: param_names,
                num_defaults,
                vararg,
                kwonly: kwonly_names,
                kwarg,
            },
            body,
            namespace_size: info.namespace_size(),
            cell_init_slots,
            cell_param_slots,
            free_var_slots,
        };
        let function_id = self.interns.add_function(function);
        Ok(FunctionDefNode {
            function_id,
            binding: None,
            default_exprs,
            kw_default_exprs,
            free_var_enclosing_slots,
            position,
        })
    }

    fn rewrite_expr(&mut self, scope: ScopeId, expr: ExprLoc) -> Result<ExprLoc, ParseError> {
        let ExprLoc { position, expr } = expr;
        let expr = match expr {
            Expr::Literal(_) => expr,
            Expr::Name(identifier) => Expr::Name(self.resolve(scope, identifier)),
            Expr::Tuple(items) => Expr::Tuple(self.rewrite_items(scope, items)?),
            Expr::List(items) => Expr::List(self.rewrite_items(scope, items)?),
            Expr::Set(items) => Expr::Set(
                items
                    .into_iter()
                    .map(|e| self.rewrite_expr(scope, e))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Dict(items) => Expr::Dict(
                items
                    .into_iter()
                    .map(|item| {
                        Ok(match item {
                            DictItem::Pair(k, v) => {
                                DictItem::Pair(self.rewrite_expr(scope, k)?, self.rewrite_expr(scope, v)?)
                            }
                            DictItem::Unpack(m) => DictItem::Unpack(self.rewrite_expr(scope, m)?),
                        })
                    })
                    .collect::<Result<Vec<_>, ParseError>>()?,
            ),
            Expr::Op { left, op, right } => Expr::Op {
                left: Box::new(self.rewrite_expr(scope, *left)?),
                op,
                right: Box::new(self.rewrite_expr(scope, *right)?),
            },
            Expr::CmpOp { left, comparisons } => Expr::CmpOp {
                left: Box::new(self.rewrite_expr(scope, *left)?),
                comparisons: comparisons
                    .into_iter()
                    .map(|(op, comparator)| Ok((op, self.rewrite_expr(scope, comparator)?)))
                    .collect::<Result<Vec<_>, ParseError>>()?,
            },
            Expr::Not(e) => Expr::Not(Box::new(self.rewrite_expr(scope, *e)?)),
            Expr::UnaryMinus(e) => Expr::UnaryMinus(Box::new(self.rewrite_expr(scope, *e)?)),
            Expr::UnaryPlus(e) => Expr::UnaryPlus(Box::new(self.rewrite_expr(scope, *e)?)),
            Expr::UnaryInvert(e) => Expr::UnaryInvert(Box::new(self.rewrite_expr(scope, *e)?)),
            Expr::Subscript { object, index } => Expr::Subscript {
                object: Box::new(self.rewrite_expr(scope, *object)?),
                index: Box::new(self.rewrite_expr(scope, *index)?),
            },
            Expr::Slice { lower, upper, step } => Expr::Slice {
                lower: lower.map(|e| self.rewrite_expr(scope, *e).map(Box::new)).transpose()?,
                upper: upper.map(|e| self.rewrite_expr(scope, *e).map(Box::new)).transpose()?,
                step: step.map(|e| self.rewrite_expr(scope, *e).map(Box::new)).transpose()?,
            },
            Expr::Call { callable, args } => Expr::Call {
                callable: Box::new(self.rewrite_expr(scope, *callable)?),
                args: Box::new(self.rewrite_args(scope, *args)?),
            },
            Expr::AttrGet { object, attr } => Expr::AttrGet {
                object: Box::new(self.rewrite_expr(scope, *object)?),
                attr,
            },
            Expr::AttrCall { object, attr, args } => Expr::AttrCall {
                object: Box::new(self.rewrite_expr(scope, *object)?),
                attr,
                args: Box::new(self.rewrite_args(scope, *args)?),
            },
            Expr::FString(parts) => Expr::FString(
                parts
                    .into_iter()
                    .map(|part| {
                        Ok(match part {
                            FStringPart::Literal(id) => FStringPart::Literal(id),
                            FStringPart::Interpolation {
                                expr,
                                conversion,
                                spec,
                            } => FStringPart::Interpolation {
                                expr: self.rewrite_expr(scope, expr)?,
                                conversion,
                                spec,
                            },
                        })
                    })
                    .collect::<Result<Vec<_>, ParseError>>()?,
            ),
            Expr::IfElse { test, body, orelse } => Expr::IfElse {
                test: Box::new(self.rewrite_expr(scope, *test)?),
                body: Box::new(self.rewrite_expr(scope, *body)?),
                orelse: Box::new(self.rewrite_expr(scope, *orelse)?),
            },
            Expr::LambdaRaw(def) => {
                let def_node = self.rewrite_function(scope, *def)?;
                Expr::Lambda(Box::new(def_node))
            }
            Expr::Lambda(_) => unreachable!("already prepared"),
            Expr::ListComp { elt, generators } => Expr::ListComp {
                generators: self.rewrite_comprehensions(scope, generators)?,
                elt: Box::new(self.rewrite_expr(scope, *elt)?),
            },
            Expr::SetComp { elt, generators } => Expr::SetComp {
                generators: self.rewrite_comprehensions(scope, generators)?,
                elt: Box::new(self.rewrite_expr(scope, *elt)?),
            },
            Expr::DictComp { key, value, generators } => Expr::DictComp {
                generators: self.rewrite_comprehensions(scope, generators)?,
                key: Box::new(self.rewrite_expr(scope, *key)?),
                value: Box::new(self.rewrite_expr(scope, *value)?),
            },
            Expr::GeneratorExp { elt, generators } => Expr::GeneratorExp {
                generators: self.rewrite_comprehensions(scope, generators)?,
                elt: Box::new(self.rewrite_expr(scope, *elt)?),
            },
            Expr::Named { target, value } => Expr::Named {
                target: self.resolve(scope, target),
                value: Box::new(self.rewrite_expr(scope, *value)?),
            },
        };
        Ok(ExprLoc { position, expr })
    }

    fn rewrite_items(&mut self, scope: ScopeId, items: Vec<ExprItem>) -> Result<Vec<ExprItem>, ParseError> {
        items
            .into_iter()
            .map(|item| {
                Ok(match item {
                    ExprItem::Plain(e) => ExprItem::Plain(self.rewrite_expr(scope, e)?),
                    ExprItem::Starred(e) => ExprItem::Starred(self.rewrite_expr(scope, e)?),
                })
            })
            .collect()
    }

    fn rewrite_comprehensions(
        &mut self,
        scope: ScopeId,
        generators: Vec<Comprehension>,
    ) -> Result<Vec<Comprehension>, ParseError> {
        generators
            .into_iter()
            .map(|generator| {
                Ok(Comprehension {
                    iter: self.rewrite_expr(scope, generator.iter)?,
                    target: self.rewrite_target(scope, generator.target)?,
                    ifs: generator
                        .ifs
                        .into_iter()
                        .map(|e| self.rewrite_expr(scope, e))
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect()
    }

    fn rewrite_args(&mut self, scope: ScopeId, args: ArgExprs) -> Result<ArgExprs, ParseError> {
        Ok(ArgExprs {
            pos: self.rewrite_items(scope, args.pos)?,
            kwargs: args
                .kwargs
                .into_iter()
                .map(|(name, value)| Ok((name, self.rewrite_expr(scope, value)?)))
                .collect::<Result<Vec<_>, ParseError>>()?,
            star_kwargs: args
                .star_kwargs
                .into_iter()
                .map(|e| self.rewrite_expr(scope, e))
                .collect::<Result<_, _>>()?,
        })
    }
}
