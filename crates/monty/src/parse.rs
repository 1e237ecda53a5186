//! Lowering from the ruff AST to the program tree.
//!
//! The parser proper is `ruff_python_parser`; this module walks its output,
//! interns names and literals, and produces the raw `Node` tree for the
//! prepare pass. The supported subset is enforced here: anything outside it
//! (classes, decorators, async, yield, star-imports, unknown modules) becomes
//! a compile-time error rather than a runtime surprise.

use std::borrow::Cow;

use num_bigint::BigInt;
use ruff_python_ast::{
    self as ast, BoolOp, CmpOp, ConversionFlag as RuffConversionFlag, ElifElseClause, Expr as AstExpr,
    InterpolatedStringElement, Number, Operator as AstOperator, ParameterWithDefault, Stmt, UnaryOp,
};
use ruff_python_parser::parse_module;
use ruff_text_size::{Ranged, TextRange};

use crate::{
    exception::ExcType,
    exception_public::{Exception, StackFrame},
    expressions::{
        ArgExprs, AssignTarget, AugTarget, CmpOperator, Comprehension, DeleteTarget, DictItem, ExceptHandler, Expr,
        ExprItem, ExprLoc, Identifier, Literal, Node, Operator, ParsedParam, ParsedSignature, RawFunctionDef, Try,
        UnpackItem,
    },
    fstring::{ConversionFlag, FStringPart},
    intern::InternerBuilder,
    modules::ModuleId,
};

/// Maximum nesting depth for recursive AST structures, preventing host stack
/// overflow from pathological inputs like thousands of nested parentheses.
const MAX_NESTING_DEPTH: u16 = 200;

/// A 1-based source line reference.
///
/// Tracebacks report `(function, source_line, line_number)`; columns are not
/// part of the surface, so a line is all a position needs to carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub(crate) struct CodeRange {
    pub line: u32,
}

/// Parsed program plus the interner holding its names and literals.
#[derive(Debug)]
pub(crate) struct ParseResult {
    pub nodes: Vec<Node>,
    pub interner: InternerBuilder,
}

/// Compile-time failure: syntax error or subset violation.
#[derive(Debug, Clone)]
pub(crate) struct ParseError {
    message: Cow<'static, str>,
    position: CodeRange,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    /// Surfaces as a `SyntaxError` with the offending source line attached.
    pub(crate) fn into_exception(self, script_name: &str, code: &str) -> Exception {
        let source_line = code
            .lines()
            .nth(self.position.line.saturating_sub(1) as usize)
            .unwrap_or("")
            .trim()
            .to_owned();
        let frame = StackFrame {
            function_name: "<module>".to_owned(),
            line_number: self.position.line,
            source_line,
        };
        Exception::new(
            ExcType::SyntaxError,
            Some(self.message.into_owned()),
            script_name.to_owned(),
            vec![frame],
        )
    }
}

pub(crate) fn parse(code: &str) -> Result<ParseResult, ParseError> {
    let mut parser = Parser::new(code);
    let parsed =
        parse_module(code).map_err(|e| ParseError::new(e.to_string(), parser.convert_range(e.range())))?;
    let module = parsed.into_syntax();
    let nodes = parser.parse_statements(module.body.to_vec())?;
    Ok(ParseResult {
        nodes,
        interner: parser.interner,
    })
}

struct Parser {
    /// Byte offset of the start of each line, for offset-to-line conversion.
    line_starts: Vec<usize>,
    interner: InternerBuilder,
    depth_remaining: u16,
}

impl Parser {
    fn new(code: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in code.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            interner: InternerBuilder::new(),
            depth_remaining: MAX_NESTING_DEPTH,
        }
    }

    fn convert_range(&self, range: TextRange) -> CodeRange {
        let offset = usize::from(range.start());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact + 1,
            Err(insert) => insert,
        };
        CodeRange {
            line: u32::try_from(line).unwrap_or(u32::MAX),
        }
    }

    fn identifier(&mut self, name: &str, range: TextRange) -> Identifier {
        let name_id = self.interner.intern(name);
        Identifier::unresolved(name_id, self.convert_range(range))
    }

    fn parse_statements(&mut self, statements: Vec<Stmt>) -> Result<Vec<Node>, ParseError> {
        statements.into_iter().map(|s| self.parse_statement(s)).collect()
    }

    fn parse_statement(&mut self, statement: Stmt) -> Result<Node, ParseError> {
        self.enter_depth(|| statement.range())?;
        let result = self.parse_statement_impl(statement);
        self.depth_remaining += 1;
        result
    }

    fn enter_depth(&mut self, get_range: impl FnOnce() -> TextRange) -> Result<(), ParseError> {
        match self.depth_remaining.checked_sub(1) {
            Some(remaining) => {
                self.depth_remaining = remaining;
                Ok(())
            }
            None => {
                let position = self.convert_range(get_range());
                Err(ParseError::new("too many nested parentheses", position))
            }
        }
    }

    fn parse_statement_impl(&mut self, statement: Stmt) -> Result<Node, ParseError> {
        match statement {
            Stmt::FunctionDef(function) => {
                let position = self.convert_range(function.range);
                if function.is_async {
                    return Err(ParseError::new("async functions are not supported", position));
                }
                if !function.decorator_list.is_empty() {
                    return Err(ParseError::new("decorators are not supported", position));
                }
                let signature = self.parse_signature(&function.parameters)?;
                let name_id = self.interner.intern(function.name.id.as_str());
                let body = self.parse_statements(function.body.to_vec())?;
                Ok(Node::FunctionDefRaw(Box::new(RawFunctionDef {
                    name_id,
                    position,
                    signature,
                    body,
                })))
            }
            Stmt::ClassDef(c) => Err(ParseError::new(
                "class definitions are not supported",
                self.convert_range(c.range),
            )),
            Stmt::Return(ast::StmtReturn { value, range, .. }) => {
                let position = self.convert_range(range);
                let value = value.map(|v| self.parse_expression(*v)).transpose()?;
                Ok(Node::Return { value, position })
            }
            Stmt::Delete(ast::StmtDelete { targets, range, .. }) => {
                let position = self.convert_range(range);
                let mut targets = targets;
                if targets.len() != 1 {
                    return Err(ParseError::new("del with multiple targets is not supported", position));
                }
                let target = match targets.remove(0) {
                    AstExpr::Name(ast::ExprName { id, range, .. }) => {
                        DeleteTarget::Name(self.identifier(id.as_str(), range))
                    }
                    AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => DeleteTarget::Subscript {
                        object: self.parse_expression(*value)?,
                        index: self.parse_expression(*slice)?,
                    },
                    AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => DeleteTarget::Attr {
                        object: self.parse_expression(*value)?,
                        attr: self.interner.intern(attr.id().as_str()),
                    },
                    other => {
                        return Err(ParseError::new(
                            format!("invalid del target: {other:?}"),
                            position,
                        ));
                    }
                };
                Ok(Node::Delete { target, position })
            }
            Stmt::Assign(ast::StmtAssign { targets, value, .. }) => {
                let targets = targets
                    .into_iter()
                    .map(|t| self.parse_assign_target(t))
                    .collect::<Result<Vec<_>, _>>()?;
                let value = self.parse_expression(*value)?;
                Ok(Node::Assign { targets, value })
            }
            Stmt::AugAssign(ast::StmtAugAssign {
                target, op, value, range, ..
            }) => {
                let position = self.convert_range(range);
                let value = self.parse_expression(*value)?;
                let target = match *target {
                    AstExpr::Name(ast::ExprName { id, range, .. }) => {
                        AugTarget::Name(self.identifier(id.as_str(), range))
                    }
                    AstExpr::Subscript(ast::ExprSubscript { value: obj, slice, .. }) => AugTarget::Subscript {
                        object: self.parse_expression(*obj)?,
                        index: self.parse_expression(*slice)?,
                    },
                    AstExpr::Attribute(ast::ExprAttribute { value: obj, attr, .. }) => AugTarget::Attr {
                        object: self.parse_expression(*obj)?,
                        attr: self.interner.intern(attr.id().as_str()),
                    },
                    other => {
                        return Err(ParseError::new(
                            format!("invalid augmented assignment target: {other:?}"),
                            position,
                        ));
                    }
                };
                Ok(Node::AugAssign {
                    target,
                    op: convert_op(op),
                    value,
                    position,
                })
            }
            Stmt::AnnAssign(ast::StmtAnnAssign { target, value, .. }) => {
                // annotations are checker-only; keep the assignment if any
                match value {
                    Some(value) => {
                        let target = self.parse_assign_target(*target)?;
                        let value = self.parse_expression(*value)?;
                        Ok(Node::Assign {
                            targets: vec![target],
                            value,
                        })
                    }
                    None => Ok(Node::Pass),
                }
            }
            Stmt::For(ast::StmtFor {
                target,
                iter,
                body,
                orelse,
                is_async,
                range,
                ..
            }) => {
                let position = self.convert_range(range);
                if is_async {
                    return Err(ParseError::new("async for is not supported", position));
                }
                Ok(Node::For {
                    target: self.parse_assign_target(*target)?,
                    iter: self.parse_expression(*iter)?,
                    body: self.parse_statements(body.to_vec())?,
                    or_else: self.parse_statements(orelse.to_vec())?,
                    position,
                })
            }
            Stmt::While(ast::StmtWhile { test, body, orelse, .. }) => Ok(Node::While {
                test: self.parse_expression(*test)?,
                body: self.parse_statements(body.to_vec())?,
                or_else: self.parse_statements(orelse.to_vec())?,
            }),
            Stmt::If(ast::StmtIf {
                test,
                body,
                elif_else_clauses,
                ..
            }) => {
                let test = self.parse_expression(*test)?;
                let body = self.parse_statements(body.to_vec())?;
                let or_else = self.parse_elif_else_clauses(elif_else_clauses)?;
                Ok(Node::If { test, body, or_else })
            }
            Stmt::With(ast::StmtWith {
                items,
                body,
                is_async,
                range,
                ..
            }) => {
                let position = self.convert_range(range);
                if is_async {
                    return Err(ParseError::new("async with is not supported", position));
                }
                let mut body = self.parse_statements(body.to_vec())?;
                // multiple managers desugar into nested with-blocks
                for item in items.into_iter().rev() {
                    let context = self.parse_expression(item.context_expr)?;
                    let var = item
                        .optional_vars
                        .map(|v| self.parse_assign_target(*v))
                        .transpose()?;
                    body = vec![Node::With {
                        context,
                        var,
                        body,
                        position,
                    }];
                }
                let [single] = <[Node; 1]>::try_from(body).map_err(|_| {
                    ParseError::new("with statement requires at least one item", position)
                })?;
                Ok(single)
            }
            Stmt::Raise(ast::StmtRaise { exc, cause, range, .. }) => {
                let position = self.convert_range(range);
                Ok(Node::Raise {
                    exc: exc.map(|e| self.parse_expression(*e)).transpose()?,
                    cause: cause.map(|c| self.parse_expression(*c)).transpose()?,
                    position,
                })
            }
            Stmt::Try(ast::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                is_star,
                range,
                ..
            }) => {
                let position = self.convert_range(range);
                if is_star {
                    return Err(ParseError::new("except* is not supported", position));
                }
                let handlers = handlers
                    .into_iter()
                    .map(|h| self.parse_except_handler(h))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::Try(Box::new(Try {
                    body: self.parse_statements(body.to_vec())?,
                    handlers,
                    or_else: self.parse_statements(orelse.to_vec())?,
                    finally: self.parse_statements(finalbody.to_vec())?,
                })))
            }
            Stmt::Assert(ast::StmtAssert { test, msg, range, .. }) => Ok(Node::Assert {
                test: self.parse_expression(*test)?,
                msg: msg.map(|m| self.parse_expression(*m)).transpose()?,
                position: self.convert_range(range),
            }),
            Stmt::Import(ast::StmtImport { names, range, .. }) => {
                let position = self.convert_range(range);
                let mut aliases = names;
                if aliases.len() != 1 {
                    return Err(ParseError::new(
                        "only one module per import statement is supported",
                        position,
                    ));
                }
                let alias = aliases.remove(0);
                let module_name = alias.name.id.as_str().to_owned();
                let Some(module) = ModuleId::by_name(&module_name) else {
                    return Err(ParseError::new(
                        format!("import of module '{module_name}' is not supported"),
                        position,
                    ));
                };
                let binding = match &alias.asname {
                    Some(asname) => self.identifier(asname.id.as_str(), asname.range),
                    None => self.identifier(&module_name, alias.name.range),
                };
                Ok(Node::Import {
                    module,
                    binding,
                    position,
                })
            }
            Stmt::ImportFrom(ast::StmtImportFrom {
                module,
                names,
                level,
                range,
                ..
            }) => {
                let position = self.convert_range(range);
                if level != 0 {
                    return Err(ParseError::new("relative imports are not supported", position));
                }
                let Some(module_name) = module.as_ref().map(|m| m.id.as_str().to_owned()) else {
                    return Err(ParseError::new("relative imports are not supported", position));
                };
                let Some(module_id) = ModuleId::by_name(&module_name) else {
                    return Err(ParseError::new(
                        format!("import of module '{module_name}' is not supported"),
                        position,
                    ));
                };
                let mut imports = Vec::with_capacity(names.len());
                for alias in names {
                    let import_name = alias.name.id.as_str().to_owned();
                    if import_name == "*" {
                        return Err(ParseError::new("star imports are not supported", position));
                    }
                    if crate::modules::datetime_mod::importable(&import_name).is_none() {
                        return Err(ParseError::new(
                            format!("cannot import name '{import_name}' from '{module_name}'"),
                            position,
                        ));
                    }
                    let import_id = self.interner.intern(&import_name);
                    let binding = match &alias.asname {
                        Some(asname) => self.identifier(asname.id.as_str(), asname.range),
                        None => self.identifier(&import_name, alias.name.range),
                    };
                    imports.push((import_id, binding));
                }
                Ok(Node::ImportFrom {
                    module: module_id,
                    names: imports,
                    position,
                })
            }
            Stmt::Global(ast::StmtGlobal { names, range, .. }) => Ok(Node::Global {
                names: names.iter().map(|n| self.interner.intern(n.id.as_str())).collect(),
                position: self.convert_range(range),
            }),
            Stmt::Nonlocal(ast::StmtNonlocal { names, range, .. }) => Ok(Node::Nonlocal {
                names: names.iter().map(|n| self.interner.intern(n.id.as_str())).collect(),
                position: self.convert_range(range),
            }),
            Stmt::Expr(ast::StmtExpr { value, .. }) => Ok(Node::Expr(self.parse_expression(*value)?)),
            Stmt::Pass(_) => Ok(Node::Pass),
            Stmt::Break(b) => Ok(Node::Break(self.convert_range(b.range))),
            Stmt::Continue(c) => Ok(Node::Continue(self.convert_range(c.range))),
            Stmt::Match(m) => Err(ParseError::new(
                "match statements are not supported",
                self.convert_range(m.range),
            )),
            Stmt::TypeAlias(t) => Err(ParseError::new(
                "type alias statements are not supported",
                self.convert_range(t.range),
            )),
            Stmt::IpyEscapeCommand(c) => Err(ParseError::new(
                "IPython escape commands are not supported",
                self.convert_range(c.range),
            )),
        }
    }

    fn parse_elif_else_clauses(&mut self, clauses: Vec<ElifElseClause>) -> Result<Vec<Node>, ParseError> {
        let mut tail: Vec<Node> = Vec::new();
        for clause in clauses.into_iter().rev() {
            match clause.test {
                Some(test) => {
                    let test = self.parse_expression(test)?;
                    let body = self.parse_statements(clause.body.to_vec())?;
                    tail = vec![Node::If {
                        test,
                        body,
                        or_else: tail,
                    }];
                }
                None => {
                    tail = self.parse_statements(clause.body.to_vec())?;
                }
            }
        }
        Ok(tail)
    }

    fn parse_except_handler(&mut self, handler: ast::ExceptHandler) -> Result<ExceptHandler, ParseError> {
        let ast::ExceptHandler::ExceptHandler(h) = handler;
        let position = self.convert_range(h.range);
        let exc_type = h.type_.map(|t| self.parse_expression(*t)).transpose()?;
        let name = h.name.map(|n| self.identifier(n.id.as_str(), n.range));
        let body = self.parse_statements(h.body.to_vec())?;
        Ok(ExceptHandler {
            exc_type,
            name,
            body,
            position,
        })
    }

    fn parse_signature(&mut self, parameters: &ast::Parameters) -> Result<ParsedSignature, ParseError> {
        // positional-only parameters are folded into the ordinary list; the
        // `/` marker only affects keyword binding, which the checker owns
        let mut params = self.parse_params(&parameters.posonlyargs)?;
        params.extend(self.parse_params(&parameters.args)?);
        let vararg = parameters
            .vararg
            .as_ref()
            .map(|p| self.interner.intern(p.name.id.as_str()));
        let kwonly = self.parse_params(&parameters.kwonlyargs)?;
        let kwarg = parameters
            .kwarg
            .as_ref()
            .map(|p| self.interner.intern(p.name.id.as_str()));
        Ok(ParsedSignature {
            params,
            vararg,
            kwonly,
            kwarg,
        })
    }

    fn parse_params(&mut self, params: &[ParameterWithDefault]) -> Result<Vec<ParsedParam>, ParseError> {
        params
            .iter()
            .map(|p| {
                let name = self.interner.intern(p.parameter.name.id.as_str());
                let default = p
                    .default
                    .as_ref()
                    .map(|d| self.parse_expression((**d).clone()))
                    .transpose()?;
                Ok(ParsedParam { name, default })
            })
            .collect()
    }

    fn parse_assign_target(&mut self, target: AstExpr) -> Result<AssignTarget, ParseError> {
        match target {
            AstExpr::Name(ast::ExprName { id, range, .. }) => {
                Ok(AssignTarget::Name(self.identifier(id.as_str(), range)))
            }
            AstExpr::Subscript(ast::ExprSubscript { value, slice, range, .. }) => Ok(AssignTarget::Subscript {
                object: Box::new(self.parse_expression(*value)?),
                index: Box::new(self.parse_expression(*slice)?),
                position: self.convert_range(range),
            }),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, range, .. }) => Ok(AssignTarget::Attr {
                object: Box::new(self.parse_expression(*value)?),
                attr: self.interner.intern(attr.id().as_str()),
                position: self.convert_range(range),
            }),
            AstExpr::Tuple(ast::ExprTuple { elts, range, .. }) | AstExpr::List(ast::ExprList { elts, range, .. }) => {
                let position = self.convert_range(range);
                let mut items = Vec::with_capacity(elts.len());
                let mut starred_seen = false;
                for elt in elts {
                    match elt {
                        AstExpr::Starred(ast::ExprStarred { value, range, .. }) => {
                            if starred_seen {
                                return Err(ParseError::new(
                                    "multiple starred expressions in assignment",
                                    self.convert_range(range),
                                ));
                            }
                            starred_seen = true;
                            items.push(UnpackItem::Starred(self.parse_assign_target(*value)?));
                        }
                        other => items.push(UnpackItem::Plain(self.parse_assign_target(other)?)),
                    }
                }
                Ok(AssignTarget::Unpack { items, position })
            }
            other => Err(ParseError::new(
                format!("invalid assignment target: {other:?}"),
                self.convert_range(other.range()),
            )),
        }
    }

    fn parse_expressions(&mut self, exprs: Vec<AstExpr>) -> Result<Vec<ExprLoc>, ParseError> {
        exprs.into_iter().map(|e| self.parse_expression(e)).collect()
    }

    fn parse_expr_items(&mut self, exprs: Vec<AstExpr>) -> Result<Vec<ExprItem>, ParseError> {
        exprs
            .into_iter()
            .map(|e| match e {
                AstExpr::Starred(ast::ExprStarred { value, .. }) => {
                    Ok(ExprItem::Starred(self.parse_expression(*value)?))
                }
                other => Ok(ExprItem::Plain(self.parse_expression(other)?)),
            })
            .collect()
    }

    fn parse_expression(&mut self, expression: AstExpr) -> Result<ExprLoc, ParseError> {
        self.enter_depth(|| expression.range())?;
        let result = self.parse_expression_impl(expression);
        self.depth_remaining += 1;
        result
    }

    fn parse_expression_impl(&mut self, expression: AstExpr) -> Result<ExprLoc, ParseError> {
        let position = self.convert_range(expression.range());
        let expr = match expression {
            AstExpr::BoolOp(ast::ExprBoolOp { op, values, .. }) => {
                let op = match op {
                    BoolOp::And => Operator::And,
                    BoolOp::Or => Operator::Or,
                };
                let mut values = self.parse_expressions(values)?;
                let mut result = values.remove(0);
                for right in values {
                    result = ExprLoc::new(
                        position,
                        Expr::Op {
                            left: Box::new(result),
                            op,
                            right: Box::new(right),
                        },
                    );
                }
                return Ok(result);
            }
            AstExpr::Named(ast::ExprNamed { target, value, .. }) => {
                let AstExpr::Name(ast::ExprName { id, range, .. }) = *target else {
                    return Err(ParseError::new("invalid walrus target", position));
                };
                Expr::Named {
                    target: self.identifier(id.as_str(), range),
                    value: Box::new(self.parse_expression(*value)?),
                }
            }
            AstExpr::BinOp(ast::ExprBinOp { left, op, right, .. }) => Expr::Op {
                left: Box::new(self.parse_expression(*left)?),
                op: convert_op(op),
                right: Box::new(self.parse_expression(*right)?),
            },
            AstExpr::UnaryOp(ast::ExprUnaryOp { op, operand, .. }) => {
                let operand = Box::new(self.parse_expression(*operand)?);
                match op {
                    UnaryOp::Not => Expr::Not(operand),
                    UnaryOp::USub => Expr::UnaryMinus(operand),
                    UnaryOp::UAdd => Expr::UnaryPlus(operand),
                    UnaryOp::Invert => Expr::UnaryInvert(operand),
                }
            }
            AstExpr::Lambda(ast::ExprLambda {
                parameters, body, range, ..
            }) => {
                let signature = match parameters {
                    Some(parameters) => self.parse_signature(&parameters)?,
                    None => ParsedSignature::default(),
                };
                let name_id = self.interner.intern("<lambda>");
                let return_position = self.convert_range(range);
                let value = self.parse_expression(*body)?;
                Expr::LambdaRaw(Box::new(RawFunctionDef {
                    name_id,
                    position: return_position,
                    signature,
                    body: vec![Node::Return {
                        value: Some(value),
                        position: return_position,
                    }],
                }))
            }
            AstExpr::If(ast::ExprIf { test, body, orelse, .. }) => Expr::IfElse {
                test: Box::new(self.parse_expression(*test)?),
                body: Box::new(self.parse_expression(*body)?),
                orelse: Box::new(self.parse_expression(*orelse)?),
            },
            AstExpr::Dict(ast::ExprDict { items, .. }) => {
                let mut entries = Vec::with_capacity(items.len());
                for ast::DictItem { key, value } in items {
                    match key {
                        Some(key) => entries.push(DictItem::Pair(
                            self.parse_expression(key)?,
                            self.parse_expression(value)?,
                        )),
                        None => entries.push(DictItem::Unpack(self.parse_expression(value)?)),
                    }
                }
                Expr::Dict(entries)
            }
            AstExpr::Set(ast::ExprSet { elts, .. }) => Expr::Set(self.parse_expressions(elts)?),
            AstExpr::ListComp(ast::ExprListComp { elt, generators, .. }) => Expr::ListComp {
                elt: Box::new(self.parse_expression(*elt)?),
                generators: self.parse_comprehensions(generators)?,
            },
            AstExpr::SetComp(ast::ExprSetComp { elt, generators, .. }) => Expr::SetComp {
                elt: Box::new(self.parse_expression(*elt)?),
                generators: self.parse_comprehensions(generators)?,
            },
            AstExpr::DictComp(ast::ExprDictComp {
                key, value, generators, range, ..
            }) => {
                let Some(key) = key else {
                    return Err(ParseError::new(
                        "dict unpacking in comprehensions is not supported",
                        self.convert_range(range),
                    ));
                };
                Expr::DictComp {
                    key: Box::new(self.parse_expression(*key)?),
                    value: Box::new(self.parse_expression(*value)?),
                    generators: self.parse_comprehensions(generators)?,
                }
            }
            AstExpr::Generator(ast::ExprGenerator { elt, generators, .. }) => Expr::GeneratorExp {
                elt: Box::new(self.parse_expression(*elt)?),
                generators: self.parse_comprehensions(generators)?,
            },
            AstExpr::Await(a) => {
                return Err(ParseError::new("await is not supported", self.convert_range(a.range)));
            }
            AstExpr::Yield(y) => {
                return Err(ParseError::new(
                    "generators (yield) are not supported",
                    self.convert_range(y.range),
                ));
            }
            AstExpr::YieldFrom(y) => {
                return Err(ParseError::new(
                    "generators (yield from) are not supported",
                    self.convert_range(y.range),
                ));
            }
            AstExpr::Compare(ast::ExprCompare {
                left, ops, comparators, ..
            }) => {
                let left = Box::new(self.parse_expression(*left)?);
                let comparisons = ops
                    .iter()
                    .zip(comparators)
                    .map(|(op, comparator)| Ok((convert_cmp_op(*op), self.parse_expression(comparator)?)))
                    .collect::<Result<Vec<_>, ParseError>>()?;
                Expr::CmpOp { left, comparisons }
            }
            AstExpr::Call(ast::ExprCall { func, arguments, .. }) => {
                let args = self.parse_arguments(arguments)?;
                match *func {
                    AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Expr::AttrCall {
                        object: Box::new(self.parse_expression(*value)?),
                        attr: self.interner.intern(attr.id().as_str()),
                        args: Box::new(args),
                    },
                    other => Expr::Call {
                        callable: Box::new(self.parse_expression(other)?),
                        args: Box::new(args),
                    },
                }
            }
            AstExpr::FString(ast::ExprFString { value, .. }) => {
                let mut parts = Vec::new();
                for part in &value {
                    match part {
                        ast::FStringPart::Literal(literal) => {
                            let id = self.interner.intern(&literal.value.to_string());
                            parts.push(FStringPart::Literal(id));
                        }
                        ast::FStringPart::FString(fstring) => {
                            for element in &fstring.elements {
                                parts.push(self.parse_fstring_element(element)?);
                            }
                        }
                    }
                }
                Expr::FString(parts)
            }
            AstExpr::TString(t) => {
                return Err(ParseError::new(
                    "template strings are not supported",
                    self.convert_range(t.range),
                ));
            }
            AstExpr::StringLiteral(ast::ExprStringLiteral { value, .. }) => {
                let id = self.interner.intern(&value.to_string());
                Expr::Literal(Literal::Str(id))
            }
            AstExpr::BytesLiteral(ast::ExprBytesLiteral { value, .. }) => {
                let bytes: Cow<'_, [u8]> = Cow::from(&value);
                let id = self.interner.intern_bytes(&bytes);
                Expr::Literal(Literal::Bytes(id))
            }
            AstExpr::NumberLiteral(ast::ExprNumberLiteral { value, .. }) => match value {
                Number::Int(i) => {
                    if let Some(small) = i.as_i64() {
                        Expr::Literal(Literal::Int(small))
                    } else {
                        let big = parse_int_literal(&i.to_string()).ok_or_else(|| {
                            ParseError::new(format!("invalid integer literal: {i}"), position)
                        })?;
                        Expr::Literal(Literal::LongInt(self.interner.intern_long_int(big)))
                    }
                }
                Number::Float(f) => Expr::Literal(Literal::Float(f)),
                Number::Complex { .. } => {
                    return Err(ParseError::new("complex literals are not supported", position));
                }
            },
            AstExpr::BooleanLiteral(ast::ExprBooleanLiteral { value, .. }) => Expr::Literal(Literal::Bool(value)),
            AstExpr::NoneLiteral(_) => Expr::Literal(Literal::None),
            AstExpr::EllipsisLiteral(_) => Expr::Literal(Literal::Ellipsis),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Expr::AttrGet {
                object: Box::new(self.parse_expression(*value)?),
                attr: self.interner.intern(attr.id().as_str()),
            },
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => Expr::Subscript {
                object: Box::new(self.parse_expression(*value)?),
                index: Box::new(self.parse_expression(*slice)?),
            },
            AstExpr::Starred(s) => {
                return Err(ParseError::new(
                    "starred expression outside of call or display",
                    self.convert_range(s.range),
                ));
            }
            AstExpr::Name(ast::ExprName { id, range, .. }) => {
                if id.as_str() == "NotImplemented" {
                    Expr::Literal(Literal::NotImplemented)
                } else {
                    Expr::Name(self.identifier(id.as_str(), range))
                }
            }
            AstExpr::List(ast::ExprList { elts, .. }) => Expr::List(self.parse_expr_items(elts)?),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) => Expr::Tuple(self.parse_expr_items(elts)?),
            AstExpr::Slice(ast::ExprSlice { lower, upper, step, .. }) => Expr::Slice {
                lower: lower.map(|e| self.parse_expression(*e).map(Box::new)).transpose()?,
                upper: upper.map(|e| self.parse_expression(*e).map(Box::new)).transpose()?,
                step: step.map(|e| self.parse_expression(*e).map(Box::new)).transpose()?,
            },
            AstExpr::IpyEscapeCommand(c) => {
                return Err(ParseError::new(
                    "IPython escape commands are not supported",
                    self.convert_range(c.range),
                ));
            }
        };
        Ok(ExprLoc::new(position, expr))
    }

    fn parse_comprehensions(
        &mut self,
        generators: Vec<ast::Comprehension>,
    ) -> Result<Vec<Comprehension>, ParseError> {
        generators
            .into_iter()
            .map(|generator| {
                if generator.is_async {
                    return Err(ParseError::new(
                        "async comprehensions are not supported",
                        self.convert_range(generator.range),
                    ));
                }
                Ok(Comprehension {
                    target: self.parse_assign_target(generator.target)?,
                    iter: self.parse_expression(generator.iter)?,
                    ifs: self.parse_expressions(generator.ifs)?,
                })
            })
            .collect()
    }

    fn parse_arguments(&mut self, arguments: ast::Arguments) -> Result<ArgExprs, ParseError> {
        let ast::Arguments { args, keywords, .. } = arguments;
        let pos = self.parse_expr_items(args.into_vec())?;
        let mut kwargs = Vec::new();
        let mut star_kwargs = Vec::new();
        for keyword in keywords.to_vec() {
            match keyword.arg {
                Some(name) => {
                    let name_id = self.interner.intern(name.id.as_str());
                    kwargs.push((name_id, self.parse_expression(keyword.value)?));
                }
                None => star_kwargs.push(self.parse_expression(keyword.value)?),
            }
        }
        Ok(ArgExprs {
            pos,
            kwargs,
            star_kwargs,
        })
    }

    fn parse_fstring_element(&mut self, element: &InterpolatedStringElement) -> Result<FStringPart, ParseError> {
        match element {
            InterpolatedStringElement::Literal(literal) => {
                let id = self.interner.intern(&literal.value.to_string());
                Ok(FStringPart::Literal(id))
            }
            InterpolatedStringElement::Interpolation(interpolation) => {
                let expr = self.parse_expression((*interpolation.expression).clone())?;
                let conversion = match interpolation.conversion {
                    RuffConversionFlag::None => ConversionFlag::None,
                    RuffConversionFlag::Str => ConversionFlag::Str,
                    RuffConversionFlag::Repr => ConversionFlag::Repr,
                    RuffConversionFlag::Ascii => ConversionFlag::Ascii,
                };
                let spec = match &interpolation.format_spec {
                    None => None,
                    Some(spec) => {
                        let mut text = String::new();
                        for element in &spec.elements {
                            match element {
                                InterpolatedStringElement::Literal(literal) => {
                                    text.push_str(&literal.value.to_string());
                                }
                                InterpolatedStringElement::Interpolation(_) => {
                                    return Err(ParseError::new(
                                        "nested interpolations in format specs are not supported",
                                        self.convert_range(spec.range),
                                    ));
                                }
                            }
                        }
                        Some(self.interner.intern(&text))
                    }
                };
                Ok(FStringPart::Interpolation {
                    expr,
                    conversion,
                    spec,
                })
            }
        }
    }
}

fn convert_op(op: AstOperator) -> Operator {
    match op {
        AstOperator::Add => Operator::Add,
        AstOperator::Sub => Operator::Sub,
        AstOperator::Mult => Operator::Mult,
        AstOperator::MatMult => Operator::MatMult,
        AstOperator::Div => Operator::Div,
        AstOperator::Mod => Operator::Mod,
        AstOperator::Pow => Operator::Pow,
        AstOperator::LShift => Operator::LShift,
        AstOperator::RShift => Operator::RShift,
        AstOperator::BitOr => Operator::BitOr,
        AstOperator::BitXor => Operator::BitXor,
        AstOperator::BitAnd => Operator::BitAnd,
        AstOperator::FloorDiv => Operator::FloorDiv,
    }
}

fn convert_cmp_op(op: CmpOp) -> CmpOperator {
    match op {
        CmpOp::Eq => CmpOperator::Eq,
        CmpOp::NotEq => CmpOperator::NotEq,
        CmpOp::Lt => CmpOperator::Lt,
        CmpOp::LtE => CmpOperator::LtE,
        CmpOp::Gt => CmpOperator::Gt,
        CmpOp::GtE => CmpOperator::GtE,
        CmpOp::Is => CmpOperator::Is,
        CmpOp::IsNot => CmpOperator::IsNot,
        CmpOp::In => CmpOperator::In,
        CmpOp::NotIn => CmpOperator::NotIn,
    }
}

/// Parses an oversized integer literal, handling radix prefixes and
/// underscore separators.
fn parse_int_literal(text: &str) -> Option<BigInt> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if cleaned.len() >= 2 {
        let (prefix, digits) = cleaned.split_at(2);
        match prefix.to_ascii_lowercase().as_str() {
            "0x" => return BigInt::parse_bytes(digits.as_bytes(), 16),
            "0o" => return BigInt::parse_bytes(digits.as_bytes(), 8),
            "0b" => return BigInt::parse_bytes(digits.as_bytes(), 2),
            _ => {}
        }
    }
    cleaned.parse::<BigInt>().ok()
}

