//! The program tree.
//!
//! One `Node`/`Expr` shape serves both phases: the parser emits it with
//! unresolved identifiers (and `FunctionDefRaw`/`LambdaRaw` nodes holding raw
//! bodies), then the prepare pass rewrites it in place — resolving every
//! `Identifier` to a scope and namespace slot, lowering raw function
//! definitions to [`FunctionDefNode`]s whose bodies live in the intern table,
//! and consuming `global`/`nonlocal` declarations. The evaluator only ever
//! sees the prepared form.

use crate::{
    fstring::FStringPart,
    intern::{BytesId, FunctionId, LongIntId, StringId},
    modules::ModuleId,
    parse::CodeRange,
};

/// Which namespace a resolved name lives in.
///
/// The rules: assignment binds locally unless declared `global`/`nonlocal`;
/// reads search local, then enclosing cells, then module globals, then
/// builtins. Reads of module globals from nested functions resolve to
/// `Global` without any declaration — only assignment forces the issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub(crate) enum NameScope {
    /// A frame-local slot.
    #[default]
    Local,
    /// A module-global slot; falls back to builtins on read misses.
    Global,
    /// A closure cell: the local slot holds a `Ref` to a heap cell.
    Cell,
}

/// A name with source position and (after prepare) its resolved slot.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub(crate) struct Identifier {
    pub name_id: StringId,
    pub position: CodeRange,
    pub scope: NameScope,
    /// Slot index in the scope's namespace; `u32::MAX` until prepared.
    pub slot: u32,
}

impl Identifier {
    pub(crate) fn unresolved(name_id: StringId, position: CodeRange) -> Self {
        Self {
            name_id,
            position,
            scope: NameScope::Local,
            slot: u32::MAX,
        }
    }
}

/// An expression with its source position.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct ExprLoc {
    pub position: CodeRange,
    pub expr: Expr,
}

impl ExprLoc {
    pub(crate) fn new(position: CodeRange, expr: Expr) -> Self {
        Self { position, expr }
    }
}

/// Literals resolvable without a heap.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub(crate) enum Literal {
    None,
    Ellipsis,
    NotImplemented,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(StringId),
    Bytes(BytesId),
    LongInt(LongIntId),
}

/// An element of a list/tuple display or a positional argument list.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) enum ExprItem {
    Plain(ExprLoc),
    /// `*expr` unpacking.
    Starred(ExprLoc),
}

/// One entry of a dict display, preserving source order.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) enum DictItem {
    Pair(ExprLoc, ExprLoc),
    /// `**mapping` unpacking.
    Unpack(ExprLoc),
}

/// Call arguments before evaluation.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct ArgExprs {
    pub pos: Vec<ExprItem>,
    pub kwargs: Vec<(StringId, ExprLoc)>,
    pub star_kwargs: Vec<ExprLoc>,
}

/// A `for` clause in a comprehension with its `if` filters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct Comprehension {
    pub target: AssignTarget,
    pub iter: ExprLoc,
    pub ifs: Vec<ExprLoc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) enum Expr {
    Literal(Literal),
    Name(Identifier),
    Tuple(Vec<ExprItem>),
    List(Vec<ExprItem>),
    Set(Vec<ExprLoc>),
    Dict(Vec<DictItem>),
    /// Binary operation, including the short-circuiting `and`/`or` (whose
    /// right operand the evaluator forces lazily).
    Op {
        left: Box<ExprLoc>,
        op: Operator,
        right: Box<ExprLoc>,
    },
    /// Chained comparison: `a < b <= c` evaluates each operand once and
    /// short-circuits on the first false link.
    CmpOp {
        left: Box<ExprLoc>,
        comparisons: Vec<(CmpOperator, ExprLoc)>,
    },
    Not(Box<ExprLoc>),
    UnaryMinus(Box<ExprLoc>),
    UnaryPlus(Box<ExprLoc>),
    UnaryInvert(Box<ExprLoc>),
    Subscript {
        object: Box<ExprLoc>,
        index: Box<ExprLoc>,
    },
    /// `x[a:b:c]` slice display.
    Slice {
        lower: Option<Box<ExprLoc>>,
        upper: Option<Box<ExprLoc>>,
        step: Option<Box<ExprLoc>>,
    },
    Call {
        callable: Box<ExprLoc>,
        args: Box<ArgExprs>,
    },
    AttrGet {
        object: Box<ExprLoc>,
        attr: StringId,
    },
    /// `obj.method(args)` fused into one node so no bound method is
    /// materialized on the common path.
    AttrCall {
        object: Box<ExprLoc>,
        attr: StringId,
        args: Box<ArgExprs>,
    },
    FString(Vec<FStringPart>),
    IfElse {
        test: Box<ExprLoc>,
        body: Box<ExprLoc>,
        orelse: Box<ExprLoc>,
    },
    /// Parser output; lowered to `Lambda` during prepare.
    LambdaRaw(Box<RawFunctionDef>),
    Lambda(Box<FunctionDefNode>),
    ListComp {
        elt: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<ExprLoc>,
        value: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    /// Generator expressions materialize eagerly into a list — a documented
    /// deviation from the reference semantics.
    GeneratorExp {
        elt: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    /// Walrus: `(name := value)`.
    Named {
        target: Identifier,
        value: Box<ExprLoc>,
    },
}

/// An assignment target (also used by `for` and `with ... as`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) enum AssignTarget {
    Name(Identifier),
    Subscript {
        object: Box<ExprLoc>,
        index: Box<ExprLoc>,
        position: CodeRange,
    },
    Attr {
        object: Box<ExprLoc>,
        attr: StringId,
        position: CodeRange,
    },
    /// Tuple/list unpacking, possibly with one starred item.
    Unpack {
        items: Vec<UnpackItem>,
        position: CodeRange,
    },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) enum UnpackItem {
    Plain(AssignTarget),
    Starred(AssignTarget),
}

/// Augmented-assignment target (`x += ...`, `d[k] += ...`, `o.a += ...`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) enum AugTarget {
    Name(Identifier),
    Subscript { object: ExprLoc, index: ExprLoc },
    Attr { object: ExprLoc, attr: StringId },
}

/// `del` target.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) enum DeleteTarget {
    Name(Identifier),
    Subscript { object: ExprLoc, index: ExprLoc },
    Attr { object: ExprLoc, attr: StringId },
}

/// `try/except/else/finally`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct Try {
    pub body: Vec<Node>,
    pub handlers: Vec<ExceptHandler>,
    pub or_else: Vec<Node>,
    pub finally: Vec<Node>,
}

/// One `except` clause; `exc_type: None` is a bare `except:`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct ExceptHandler {
    pub exc_type: Option<ExprLoc>,
    pub name: Option<Identifier>,
    pub body: Vec<Node>,
    pub position: CodeRange,
}

/// A statement.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) enum Node {
    Pass,
    Expr(ExprLoc),
    Return {
        value: Option<ExprLoc>,
        position: CodeRange,
    },
    Raise {
        exc: Option<ExprLoc>,
        cause: Option<ExprLoc>,
        position: CodeRange,
    },
    Assert {
        test: ExprLoc,
        msg: Option<ExprLoc>,
        position: CodeRange,
    },
    /// `a = b = value` keeps all targets; evaluated right-to-left-hand-side
    /// once, assigned left to right.
    Assign {
        targets: Vec<AssignTarget>,
        value: ExprLoc,
    },
    AugAssign {
        target: AugTarget,
        op: Operator,
        value: ExprLoc,
        position: CodeRange,
    },
    For {
        target: AssignTarget,
        iter: ExprLoc,
        body: Vec<Node>,
        or_else: Vec<Node>,
        position: CodeRange,
    },
    While {
        test: ExprLoc,
        body: Vec<Node>,
        or_else: Vec<Node>,
    },
    If {
        test: ExprLoc,
        body: Vec<Node>,
        or_else: Vec<Node>,
    },
    Break(CodeRange),
    Continue(CodeRange),
    /// Parser output; lowered to `FunctionDef` during prepare.
    FunctionDefRaw(Box<RawFunctionDef>),
    FunctionDef(Box<FunctionDefNode>),
    Try(Box<Try>),
    With {
        context: ExprLoc,
        var: Option<AssignTarget>,
        body: Vec<Node>,
        position: CodeRange,
    },
    Delete {
        target: DeleteTarget,
        position: CodeRange,
    },
    /// Declaration only; consumed by prepare, never executed.
    Global {
        names: Vec<StringId>,
        position: CodeRange,
    },
    /// Declaration only; consumed by prepare, never executed.
    Nonlocal {
        names: Vec<StringId>,
        position: CodeRange,
    },
    Import {
        module: ModuleId,
        binding: Identifier,
        position: CodeRange,
    },
    ImportFrom {
        module: ModuleId,
        names: Vec<(StringId, Identifier)>,
        position: CodeRange,
    },
}

/// A parameter as parsed, default expression still unevaluated.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct ParsedParam {
    pub name: StringId,
    pub default: Option<ExprLoc>,
}

/// A parsed signature before preparation.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct ParsedSignature {
    /// Positional-or-keyword parameters (positional-only folded in).
    pub params: Vec<ParsedParam>,
    pub vararg: Option<StringId>,
    pub kwonly: Vec<ParsedParam>,
    pub kwarg: Option<StringId>,
}

impl ParsedSignature {
    pub(crate) fn param_names(&self) -> impl Iterator<Item = StringId> + '_ {
        self.params
            .iter()
            .map(|p| p.name)
            .chain(self.vararg)
            .chain(self.kwonly.iter().map(|p| p.name))
            .chain(self.kwarg)
    }
}

/// A raw function definition straight out of the parser.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct RawFunctionDef {
    pub name_id: StringId,
    pub position: CodeRange,
    pub signature: ParsedSignature,
    pub body: Vec<Node>,
}

/// A prepared function-definition site.
///
/// The body lives in the intern table under `function_id`; this node carries
/// what must happen at definition time — evaluate defaults, capture cells,
/// bind the name.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct FunctionDefNode {
    pub function_id: FunctionId,
    /// `None` for lambdas (the value is the expression result instead).
    pub binding: Option<Identifier>,
    pub default_exprs: Vec<ExprLoc>,
    pub kw_default_exprs: Vec<(StringId, ExprLoc)>,
    /// Enclosing-frame slots whose cells the new closure captures, in the
    /// order the function's `free_var_slots` expects them.
    pub free_var_enclosing_slots: Vec<u32>,
    pub position: CodeRange,
}

/// A prepared function body, stored once in the intern table.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct FunctionDef {
    pub name_id: StringId,
    pub signature: Signature,
    pub body: Vec<Node>,
    /// Total local slots, parameters included.
    pub namespace_size: usize,
    /// Slots to seed with fresh empty cells on frame entry (cell variables
    /// that are not parameters).
    pub cell_init_slots: Vec<u32>,
    /// `(param_slot)` entries for parameters captured by nested functions:
    /// after binding, the bound value is moved into a fresh cell in place.
    pub cell_param_slots: Vec<u32>,
    /// Local slots that receive the captured cells from the closure, in
    /// capture order.
    pub free_var_slots: Vec<u32>,
}

/// A prepared signature: names only, default values live on the closure.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct Signature {
    pub params: Vec<StringId>,
    /// How many trailing `params` have defaults.
    pub num_defaults: usize,
    pub vararg: Option<StringId>,
    pub kwonly: Vec<StringId>,
    pub kwarg: Option<StringId>,
}

/// Binary operators (plus the boolean short-circuit pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) enum Operator {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
    FloorDiv,
    And,
    Or,
}

impl Operator {
    /// The operator's source symbol, as used in error messages.
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::MatMult => "@",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "** or pow()",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::FloorDiv => "//",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// The symbol used for augmented assignment errors (`+=`).
    pub(crate) fn aug_symbol(self) -> &'static str {
        match self {
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mult => "*=",
            Self::MatMult => "@=",
            Self::Div => "/=",
            Self::Mod => "%=",
            Self::Pow => "**=",
            Self::LShift => "<<=",
            Self::RShift => ">>=",
            Self::BitOr => "|=",
            Self::BitXor => "^=",
            Self::BitAnd => "&=",
            Self::FloorDiv => "//=",
            Self::And | Self::Or => "",
        }
    }
}

/// Comparison operators; these always produce a `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOperator {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}
