use enum_as_inner::EnumAsInner;

use super::ops::{BinaryOperator, InequalityOperator, MultiOperator, OpTag};
use super::Expr;
use crate::value::Value;

/// The closed operator catalogue. One variant per operator; the parser owns
/// the mapping from the looser wire forms onto these rigid shapes.
///
/// `default`-style clause fields hold the `NULL` literal when absent, so
/// shapes stay uniform and `partial_eval` can treat the clause like any other
/// child.
#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum ExprKind {
    Variable(String),
    /// Row offset within the current window.
    Offset(i64),
    /// A constant. `Value::Null`, `Value::Boolean(_)` and everything else
    /// behave as the distinct nullish singletons of the data model.
    Literal(Value),
    /// A date constant, in Unix seconds.
    Date(f64),
    Script(String),
    Tuple(Vec<Expr>),
    /// Expand an object to its leaf paths.
    Leaves(Box<Expr>),
    Coalesce(Vec<Expr>),
    Get {
        container: Box<Expr>,
        index: Box<Expr>,
    },
    Rows {
        var: Box<Expr>,
        offset: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Multi {
        op: MultiOperator,
        terms: Vec<Expr>,
        /// Ignore missing terms instead of propagating them.
        nulls: bool,
        default: Box<Expr>,
    },
    Div {
        numer: Box<Expr>,
        denom: Box<Expr>,
        default: Box<Expr>,
    },
    /// Round `term` down to a multiple of `modulo`.
    Floor {
        term: Box<Expr>,
        modulo: Box<Expr>,
    },
    Abs(Box<Expr>),
    Number(Box<Expr>),
    Unix(Box<Expr>),
    FromUnix(Box<Expr>),
    Eq {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ne {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Inequality {
        op: InequalityOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    In {
        value: Box<Expr>,
        superset: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Missing(Box<Expr>),
    Exists(Box<Expr>),
    Length(Box<Expr>),
    String(Box<Expr>),
    Prefix {
        value: Box<Expr>,
        prefix: Box<Expr>,
    },
    Suffix {
        value: Box<Expr>,
        suffix: Box<Expr>,
    },
    Concat {
        terms: Vec<Expr>,
        separator: Box<Expr>,
        default: Box<Expr>,
    },
    Left {
        value: Box<Expr>,
        length: Box<Expr>,
    },
    Right {
        value: Box<Expr>,
        length: Box<Expr>,
    },
    /// All but the leftmost `length` characters.
    NotLeft {
        value: Box<Expr>,
        length: Box<Expr>,
    },
    /// All but the rightmost `length` characters.
    NotRight {
        value: Box<Expr>,
        length: Box<Expr>,
    },
    /// 0-based index of `find` within `value`, missing (or `default`) when
    /// absent.
    Find {
        value: Box<Expr>,
        find: Box<Expr>,
        start: Box<Expr>,
        default: Box<Expr>,
    },
    Split {
        value: Box<Expr>,
        separator: Box<Expr>,
    },
    /// The substring strictly between `prefix` and `suffix`.
    Between {
        value: Box<Expr>,
        prefix: Box<Expr>,
        suffix: Box<Expr>,
        start: Box<Expr>,
        default: Box<Expr>,
    },
    RegExp {
        value: Box<Expr>,
        pattern: std::string::String,
    },
    // The `basic.*` and `sql.*` operators are the primitive forms the richer
    // string operators lower into: they assume non-missing inputs and mirror
    // the target built-ins directly.
    BasicIndexOf {
        value: Box<Expr>,
        find: Box<Expr>,
        start: Box<Expr>,
    },
    BasicStartsWith {
        value: Box<Expr>,
        prefix: Box<Expr>,
    },
    /// 0-based, half-open `[start, end)` slice.
    BasicSubstring {
        value: Box<Expr>,
        start: Box<Expr>,
        end: Box<Expr>,
    },
    BasicEq {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// SQL `INSTR`: 1-based, 0 when absent.
    SqlInstr {
        value: Box<Expr>,
        find: Box<Expr>,
    },
    /// SQL `SUBSTR`: 1-based start.
    SqlSubstr {
        value: Box<Expr>,
        start: Box<Expr>,
        length: Box<Expr>,
    },
    When {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    Case {
        /// Each is a [ExprKind::When] without an `else` clause; enforced at
        /// construction.
        whens: Vec<Expr>,
        default: Box<Expr>,
    },
    Count(Vec<Expr>),
    Max(Vec<Expr>),
    Min(Vec<Expr>),
}

impl ExprKind {
    /// The dispatch key for parser registration and per-language emitter
    /// lookup.
    pub fn op_tag(&self) -> OpTag {
        match self {
            ExprKind::Variable(_) => OpTag::Variable,
            ExprKind::Offset(_) => OpTag::Offset,
            ExprKind::Literal(_) => OpTag::Literal,
            ExprKind::Date(_) => OpTag::Date,
            ExprKind::Script(_) => OpTag::Script,
            ExprKind::Tuple(_) => OpTag::Tuple,
            ExprKind::Leaves(_) => OpTag::Leaves,
            ExprKind::Coalesce(_) => OpTag::Coalesce,
            ExprKind::Get { .. } => OpTag::Get,
            ExprKind::Rows { .. } => OpTag::Rows,
            ExprKind::Binary { op, .. } => op.tag(),
            ExprKind::Multi { op, nulls, .. } => match (op, nulls) {
                (MultiOperator::Add, false) => OpTag::Add,
                (MultiOperator::Add, true) => OpTag::Sum,
                (MultiOperator::Mul, _) => OpTag::Mul,
            },
            ExprKind::Div { .. } => OpTag::Div,
            ExprKind::Floor { .. } => OpTag::Floor,
            ExprKind::Abs(_) => OpTag::Abs,
            ExprKind::Number(_) => OpTag::Number,
            ExprKind::Unix(_) => OpTag::Unix,
            ExprKind::FromUnix(_) => OpTag::FromUnix,
            ExprKind::Eq { .. } => OpTag::Eq,
            ExprKind::Ne { .. } => OpTag::Ne,
            ExprKind::Inequality { op, .. } => op.tag(),
            ExprKind::In { .. } => OpTag::In,
            ExprKind::And(_) => OpTag::And,
            ExprKind::Or(_) => OpTag::Or,
            ExprKind::Not(_) => OpTag::Not,
            ExprKind::Missing(_) => OpTag::Missing,
            ExprKind::Exists(_) => OpTag::Exists,
            ExprKind::Length(_) => OpTag::Length,
            ExprKind::String(_) => OpTag::String,
            ExprKind::Prefix { .. } => OpTag::Prefix,
            ExprKind::Suffix { .. } => OpTag::Suffix,
            ExprKind::Concat { .. } => OpTag::Concat,
            ExprKind::Left { .. } => OpTag::Left,
            ExprKind::Right { .. } => OpTag::Right,
            ExprKind::NotLeft { .. } => OpTag::NotLeft,
            ExprKind::NotRight { .. } => OpTag::NotRight,
            ExprKind::Find { .. } => OpTag::Find,
            ExprKind::Split { .. } => OpTag::Split,
            ExprKind::Between { .. } => OpTag::Between,
            ExprKind::RegExp { .. } => OpTag::RegExp,
            ExprKind::BasicIndexOf { .. } => OpTag::BasicIndexOf,
            ExprKind::BasicStartsWith { .. } => OpTag::BasicStartsWith,
            ExprKind::BasicSubstring { .. } => OpTag::BasicSubstring,
            ExprKind::BasicEq { .. } => OpTag::BasicEq,
            ExprKind::SqlInstr { .. } => OpTag::SqlInstr,
            ExprKind::SqlSubstr { .. } => OpTag::SqlSubstr,
            ExprKind::When { .. } => OpTag::When,
            ExprKind::Case { .. } => OpTag::Case,
            ExprKind::Count(_) => OpTag::Count,
            ExprKind::Max(_) => OpTag::Max,
            ExprKind::Min(_) => OpTag::Min,
        }
    }
}
