//! Operator tags.
//!
//! [OpTag] is the closed catalogue of operator tags: the parser resolves the
//! first matching key of a JSON object against it, and the per-target
//! [crate::translate::Language] registries are keyed by it. Aliases from the
//! wire format (`subtract`, `term`, `neq`, …) are extra serializations; the
//! canonical tag is what `Display` and `__data__` produce.

use strum::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum OpTag {
    #[strum(to_string = "variable")]
    Variable,
    #[strum(to_string = "offset")]
    Offset,
    #[strum(to_string = "literal")]
    Literal,
    #[strum(to_string = "date")]
    Date,
    #[strum(to_string = "script")]
    Script,
    #[strum(to_string = "tuple")]
    Tuple,
    #[strum(to_string = "leaves")]
    Leaves,
    #[strum(to_string = "coalesce")]
    Coalesce,
    #[strum(to_string = "get")]
    Get,
    #[strum(to_string = "rows")]
    Rows,
    #[strum(to_string = "sub", serialize = "subtract", serialize = "minus")]
    Sub,
    #[strum(to_string = "mul", serialize = "mult", serialize = "multiply")]
    Mul,
    #[strum(to_string = "div", serialize = "divide")]
    Div,
    #[strum(to_string = "exp")]
    Exp,
    #[strum(to_string = "mod")]
    Mod,
    #[strum(to_string = "add")]
    Add,
    #[strum(to_string = "sum")]
    Sum,
    #[strum(to_string = "floor")]
    Floor,
    #[strum(to_string = "abs")]
    Abs,
    #[strum(to_string = "number")]
    Number,
    #[strum(to_string = "unix")]
    Unix,
    #[strum(to_string = "from_unix")]
    FromUnix,
    #[strum(to_string = "eq", serialize = "term")]
    Eq,
    #[strum(to_string = "ne", serialize = "neq")]
    Ne,
    #[strum(to_string = "gt")]
    Gt,
    #[strum(to_string = "gte")]
    Gte,
    #[strum(to_string = "lt")]
    Lt,
    #[strum(to_string = "lte")]
    Lte,
    #[strum(to_string = "in", serialize = "terms")]
    In,
    #[strum(to_string = "range")]
    Range,
    #[strum(to_string = "and")]
    And,
    #[strum(to_string = "or")]
    Or,
    #[strum(to_string = "not")]
    Not,
    #[strum(to_string = "missing")]
    Missing,
    #[strum(to_string = "exists")]
    Exists,
    #[strum(to_string = "length")]
    Length,
    #[strum(to_string = "string")]
    String,
    #[strum(to_string = "prefix")]
    Prefix,
    #[strum(to_string = "suffix")]
    Suffix,
    #[strum(to_string = "concat")]
    Concat,
    #[strum(to_string = "left")]
    Left,
    #[strum(to_string = "right")]
    Right,
    #[strum(to_string = "not_left")]
    NotLeft,
    #[strum(to_string = "not_right")]
    NotRight,
    #[strum(to_string = "instr", serialize = "find")]
    Find,
    #[strum(to_string = "split")]
    Split,
    #[strum(to_string = "between")]
    Between,
    #[strum(to_string = "regex", serialize = "regexp")]
    RegExp,
    #[strum(to_string = "basic.indexOf")]
    BasicIndexOf,
    #[strum(to_string = "basic.startsWith")]
    BasicStartsWith,
    #[strum(to_string = "basic.substring")]
    BasicSubstring,
    #[strum(to_string = "basic.eq")]
    BasicEq,
    #[strum(to_string = "sql.instr")]
    SqlInstr,
    #[strum(to_string = "sql.substr")]
    SqlSubstr,
    #[strum(to_string = "when")]
    When,
    #[strum(to_string = "case")]
    Case,
    #[strum(to_string = "count")]
    Count,
    #[strum(to_string = "max")]
    Max,
    #[strum(to_string = "min")]
    Min,
}

impl OpTag {
    /// Operators accepting the `{op: {field: value}}` short form.
    pub fn has_simple_form(&self) -> bool {
        matches!(
            self,
            OpTag::Eq
                | OpTag::Ne
                | OpTag::Gt
                | OpTag::Gte
                | OpTag::Lt
                | OpTag::Lte
                | OpTag::In
                | OpTag::Prefix
                | OpTag::Suffix
                | OpTag::Left
                | OpTag::Right
                | OpTag::NotLeft
                | OpTag::NotRight
                | OpTag::Find
                | OpTag::Between
                | OpTag::RegExp
        )
    }
}

/// Non-commutative two-operand arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum BinaryOperator {
    #[strum(to_string = "sub")]
    Sub,
    #[strum(to_string = "mul")]
    Mul,
    #[strum(to_string = "div")]
    Div,
    #[strum(to_string = "exp")]
    Exp,
    #[strum(to_string = "mod")]
    Mod,
}

impl BinaryOperator {
    pub fn tag(&self) -> OpTag {
        match self {
            BinaryOperator::Sub => OpTag::Sub,
            BinaryOperator::Mul => OpTag::Mul,
            BinaryOperator::Div => OpTag::Div,
            BinaryOperator::Exp => OpTag::Exp,
            BinaryOperator::Mod => OpTag::Mod,
        }
    }
}

/// Commutative variadic arithmetic, with `default` and `nulls` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum MultiOperator {
    #[strum(to_string = "add")]
    Add,
    #[strum(to_string = "mul")]
    Mul,
}

impl MultiOperator {
    /// The fold identity: what an empty term list evaluates to.
    pub fn identity(&self) -> f64 {
        match self {
            MultiOperator::Add => 0.0,
            MultiOperator::Mul => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum InequalityOperator {
    #[strum(to_string = "gt")]
    Gt,
    #[strum(to_string = "gte")]
    Gte,
    #[strum(to_string = "lt")]
    Lt,
    #[strum(to_string = "lte")]
    Lte,
}

impl InequalityOperator {
    pub fn tag(&self) -> OpTag {
        match self {
            InequalityOperator::Gt => OpTag::Gt,
            InequalityOperator::Gte => OpTag::Gte,
            InequalityOperator::Lt => OpTag::Lt,
            InequalityOperator::Lte => OpTag::Lte,
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, InequalityOperator::Gt | InequalityOperator::Lt)
    }

    /// The SQL spelling of the comparison.
    pub fn sql(&self) -> &'static str {
        match self {
            InequalityOperator::Gt => ">",
            InequalityOperator::Gte => ">=",
            InequalityOperator::Lt => "<",
            InequalityOperator::Lte => "<=",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn aliases_resolve_to_the_canonical_operator() {
        assert_eq!(OpTag::from_str("subtract").unwrap(), OpTag::Sub);
        assert_eq!(OpTag::from_str("minus").unwrap(), OpTag::Sub);
        assert_eq!(OpTag::from_str("mult").unwrap(), OpTag::Mul);
        assert_eq!(OpTag::from_str("divide").unwrap(), OpTag::Div);
        assert_eq!(OpTag::from_str("term").unwrap(), OpTag::Eq);
        assert_eq!(OpTag::from_str("terms").unwrap(), OpTag::In);
        assert_eq!(OpTag::from_str("neq").unwrap(), OpTag::Ne);
        assert_eq!(OpTag::from_str("regexp").unwrap(), OpTag::RegExp);
        assert_eq!(OpTag::from_str("find").unwrap(), OpTag::Find);
        assert!(OpTag::from_str("frobnicate").is_err());
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(OpTag::Sub.to_string(), "sub");
        assert_eq!(OpTag::Eq.to_string(), "eq");
        assert_eq!(OpTag::Find.to_string(), "instr");
        assert_eq!(OpTag::RegExp.to_string(), "regex");
        assert_eq!(OpTag::BasicIndexOf.to_string(), "basic.indexOf");
    }
}
