//! Per-operator SQLite emitters, registered in the `sqlite` [Language].
//!
//! Every emitter returns typed fragments (see [super::fragment]) and builds
//! its text through the [super::build] helpers. The four-valued null model
//! shows up in two places: string slots treat `''` as SQL `NULL`, and
//! arithmetic wraps itself in `CASE WHEN <missing> THEN NULL ELSE … END`
//! unless the parent passed `not_null`.

use anyhow::{anyhow, Result};

use crate::ast::{BinaryOperator, Expr, ExprKind, InequalityOperator, MultiOperator, OpTag};
use crate::error::{Error, Reason};
use crate::path::relative_field;
use crate::translate::Language;
use crate::value::Value;

use super::build::{
    case_when, cast, infix, isolate, join_sql, number_text, quote_identifier, quote_string,
    quote_value, sql_call, sql_iso, Sql,
};
use super::fragment::{merged_nested_path, FragmentList, Slot, SlotMap, SqlFragment};
use super::{to_sql, Context, Hints, SqlEmitter};

pub(super) fn language() -> Language<SqlEmitter> {
    use OpTag::*;
    Language::base("sqlite").register([
        (Variable, emit_variable as SqlEmitter),
        (Literal, emit_literal as SqlEmitter),
        (Date, emit_date as SqlEmitter),
        (Tuple, emit_tuple as SqlEmitter),
        (Leaves, emit_leaves as SqlEmitter),
        (Coalesce, emit_coalesce as SqlEmitter),
        (Sub, emit_binary as SqlEmitter),
        (Exp, emit_binary as SqlEmitter),
        (Mod, emit_binary as SqlEmitter),
        (Mul, emit_mul as SqlEmitter),
        (Div, emit_div as SqlEmitter),
        (Add, emit_multi as SqlEmitter),
        (Sum, emit_multi as SqlEmitter),
        (Floor, emit_floor as SqlEmitter),
        (Abs, emit_abs as SqlEmitter),
        (Number, emit_number as SqlEmitter),
        (Unix, emit_number as SqlEmitter),
        (FromUnix, emit_number as SqlEmitter),
        (Eq, emit_eq as SqlEmitter),
        (Ne, emit_ne as SqlEmitter),
        (Gt, emit_inequality as SqlEmitter),
        (Gte, emit_inequality as SqlEmitter),
        (Lt, emit_inequality as SqlEmitter),
        (Lte, emit_inequality as SqlEmitter),
        (In, emit_in as SqlEmitter),
        (And, emit_and as SqlEmitter),
        (Or, emit_or as SqlEmitter),
        (Not, emit_not as SqlEmitter),
        (Missing, emit_missing as SqlEmitter),
        (Exists, emit_exists as SqlEmitter),
        (Length, emit_length as SqlEmitter),
        (String, emit_string as SqlEmitter),
        (Prefix, emit_prefix as SqlEmitter),
        (Suffix, emit_suffix as SqlEmitter),
        (Concat, emit_concat as SqlEmitter),
        (Left, emit_left as SqlEmitter),
        (Right, emit_right as SqlEmitter),
        (NotLeft, emit_not_left as SqlEmitter),
        (NotRight, emit_not_right as SqlEmitter),
        (Find, emit_find as SqlEmitter),
        (Between, emit_between as SqlEmitter),
        (RegExp, emit_regexp as SqlEmitter),
        (BasicIndexOf, emit_basic_index_of as SqlEmitter),
        (BasicStartsWith, emit_basic_starts_with as SqlEmitter),
        (BasicSubstring, emit_basic_substring as SqlEmitter),
        (BasicEq, emit_basic_eq as SqlEmitter),
        (SqlInstr, emit_sql_instr as SqlEmitter),
        (SqlSubstr, emit_sql_substr as SqlEmitter),
        (When, emit_when as SqlEmitter),
        (Case, emit_case as SqlEmitter),
        (Count, emit_count as SqlEmitter),
        (Max, emit_max as SqlEmitter),
        (Min, emit_min as SqlEmitter),
        // `offset`, `rows`, `get`, `script` and `split` have no SQL form;
        // unregistered operators surface as Unsupported.
    ])
}

// --- slot coercion -------------------------------------------------------

fn null_sql() -> Sql {
    Sql::atom("NULL")
}

fn invariant(detail: String, expr: &Expr) -> anyhow::Error {
    anyhow!(Error::new(Reason::Invariant { detail }).with_cause(expr.to_json()))
}

/// Emit `expr` expecting a single fragment (a scalar, not an object).
fn emit_single(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<SqlFragment> {
    let mut fragments = to_sql(expr, ctx, hints)?;
    if fragments.len() != 1 {
        return Err(invariant(
            format!("`{}` spans multiple columns", expr.op_tag()),
            expr,
        ));
    }
    Ok(fragments.pop().expect("one fragment"))
}

/// The boolean form of a fragment: the `b` slot, or truthiness-as-existence
/// for the other slots.
fn bool_of(fragment: &SqlFragment) -> Sql {
    if let Some(b) = fragment.slot(Slot::B) {
        return b.clone();
    }
    let pieces: Vec<Sql> = fragment
        .sql
        .iter()
        .filter_map(|(slot, sql)| match slot {
            Slot::B => None,
            Slot::Zero => None,
            Slot::S => Some(sql_iso(&join_sql(
                " AND ",
                &[
                    infix(sql, "IS NOT", &null_sql()),
                    infix(sql, "<>", &quote_string("")),
                ],
            ))),
            _ => Some(infix(sql, "IS NOT", &null_sql())),
        })
        .collect();
    or_join(pieces)
}

fn num_of(fragment: &SqlFragment) -> Sql {
    if let Some(n) = fragment.slot(Slot::N) {
        n.clone()
    } else if let Some(s) = fragment.slot(Slot::S) {
        cast(s, "REAL")
    } else if let Some(b) = fragment.slot(Slot::B) {
        b.clone()
    } else {
        null_sql()
    }
}

fn str_of(fragment: &SqlFragment) -> Sql {
    if let Some(s) = fragment.slot(Slot::S) {
        s.clone()
    } else if let Some(n) = fragment.slot(Slot::N) {
        cast(n, "TEXT")
    } else if let Some(b) = fragment.slot(Slot::B) {
        case_when(b, &quote_string("true"), Some(&quote_string("false")))
    } else {
        null_sql()
    }
}

fn and_join(pieces: Vec<Sql>) -> Sql {
    match pieces.len() {
        0 => Sql::atom("1"),
        1 => pieces.into_iter().next().expect("one piece"),
        _ => join_sql(" AND ", &pieces.iter().map(isolate).collect::<Vec<_>>()),
    }
}

fn or_join(pieces: Vec<Sql>) -> Sql {
    match pieces.len() {
        0 => Sql::atom("0"),
        1 => pieces.into_iter().next().expect("one piece"),
        _ => join_sql(" OR ", &pieces.iter().map(isolate).collect::<Vec<_>>()),
    }
}

fn scalar_fragment(slot: Slot, sql: Sql, children: &[&SqlFragment]) -> Result<FragmentList> {
    Ok(vec![SqlFragment {
        name: ".".to_string(),
        sql: SlotMap::from([(slot, sql)]),
        nested_path: merged_nested_path(children)?,
    }])
}

/// `CASE WHEN <missing> THEN NULL ELSE inner END`, skipped when the parent
/// proved the operands present or the expression cannot be missing.
fn null_guard(expr: &Expr, ctx: &Context<'_>, hints: Hints, inner: Sql) -> Result<Sql> {
    if hints.not_null {
        return Ok(inner);
    }
    let missing = expr.missing().partial_eval()?;
    if missing.is_false() {
        return Ok(inner);
    }
    let fragment = emit_single(
        &missing,
        ctx,
        Hints {
            boolean: true,
            not_null: false,
        },
    )?;
    Ok(case_when(&bool_of(&fragment), &null_sql(), Some(&inner)))
}

// --- atoms ---------------------------------------------------------------

fn emit_variable(expr: &Expr, ctx: &Context<'_>, _hints: Hints) -> Result<FragmentList> {
    let ExprKind::Variable(name) = &expr.kind else {
        unreachable!("registered for variable")
    };
    let columns: Vec<_> = ctx
        .schema
        .columns(name)
        .into_iter()
        .filter(|c| {
            !matches!(
                c.ctype,
                crate::schema::ColumnType::Object | crate::schema::ColumnType::Nested
            )
        })
        .collect();
    if !columns.is_empty() {
        // one fragment per nested path, one slot per physical type
        let mut fragments: FragmentList = Vec::new();
        for column in columns {
            let slot = Slot::of_column(column.ctype);
            let sql = quote_identifier(&column.es_column);
            match fragments
                .iter_mut()
                .find(|f| f.nested_path == column.nested_path)
            {
                Some(fragment) => {
                    fragment.sql.insert(slot, sql);
                }
                None => fragments.push(SqlFragment {
                    name: ".".to_string(),
                    sql: SlotMap::from([(slot, sql)]),
                    nested_path: column.nested_path.clone(),
                }),
            }
        }
        return Ok(fragments);
    }
    // a variable over an object is the union of its descendant leaves
    emit_leaf_fragments(expr, ctx, name)
}

fn emit_leaf_fragments(expr: &Expr, ctx: &Context<'_>, prefix: &str) -> Result<FragmentList> {
    let leaves = ctx.schema.leaves(prefix);
    if leaves.is_empty() {
        return Err(anyhow!(Error::new(Reason::ColumnNotFound {
            path: prefix.to_string(),
        })
        .with_cause(expr.to_json())));
    }
    let mut fragments: FragmentList = Vec::new();
    for column in leaves {
        let name = relative_field(&ctx.schema.get_column_name(column), prefix);
        let slot = Slot::of_column(column.ctype);
        let sql = quote_identifier(&column.es_column);
        match fragments
            .iter_mut()
            .find(|f| f.name == name && f.nested_path == column.nested_path)
        {
            Some(fragment) => {
                fragment.sql.insert(slot, sql);
            }
            None => fragments.push(SqlFragment {
                name,
                sql: SlotMap::from([(slot, sql)]),
                nested_path: column.nested_path.clone(),
            }),
        }
    }
    Ok(fragments)
}

fn emit_leaves(expr: &Expr, ctx: &Context<'_>, _hints: Hints) -> Result<FragmentList> {
    let ExprKind::Leaves(term) = &expr.kind else {
        unreachable!("registered for leaves")
    };
    match &term.kind {
        ExprKind::Variable(name) => emit_leaf_fragments(expr, ctx, name),
        _ => Err(anyhow!(Error::new(Reason::Unsupported {
            op: "leaves of a computed term".to_string(),
            language: ctx.lang.name.to_string(),
        })
        .with_cause(expr.to_json()))),
    }
}

fn emit_literal(expr: &Expr, _ctx: &Context<'_>, _hints: Hints) -> Result<FragmentList> {
    let ExprKind::Literal(value) = &expr.kind else {
        unreachable!("registered for literal")
    };
    Ok(vec![SqlFragment::scalar(
        Slot::of_value(value),
        quote_value(value),
    )])
}

fn emit_date(expr: &Expr, _ctx: &Context<'_>, _hints: Hints) -> Result<FragmentList> {
    let ExprKind::Date(seconds) = &expr.kind else {
        unreachable!("registered for date")
    };
    Ok(vec![SqlFragment::scalar(
        Slot::N,
        Sql::atom(number_text(*seconds)),
    )])
}

fn emit_tuple(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Tuple(terms) = &expr.kind else {
        unreachable!("registered for tuple")
    };
    let mut fragments = Vec::new();
    for (i, term) in terms.iter().enumerate() {
        for fragment in to_sql(term, ctx, hints)? {
            let name = if fragment.name == "." {
                i.to_string()
            } else {
                format!("{i}.{}", fragment.name)
            };
            fragments.push(SqlFragment { name, ..fragment });
        }
    }
    Ok(fragments)
}

// --- boolean -------------------------------------------------------------

fn emit_and(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::And(terms) = &expr.kind else {
        unreachable!("registered for and")
    };
    let mut fragments = Vec::new();
    let mut pieces = Vec::new();
    for term in terms {
        let fragment = emit_single(term, ctx, Hints { boolean: true, not_null: hints.not_null })?;
        pieces.push(bool_of(&fragment));
        fragments.push(fragment);
    }
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    scalar_fragment(Slot::B, and_join(pieces), &children)
}

fn emit_or(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Or(terms) = &expr.kind else {
        unreachable!("registered for or")
    };
    let mut fragments = Vec::new();
    let mut pieces = Vec::new();
    for term in terms {
        let fragment = emit_single(term, ctx, Hints { boolean: true, not_null: hints.not_null })?;
        pieces.push(bool_of(&fragment));
        fragments.push(fragment);
    }
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    scalar_fragment(Slot::B, or_join(pieces), &children)
}

fn emit_not(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Not(term) = &expr.kind else {
        unreachable!("registered for not")
    };
    let fragment = emit_single(term, ctx, Hints { boolean: true, not_null: hints.not_null })?;
    let sql = Sql::raw(format!("NOT {}", isolate(&bool_of(&fragment))));
    scalar_fragment(Slot::B, sql, &[&fragment])
}

/// One always-false/always-missing test per slot, ANDed together.
fn missing_pieces(fragment: &SqlFragment) -> Vec<Sql> {
    fragment
        .sql
        .iter()
        .map(|(slot, sql)| match slot {
            Slot::S => sql_iso(&join_sql(
                " OR ",
                &[infix(sql, "IS", &null_sql()), infix(sql, "=", &quote_string(""))],
            )),
            Slot::Zero => Sql::atom("1"),
            _ => infix(sql, "IS", &null_sql()),
        })
        .collect()
}

fn emit_missing(expr: &Expr, ctx: &Context<'_>, _hints: Hints) -> Result<FragmentList> {
    let ExprKind::Missing(term) = &expr.kind else {
        unreachable!("registered for missing")
    };
    let fragments = to_sql(term, ctx, Hints::default())?;
    let pieces: Vec<Sql> = fragments.iter().flat_map(missing_pieces).collect();
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    scalar_fragment(Slot::B, and_join(pieces), &children)
}

fn emit_exists(expr: &Expr, ctx: &Context<'_>, _hints: Hints) -> Result<FragmentList> {
    let ExprKind::Exists(term) = &expr.kind else {
        unreachable!("registered for exists")
    };
    let fragments = to_sql(term, ctx, Hints::default())?;
    let pieces: Vec<Sql> = fragments
        .iter()
        .flat_map(|fragment| {
            fragment.sql.iter().map(|(slot, sql)| match slot {
                Slot::S => sql_iso(&join_sql(
                    " AND ",
                    &[
                        infix(sql, "IS NOT", &null_sql()),
                        infix(sql, "<>", &quote_string("")),
                    ],
                )),
                Slot::Zero => Sql::atom("0"),
                _ => infix(sql, "IS NOT", &null_sql()),
            })
        })
        .collect();
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    scalar_fragment(Slot::B, or_join(pieces), &children)
}

// --- comparison ----------------------------------------------------------

fn emit_eq(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Eq { left, right } = &expr.kind else {
        unreachable!("registered for eq")
    };
    let lf = emit_single(left, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let rf = emit_single(right, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let mut pieces = Vec::new();
    for (slot, l) in &lf.sql {
        let Some(r) = rf.slot(*slot) else { continue };
        let piece = match slot {
            // both statically absent: equal
            Slot::Zero => Sql::atom("1"),
            Slot::S if !hints.not_null => infix(
                &sql_call("NULLIF", &[l.clone(), quote_string("")]),
                "IS",
                &sql_call("NULLIF", &[r.clone(), quote_string("")]),
            ),
            _ if hints.not_null => infix(l, "=", r),
            // IS makes missing equal to missing, per the four-valued model
            _ => infix(l, "IS", r),
        };
        pieces.push(piece);
    }
    scalar_fragment(Slot::B, or_join(pieces), &[&lf, &rf])
}

fn emit_ne(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Ne { left, right } = &expr.kind else {
        unreachable!("registered for ne")
    };
    let lf = emit_single(left, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let rf = emit_single(right, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let mut pieces = Vec::new();
    for (slot, l) in &lf.sql {
        let Some(r) = rf.slot(*slot) else { continue };
        let piece = match slot {
            Slot::Zero => Sql::atom("NULL"),
            Slot::S if !hints.not_null => infix(
                &sql_call("NULLIF", &[l.clone(), quote_string("")]),
                "<>",
                &sql_call("NULLIF", &[r.clone(), quote_string("")]),
            ),
            _ => infix(l, "<>", r),
        };
        pieces.push(piece);
    }
    // values in disjoint slots are simply different
    let sql = if pieces.is_empty() {
        Sql::atom("1")
    } else {
        and_join(pieces)
    };
    scalar_fragment(Slot::B, sql, &[&lf, &rf])
}

fn exists_piece(slot: Slot, sql: &Sql) -> Sql {
    match slot {
        Slot::S => sql_iso(&join_sql(
            " AND ",
            &[
                infix(sql, "IS NOT", &null_sql()),
                infix(sql, "<>", &quote_string("")),
            ],
        )),
        _ => infix(sql, "IS NOT", &null_sql()),
    }
}

fn emit_inequality(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Inequality { op, left, right } = &expr.kind else {
        unreachable!("registered for inequality")
    };
    let lf = emit_single(left, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let rf = emit_single(right, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let mut pieces = Vec::new();
    for (slot, l) in &lf.sql {
        let Some(r) = rf.slot(*slot) else { continue };
        let piece = match slot {
            Slot::Zero => continue,
            Slot::S if !hints.not_null => infix(
                &sql_call("NULLIF", &[l.clone(), quote_string("")]),
                op.sql(),
                &sql_call("NULLIF", &[r.clone(), quote_string("")]),
            ),
            _ => infix(l, op.sql(), r),
        };
        pieces.push(piece);
    }
    // across slots only the strict order b < n < s is defined
    if op.is_strict() {
        for (ls, l) in &lf.sql {
            for (rs, r) in &rf.sql {
                if ls == rs {
                    continue;
                }
                let (Some(lr), Some(rr)) = (ls.rank(), rs.rank()) else {
                    continue;
                };
                let holds = match op {
                    InequalityOperator::Lt => lr < rr,
                    InequalityOperator::Gt => lr > rr,
                    _ => false,
                };
                if holds {
                    pieces.push(sql_iso(&join_sql(
                        " AND ",
                        &[exists_piece(*ls, l), exists_piece(*rs, r)],
                    )));
                }
            }
        }
    }
    scalar_fragment(Slot::B, or_join(pieces), &[&lf, &rf])
}

fn emit_in(expr: &Expr, ctx: &Context<'_>, _hints: Hints) -> Result<FragmentList> {
    let ExprKind::In { value, superset } = &expr.kind else {
        unreachable!("registered for in")
    };
    let items = match superset.literal_value() {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(anyhow!(Error::new(Reason::Unsupported {
                op: "in over a computed superset".to_string(),
                language: ctx.lang.name.to_string(),
            })
            .with_cause(expr.to_json())))
        }
    };
    let vf = emit_single(value, ctx, Hints::default())?;
    // group the allowed values by slot
    let mut pieces = Vec::new();
    for slot in [Slot::B, Slot::N, Slot::S] {
        let members: Vec<String> = items
            .iter()
            .filter(|item| Slot::of_value(item) == slot)
            .map(|item| quote_value(item).as_str().to_string())
            .collect();
        if members.is_empty() {
            continue;
        }
        let Some(lhs) = vf.slot(slot) else { continue };
        let lhs = match slot {
            Slot::S => sql_call("NULLIF", &[lhs.clone(), quote_string("")]),
            _ => lhs.clone(),
        };
        pieces.push(infix(
            &lhs,
            "IN",
            &Sql::atom(format!("({})", members.join(", "))),
        ));
    }
    scalar_fragment(Slot::B, or_join(pieces), &[&vf])
}

// --- arithmetic ----------------------------------------------------------

fn emit_binary(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Binary { op, left, right } = &expr.kind else {
        unreachable!("registered for binary arithmetic")
    };
    let lf = emit_single(left, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let rf = emit_single(right, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let (l, r) = (num_of(&lf), num_of(&rf));
    let inner = binary_sql(*op, &l, &r);
    let sql = null_guard(expr, ctx, hints, inner)?;
    scalar_fragment(Slot::N, sql, &[&lf, &rf])
}

fn binary_sql(op: BinaryOperator, l: &Sql, r: &Sql) -> Sql {
    match op {
        BinaryOperator::Sub => infix(l, "-", r),
        BinaryOperator::Mul => infix(l, "*", r),
        BinaryOperator::Mod => infix(l, "%", r),
        BinaryOperator::Div => infix(&cast(l, "REAL"), "/", r),
        BinaryOperator::Exp => sql_call("POWER", &[l.clone(), r.clone()]),
    }
}

/// `mul` is dispatched here for both its binary and variadic forms.
fn emit_mul(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    match &expr.kind {
        ExprKind::Binary { .. } => emit_binary(expr, ctx, hints),
        _ => emit_multi(expr, ctx, hints),
    }
}

/// `div` is dispatched here for both the binary operator and the
/// default-carrying form.
fn emit_div(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    if let ExprKind::Binary { .. } = &expr.kind {
        return emit_binary(expr, ctx, hints);
    }
    let ExprKind::Div { numer, denom, default } = &expr.kind else {
        unreachable!("registered for div")
    };
    let nf = emit_single(numer, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let df = emit_single(denom, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    // division by zero yields NULL, which is exactly the missing semantics
    let inner = infix(&cast(&num_of(&nf), "REAL"), "/", &num_of(&df));
    if default.is_null_literal() {
        return scalar_fragment(Slot::N, inner, &[&nf, &df]);
    }
    let fallback = emit_single(default, ctx, Hints::default())?;
    let sql = sql_call("COALESCE", &[inner, num_of(&fallback)]);
    scalar_fragment(Slot::N, sql, &[&nf, &df, &fallback])
}

fn emit_multi(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Multi { op, terms, nulls, default } = &expr.kind else {
        unreachable!("registered for multi arithmetic")
    };
    let operator = match op {
        MultiOperator::Add => " + ",
        MultiOperator::Mul => " * ",
    };
    let mut fragments = Vec::new();
    let mut parts = Vec::new();
    for term in terms {
        let fragment = emit_single(term, ctx, Hints { not_null: hints.not_null, boolean: false })?;
        let n = num_of(&fragment);
        parts.push(if *nulls {
            sql_call("COALESCE", &[n, Sql::atom(number_text(op.identity()))])
        } else {
            isolate(&n)
        });
        fragments.push(fragment);
    }
    let inner = join_sql(operator, &parts);
    let mut sql = null_guard(expr, ctx, hints, inner)?;
    if !default.is_null_literal() {
        let fallback = emit_single(default, ctx, Hints::default())?;
        sql = sql_call("COALESCE", &[sql, num_of(&fallback)]);
        fragments.push(fallback);
    }
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    scalar_fragment(Slot::N, sql, &children)
}

fn emit_floor(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Floor { term, modulo } = &expr.kind else {
        unreachable!("registered for floor")
    };
    let tf = emit_single(term, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let mf = emit_single(modulo, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let (v, m) = (num_of(&tf), num_of(&mf));
    // v - ((v % m + m) % m): a floor that stays correct for negative v
    let rem = infix(&infix(&infix(&v, "%", &m), "+", &m), "%", &m);
    let inner = infix(&v, "-", &rem);
    let sql = null_guard(expr, ctx, hints, inner)?;
    scalar_fragment(Slot::N, sql, &[&tf, &mf])
}

fn emit_abs(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Abs(term) = &expr.kind else {
        unreachable!("registered for abs")
    };
    let fragment = emit_single(term, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let sql = sql_call("ABS", &[num_of(&fragment)]);
    scalar_fragment(Slot::N, sql, &[&fragment])
}

/// `number`, `unix` and `from_unix` all force the numeric slot; dates are
/// already carried as Unix seconds.
fn emit_number(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let term = expr.children().into_iter().next().expect("one child");
    let fragment = emit_single(term, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let sql = null_guard(expr, ctx, hints, num_of(&fragment))?;
    scalar_fragment(Slot::N, sql, &[&fragment])
}

// --- strings -------------------------------------------------------------

fn emit_length(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Length(term) = &expr.kind else {
        unreachable!("registered for length")
    };
    let fragment = emit_single(term, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let s = str_of(&fragment);
    let sql = if hints.not_null {
        sql_call("LENGTH", &[s])
    } else {
        // the empty string is missing, so its length is NULL, not 0
        sql_call("LENGTH", &[sql_call("NULLIF", &[s, quote_string("")])])
    };
    scalar_fragment(Slot::N, sql, &[&fragment])
}

fn emit_string(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::String(term) = &expr.kind else {
        unreachable!("registered for string")
    };
    let fragment = emit_single(term, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let sql = str_of(&fragment);
    scalar_fragment(Slot::S, sql, &[&fragment])
}

fn emit_prefix(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Prefix { value, prefix } = &expr.kind else {
        unreachable!("registered for prefix")
    };
    let vf = emit_single(value, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let pf = emit_single(prefix, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let sql = infix(
        &sql_call("INSTR", &[str_of(&vf), str_of(&pf)]),
        "=",
        &Sql::atom("1"),
    );
    scalar_fragment(Slot::B, sql, &[&vf, &pf])
}

fn emit_suffix(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Suffix { value, suffix } = &expr.kind else {
        unreachable!("registered for suffix")
    };
    let vf = emit_single(value, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let sf = emit_single(suffix, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let (v, s) = (str_of(&vf), str_of(&sf));
    let tail = sql_call(
        "SUBSTR",
        &[v, Sql::atom(format!("-{}", sql_call("LENGTH", &[s.clone()])))],
    );
    let sql = infix(&tail, "=", &s);
    scalar_fragment(Slot::B, sql, &[&vf, &sf])
}

fn slice_operands(
    expr: &Expr,
    ctx: &Context<'_>,
    hints: Hints,
) -> Result<(SqlFragment, SqlFragment, Sql, Sql)> {
    let children = expr.children();
    let vf = emit_single(children[0], ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let nf = emit_single(children[1], ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let v = str_of(&vf);
    // negative lengths behave as zero
    let n = sql_call("MAX", &[Sql::atom("0"), num_of(&nf)]);
    Ok((vf, nf, v, n))
}

fn emit_left(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let (vf, nf, v, n) = slice_operands(expr, ctx, hints)?;
    let sql = sql_call("SUBSTR", &[v, Sql::atom("1"), n]);
    scalar_fragment(Slot::S, sql, &[&vf, &nf])
}

fn emit_right(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let (vf, nf, v, n) = slice_operands(expr, ctx, hints)?;
    let kept = sql_call(
        "MAX",
        &[
            Sql::atom("0"),
            infix(&sql_call("LENGTH", &[v.clone()]), "-", &n),
        ],
    );
    let start = infix(&kept, "+", &Sql::atom("1"));
    let sql = sql_call("SUBSTR", &[v, start]);
    scalar_fragment(Slot::S, sql, &[&vf, &nf])
}

fn emit_not_left(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let (vf, nf, v, n) = slice_operands(expr, ctx, hints)?;
    let start = infix(&n, "+", &Sql::atom("1"));
    let sql = sql_call("SUBSTR", &[v, start]);
    scalar_fragment(Slot::S, sql, &[&vf, &nf])
}

fn emit_not_right(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let (vf, nf, v, n) = slice_operands(expr, ctx, hints)?;
    let kept = sql_call(
        "MAX",
        &[
            Sql::atom("0"),
            infix(&sql_call("LENGTH", &[v.clone()]), "-", &n),
        ],
    );
    let sql = sql_call("SUBSTR", &[v, Sql::atom("1"), kept]);
    scalar_fragment(Slot::S, sql, &[&vf, &nf])
}

fn emit_find(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Find { value, find, start, default } = &expr.kind else {
        unreachable!("registered for find")
    };
    let vf = emit_single(value, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let ff = emit_single(find, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let (v, f) = (str_of(&vf), str_of(&ff));
    let mut fragments = vec![vf, ff];
    let base = if matches!(start.literal_value(), Some(Value::Integer(0))) {
        // 1-based INSTR, 0 when absent: NULLIF turns absent into NULL
        infix(
            &sql_call("NULLIF", &[sql_call("INSTR", &[v, f]), Sql::atom("0")]),
            "-",
            &Sql::atom("1"),
        )
    } else {
        let sf = emit_single(start, ctx, Hints { not_null: hints.not_null, boolean: false })?;
        let s = num_of(&sf);
        fragments.push(sf);
        let shifted = sql_call("SUBSTR", &[v, infix(&s, "+", &Sql::atom("1"))]);
        let found = sql_call("INSTR", &[shifted, f]);
        case_when(
            &infix(&found, "=", &Sql::atom("0")),
            &null_sql(),
            Some(&infix(&infix(&found, "+", &s), "-", &Sql::atom("1"))),
        )
    };
    let sql = if default.is_null_literal() {
        base
    } else {
        let fallback = emit_single(default, ctx, Hints::default())?;
        let sql = sql_call("COALESCE", &[base, num_of(&fallback)]);
        fragments.push(fallback);
        sql
    };
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    scalar_fragment(Slot::N, sql, &children)
}

fn emit_between(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Between { value, prefix, suffix, start, default } = &expr.kind else {
        unreachable!("registered for between")
    };
    if !matches!(start.literal_value(), Some(Value::Integer(0) | Value::Null)) {
        return Err(anyhow!(Error::new(Reason::Unsupported {
            op: "between with a start clause".to_string(),
            language: ctx.lang.name.to_string(),
        })
        .with_cause(expr.to_json())));
    }
    let vf = emit_single(value, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let pf = emit_single(prefix, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let sf = emit_single(suffix, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let (v, p, s) = (str_of(&vf), str_of(&pf), str_of(&sf));
    let found_prefix = sql_call("INSTR", &[v.clone(), p.clone()]);
    let content = infix(
        &found_prefix,
        "+",
        &sql_call("LENGTH", &[p.clone()]),
    );
    let tail = sql_call("SUBSTR", &[v.clone(), content.clone()]);
    let found_suffix = sql_call("INSTR", &[tail, s.clone()]);
    let absent = join_sql(
        " OR ",
        &[
            infix(&found_prefix, "=", &Sql::atom("0")),
            infix(&found_suffix, "=", &Sql::atom("0")),
        ],
    );
    let taken = sql_call(
        "SUBSTR",
        &[
            v,
            content,
            infix(&found_suffix, "-", &Sql::atom("1")),
        ],
    );
    let base = case_when(&absent, &null_sql(), Some(&taken));
    let mut fragments = vec![vf, pf, sf];
    let sql = if default.is_null_literal() {
        base
    } else {
        let fallback = emit_single(default, ctx, Hints::default())?;
        let sql = sql_call("COALESCE", &[base, str_of(&fallback)]);
        fragments.push(fallback);
        sql
    };
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    scalar_fragment(Slot::S, sql, &children)
}

fn emit_concat(expr: &Expr, ctx: &Context<'_>, _hints: Hints) -> Result<FragmentList> {
    let ExprKind::Concat { terms, separator, default } = &expr.kind else {
        unreachable!("registered for concat")
    };
    let separator_text = separator
        .literal_value()
        .and_then(crate::simplify::literals::value_to_string);
    let (sep, skip) = match &separator_text {
        Some(text) => (
            quote_string(text),
            Sql::atom((text.chars().count() + 1).to_string()),
        ),
        None if separator.is_null_literal() => (quote_string(""), Sql::atom("1")),
        None => {
            let sf = emit_single(separator, ctx, Hints::default())?;
            let s = str_of(&sf);
            (
                s.clone(),
                infix(&sql_call("LENGTH", &[s]), "+", &Sql::atom("1")),
            )
        }
    };
    let mut fragments = Vec::new();
    let mut pieces = Vec::new();
    for term in terms {
        if term.is_null_literal() {
            continue;
        }
        let fragment = emit_single(term, ctx, Hints::default())?;
        let t = str_of(&fragment);
        let glued = infix(&sep, "||", &t);
        let missing = term.missing().partial_eval()?;
        let piece = if missing.is_false() {
            isolate(&glued)
        } else {
            let mf = emit_single(&missing, ctx, Hints { boolean: true, not_null: false })?;
            let cond = bool_of(&mf);
            case_when(&cond, &quote_string(""), Some(&glued))
        };
        pieces.push(piece);
        fragments.push(fragment);
    }
    if pieces.is_empty() {
        let sql = if default.is_null_literal() {
            null_sql()
        } else {
            str_of(&emit_single(default, ctx, Hints::default())?)
        };
        return Ok(vec![SqlFragment::scalar(Slot::S, sql)]);
    }
    let joined = join_sql(" || ", &pieces);
    let trimmed = sql_call("SUBSTR", &[joined, skip]);
    let base = sql_call("NULLIF", &[trimmed, quote_string("")]);
    let sql = if default.is_null_literal() {
        base
    } else {
        let fallback = emit_single(default, ctx, Hints::default())?;
        let sql = sql_call("COALESCE", &[base, str_of(&fallback)]);
        fragments.push(fallback);
        sql
    };
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    scalar_fragment(Slot::S, sql, &children)
}

fn emit_regexp(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::RegExp { value, pattern } = &expr.kind else {
        unreachable!("registered for regex")
    };
    let vf = emit_single(value, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let sql = infix(&str_of(&vf), "REGEXP", &quote_string(pattern));
    scalar_fragment(Slot::B, sql, &[&vf])
}

// --- basic/sql primitives ------------------------------------------------

fn emit_basic_index_of(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::BasicIndexOf { value, find, start } = &expr.kind else {
        unreachable!("registered for basic.indexOf")
    };
    let vf = emit_single(value, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let ff = emit_single(find, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let (v, f) = (str_of(&vf), str_of(&ff));
    let mut fragments = vec![vf, ff];
    let sql = if matches!(start.literal_value(), Some(Value::Integer(0))) {
        infix(&sql_call("INSTR", &[v, f]), "-", &Sql::atom("1"))
    } else {
        let sf = emit_single(start, ctx, Hints { not_null: hints.not_null, boolean: false })?;
        let s = num_of(&sf);
        fragments.push(sf);
        let shifted = sql_call("SUBSTR", &[v, infix(&s, "+", &Sql::atom("1"))]);
        let found = sql_call("INSTR", &[shifted, f]);
        case_when(
            &infix(&found, "=", &Sql::atom("0")),
            &Sql::atom("-1"),
            Some(&infix(&infix(&found, "+", &s), "-", &Sql::atom("1"))),
        )
    };
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    scalar_fragment(Slot::N, sql, &children)
}

fn emit_basic_starts_with(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::BasicStartsWith { value, prefix } = &expr.kind else {
        unreachable!("registered for basic.startsWith")
    };
    let vf = emit_single(value, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let pf = emit_single(prefix, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let sql = infix(
        &sql_call("INSTR", &[str_of(&vf), str_of(&pf)]),
        "=",
        &Sql::atom("1"),
    );
    scalar_fragment(Slot::B, sql, &[&vf, &pf])
}

fn emit_basic_substring(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::BasicSubstring { value, start, end } = &expr.kind else {
        unreachable!("registered for basic.substring")
    };
    let vf = emit_single(value, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let sf = emit_single(start, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let ef = emit_single(end, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let (s, e) = (num_of(&sf), num_of(&ef));
    let sql = sql_call(
        "SUBSTR",
        &[
            str_of(&vf),
            infix(&s, "+", &Sql::atom("1")),
            infix(&e, "-", &s),
        ],
    );
    scalar_fragment(Slot::S, sql, &[&vf, &sf, &ef])
}

fn emit_basic_eq(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::BasicEq { left, right } = &expr.kind else {
        unreachable!("registered for basic.eq")
    };
    let lf = emit_single(left, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let rf = emit_single(right, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let mut pieces = Vec::new();
    for (slot, l) in &lf.sql {
        if let Some(r) = rf.slot(*slot) {
            pieces.push(infix(l, "IS", r));
        }
    }
    scalar_fragment(Slot::B, or_join(pieces), &[&lf, &rf])
}

fn emit_sql_instr(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::SqlInstr { value, find } = &expr.kind else {
        unreachable!("registered for sql.instr")
    };
    let vf = emit_single(value, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let ff = emit_single(find, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let sql = sql_call("INSTR", &[str_of(&vf), str_of(&ff)]);
    scalar_fragment(Slot::N, sql, &[&vf, &ff])
}

fn emit_sql_substr(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::SqlSubstr { value, start, length } = &expr.kind else {
        unreachable!("registered for sql.substr")
    };
    let vf = emit_single(value, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let sf = emit_single(start, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let mut fragments = vec![vf, sf];
    let sql = if length.is_null_literal() {
        sql_call("SUBSTR", &[str_of(&fragments[0]), num_of(&fragments[1])])
    } else {
        let lf = emit_single(length, ctx, Hints { not_null: hints.not_null, boolean: false })?;
        let sql = sql_call(
            "SUBSTR",
            &[str_of(&fragments[0]), num_of(&fragments[1]), num_of(&lf)],
        );
        fragments.push(lf);
        sql
    };
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    scalar_fragment(Slot::S, sql, &children)
}

// --- conditionals --------------------------------------------------------

fn branch_slots(fragments: &[&SqlFragment]) -> Vec<Slot> {
    let mut slots: Vec<Slot> = Vec::new();
    for fragment in fragments {
        for slot in fragment.sql.keys() {
            if *slot != Slot::Zero && !slots.contains(slot) {
                slots.push(*slot);
            }
        }
    }
    slots.sort();
    slots
}

fn emit_when(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::When { cond, then, els } = &expr.kind else {
        unreachable!("registered for when")
    };
    let cf = emit_single(cond, ctx, Hints { boolean: true, not_null: hints.not_null })?;
    let condition = bool_of(&cf);
    let tf = emit_single(then, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let ef = emit_single(els, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let slots = branch_slots(&[&tf, &ef]);
    if slots.is_empty() {
        return scalar_fragment(Slot::Zero, null_sql(), &[&cf, &tf, &ef]);
    }
    let mut sql = SlotMap::new();
    for slot in slots {
        let then_sql = tf.slot(slot).cloned().unwrap_or_else(null_sql);
        let else_sql = ef.slot(slot).cloned();
        let piece = match else_sql {
            Some(e) => case_when(&condition, &then_sql, Some(&e)),
            None => case_when(&condition, &then_sql, None),
        };
        sql.insert(slot, piece);
    }
    Ok(vec![SqlFragment {
        name: ".".to_string(),
        sql,
        nested_path: merged_nested_path(&[&cf, &tf, &ef])?,
    }])
}

fn emit_case(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Case { whens, default } = &expr.kind else {
        unreachable!("registered for case")
    };
    let mut conditions = Vec::new();
    let mut branches = Vec::new();
    let mut fragments = Vec::new();
    for when in whens {
        let (cond, then, _) = when.kind.as_when().expect("case holds when clauses");
        let cf = emit_single(cond, ctx, Hints { boolean: true, not_null: hints.not_null })?;
        conditions.push(bool_of(&cf));
        let tf = emit_single(then, ctx, Hints { not_null: hints.not_null, boolean: false })?;
        fragments.push(cf);
        branches.push(tf);
    }
    let df = emit_single(default, ctx, Hints { not_null: hints.not_null, boolean: false })?;
    let mut branch_refs: Vec<&SqlFragment> = branches.iter().collect();
    branch_refs.push(&df);
    let slots = branch_slots(&branch_refs);
    if slots.is_empty() {
        let mut children: Vec<&SqlFragment> = fragments.iter().collect();
        children.extend(branch_refs);
        return scalar_fragment(Slot::Zero, null_sql(), &children);
    }
    let mut sql = SlotMap::new();
    for slot in slots {
        let mut text = "CASE".to_string();
        for (condition, branch) in conditions.iter().zip(&branches) {
            let then_sql = branch.slot(slot).cloned().unwrap_or_else(null_sql);
            text.push_str(&format!(" WHEN {condition} THEN {then_sql}"));
        }
        if let Some(d) = df.slot(slot) {
            text.push_str(&format!(" ELSE {d}"));
        }
        text.push_str(" END");
        sql.insert(slot, Sql::atom(text));
    }
    let mut children: Vec<&SqlFragment> = fragments.iter().collect();
    children.extend(branches.iter());
    children.push(&df);
    Ok(vec![SqlFragment {
        name: ".".to_string(),
        sql,
        nested_path: merged_nested_path(&children)?,
    }])
}

fn emit_coalesce(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let ExprKind::Coalesce(terms) = &expr.kind else {
        unreachable!("registered for coalesce")
    };
    let mut fragments = Vec::new();
    for term in terms {
        fragments.push(emit_single(term, ctx, Hints { not_null: hints.not_null, boolean: false })?);
    }
    let refs: Vec<&SqlFragment> = fragments.iter().collect();
    let slots = branch_slots(&refs);
    if slots.is_empty() {
        return scalar_fragment(Slot::Zero, null_sql(), &refs);
    }
    let mut sql = SlotMap::new();
    for slot in slots {
        let args: Vec<Sql> = fragments
            .iter()
            .filter_map(|f| f.slot(slot))
            .map(|s| match slot {
                Slot::S => sql_call("NULLIF", &[s.clone(), quote_string("")]),
                _ => s.clone(),
            })
            .collect();
        let piece = if args.len() == 1 {
            args.into_iter().next().expect("one argument")
        } else {
            sql_call("COALESCE", &args)
        };
        sql.insert(slot, piece);
    }
    Ok(vec![SqlFragment {
        name: ".".to_string(),
        sql,
        nested_path: merged_nested_path(&refs)?,
    }])
}

// --- aggregation markers -------------------------------------------------

fn emit_count(expr: &Expr, ctx: &Context<'_>, _hints: Hints) -> Result<FragmentList> {
    let ExprKind::Count(terms) = &expr.kind else {
        unreachable!("registered for count")
    };
    let mut fragments = Vec::new();
    let mut pieces = Vec::new();
    for term in terms {
        let missing = term.missing().partial_eval()?;
        if missing.is_false() {
            pieces.push(Sql::atom("1"));
        } else if missing.is_true() {
            pieces.push(Sql::atom("0"));
        } else {
            let mf = emit_single(&missing, ctx, Hints { boolean: true, not_null: false })?;
            pieces.push(case_when(
                &bool_of(&mf),
                &Sql::atom("0"),
                Some(&Sql::atom("1")),
            ));
            fragments.push(mf);
        }
    }
    let sql = if pieces.is_empty() {
        Sql::atom("0")
    } else {
        join_sql(" + ", &pieces)
    };
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    Ok(vec![SqlFragment {
        name: ".".to_string(),
        sql: SlotMap::from([(Slot::N, sql)]),
        nested_path: merged_nested_path(&children)?,
    }])
}

/// Scalar MAX/MIN return NULL when any operand is NULL, so each argument is
/// rotated through COALESCE to make the fold null-skipping.
fn emit_extreme(expr: &Expr, ctx: &Context<'_>, hints: Hints, func: &str) -> Result<FragmentList> {
    let terms = match &expr.kind {
        ExprKind::Max(terms) | ExprKind::Min(terms) => terms,
        _ => unreachable!("registered for max/min"),
    };
    let mut fragments = Vec::new();
    let mut parts = Vec::new();
    for term in terms {
        let fragment = emit_single(term, ctx, Hints { not_null: hints.not_null, boolean: false })?;
        parts.push(num_of(&fragment));
        fragments.push(fragment);
    }
    let sql = match parts.len() {
        0 => null_sql(),
        1 => parts.into_iter().next().expect("one part"),
        n => {
            let rotations: Vec<Sql> = (0..n)
                .map(|i| {
                    let rotated: Vec<Sql> =
                        (0..n).map(|j| parts[(i + j) % n].clone()).collect();
                    sql_call("COALESCE", &rotated)
                })
                .collect();
            sql_call(func, &rotations)
        }
    };
    let children: Vec<&SqlFragment> = fragments.iter().collect();
    scalar_fragment(Slot::N, sql, &children)
}

fn emit_max(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    emit_extreme(expr, ctx, hints, "MAX")
}

fn emit_min(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    emit_extreme(expr, ctx, hints, "MIN")
}
