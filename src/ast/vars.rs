use std::collections::{BTreeMap, BTreeSet};

use super::{Expr, ExprKind};

impl Expr {
    /// The free variable paths referenced anywhere in this tree.
    pub fn vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<String>) {
        if let ExprKind::Variable(name) = &self.kind {
            out.insert(name.clone());
        }
        for child in self.children() {
            child.collect_vars(out);
        }
    }

    /// Rewrite every variable `v` to `renames[v]`, leaving unmapped
    /// variables (and everything else) untouched. Pure; renaming preserves
    /// structure, so the `simplified` flag carries over.
    pub fn map(&self, renames: &BTreeMap<String, String>) -> Expr {
        match &self.kind {
            ExprKind::Variable(name) => match renames.get(name) {
                Some(new_name) => Expr {
                    kind: ExprKind::Variable(new_name.clone()),
                    simplified: self.simplified,
                },
                None => self.clone(),
            },
            _ => Expr {
                kind: self
                    .try_map_children(|child| Ok(child.map(renames)))
                    .expect("map is infallible"),
                simplified: self.simplified,
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn renames(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn vars_are_collected_transitively() {
        let e = Expr::and(vec![
            Expr::eq(Expr::variable("a").unwrap(), Expr::integer(1)),
            Expr::missing_of(Expr::variable("b.c").unwrap()),
        ]);
        let vars: Vec<_> = e.vars().into_iter().collect();
        assert_eq!(vars, vec!["a", "b.c"]);
    }

    #[test]
    fn map_rewrites_only_mapped_variables() {
        let e = Expr::eq(Expr::variable("a").unwrap(), Expr::variable("b").unwrap());
        let mapped = e.map(&renames(&[("a", "x")]));
        assert_eq!(
            mapped,
            Expr::eq(Expr::variable("x").unwrap(), Expr::variable("b").unwrap())
        );
        // the original is untouched
        assert_eq!(e.vars().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn map_commutes_with_vars() {
        let e = Expr::or(vec![
            Expr::variable("a").unwrap(),
            Expr::not(Expr::variable("b").unwrap()),
        ]);
        let m = renames(&[("a", "x"), ("b", "y")]);
        let mapped_vars: Vec<_> = e.map(&m).vars().into_iter().collect();
        assert_eq!(mapped_vars, vec!["x", "y"]);
    }
}
