//! Rule-based algebraic simplification.
//!
//! Bottom-up rewriting: children first, then the parent node. Rewrites
//! cover constant folding, flattening of nested `Add`/`Mul`, identity
//! removal (`x + 0`, `x * 1`), annihilation (`x * 0`), sign normalization
//! of products, and canonical ordering of commutative children under the
//! structural order.
//!
//! `simplify` is a pure function; it returns `None` when the whole
//! expression reduces to a variable-free constant, which callers treat as
//! a rejection signal.

use crate::node::Expr;

/// Configurable rule set.
#[derive(Clone, Copy, Debug)]
pub struct SimpRules {
    /// Replace surviving `ConstantF` literals with numbered `Constant`
    /// coefficient slots. On by default; the coordinator disables it since
    /// the engine carries no coefficient fitter.
    pub convert_consts: bool,
}

impl Default for SimpRules {
    fn default() -> Self {
        Self {
            convert_consts: true,
        }
    }
}

impl SimpRules {
    /// The rule set the search runs with: conversion disabled.
    pub fn no_convert() -> Self {
        Self {
            convert_consts: false,
        }
    }
}

impl Expr {
    /// Simplify into a structurally-equal-or-simpler expression.
    ///
    /// Returns `None` when the result is `Null` or variable-free.
    pub fn simplify(&self, rules: &SimpRules) -> Option<Expr> {
        let mut out = rewrite(self);
        if matches!(out, Expr::Null) || !out.has_var() {
            return None;
        }
        if rules.convert_consts {
            let mut slot = 0;
            convert_consts(&mut out, &mut slot);
        }
        Some(out)
    }
}

/// Rewrite one tree bottom-up, returning a fresh simplified tree.
fn rewrite(e: &Expr) -> Expr {
    match e {
        Expr::Null
        | Expr::Time
        | Expr::Var(_)
        | Expr::Constant(_)
        | Expr::ConstantF(_)
        | Expr::System(_) => e.clone(),

        Expr::Neg(c) => match rewrite(c) {
            Expr::ConstantF(v) => Expr::ConstantF(-v),
            Expr::Neg(inner) => *inner,
            s => Expr::Neg(Box::new(s)),
        },
        Expr::Abs(c) => match rewrite(c) {
            Expr::ConstantF(v) => Expr::ConstantF(v.abs()),
            Expr::Neg(inner) => Expr::Abs(inner),
            Expr::Abs(inner) => Expr::Abs(inner),
            s => Expr::Abs(Box::new(s)),
        },
        Expr::Sqrt(c) => fold_unary(rewrite(c), f64::sqrt, Expr::Sqrt),
        Expr::Sin(c) => fold_unary(rewrite(c), f64::sin, Expr::Sin),
        Expr::Cos(c) => fold_unary(rewrite(c), f64::cos, Expr::Cos),
        Expr::Tan(c) => fold_unary(rewrite(c), f64::tan, Expr::Tan),
        Expr::Exp(c) => fold_unary(rewrite(c), f64::exp, Expr::Exp),
        Expr::Log(c) => fold_unary(rewrite(c), f64::ln, Expr::Log),

        Expr::PowI(c, p) => {
            let s = rewrite(c);
            match (*p, s) {
                (0, _) => Expr::ConstantF(1.0),
                (1, s) => s,
                (p, Expr::ConstantF(v)) => Expr::ConstantF(v.powi(p)),
                (p, s) => Expr::PowI(Box::new(s), p),
            }
        }
        Expr::PowF(c, p) => match rewrite(c) {
            Expr::ConstantF(v) => Expr::ConstantF(v.powf(*p)),
            s => Expr::PowF(Box::new(s), *p),
        },
        Expr::PowE(a, b) => {
            let sa = rewrite(a);
            let sb = rewrite(b);
            match (sa, sb) {
                (Expr::ConstantF(x), Expr::ConstantF(y)) => Expr::ConstantF(x.powf(y)),
                (sa, Expr::ConstantF(y)) if y == 1.0 => sa,
                (sa, sb) => Expr::PowE(Box::new(sa), Box::new(sb)),
            }
        }
        Expr::Div(a, b) => {
            let sa = rewrite(a);
            let sb = rewrite(b);
            match (sa, sb) {
                (Expr::ConstantF(x), Expr::ConstantF(y)) => Expr::ConstantF(x / y),
                (sa, Expr::ConstantF(y)) if y == 1.0 => sa,
                (sa, sb) => Expr::Div(Box::new(sa), Box::new(sb)),
            }
        }

        Expr::Add(cs) => flatten_add(cs),
        Expr::Mul(cs) => flatten_mul(cs),
    }
}

fn fold_unary(child: Expr, f: fn(f64) -> f64, wrap: fn(Box<Expr>) -> Expr) -> Expr {
    match child {
        Expr::ConstantF(v) => Expr::ConstantF(f(v)),
        s => wrap(Box::new(s)),
    }
}

/// Flatten nested sums, fold constants, drop the additive identity,
/// canonically order the survivors.
fn flatten_add(cs: &[Expr]) -> Expr {
    let mut kids = Vec::with_capacity(cs.len());
    let mut csum = 0.0;
    let mut saw_const = false;
    for c in cs {
        splice_add(rewrite(c), &mut kids, &mut csum, &mut saw_const);
    }
    if kids.is_empty() {
        return Expr::ConstantF(csum);
    }
    if saw_const && csum != 0.0 {
        kids.push(Expr::ConstantF(csum));
    }
    if kids.len() == 1 {
        return kids.remove(0);
    }
    kids.sort_by(|a, b| a.cmp_structure(b));
    Expr::Add(kids)
}

fn splice_add(e: Expr, kids: &mut Vec<Expr>, csum: &mut f64, saw_const: &mut bool) {
    match e {
        Expr::Add(inner) => {
            for k in inner {
                splice_add(k, kids, csum, saw_const);
            }
        }
        Expr::ConstantF(v) => {
            *csum += v;
            *saw_const = true;
        }
        other => kids.push(other),
    }
}

/// Flatten nested products, fold constants, drop the multiplicative
/// identity, annihilate on zero, normalize sign, canonically order.
fn flatten_mul(cs: &[Expr]) -> Expr {
    let mut kids = Vec::with_capacity(cs.len());
    let mut cprod = 1.0;
    let mut saw_const = false;
    for c in cs {
        splice_mul(rewrite(c), &mut kids, &mut cprod, &mut saw_const);
    }
    if cprod == 0.0 {
        return Expr::ConstantF(0.0);
    }
    if kids.is_empty() {
        return Expr::ConstantF(cprod);
    }
    let negate = cprod < 0.0;
    let mag = cprod.abs();
    if saw_const && mag != 1.0 {
        kids.push(Expr::ConstantF(mag));
    }
    kids.sort_by(|a, b| a.cmp_structure(b));
    let product = if kids.len() == 1 {
        kids.remove(0)
    } else {
        Expr::Mul(kids)
    };
    if negate {
        Expr::Neg(Box::new(product))
    } else {
        product
    }
}

fn splice_mul(e: Expr, kids: &mut Vec<Expr>, cprod: &mut f64, saw_const: &mut bool) {
    match e {
        Expr::Mul(inner) => {
            for k in inner {
                splice_mul(k, kids, cprod, saw_const);
            }
        }
        Expr::ConstantF(v) => {
            *cprod *= v;
            *saw_const = true;
        }
        other => kids.push(other),
    }
}

/// Replace every `ConstantF` with a numbered coefficient slot (pre-order).
fn convert_consts(e: &mut Expr, slot: &mut usize) {
    match e {
        Expr::ConstantF(_) => {
            *e = Expr::Constant(*slot);
            *slot += 1;
        }
        Expr::Neg(c)
        | Expr::Abs(c)
        | Expr::Sqrt(c)
        | Expr::Sin(c)
        | Expr::Cos(c)
        | Expr::Tan(c)
        | Expr::Exp(c)
        | Expr::Log(c)
        | Expr::PowI(c, _)
        | Expr::PowF(c, _) => convert_consts(c, slot),
        Expr::PowE(a, b) | Expr::Div(a, b) => {
            convert_consts(a, slot);
            convert_consts(b, slot);
        }
        Expr::Add(cs) | Expr::Mul(cs) => {
            for c in cs {
                convert_consts(c, slot);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: SimpRules = SimpRules {
        convert_consts: false,
    };

    #[test]
    fn add_zero_removed() {
        let e = Expr::Add(vec![Expr::Var(0), Expr::ConstantF(0.0)]);
        let s = e.simplify(&RULES).unwrap();
        assert_eq!(s, Expr::Var(0));
    }

    #[test]
    fn mul_one_removed() {
        let e = Expr::Mul(vec![Expr::Var(0), Expr::ConstantF(1.0)]);
        let s = e.simplify(&RULES).unwrap();
        assert_eq!(s, Expr::Var(0));
    }

    #[test]
    fn mul_zero_annihilates() {
        let e = Expr::Add(vec![
            Expr::Var(0),
            Expr::Mul(vec![Expr::Var(1), Expr::ConstantF(0.0)]),
        ]);
        let s = e.simplify(&RULES).unwrap();
        assert_eq!(s, Expr::Var(0));
    }

    #[test]
    fn constants_fold() {
        let e = Expr::Add(vec![
            Expr::Var(0),
            Expr::ConstantF(1.0),
            Expr::ConstantF(2.5),
        ]);
        let s = e.simplify(&RULES).unwrap();
        assert_eq!(
            s,
            Expr::Add(vec![Expr::ConstantF(3.5), Expr::Var(0)])
        );
    }

    #[test]
    fn nested_sums_flatten() {
        let e = Expr::Add(vec![
            Expr::Add(vec![Expr::Var(0), Expr::Var(1)]),
            Expr::Var(2),
        ]);
        let s = e.simplify(&RULES).unwrap();
        assert_eq!(
            s,
            Expr::Add(vec![Expr::Var(0), Expr::Var(1), Expr::Var(2)])
        );
    }

    #[test]
    fn commutative_children_canonicalized() {
        let a = Expr::Add(vec![Expr::Var(1), Expr::Var(0)]);
        let b = Expr::Add(vec![Expr::Var(0), Expr::Var(1)]);
        let sa = a.simplify(&RULES).unwrap();
        let sb = b.simplify(&RULES).unwrap();
        assert_eq!(sa, sb);
    }

    #[test]
    fn double_negation_cancels() {
        let e = Expr::Neg(Box::new(Expr::Neg(Box::new(Expr::Var(0)))));
        let s = e.simplify(&RULES).unwrap();
        assert_eq!(s, Expr::Var(0));
    }

    #[test]
    fn negative_product_normalizes_sign() {
        let e = Expr::Mul(vec![Expr::ConstantF(-1.0), Expr::Var(0)]);
        let s = e.simplify(&RULES).unwrap();
        assert_eq!(s, Expr::Neg(Box::new(Expr::Var(0))));
    }

    #[test]
    fn pure_constant_rejected() {
        let e = Expr::Add(vec![Expr::ConstantF(1.0), Expr::ConstantF(2.0)]);
        assert!(e.simplify(&RULES).is_none());
        let t = Expr::Sin(Box::new(Expr::Time));
        assert!(t.simplify(&RULES).is_none());
    }

    #[test]
    fn pow_identities() {
        let e0 = Expr::PowI(Box::new(Expr::Var(0)), 0);
        assert!(e0.simplify(&RULES).is_none()); // folds to 1.0, variable-free
        let e1 = Expr::PowI(Box::new(Expr::Var(0)), 1);
        assert_eq!(e1.simplify(&RULES).unwrap(), Expr::Var(0));
    }

    #[test]
    fn div_by_one_removed() {
        let e = Expr::Div(Box::new(Expr::Var(0)), Box::new(Expr::ConstantF(1.0)));
        assert_eq!(e.simplify(&RULES).unwrap(), Expr::Var(0));
    }

    #[test]
    fn convert_consts_assigns_slots() {
        let e = Expr::Add(vec![
            Expr::Mul(vec![Expr::ConstantF(2.0), Expr::Var(0)]),
            Expr::ConstantF(5.0),
            Expr::Var(1),
        ]);
        let s = e.simplify(&SimpRules::default()).unwrap();
        assert_eq!(s.coeff_count(), 2);
        let mut serial = Vec::new();
        s.serial(&mut serial);
        assert!(serial.contains(&(crate::Op::Constant as i64)));
    }

    #[test]
    fn meaning_preserved_on_samples() {
        let exprs = [
            Expr::Add(vec![
                Expr::Mul(vec![Expr::Var(0), Expr::ConstantF(1.0)]),
                Expr::Add(vec![Expr::Var(1), Expr::ConstantF(0.0)]),
            ]),
            Expr::Neg(Box::new(Expr::Mul(vec![
                Expr::ConstantF(-2.0),
                Expr::Var(0),
            ]))),
            Expr::Div(
                Box::new(Expr::Add(vec![Expr::Var(0), Expr::ConstantF(3.0)])),
                Box::new(Expr::Var(1)),
            ),
            Expr::Sin(Box::new(Expr::Add(vec![
                Expr::Var(0),
                Expr::ConstantF(1.0),
                Expr::ConstantF(-1.0),
            ]))),
        ];
        let points: &[&[f64]] = &[&[0.5, 2.0], &[-1.5, 0.25], &[3.0, -2.0]];
        for e in &exprs {
            let s = e.simplify(&RULES).unwrap();
            for x in points {
                let a = e.eval(0.0, x, &[], &[]);
                let b = s.eval(0.0, x, &[], &[]);
                if a.is_finite() && b.is_finite() {
                    assert!(
                        (a - b).abs() <= 1e-9 * a.abs().max(1.0),
                        "{e} vs {s} at {x:?}: {a} != {b}"
                    );
                }
            }
        }
    }
}
