//! Total structural ordering over expressions.
//!
//! Tag first, then per-tag payloads, then children lexicographically.
//! `Add`/`Mul` children are compared in storage order — both sides are
//! expected to be canonicalized (sorted) by simplification first.

use std::cmp::Ordering;

use crate::node::Expr;

impl Expr {
    /// The total order `≺`: compare tags, then payloads, then children.
    pub fn cmp_structure(&self, other: &Expr) -> Ordering {
        let tags = (self.op() as u8).cmp(&(other.op() as u8));
        if tags != Ordering::Equal {
            return tags;
        }
        match (self, other) {
            (Expr::Null, Expr::Null) | (Expr::Time, Expr::Time) => Ordering::Equal,
            (Expr::Var(a), Expr::Var(b)) => a.cmp(b),
            (Expr::Constant(a), Expr::Constant(b)) => a.cmp(b),
            (Expr::System(a), Expr::System(b)) => a.cmp(b),
            (Expr::ConstantF(a), Expr::ConstantF(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Expr::Neg(a), Expr::Neg(b))
            | (Expr::Abs(a), Expr::Abs(b))
            | (Expr::Sqrt(a), Expr::Sqrt(b))
            | (Expr::Sin(a), Expr::Sin(b))
            | (Expr::Cos(a), Expr::Cos(b))
            | (Expr::Tan(a), Expr::Tan(b))
            | (Expr::Exp(a), Expr::Exp(b))
            | (Expr::Log(a), Expr::Log(b)) => a.cmp_structure(b),
            (Expr::PowI(a, x), Expr::PowI(b, y)) => {
                a.cmp_structure(b).then(x.cmp(y))
            }
            (Expr::PowF(a, x), Expr::PowF(b, y)) => a
                .cmp_structure(b)
                .then(x.partial_cmp(y).unwrap_or(Ordering::Equal)),
            (Expr::PowE(a1, b1), Expr::PowE(a2, b2))
            | (Expr::Div(a1, b1), Expr::Div(a2, b2)) => {
                a1.cmp_structure(a2).then_with(|| b1.cmp_structure(b2))
            }
            (Expr::Add(xs), Expr::Add(ys)) | (Expr::Mul(xs), Expr::Mul(ys)) => {
                for (x, y) in xs.iter().zip(ys.iter()) {
                    let c = x.cmp_structure(y);
                    if c != Ordering::Equal {
                        return c;
                    }
                }
                xs.len().cmp(&ys.len())
            }
            // Tags already matched; mixed pairs cannot occur.
            _ => Ordering::Equal,
        }
    }

    /// `self ≺ other`.
    #[inline]
    pub fn am_i_less(&self, other: &Expr) -> bool {
        self.cmp_structure(other) == Ordering::Less
    }

    /// Structural equality ignoring `ConstantF` values.
    pub fn almost_same(&self, other: &Expr) -> bool {
        if self.op() != other.op() {
            return false;
        }
        match (self, other) {
            (Expr::ConstantF(_), Expr::ConstantF(_)) => true,
            (Expr::Null, Expr::Null) | (Expr::Time, Expr::Time) => true,
            (Expr::Var(a), Expr::Var(b)) => a == b,
            (Expr::Constant(a), Expr::Constant(b)) => a == b,
            (Expr::System(a), Expr::System(b)) => a == b,
            (Expr::Neg(a), Expr::Neg(b))
            | (Expr::Abs(a), Expr::Abs(b))
            | (Expr::Sqrt(a), Expr::Sqrt(b))
            | (Expr::Sin(a), Expr::Sin(b))
            | (Expr::Cos(a), Expr::Cos(b))
            | (Expr::Tan(a), Expr::Tan(b))
            | (Expr::Exp(a), Expr::Exp(b))
            | (Expr::Log(a), Expr::Log(b)) => a.almost_same(b),
            (Expr::PowI(a, x), Expr::PowI(b, y)) => x == y && a.almost_same(b),
            (Expr::PowF(a, x), Expr::PowF(b, y)) => x == y && a.almost_same(b),
            (Expr::PowE(a1, b1), Expr::PowE(a2, b2))
            | (Expr::Div(a1, b1), Expr::Div(a2, b2)) => {
                a1.almost_same(a2) && b1.almost_same(b2)
            }
            (Expr::Add(xs), Expr::Add(ys)) | (Expr::Mul(xs), Expr::Mul(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().zip(ys.iter()).all(|(x, y)| x.almost_same(y))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_order_dominates() {
        let var = Expr::Var(5);
        let lit = Expr::ConstantF(99.0);
        // ConstantF tag sorts before Var
        assert!(lit.am_i_less(&var));
        assert!(!var.am_i_less(&lit));
    }

    #[test]
    fn payload_breaks_ties() {
        assert!(Expr::Var(0).am_i_less(&Expr::Var(1)));
        assert!(Expr::ConstantF(1.0).am_i_less(&Expr::ConstantF(2.0)));
    }

    #[test]
    fn children_break_ties() {
        let a = Expr::Sin(Box::new(Expr::Var(0)));
        let b = Expr::Sin(Box::new(Expr::Var(1)));
        assert!(a.am_i_less(&b));
    }

    #[test]
    fn exactly_one_relation_holds() {
        let exprs = [
            Expr::Var(0),
            Expr::Var(1),
            Expr::ConstantF(2.0),
            Expr::Add(vec![Expr::Var(0), Expr::Var(1)]),
            Expr::Add(vec![Expr::Var(0), Expr::Var(1), Expr::Var(2)]),
            Expr::Neg(Box::new(Expr::Var(0))),
            Expr::PowI(Box::new(Expr::Var(0)), 2),
            Expr::PowI(Box::new(Expr::Var(0)), 3),
        ];
        for a in &exprs {
            assert!(!a.am_i_less(a), "irreflexive");
            for b in &exprs {
                let lt = a.am_i_less(b);
                let gt = b.am_i_less(a);
                let eq = a.cmp_structure(b) == std::cmp::Ordering::Equal;
                assert_eq!(
                    [lt, gt, eq].iter().filter(|&&x| x).count(),
                    1,
                    "trichotomy violated for {a:?} vs {b:?}"
                );
            }
        }
    }

    #[test]
    fn transitive() {
        let a = Expr::Var(0);
        let b = Expr::Var(1);
        let c = Expr::Var(2);
        assert!(a.am_i_less(&b) && b.am_i_less(&c) && a.am_i_less(&c));
    }

    #[test]
    fn almost_same_ignores_float_values() {
        let a = Expr::Add(vec![Expr::Var(0), Expr::ConstantF(1.0)]);
        let b = Expr::Add(vec![Expr::Var(0), Expr::ConstantF(7.5)]);
        assert!(a.almost_same(&b));
        let c = Expr::Add(vec![Expr::Var(1), Expr::ConstantF(1.0)]);
        assert!(!a.almost_same(&c));
    }

    #[test]
    fn almost_same_respects_powers() {
        let a = Expr::PowI(Box::new(Expr::Var(0)), 2);
        let b = Expr::PowI(Box::new(Expr::Var(0)), 3);
        assert!(!a.almost_same(&b));
        assert!(a.almost_same(&a.clone()));
    }
}
