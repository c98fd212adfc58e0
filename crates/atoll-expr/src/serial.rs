//! Pre-order integer serialization.
//!
//! The stream is a function of structure alone: `ConstantF` contributes only
//! its tag (matching the `almost_same` equivalence), while index payloads
//! and power exponents do contribute. `Add`/`Mul` write their arity so the
//! stream is unambiguous. This is the key type for the novelty trie.

use crate::node::Expr;

impl Expr {
    /// Append the pre-order serial of this tree to `out`.
    pub fn serial(&self, out: &mut Vec<i64>) {
        out.push(self.op() as i64);
        match self {
            Expr::Null | Expr::Time | Expr::ConstantF(_) => {}
            Expr::Var(i) | Expr::Constant(i) | Expr::System(i) => {
                out.push(*i as i64);
            }
            Expr::Neg(c)
            | Expr::Abs(c)
            | Expr::Sqrt(c)
            | Expr::Sin(c)
            | Expr::Cos(c)
            | Expr::Tan(c)
            | Expr::Exp(c)
            | Expr::Log(c) => c.serial(out),
            Expr::PowI(c, p) => {
                out.push(*p as i64);
                c.serial(out);
            }
            Expr::PowF(c, p) => {
                out.push(p.to_bits() as i64);
                c.serial(out);
            }
            Expr::PowE(a, b) | Expr::Div(a, b) => {
                a.serial(out);
                b.serial(out);
            }
            Expr::Add(cs) | Expr::Mul(cs) => {
                out.push(cs.len() as i64);
                for c in cs {
                    c.serial(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(e: &Expr) -> Vec<i64> {
        let mut out = Vec::new();
        e.serial(&mut out);
        out
    }

    #[test]
    fn identical_structure_same_serial() {
        let a = Expr::Add(vec![Expr::Var(0), Expr::ConstantF(1.0)]);
        let b = Expr::Add(vec![Expr::Var(0), Expr::ConstantF(42.0)]);
        assert_eq!(key(&a), key(&b), "ConstantF values must not matter");
    }

    #[test]
    fn different_structure_different_serial() {
        let a = Expr::Add(vec![Expr::Var(0), Expr::Var(1)]);
        let b = Expr::Mul(vec![Expr::Var(0), Expr::Var(1)]);
        let c = Expr::Add(vec![Expr::Var(0), Expr::Var(2)]);
        assert_ne!(key(&a), key(&b));
        assert_ne!(key(&a), key(&c));
    }

    #[test]
    fn arity_disambiguates() {
        let two = Expr::Add(vec![Expr::Var(0), Expr::Var(1)]);
        let three = Expr::Add(vec![Expr::Var(0), Expr::Var(1), Expr::Var(2)]);
        assert_ne!(key(&two), key(&three));
        assert!(!key(&two).is_empty());
    }

    #[test]
    fn exponent_contributes() {
        let a = Expr::PowI(Box::new(Expr::Var(0)), 2);
        let b = Expr::PowI(Box::new(Expr::Var(0)), -3);
        assert_ne!(key(&a), key(&b));
    }
}
