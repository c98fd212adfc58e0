//! Expression node types, structural statistics, and subtree addressing.

/// Operator tags, in the order that defines the structural sort and the
/// serial stream ids. `Null` never appears in a valid expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Op {
    Null = 0,
    Constant,
    ConstantF,
    Time,
    System,
    Var,
    Neg,
    Abs,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    PowI,
    PowF,
    PowE,
    Div,
    Add,
    Mul,
}

impl Op {
    /// Parse an operator name (case-insensitive), as written in config
    /// alphabet lists.
    pub fn parse(name: &str) -> Option<Op> {
        Some(match name.to_uppercase().as_str() {
            "NULL" => Op::Null,
            "CONSTANT" => Op::Constant,
            "CONSTANTF" => Op::ConstantF,
            "TIME" => Op::Time,
            "SYSTEM" => Op::System,
            "VAR" => Op::Var,
            "NEG" => Op::Neg,
            "ABS" => Op::Abs,
            "SQRT" => Op::Sqrt,
            "SIN" => Op::Sin,
            "COS" => Op::Cos,
            "TAN" => Op::Tan,
            "EXP" => Op::Exp,
            "LOG" => Op::Log,
            "POWI" => Op::PowI,
            "POWF" => Op::PowF,
            "POWE" => Op::PowE,
            "DIV" => Op::Div,
            "ADD" => Op::Add,
            "MUL" => Op::Mul,
            _ => return None,
        })
    }

    /// Whether this operator forbids further trig nesting below it.
    #[inline]
    pub fn is_trig(self) -> bool {
        matches!(self, Op::Sin | Op::Cos | Op::Tan)
    }
}

/// An expression tree.
///
/// Leaves carry their payloads; `Add`/`Mul` hold an ordered child vector
/// (canonically sorted after simplification, so structural equality is
/// order-independent). Breeding always deep-clones before mutating — trees
/// are plain values, no sharing.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Sentinel returned on generation failure; never valid.
    Null,
    /// The time variable `t`.
    Time,
    /// Independent variable by index.
    Var(usize),
    /// Named coefficient slot.
    Constant(usize),
    /// Floating literal.
    ConstantF(f64),
    /// Per-dataset system value by index.
    System(usize),

    Neg(Box<Expr>),
    Abs(Box<Expr>),
    Sqrt(Box<Expr>),
    Sin(Box<Expr>),
    Cos(Box<Expr>),
    Tan(Box<Expr>),
    Exp(Box<Expr>),
    Log(Box<Expr>),

    /// Integer power.
    PowI(Box<Expr>, i32),
    /// Fixed floating power.
    PowF(Box<Expr>, f64),
    /// Expression-valued power `base ^ exp`.
    PowE(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),

    Add(Vec<Expr>),
    Mul(Vec<Expr>),
}

impl Expr {
    /// The operator tag of the root node.
    pub fn op(&self) -> Op {
        match self {
            Expr::Null => Op::Null,
            Expr::Time => Op::Time,
            Expr::Var(_) => Op::Var,
            Expr::Constant(_) => Op::Constant,
            Expr::ConstantF(_) => Op::ConstantF,
            Expr::System(_) => Op::System,
            Expr::Neg(_) => Op::Neg,
            Expr::Abs(_) => Op::Abs,
            Expr::Sqrt(_) => Op::Sqrt,
            Expr::Sin(_) => Op::Sin,
            Expr::Cos(_) => Op::Cos,
            Expr::Tan(_) => Op::Tan,
            Expr::Exp(_) => Op::Exp,
            Expr::Log(_) => Op::Log,
            Expr::PowI(_, _) => Op::PowI,
            Expr::PowF(_, _) => Op::PowF,
            Expr::PowE(_, _) => Op::PowE,
            Expr::Div(_, _) => Op::Div,
            Expr::Add(_) => Op::Add,
            Expr::Mul(_) => Op::Mul,
        }
    }

    /// Total node count.
    pub fn size(&self) -> usize {
        match self {
            Expr::Null
            | Expr::Time
            | Expr::Var(_)
            | Expr::Constant(_)
            | Expr::ConstantF(_)
            | Expr::System(_) => 1,
            Expr::Neg(c)
            | Expr::Abs(c)
            | Expr::Sqrt(c)
            | Expr::Sin(c)
            | Expr::Cos(c)
            | Expr::Tan(c)
            | Expr::Exp(c)
            | Expr::Log(c)
            | Expr::PowI(c, _)
            | Expr::PowF(c, _) => 1 + c.size(),
            Expr::PowE(a, b) | Expr::Div(a, b) => 1 + a.size() + b.size(),
            Expr::Add(cs) | Expr::Mul(cs) => {
                1 + cs.iter().map(Expr::size).sum::<usize>()
            }
        }
    }

    /// Height of the tree; 1 for leaves.
    pub fn depth(&self) -> usize {
        match self {
            Expr::Null
            | Expr::Time
            | Expr::Var(_)
            | Expr::Constant(_)
            | Expr::ConstantF(_)
            | Expr::System(_) => 1,
            Expr::Neg(c)
            | Expr::Abs(c)
            | Expr::Sqrt(c)
            | Expr::Sin(c)
            | Expr::Cos(c)
            | Expr::Tan(c)
            | Expr::Exp(c)
            | Expr::Log(c)
            | Expr::PowI(c, _)
            | Expr::PowF(c, _) => 1 + c.depth(),
            Expr::PowE(a, b) | Expr::Div(a, b) => 1 + a.depth().max(b.depth()),
            Expr::Add(cs) | Expr::Mul(cs) => {
                1 + cs.iter().map(Expr::depth).max().unwrap_or(0)
            }
        }
    }

    /// Whether any descendant is a `Var` leaf. Valid individuals must
    /// satisfy this; pure constants are rejected upstream.
    pub fn has_var(&self) -> bool {
        match self {
            Expr::Var(_) => true,
            Expr::Null
            | Expr::Time
            | Expr::Constant(_)
            | Expr::ConstantF(_)
            | Expr::System(_) => false,
            Expr::Neg(c)
            | Expr::Abs(c)
            | Expr::Sqrt(c)
            | Expr::Sin(c)
            | Expr::Cos(c)
            | Expr::Tan(c)
            | Expr::Exp(c)
            | Expr::Log(c)
            | Expr::PowI(c, _)
            | Expr::PowF(c, _) => c.has_var(),
            Expr::PowE(a, b) | Expr::Div(a, b) => a.has_var() || b.has_var(),
            Expr::Add(cs) | Expr::Mul(cs) => cs.iter().any(Expr::has_var),
        }
    }

    /// Number of `Constant` coefficient slots (highest slot index + 1).
    pub fn coeff_count(&self) -> usize {
        match self {
            Expr::Constant(i) => i + 1,
            Expr::Null
            | Expr::Time
            | Expr::Var(_)
            | Expr::ConstantF(_)
            | Expr::System(_) => 0,
            Expr::Neg(c)
            | Expr::Abs(c)
            | Expr::Sqrt(c)
            | Expr::Sin(c)
            | Expr::Cos(c)
            | Expr::Tan(c)
            | Expr::Exp(c)
            | Expr::Log(c)
            | Expr::PowI(c, _)
            | Expr::PowF(c, _) => c.coeff_count(),
            Expr::PowE(a, b) | Expr::Div(a, b) => {
                a.coeff_count().max(b.coeff_count())
            }
            Expr::Add(cs) | Expr::Mul(cs) => {
                cs.iter().map(Expr::coeff_count).max().unwrap_or(0)
            }
        }
    }

    /// The subtree at pre-order index `index` (0 is the root).
    pub fn get(&self, index: usize) -> Option<&Expr> {
        fn walk<'a>(e: &'a Expr, index: usize, next: &mut usize) -> Option<&'a Expr> {
            if *next == index {
                return Some(e);
            }
            *next += 1;
            match e {
                Expr::Neg(c)
                | Expr::Abs(c)
                | Expr::Sqrt(c)
                | Expr::Sin(c)
                | Expr::Cos(c)
                | Expr::Tan(c)
                | Expr::Exp(c)
                | Expr::Log(c)
                | Expr::PowI(c, _)
                | Expr::PowF(c, _) => walk(c, index, next),
                Expr::PowE(a, b) | Expr::Div(a, b) => {
                    walk(a, index, next).or_else(|| walk(b, index, next))
                }
                Expr::Add(cs) | Expr::Mul(cs) => {
                    cs.iter().find_map(|c| walk(c, index, next))
                }
                _ => None,
            }
        }
        let mut next = 0;
        walk(self, index, &mut next)
    }

    /// Mutable access to the subtree at pre-order index `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Expr> {
        fn walk<'a>(
            e: &'a mut Expr,
            index: usize,
            next: &mut usize,
        ) -> Option<&'a mut Expr> {
            if *next == index {
                return Some(e);
            }
            *next += 1;
            match e {
                Expr::Neg(c)
                | Expr::Abs(c)
                | Expr::Sqrt(c)
                | Expr::Sin(c)
                | Expr::Cos(c)
                | Expr::Tan(c)
                | Expr::Exp(c)
                | Expr::Log(c)
                | Expr::PowI(c, _)
                | Expr::PowF(c, _) => walk(c, index, next),
                Expr::PowE(a, b) | Expr::Div(a, b) => {
                    if let r @ Some(_) = walk(a, index, next) {
                        return r;
                    }
                    walk(b, index, next)
                }
                Expr::Add(cs) | Expr::Mul(cs) => {
                    cs.iter_mut().find_map(|c| walk(c, index, next))
                }
                _ => None,
            }
        }
        let mut next = 0;
        walk(self, index, &mut next)
    }

    /// Replace the subtree at pre-order index `index` with `sub`.
    ///
    /// Returns `false` (tree unchanged) when the index is out of range.
    pub fn swap(&mut self, index: usize, sub: Expr) -> bool {
        match self.get_mut(index) {
            Some(slot) => {
                *slot = sub;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Expr {
        // (x0 + 2.0) * sin(x1)
        Expr::Mul(vec![
            Expr::Add(vec![Expr::Var(0), Expr::ConstantF(2.0)]),
            Expr::Sin(Box::new(Expr::Var(1))),
        ])
    }

    #[test]
    fn size_and_depth() {
        let e = sample();
        assert_eq!(e.size(), 6);
        assert_eq!(e.depth(), 3);
        assert!(e.size() >= e.depth());
        assert_eq!(Expr::Var(0).size(), 1);
        assert_eq!(Expr::Var(0).depth(), 1);
    }

    #[test]
    fn clone_preserves_size() {
        let e = sample();
        assert_eq!(e.clone().size(), e.size());
    }

    #[test]
    fn has_var_detection() {
        assert!(sample().has_var());
        assert!(!Expr::ConstantF(3.0).has_var());
        let const_only = Expr::Add(vec![Expr::ConstantF(1.0), Expr::Time]);
        assert!(!const_only.has_var());
    }

    #[test]
    fn preorder_get() {
        let e = sample();
        // pre-order: Mul, Add, Var(0), ConstantF, Sin, Var(1)
        assert_eq!(e.get(0).map(Expr::op), Some(Op::Mul));
        assert_eq!(e.get(1).map(Expr::op), Some(Op::Add));
        assert_eq!(e.get(2), Some(&Expr::Var(0)));
        assert_eq!(e.get(3), Some(&Expr::ConstantF(2.0)));
        assert_eq!(e.get(4).map(Expr::op), Some(Op::Sin));
        assert_eq!(e.get(5), Some(&Expr::Var(1)));
        assert_eq!(e.get(6), None);
    }

    #[test]
    fn swap_roundtrip() {
        let e = sample();
        for i in 0..e.size() {
            let mut copy = e.clone();
            let sub = e.get(i).unwrap().clone();
            assert!(copy.swap(i, sub));
            assert_eq!(copy, e);
        }
    }

    #[test]
    fn swap_twice_keeps_second() {
        let mut e = sample();
        assert!(e.swap(2, Expr::Var(7)));
        assert!(e.swap(2, Expr::Var(9)));
        assert_eq!(e.get(2), Some(&Expr::Var(9)));
    }

    #[test]
    fn swap_out_of_range() {
        let mut e = sample();
        assert!(!e.swap(99, Expr::Var(0)));
        assert_eq!(e, sample());
    }

    #[test]
    fn op_parse_roundtrip() {
        for (name, op) in [
            ("Add", Op::Add),
            ("mul", Op::Mul),
            ("CONSTANTF", Op::ConstantF),
            ("var", Op::Var),
            ("PowI", Op::PowI),
        ] {
            assert_eq!(Op::parse(name), Some(op));
        }
        assert_eq!(Op::parse("frobnicate"), None);
    }

    #[test]
    fn coeff_count_tracks_highest_slot() {
        let e = Expr::Add(vec![
            Expr::Mul(vec![Expr::Constant(1), Expr::Var(0)]),
            Expr::Constant(0),
        ]);
        assert_eq!(e.coeff_count(), 2);
    }
}
