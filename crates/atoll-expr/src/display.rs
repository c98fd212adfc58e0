//! Infix rendering of expressions for report logs.

use std::fmt;

use crate::node::Expr;

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Null => write!(f, "null"),
            Expr::Time => write!(f, "t"),
            Expr::Var(i) => write!(f, "x{i}"),
            Expr::Constant(i) => write!(f, "c{i}"),
            Expr::ConstantF(v) => write!(f, "{v}"),
            Expr::System(i) => write!(f, "s{i}"),
            Expr::Neg(c) => write!(f, "(-{c})"),
            Expr::Abs(c) => write!(f, "abs({c})"),
            Expr::Sqrt(c) => write!(f, "sqrt({c})"),
            Expr::Sin(c) => write!(f, "sin({c})"),
            Expr::Cos(c) => write!(f, "cos({c})"),
            Expr::Tan(c) => write!(f, "tan({c})"),
            Expr::Exp(c) => write!(f, "exp({c})"),
            Expr::Log(c) => write!(f, "log({c})"),
            Expr::PowI(c, p) => write!(f, "({c})^{p}"),
            Expr::PowF(c, p) => write!(f, "({c})^{p}"),
            Expr::PowE(a, b) => write!(f, "({a})^({b})"),
            Expr::Div(a, b) => write!(f, "({a} / {b})"),
            Expr::Add(cs) => {
                write!(f, "(")?;
                for (i, c) in cs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, ")")
            }
            Expr::Mul(cs) => {
                write!(f, "(")?;
                for (i, c) in cs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " * ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, ")")
            }
        }
    }
}
