//! Expression evaluation.
//!
//! Strict left-to-right for n-ary operators; IEEE semantics throughout.
//! `Div` by zero, `Log`/`Sqrt` of non-positive inputs, and out-of-range
//! payload indices all propagate NaN/Inf without failing — the fitness
//! layer filters non-finite results.

use crate::node::Expr;

impl Expr {
    /// Evaluate at time `t` with the given independent variables,
    /// coefficient values, and system values. Unused slices may be empty.
    pub fn eval(&self, t: f64, indeps: &[f64], coeffs: &[f64], sysvals: &[f64]) -> f64 {
        match self {
            Expr::Null => f64::NAN,
            Expr::Time => t,
            Expr::Var(i) => indeps.get(*i).copied().unwrap_or(f64::NAN),
            Expr::Constant(i) => coeffs.get(*i).copied().unwrap_or(f64::NAN),
            Expr::ConstantF(v) => *v,
            Expr::System(i) => sysvals.get(*i).copied().unwrap_or(f64::NAN),
            Expr::Neg(c) => -c.eval(t, indeps, coeffs, sysvals),
            Expr::Abs(c) => c.eval(t, indeps, coeffs, sysvals).abs(),
            Expr::Sqrt(c) => c.eval(t, indeps, coeffs, sysvals).sqrt(),
            Expr::Sin(c) => c.eval(t, indeps, coeffs, sysvals).sin(),
            Expr::Cos(c) => c.eval(t, indeps, coeffs, sysvals).cos(),
            Expr::Tan(c) => c.eval(t, indeps, coeffs, sysvals).tan(),
            Expr::Exp(c) => c.eval(t, indeps, coeffs, sysvals).exp(),
            Expr::Log(c) => c.eval(t, indeps, coeffs, sysvals).ln(),
            Expr::PowI(c, p) => c.eval(t, indeps, coeffs, sysvals).powi(*p),
            Expr::PowF(c, p) => c.eval(t, indeps, coeffs, sysvals).powf(*p),
            Expr::PowE(a, b) => a
                .eval(t, indeps, coeffs, sysvals)
                .powf(b.eval(t, indeps, coeffs, sysvals)),
            Expr::Div(a, b) => {
                a.eval(t, indeps, coeffs, sysvals) / b.eval(t, indeps, coeffs, sysvals)
            }
            Expr::Add(cs) => cs
                .iter()
                .fold(0.0, |acc, c| acc + c.eval(t, indeps, coeffs, sysvals)),
            Expr::Mul(cs) => cs
                .iter()
                .fold(1.0, |acc, c| acc * c.eval(t, indeps, coeffs, sysvals)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polynomial() {
        // x0^2 + x1 at (3, 4) = 13
        let e = Expr::Add(vec![
            Expr::PowI(Box::new(Expr::Var(0)), 2),
            Expr::Var(1),
        ]);
        let y = e.eval(0.0, &[3.0, 4.0], &[], &[]);
        assert!((y - 13.0).abs() < 1e-12);
    }

    #[test]
    fn trig_and_time() {
        let e = Expr::Mul(vec![
            Expr::Time,
            Expr::Sin(Box::new(Expr::Var(0))),
        ]);
        let y = e.eval(2.0, &[std::f64::consts::FRAC_PI_2], &[], &[]);
        assert!((y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn coefficients_and_system_values() {
        // c0 * x0 + s1
        let e = Expr::Add(vec![
            Expr::Mul(vec![Expr::Constant(0), Expr::Var(0)]),
            Expr::System(1),
        ]);
        let y = e.eval(0.0, &[2.0], &[3.0], &[0.0, 5.0]);
        assert!((y - 11.0).abs() < 1e-12);
    }

    #[test]
    fn div_by_zero_is_not_an_error() {
        let e = Expr::Div(Box::new(Expr::Var(0)), Box::new(Expr::ConstantF(0.0)));
        assert!(e.eval(0.0, &[1.0], &[], &[]).is_infinite());
        assert!(e.eval(0.0, &[0.0], &[], &[]).is_nan());
    }

    #[test]
    fn log_of_negative_is_nan() {
        let e = Expr::Log(Box::new(Expr::Var(0)));
        assert!(e.eval(0.0, &[-1.0], &[], &[]).is_nan());
        let s = Expr::Sqrt(Box::new(Expr::Var(0)));
        assert!(s.eval(0.0, &[-4.0], &[], &[]).is_nan());
    }

    #[test]
    fn out_of_range_var_is_nan() {
        let e = Expr::Var(3);
        assert!(e.eval(0.0, &[1.0], &[], &[]).is_nan());
    }

    #[test]
    fn null_is_nan() {
        assert!(Expr::Null.eval(0.0, &[], &[], &[]).is_nan());
    }
}
