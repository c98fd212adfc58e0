//! Fitness evaluation over train, test, and predictor subsets.
//!
//! Per-point NaN results are skipped and the effective point count
//! decremented; individuals whose aggregated error exceeds `1e9` or is
//! non-finite are nulled out by the caller via the `bad_*` filters.

use atoll::dataset::Point;

use crate::problem::{
    ExprReport, PntStats, PntStatsGrid, PntSubset, Problem, SearchKind,
};

const ERR_CEILING: f64 = 1e9;

/// Evaluate one individual at one point, honoring the search kind.
fn eval_report(r: &ExprReport, kind: SearchKind, point: &Point, sysvals: &[f64]) -> f64 {
    let indeps = point.indeps();
    match kind {
        SearchKind::Benchmark => r.expr.eval(0.0, indeps, &r.coeff, sysvals),
        SearchKind::Diffeq => {
            let offset = indeps.get(1..).unwrap_or(&[]);
            r.expr.eval(0.0, offset, &r.coeff, sysvals)
        }
    }
}

/// Score a population against the current predictor subsets.
pub fn calc_pred_err(pop: &mut [Option<ExprReport>], ssets: &[PntSubset], prob: &Problem) {
    for slot in pop.iter_mut() {
        let Some(r) = slot else { continue };
        let mut tnp = 0i64;
        let mut err_sum = 0.0;
        let mut hits = 0;
        for s in ssets {
            let ds = &prob.train[s.dataset];
            tnp += s.indices.len() as i64;
            for &p in &s.indices {
                let point = ds.point(p);
                let ret = eval_report(r, prob.kind, point, ds.sys_vals());
                let err = point.depnd(prob.search_var) - ret;
                if err.is_nan() {
                    tnp -= 1;
                    continue;
                }
                let aerr = err.abs();
                if aerr < prob.hit_ratio {
                    hits += 1;
                }
                err_sum += aerr;
            }
        }
        r.pred_err = err_sum / tnp as f64;
        r.pred_hits = hits;
    }
}

/// Score a population on the full training data, recording per-dataset
/// breakdowns.
pub fn calc_train_err(pop: &mut [Option<ExprReport>], prob: &Problem) {
    for slot in pop.iter_mut() {
        let Some(r) = slot else { continue };
        let mut tnp = 0i64;
        let mut err_sum = 0.0;
        let mut hits = 0;
        let mut err_by_set = vec![0.0; prob.train.len()];
        let mut hits_by_set = vec![0usize; prob.train.len()];
        for (d, ds) in prob.train.iter().enumerate() {
            let dnp = ds.num_points();
            tnp += dnp as i64;
            for point in ds.points() {
                let ret = eval_report(r, prob.kind, point, ds.sys_vals());
                if ret.is_nan() {
                    tnp -= 1;
                    continue;
                }
                let err = point.depnd(prob.search_var) - ret;
                if err.is_nan() {
                    tnp -= 1;
                    continue;
                }
                let aerr = err.abs();
                if aerr < prob.hit_ratio {
                    hits += 1;
                    hits_by_set[d] += 1;
                }
                err_sum += aerr;
                err_by_set[d] += aerr;
            }
            err_by_set[d] /= dnp as f64;
        }
        r.train_err = err_sum / tnp as f64;
        r.train_hits = hits;
        r.train_err_by_set = err_by_set;
        r.train_hits_by_set = hits_by_set;
    }
}

/// Score a population on the held-out test data.
pub fn calc_test_err(pop: &mut [Option<ExprReport>], prob: &Problem) {
    for slot in pop.iter_mut() {
        let Some(r) = slot else { continue };
        let mut tnp = 0i64;
        let mut err_sum = 0.0;
        let mut hits = 0;
        let mut err_by_set = vec![0.0; prob.test.len()];
        let mut hits_by_set = vec![0usize; prob.test.len()];
        for (d, ds) in prob.test.iter().enumerate() {
            let dnp = ds.num_points();
            tnp += dnp as i64;
            for point in ds.points() {
                let ret = eval_report(r, prob.kind, point, ds.sys_vals());
                let err = point.depnd(prob.search_var) - ret;
                if err.is_nan() {
                    tnp -= 1;
                    continue;
                }
                let aerr = err.abs();
                if aerr < prob.hit_ratio {
                    hits += 1;
                    hits_by_set[d] += 1;
                }
                err_sum += aerr;
                err_by_set[d] += aerr;
            }
            err_by_set[d] /= dnp as f64;
        }
        r.test_err = err_sum / tnp as f64;
        r.test_hits = hits;
        r.test_err_by_set = err_by_set;
        r.test_hits_by_set = hits_by_set;
    }
}

/// The dual direction: aggregate across the population to produce
/// per-point statistics over every training point.
pub fn calc_eqn_errs(pop: &[Option<ExprReport>], prob: &Problem) -> PntStatsGrid {
    let neqns = pop.iter().flatten().count();
    let mut grid: PntStatsGrid = prob
        .train
        .iter()
        .map(|ds| vec![PntStats::default(); ds.num_points()])
        .collect();

    for (d, ds) in prob.train.iter().enumerate() {
        for (p, point) in ds.points().iter().enumerate() {
            let stat = &mut grid[d][p];
            let mut errs = Vec::with_capacity(neqns);
            for r in pop.iter().flatten() {
                let ret = eval_report(r, prob.kind, point, ds.sys_vals());
                let err = point.depnd(prob.search_var) - ret;
                if err.is_nan() {
                    continue;
                }
                let aerr = err.abs();
                stat.ave_err += aerr;
                stat.min_err = stat.min_err.min(aerr);
                stat.max_err = stat.max_err.max(aerr);
                errs.push(aerr);
            }
            stat.ave_err /= neqns as f64;
            stat.variance = errs
                .iter()
                .map(|e| (e - stat.ave_err) * (e - stat.ave_err))
                .sum();
        }
    }
    grid
}

/// Whether an individual's prediction error disqualifies it.
pub fn bad_pred(r: &ExprReport) -> bool {
    r.pred_err > ERR_CEILING || r.pred_err.is_infinite() || r.pred_err.is_nan()
}

/// Whether an individual's training error disqualifies it.
pub fn bad_train(r: &ExprReport) -> bool {
    r.train_err > ERR_CEILING || r.train_err.is_infinite() || r.train_err.is_nan()
}

/// Whether an individual's test error disqualifies it.
pub fn bad_test(r: &ExprReport) -> bool {
    r.test_err > ERR_CEILING || r.test_err.is_infinite() || r.test_err.is_nan()
}

#[cfg(test)]
mod tests {
    use super::*;
    use atoll::DataSet;
    use atoll_expr::{Expr, TreeParams};

    fn line_problem() -> Problem {
        // y = 2*x over x in 0..10
        let mut text = String::from("x y\n");
        for i in 0..10 {
            let x = i as f64;
            text.push_str(&format!("{x} {}\n", 2.0 * x));
        }
        let ds = DataSet::parse(&text).unwrap();
        Problem::new(
            vec![ds.clone()],
            vec![ds],
            SearchKind::Benchmark,
            0.1,
            TreeParams::default(),
        )
    }

    fn report(e: Expr) -> Option<ExprReport> {
        Some(ExprReport::new(e))
    }

    #[test]
    fn exact_expression_has_zero_train_err() {
        let prob = line_problem();
        let mut pop = vec![report(Expr::Mul(vec![
            Expr::ConstantF(2.0),
            Expr::Var(0),
        ]))];
        calc_train_err(&mut pop, &prob);
        let r = pop[0].as_ref().unwrap();
        assert!(r.train_err.abs() < 1e-12);
        assert_eq!(r.train_hits, 10);
        assert_eq!(r.train_err_by_set.len(), 1);
    }

    #[test]
    fn hit_counting_matches_threshold() {
        let prob = line_problem();
        // y_hat = 2x + 0.05: every point within 0.1
        let close = report(Expr::Add(vec![
            Expr::Mul(vec![Expr::ConstantF(2.0), Expr::Var(0)]),
            Expr::ConstantF(0.05),
        ]));
        // y_hat = 2x + 5: no hits
        let far = report(Expr::Add(vec![
            Expr::Mul(vec![Expr::ConstantF(2.0), Expr::Var(0)]),
            Expr::ConstantF(5.0),
        ]));
        let mut pop = vec![close, far];
        calc_test_err(&mut pop, &prob);
        assert_eq!(pop[0].as_ref().unwrap().test_hits, 10);
        assert_eq!(pop[1].as_ref().unwrap().test_hits, 0);
    }

    #[test]
    fn nan_points_decrement_denominator() {
        let prob = line_problem();
        // log(x - 5): NaN for x < 5 (5 points), finite for x > 5; x=5 -> -inf
        let mut pop = vec![report(Expr::Log(Box::new(Expr::Add(vec![
            Expr::Var(0),
            Expr::ConstantF(-5.0),
        ]))))];
        calc_train_err(&mut pop, &prob);
        let r = pop[0].as_ref().unwrap();
        // not NaN: the NaN points were skipped, infinite error remains
        assert!(!r.train_err.is_nan());
    }

    #[test]
    fn pred_err_over_subsets() {
        let prob = line_problem();
        let ssets = vec![PntSubset {
            dataset: 0,
            indices: vec![0, 2, 4],
        }];
        // y_hat = x: error |2x - x| = x at each subset point -> (0+2+4)/3
        let mut pop = vec![report(Expr::Var(0))];
        calc_pred_err(&mut pop, &ssets, &prob);
        let r = pop[0].as_ref().unwrap();
        assert!((r.pred_err - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_subsets_yield_nan_pred_err() {
        let prob = line_problem();
        let mut pop = vec![report(Expr::Var(0))];
        calc_pred_err(&mut pop, &[], &prob);
        let r = pop[0].as_ref().unwrap();
        assert!(r.pred_err.is_nan());
        assert!(bad_pred(r));
    }

    #[test]
    fn eqn_errs_grid_shape_and_means() {
        let prob = line_problem();
        // two expressions: y_hat = x (error x) and y_hat = 3x (error x)
        let pop = vec![
            report(Expr::Var(0)),
            report(Expr::Mul(vec![Expr::ConstantF(3.0), Expr::Var(0)])),
        ];
        let grid = calc_eqn_errs(&pop, &prob);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0].len(), 10);
        // at point x=4 both errors are 4 -> mean 4, variance 0
        let s = &grid[0][4];
        assert!((s.ave_err - 4.0).abs() < 1e-12);
        assert!(s.variance.abs() < 1e-12);
        assert_eq!(s.min_err, 4.0);
        assert_eq!(s.max_err, 4.0);
    }

    #[test]
    fn bad_filters() {
        let mut r = ExprReport::new(Expr::Var(0));
        r.pred_err = 2e9;
        assert!(bad_pred(&r));
        r.pred_err = f64::NAN;
        assert!(bad_pred(&r));
        r.pred_err = 0.5;
        assert!(!bad_pred(&r));
        r.train_err = f64::INFINITY;
        assert!(bad_train(&r));
        r.test_err = 1.0;
        assert!(!bad_test(&r));
    }
}
