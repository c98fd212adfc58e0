//! The problem description and the shared data model of the search:
//! individuals, point statistics, and predictor subsets.

use atoll::DataSet;
use atoll_expr::{Expr, TreeParams};

/// What kind of search this is.
///
/// `Diffeq` evaluates expressions against the offset independent slice
/// (the first independent is the integration variable); a proper
/// integrator is a declared extension point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchKind {
    Benchmark,
    Diffeq,
}

/// Static inputs to a search run.
#[derive(Clone, Debug)]
pub struct Problem {
    pub train: Vec<DataSet>,
    pub test: Vec<DataSet>,
    pub kind: SearchKind,
    /// Index of the dependent variable to predict.
    pub search_var: usize,
    /// Absolute error below which a prediction counts as a hit.
    pub hit_ratio: f64,
    /// Template tree parameters; islands clone and specialize these.
    pub tree: TreeParams,
}

impl Problem {
    /// Assemble a problem, inferring the usable variables and dimension
    /// counts from the first training dataset when not preset.
    pub fn new(
        train: Vec<DataSet>,
        test: Vec<DataSet>,
        kind: SearchKind,
        hit_ratio: f64,
        mut tree: TreeParams,
    ) -> Self {
        if let Some(first) = train.first() {
            if tree.usable_vars.is_empty() {
                tree.usable_vars = (0..first.dims()).collect();
            }
            tree.num_dim = first.dims();
            tree.num_sys = first.sys_vals().len();
        }
        Self {
            train,
            test,
            kind,
            search_var: 0,
            hit_ratio,
            tree,
        }
    }
}

/// An individual: an expression plus its evaluation bookkeeping.
#[derive(Clone, Debug)]
pub struct ExprReport {
    pub expr: Expr,
    /// Cached node count of `expr`.
    pub size: usize,
    /// Coefficient values for `Constant` slots (no fitter; seeded at 1).
    pub coeff: Vec<f64>,

    pub train_err: f64,
    pub train_hits: usize,
    pub train_err_by_set: Vec<f64>,
    pub train_hits_by_set: Vec<usize>,

    /// Error against the current predictor subsets.
    pub pred_err: f64,
    pub pred_hits: usize,

    pub test_err: f64,
    pub test_hits: usize,
    pub test_err_by_set: Vec<f64>,
    pub test_hits_by_set: Vec<usize>,

    /// Originating island.
    pub proc_id: usize,
    /// Generation the individual was bred in.
    pub iter_id: u64,
    /// Position within that generation's production.
    pub unit_id: usize,
}

impl ExprReport {
    /// Wrap a simplified expression. Errors start at -1 (actual errors
    /// are never negative).
    pub fn new(expr: Expr) -> Self {
        let size = expr.size();
        let coeff = vec![1.0; expr.coeff_count()];
        Self {
            expr,
            size,
            coeff,
            train_err: -1.0,
            train_hits: 0,
            train_err_by_set: Vec::new(),
            train_hits_by_set: Vec::new(),
            pred_err: -1.0,
            pred_hits: 0,
            test_err: -1.0,
            test_hits: 0,
            test_err_by_set: Vec::new(),
            test_hits_by_set: Vec::new(),
            proc_id: 0,
            iter_id: 0,
            unit_id: 0,
        }
    }
}

/// Populations and report batches: `None` marks a discarded slot.
pub type ReportVec = Vec<Option<ExprReport>>;

/// Per-point error statistics across the current set of top expressions.
#[derive(Clone, Copy, Debug)]
pub struct PntStats {
    pub ave_err: f64,
    /// Squared-deviation sum around the mean (variance proxy).
    pub variance: f64,
    pub min_err: f64,
    pub max_err: f64,
}

impl Default for PntStats {
    fn default() -> Self {
        Self {
            ave_err: 0.0,
            variance: 0.0,
            min_err: f64::INFINITY,
            max_err: f64::NEG_INFINITY,
        }
    }
}

/// `[dataset][point]` grid of point statistics.
pub type PntStatsGrid = Vec<Vec<PntStats>>;

/// A published predictor subset: point positions within one training
/// dataset (duplicates allowed).
#[derive(Clone, Debug)]
pub struct PntSubset {
    pub dataset: usize,
    pub indices: Vec<usize>,
}

/// A predictor-island population member: a subset plus its objectives.
#[derive(Clone, Debug, Default)]
pub struct SubsetMem {
    pub dataset: usize,
    pub indices: Vec<usize>,
    pub err: f64,
    pub variance: f64,
}

impl SubsetMem {
    /// Build the published view of this member.
    pub fn to_subset(&self) -> PntSubset {
        PntSubset {
            dataset: self.dataset,
            indices: self.indices.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_infers_dims() {
        let ds = DataSet::parse("a b y\n1 2 3\n4 5 6\n").unwrap();
        let prob = Problem::new(
            vec![ds.clone()],
            vec![ds],
            SearchKind::Benchmark,
            0.01,
            TreeParams::default(),
        );
        assert_eq!(prob.tree.usable_vars, vec![0, 1]);
        assert_eq!(prob.tree.num_dim, 2);
    }

    #[test]
    fn report_caches_size_and_coeffs() {
        let e = Expr::Add(vec![
            Expr::Mul(vec![Expr::Constant(0), Expr::Var(0)]),
            Expr::Constant(1),
        ]);
        let r = ExprReport::new(e);
        assert_eq!(r.size, 5);
        assert_eq!(r.coeff, vec![1.0, 1.0]);
        assert_eq!(r.train_err, -1.0);
    }
}
