//! Selection: brood reduction, report-queue ordering, and the size-error
//! Pareto sort.

use std::cmp::Ordering;

use crate::problem::{ExprReport, ReportVec};

/// Which ordering a [`ReportQueue`] applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKind {
    /// Leave the queue untouched.
    Null,
    /// Size-error Pareto on prediction error.
    Pareto,
    /// Structural order (used for duplicate detection).
    Eqn,
    ParetoTrainErr,
    ParetoPredErr,
    ParetoTestErr,
}

/// A population queue with a configured sort.
pub struct ReportQueue {
    queue: ReportVec,
    kind: SortKind,
}

impl ReportQueue {
    pub fn from_vec(queue: ReportVec) -> Self {
        Self {
            queue,
            kind: SortKind::Null,
        }
    }

    pub fn with_len(n: usize) -> Self {
        Self::from_vec(vec![None; n])
    }

    pub fn set_sort(&mut self, kind: SortKind) {
        self.kind = kind;
    }

    pub fn queue(&self) -> &[Option<ExprReport>] {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut ReportVec {
        &mut self.queue
    }

    pub fn into_vec(self) -> ReportVec {
        self.queue
    }

    /// Apply the configured sort.
    pub fn sort(&mut self) {
        match self.kind {
            SortKind::Null => {}
            SortKind::Eqn => eqn_sort(&mut self.queue),
            SortKind::Pareto | SortKind::ParetoPredErr => {
                pareto_sort(&mut self.queue, |r| r.pred_err)
            }
            SortKind::ParetoTrainErr => pareto_sort(&mut self.queue, |r| r.train_err),
            SortKind::ParetoTestErr => pareto_sort(&mut self.queue, |r| r.test_err),
        }
    }
}

/// Sort by structural order, `None` entries last.
pub fn eqn_sort(queue: &mut ReportVec) {
    queue.sort_by(|a, b| match (a, b) {
        (Some(x), Some(y)) => x.expr.cmp_structure(&y.expr),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// In each brood, the index of the member with the lowest prediction
/// error (the brood→parent reduction).
pub fn best_by_pred(brood: &[Option<ExprReport>]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, slot) in brood.iter().enumerate() {
        let Some(r) = slot else { continue };
        match best {
            None => best = Some(i),
            Some(b) => {
                if let Some(cur) = &brood[b] {
                    if r.pred_err < cur.pred_err {
                        best = Some(i);
                    }
                }
            }
        }
    }
    best
}

/// Size-error Pareto sort.
///
/// First orders by (size ascending, error ascending, structural order),
/// then repeatedly extracts the non-dominated staircase: walking forward,
/// a candidate joins the current front only when its size is strictly
/// greater and its error strictly less than the running best. Fronts are
/// written back first-front-first; `None` padding trails.
pub fn pareto_sort(queue: &mut ReportVec, err: impl Fn(&ExprReport) -> f64) {
    let n = queue.len();
    let mut remaining: Vec<ExprReport> = queue.drain(..).flatten().collect();
    remaining.sort_by(|a, b| {
        a.size
            .cmp(&b.size)
            .then_with(|| err(a).partial_cmp(&err(b)).unwrap_or(Ordering::Equal))
            .then_with(|| a.expr.cmp_structure(&b.expr))
    });

    let mut out: ReportVec = Vec::with_capacity(n);
    while !remaining.is_empty() {
        let front = extract_front(&mut remaining, &err);
        out.extend(front.into_iter().map(Some));
    }
    out.resize_with(n, || None);
    *queue = out;
}

/// Pull the leading non-dominated staircase out of a sorted list.
fn extract_front(
    remaining: &mut Vec<ExprReport>,
    err: &impl Fn(&ExprReport) -> f64,
) -> Vec<ExprReport> {
    let mut front = Vec::new();
    let mut rest = Vec::new();
    let mut iter = remaining.drain(..);
    let Some(first) = iter.next() else {
        return front;
    };
    let mut c_size = first.size;
    let mut c_score = err(&first);
    let mut last = first;
    for e in iter {
        if e.size > c_size {
            c_size = e.size;
            let score = err(&e);
            if score < c_score {
                c_score = score;
                front.push(std::mem::replace(&mut last, e));
                continue;
            }
        }
        rest.push(e);
    }
    front.push(last);
    *remaining = rest;
    front
}

#[cfg(test)]
mod tests {
    use super::*;
    use atoll_expr::Expr;

    fn rpt(size_vars: usize, pred_err: f64) -> Option<ExprReport> {
        // build an expression with `size_vars` nodes (a chain of Neg)
        let mut e = Expr::Var(0);
        for _ in 1..size_vars {
            e = Expr::Neg(Box::new(e));
        }
        let mut r = ExprReport::new(e);
        r.pred_err = pred_err;
        Some(r)
    }

    #[test]
    fn brood_reduction_picks_lowest_pred() {
        let brood = vec![rpt(1, 3.0), None, rpt(2, 1.0), rpt(3, 2.0)];
        assert_eq!(best_by_pred(&brood), Some(2));
        assert_eq!(best_by_pred(&[None, None]), None);
    }

    #[test]
    fn pareto_front_is_nondominated() {
        let mut queue = vec![
            rpt(1, 5.0),
            rpt(2, 4.0),
            rpt(3, 4.5), // dominated by (2, 4.0)? larger and worse: not on front
            rpt(4, 2.0),
            rpt(5, 2.5), // dominated by (4, 2.0)
            rpt(6, 1.0),
        ];
        pareto_sort(&mut queue, |r| r.pred_err);
        // first front: sizes 1, 2, 4, 6 with strictly decreasing errors
        let front: Vec<(usize, f64)> = queue
            .iter()
            .flatten()
            .take(4)
            .map(|r| (r.size, r.pred_err))
            .collect();
        assert_eq!(
            front,
            vec![(1, 5.0), (2, 4.0), (4, 2.0), (6, 1.0)]
        );
        // no survivor in the front dominates another
        for a in &front {
            for b in &front {
                if a != b {
                    let dominated = a.0 >= b.0 && a.1 <= b.1;
                    assert!(!dominated || (a.0 == b.0 && a.1 == b.1));
                }
            }
        }
    }

    #[test]
    fn pareto_preserves_population() {
        let mut queue = vec![
            rpt(3, 1.0),
            None,
            rpt(1, 2.0),
            rpt(2, 0.5),
            None,
            rpt(4, 0.1),
        ];
        let some_before = queue.iter().flatten().count();
        pareto_sort(&mut queue, |r| r.pred_err);
        assert_eq!(queue.len(), 6);
        assert_eq!(queue.iter().flatten().count(), some_before);
        // None padding trails
        assert!(queue[some_before..].iter().all(Option::is_none));
    }

    #[test]
    fn pareto_ties_break_structurally() {
        let mut queue = vec![rpt(2, 1.0), rpt(2, 1.0)];
        pareto_sort(&mut queue, |r| r.pred_err);
        assert_eq!(queue.iter().flatten().count(), 2);
    }

    #[test]
    fn eqn_sort_groups_duplicates() {
        let a = rpt(2, 1.0);
        let b = rpt(3, 2.0);
        let mut queue = vec![b.clone(), None, a.clone(), b.clone(), a];
        eqn_sort(&mut queue);
        let sizes: Vec<usize> = queue.iter().flatten().map(|r| r.size).collect();
        assert_eq!(sizes, vec![2, 2, 3, 3]);
        assert!(queue[4].is_none());
    }

    #[test]
    fn queue_sort_dispatch() {
        let mut q = ReportQueue::from_vec(vec![rpt(2, 2.0), rpt(1, 1.0)]);
        q.set_sort(SortKind::ParetoPredErr);
        q.sort();
        assert_eq!(q.queue()[0].as_ref().map(|r| r.size), Some(1));
    }
}
