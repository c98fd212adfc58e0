//! Expression island: one generational loop over expressions.
//!
//! `init → (eval → select → report → migrate → breed)* → stopped`. The
//! island scores broods against the latest published predictor subsets,
//! reduces each brood to one parent, Pareto-sorts, exchanges migrants
//! with its ring neighbors, and reports its best parents upward.

use std::io::Write;
use std::path::Path;
use std::sync::mpsc::TryRecvError;
use std::sync::Arc;

use atoll::Rng;
use atoll_expr::{gen, IpreTrie, TreeParams};
use tracing::warn;

use crate::comm::{Command, EqnChannels, GenUpdate};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::fitness::{bad_pred, bad_train, calc_pred_err, calc_train_err};
use crate::logs::IsleLogs;
use crate::problem::{ExprReport, PntSubset, Problem, ReportVec};
use crate::select::{best_by_pred, pareto_sort};

pub struct EqnIsle {
    id: usize,
    gen: u64,
    rng: Rng,
    stop: bool,

    chans: EqnChannels,

    num_eqns: usize,
    brood_sz: usize,
    cross_rate: f64,
    mutate_rate: f64,
    mig_epoch: u64,
    mig_count: usize,
    rpt_epoch: u64,
    rpt_count: usize,

    tree: TreeParams,
    trie: IpreTrie,

    prob: Arc<Problem>,
    ssets: Arc<Vec<PntSubset>>,

    parents: ReportVec,
    brood: Vec<ReportVec>,
    pareto: ReportVec,
    migrants: ReportVec,

    neqns: u64,
    min_error: f64,

    logs: IsleLogs,
}

impl EqnIsle {
    pub fn new(
        id: usize,
        cfg: &SearchConfig,
        tree: TreeParams,
        prob: Arc<Problem>,
        chans: EqnChannels,
        rng: Rng,
        log_root: &Path,
    ) -> Result<Self, SearchError> {
        let logs = IsleLogs::create(&log_root.join(format!("eisle{id}")))?;
        Ok(Self {
            id,
            gen: 0,
            rng,
            stop: false,
            chans,
            num_eqns: cfg.num_eqns,
            brood_sz: cfg.eqn_brood_sz,
            cross_rate: cfg.eqn_cross_rate,
            mutate_rate: cfg.eqn_mutate_rate,
            mig_epoch: cfg.eqn_mig_epoch,
            mig_count: cfg.eqn_mig_count,
            rpt_epoch: cfg.eqn_rpt_epoch,
            rpt_count: cfg.eqn_rpt_count,
            tree,
            trie: IpreTrie::new(),
            prob,
            ssets: Arc::new(Vec::new()),
            parents: Vec::new(),
            brood: Vec::new(),
            pareto: Vec::new(),
            migrants: Vec::new(),
            neqns: 0,
            min_error: 1e6,
            logs,
        })
    }

    /// Generate and evaluate the initial broods on the full training set,
    /// seed the parents from the Pareto front, and send the first report.
    pub fn init(&mut self) -> Result<(), SearchError> {
        let _ = writeln!(self.logs.main, "init eqn island {}", self.id);

        self.parents = vec![None; self.num_eqns];
        self.pareto = vec![None; self.num_eqns];
        self.brood = Vec::with_capacity(self.num_eqns);
        for i in 0..self.num_eqns {
            let mut brood: ReportVec = Vec::with_capacity(self.brood_sz);
            for j in 0..self.brood_sz {
                let expr = gen::gen_expr(&mut self.tree, &mut self.rng)?;
                self.account(&expr);
                let mut report = ExprReport::new(expr);
                report.proc_id = self.id;
                report.unit_id = i * self.brood_sz + j;
                let _ = writeln!(self.logs.eqns, "init {i}.{j}: {}", report.expr);
                brood.push(Some(report));
            }
            self.brood.push(brood);
        }

        // score on the full training data; prediction error starts as
        // training error so the brood reduction works before any subsets
        // have been published
        for brood in &mut self.brood {
            calc_train_err(brood, &self.prob);
            for slot in brood.iter_mut() {
                if let Some(r) = slot {
                    r.pred_err = r.train_err;
                    r.pred_hits = r.train_hits;
                }
                if slot.as_ref().is_some_and(bad_train) {
                    *slot = None;
                }
            }
        }

        self.select_brood_to_pareto();
        pareto_sort(&mut self.pareto, |r| r.train_err);
        for i in 0..self.num_eqns {
            self.parents[i] = self.pareto[i].clone();
        }

        self.report();
        self.breed()?;
        self.logs.flush_all();
        Ok(())
    }

    /// The island's generational loop; consumes the island.
    pub fn run(mut self) {
        self.messages();
        while !self.stop {
            if let Err(e) = self.step() {
                let _ = writeln!(self.logs.err, "island {} stopping: {e}", self.id);
                warn!(isle = self.id, error = %e, "eqn island failed");
                break;
            }
            self.messages();
        }
        let _ = writeln!(self.logs.main, "eqn island {} exiting at gen {}", self.id, self.gen);
        self.logs.flush_all();
    }

    fn step(&mut self) -> Result<(), SearchError> {
        self.eval();
        self.selecting();
        self.gen += 1;
        self.report();
        self.migrate();
        self.breed()?;
        let _ = self.chans.gen.try_send(GenUpdate {
            isle: self.id,
            gen: self.gen,
        });
        self.logs.flush_all();
        Ok(())
    }

    /// Drain every receiver without blocking.
    fn messages(&mut self) {
        match self.chans.cmd.try_recv() {
            Ok(Command::Stop) | Err(TryRecvError::Disconnected) => {
                self.stop = true;
                return;
            }
            Err(TryRecvError::Empty) => {}
        }
        while let Ok(migs) = self.chans.mig_in.try_recv() {
            let _ = writeln!(
                self.logs.main,
                "island {} received {} migrants at gen {}",
                self.id,
                migs.len(),
                self.gen
            );
            self.migrants.extend(migs);
        }
        while let Ok(ssets) = self.chans.ssets.try_recv() {
            let _ = writeln!(
                self.logs.sset,
                "island {} received {} subsets at gen {}",
                self.id,
                ssets.len(),
                self.gen
            );
            self.ssets = ssets;
        }
    }

    /// Score the current broods against the predictor subsets.
    fn eval(&mut self) {
        for brood in &mut self.brood {
            calc_pred_err(brood, &self.ssets, &self.prob);
            for slot in brood.iter_mut() {
                if slot.as_ref().is_some_and(bad_pred) {
                    *slot = None;
                }
            }
        }
    }

    /// Brood reduction, migrant absorption, Pareto selection of parents.
    fn selecting(&mut self) {
        self.select_brood_to_pareto();

        let plen = self.pareto.len();
        let migrants: ReportVec = self.migrants.drain(..).collect();
        self.pareto.extend(migrants);

        pareto_sort(&mut self.pareto, |r| r.pred_err);
        for i in 0..self.num_eqns {
            self.parents[i] = self.pareto[i].clone();
        }
        self.pareto.truncate(plen);
    }

    fn select_brood_to_pareto(&mut self) {
        for (i, brood) in self.brood.iter_mut().enumerate() {
            self.pareto[i] = best_by_pred(brood).and_then(|k| brood[k].take());
        }
    }

    /// Log fitness every generation; send the top parents upward every
    /// report epoch.
    fn report(&mut self) {
        let mut rpt: ReportVec = Vec::with_capacity(self.rpt_count);
        let mut err_sum = 0.0;
        let mut err_cnt = 0usize;
        for parent in self.parents.iter().flatten() {
            if rpt.len() >= self.rpt_count {
                break;
            }
            if parent.pred_err >= 0.0 {
                if parent.pred_err < self.min_error {
                    self.min_error = parent.pred_err;
                }
                err_sum += parent.pred_err;
                err_cnt += 1;
            }
            rpt.push(Some(parent.clone()));
        }
        rpt.resize_with(self.rpt_count, || None);

        let _ = writeln!(
            self.logs.fitness,
            "{} {} {} {} {} {}",
            self.gen,
            self.neqns,
            self.trie.cnt(),
            self.trie.vst(),
            err_sum / err_cnt as f64,
            self.min_error,
        );

        if self.gen % self.rpt_epoch == 0 {
            let _ = writeln!(
                self.logs.main,
                "island {} reporting at gen {}",
                self.id, self.gen
            );
            for r in rpt.iter().flatten() {
                let _ = writeln!(
                    self.logs.eqns,
                    "{} {} {:.6} {}",
                    self.gen, r.size, r.pred_err, r.expr
                );
            }
            let _ = self.chans.rpt.try_send(rpt);
        }
    }

    /// Send cloned parents to both ring neighbors every migration epoch.
    fn migrate(&mut self) {
        if self.gen % self.mig_epoch != 0 || self.chans.mig_out.is_empty() {
            return;
        }
        for neighbor in &self.chans.mig_out {
            let mig: ReportVec = self
                .parents
                .iter()
                .flatten()
                .take(self.mig_count)
                .cloned()
                .map(Some)
                .collect();
            let _ = neighbor.try_send(mig);
        }
    }

    /// Refill every brood slot with offspring of tournament-selected
    /// parents.
    fn breed(&mut self) -> Result<(), SearchError> {
        let ne = self.num_eqns;
        let sysvals: Vec<f64> = self
            .prob
            .train
            .first()
            .map(|ds| ds.sys_vals().to_vec())
            .unwrap_or_default();

        for e in 0..ne {
            let Some((p1, p2)) = self.pick_parents(ne) else {
                let _ = writeln!(
                    self.logs.err,
                    "island {}: no usable parents at gen {}",
                    self.id, self.gen
                );
                break;
            };

            for b in 0..self.brood_sz {
                let expr = self.produce(&p1, &p2, &sysvals)?;
                self.account(&expr);
                let mut report = ExprReport::new(expr);
                report.proc_id = self.id;
                report.iter_id = self.gen;
                report.unit_id =
                    self.gen as usize * (ne * self.brood_sz) + e * self.brood_sz + b;
                self.brood[e][b] = Some(report);
            }
        }
        Ok(())
    }

    /// Two binary tournaments on the rank-ordered parents; lower index
    /// wins. Retries around discarded slots.
    fn pick_parents(&mut self, ne: usize) -> Option<(atoll_expr::Expr, atoll_expr::Expr)> {
        for _ in 0..1000 {
            let r1 = self.rng.below(ne).min(self.rng.below(ne));
            let r2 = self.rng.below(ne).min(self.rng.below(ne));
            let (Some(p1), Some(p2)) = (&self.parents[r1], &self.parents[r2]) else {
                continue;
            };
            return Some((p1.expr.clone(), p2.expr.clone()));
        }
        None
    }

    /// One production: cross or inject, maybe mutate, simplify, check;
    /// retry until a candidate is accepted.
    fn produce(
        &mut self,
        p1: &atoll_expr::Expr,
        p2: &atoll_expr::Expr,
        sysvals: &[f64],
    ) -> Result<atoll_expr::Expr, SearchError> {
        for _ in 0..gen::RETRY_LIMIT {
            let mut child = if self.rng.bernoulli(self.cross_rate) {
                gen::cross(p1, p2, &mut self.rng)
            } else {
                gen::inject_subtree_fair(p1, &mut self.tree, &mut self.rng)
            };
            if self.rng.bernoulli(self.mutate_rate) {
                gen::mutate(&mut child, &self.tree, sysvals, &mut self.rng);
            }
            let Some(simplified) = child.simplify(&self.tree.rules) else {
                continue;
            };
            self.tree.reset_curr();
            self.tree.reset_temp();
            if self.tree.check_expr(&simplified) {
                return Ok(simplified);
            }
        }
        Err(SearchError::Degenerate(format!(
            "island {}: breeding rejected {} candidates in a row",
            self.id,
            gen::RETRY_LIMIT
        )))
    }

    /// Novelty accounting for one accepted expression.
    fn account(&mut self, expr: &atoll_expr::Expr) {
        self.neqns += 1;
        let mut serial = Vec::with_capacity(64);
        expr.serial(&mut serial);
        self.trie.insert(&serial);
    }
}
