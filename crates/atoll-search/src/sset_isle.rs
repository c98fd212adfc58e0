//! Predictor island: evolves training-point subsets.
//!
//! Each training dataset carries its own sub-population of fixed-length
//! index subsets. A subset's objectives are the means of the published
//! per-point statistics at its indices: low average error and high
//! error variance. Selection alternates the objective per generation so
//! both are optimized.

use std::io::Write;
use std::path::Path;
use std::sync::mpsc::TryRecvError;
use std::sync::Arc;

use atoll::Rng;

use crate::comm::{Command, GenUpdate, SSetChannels};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::logs::IsleLogs;
use crate::problem::{PntStatsGrid, Problem, SubsetMem};

pub struct SSetIsle {
    id: usize,
    gen: u64,
    rng: Rng,
    stop: bool,

    chans: SSetChannels,

    num_ssets: usize,
    sset_size: usize,
    brood_sz: usize,
    cross_rate: f64,
    mutate_rate: f64,
    mig_epoch: u64,
    mig_count: usize,
    rpt_epoch: u64,
    rpt_count: usize,

    prob: Arc<Problem>,
    pnts: Arc<PntStatsGrid>,

    // outer index is the training dataset
    parents: Vec<Vec<SubsetMem>>,
    brood: Vec<Vec<Vec<SubsetMem>>>,
    pareto: Vec<Vec<SubsetMem>>,
    migrants: Vec<Vec<SubsetMem>>,

    logs: IsleLogs,
}

impl SSetIsle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        cfg: &SearchConfig,
        prob: Arc<Problem>,
        pnts: Arc<PntStatsGrid>,
        chans: SSetChannels,
        rng: Rng,
        log_root: &Path,
    ) -> Result<Self, SearchError> {
        let logs = IsleLogs::create(&log_root.join(format!("sisle{id}")))?;
        let nd = prob.train.len();
        Ok(Self {
            id,
            gen: 0,
            rng,
            stop: false,
            chans,
            num_ssets: cfg.num_ssets,
            sset_size: cfg.sset_size,
            brood_sz: cfg.sset_brood_sz,
            cross_rate: cfg.sset_cross_rate,
            mutate_rate: cfg.sset_mutate_rate,
            mig_epoch: cfg.sset_mig_epoch,
            mig_count: cfg.sset_mig_count,
            rpt_epoch: cfg.sset_rpt_epoch,
            rpt_count: cfg.sset_rpt_count,
            prob,
            pnts,
            parents: vec![Vec::new(); nd],
            brood: vec![Vec::new(); nd],
            pareto: vec![Vec::new(); nd],
            migrants: vec![Vec::new(); nd],
            logs,
        })
    }

    /// Seed random subsets, evaluate against the initial point stats, and
    /// send the first report.
    pub fn init(&mut self) -> Result<(), SearchError> {
        let _ = writeln!(self.logs.main, "init sset island {}", self.id);

        let nd = self.prob.train.len();
        for d in 0..nd {
            let npts = self.prob.train[d].num_points();
            self.parents[d] = vec![SubsetMem::default(); self.num_ssets];
            self.pareto[d] = vec![SubsetMem::default(); self.num_ssets];
            self.brood[d] = (0..self.num_ssets)
                .map(|_| {
                    (0..self.brood_sz)
                        .map(|_| SubsetMem {
                            dataset: d,
                            indices: (0..self.sset_size)
                                .map(|_| self.rng.below(npts))
                                .collect(),
                            err: 0.0,
                            variance: 0.0,
                        })
                        .collect()
                })
                .collect();
        }

        self.eval();
        self.selecting();

        let rpt = self.sample_report();
        let _ = self.chans.rpt.try_send(rpt);
        self.logs.flush_all();
        Ok(())
    }

    pub fn run(mut self) {
        self.messages();
        while !self.stop {
            self.step();
            self.messages();
        }
        let _ = writeln!(
            self.logs.main,
            "sset island {} exiting at gen {}",
            self.id, self.gen
        );
        self.logs.flush_all();
    }

    fn step(&mut self) {
        self.eval();
        self.selecting();
        self.gen += 1;
        self.report();
        self.migrate();
        self.breed();
        self.messages();
        let _ = self.chans.gen.try_send(GenUpdate {
            isle: self.id,
            gen: self.gen,
        });
        self.logs.flush_all();
    }

    fn messages(&mut self) {
        match self.chans.cmd.try_recv() {
            Ok(Command::Stop) | Err(TryRecvError::Disconnected) => {
                self.stop = true;
                return;
            }
            Err(TryRecvError::Empty) => {}
        }
        while let Ok(migs) = self.chans.mig_in.try_recv() {
            for (d, group) in migs.into_iter().enumerate() {
                if let Some(bucket) = self.migrants.get_mut(d) {
                    bucket.extend(group);
                }
            }
        }
        while let Ok(pnts) = self.chans.pnt_errs.try_recv() {
            let _ = writeln!(
                self.logs.main,
                "sset island {} received point stats at gen {}",
                self.id, self.gen
            );
            self.pnts = pnts;
        }
    }

    /// Score every brood member against the latest point stats.
    fn eval(&mut self) {
        for (d, stats) in self.pnts.iter().enumerate() {
            let Some(broods) = self.brood.get_mut(d) else { continue };
            for brood in broods.iter_mut() {
                for mem in brood.iter_mut() {
                    score_subset(mem, stats);
                }
            }
        }
    }

    /// Brood reduction with the alternating objective, migrant
    /// absorption, and the opposite-objective sort of the front.
    fn selecting(&mut self) {
        let even = self.gen % 2 == 0;
        for d in 0..self.brood.len() {
            for (b, brood) in self.brood[d].iter().enumerate() {
                if brood.is_empty() {
                    continue;
                }
                let mut best = 0;
                for (m, mem) in brood.iter().enumerate() {
                    let better = if even {
                        mem.err < brood[best].err
                    } else {
                        mem.variance > brood[best].variance
                    };
                    if better {
                        best = m;
                    }
                }
                self.pareto[d][b] = brood[best].clone();
            }

            let plen = self.pareto[d].len();
            let migrants: Vec<SubsetMem> = self.migrants[d].drain(..).collect();
            self.pareto[d].extend(migrants);

            if even {
                self.pareto[d].sort_by(by_variance_desc);
            } else {
                self.pareto[d].sort_by(by_err_asc);
            }

            for i in 0..self.num_ssets {
                self.parents[d][i] = self.pareto[d][i].clone();
            }
            self.pareto[d].truncate(plen);
        }
    }

    /// Sample reported subsets from the fronts: random dataset, random
    /// position among the best.
    fn sample_report(&mut self) -> Vec<SubsetMem> {
        let nd = self.pareto.len();
        let span = self.rpt_count.min(self.num_ssets);
        (0..self.rpt_count)
            .map(|_| {
                let d = self.rng.below(nd);
                let p = self.rng.below(span);
                self.pareto[d][p].clone()
            })
            .collect()
    }

    fn report(&mut self) {
        if self.gen % self.rpt_epoch != 0 {
            return;
        }
        let _ = writeln!(
            self.logs.main,
            "sset island {} reporting at gen {}",
            self.id, self.gen
        );
        let rpt = self.sample_report();
        for mem in &rpt {
            let _ = writeln!(
                self.logs.sset,
                "{} ds{} err {:.6} var {:.6} {:?}",
                self.gen, mem.dataset, mem.err, mem.variance, mem.indices
            );
        }
        let _ = self.chans.rpt.try_send(rpt);
    }

    fn migrate(&mut self) {
        if self.gen % self.mig_epoch != 0 || self.chans.mig_out.is_empty() {
            return;
        }
        let nd = self.pareto.len();
        let mut groups: Vec<Vec<SubsetMem>> = Vec::with_capacity(nd);
        for d in 0..nd {
            let len = self.pareto[d].len();
            groups.push(
                (0..self.mig_count)
                    .map(|_| self.pareto[d][self.rng.below(len)].clone())
                    .collect(),
            );
        }
        for neighbor in &self.chans.mig_out {
            let _ = neighbor.try_send(groups.clone());
        }
    }

    /// Tournament parents, one-point index crossover or parent cloning,
    /// single-index mutation.
    fn breed(&mut self) {
        let ss = self.sset_size;
        let ns = self.num_ssets;
        for d in 0..self.parents.len() {
            let np = self.prob.train[d].num_points();
            for i in 0..ns {
                let r1 = self.rng.below(ns).min(self.rng.below(ns));
                let r2 = self.rng.below(ns).min(self.rng.below(ns));
                let s1 = self.parents[d][r1].clone();
                let s2 = self.parents[d][r2].clone();

                for b in 0..self.brood_sz {
                    let mut indices: Vec<usize>;
                    if self.rng.bernoulli(self.cross_rate)
                        && s1.indices.len() == ss
                        && s2.indices.len() == ss
                    {
                        // one-point crossover at an interior cut
                        let cut = self.rng.below(ss - 2) + 1;
                        indices = Vec::with_capacity(ss);
                        indices.extend_from_slice(&s1.indices[..cut]);
                        indices.extend_from_slice(&s2.indices[cut..]);
                    } else if s1.indices.len() == ss {
                        // inject: clone parent 1's indices unchanged
                        indices = s1.indices.clone();
                    } else {
                        indices = (0..ss).map(|_| self.rng.below(np)).collect();
                    }

                    if self.rng.bernoulli(self.mutate_rate) {
                        let pos = self.rng.below(ss);
                        indices[pos] = self.rng.below(np);
                    }

                    self.brood[d][i][b] = SubsetMem {
                        dataset: d,
                        indices,
                        err: 0.0,
                        variance: 0.0,
                    };
                }
            }
        }
    }
}

/// Score one subset against its dataset's point stats.
///
/// `err` is the arithmetic mean of the indexed points' average errors;
/// `variance` is the squared-deviation sum of those averages around the
/// subset mean, so a subset covering points of uneven difficulty scores
/// high on the diversification objective.
pub fn score_subset(mem: &mut SubsetMem, stats: &[crate::problem::PntStats]) {
    let div = mem.indices.len() as f64;
    let mut err_sum = 0.0;
    for &i in &mem.indices {
        if let Some(s) = stats.get(i) {
            err_sum += s.ave_err;
        }
    }
    mem.err = err_sum / div;
    mem.variance = mem
        .indices
        .iter()
        .filter_map(|&i| stats.get(i))
        .map(|s| (s.ave_err - mem.err) * (s.ave_err - mem.err))
        .sum();
}

/// Error ascending; members with empty indices sort last.
pub(crate) fn by_err_asc(a: &SubsetMem, b: &SubsetMem) -> std::cmp::Ordering {
    match (a.indices.is_empty(), b.indices.is_empty()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.err.partial_cmp(&b.err).unwrap_or(std::cmp::Ordering::Equal),
    }
}

/// Variance descending; members with empty indices sort last.
pub(crate) fn by_variance_desc(a: &SubsetMem, b: &SubsetMem) -> std::cmp::Ordering {
    match (a.indices.is_empty(), b.indices.is_empty()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b
            .variance
            .partial_cmp(&a.variance)
            .unwrap_or(std::cmp::Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(err: f64, variance: f64, n: usize) -> SubsetMem {
        SubsetMem {
            dataset: 0,
            indices: vec![0; n],
            err,
            variance,
        }
    }

    #[test]
    fn err_sort_puts_empty_last() {
        let mut v = vec![mem(3.0, 0.0, 4), mem(0.0, 0.0, 0), mem(1.0, 0.0, 4)];
        v.sort_by(by_err_asc);
        assert_eq!(v[0].err, 1.0);
        assert_eq!(v[1].err, 3.0);
        assert!(v[2].indices.is_empty());
    }

    #[test]
    fn variance_sort_descends() {
        let mut v = vec![mem(0.0, 1.0, 4), mem(0.0, 9.0, 4), mem(0.0, 4.0, 4)];
        v.sort_by(by_variance_desc);
        let vars: Vec<f64> = v.iter().map(|m| m.variance).collect();
        assert_eq!(vars, vec![9.0, 4.0, 1.0]);
    }

    #[test]
    fn subset_scoring_mean_and_spread() {
        use crate::problem::PntStats;
        // AveErr = i for point i
        let stats: Vec<PntStats> = (0..8)
            .map(|i| PntStats {
                ave_err: i as f64,
                ..PntStats::default()
            })
            .collect();
        let mut mem = SubsetMem {
            dataset: 0,
            indices: vec![0, 1, 2, 3, 4],
            err: -1.0,
            variance: -1.0,
        };
        score_subset(&mut mem, &stats);
        assert!((mem.err - 2.0).abs() < 1e-12);
        // sum of (i - 2)^2 for i in 0..=4
        assert!((mem.variance - 10.0).abs() < 1e-12);
    }

    #[test]
    fn duplicate_indices_count_twice() {
        use crate::problem::PntStats;
        let stats: Vec<PntStats> = (0..4)
            .map(|i| PntStats {
                ave_err: i as f64,
                ..PntStats::default()
            })
            .collect();
        let mut mem = SubsetMem {
            dataset: 0,
            indices: vec![3, 3],
            err: 0.0,
            variance: 0.0,
        };
        score_subset(&mut mem, &stats);
        assert!((mem.err - 3.0).abs() < 1e-12);
        assert!(mem.variance.abs() < 1e-12);
    }
}
