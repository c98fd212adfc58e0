//! The coordinator: spawns both island kinds, merges their reports,
//! holds the global Pareto front on held-out test error, and feeds the
//! predictor loop.
//!
//! Aggregation of expression reports runs on a worker thread: an atomic
//! in-flight flag guarantees at most one aggregation at a time (a second
//! trigger while one runs is dropped), and the per-island report slots
//! are handed off under a mutex. Predictor-subset accumulation is cheap
//! and runs inline. Shutdown is cooperative: the coordinator is the sole
//! initiator, every island observes `Stop` and returns, and the
//! coordinator joins every thread before exiting.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use atoll::Rng;
use atoll_expr::{IpreTrie, SimpRules};
use tracing::{info, warn};

use crate::comm::{Command, EqnChannels, GenUpdate, SSetChannels};
use crate::config::SearchConfig;
use crate::eqn_isle::EqnIsle;
use crate::error::SearchError;
use crate::fitness::{bad_test, calc_eqn_errs, calc_test_err};
use crate::logs::create_log;
use crate::problem::{PntStatsGrid, PntSubset, Problem, ReportVec, SubsetMem};
use crate::select::{ReportQueue, SortKind};
use crate::sset_isle::{by_err_asc, by_variance_desc, SSetIsle};

/// State owned by the aggregation task: the global novelty trie, the
/// global top expressions, and the coordinator-level fitness log.
struct AggState {
    trie: IpreTrie,
    eqns: ReportVec,
    neqns: u64,
    min_error: f64,
    fitness: BufWriter<File>,
}

pub struct Coordinator {
    cfg: SearchConfig,
    prob: Arc<Problem>,
    rng: Rng,
    gen: u64,
    stop: bool,

    eqn_isles: Vec<EqnIsle>,
    sset_isles: Vec<SSetIsle>,
    handles: Vec<JoinHandle<()>>,

    eqn_cmd: Vec<SyncSender<Command>>,
    eqn_rpt_rx: Vec<Receiver<ReportVec>>,
    eqn_gen_rx: Receiver<GenUpdate>,
    eqn_gen_ctr: Vec<u64>,
    sset_pub: Vec<SyncSender<Arc<Vec<PntSubset>>>>,

    sset_cmd: Vec<SyncSender<Command>>,
    sset_rpt_rx: Vec<Receiver<Vec<SubsetMem>>>,
    sset_gen_rx: Receiver<GenUpdate>,
    sset_gen_ctr: Vec<u64>,
    err_pub: Vec<SyncSender<Arc<PntStatsGrid>>>,

    /// Per-island latest report, handed to the aggregation task.
    slots: Arc<Mutex<Vec<ReportVec>>>,
    per_equpd: Vec<u32>,
    per_ssets: Vec<Vec<SubsetMem>>,
    per_ssupd: Vec<u32>,

    agg: Arc<Mutex<AggState>>,
    agg_busy: Arc<AtomicBool>,
    agg_handle: Option<JoinHandle<()>>,

    /// Current best predictor subsets across all islands.
    sset: Vec<SubsetMem>,

    rpt_tx: Option<SyncSender<ReportVec>>,
    cmd_rx: Option<Receiver<Command>>,

    main_log: BufWriter<File>,
    eqns_log: BufWriter<File>,
    err_log: BufWriter<File>,
    sset_log: BufWriter<File>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Build the full search: wire every channel, initialize every
    /// island (including the initial populations), run the first
    /// aggregation, and publish the first subsets.
    ///
    /// Fails fast on unusable configurations, including degenerate
    /// alphabet/bound combinations discovered during initialization.
    pub fn new(
        cfg: SearchConfig,
        prob: Problem,
        log_root: &Path,
    ) -> Result<Self, SearchError> {
        cfg.validate()?;
        if prob.train.is_empty() || prob.test.is_empty() {
            return Err(SearchError::Config(
                "problem needs at least one train and one test dataset".into(),
            ));
        }

        let dir = log_root.join("search");
        let main_log = create_log(&dir, "main.log")?;
        let eqns_log = create_log(&dir, "eqns.log")?;
        let err_log = create_log(&dir, "err.log")?;
        let sset_log = create_log(&dir, "sset.log")?;
        let fitness = create_log(&dir, "fitness.log")?;

        let mut rng = match cfg.seed {
            Some(seed) => Rng::new(seed),
            None => Rng::from_entropy(),
        };

        // the islands' tree parameters: config override on top of the
        // problem template, data-derived fields preserved, constant
        // conversion off (there is no coefficient fitter downstream)
        let mut tree = cfg.tree.clone().unwrap_or_else(|| prob.tree.clone());
        if tree.usable_vars.is_empty() {
            tree.usable_vars = prob.tree.usable_vars.clone();
        }
        tree.num_dim = prob.tree.num_dim;
        tree.num_sys = prob.tree.num_sys;
        tree.rules = SimpRules::no_convert();

        let prob = Arc::new(prob);
        info!(
            eqn_isles = cfg.num_eqn_isles,
            sset_isles = cfg.num_sset_isles,
            "initializing search"
        );

        // --- expression islands -------------------------------------
        let n = cfg.num_eqn_isles;
        let (eqn_gen_tx, eqn_gen_rx) = sync_channel(256 * n);
        let mut mig_txs = Vec::with_capacity(n);
        let mut mig_rxs = Vec::with_capacity(n);
        for _ in 0..n {
            let (tx, rx) = sync_channel::<ReportVec>(256);
            mig_txs.push(tx);
            mig_rxs.push(Some(rx));
        }

        let mut eqn_cmd = Vec::with_capacity(n);
        let mut eqn_rpt_rx = Vec::with_capacity(n);
        let mut sset_pub = Vec::with_capacity(n);
        let mut eqn_isles = Vec::with_capacity(n);
        for i in 0..n {
            let (cmd_tx, cmd_rx) = sync_channel(1);
            let (rpt_tx, rpt_rx) = sync_channel(128);
            let (pub_tx, pub_rx) = sync_channel(64);
            let mig_out = if n > 1 {
                vec![
                    mig_txs[(i + n - 1) % n].clone(),
                    mig_txs[(i + 1) % n].clone(),
                ]
            } else {
                Vec::new()
            };
            let Some(mig_in) = mig_rxs[i].take() else {
                return Err(SearchError::Config("island wiring broken".into()));
            };
            let chans = EqnChannels {
                cmd: cmd_rx,
                rpt: rpt_tx,
                mig_in,
                mig_out,
                gen: eqn_gen_tx.clone(),
                ssets: pub_rx,
            };
            let mut isle = EqnIsle::new(
                i,
                &cfg,
                tree.clone(),
                prob.clone(),
                chans,
                rng.fork(),
                log_root,
            )?;
            isle.init()?;
            eqn_cmd.push(cmd_tx);
            eqn_rpt_rx.push(rpt_rx);
            sset_pub.push(pub_tx);
            eqn_isles.push(isle);
        }
        drop(mig_txs);
        drop(eqn_gen_tx);

        // collect the initial reports and aggregate once, synchronously
        let slots = Arc::new(Mutex::new(vec![ReportVec::new(); n]));
        if let Ok(mut s) = slots.lock() {
            for (i, rx) in eqn_rpt_rx.iter().enumerate() {
                while let Ok(r) = rx.try_recv() {
                    s[i] = r;
                }
            }
        }
        let mut agg_state = AggState {
            trie: IpreTrie::new(),
            eqns: vec![None; cfg.num_eqns],
            neqns: 0,
            min_error: 1e7,
            fitness,
        };
        let snapshots = match slots.lock() {
            Ok(s) => s.clone(),
            Err(_) => Vec::new(),
        };
        let pnts = run_aggregation(&mut agg_state, snapshots, &prob, 0, cfg.num_eqns);

        // --- predictor islands --------------------------------------
        let m = cfg.num_sset_isles;
        let (sset_gen_tx, sset_gen_rx) = sync_channel(1024 * m);
        let mut smig_txs = Vec::with_capacity(m);
        let mut smig_rxs = Vec::with_capacity(m);
        for _ in 0..m {
            let (tx, rx) = sync_channel::<Vec<Vec<SubsetMem>>>(128);
            smig_txs.push(tx);
            smig_rxs.push(Some(rx));
        }

        let mut sset_cmd = Vec::with_capacity(m);
        let mut sset_rpt_rx = Vec::with_capacity(m);
        let mut err_pub = Vec::with_capacity(m);
        let mut sset_isles = Vec::with_capacity(m);
        for i in 0..m {
            let (cmd_tx, cmd_rx) = sync_channel(1);
            let (rpt_tx, rpt_rx) = sync_channel(128);
            let (pnt_tx, pnt_rx) = sync_channel(16);
            let mig_out = if m > 1 {
                vec![
                    smig_txs[(i + m - 1) % m].clone(),
                    smig_txs[(i + 1) % m].clone(),
                ]
            } else {
                Vec::new()
            };
            let Some(mig_in) = smig_rxs[i].take() else {
                return Err(SearchError::Config("island wiring broken".into()));
            };
            let chans = SSetChannels {
                cmd: cmd_rx,
                rpt: rpt_tx,
                mig_in,
                mig_out,
                gen: sset_gen_tx.clone(),
                pnt_errs: pnt_rx,
            };
            let mut isle = SSetIsle::new(
                i,
                &cfg,
                prob.clone(),
                pnts.clone(),
                chans,
                rng.fork(),
                log_root,
            )?;
            isle.init()?;
            sset_cmd.push(cmd_tx);
            sset_rpt_rx.push(rpt_rx);
            err_pub.push(pnt_tx);
            sset_isles.push(isle);
        }
        drop(smig_txs);
        drop(sset_gen_tx);

        let mut per_ssets = vec![Vec::new(); m];
        for (i, rx) in sset_rpt_rx.iter().enumerate() {
            while let Ok(r) = rx.try_recv() {
                per_ssets[i] = r;
            }
        }

        let mut coord = Self {
            eqn_gen_ctr: vec![0; n],
            sset_gen_ctr: vec![0; m],
            per_equpd: vec![0; n],
            per_ssupd: vec![0; m],
            sset: vec![SubsetMem::default(); cfg.sset_rpt_count],
            cfg,
            prob,
            rng,
            gen: 0,
            stop: false,
            eqn_isles,
            sset_isles,
            handles: Vec::new(),
            eqn_cmd,
            eqn_rpt_rx,
            eqn_gen_rx,
            sset_pub,
            sset_cmd,
            sset_rpt_rx,
            sset_gen_rx,
            err_pub,
            slots,
            per_ssets,
            agg: Arc::new(Mutex::new(agg_state)),
            agg_busy: Arc::new(AtomicBool::new(false)),
            agg_handle: None,
            rpt_tx: None,
            cmd_rx: None,
            main_log,
            eqns_log,
            err_log,
            sset_log,
        };
        coord.accum_ssets();
        coord.publish_ssets();
        let _ = writeln!(coord.main_log, "search initialized");
        Ok(coord)
    }

    /// Create the upward command/report channels.
    pub fn upward(&mut self) -> (SyncSender<Command>, Receiver<ReportVec>) {
        let (cmd_tx, cmd_rx) = sync_channel(4);
        let (rpt_tx, rpt_rx) = sync_channel(64);
        self.cmd_rx = Some(cmd_rx);
        self.rpt_tx = Some(rpt_tx);
        (cmd_tx, rpt_rx)
    }

    /// Generations the coordinator has observed.
    pub fn generation(&self) -> u64 {
        self.gen
    }

    /// Run the search to completion and return the final global top
    /// expressions (Pareto-ordered by test error).
    pub fn run(&mut self) -> Result<ReportVec, SearchError> {
        info!("running search");
        for isle in self.eqn_isles.drain(..) {
            self.handles.push(
                thread::Builder::new()
                    .name("eqn-isle".into())
                    .spawn(move || isle.run())
                    .map_err(|e| SearchError::Io(e.to_string()))?,
            );
        }
        for isle in self.sset_isles.drain(..) {
            self.handles.push(
                thread::Builder::new()
                    .name("sset-isle".into())
                    .spawn(move || isle.run())
                    .map_err(|e| SearchError::Io(e.to_string()))?,
            );
        }

        let mut do_rpt = false;
        while !self.stop {
            while let Ok(g) = self.eqn_gen_rx.try_recv() {
                self.eqn_gen_ctr[g.isle] = g.gen;
            }
            while let Ok(g) = self.sset_gen_rx.try_recv() {
                self.sset_gen_ctr[g.isle] = g.gen;
            }
            let avg =
                self.eqn_gen_ctr.iter().sum::<u64>() / self.eqn_gen_ctr.len() as u64;
            if avg > self.gen {
                self.gen = avg;
                do_rpt = true;
            }
            if do_rpt && self.gen % self.cfg.gpsr_rpt_epoch == 0 {
                do_rpt = false;
                let _ = writeln!(
                    self.main_log,
                    "reporting expressions at gen {}",
                    self.gen
                );
                self.report_exprs();
            }

            self.check_messages();

            if self.gen >= self.cfg.max_gen {
                let _ = writeln!(self.main_log, "max generations reached");
                self.stop = true;
            }
            if let Some(rx) = &self.cmd_rx {
                match rx.try_recv() {
                    Ok(Command::Stop) | Err(TryRecvError::Disconnected) => {
                        self.stop = true;
                    }
                    Err(TryRecvError::Empty) => {}
                }
            }
            thread::sleep(Duration::from_micros(500));
        }

        self.do_stop();

        let finals = match self.agg.lock() {
            Ok(st) => st.eqns.clone(),
            Err(_) => Vec::new(),
        };
        Ok(finals)
    }

    /// Drain island traffic and kick off whatever is due.
    fn check_messages(&mut self) {
        // latest expression report per island into the hand-off slots
        for i in 0..self.eqn_rpt_rx.len() {
            let mut latest = None;
            while let Ok(r) = self.eqn_rpt_rx[i].try_recv() {
                latest = Some(r);
            }
            if let Some(r) = latest {
                if let Ok(mut s) = self.slots.lock() {
                    s[i] = r;
                }
                self.per_equpd[i] += 1;
            }
        }
        if !self.per_equpd.is_empty() && self.per_equpd.iter().all(|&c| c > 0) {
            for c in &mut self.per_equpd {
                *c = 0;
            }
            self.trigger_aggregation();
        }

        // latest predictor report per island
        for i in 0..self.sset_rpt_rx.len() {
            let mut latest = None;
            while let Ok(r) = self.sset_rpt_rx[i].try_recv() {
                latest = Some(r);
            }
            if let Some(r) = latest {
                self.per_ssets[i] = r;
                self.per_ssupd[i] += 1;
            }
        }
        if !self.per_ssupd.is_empty() && self.per_ssupd.iter().all(|&c| c > 0) {
            for c in &mut self.per_ssupd {
                *c = 0;
            }
            self.accum_ssets();
            self.publish_ssets();
        }
    }

    /// Spawn one aggregation task; drop the trigger if one is running.
    fn trigger_aggregation(&mut self) {
        if self
            .agg_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        if let Some(h) = self.agg_handle.take() {
            let _ = h.join();
        }

        let slots = Arc::clone(&self.slots);
        let agg = Arc::clone(&self.agg);
        let busy = Arc::clone(&self.agg_busy);
        let prob = Arc::clone(&self.prob);
        let err_pub = self.err_pub.clone();
        let gen = self.gen;
        let num_eqns = self.cfg.num_eqns;
        self.agg_handle = Some(thread::spawn(move || {
            let snapshots = match slots.lock() {
                Ok(s) => s.clone(),
                Err(_) => {
                    busy.store(false, Ordering::Release);
                    return;
                }
            };
            if let Ok(mut st) = agg.lock() {
                let pnts = run_aggregation(&mut st, snapshots, &prob, gen, num_eqns);
                for tx in &err_pub {
                    let _ = tx.try_send(Arc::clone(&pnts));
                }
            }
            busy.store(false, Ordering::Release);
        }));
    }

    /// Merge predictor reports with the previous best; the sort
    /// alternates randomly between variance-primary and error-primary
    /// (intentional diversification).
    fn accum_ssets(&mut self) {
        let m = self.cfg.num_sset_isles;
        let cnt = self.cfg.sset_rpt_count;
        let mut union: Vec<SubsetMem> = Vec::with_capacity((m + 1) * cnt);
        for i in 0..m {
            let src = &self.per_ssets[i];
            for k in 0..cnt {
                union.push(src.get(k).cloned().unwrap_or_default());
            }
        }
        union.extend(self.sset.iter().cloned());

        if self.rng.below(2) == 0 {
            union.sort_by(by_variance_desc);
            self.sset = union[..cnt].to_vec();
            self.sset.sort_by(by_err_asc);
        } else {
            union.sort_by(by_err_asc);
            self.sset = union[..cnt].to_vec();
            self.sset.sort_by(by_variance_desc);
        }
    }

    /// Publish subset views sampled from the current best to every
    /// expression island.
    fn publish_ssets(&mut self) {
        let cnt = self.cfg.sset_rpt_count;
        let mut subs = Vec::with_capacity(cnt);
        for _ in 0..cnt {
            let p = self.rng.below(self.sset.len());
            subs.push(self.sset[p].to_subset());
        }
        for s in &subs {
            let _ = writeln!(
                self.sset_log,
                "gen {} publishing ds{} {:?}",
                self.gen, s.dataset, s.indices
            );
        }
        let published = Arc::new(subs);
        for tx in &self.sset_pub {
            let _ = tx.try_send(Arc::clone(&published));
        }
    }

    /// Emit the top of the global front upward and to the report log.
    fn report_exprs(&mut self) {
        let cnt = self.cfg.gpsr_rpt_count;
        let rpt: ReportVec = match self.agg.lock() {
            Ok(st) => st.eqns.iter().take(cnt).cloned().collect(),
            Err(_) => return,
        };
        let _ = writeln!(self.eqns_log, "GEN {} {}", self.gen, cnt);
        for r in rpt.iter().flatten() {
            let _ = writeln!(
                self.eqns_log,
                "{} test {:.6} train {:.6} {}",
                r.size, r.test_err, r.train_err, r.expr
            );
        }
        if let Some(tx) = &self.rpt_tx {
            let _ = tx.try_send(rpt);
        }
    }

    /// Cooperative shutdown: command every island, then observe every
    /// exit by joining its thread.
    fn do_stop(&mut self) {
        let _ = writeln!(
            self.main_log,
            "stopping search at gen {} (eqn gens {:?}, sset gens {:?})",
            self.gen, self.eqn_gen_ctr, self.sset_gen_ctr
        );
        for tx in &self.eqn_cmd {
            let _ = tx.try_send(Command::Stop);
        }
        for tx in &self.sset_cmd {
            let _ = tx.try_send(Command::Stop);
        }
        while let Some(h) = self.handles.pop() {
            if h.join().is_err() {
                let _ = writeln!(self.err_log, "island thread panicked");
                warn!("island thread panicked during shutdown");
            }
        }
        if let Some(h) = self.agg_handle.take() {
            let _ = h.join();
        }
        if let Ok(mut st) = self.agg.lock() {
            let _ = st.fitness.flush();
        }
        let _ = self.main_log.flush();
        let _ = self.eqns_log.flush();
        let _ = self.err_log.flush();
        let _ = self.sset_log.flush();
        info!(gen = self.gen, "search stopped");
    }
}

/// One aggregation pass: union the island reports with the previous
/// global top, dedup near-identical structures, account novelty, score
/// on the test set, Pareto-rank, retain the top, and recompute the
/// per-point statistics.
fn run_aggregation(
    st: &mut AggState,
    snapshots: Vec<ReportVec>,
    prob: &Problem,
    gen: u64,
    num_eqns: usize,
) -> Arc<PntStatsGrid> {
    let mut union: ReportVec = Vec::with_capacity((snapshots.len() + 1) * num_eqns);
    for snap in snapshots {
        union.extend(snap);
    }
    union.extend(st.eqns.iter().cloned());

    // structural sort puts near-duplicates next to each other
    let mut queue = ReportQueue::from_vec(union);
    queue.set_sort(SortKind::Eqn);
    queue.sort();

    // novelty accounting over everything reported
    let mut serial = Vec::with_capacity(64);
    for r in queue.queue().iter().flatten() {
        st.neqns += 1;
        serial.clear();
        r.expr.serial(&mut serial);
        st.trie.insert(&serial);
    }

    // drop consecutive entries that are the same structure modulo
    // constant values
    let dedup = queue.queue_mut();
    let mut last: Option<usize> = None;
    for i in 0..dedup.len() {
        if dedup[i].is_none() {
            continue;
        }
        match last {
            None => last = Some(i),
            Some(l) => {
                let same = match (&dedup[l], &dedup[i]) {
                    (Some(a), Some(b)) => a.expr.almost_same(&b.expr),
                    _ => false,
                };
                if same {
                    dedup[i] = None;
                } else {
                    last = Some(i);
                }
            }
        }
    }

    // held-out evaluation, with the usual disqualification filter
    calc_test_err(dedup, prob);
    for slot in dedup.iter_mut() {
        if slot.as_ref().is_some_and(bad_test) {
            *slot = None;
        }
    }

    let mut err_sum = 0.0;
    let mut err_cnt = 0usize;
    for r in dedup.iter().flatten() {
        if r.test_err < st.min_error {
            st.min_error = r.test_err;
        }
        err_sum += r.test_err;
        err_cnt += 1;
    }
    let _ = writeln!(
        st.fitness,
        "{gen} {} {} {} {} {}",
        st.neqns,
        st.trie.cnt(),
        st.trie.vst(),
        err_sum / err_cnt as f64,
        st.min_error,
    );
    let _ = st.fitness.flush();

    queue.set_sort(SortKind::ParetoTestErr);
    queue.sort();
    let mut union = queue.into_vec();
    union.truncate(num_eqns);
    union.resize_with(num_eqns, || None);
    st.eqns = union;

    Arc::new(calc_eqn_errs(&st.eqns, prob))
}
