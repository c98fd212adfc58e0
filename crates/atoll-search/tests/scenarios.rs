//! End-to-end search scenarios on synthetic data.

use std::path::PathBuf;

use atoll::{DataSet, Rng};
use atoll_expr::{Op, TreeParams};
use atoll_search::{
    fitness, Coordinator, Problem, SearchConfig, SearchError, SearchKind,
};

fn temp_log_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "atoll-scenario-{tag}-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// y = x over linspace(0, 1, 100).
fn identity_data() -> DataSet {
    let mut text = String::from("x y\n");
    for i in 0..100 {
        let x = i as f64 / 99.0;
        text.push_str(&format!("{x} {x}\n"));
    }
    DataSet::parse(&text).unwrap()
}

#[test]
fn identity_is_recovered() {
    let data = identity_data();

    let mut tree = TreeParams::default();
    let alphabet = vec![Op::Var, Op::ConstantF, Op::Add, Op::Mul, Op::Neg, Op::Div];
    tree.roots = alphabet.clone();
    tree.nodes = alphabet.clone();
    tree.non_trig = alphabet;
    tree.leafs = vec![Op::Var, Op::ConstantF];
    tree.min_size = 1;
    tree.min_depth = 1;

    let prob = Problem::new(
        vec![data.clone()],
        vec![data],
        SearchKind::Benchmark,
        1e-4,
        tree,
    );

    let mut cfg = SearchConfig::default();
    cfg.max_gen = 20;
    cfg.num_eqn_isles = 4;
    cfg.num_eqns = 50;
    cfg.eqn_brood_sz = 3;
    cfg.gpsr_rpt_epoch = 1;
    cfg.gpsr_rpt_count = 10;
    cfg.num_sset_isles = 2;
    cfg.num_ssets = 8;
    cfg.sset_size = 5;
    cfg.sset_rpt_count = 6;
    cfg.sset_mig_count = 4;
    cfg.seed = Some(20240811);

    let log_dir = temp_log_dir("identity");
    let mut coordinator = Coordinator::new(cfg, prob.clone(), &log_dir).unwrap();
    let (_cmd_tx, rpt_rx) = coordinator.upward();
    let mut finals = coordinator.run().unwrap();

    // the coordinator emitted at least one upward report along the way
    assert!(rpt_rx.try_recv().is_ok(), "no upward report received");

    // the top of the front explains y = x essentially exactly
    fitness::calc_train_err(&mut finals, &prob);
    let best = finals
        .iter()
        .flatten()
        .map(|r| r.train_err)
        .fold(f64::INFINITY, f64::min);
    assert!(
        best < 1e-6,
        "best train error {best} after {} generations",
        coordinator.generation()
    );

    let _ = std::fs::remove_dir_all(&log_dir);
}

/// y = x0^2 + x1 over 200 uniform samples in [-1, 1]^2.
#[test]
fn quadratic_is_recovered() {
    let mut rng = Rng::new(77);
    let mut text = String::from("x0 x1 y\n");
    for _ in 0..200 {
        let x0 = rng.next_f64() * 2.0 - 1.0;
        let x1 = rng.next_f64() * 2.0 - 1.0;
        text.push_str(&format!("{x0} {x1} {}\n", x0 * x0 + x1));
    }
    let data = DataSet::parse(&text).unwrap();

    let mut tree = TreeParams::default();
    tree.roots = vec![Op::Add, Op::Mul];
    tree.nodes = vec![Op::Var, Op::ConstantF, Op::Add, Op::Mul];
    tree.non_trig = tree.nodes.clone();
    tree.leafs = vec![Op::Var, Op::ConstantF];

    let prob = Problem::new(
        vec![data.clone()],
        vec![data],
        SearchKind::Benchmark,
        0.01,
        tree,
    );

    let mut cfg = SearchConfig::default();
    cfg.max_gen = 50;
    cfg.num_eqn_isles = 4;
    cfg.num_eqns = 50;
    cfg.eqn_brood_sz = 3;
    cfg.num_sset_isles = 2;
    cfg.num_ssets = 8;
    cfg.sset_size = 6;
    cfg.sset_rpt_count = 6;
    cfg.sset_mig_count = 4;
    cfg.seed = Some(5150);

    let log_dir = temp_log_dir("quadratic");
    let mut coordinator = Coordinator::new(cfg, prob, &log_dir).unwrap();
    let finals = coordinator.run().unwrap();

    let best = finals
        .iter()
        .flatten()
        .map(|r| r.test_err)
        .fold(f64::INFINITY, f64::min);
    assert!(
        best < 0.01,
        "best test error {best} after {} generations",
        coordinator.generation()
    );

    let _ = std::fs::remove_dir_all(&log_dir);
}

/// A generator alphabet with no variables can never produce a valid
/// individual; the run must refuse to progress past initialization.
#[test]
fn pure_constant_alphabet_refuses_to_start() {
    let data = identity_data();

    let mut tree = TreeParams::default();
    tree.roots = vec![Op::Add];
    tree.nodes = vec![Op::ConstantF, Op::Add];
    tree.non_trig = tree.nodes.clone();
    tree.leafs = vec![Op::ConstantF];

    let prob = Problem::new(
        vec![data.clone()],
        vec![data],
        SearchKind::Benchmark,
        0.01,
        tree,
    );

    let mut cfg = SearchConfig::default();
    cfg.num_eqn_isles = 1;
    cfg.num_eqns = 4;
    cfg.eqn_brood_sz = 2;
    cfg.seed = Some(1);

    let log_dir = temp_log_dir("constant");
    let err = Coordinator::new(cfg, prob, &log_dir).unwrap_err();
    assert!(
        matches!(err, SearchError::Degenerate(_)),
        "expected a degenerate-generator failure, got: {err}"
    );
    let _ = std::fs::remove_dir_all(&log_dir);
}

/// The per-island log directories exist after a run, with the standard
/// file set.
#[test]
fn log_tree_is_written() {
    let data = identity_data();
    let prob = Problem::new(
        vec![data.clone()],
        vec![data],
        SearchKind::Benchmark,
        0.01,
        TreeParams::default(),
    );

    let mut cfg = SearchConfig::default();
    cfg.max_gen = 2;
    cfg.num_eqn_isles = 2;
    cfg.num_eqns = 8;
    cfg.eqn_brood_sz = 2;
    cfg.eqn_rpt_count = 4;
    cfg.eqn_mig_count = 4;
    cfg.gpsr_rpt_count = 4;
    cfg.num_sset_isles = 1;
    cfg.num_ssets = 4;
    cfg.sset_size = 4;
    cfg.sset_rpt_count = 3;
    cfg.sset_mig_count = 2;
    cfg.seed = Some(9);

    let log_dir = temp_log_dir("logs");
    let mut coordinator = Coordinator::new(cfg, prob, &log_dir).unwrap();
    let _ = coordinator.run().unwrap();

    for isle_dir in ["eisle0", "eisle1", "sisle0"] {
        for name in ["err.log", "main.log", "eqns.log", "sset.log", "fitness.log", "ipre.log"] {
            assert!(
                log_dir.join(isle_dir).join(name).exists(),
                "{isle_dir}/{name} missing"
            );
        }
    }
    // the coordinator's fitness log has the gen/neqns/cnt/vst/mean/min line
    let fitness =
        std::fs::read_to_string(log_dir.join("search").join("fitness.log")).unwrap();
    let first = fitness.lines().next().unwrap_or("");
    assert_eq!(first.split_whitespace().count(), 6, "bad line: {first}");

    let _ = std::fs::remove_dir_all(&log_dir);
}
