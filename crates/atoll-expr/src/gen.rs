//! Random tree synthesis and the breeding operators.
//!
//! The grow procedure chooses an operator per hole from position-dependent
//! alphabet subsets: `roots` at depth 0, `leafs` at the depth bound,
//! `non_trig` inside a trig ancestor, `nodes` otherwise. Candidates are
//! simplified and re-checked against the structural bounds; the acceptance
//! loops retry until a candidate passes, failing the run after
//! [`RETRY_LIMIT`] consecutive rejections.

use atoll::config::Pair;
use atoll::{config, AtollError, Rng};

use crate::error::ExprError;
use crate::node::{Expr, Op};
use crate::simplify::SimpRules;

/// Consecutive-rejection bound for the acceptance loops.
pub const RETRY_LIMIT: usize = 10_000;

/// Structural search bounds, per-position alphabets, and transient
/// traversal state. One instance per island; synthesis calls reset the
/// transient fields before use.
#[derive(Clone, Debug)]
pub struct TreeParams {
    pub max_size: usize,
    pub min_size: usize,
    pub max_depth: usize,
    pub min_depth: usize,

    /// Alphabet at depth 0.
    pub roots: Vec<Op>,
    /// Alphabet at interior positions.
    pub nodes: Vec<Op>,
    /// Alphabet at the depth bound.
    pub leafs: Vec<Op>,
    /// Interior alphabet inside a trig ancestor.
    pub non_trig: Vec<Op>,

    pub usable_vars: Vec<usize>,
    pub num_dim: usize,
    pub num_sys: usize,
    pub num_coeff: usize,

    pub do_simp: bool,
    pub rules: SimpRules,

    // Transient bounds for subtree distributions; reset before each
    // synthesis call.
    pub tmp_max_size: usize,
    pub tmp_min_size: usize,
    pub tmp_max_depth: usize,
    pub tmp_min_depth: usize,

    // Traversal state during one grow call.
    pub curr_size: usize,
    pub curr_depth: usize,
    pub in_trig: bool,
    pub coeff_count: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_size: 50,
            min_size: 3,
            max_depth: 6,
            min_depth: 1,
            roots: vec![Op::Add, Op::Mul],
            nodes: vec![
                Op::Var,
                Op::ConstantF,
                Op::Add,
                Op::Neg,
                Op::Mul,
                Op::Div,
                Op::Cos,
                Op::Sin,
            ],
            leafs: vec![Op::Var, Op::ConstantF],
            non_trig: vec![
                Op::Var,
                Op::ConstantF,
                Op::Add,
                Op::Neg,
                Op::Mul,
                Op::Div,
            ],
            usable_vars: Vec::new(),
            num_dim: 0,
            num_sys: 0,
            num_coeff: 0,
            do_simp: true,
            rules: SimpRules::default(),
            tmp_max_size: 50,
            tmp_min_size: 3,
            tmp_max_depth: 6,
            tmp_min_depth: 1,
            curr_size: 0,
            curr_depth: 0,
            in_trig: false,
            coeff_count: 0,
        }
    }
}

impl TreeParams {
    /// Reset the per-call traversal counters.
    pub fn reset_curr(&mut self) {
        self.curr_size = 0;
        self.curr_depth = 0;
        self.in_trig = false;
        self.coeff_count = 0;
    }

    /// Reset the transient bounds back to the configured ones.
    pub fn reset_temp(&mut self) {
        self.tmp_max_size = self.max_size;
        self.tmp_min_size = self.min_size;
        self.tmp_max_depth = self.max_depth;
        self.tmp_min_depth = self.min_depth;
    }

    /// Check a simplified candidate against the configured bounds.
    pub fn check_expr(&self, e: &Expr) -> bool {
        let size = e.size();
        let depth = e.depth();
        size >= self.min_size
            && size <= self.max_size
            && depth >= self.min_depth
            && depth <= self.max_depth
    }

    /// Consume one scanned config pair if it is a tree-parameter key.
    ///
    /// Returns `Ok(false)` when the key is not recognized here.
    pub fn parse_pair(&mut self, pair: &Pair) -> Result<bool, AtollError> {
        match pair.key.as_str() {
            "MAXSIZE" => self.max_size = config::int_value(pair)? as usize,
            "MINSIZE" => self.min_size = config::int_value(pair)? as usize,
            "MAXDEPTH" => self.max_depth = config::int_value(pair)? as usize,
            "MINDEPTH" => self.min_depth = config::int_value(pair)? as usize,
            "ROOTS" => self.roots = parse_ops(pair)?,
            "NODES" => self.nodes = parse_ops(pair)?,
            "LEAFS" => self.leafs = parse_ops(pair)?,
            "NONTRIG" => self.non_trig = parse_ops(pair)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn parse_ops(pair: &Pair) -> Result<Vec<Op>, AtollError> {
    pair.values
        .iter()
        .map(|name| {
            Op::parse(name).ok_or_else(|| AtollError::Parse {
                field: pair.key.clone(),
                value: name.clone(),
            })
        })
        .collect()
}

/// Generate one valid expression: grow, simplify, validate, retry.
pub fn gen_expr(params: &mut TreeParams, rng: &mut Rng) -> Result<Expr, ExprError> {
    let mut tries = 0;
    loop {
        params.reset_curr();
        params.reset_temp();
        let raw = grow(None, params, rng);
        if let Some(e) = raw.simplify(&params.rules) {
            if e.has_var() && params.check_expr(&e) {
                return Ok(e);
            }
        }
        tries += 1;
        if tries >= RETRY_LIMIT {
            return Err(ExprError::Degenerate(format!(
                "{RETRY_LIMIT} consecutive rejections \
                 (alphabet {:?}/{:?}, size {}..={}, depth {}..={})",
                params.roots,
                params.leafs,
                params.min_size,
                params.max_size,
                params.min_depth,
                params.max_depth,
            )));
        }
    }
}

/// Grow a tree at the current position. With `op = None` the operator is
/// drawn from the position's alphabet; an empty alphabet yields `Null`,
/// which the validity check upstream rejects.
pub(crate) fn grow(op: Option<Op>, params: &mut TreeParams, rng: &mut Rng) -> Expr {
    let op = match op {
        Some(o) => o,
        None => match pick_op(params, rng) {
            Some(o) => o,
            None => return Expr::Null,
        },
    };

    match op {
        Op::Null => Expr::Null,
        Op::Time => Expr::Time,
        Op::Var => {
            if params.usable_vars.is_empty() {
                return Expr::Null;
            }
            let p = params.usable_vars[rng.below(params.usable_vars.len())];
            Expr::Var(p)
        }
        Op::Constant => {
            let i = params.coeff_count;
            params.coeff_count += 1;
            Expr::Constant(i)
        }
        Op::ConstantF => Expr::ConstantF(rng.normal() * 2.0),
        Op::System => {
            if params.num_sys == 0 {
                return Expr::Null;
            }
            Expr::System(rng.below(params.num_sys))
        }

        Op::Neg => unary(Expr::Neg, params, rng),
        Op::Abs => unary(Expr::Abs, params, rng),
        Op::Sqrt => unary(Expr::Sqrt, params, rng),
        Op::Exp => unary(Expr::Exp, params, rng),
        Op::Log => unary(Expr::Log, params, rng),
        Op::Sin => trig(Expr::Sin, params, rng),
        Op::Cos => trig(Expr::Cos, params, rng),
        Op::Tan => trig(Expr::Tan, params, rng),

        Op::PowI => {
            let c = descend(params, rng);
            Expr::PowI(Box::new(c), rng.between(-3, 3) as i32)
        }
        Op::PowF => {
            let c = descend(params, rng);
            Expr::PowF(Box::new(c), rng.next_f64() * 3.0)
        }
        Op::PowE => {
            let a = descend(params, rng);
            let b = descend(params, rng);
            Expr::PowE(Box::new(a), Box::new(b))
        }
        Op::Div => {
            let a = descend(params, rng);
            let b = descend(params, rng);
            Expr::Div(Box::new(a), Box::new(b))
        }
        Op::Add => {
            let a = descend(params, rng);
            let b = descend(params, rng);
            Expr::Add(vec![a, b])
        }
        Op::Mul => {
            let a = descend(params, rng);
            let b = descend(params, rng);
            Expr::Mul(vec![a, b])
        }
    }
}

/// Grow one child a level deeper.
fn descend(params: &mut TreeParams, rng: &mut Rng) -> Expr {
    params.curr_depth += 1;
    let c = grow(None, params, rng);
    params.curr_depth -= 1;
    c
}

fn unary(wrap: fn(Box<Expr>) -> Expr, params: &mut TreeParams, rng: &mut Rng) -> Expr {
    wrap(Box::new(descend(params, rng)))
}

fn trig(wrap: fn(Box<Expr>) -> Expr, params: &mut TreeParams, rng: &mut Rng) -> Expr {
    params.curr_depth += 1;
    let was = params.in_trig;
    params.in_trig = true;
    let c = grow(None, params, rng);
    params.in_trig = was;
    params.curr_depth -= 1;
    wrap(Box::new(c))
}

fn pick_op(params: &TreeParams, rng: &mut Rng) -> Option<Op> {
    let list = if params.curr_depth == 0 {
        &params.roots
    } else if params.curr_depth >= params.tmp_max_depth {
        &params.leafs
    } else if params.in_trig {
        &params.non_trig
    } else {
        &params.nodes
    };
    if list.is_empty() {
        return None;
    }
    Some(list[rng.below(list.len())])
}

/// Crossover: clone `p1`, swap a random subtree of the clone for a clone
/// of a random subtree of `p2`.
pub fn cross(p1: &Expr, p2: &Expr, rng: &mut Rng) -> Expr {
    let mut child = p1.clone();
    let s1 = rng.below(child.size());
    let s2 = rng.below(p2.size());
    if let Some(sub) = p2.get(s2) {
        child.swap(s1, sub.clone());
    }
    child
}

/// Subtree-fair injection: size the replacement subtree to a second
/// randomly chosen subtree of the clone (half to one-and-a-half its size).
pub fn inject_subtree_fair(p1: &Expr, params: &mut TreeParams, rng: &mut Rng) -> Expr {
    let mut child = p1.clone();
    let s1 = rng.below(child.size());
    let s2 = rng.below(child.size());
    let target = child.get(s2).map(Expr::size).unwrap_or(1);

    params.reset_curr();
    params.reset_temp();
    params.tmp_min_size = target / 2;
    params.tmp_max_size = (target * 3) / 2;

    let sub = grow(None, params, rng);
    child.swap(s1, sub);
    child
}

/// Vanilla injection: grow the replacement under the default bounds,
/// starting from the replaced subtree's depth.
pub fn inject_vanilla(p1: &Expr, params: &mut TreeParams, rng: &mut Rng) -> Expr {
    let mut child = p1.clone();
    let s1 = rng.below(child.size());
    let (sub_size, sub_depth) = match child.get(s1) {
        Some(e) => (e.size(), e.depth()),
        None => (1, 1),
    };

    params.reset_curr();
    params.curr_size = child.size() - sub_size;
    params.curr_depth = sub_depth;
    params.reset_temp();

    let sub = grow(None, params, rng);
    child.swap(s1, sub);
    child
}

/// Point mutation in place.
///
/// Picks uniform random subtrees until a mutable one is found: `ConstantF`
/// is perturbed by a standard normal draw (or, when system values exist,
/// sometimes replaced by a `System * ConstantF` product), `Var` and
/// `System` are reassigned. `Add`/`Mul` and the rest are no-ops that retry
/// on a different subtree.
pub fn mutate(e: &mut Expr, params: &TreeParams, sysvals: &[f64], rng: &mut Rng) {
    let size = e.size();
    for _ in 0..RETRY_LIMIT {
        let idx = rng.below(size);
        let Some(node) = e.get_mut(idx) else { continue };
        match node {
            Expr::ConstantF(v) => {
                if params.num_sys == 0 || sysvals.is_empty() || rng.bernoulli(0.5) {
                    *v += rng.normal();
                } else {
                    let s = rng.below(params.num_sys);
                    let scale = sysvals.get(s).copied().unwrap_or(1.0);
                    let scaled = *v / scale;
                    *node = Expr::Mul(vec![Expr::System(s), Expr::ConstantF(scaled)]);
                }
                return;
            }
            Expr::Var(p) => {
                if params.usable_vars.is_empty() {
                    continue;
                }
                *p = params.usable_vars[rng.below(params.usable_vars.len())];
                return;
            }
            Expr::System(p) => {
                if params.num_sys == 0 {
                    continue;
                }
                *p = rng.below(params.num_sys);
                return;
            }
            _ => {}
        }
    }
}
