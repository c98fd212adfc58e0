//! Search configuration: island counts, cadences, population shapes.
//!
//! Parsed from `KEY VALUE` text; keys are case-insensitive. Keys not
//! recognized here are forwarded to the tree-parameter parser; anything
//! still unknown is warned about and ignored.

use atoll::{config, AtollError};
use atoll_expr::TreeParams;
use tracing::warn;

use crate::error::SearchError;

/// Full parameter set for one search run.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Soft cap on coordinator generations.
    pub max_gen: u64,
    pub gpsr_rpt_epoch: u64,
    pub gpsr_rpt_count: usize,

    pub num_eqn_isles: usize,
    pub eqn_rpt_epoch: u64,
    pub eqn_rpt_count: usize,
    pub eqn_mig_epoch: u64,
    pub eqn_mig_count: usize,
    pub num_eqns: usize,
    pub eqn_brood_sz: usize,
    pub eqn_cross_rate: f64,
    pub eqn_mutate_rate: f64,

    pub num_sset_isles: usize,
    pub sset_rpt_epoch: u64,
    pub sset_rpt_count: usize,
    pub sset_mig_epoch: u64,
    pub sset_mig_count: usize,
    pub num_ssets: usize,
    pub sset_size: usize,
    pub sset_brood_sz: usize,
    pub sset_cross_rate: f64,
    pub sset_mutate_rate: f64,

    /// Master seed; system entropy when absent.
    pub seed: Option<u64>,
    /// Tree parameters overriding the problem's template.
    pub tree: Option<TreeParams>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_gen: 100,
            gpsr_rpt_epoch: 10,
            gpsr_rpt_count: 10,

            num_eqn_isles: 4,
            eqn_rpt_epoch: 5,
            eqn_rpt_count: 10,
            eqn_mig_epoch: 10,
            eqn_mig_count: 5,
            num_eqns: 50,
            eqn_brood_sz: 5,
            eqn_cross_rate: 0.75,
            eqn_mutate_rate: 0.2,

            num_sset_isles: 2,
            sset_rpt_epoch: 5,
            sset_rpt_count: 8,
            sset_mig_epoch: 10,
            sset_mig_count: 4,
            num_ssets: 16,
            sset_size: 8,
            sset_brood_sz: 3,
            sset_cross_rate: 0.5,
            sset_mutate_rate: 0.2,

            seed: None,
            tree: None,
        }
    }
}

impl SearchConfig {
    /// Parse config text on top of the defaults.
    pub fn parse(text: &str) -> Result<Self, SearchError> {
        let mut cfg = Self::default();
        for pair in config::scan(text) {
            let known = match pair.key.as_str() {
                "MAXGEN" => set_u64(&mut cfg.max_gen, &pair)?,
                "GPSRRPTEPOCH" => set_u64(&mut cfg.gpsr_rpt_epoch, &pair)?,
                "GPSRRPTCOUNT" => set_usize(&mut cfg.gpsr_rpt_count, &pair)?,

                "NUMEQNISLES" => set_usize(&mut cfg.num_eqn_isles, &pair)?,
                "EQNRPTEPOCH" => set_u64(&mut cfg.eqn_rpt_epoch, &pair)?,
                "EQNRPTCOUNT" => set_usize(&mut cfg.eqn_rpt_count, &pair)?,
                "EQNMIGEPOCH" => set_u64(&mut cfg.eqn_mig_epoch, &pair)?,
                "EQNMIGCOUNT" => set_usize(&mut cfg.eqn_mig_count, &pair)?,
                "NUMEQNS" => set_usize(&mut cfg.num_eqns, &pair)?,
                "EQNBROODSZ" => set_usize(&mut cfg.eqn_brood_sz, &pair)?,
                "EQNCROSSRATE" => set_f64(&mut cfg.eqn_cross_rate, &pair)?,
                "EQNMUTATERATE" => set_f64(&mut cfg.eqn_mutate_rate, &pair)?,

                "NUMSSETISLES" => set_usize(&mut cfg.num_sset_isles, &pair)?,
                "SSETRPTEPOCH" => set_u64(&mut cfg.sset_rpt_epoch, &pair)?,
                "SSETRPTCOUNT" => set_usize(&mut cfg.sset_rpt_count, &pair)?,
                "SSETMIGEPOCH" => set_u64(&mut cfg.sset_mig_epoch, &pair)?,
                "SSETMIGCOUNT" => set_usize(&mut cfg.sset_mig_count, &pair)?,
                "NUMSSETS" => set_usize(&mut cfg.num_ssets, &pair)?,
                "SSETSIZE" => set_usize(&mut cfg.sset_size, &pair)?,
                "SSETBROODSZ" => set_usize(&mut cfg.sset_brood_sz, &pair)?,
                "SSETCROSSRATE" => set_f64(&mut cfg.sset_cross_rate, &pair)?,
                "SSETMUTATERATE" => set_f64(&mut cfg.sset_mutate_rate, &pair)?,

                "SEED" => {
                    cfg.seed = Some(config::int_value(&pair)? as u64);
                    true
                }
                _ => false,
            };
            if known {
                continue;
            }
            // forward to the tree-parameter parser
            let tree = cfg.tree.get_or_insert_with(TreeParams::default);
            if !tree.parse_pair(&pair)? {
                warn!(key = %pair.key, "unrecognized config key ignored");
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<(), SearchError> {
        let checks: &[(bool, &str)] = &[
            (self.num_eqn_isles == 0, "NumEqnIsles must be positive"),
            (self.num_eqns == 0, "NumEqns must be positive"),
            (self.eqn_brood_sz == 0, "EqnBroodSz must be positive"),
            (self.eqn_rpt_count == 0, "EqnRptCount must be positive"),
            (self.sset_rpt_count == 0, "SSetRptCount must be positive"),
            (self.gpsr_rpt_count == 0, "GpsrRptCount must be positive"),
            (self.eqn_rpt_epoch == 0, "EqnRptEpoch must be positive"),
            (self.eqn_mig_epoch == 0, "EqnMigEpoch must be positive"),
            (self.gpsr_rpt_epoch == 0, "GpsrRptEpoch must be positive"),
            (
                self.eqn_rpt_count > self.num_eqns,
                "EqnRptCount exceeds NumEqns",
            ),
            (
                self.eqn_mig_count > self.num_eqns,
                "EqnMigCount exceeds NumEqns",
            ),
            (
                self.gpsr_rpt_count > self.num_eqns,
                "GpsrRptCount exceeds NumEqns",
            ),
            (self.num_sset_isles == 0, "NumSSetIsles must be positive"),
            (self.num_ssets == 0, "NumSSets must be positive"),
            (self.sset_brood_sz == 0, "SSetBroodSz must be positive"),
            (self.sset_rpt_epoch == 0, "SSetRptEpoch must be positive"),
            (self.sset_mig_epoch == 0, "SSetMigEpoch must be positive"),
            (
                self.sset_size < 3,
                "SSetSize must be at least 3 for one-point crossover",
            ),
            (
                self.sset_rpt_count > self.num_ssets,
                "SSetRptCount exceeds NumSSets",
            ),
            (
                self.sset_mig_count > self.num_ssets,
                "SSetMigCount exceeds NumSSets",
            ),
            (
                !(0.0..=1.0).contains(&self.eqn_cross_rate)
                    || !(0.0..=1.0).contains(&self.eqn_mutate_rate)
                    || !(0.0..=1.0).contains(&self.sset_cross_rate)
                    || !(0.0..=1.0).contains(&self.sset_mutate_rate),
                "breeding rates must lie in [0, 1]",
            ),
        ];
        for (bad, msg) in checks {
            if *bad {
                return Err(SearchError::Config((*msg).to_string()));
            }
        }
        if let Some(tree) = &self.tree {
            if tree.min_size > tree.max_size || tree.min_depth > tree.max_depth {
                return Err(SearchError::Config(
                    "tree size/depth bounds are inverted".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn set_u64(field: &mut u64, pair: &config::Pair) -> Result<bool, AtollError> {
    *field = config::int_value(pair)? as u64;
    Ok(true)
}

fn set_usize(field: &mut usize, pair: &config::Pair) -> Result<bool, AtollError> {
    *field = config::int_value(pair)? as usize;
    Ok(true)
}

fn set_f64(field: &mut f64, pair: &config::Pair) -> Result<bool, AtollError> {
    *field = config::float_value(pair)?;
    Ok(true)
}
