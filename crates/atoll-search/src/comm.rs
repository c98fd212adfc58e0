//! Channel message types and per-island channel bundles.
//!
//! All inter-task traffic is bounded `sync_channel` FIFOs. Islands drain
//! their receivers non-blockingly at loop boundaries and never block on a
//! send (`try_send`, dropping on a full queue) so shutdown can always
//! make progress. A disconnected channel is treated as shutdown.

use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::Arc;

use crate::problem::{PntStatsGrid, PntSubset, ReportVec, SubsetMem};

/// The single broadcast command. Each island, on observing it, flushes
/// its logs and returns; the coordinator joins every island thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Stop,
}

/// A generation-counter update from an island.
#[derive(Clone, Copy, Debug)]
pub struct GenUpdate {
    pub isle: usize,
    pub gen: u64,
}

/// Channel bundle handed to an expression island.
pub struct EqnChannels {
    pub cmd: Receiver<Command>,
    pub rpt: SyncSender<ReportVec>,
    pub mig_in: Receiver<ReportVec>,
    /// Ring neighbors (empty for a single island).
    pub mig_out: Vec<SyncSender<ReportVec>>,
    pub gen: SyncSender<GenUpdate>,
    /// Latest published predictor subsets.
    pub ssets: Receiver<Arc<Vec<PntSubset>>>,
}

/// Channel bundle handed to a predictor island.
pub struct SSetChannels {
    pub cmd: Receiver<Command>,
    pub rpt: SyncSender<Vec<SubsetMem>>,
    /// Migrants arrive grouped per training dataset.
    pub mig_in: Receiver<Vec<Vec<SubsetMem>>>,
    pub mig_out: Vec<SyncSender<Vec<Vec<SubsetMem>>>>,
    pub gen: SyncSender<GenUpdate>,
    /// Latest published per-point error statistics.
    pub pnt_errs: Receiver<Arc<PntStatsGrid>>,
}
