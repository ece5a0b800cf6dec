//! Garbage collection
//!
//! A manual sweep that reclaims structure nothing can reach anymore. Each
//! pass is one statement; passes run in `SweepPass::ORDER`, so sets freed
//! by the map pass are collected by the set pass of the same sweep.

use std::sync::Arc;

use graphads_core::{Result, Statement, SweepPass};
use tracing::{debug, info};

use crate::database::Database;

/// Nodes removed by one sweep, per pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// `(pass, nodes removed)` in execution order
    pub passes: Vec<(SweepPass, u64)>,
}

impl SweepReport {
    /// Nodes removed by one pass
    pub fn removed_by(&self, pass: SweepPass) -> u64 {
        self.passes
            .iter()
            .find(|(p, _)| *p == pass)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    /// Nodes removed by the whole sweep
    pub fn total(&self) -> u64 {
        self.passes.iter().map(|(_, n)| n).sum()
    }
}

/// Runs sweeps against a database
#[derive(Debug, Clone)]
pub struct GarbageCollector {
    db: Arc<Database>,
}

impl GarbageCollector {
    /// Collector for a database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Run every pass once, in order
    ///
    /// Each pass commits on its own; a failing pass stops the sweep and
    /// keeps what earlier passes removed.
    pub fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        for pass in SweepPass::ORDER {
            let removed = self.db.run(&Statement::Sweep { pass })?.count()?;
            debug!(target: "graphads::gc", pass = pass.as_str(), removed, "pass done");
            report.passes.push((pass, removed));
        }
        info!(target: "graphads::gc", removed = report.total(), "sweep complete");
        Ok(report)
    }
}
