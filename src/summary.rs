//! End-of-run reporting.

use tracing::{info, warn};
use tubedl_core::ErrorLedger;

/// Counts for the final run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    /// `succeeded` counts items that were fetched *and* placed.
    pub fn new(total: usize, succeeded: usize) -> Self {
        Self {
            total,
            succeeded,
            failed: total.saturating_sub(succeeded),
        }
    }

    pub fn all_failed(&self) -> bool {
        self.succeeded == 0
    }

    /// Logs the final counts, pointing at the ledger when anything failed.
    pub fn report(&self, ledger: &ErrorLedger) {
        info!(
            total = self.total,
            succeeded = self.succeeded,
            failed = self.failed,
            "run complete"
        );
        if self.failed > 0 && ledger.is_enabled() {
            warn!(ledger = %ledger.path().display(), "failures were recorded in the ledger");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_count_is_derived() {
        let summary = RunSummary::new(5, 3);
        assert_eq!(summary.failed, 2);
        assert!(!summary.all_failed());
    }

    #[test]
    fn zero_successes_means_all_failed() {
        assert!(RunSummary::new(3, 0).all_failed());
        // the empty-playlist synthetic result counts as a failure too
        assert!(RunSummary::new(1, 0).all_failed());
    }

    #[test]
    fn oversubscribed_success_count_saturates() {
        let summary = RunSummary::new(1, 2);
        assert_eq!(summary.failed, 0);
    }
}
