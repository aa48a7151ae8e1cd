//! Resource limits, deadlines and cooperative cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::pipeline::SynthesisError;

/// Resource limits for one synthesis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisBudget {
    /// Maximum number of game-graph nodes explored.
    pub max_nodes: usize,
    /// Maximum number of fixpoint iterations summed over all loop levels.
    pub max_fixpoint_iterations: usize,
    /// Wall-clock limit in seconds. `0` disables the deadline.
    pub timeout_secs: u64,
}

impl Default for SynthesisBudget {
    fn default() -> Self {
        Self {
            max_nodes: 1_000_000,
            max_fixpoint_iterations: 10_000_000,
            timeout_secs: 300,
        }
    }
}

/// Shared flag that asks a running synthesis to stop.
///
/// Clones observe the same flag. The solver checks it between goal
/// computations and between outer iterations, so cancellation is coarse.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Deadline, cancellation and iteration accounting for one run.
///
/// Shared by reference across the rayon workers of the solver.
#[derive(Debug)]
pub(crate) struct RunGuard {
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
    iterations: AtomicUsize,
    max_iterations: usize,
}

impl RunGuard {
    pub(crate) fn new(budget: &SynthesisBudget, cancel: Option<CancelToken>) -> Self {
        Self {
            deadline: Self::deadline_after(budget.timeout_secs),
            cancel,
            iterations: AtomicUsize::new(0),
            max_iterations: budget.max_fixpoint_iterations,
        }
    }

    /// `None` when `timeout_secs` is zero or the deadline does not fit in an
    /// `Instant`.
    fn deadline_after(timeout_secs: u64) -> Option<Instant> {
        if timeout_secs == 0 {
            return None;
        }
        Instant::now().checked_add(Duration::from_secs(timeout_secs))
    }

    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    #[cfg(test)]
    pub(crate) fn unlimited() -> Self {
        Self {
            deadline: None,
            cancel: None,
            iterations: AtomicUsize::new(0),
            max_iterations: usize::MAX,
        }
    }

    /// Fail with `Cancelled` or `Timeout` if either has been triggered.
    pub(crate) fn check(&self, phase: &'static str) -> Result<(), SynthesisError> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(SynthesisError::Cancelled { phase });
        }
        if self.past_deadline() {
            return Err(SynthesisError::Timeout { phase });
        }
        Ok(())
    }

    /// Count one fixpoint iteration against the total budget.
    pub(crate) fn tick(&self, fixpoint: &'static str) -> Result<(), SynthesisError> {
        let n = self.iterations.fetch_add(1, Ordering::Relaxed) + 1;
        if n > self.max_iterations {
            return Err(SynthesisError::SolverDivergence {
                fixpoint,
                iterations: n,
                bound: self.max_iterations,
            });
        }
        Ok(())
    }

    pub(crate) fn iterations(&self) -> usize {
        self.iterations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_deadline(deadline: Option<Instant>) -> RunGuard {
        RunGuard {
            deadline,
            ..RunGuard::unlimited()
        }
    }

    #[test]
    fn no_deadline_never_times_out() {
        assert!(with_deadline(None).check("game").is_ok());
    }

    #[test]
    fn future_deadline_passes_and_past_deadline_fails() {
        let future = Instant::now() + Duration::from_secs(60);
        assert!(with_deadline(Some(future)).check("game").is_ok());
        let past = Instant::now() - Duration::from_secs(1);
        assert!(matches!(
            with_deadline(Some(past)).check("solve"),
            Err(SynthesisError::Timeout { phase: "solve" })
        ));
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let budget = |timeout_secs| SynthesisBudget {
            timeout_secs,
            ..SynthesisBudget::default()
        };
        assert!(RunGuard::new(&budget(0), None).deadline.is_none());
        assert!(RunGuard::new(&budget(5), None).deadline.is_some());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let guard = RunGuard::new(&SynthesisBudget::default(), Some(token.clone()));
        assert!(guard.check("solve").is_ok());
        token.cancel();
        assert!(matches!(
            guard.check("solve"),
            Err(SynthesisError::Cancelled { phase: "solve" })
        ));
    }

    #[test]
    fn iteration_budget_is_enforced() {
        let budget = SynthesisBudget {
            max_fixpoint_iterations: 2,
            ..SynthesisBudget::default()
        };
        let guard = RunGuard::new(&budget, None);
        assert!(guard.tick("inner").is_ok());
        assert!(guard.tick("inner").is_ok());
        assert!(matches!(
            guard.tick("inner"),
            Err(SynthesisError::SolverDivergence { iterations: 3, bound: 2, .. })
        ));
        assert_eq!(guard.iterations(), 3);
    }
}
