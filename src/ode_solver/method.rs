use nalgebra::DVector;
use serde::Serialize;

use crate::{error::SolrecError, Scalar};

#[derive(Debug, PartialEq)]
pub enum OdeSolverStopReason {
    InternalTimestep,
    TstopReached,
}

#[derive(Clone, Debug, PartialEq, Serialize, Default)]
pub struct SolverStatistics {
    pub number_of_steps: usize,
    pub number_of_error_test_failures: usize,
    pub number_of_rhs_evals: usize,
}

/// Trait for ODE solver methods, the interface used by [crate::Simulation] to drive a solve.
///
/// The solver owns its current state `(t, y)` and advances it one accepted step at a time.
///
/// # Example
///
/// ```
/// use solrec::{OdeSolverMethod, OdeSolverStopReason, Scalar};
///
/// fn solve_ode<T: Scalar>(solver: &mut impl OdeSolverMethod<T>, t: T) -> usize {
///     let mut nsteps = 0;
///     solver.set_stop_time(t).unwrap();
///     while let OdeSolverStopReason::InternalTimestep = solver.step().unwrap() {
///         nsteps += 1;
///     }
///     nsteps + 1
/// }
/// ```
pub trait OdeSolverMethod<T: Scalar> {
    /// Current time of the solver.
    fn t(&self) -> T;

    /// Current state of the solver.
    fn y(&self) -> &DVector<T>;

    /// Step size that the next step will attempt.
    fn h(&self) -> T;

    /// Take one accepted step, shrinking the step size and retrying as needed.
    fn step(&mut self) -> Result<OdeSolverStopReason, SolrecError>;

    /// Set a stop time. The solver will land exactly on this time and return
    /// [OdeSolverStopReason::TstopReached] from the step that reaches it.
    fn set_stop_time(&mut self, tstop: T) -> Result<(), SolrecError>;

    fn statistics(&self) -> &SolverStatistics;

    /// Order of the method.
    fn order(&self) -> usize;
}
