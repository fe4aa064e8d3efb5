use nalgebra::DVector;
use num_traits::{abs, One, Zero};

use super::{
    config::ExplicitRkConfig,
    method::{OdeSolverMethod, OdeSolverStopReason, SolverStatistics},
    rhs::Rhs,
    tableau::Tableau,
};
use crate::{
    error::{OdeSolverError, SolrecError},
    ode_solver_error, Scalar,
};

/// An explicit Runge-Kutta method with adaptive step size control.
///
/// The particular method is defined by the [Tableau] used to create the solver. The error of each
/// step is estimated with the embedded method of the tableau and measured with a weighted RMS norm
/// using `rtol` and `atol`, steps are retried with a smaller step size until the error is below one.
///
/// Restrictions:
/// - The upper triangular and diagonal parts of the `a` matrix must be zero (i.e. explicit).
pub struct ExplicitRk<T: Scalar, R: Rhs<T>> {
    rhs: R,
    tableau: Tableau<T>,
    config: ExplicitRkConfig<T>,
    rtol: T,
    atol: T,
    t: T,
    h: T,
    y: DVector<T>,
    dy: DVector<T>,
    tstop: Option<T>,
    stages: Vec<DVector<T>>,
    y_stage: DVector<T>,
    y_new: DVector<T>,
    error: DVector<T>,
    statistics: SolverStatistics,
}

impl<T: Scalar, R: Rhs<T>> ExplicitRk<T, R> {
    pub fn new(
        rhs: R,
        t0: T,
        y0: DVector<T>,
        h0: T,
        rtol: T,
        atol: T,
        tableau: Tableau<T>,
    ) -> Result<Self, SolrecError> {
        let nstates = rhs.nstates();
        if y0.len() != nstates {
            return Err(ode_solver_error!(
                Other,
                format!(
                    "Initial state has length {}, expected {}",
                    y0.len(),
                    nstates
                )
            ));
        }
        let mut dy = DVector::zeros(nstates);
        rhs.call_inplace(&y0, t0, &mut dy)?;
        if !dy.iter().all(|x| x.is_finite()) {
            return Err(ode_solver_error!(NonFiniteRhs { time: t0.as_f64() }));
        }
        let stages = vec![DVector::zeros(nstates); tableau.s()];
        Ok(Self {
            rhs,
            tableau,
            config: ExplicitRkConfig::default(),
            rtol,
            atol,
            t: t0,
            h: h0,
            y_stage: y0.clone(),
            y_new: y0.clone(),
            error: DVector::zeros(nstates),
            y: y0,
            dy,
            tstop: None,
            stages,
            statistics: SolverStatistics {
                number_of_rhs_evals: 1,
                ..Default::default()
            },
        })
    }

    pub fn with_config(mut self, config: ExplicitRkConfig<T>) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ExplicitRkConfig<T> {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ExplicitRkConfig<T> {
        &mut self.config
    }

    pub fn tableau(&self) -> &Tableau<T> {
        &self.tableau
    }

    pub fn rhs(&self) -> &R {
        &self.rhs
    }

    /// Compute the stages for a step of size `h` from the current state, leaving the new state
    /// in `y_new`. Returns the error norm of the step.
    fn attempt(&mut self, h: T) -> Result<T, SolrecError> {
        let s = self.tableau.s();
        // first stage is the derivative at the current state
        self.stages[0].copy_from(&self.dy);
        for i in 1..s {
            self.y_stage.copy_from(&self.y);
            for j in 0..i {
                let a = self.tableau.a()[(i, j)];
                if a != T::zero() {
                    self.y_stage.axpy(h * a, &self.stages[j], T::one());
                }
            }
            let t = self.t + self.tableau.c()[i] * h;
            self.rhs
                .call_inplace(&self.y_stage, t, &mut self.stages[i])?;
            self.statistics.number_of_rhs_evals += 1;
        }

        self.y_new.copy_from(&self.y);
        self.error.fill(T::zero());
        for j in 0..s {
            self.y_new
                .axpy(h * self.tableau.b()[j], &self.stages[j], T::one());
            self.error
                .axpy(h * self.tableau.d()[j], &self.stages[j], T::one());
        }
        Ok(self.error_norm())
    }

    /// Squared weighted RMS norm of `v`, weighted by the current state.
    fn squared_norm(&self, v: &DVector<T>) -> T {
        let n = v.len();
        if n == 0 {
            return T::zero();
        }
        let mut norm = T::zero();
        for (e, y) in v.iter().zip(self.y.iter()) {
            let r = *e / (abs(*y) * self.rtol + self.atol);
            norm += r * r;
        }
        norm / T::from_f64_const(n as f64)
    }

    /// Squared weighted RMS norm of the error estimate, infinite if the step produced a non-finite
    /// value.
    fn error_norm(&self) -> T {
        let error_norm = self.squared_norm(&self.error);
        if error_norm.is_finite() && self.y_new.iter().all(|x| x.is_finite()) {
            error_norm
        } else {
            T::INFINITY
        }
    }

    /// Replace the step size with an estimate from the initial state and its derivative. The
    /// second derivative is approximated with a trial explicit Euler step, which costs one
    /// right-hand side evaluation. The sign of the current step size is kept.
    pub fn set_step_size(&mut self) -> Result<(), SolrecError> {
        let c = T::from_f64_const;
        let is_neg_h = self.h < T::zero();
        let d0 = self.squared_norm(&self.y).sqrt();
        let d1 = self.squared_norm(&self.dy).sqrt();
        let h0 = if d0 < c(1e-5) || d1 < c(1e-5) {
            c(1e-6)
        } else {
            c(0.01) * (d0 / d1)
        };
        let h0 = if is_neg_h { -h0 } else { h0 };

        // trial step, the first stage is recomputed at the start of every attempt
        self.y_stage.copy_from(&self.y);
        self.y_stage.axpy(h0, &self.dy, T::one());
        self.rhs
            .call_inplace(&self.y_stage, self.t + h0, &mut self.stages[0])?;
        self.statistics.number_of_rhs_evals += 1;
        self.error.copy_from(&self.stages[0]);
        self.error -= &self.dy;
        let d2 = self.squared_norm(&self.error).sqrt() / abs(h0);

        let h = if d2.is_finite() {
            let max_d = d1.max(d2);
            let h1 = if max_d < c(1e-15) {
                (abs(h0) * c(1e-3)).max(c(1e-6))
            } else {
                (c(0.01) / max_d).powf(c(1.0 / (self.order() as f64 + 1.0)))
            };
            (abs(h0) * c(100.0)).min(h1)
        } else {
            abs(h0)
        };
        self.h = if is_neg_h { -h } else { h };
        if let Some(tstop) = self.tstop {
            self.handle_tstop(tstop)?;
        }
        Ok(())
    }

    fn factor(&self, error_norm: T, safety_factor: f64, min_factor: T, max_factor: T) -> T {
        let safety = T::from_f64_const(0.9 * safety_factor);
        let mut factor = safety
            * error_norm.powf(T::from_f64_const(
                -0.5 / (self.order() as f64 + 1.0),
            ));
        if factor < min_factor {
            factor = min_factor;
        }
        if factor > max_factor {
            factor = max_factor;
        }
        factor
    }

    fn error_test_fail(&mut self, h: T, nattempts: usize) -> Result<(), SolrecError> {
        self.statistics.number_of_error_test_failures += 1;
        // if too many error test failures, then fail
        if nattempts >= self.config.maximum_error_test_failures {
            return Err(ode_solver_error!(TooManyErrorTestFailures {
                time: self.t.as_f64()
            }));
        }
        // if step size too small, then fail
        if abs(h) < self.config.minimum_timestep {
            return Err(ode_solver_error!(StepSizeTooSmall {
                time: self.t.as_f64()
            }));
        }
        Ok(())
    }

    fn step_accepted(&mut self, h: T, new_h: T) -> Result<OdeSolverStopReason, SolrecError> {
        self.t += h;
        std::mem::swap(&mut self.y, &mut self.y_new);
        if self.tableau.is_fsal() {
            let s = self.tableau.s();
            self.dy.copy_from(&self.stages[s - 1]);
        } else {
            self.rhs.call_inplace(&self.y, self.t, &mut self.dy)?;
            self.statistics.number_of_rhs_evals += 1;
            if !self.dy.iter().all(|x| x.is_finite()) {
                return Err(ode_solver_error!(NonFiniteRhs {
                    time: self.t.as_f64()
                }));
            }
        }
        self.h = new_h;

        // update statistics
        self.statistics.number_of_steps += 1;

        // check if the we are at tstop
        if let Some(tstop) = self.tstop {
            if let Some(OdeSolverStopReason::TstopReached) = self.handle_tstop(tstop)? {
                self.t = tstop;
                self.tstop = None;
                return Ok(OdeSolverStopReason::TstopReached);
            }
        }
        Ok(OdeSolverStopReason::InternalTimestep)
    }

    fn handle_tstop(&mut self, tstop: T) -> Result<Option<OdeSolverStopReason>, SolrecError> {
        // check if the we are at tstop
        let troundoff = T::from_f64_const(100.0) * T::EPSILON * (abs(self.t) + abs(self.h));
        if abs(self.t - tstop) <= troundoff {
            return Ok(Some(OdeSolverStopReason::TstopReached));
        } else if (self.h > T::zero() && tstop < self.t - troundoff)
            || (self.h < T::zero() && tstop > self.t + troundoff)
        {
            return Err(ode_solver_error!(StopTimeBeforeCurrentTime {
                stop_time: tstop.as_f64(),
                state_time: self.t.as_f64(),
            }));
        }

        // check if the next step will be beyond tstop, if so adjust the step size
        if (self.h > T::zero() && self.t + self.h > tstop + troundoff)
            || (self.h < T::zero() && self.t + self.h < tstop - troundoff)
        {
            let factor = (tstop - self.t) / self.h;
            self.h *= factor;
        }
        Ok(None)
    }
}

impl<T: Scalar, R: Rhs<T>> OdeSolverMethod<T> for ExplicitRk<T, R> {
    fn t(&self) -> T {
        self.t
    }

    fn y(&self) -> &DVector<T> {
        &self.y
    }

    fn h(&self) -> T {
        self.h
    }

    fn step(&mut self) -> Result<OdeSolverStopReason, SolrecError> {
        let mut h = self.h;

        // loop until step is accepted
        let mut nattempts = 0;
        let factor = loop {
            let error_norm = self.attempt(h)?;
            let factor = self.factor(
                error_norm,
                1.0,
                self.config.minimum_timestep_shrink,
                self.config.maximum_timestep_growth,
            );
            if error_norm < T::one() {
                break factor;
            }
            h *= factor;
            nattempts += 1;
            self.error_test_fail(h, nattempts)?;
        };
        self.step_accepted(h, h * factor)
    }

    fn set_stop_time(&mut self, tstop: T) -> Result<(), SolrecError> {
        self.tstop = Some(tstop);
        if let Some(OdeSolverStopReason::TstopReached) = self.handle_tstop(tstop)? {
            self.tstop = None;
            return Err(ode_solver_error!(StopTimeAtCurrentTime));
        }
        Ok(())
    }

    fn statistics(&self) -> &SolverStatistics {
        &self.statistics
    }

    fn order(&self) -> usize {
        self.tableau.order()
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::DVector;

    use super::*;
    use crate::ode_solver::{rhs::Closure, tableau::TableauKind};

    fn decay(kind: TableauKind) -> ExplicitRk<f64, impl Rhs<f64>> {
        let rhs = Closure::new(
            |y: &DVector<f64>, _t: f64, dy: &mut DVector<f64>| {
                dy.copy_from(&(-0.1 * y));
            },
            2,
        );
        let y0 = DVector::from_vec(vec![1.0, 2.0]);
        ExplicitRk::new(rhs, 0.0, y0, 1.0, 1e-6, 1e-8, Tableau::from_kind(kind)).unwrap()
    }

    #[test]
    fn exponential_decay_reaches_stop_time() {
        for kind in [
            TableauKind::HeunEuler,
            TableauKind::BogackiShampine,
            TableauKind::DormandPrince,
        ] {
            let mut solver = decay(kind);
            solver.set_stop_time(10.0).unwrap();
            while solver.step().unwrap() != OdeSolverStopReason::TstopReached {}
            assert_eq!(solver.t(), 10.0);
            let expect = (-1.0f64).exp();
            assert!((solver.y()[0] - expect).abs() < 1e-4, "{kind:?}");
            assert!((solver.y()[1] - 2.0 * expect).abs() < 1e-4, "{kind:?}");
        }
    }

    #[test]
    fn rhs_evaluations_are_counted() {
        let mut solver = decay(TableauKind::BogackiShampine);
        solver.set_stop_time(5.0).unwrap();
        while solver.step().unwrap() != OdeSolverStopReason::TstopReached {}
        let stats = solver.statistics().clone();
        assert!(stats.number_of_steps > 0);
        // first same as last: three new stages per attempt
        assert_eq!(
            stats.number_of_rhs_evals,
            1 + 3 * (stats.number_of_steps + stats.number_of_error_test_failures)
        );
    }

    #[test]
    fn constant_rhs_takes_the_largest_steps() {
        let rhs = Closure::new(
            |_y: &DVector<f64>, _t: f64, dy: &mut DVector<f64>| dy.fill(1.0),
            1,
        );
        let y0 = DVector::from_vec(vec![0.0]);
        let mut solver =
            ExplicitRk::new(rhs, 0.0, y0, 1.0, 1e-6, 1e-8, Tableau::bogacki_shampine()).unwrap();
        solver.set_stop_time(4.0).unwrap();
        assert_eq!(solver.step().unwrap(), OdeSolverStopReason::InternalTimestep);
        assert_eq!(solver.step().unwrap(), OdeSolverStopReason::TstopReached);
        assert_eq!(solver.t(), 4.0);
        assert!((solver.y()[0] - 4.0).abs() < 1e-12);
        insta::assert_yaml_snapshot!(solver.statistics(), @r###"
        number_of_steps: 2
        number_of_error_test_failures: 0
        number_of_rhs_evals: 7
        "###);
    }

    #[test]
    fn initial_step_size_from_the_derivatives() {
        let rhs = Closure::new(
            |y: &DVector<f64>, _t: f64, dy: &mut DVector<f64>| dy.copy_from(&(-y)),
            1,
        );
        let y0 = DVector::from_vec(vec![1.0]);
        let mut solver =
            ExplicitRk::new(rhs, 0.0, y0, 1.0, 1e-6, 1e-6, Tableau::bogacki_shampine()).unwrap();
        solver.set_step_size().unwrap();
        assert!(solver.h() > 0.0 && solver.h() < 0.1, "{}", solver.h());
        assert_eq!(solver.statistics().number_of_rhs_evals, 2);

        solver.set_stop_time(1.0).unwrap();
        while solver.step().unwrap() != OdeSolverStopReason::TstopReached {}
        assert!(solver.statistics().number_of_steps > 1);
        assert!((solver.y()[0] - (-1.0f64).exp()).abs() < 1e-5);
    }

    #[test]
    fn initial_step_size_is_clipped_to_the_stop_time() {
        let rhs = Closure::new(
            |_y: &DVector<f64>, _t: f64, dy: &mut DVector<f64>| dy.fill(0.0),
            1,
        );
        let y0 = DVector::from_vec(vec![1.0]);
        let mut solver =
            ExplicitRk::new(rhs, 0.0, y0, -1.0, 1e-6, 1e-8, Tableau::heun_euler()).unwrap();
        solver.set_step_size().unwrap();
        // zero derivative gives the smallest trial step, the sign is kept
        assert_eq!(solver.h(), -1e-6);
        solver.set_stop_time(-1e-7).unwrap();
        assert!((solver.h() + 1e-7).abs() < 1e-20);
    }

    #[test]
    fn stop_time_errors() {
        let mut solver = decay(TableauKind::BogackiShampine);
        let err = solver.set_stop_time(0.0).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"ODE solver error: Stop time is at the current state time");
        solver.set_stop_time(1.0).unwrap();
        while solver.step().unwrap() != OdeSolverStopReason::TstopReached {}
        assert_eq!(
            solver.set_stop_time(0.5).unwrap_err(),
            SolrecError::OdeSolverError(OdeSolverError::StopTimeBeforeCurrentTime {
                stop_time: 0.5,
                state_time: 1.0
            })
        );
    }

    #[test]
    fn non_finite_rhs_shrinks_the_step_until_failure() {
        let rhs = Closure::new(
            |y: &DVector<f64>, t: f64, dy: &mut DVector<f64>| {
                if t > 1.0 {
                    dy.fill(f64::NAN);
                } else {
                    dy.copy_from(&(-y));
                }
            },
            1,
        );
        let y0 = DVector::from_vec(vec![1.0]);
        let mut solver =
            ExplicitRk::new(rhs, 0.0, y0, 0.1, 1e-6, 1e-8, Tableau::bogacki_shampine()).unwrap();
        solver.set_stop_time(2.0).unwrap();
        let err = loop {
            match solver.step() {
                Ok(OdeSolverStopReason::InternalTimestep) => continue,
                Ok(OdeSolverStopReason::TstopReached) => panic!("should not reach stop time"),
                Err(err) => break err,
            }
        };
        assert!(matches!(
            err,
            SolrecError::OdeSolverError(
                OdeSolverError::StepSizeTooSmall { .. }
                    | OdeSolverError::TooManyErrorTestFailures { .. }
            )
        ));
        assert!(solver.t() <= 1.0);
        assert!(solver.statistics().number_of_error_test_failures > 0);
    }
}
