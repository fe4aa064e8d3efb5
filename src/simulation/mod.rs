use std::sync::Arc;

use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::SolrecError,
    ode_solver::{
        config::ExplicitRkConfig,
        explicit_rk::ExplicitRk,
        method::{OdeSolverMethod, OdeSolverStopReason},
        rhs::ModelRhs,
        tableau::{Tableau, TableauKind},
    },
    output::OutputVariables,
    solution::{Solution, Termination},
    DiscretisedModel, Inputs, Model, ParameterValues, Scalar,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Scalar")]
pub struct SimulationConfig<T: Scalar> {
    pub t0: T,
    /// Initial step size, estimated from the initial state and its derivative if not given.
    pub h0: Option<T>,
    pub rtol: T,
    pub atol: T,
    pub tableau: TableauKind,
    pub solver: ExplicitRkConfig<T>,
}

impl<T: Scalar> Default for SimulationConfig<T> {
    fn default() -> Self {
        Self {
            t0: T::zero(),
            h0: None,
            rtol: T::from_f64_const(1e-6),
            atol: T::from_f64_const(1e-6),
            tableau: TableauKind::default(),
            solver: ExplicitRkConfig::default(),
        }
    }
}

/// Solves a [Model] for a set of [ParameterValues], recording the chosen output variables.
///
/// The model is discretised once, the first time it is solved, and reused for every later solve.
/// Parameters set to [crate::ParameterValue::Input] are supplied to each [Simulation::solve]
/// instead, so the same simulation can be solved for many input values without rebuilding.
///
/// # Example
///
/// ```
/// use solrec::{test_models::lumped_battery, Inputs, Simulation};
///
/// let (model, mut parameter_values) = lumped_battery::lumped_battery::<f64>();
/// parameter_values.set_input("Current function [A]");
/// let mut sim = Simulation::new(model, parameter_values).output_variables(["Voltage [V]"]);
/// let inputs = Inputs::from([("Current function [A]", 2.0)]);
/// let solution = sim.solve(600.0, inputs).unwrap();
/// assert_eq!(solution.t().last(), Some(&600.0));
/// assert!(solution.get("Voltage [V]").is_ok());
/// assert!(solution.get("Current [A]").is_err());
/// ```
pub struct Simulation<T: Scalar> {
    model: Model<T>,
    parameter_values: ParameterValues<T>,
    output_names: Vec<String>,
    config: SimulationConfig<T>,
    built: Option<(Arc<DiscretisedModel<T>>, Arc<OutputVariables<T>>)>,
    solution: Option<Solution<T>>,
}

impl<T: Scalar> Simulation<T> {
    pub fn new(model: Model<T>, parameter_values: ParameterValues<T>) -> Self {
        Self {
            model,
            parameter_values,
            output_names: Vec::new(),
            config: SimulationConfig::default(),
            built: None,
            solution: None,
        }
    }

    /// Restrict the recorded variables to `names`. An empty list records everything.
    pub fn output_variables<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.output_names = names.into_iter().map(Into::into).collect();
        self.built = None;
        self
    }

    pub fn config(mut self, config: SimulationConfig<T>) -> Self {
        self.config = config;
        self
    }

    pub fn t0(mut self, t0: f64) -> Self {
        self.config.t0 = T::from_f64_const(t0);
        self
    }

    pub fn h0(mut self, h0: f64) -> Self {
        self.config.h0 = Some(T::from_f64_const(h0));
        self
    }

    pub fn rtol(mut self, rtol: f64) -> Self {
        self.config.rtol = T::from_f64_const(rtol);
        self
    }

    pub fn atol(mut self, atol: f64) -> Self {
        self.config.atol = T::from_f64_const(atol);
        self
    }

    pub fn tableau(mut self, tableau: TableauKind) -> Self {
        self.config.tableau = tableau;
        self
    }

    pub fn solver_config(mut self, solver: ExplicitRkConfig<T>) -> Self {
        self.config.solver = solver;
        self
    }

    pub fn get_config(&self) -> &SimulationConfig<T> {
        &self.config
    }

    /// Discretise the model and resolve the output variables, if not done already.
    pub fn build(&mut self) -> Result<(), SolrecError> {
        if self.built.is_none() {
            let discretised = Arc::new(self.model.discretise(&self.parameter_values)?);
            let outputs = Arc::new(OutputVariables::resolve(
                &discretised,
                self.output_names.iter(),
            )?);
            self.built = Some((discretised, outputs));
        }
        Ok(())
    }

    /// The discretised model, available once the simulation has been built.
    pub fn discretised_model(&self) -> Option<&Arc<DiscretisedModel<T>>> {
        self.built.as_ref().map(|(model, _)| model)
    }

    /// Solve from `t0` to `t_end` with the given input parameter values.
    ///
    /// Errors in the model, the parameter values or the inputs are reported before anything is
    /// recorded. If the solver fails part way through, the error is returned and the partial
    /// solution, sealed as [Termination::Failed], is still available from [Simulation::solution].
    pub fn solve(&mut self, t_end: T, inputs: Inputs<T>) -> Result<&Solution<T>, SolrecError> {
        self.solution = None;
        self.build()?;
        let (model, outputs) = match self.built.as_ref() {
            Some((model, outputs)) => (model.clone(), outputs.clone()),
            None => return Err(crate::other_error!("simulation was not built")),
        };
        model.check_inputs(&inputs)?;

        let config = &self.config;
        let y0 = model.initial_state(config.t0, &inputs)?;
        let rhs = ModelRhs::new(model.clone(), inputs.clone());
        let direction = if t_end < config.t0 {
            -T::one()
        } else {
            T::one()
        };
        let mut solver = ExplicitRk::new(
            rhs,
            config.t0,
            y0,
            config.h0.unwrap_or(direction),
            config.rtol,
            config.atol,
            Tableau::from_kind(config.tableau),
        )?
        .with_config(config.solver.clone());
        if config.h0.is_none() {
            solver.set_step_size()?;
        }
        solver.set_stop_time(t_end)?;

        debug!(
            model = model.name(),
            t0 = config.t0.as_f64(),
            t_end = t_end.as_f64(),
            restricted = outputs.is_restricted(),
            "starting solve"
        );
        let mut solution = Solution::new(model, outputs, inputs);
        let result = record_solve(&mut solver, &mut solution);
        solution.set_statistics(solver.statistics().clone());
        match result {
            Ok(()) => {
                solution.seal(Termination::Completed)?;
                Ok(&*self.solution.insert(solution))
            }
            Err(err) => {
                warn!(
                    t = solver.t().as_f64(),
                    nsteps = solution.len(),
                    error = %err,
                    "solve failed, keeping the steps recorded so far"
                );
                solution.seal(Termination::Failed(err.to_string()))?;
                self.solution = Some(solution);
                Err(err)
            }
        }
    }

    /// The solution of the last solve, including a partial solution if it failed.
    pub fn solution(&self) -> Option<&Solution<T>> {
        self.solution.as_ref()
    }

    pub fn take_solution(&mut self) -> Option<Solution<T>> {
        self.solution.take()
    }
}

/// Record the current state of `solver` and then every accepted step until its stop time.
///
/// The stop time must already be set with [OdeSolverMethod::set_stop_time].
pub fn record_solve<T: Scalar>(
    solver: &mut impl OdeSolverMethod<T>,
    solution: &mut Solution<T>,
) -> Result<(), SolrecError> {
    solution.record(solver.t(), solver.y())?;
    loop {
        let reason = solver.step()?;
        solution.record(solver.t(), solver.y())?;
        if reason == OdeSolverStopReason::TstopReached {
            return Ok(());
        }
    }
}
