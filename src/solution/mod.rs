use std::{cell::RefCell, collections::HashMap, fmt, sync::Arc};

use nalgebra::DVector;
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{ModelError, SolrecError, SolutionError},
    model_error,
    output::{OutputVariables, VariableId},
    recorder::{evaluate_series, StepRecorder},
    solution_error, DiscretisedModel, Inputs, Scalar, SolverStatistics, Value,
};

pub mod series;

pub use series::RecordedSeries;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SolutionStatus {
    Empty,
    Recording,
    Sealed,
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How the solve that filled a sealed [Solution] ended.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Termination {
    Completed,
    Failed(String),
}

/// The recorded output of one solve.
///
/// Holds one [RecordedSeries] per registered output variable, the last accepted state and the
/// [Inputs] used. When the output variables were unrestricted the full trajectory is kept as well
/// and any model variable can be computed after the solve with [Solution::get].
///
/// A solution starts [SolutionStatus::Empty], moves to [SolutionStatus::Recording] when the first
/// step is recorded and to [SolutionStatus::Sealed] when the solve ends, successfully or not.
/// Everything recorded before sealing stays readable.
///
/// When filled by [crate::record_solve] the first entry is the initial condition at `t0`, followed
/// by one entry per accepted solver step, so a solve of `n` steps has `n + 1` entries.
#[derive(Debug)]
pub struct Solution<T: Scalar> {
    model: Arc<DiscretisedModel<T>>,
    recorder: StepRecorder<T>,
    inputs: Inputs<T>,
    status: SolutionStatus,
    termination: Option<Termination>,
    statistics: Option<SolverStatistics>,
    cache: RefCell<HashMap<String, RecordedSeries<T>>>,
}

impl<T: Scalar> Solution<T> {
    pub fn new(
        model: Arc<DiscretisedModel<T>>,
        outputs: Arc<OutputVariables<T>>,
        inputs: Inputs<T>,
    ) -> Self {
        let recorder = StepRecorder::new(outputs, model.nstates());
        Self {
            model,
            recorder,
            inputs,
            status: SolutionStatus::Empty,
            termination: None,
            statistics: None,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Record an accepted step, see [StepRecorder::record].
    pub fn record(&mut self, t: T, y: &DVector<T>) -> Result<(), SolrecError> {
        if self.status == SolutionStatus::Sealed {
            return Err(solution_error!(InvalidState {
                action: "record into",
                state: self.status.to_string(),
            }));
        }
        self.recorder.record(t, y, &self.inputs)?;
        self.status = SolutionStatus::Recording;
        self.cache.get_mut().clear();
        Ok(())
    }

    /// Freeze the solution. No more steps can be recorded afterwards.
    pub fn seal(&mut self, termination: Termination) -> Result<(), SolrecError> {
        if self.status == SolutionStatus::Sealed {
            return Err(solution_error!(InvalidState {
                action: "seal",
                state: self.status.to_string(),
            }));
        }
        debug!(
            model = self.model.name(),
            nsteps = self.len(),
            termination = ?termination,
            "sealed solution"
        );
        self.status = SolutionStatus::Sealed;
        self.termination = Some(termination);
        Ok(())
    }

    pub fn set_statistics(&mut self, statistics: SolverStatistics) {
        self.statistics = Some(statistics);
    }

    /// The recorded series of the variable `name`.
    ///
    /// A registered variable returns its recorded series. Any other variable defined by the model
    /// is computed from the retained trajectory when the outputs were unrestricted, and fails with
    /// [SolutionError::UnrecordedVariable] when they were restricted.
    pub fn get(&self, name: &str) -> Result<RecordedSeries<T>, SolrecError> {
        if let Some(id) = self.output_variables().id(name) {
            return Ok(self.get_by_id(id));
        }
        if let Some(series) = self.cache.borrow().get(name) {
            return Ok(series.clone());
        }
        let expression = self.model.variable(name).ok_or_else(|| {
            model_error!(UnknownVariable {
                name: name.to_string()
            })
        })?;
        let trajectory = self.recorder.trajectory().ok_or_else(|| {
            solution_error!(UnrecordedVariable {
                name: name.to_string()
            })
        })?;
        let values = evaluate_series(expression, self.t(), trajectory, &self.inputs)?;
        let series = RecordedSeries::new(name, self.t().to_vec(), values);
        debug!(variable = name, "computed variable from trajectory");
        self.cache
            .borrow_mut()
            .insert(name.to_string(), series.clone());
        Ok(series)
    }

    /// The recorded series of a registered variable.
    pub fn get_by_id(&self, id: VariableId) -> RecordedSeries<T> {
        RecordedSeries::new(
            self.output_variables().get(id).name.clone(),
            self.t().to_vec(),
            self.recorder.values(id).to_vec(),
        )
    }

    /// Look up `name` as [Solution::get] does and interpolate it at `t_eval`.
    pub fn get_at(&self, name: &str, t_eval: &[T]) -> Result<Vec<Value<T>>, SolrecError> {
        self.get(name)?.interpolate(t_eval)
    }

    /// Recorded times.
    pub fn t(&self) -> &[T] {
        self.recorder.t()
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.recorder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorder.is_empty()
    }

    /// Last accepted `(t, y)`, for restarting a solve.
    pub fn last_state(&self) -> Option<(T, &DVector<T>)> {
        self.recorder.last_state()
    }

    /// Every recorded state, only available when the outputs were unrestricted.
    pub fn trajectory(&self) -> Option<&[DVector<T>]> {
        self.recorder.trajectory()
    }

    pub fn inputs(&self) -> &Inputs<T> {
        &self.inputs
    }

    pub fn model(&self) -> &Arc<DiscretisedModel<T>> {
        &self.model
    }

    pub fn status(&self) -> SolutionStatus {
        self.status
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub fn is_restricted(&self) -> bool {
        self.output_variables().is_restricted()
    }

    pub fn output_variables(&self) -> &OutputVariables<T> {
        self.recorder.outputs()
    }

    pub fn statistics(&self) -> Option<&SolverStatistics> {
        self.statistics.as_ref()
    }

    /// Total number of scalars retained by the recording, see [StepRecorder::retained_len].
    pub fn retained_len(&self) -> usize {
        self.recorder.retained_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Expression, Model, ParameterValues};

    fn model() -> Arc<DiscretisedModel<f64>> {
        let x = Expression::<f64>::state(0);
        let model = Model::builder("solution")
            .states(2)
            .rhs(Expression::state_slice(0..2))
            .init(Expression::vector(DVector::from_vec(vec![0.0, 0.0])))
            .variable("x", x.clone())
            .variable("2x", x.clone() * 2.0)
            .variable("integral of x", x.time_integral())
            .variable("offset", Expression::<f64>::time() + 1.0)
            .build()
            .unwrap();
        Arc::new(model.discretise(&ParameterValues::new()).unwrap())
    }

    fn solution(names: &[&str]) -> Solution<f64> {
        let model = model();
        let outputs = OutputVariables::resolve(&model, names.iter().copied()).unwrap();
        let mut solution = Solution::new(model, Arc::new(outputs), Inputs::new());
        for k in 0..4 {
            let t = k as f64;
            solution
                .record(t, &DVector::from_vec(vec![t, -t]))
                .unwrap();
        }
        solution
    }

    #[test]
    fn lifecycle() {
        let model = model();
        let outputs = Arc::new(OutputVariables::resolve(&model, ["x"]).unwrap());
        let mut solution = Solution::new(model, outputs, Inputs::new());
        assert_eq!(solution.status(), SolutionStatus::Empty);
        solution.record(0.0, &DVector::zeros(2)).unwrap();
        assert_eq!(solution.status(), SolutionStatus::Recording);
        solution.seal(Termination::Completed).unwrap();
        assert_eq!(solution.status(), SolutionStatus::Sealed);
        let err = solution.record(1.0, &DVector::zeros(2)).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"Solution error: Cannot record into a solution in the Sealed state");
        assert!(solution.seal(Termination::Completed).is_err());
        assert_eq!(solution.termination(), Some(&Termination::Completed));
        assert_eq!(solution.get("x").unwrap().len(), 1);
    }

    #[test]
    fn restricted_solution_only_has_registered_variables() {
        let solution = solution(&["2x"]);
        let series = solution.get("2x").unwrap();
        assert_eq!(series.scalars(), Some(vec![0.0, 2.0, 4.0, 6.0]));
        for name in ["x", "integral of x", "offset", "Time [s]"] {
            assert_eq!(
                solution.get(name).unwrap_err(),
                SolrecError::SolutionError(SolutionError::UnrecordedVariable {
                    name: name.to_string()
                })
            );
        }
        assert_eq!(
            solution.get("Voltage [V]").unwrap_err(),
            SolrecError::ModelError(ModelError::UnknownVariable {
                name: "Voltage [V]".to_string()
            })
        );
        assert_eq!(
            solution.last_state(),
            Some((3.0, &DVector::from_vec(vec![3.0, -3.0])))
        );
    }

    #[test]
    fn unrestricted_solution_computes_on_demand() {
        let solution = solution(&[]);
        assert!(!solution.is_restricted());
        let integral = solution.get("integral of x").unwrap();
        assert_eq!(integral.scalars(), Some(vec![0.0, 0.5, 2.0, 4.5]));
        assert_eq!(solution.get("integral of x").unwrap(), integral);
        assert_eq!(
            solution.get("offset").unwrap().scalars(),
            Some(vec![1.0, 2.0, 3.0, 4.0])
        );
        assert_eq!(
            solution.get_at("x", &[0.5, 2.25]).unwrap(),
            vec![Value::Scalar(0.5), Value::Scalar(2.25)]
        );
    }

    #[test]
    fn cache_is_cleared_by_new_steps() {
        let mut solution = solution(&[]);
        assert_eq!(solution.get("x").unwrap().len(), 4);
        solution
            .record(4.0, &DVector::from_vec(vec![4.0, -4.0]))
            .unwrap();
        assert_eq!(solution.get("x").unwrap().len(), 5);
    }
}
