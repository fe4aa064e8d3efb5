use std::sync::Arc;

use nalgebra::DVector;
use tracing::trace;

use crate::{
    error::{SolrecError, SolutionError},
    expression::Accumulation,
    output::{OutputVariables, VariableId},
    solution_error, Expression, Inputs, Scalar, Value,
};

/// Running state for one recorded variable.
#[derive(Clone, Debug)]
enum Accumulator<T: Scalar> {
    Pointwise,
    TimeIntegral {
        previous: Option<(T, Value<T>)>,
        total: Option<Value<T>>,
    },
    DiscreteSum {
        total: Option<Value<T>>,
    },
}

impl<T: Scalar> Accumulator<T> {
    fn new(accumulation: Accumulation) -> Self {
        match accumulation {
            Accumulation::Pointwise => Accumulator::Pointwise,
            Accumulation::TimeIntegral => Accumulator::TimeIntegral {
                previous: None,
                total: None,
            },
            Accumulation::DiscreteSum => Accumulator::DiscreteSum { total: None },
        }
    }

    /// The value to record for a new step with pointwise value `value`, without changing the
    /// accumulator.
    fn stage(&self, t: T, value: &Value<T>) -> Result<Value<T>, SolrecError> {
        match self {
            Accumulator::Pointwise => Ok(value.clone()),
            Accumulator::TimeIntegral {
                previous: Some((t_prev, v_prev)),
                total: Some(total),
            } => {
                // trapezoidal rule
                let half_dt = (t - *t_prev) * T::from_f64_const(0.5);
                total.add(&v_prev.add(value)?.scale(half_dt))
            }
            Accumulator::TimeIntegral { .. } => Ok(value.zeros_like()),
            Accumulator::DiscreteSum { total: Some(total) } => total.add(value),
            Accumulator::DiscreteSum { total: None } => Ok(value.clone()),
        }
    }

    fn commit(&mut self, t: T, value: Value<T>, recorded: &Value<T>) {
        match self {
            Accumulator::Pointwise => {}
            Accumulator::TimeIntegral { previous, total } => {
                *previous = Some((t, value));
                *total = Some(recorded.clone());
            }
            Accumulator::DiscreteSum { total } => *total = Some(recorded.clone()),
        }
    }
}

/// Evaluate `expression` over a stored trajectory, applying its accumulation in the same way as
/// [StepRecorder::record].
pub(crate) fn evaluate_series<T: Scalar>(
    expression: &Expression<T>,
    t: &[T],
    states: &[DVector<T>],
    inputs: &Inputs<T>,
) -> Result<Vec<Value<T>>, SolrecError> {
    let mut accumulator = Accumulator::new(expression.accumulation());
    let mut values = Vec::with_capacity(t.len());
    for (&ti, y) in t.iter().zip(states.iter()) {
        let value = expression.evaluate(ti, y, inputs)?;
        let recorded = accumulator.stage(ti, &value)?;
        accumulator.commit(ti, value, &recorded);
        values.push(recorded);
    }
    Ok(values)
}

/// Records the registered output variables at each accepted step of a solve.
///
/// [StepRecorder::record] is all or nothing: either every registered variable gets a new entry
/// for the step or none does, so every series has exactly one entry per recorded step. When the
/// [OutputVariables] are restricted only the last state is kept, otherwise every state is kept
/// so that variables can be computed after the solve.
#[derive(Clone, Debug)]
pub struct StepRecorder<T: Scalar> {
    outputs: Arc<OutputVariables<T>>,
    nstates: usize,
    accumulators: Vec<Accumulator<T>>,
    t: Vec<T>,
    values: Vec<Vec<Value<T>>>,
    last_state: Option<DVector<T>>,
    trajectory: Option<Vec<DVector<T>>>,
}

impl<T: Scalar> StepRecorder<T> {
    pub fn new(outputs: Arc<OutputVariables<T>>, nstates: usize) -> Self {
        let accumulators = outputs
            .iter()
            .map(|(_, v)| Accumulator::new(v.expression.accumulation()))
            .collect();
        let values = vec![Vec::new(); outputs.len()];
        let trajectory = if outputs.is_restricted() {
            None
        } else {
            Some(Vec::new())
        };
        Self {
            outputs,
            nstates,
            accumulators,
            t: Vec::new(),
            values,
            last_state: None,
            trajectory,
        }
    }

    /// Record the accepted step `(t, y)`.
    pub fn record(&mut self, t: T, y: &DVector<T>, inputs: &Inputs<T>) -> Result<(), SolrecError> {
        if y.len() != self.nstates {
            return Err(solution_error!(StateLengthMismatch {
                expected: self.nstates,
                found: y.len(),
            }));
        }
        if let Some(&last) = self.t.last() {
            if t <= last {
                return Err(solution_error!(NonIncreasingTime {
                    time: t.as_f64(),
                    last: last.as_f64(),
                }));
            }
        }

        let mut staged = Vec::with_capacity(self.outputs.len());
        for ((_, variable), accumulator) in self.outputs.iter().zip(self.accumulators.iter()) {
            let value = variable.expression.evaluate(t, y, inputs)?;
            let recorded = accumulator.stage(t, &value)?;
            staged.push((value, recorded));
        }

        for (i, (value, recorded)) in staged.into_iter().enumerate() {
            self.accumulators[i].commit(t, value, &recorded);
            self.values[i].push(recorded);
        }
        self.t.push(t);
        match self.trajectory.as_mut() {
            Some(trajectory) => trajectory.push(y.clone()),
            None => match self.last_state.as_mut() {
                Some(last) => last.copy_from(y),
                None => self.last_state = Some(y.clone()),
            },
        }
        trace!(t = t.as_f64(), step = self.t.len() - 1, "recorded step");
        Ok(())
    }

    pub fn outputs(&self) -> &Arc<OutputVariables<T>> {
        &self.outputs
    }

    pub fn nstates(&self) -> usize {
        self.nstates
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn t(&self) -> &[T] {
        &self.t
    }

    pub fn values(&self, id: VariableId) -> &[Value<T>] {
        &self.values[id.index()]
    }

    /// The state at the last recorded step.
    pub fn last_state(&self) -> Option<(T, &DVector<T>)> {
        let t = *self.t.last()?;
        let y = match self.trajectory.as_ref() {
            Some(trajectory) => trajectory.last(),
            None => self.last_state.as_ref(),
        }?;
        Some((t, y))
    }

    /// Every recorded state, only kept when the outputs are unrestricted.
    pub fn trajectory(&self) -> Option<&[DVector<T>]> {
        self.trajectory.as_deref()
    }

    /// Total number of scalars held: time points, recorded values and retained states.
    pub fn retained_len(&self) -> usize {
        let values: usize = self
            .values
            .iter()
            .flat_map(|series| series.iter())
            .map(|v| v.len())
            .sum();
        let states = match self.trajectory.as_ref() {
            Some(trajectory) => trajectory.iter().map(|y| y.len()).sum(),
            None => self.last_state.as_ref().map_or(0, |y| y.len()),
        };
        self.t.len() + values + states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Model, ParameterValues};

    fn recorder(names: &[&str]) -> StepRecorder<f64> {
        let y = Expression::<f64>::state(0);
        let model = Model::builder("recorder")
            .states(2)
            .rhs(Expression::state_slice(0..2))
            .init(Expression::vector(DVector::from_vec(vec![0.0, 0.0])))
            .variable("y", y.clone())
            .variable("integral", y.time_integral())
            .variable("sum", y.discrete_sum())
            .variable("scaled", y * Expression::input("scale"))
            .build()
            .unwrap()
            .discretise(&ParameterValues::new())
            .unwrap();
        let outputs = OutputVariables::resolve(&model, names.iter().copied()).unwrap();
        StepRecorder::new(Arc::new(outputs), 2)
    }

    fn state(x: f64) -> DVector<f64> {
        DVector::from_vec(vec![x, 1.0])
    }

    #[test]
    fn time_integral_is_trapezoidal() {
        let mut recorder = recorder(&["integral", "y"]);
        let outputs = recorder.outputs().clone();
        let inputs = Inputs::new();
        // y = t on a uniform grid is integrated exactly
        for k in 0..5 {
            let t = 0.5 * k as f64;
            recorder.record(t, &state(t), &inputs).unwrap();
        }
        let integral = recorder.values(outputs.id("integral").unwrap());
        assert_eq!(integral[0], Value::Scalar(0.0));
        assert_eq!(integral[4], Value::Scalar(2.0));
        assert_eq!(recorder.len(), 5);
    }

    #[test]
    fn discrete_sum_includes_every_step() {
        let mut recorder = recorder(&["sum"]);
        let id = recorder.outputs().id("sum").unwrap();
        for (t, x) in [(0.0, 1.0), (1.0, 2.0), (3.0, 4.0)] {
            recorder.record(t, &state(x), &Inputs::new()).unwrap();
        }
        assert_eq!(
            recorder.values(id),
            &[Value::Scalar(1.0), Value::Scalar(3.0), Value::Scalar(7.0)]
        );
    }

    #[test]
    fn failed_step_commits_nothing() {
        let mut recorder = recorder(&["y", "scaled"]);
        let inputs = Inputs::from([("scale", 2.0)]);
        recorder.record(0.0, &state(1.0), &inputs).unwrap();
        let err = recorder.record(1.0, &state(2.0), &Inputs::new()).unwrap_err();
        assert!(err.to_string().contains("scale"));
        assert_eq!(recorder.len(), 1);
        let outputs = recorder.outputs().clone();
        for (id, _) in outputs.iter() {
            assert_eq!(recorder.values(id).len(), 1);
        }
        assert_eq!(recorder.last_state().unwrap().1, &state(1.0));

        recorder.record(1.0, &state(2.0), &inputs).unwrap();
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn rejects_out_of_order_and_wrong_sized_steps() {
        let mut recorder = recorder(&["y"]);
        recorder.record(1.0, &state(1.0), &Inputs::new()).unwrap();
        assert_eq!(
            recorder.record(1.0, &state(1.0), &Inputs::new()).unwrap_err(),
            SolrecError::SolutionError(SolutionError::NonIncreasingTime {
                time: 1.0,
                last: 1.0
            })
        );
        assert_eq!(
            recorder
                .record(2.0, &DVector::from_vec(vec![1.0]), &Inputs::new())
                .unwrap_err(),
            SolrecError::SolutionError(SolutionError::StateLengthMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn restricted_keeps_only_the_last_state() {
        let mut restricted = recorder(&["y"]);
        let mut unrestricted = recorder(&[]);
        for k in 0..10 {
            let t = k as f64;
            restricted.record(t, &state(t), &Inputs::new()).unwrap();
            unrestricted.record(t, &state(t), &Inputs::new()).unwrap();
        }
        assert!(restricted.trajectory().is_none());
        assert_eq!(unrestricted.trajectory().unwrap().len(), 10);
        // times + one value per step + one state
        assert_eq!(restricted.retained_len(), 10 + 10 + 2);
        // times + every state
        assert_eq!(unrestricted.retained_len(), 10 + 20);
        assert_eq!(restricted.last_state(), unrestricted.last_state());
    }

    #[test]
    fn evaluate_series_matches_recording() {
        let mut recorder = recorder(&["integral"]);
        let id = recorder.outputs().id("integral").unwrap();
        let t = [0.0, 1.0, 2.5];
        let states: Vec<_> = t.iter().map(|&t| state(t * t)).collect();
        for (ti, y) in t.iter().zip(states.iter()) {
            recorder.record(*ti, y, &Inputs::new()).unwrap();
        }
        let expression = recorder.outputs().get(id).expression.clone();
        let series = evaluate_series(&expression, &t, &states, &Inputs::new()).unwrap();
        assert_eq!(series, recorder.values(id));
    }
}
