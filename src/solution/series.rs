use serde::Serialize;

use crate::{
    error::{SolrecError, SolutionError},
    solution_error, Scalar, Value,
};

/// The recorded values of one variable, one entry per recorded step.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(bound = "T: Scalar")]
pub struct RecordedSeries<T: Scalar> {
    name: String,
    t: Vec<T>,
    values: Vec<Value<T>>,
}

impl<T: Scalar> RecordedSeries<T> {
    pub(crate) fn new(name: impl Into<String>, t: Vec<T>, values: Vec<Value<T>>) -> Self {
        Self {
            name: name.into(),
            t,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn t(&self) -> &[T] {
        &self.t
    }

    pub fn values(&self) -> &[Value<T>] {
        &self.values
    }

    pub fn last(&self) -> Option<(T, &Value<T>)> {
        Some((*self.t.last()?, self.values.last()?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (T, &Value<T>)> {
        self.t.iter().copied().zip(self.values.iter())
    }

    /// The values as scalars, `None` if any recorded value is not a scalar.
    pub fn scalars(&self) -> Option<Vec<T>> {
        self.values.iter().map(|v| v.as_scalar()).collect()
    }

    /// Piecewise-linear interpolation of the series at each of `t_eval`.
    ///
    /// Every time must lie within the recorded range, there is no extrapolation.
    pub fn interpolate(&self, t_eval: &[T]) -> Result<Vec<Value<T>>, SolrecError> {
        let (first, last) = match (self.t.first(), self.t.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(solution_error!(NoRecordedSteps)),
        };
        t_eval
            .iter()
            .map(|&t| {
                if !(t >= first && t <= last) {
                    return Err(solution_error!(InterpolationTimeOutOfRange {
                        time: t.as_f64(),
                        start: first.as_f64(),
                        end: last.as_f64(),
                    }));
                }
                if t == last {
                    return Ok(self.values[self.values.len() - 1].clone());
                }
                // first index with a time after t, at least 1 since t >= first
                let i = self.t.partition_point(|&ti| ti <= t);
                let (t0, t1) = (self.t[i - 1], self.t[i]);
                let theta = (t - t0) / (t1 - t0);
                self.values[i - 1].lerp(&self.values[i], theta)
            })
            .collect()
    }
}
