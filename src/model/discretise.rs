use std::collections::{BTreeSet, HashMap};

use nalgebra::DVector;
use tracing::debug;

use super::{Model, ModelVariable, ParameterKind, ParameterValue, ParameterValues};
use crate::{
    discretisation_error,
    error::{DiscretisationError, EvaluationError, SolrecError},
    evaluation_error, Expression, Inputs, Scalar, Value,
};

/// A model with every parameter either fixed to a value or replaced by an input parameter.
///
/// The expressions held here contain no parameter leaves, so they can be evaluated directly
/// given a time, a state and the [Inputs] named by [DiscretisedModel::required_inputs].
#[derive(Clone, Debug)]
pub struct DiscretisedModel<T: Scalar> {
    name: String,
    nstates: usize,
    rhs: Expression<T>,
    init: Expression<T>,
    variables: Vec<ModelVariable<T>>,
    index: HashMap<String, usize>,
    required_inputs: BTreeSet<String>,
}

impl<T: Scalar> Model<T> {
    /// Fix the parameters of the model using `parameter_values`.
    ///
    /// Parameters set to [ParameterValue::Input] are left symbolic and must be supplied each time
    /// the model is evaluated. A [ParameterKind::Structural] parameter can not be deferred this
    /// way, asking for it fails here with [DiscretisationError::StructuralInput] rather than later
    /// during a solve.
    pub fn discretise(
        &self,
        parameter_values: &ParameterValues<T>,
    ) -> Result<DiscretisedModel<T>, SolrecError> {
        for (name, kind) in self.parameters() {
            match (kind, parameter_values.get(name)) {
                (ParameterKind::Structural, Some(ParameterValue::Input)) => {
                    return Err(discretisation_error!(StructuralInput {
                        parameter: name.to_string()
                    }))
                }
                (_, None) => {
                    return Err(discretisation_error!(MissingParameterValue {
                        parameter: name.to_string()
                    }))
                }
                _ => {}
            }
        }

        let mut substitute = |name: &str| match parameter_values.get(name) {
            Some(ParameterValue::Value(value)) => Ok(Expression::constant(value)),
            Some(ParameterValue::Input) => Ok(Expression::input(name)),
            None => Err(discretisation_error!(MissingParameterValue {
                parameter: name.to_string()
            })),
        };
        let rhs = self.rhs().substitute_parameters(&mut substitute)?;
        let init = self.init().substitute_parameters(&mut substitute)?;
        let variables = self
            .variables()
            .iter()
            .map(|v| {
                Ok(ModelVariable {
                    name: v.name.clone(),
                    expression: v.expression.substitute_parameters(&mut substitute)?,
                })
            })
            .collect::<Result<Vec<_>, SolrecError>>()?;

        let mut required_inputs = rhs.input_names();
        required_inputs.extend(init.input_names());
        for v in variables.iter() {
            required_inputs.extend(v.expression.input_names());
        }
        let index = variables
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name.clone(), i))
            .collect();

        debug!(
            model = self.name(),
            nstates = self.nstates(),
            nvariables = variables.len(),
            inputs = ?required_inputs,
            "discretised model"
        );

        Ok(DiscretisedModel {
            name: self.name().to_string(),
            nstates: self.nstates(),
            rhs,
            init,
            variables,
            index,
            required_inputs,
        })
    }
}

impl<T: Scalar> DiscretisedModel<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nstates(&self) -> usize {
        self.nstates
    }

    pub fn variable(&self, name: &str) -> Option<&Expression<T>> {
        self.index.get(name).map(|&i| &self.variables[i].expression)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    /// Names of the input parameters that must be supplied to evaluate this model.
    pub fn required_inputs(&self) -> &BTreeSet<String> {
        &self.required_inputs
    }

    /// Check that `inputs` covers every input parameter of the model.
    pub fn check_inputs(&self, inputs: &Inputs<T>) -> Result<(), SolrecError> {
        match self.required_inputs.iter().find(|name| !inputs.contains(name)) {
            Some(name) => Err(evaluation_error!(MissingInput { name: name.clone() })),
            None => Ok(()),
        }
    }

    pub fn initial_state(&self, t0: T, inputs: &Inputs<T>) -> Result<DVector<T>, SolrecError> {
        let empty = DVector::zeros(0);
        let y0 = match self.init.evaluate(t0, &empty, inputs)? {
            Value::Scalar(x) => DVector::from_element(1, x),
            other => other.into_vector(),
        };
        if y0.len() != self.nstates {
            return Err(discretisation_error!(InitialConditionsSize {
                expected: self.nstates,
                found: y0.len(),
            }));
        }
        Ok(y0)
    }

    /// Evaluate the right-hand side into `dy`.
    pub fn rhs_inplace(
        &self,
        t: T,
        y: &DVector<T>,
        inputs: &Inputs<T>,
        dy: &mut DVector<T>,
    ) -> Result<(), SolrecError> {
        match self.rhs.evaluate(t, y, inputs)? {
            Value::Scalar(x) if self.nstates == 1 && dy.len() == 1 => dy[0] = x,
            Value::Vector(v) if v.len() == self.nstates && dy.len() == self.nstates => {
                dy.copy_from(&v)
            }
            other => {
                return Err(discretisation_error!(RhsSize {
                    expected: self.nstates,
                    found: other.len(),
                }))
            }
        }
        Ok(())
    }
}
