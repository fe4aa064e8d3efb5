use std::collections::{BTreeMap, HashMap};

use crate::{
    error::{ModelError, SolrecError},
    model_error, Expression, Scalar,
};

pub mod discretise;
pub mod parameters;

pub use discretise::DiscretisedModel;
pub use parameters::{ParameterValue, ParameterValues};

/// How a declared parameter enters the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterKind {
    /// Only appears in expressions, so it may be deferred to solve time as an input parameter.
    Scalar,
    /// Determines the structure of the discretised model (e.g. a geometric length), so its value
    /// must be fixed when the model is discretised.
    Structural,
}

/// A named variable defined by a model.
#[derive(Clone, Debug)]
pub struct ModelVariable<T: Scalar> {
    pub name: String,
    pub expression: Expression<T>,
}

/// A symbolic ODE model `dy/dt = rhs(t, y)`, `y(t0) = init`, with named variables.
///
/// The right-hand side, initial conditions and variables are [Expression]s that may refer to
/// declared parameters. A model is turned into something that can be solved by binding its
/// parameters with [Model::discretise].
///
/// # Example
///
/// ```
/// use solrec::{Expression, Model};
///
/// let k = Expression::<f64>::parameter("k");
/// let y = Expression::<f64>::state(0);
/// let model = Model::builder("decay")
///     .states(1)
///     .parameter("k")
///     .rhs(-(k * y.clone()))
///     .init(Expression::constant(1.0))
///     .variable("y", y)
///     .build()
///     .unwrap();
/// assert_eq!(model.nstates(), 1);
/// assert!(model.variable("y").is_some());
/// ```
#[derive(Clone, Debug)]
pub struct Model<T: Scalar> {
    name: String,
    nstates: usize,
    rhs: Expression<T>,
    init: Expression<T>,
    variables: Vec<ModelVariable<T>>,
    index: HashMap<String, usize>,
    parameters: BTreeMap<String, ParameterKind>,
}

impl<T: Scalar> Model<T> {
    /// Name of the variable every model defines for the solve time.
    pub const TIME_VARIABLE: &'static str = "Time [s]";

    pub fn builder(name: impl Into<String>) -> ModelBuilder<T> {
        ModelBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nstates(&self) -> usize {
        self.nstates
    }

    pub fn rhs(&self) -> &Expression<T> {
        &self.rhs
    }

    pub fn init(&self) -> &Expression<T> {
        &self.init
    }

    pub fn variable(&self, name: &str) -> Option<&Expression<T>> {
        self.index.get(name).map(|&i| &self.variables[i].expression)
    }

    pub fn variables(&self) -> &[ModelVariable<T>] {
        &self.variables
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    pub fn parameter_kind(&self, name: &str) -> Option<ParameterKind> {
        self.parameters.get(name).copied()
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, ParameterKind)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Builder for a [Model], validating names and parameter references in [ModelBuilder::build].
pub struct ModelBuilder<T: Scalar> {
    name: String,
    nstates: Option<usize>,
    rhs: Option<Expression<T>>,
    init: Option<Expression<T>>,
    variables: Vec<ModelVariable<T>>,
    parameters: BTreeMap<String, ParameterKind>,
}

impl<T: Scalar> ModelBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nstates: None,
            rhs: None,
            init: None,
            variables: Vec::new(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn states(mut self, nstates: usize) -> Self {
        self.nstates = Some(nstates);
        self
    }

    pub fn rhs(mut self, rhs: Expression<T>) -> Self {
        self.rhs = Some(rhs);
        self
    }

    pub fn init(mut self, init: Expression<T>) -> Self {
        self.init = Some(init);
        self
    }

    pub fn variable(mut self, name: impl Into<String>, expression: Expression<T>) -> Self {
        self.variables.push(ModelVariable {
            name: name.into(),
            expression,
        });
        self
    }

    pub fn parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), ParameterKind::Scalar);
        self
    }

    pub fn structural_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), ParameterKind::Structural);
        self
    }

    pub fn build(self) -> Result<Model<T>, SolrecError> {
        let nstates = self
            .nstates
            .ok_or_else(|| model_error!(BuilderError, "number of states not set"))?;
        let rhs = self
            .rhs
            .ok_or_else(|| model_error!(BuilderError, "right-hand side not set"))?;
        let init = self
            .init
            .ok_or_else(|| model_error!(BuilderError, "initial conditions not set"))?;

        let mut variables = self.variables;
        if !variables.iter().any(|v| v.name == Model::<T>::TIME_VARIABLE) {
            variables.push(ModelVariable {
                name: Model::<T>::TIME_VARIABLE.to_string(),
                expression: Expression::time(),
            });
        }

        let mut index = HashMap::with_capacity(variables.len());
        for (i, v) in variables.iter().enumerate() {
            if index.insert(v.name.clone(), i).is_some() {
                return Err(model_error!(DuplicateVariable {
                    name: v.name.clone()
                }));
            }
        }

        let expressions = std::iter::once(&rhs)
            .chain(std::iter::once(&init))
            .chain(variables.iter().map(|v| &v.expression));
        for expr in expressions {
            if let Some(name) = expr
                .parameter_names()
                .into_iter()
                .find(|p| !self.parameters.contains_key(p))
            {
                return Err(model_error!(UnknownParameter { name: name }));
            }
            if expr.state_extent() > nstates {
                return Err(model_error!(
                    BuilderError,
                    format!(
                        "expression {expr} reads state entries beyond the {nstates} model states"
                    )
                ));
            }
        }

        Ok(Model {
            name: self.name,
            nstates,
            rhs,
            init,
            variables,
            index,
            parameters: self.parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ModelBuilder<f64> {
        Model::builder("test")
            .states(2)
            .parameter("k")
            .rhs(Expression::concatenate([
                Expression::<f64>::parameter("k") * Expression::state(0),
                Expression::state(0),
            ]))
            .init(Expression::vector(nalgebra::DVector::from_vec(vec![1.0, 0.0])))
    }

    #[test]
    fn build_adds_time_variable() {
        let model = builder().variable("x", Expression::state(1)).build().unwrap();
        assert_eq!(
            model.variable_names().collect::<Vec<_>>(),
            vec!["x", "Time [s]"]
        );
        assert_eq!(model.parameter_kind("k"), Some(ParameterKind::Scalar));
    }

    #[test]
    fn build_rejects_bad_models() {
        let err = builder()
            .variable("x", Expression::state(1))
            .variable("x", Expression::state(0))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SolrecError::ModelError(ModelError::DuplicateVariable {
                name: "x".to_string()
            })
        );

        let err = builder()
            .variable("x", Expression::parameter("missing"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SolrecError::ModelError(ModelError::UnknownParameter {
                name: "missing".to_string()
            })
        );

        let err = builder().variable("x", Expression::state(2)).build().unwrap_err();
        assert!(matches!(
            err,
            SolrecError::ModelError(ModelError::BuilderError(_))
        ));

        let err = Model::<f64>::builder("no rhs").states(1).build().unwrap_err();
        assert!(err.to_string().contains("right-hand side"));
    }
}
