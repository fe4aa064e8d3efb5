use std::collections::HashMap;

use tracing::debug;

use crate::{
    error::{ModelError, SolrecError},
    model_error, DiscretisedModel, Expression, Scalar,
};

/// Handle to a registered output variable, valid for the [OutputVariables] that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(usize);

impl VariableId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct OutputVariable<T: Scalar> {
    pub name: String,
    pub expression: Expression<T>,
}

/// The set of variables recorded at each step of a solve.
///
/// Names are looked up in the model once, when the set is resolved, and are addressed through
/// [VariableId] handles from then on. An empty set of names means no restriction: nothing is
/// evaluated per step, the full trajectory is kept instead and any variable can be computed after
/// the solve.
#[derive(Clone, Debug)]
pub struct OutputVariables<T: Scalar> {
    variables: Vec<OutputVariable<T>>,
    index: HashMap<String, VariableId>,
}

impl<T: Scalar> OutputVariables<T> {
    /// No restriction, keep the full trajectory.
    pub fn unrestricted() -> Self {
        Self {
            variables: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Resolve `names` against the variables of `model`. Duplicate names are registered once.
    pub fn resolve<S: AsRef<str>>(
        model: &DiscretisedModel<T>,
        names: impl IntoIterator<Item = S>,
    ) -> Result<Self, SolrecError> {
        let mut ret = Self::unrestricted();
        for name in names {
            let name = name.as_ref();
            if ret.index.contains_key(name) {
                continue;
            }
            let expression = model
                .variable(name)
                .ok_or_else(|| {
                    model_error!(UnknownVariable {
                        name: name.to_string()
                    })
                })?
                .clone();
            let id = VariableId(ret.variables.len());
            ret.index.insert(name.to_string(), id);
            ret.variables.push(OutputVariable {
                name: name.to_string(),
                expression,
            });
        }
        debug!(
            model = model.name(),
            nvariables = ret.variables.len(),
            restricted = ret.is_restricted(),
            "resolved output variables"
        );
        Ok(ret)
    }

    pub fn id(&self, name: &str) -> Option<VariableId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, id: VariableId) -> &OutputVariable<T> {
        &self.variables[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &OutputVariable<T>)> {
        self.variables
            .iter()
            .enumerate()
            .map(|(i, v)| (VariableId(i), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn is_restricted(&self) -> bool {
        !self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Model, ParameterValues};

    fn model() -> DiscretisedModel<f64> {
        Model::builder("two states")
            .states(2)
            .rhs(Expression::state_slice(0..2))
            .init(Expression::vector(nalgebra::DVector::from_vec(vec![1.0, 1.0])))
            .variable("a", Expression::state(0))
            .variable("b", Expression::state(1))
            .build()
            .unwrap()
            .discretise(&ParameterValues::new())
            .unwrap()
    }

    #[test]
    fn resolve_collapses_duplicates() {
        let outputs = OutputVariables::resolve(&model(), ["b", "a", "b"]).unwrap();
        assert!(outputs.is_restricted());
        assert_eq!(outputs.names().collect::<Vec<_>>(), vec!["b", "a"]);
        let id = outputs.id("a").unwrap();
        assert_eq!(id.index(), 1);
        assert_eq!(outputs.get(id).name, "a");
        assert!(outputs.id("Time [s]").is_none());
    }

    #[test]
    fn resolve_rejects_unknown_names() {
        let err = OutputVariables::resolve(&model(), ["a", "Voltage [V]"]).unwrap_err();
        assert_eq!(
            err,
            SolrecError::ModelError(ModelError::UnknownVariable {
                name: "Voltage [V]".to_string()
            })
        );
    }

    #[test]
    fn empty_names_is_unrestricted() {
        let outputs = OutputVariables::resolve(&model(), Vec::<String>::new()).unwrap();
        assert!(!outputs.is_restricted());
        assert!(outputs.is_empty());
    }
}
