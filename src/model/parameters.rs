use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{ModelError, SolrecError},
    model_error, Scalar,
};

/// The value bound to a model parameter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Scalar")]
pub enum ParameterValue<T: Scalar> {
    /// Fixed into the model when it is discretised.
    Value(T),
    /// Deferred to solve time, the value is taken from the [crate::Inputs] passed to each solve.
    Input,
}

impl<T: Scalar> From<T> for ParameterValue<T> {
    fn from(value: T) -> Self {
        ParameterValue::Value(value)
    }
}

/// A set of parameter values used to discretise a [crate::Model].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Scalar")]
pub struct ParameterValues<T: Scalar> {
    values: BTreeMap<String, ParameterValue<T>>,
}

impl<T: Scalar> ParameterValues<T> {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParameterValue<T>>) {
        self.values.insert(name.into(), value.into());
    }

    /// Mark a parameter as an input parameter.
    pub fn set_input(&mut self, name: impl Into<String>) {
        self.values.insert(name.into(), ParameterValue::Input);
    }

    /// Update several parameters at once. If `check_already_exists` is true, every name must
    /// already be present, otherwise nothing is changed and the first new name is reported.
    pub fn update<S, V>(
        &mut self,
        values: impl IntoIterator<Item = (S, V)>,
        check_already_exists: bool,
    ) -> Result<(), SolrecError>
    where
        S: Into<String>,
        V: Into<ParameterValue<T>>,
    {
        let values: Vec<(String, ParameterValue<T>)> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if check_already_exists {
            if let Some((name, _)) = values.iter().find(|(k, _)| !self.values.contains_key(k)) {
                return Err(model_error!(UnknownParameter { name: name.clone() }));
            }
        }
        self.values.extend(values);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<ParameterValue<T>> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter(|(_, v)| matches!(v, ParameterValue::Input))
            .map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParameterValue<T>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T: Scalar, S: Into<String>, V: Into<ParameterValue<T>>> FromIterator<(S, V)>
    for ParameterValues<T>
{
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_checks_existing_names() {
        let mut values: ParameterValues<f64> = [("R_c", 2.0), ("C_c", 60.0)].into_iter().collect();
        let err = values
            .update([("R_c", 3.0), ("Tab width [m]", 0.1)], true)
            .unwrap_err();
        assert_eq!(
            err,
            SolrecError::ModelError(ModelError::UnknownParameter {
                name: "Tab width [m]".to_string()
            })
        );
        // nothing was applied
        assert_eq!(values.get("R_c"), Some(ParameterValue::Value(2.0)));

        values
            .update([("R_c", 3.0), ("Tab width [m]", 0.1)], false)
            .unwrap();
        assert_eq!(values.get("R_c"), Some(ParameterValue::Value(3.0)));
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn input_parameters_are_listed() {
        let mut values = ParameterValues::<f64>::new();
        values.set("Ambient temperature [K]", 298.15);
        values.set_input("Current function [A]");
        assert_eq!(
            values.input_names().collect::<Vec<_>>(),
            vec!["Current function [A]"]
        );
        assert!(values.contains("Ambient temperature [K]"));
    }
}
