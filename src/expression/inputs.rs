use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Scalar;

/// Values for the input parameters of a model, supplied each time a model is solved.
///
/// Input parameters are left symbolic when a model is discretised, so a single discretised model
/// can be solved many times for different values without being rebuilt.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Scalar")]
pub struct Inputs<T: Scalar> {
    values: BTreeMap<String, T>,
}

impl<T: Scalar> Inputs<T> {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: T) -> Option<T> {
        self.values.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<T> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, T)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<T: Scalar, S: Into<String>> FromIterator<(S, T)> for Inputs<T> {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<T: Scalar, S: Into<String>, const N: usize> From<[(S, T); N]> for Inputs<T> {
    fn from(values: [(S, T); N]) -> Self {
        values.into_iter().collect()
    }
}
