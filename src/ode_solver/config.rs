use serde::{Deserialize, Serialize};

use crate::Scalar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Scalar")]
pub struct ExplicitRkConfig<T> {
    pub minimum_timestep: T,
    pub maximum_error_test_failures: usize,
    pub maximum_timestep_growth: T,
    pub minimum_timestep_shrink: T,
}

impl<T: Scalar> Default for ExplicitRkConfig<T> {
    fn default() -> Self {
        Self {
            minimum_timestep: T::from_f64_const(1e-13),
            maximum_error_test_failures: 40,
            maximum_timestep_growth: T::from_f64_const(10.0),
            minimum_timestep_shrink: T::from_f64_const(0.2),
        }
    }
}
