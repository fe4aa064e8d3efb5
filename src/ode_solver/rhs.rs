use std::sync::Arc;

use nalgebra::DVector;

use crate::{error::SolrecError, DiscretisedModel, Inputs, Scalar};

/// The right-hand side `dy/dt = f(t, y)` of an ODE.
pub trait Rhs<T: Scalar> {
    fn nstates(&self) -> usize;

    /// Compute `f(t, y)` into `dy`.
    fn call_inplace(&self, y: &DVector<T>, t: T, dy: &mut DVector<T>) -> Result<(), SolrecError>;
}

/// A right-hand side given by a closure.
pub struct Closure<F> {
    func: F,
    nstates: usize,
}

impl<F> Closure<F> {
    pub fn new(func: F, nstates: usize) -> Self {
        Self { func, nstates }
    }
}

impl<T, F> Rhs<T> for Closure<F>
where
    T: Scalar,
    F: Fn(&DVector<T>, T, &mut DVector<T>),
{
    fn nstates(&self) -> usize {
        self.nstates
    }

    fn call_inplace(&self, y: &DVector<T>, t: T, dy: &mut DVector<T>) -> Result<(), SolrecError> {
        (self.func)(y, t, dy);
        Ok(())
    }
}

/// The right-hand side of a [DiscretisedModel] with its input parameters bound.
pub struct ModelRhs<T: Scalar> {
    model: Arc<DiscretisedModel<T>>,
    inputs: Inputs<T>,
}

impl<T: Scalar> ModelRhs<T> {
    pub fn new(model: Arc<DiscretisedModel<T>>, inputs: Inputs<T>) -> Self {
        Self { model, inputs }
    }
}

impl<T: Scalar> Rhs<T> for ModelRhs<T> {
    fn nstates(&self) -> usize {
        self.model.nstates()
    }

    fn call_inplace(&self, y: &DVector<T>, t: T, dy: &mut DVector<T>) -> Result<(), SolrecError> {
        self.model.rhs_inplace(t, y, &self.inputs, dy)
    }
}
