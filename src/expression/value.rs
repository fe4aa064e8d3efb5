use nalgebra::{DMatrix, DVector};
use num_traits::Zero;
use serde::Serialize;

use crate::{
    error::{EvaluationError, SolrecError},
    evaluation_error, Scalar,
};

/// The numeric result of evaluating an [crate::Expression].
///
/// Scalars broadcast over vectors and matrices in element-wise operations, vectors and matrices
/// must otherwise have matching shapes.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(bound = "T: Scalar")]
pub enum Value<T: Scalar> {
    Scalar(T),
    Vector(DVector<T>),
    Matrix(DMatrix<T>),
}

impl<T: Scalar> Value<T> {
    pub fn as_scalar(&self) -> Option<T> {
        match self {
            Value::Scalar(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&DVector<T>> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Number of scalars held by this value.
    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Vector(v) => v.len(),
            Value::Matrix(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> String {
        match self {
            Value::Scalar(_) => "scalar".to_string(),
            Value::Vector(v) => format!("vector({})", v.len()),
            Value::Matrix(m) => format!("matrix({}x{})", m.nrows(), m.ncols()),
        }
    }

    /// A value of the same shape filled with zeros.
    pub fn zeros_like(&self) -> Self {
        match self {
            Value::Scalar(_) => Value::Scalar(T::zero()),
            Value::Vector(v) => Value::Vector(DVector::zeros(v.len())),
            Value::Matrix(m) => Value::Matrix(DMatrix::zeros(m.nrows(), m.ncols())),
        }
    }

    /// Flatten into a vector, scalars become a vector of length one.
    pub fn into_vector(self) -> DVector<T> {
        match self {
            Value::Scalar(x) => DVector::from_element(1, x),
            Value::Vector(v) => v,
            Value::Matrix(m) => DVector::from_column_slice(m.as_slice()),
        }
    }

    pub fn map(&self, f: impl Fn(T) -> T) -> Self {
        match self {
            Value::Scalar(x) => Value::Scalar(f(*x)),
            Value::Vector(v) => Value::Vector(v.map(f)),
            Value::Matrix(m) => Value::Matrix(m.map(f)),
        }
    }

    /// Apply `f` element-wise to `self` and `other`, broadcasting scalars.
    pub fn zip_map(
        &self,
        other: &Self,
        op: &'static str,
        f: impl Fn(T, T) -> T,
    ) -> Result<Self, SolrecError> {
        let value = match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(f(*a, *b)),
            (Value::Scalar(a), Value::Vector(v)) => Value::Vector(v.map(|x| f(*a, x))),
            (Value::Vector(v), Value::Scalar(b)) => Value::Vector(v.map(|x| f(x, *b))),
            (Value::Scalar(a), Value::Matrix(m)) => Value::Matrix(m.map(|x| f(*a, x))),
            (Value::Matrix(m), Value::Scalar(b)) => Value::Matrix(m.map(|x| f(x, *b))),
            (Value::Vector(u), Value::Vector(v)) if u.len() == v.len() => {
                Value::Vector(u.zip_map(v, |x, y| f(x, y)))
            }
            (Value::Matrix(a), Value::Matrix(b)) if a.shape() == b.shape() => {
                Value::Matrix(a.zip_map(b, |x, y| f(x, y)))
            }
            _ => {
                return Err(evaluation_error!(ShapeMismatch {
                    op: op,
                    left: self.shape(),
                    right: other.shape(),
                }))
            }
        };
        Ok(value)
    }

    pub fn add(&self, other: &Self) -> Result<Self, SolrecError> {
        self.zip_map(other, "+", |a, b| a + b)
    }

    pub fn scale(&self, alpha: T) -> Self {
        self.map(|x| x * alpha)
    }

    /// Linear interpolation `self + theta * (other - self)`.
    pub fn lerp(&self, other: &Self, theta: T) -> Result<Self, SolrecError> {
        self.zip_map(other, "lerp", |a, b| a + theta * (b - a))
    }
}

impl<T: Scalar> From<T> for Value<T> {
    fn from(x: T) -> Self {
        Value::Scalar(x)
    }
}

impl<T: Scalar> From<DVector<T>> for Value<T> {
    fn from(v: DVector<T>) -> Self {
        Value::Vector(v)
    }
}

impl<T: Scalar> From<DMatrix<T>> for Value<T> {
    fn from(m: DMatrix<T>) -> Self {
        Value::Matrix(m)
    }
}
