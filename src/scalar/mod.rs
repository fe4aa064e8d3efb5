use std::fmt::{Debug, Display};

/// The floating point type used for time, state and recorded values.
///
/// Implemented for `f64` and `f32`.
pub trait Scalar:
    nalgebra::RealField
    + num_traits::FromPrimitive
    + num_traits::ToPrimitive
    + serde::Serialize
    + for<'de> serde::Deserialize<'de>
    + Display
    + Debug
    + Copy
    + PartialOrd
    + Send
    + Sync
    + 'static
{
    const EPSILON: Self;
    const INFINITY: Self;
    const NAN: Self;

    /// Convert an `f64` constant into this scalar type.
    fn from_f64_const(value: f64) -> Self;

    /// Lossy conversion used for error messages and logging.
    fn as_f64(self) -> f64;
}

impl Scalar for f64 {
    const EPSILON: Self = f64::EPSILON;
    const INFINITY: Self = f64::INFINITY;
    const NAN: Self = f64::NAN;
    fn from_f64_const(value: f64) -> Self {
        value
    }
    fn as_f64(self) -> f64 {
        self
    }
}
impl Scalar for f32 {
    const EPSILON: Self = f32::EPSILON;
    const INFINITY: Self = f32::INFINITY;
    const NAN: Self = f32::NAN;
    fn from_f64_const(value: f64) -> Self {
        value as f32
    }
    fn as_f64(self) -> f64 {
        self as f64
    }
}
