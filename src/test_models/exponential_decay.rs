use crate::{Expression, Model, ParameterValues, Scalar};

// exponential decay problem
// dy/dt = -ky, y(0) = y0
pub fn exponential_decay<T: Scalar>() -> (Model<T>, ParameterValues<T>) {
    let k = Expression::<T>::parameter("k");
    let y = Expression::<T>::state(0);
    let model = Model::builder("exponential decay")
        .states(1)
        .parameter("k")
        .parameter("y0")
        .rhs(-(k.clone() * y.clone()))
        .init(Expression::parameter("y0"))
        .variable("y", y.clone())
        .variable("Decay rate", k * y.clone())
        .variable("Integral of y", y.time_integral())
        .build()
        .expect("exponential decay model is valid");

    let mut parameter_values = ParameterValues::new();
    parameter_values.set("k", T::from_f64_const(0.1));
    parameter_values.set("y0", T::from_f64_const(1.0));
    (model, parameter_values)
}
