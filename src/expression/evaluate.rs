use nalgebra::{DVector, RealField};
use num_traits::Zero;

use super::{BinaryOp, Expression, Inputs, Node, Reduction, UnaryOp, Value};
use crate::{
    error::{EvaluationError, SolrecError},
    evaluation_error, Scalar,
};

impl<T: Scalar> Expression<T> {
    /// Evaluate the expression at time `t` and state `y`, looking up input parameters in `inputs`.
    ///
    /// This is a pure function of its arguments. The [super::Accumulation] tag is ignored here,
    /// accumulation across steps is done by the [crate::StepRecorder].
    pub fn evaluate(&self, t: T, y: &DVector<T>, inputs: &Inputs<T>) -> Result<Value<T>, SolrecError> {
        eval_node(self.node(), t, y, inputs)
    }

    /// Evaluate an expression that is expected to give a scalar, vectors of length one are accepted.
    pub fn evaluate_scalar(&self, t: T, y: &DVector<T>, inputs: &Inputs<T>) -> Result<T, SolrecError> {
        match self.evaluate(t, y, inputs)? {
            Value::Scalar(x) => Ok(x),
            Value::Vector(v) if v.len() == 1 => Ok(v[0]),
            other => Err(evaluation_error!(ShapeMismatch {
                op: "evaluate_scalar",
                left: other.shape(),
                right: "scalar".to_string(),
            })),
        }
    }
}

fn eval_node<T: Scalar>(
    node: &Node<T>,
    t: T,
    y: &DVector<T>,
    inputs: &Inputs<T>,
) -> Result<Value<T>, SolrecError> {
    let value = match node {
        Node::Constant(value) => value.clone(),
        Node::Time => Value::Scalar(t),
        Node::StateIndex(i) => {
            if *i >= y.len() {
                return Err(evaluation_error!(StateIndexOutOfBounds {
                    start: *i,
                    end: *i + 1,
                    len: y.len(),
                }));
            }
            Value::Scalar(y[*i])
        }
        Node::StateSlice(range) => {
            if range.end > y.len() || range.start > range.end {
                return Err(evaluation_error!(StateIndexOutOfBounds {
                    start: range.start,
                    end: range.end,
                    len: y.len(),
                }));
            }
            Value::Vector(y.rows(range.start, range.end - range.start).into_owned())
        }
        Node::Parameter(name) => {
            return Err(evaluation_error!(UnboundParameter { name: name.clone() }))
        }
        Node::Input(name) => match inputs.get(name) {
            Some(value) => Value::Scalar(value),
            None => return Err(evaluation_error!(MissingInput { name: name.clone() })),
        },
        Node::Unary(op, child) => {
            let value = eval_node(child, t, y, inputs)?;
            apply_unary(*op, &value)
        }
        Node::Binary(op, lhs, rhs) => {
            let lhs = eval_node(lhs, t, y, inputs)?;
            let rhs = eval_node(rhs, t, y, inputs)?;
            apply_binary(*op, &lhs, &rhs)?
        }
        Node::Reduce(op, child) => {
            let value = eval_node(child, t, y, inputs)?;
            apply_reduction(*op, value)?
        }
        Node::Index(child, i) => match eval_node(child, t, y, inputs)? {
            Value::Scalar(x) if *i == 0 => Value::Scalar(x),
            Value::Vector(v) if *i < v.len() => Value::Scalar(v[*i]),
            Value::Matrix(m) if *i < m.len() => Value::Scalar(m[*i]),
            other => {
                return Err(evaluation_error!(IndexOutOfBounds {
                    index: *i,
                    len: other.len(),
                }))
            }
        },
        Node::Concatenate(children) => {
            let mut entries = Vec::new();
            for child in children {
                entries.extend(eval_node(child, t, y, inputs)?.into_vector().iter().copied());
            }
            Value::Vector(DVector::from_vec(entries))
        }
    };
    Ok(value)
}

fn apply_unary<T: Scalar>(op: UnaryOp, value: &Value<T>) -> Value<T> {
    match op {
        UnaryOp::Neg => value.map(|x| -x),
        UnaryOp::Exp => value.map(|x| x.exp()),
        UnaryOp::Ln => value.map(|x| x.ln()),
        UnaryOp::Sqrt => value.map(|x| x.sqrt()),
        UnaryOp::Abs => value.map(num_traits::abs),
        UnaryOp::Sin => value.map(|x| x.sin()),
        UnaryOp::Cos => value.map(|x| x.cos()),
        UnaryOp::Tanh => value.map(|x| x.tanh()),
    }
}

fn apply_binary<T: Scalar>(op: BinaryOp, lhs: &Value<T>, rhs: &Value<T>) -> Result<Value<T>, SolrecError> {
    match op {
        BinaryOp::Add => lhs.zip_map(rhs, "+", |a, b| a + b),
        BinaryOp::Sub => lhs.zip_map(rhs, "-", |a, b| a - b),
        BinaryOp::Mul => lhs.zip_map(rhs, "*", |a, b| a * b),
        BinaryOp::Div => lhs.zip_map(rhs, "/", |a, b| a / b),
        BinaryOp::Pow => lhs.zip_map(rhs, "^", |a, b| a.powf(b)),
        BinaryOp::Min => lhs.zip_map(rhs, "min", |a, b| RealField::min(a, b)),
        BinaryOp::Max => lhs.zip_map(rhs, "max", |a, b| RealField::max(a, b)),
        BinaryOp::MatMul => match (lhs, rhs) {
            (Value::Matrix(m), Value::Vector(v)) if m.ncols() == v.len() => Ok(Value::Vector(m * v)),
            (Value::Matrix(a), Value::Matrix(b)) if a.ncols() == b.nrows() => Ok(Value::Matrix(a * b)),
            _ => Err(evaluation_error!(ShapeMismatch {
                op: "@",
                left: lhs.shape(),
                right: rhs.shape(),
            })),
        },
    }
}

fn apply_reduction<T: Scalar>(op: Reduction, value: Value<T>) -> Result<Value<T>, SolrecError> {
    let v = match value {
        Value::Scalar(x) => return Ok(Value::Scalar(x)),
        other => other.into_vector(),
    };
    if v.is_empty() && op != Reduction::Sum {
        return Err(evaluation_error!(EmptyReduction {
            op: reduction_name(op),
        }));
    }
    let sum = || v.iter().fold(T::zero(), |acc, &x| acc + x);
    let reduced = match op {
        Reduction::Sum => sum(),
        Reduction::Mean => sum() / T::from_f64_const(v.len() as f64),
        Reduction::Min => v.iter().skip(1).fold(v[0], |acc, &x| RealField::min(acc, x)),
        Reduction::Max => v.iter().skip(1).fold(v[0], |acc, &x| RealField::max(acc, x)),
    };
    Ok(Value::Scalar(reduced))
}

fn reduction_name(op: Reduction) -> &'static str {
    match op {
        Reduction::Sum => "sum",
        Reduction::Mean => "mean",
        Reduction::Min => "min",
        Reduction::Max => "max",
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use crate::{
        error::{EvaluationError, SolrecError},
        Expression, Inputs, Value,
    };

    fn y() -> DVector<f64> {
        DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0])
    }

    #[test]
    fn leaves_and_operators() {
        let inputs = Inputs::from([("k", 0.5)]);
        let e = (Expression::<f64>::state(1) + 1.0) * Expression::input("k") - Expression::<f64>::time() / 2.0;
        assert_eq!(e.evaluate(4.0, &y(), &inputs).unwrap(), Value::Scalar(-0.5));

        let e = 2.0 * Expression::<f64>::state_slice(0..3);
        assert_eq!(
            e.evaluate(0.0, &y(), &inputs).unwrap(),
            Value::Vector(DVector::from_vec(vec![2.0, 4.0, 6.0]))
        );
        let e = -Expression::<f64>::state(3).sqrt();
        assert_eq!(e.evaluate_scalar(0.0, &y(), &inputs).unwrap(), -2.0);
    }

    #[test]
    fn reductions_and_indexing() {
        let inputs = Inputs::new();
        let slice = Expression::<f64>::state_slice(0..4);
        assert_eq!(slice.sum().evaluate_scalar(0.0, &y(), &inputs).unwrap(), 10.0);
        assert_eq!(slice.mean().evaluate_scalar(0.0, &y(), &inputs).unwrap(), 2.5);
        assert_eq!(slice.min_element().evaluate_scalar(0.0, &y(), &inputs).unwrap(), 1.0);
        assert_eq!(slice.max_element().evaluate_scalar(0.0, &y(), &inputs).unwrap(), 4.0);
        assert_eq!(slice.index(2).evaluate_scalar(0.0, &y(), &inputs).unwrap(), 3.0);
        let err = slice.index(7).evaluate(0.0, &y(), &inputs).unwrap_err();
        assert_eq!(
            err,
            SolrecError::EvaluationError(EvaluationError::IndexOutOfBounds { index: 7, len: 4 })
        );
        let empty = Expression::<f64>::state_slice(2..2).mean();
        assert!(empty.evaluate(0.0, &y(), &inputs).is_err());
    }

    #[test]
    fn matmul_and_concatenate() {
        let inputs = Inputs::new();
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 2.0]);
        let e = Expression::matrix(m).matmul(&Expression::state_slice(0..2));
        assert_eq!(
            e.evaluate(0.0, &y(), &inputs).unwrap(),
            Value::Vector(DVector::from_vec(vec![3.0, 4.0]))
        );
        let e = Expression::<f64>::concatenate([Expression::state(3), Expression::state_slice(0..2)]);
        assert_eq!(
            e.evaluate(0.0, &y(), &inputs).unwrap(),
            Value::Vector(DVector::from_vec(vec![4.0, 1.0, 2.0]))
        );
        let bad = Expression::<f64>::matrix(DMatrix::zeros(2, 3)).matmul(&Expression::state_slice(0..2));
        assert!(bad.evaluate(0.0, &y(), &inputs).is_err());
    }

    #[test]
    fn missing_input_names_the_parameter() {
        let e = Expression::<f64>::state(0) * Expression::input("Current function [A]");
        let err = e.evaluate(0.0, &y(), &Inputs::new()).unwrap_err();
        assert_eq!(
            err,
            SolrecError::EvaluationError(EvaluationError::MissingInput {
                name: "Current function [A]".to_string()
            })
        );
        assert!(err.to_string().contains("Current function [A]"));
    }

    #[test]
    fn unbound_parameter_and_out_of_range_state() {
        let e = Expression::<f64>::parameter("R [Ohm]");
        assert!(matches!(
            e.evaluate(0.0, &y(), &Inputs::new()),
            Err(SolrecError::EvaluationError(EvaluationError::UnboundParameter { .. }))
        ));
        let e = Expression::<f64>::state(4);
        assert_eq!(
            e.evaluate(0.0, &y(), &Inputs::new()).unwrap_err(),
            SolrecError::EvaluationError(EvaluationError::StateIndexOutOfBounds {
                start: 4,
                end: 5,
                len: 4
            })
        );
    }
}
