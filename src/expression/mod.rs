use std::{collections::BTreeSet, fmt, ops::Range, sync::Arc};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{error::SolrecError, Scalar};

pub mod evaluate;
pub mod inputs;
pub mod ops;
pub mod value;

pub use inputs::Inputs;
pub use value::Value;

/// How the [crate::StepRecorder] turns the pointwise value of an expression into a recorded value.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Accumulation {
    /// Record the value at each step.
    #[default]
    Pointwise,
    /// Record the integral of the value from the first recorded step, using the trapezoidal rule.
    TimeIntegral,
    /// Record the running sum of the value over all recorded steps.
    DiscreteSum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Exp,
    Ln,
    Sqrt,
    Abs,
    Sin,
    Cos,
    Tanh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Min,
    Max,
    MatMul,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
    Min,
    Max,
}

#[derive(Debug)]
pub(crate) enum Node<T: Scalar> {
    Constant(Value<T>),
    StateIndex(usize),
    StateSlice(Range<usize>),
    Time,
    Parameter(String),
    Input(String),
    Unary(UnaryOp, Arc<Node<T>>),
    Binary(BinaryOp, Arc<Node<T>>, Arc<Node<T>>),
    Reduce(Reduction, Arc<Node<T>>),
    Index(Arc<Node<T>>, usize),
    Concatenate(Vec<Arc<Node<T>>>),
}

/// An immutable symbolic expression over the state vector, time, parameters and input parameters.
///
/// Expressions are cheap to clone, the tree is shared between clones. Use the constructors on this
/// type together with the arithmetic operators to build an expression, and [Expression::evaluate] to
/// compute its value for a given time, state and set of [Inputs].
///
/// An expression carries an [Accumulation] tag that tells the recorder whether to record its value
/// at each step, or to integrate or sum it over the solve. The tag belongs to the expression as a
/// whole; building a new expression from a tagged one gives a pointwise expression.
///
/// # Example
///
/// ```
/// use solrec::{Expression, Inputs, Value};
/// use nalgebra::DVector;
///
/// let current = Expression::<f64>::input("Current [A]");
/// let voltage = Expression::<f64>::constant(4.0) - Expression::<f64>::state(0) * current.clone();
/// let y = DVector::from_vec(vec![0.25]);
/// let inputs = Inputs::from([("Current [A]", 2.0)]);
/// let v = voltage.evaluate(0.0, &y, &inputs).unwrap();
/// assert_eq!(v, Value::Scalar(3.5));
/// ```
#[derive(Clone)]
pub struct Expression<T: Scalar = f64> {
    node: Arc<Node<T>>,
    accumulation: Accumulation,
}

/// Identity of an expression, stable for the lifetime of its tree and shared by its clones.
///
/// Two expressions over the same tree but with a different [Accumulation] record different values,
/// so their ids differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpressionId(usize, Accumulation);

impl<T: Scalar> Expression<T> {
    pub(crate) fn from_node(node: Node<T>) -> Self {
        Self {
            node: Arc::new(node),
            accumulation: Accumulation::Pointwise,
        }
    }

    pub(crate) fn node(&self) -> &Arc<Node<T>> {
        &self.node
    }

    pub fn constant(value: T) -> Self {
        Self::from_node(Node::Constant(Value::Scalar(value)))
    }

    pub fn vector(value: DVector<T>) -> Self {
        Self::from_node(Node::Constant(Value::Vector(value)))
    }

    pub fn matrix(value: DMatrix<T>) -> Self {
        Self::from_node(Node::Constant(Value::Matrix(value)))
    }

    /// The `i`-th entry of the state vector, as a scalar.
    pub fn state(i: usize) -> Self {
        Self::from_node(Node::StateIndex(i))
    }

    /// A contiguous slice of the state vector, as a vector.
    pub fn state_slice(range: Range<usize>) -> Self {
        Self::from_node(Node::StateSlice(range))
    }

    pub fn time() -> Self {
        Self::from_node(Node::Time)
    }

    /// A named model parameter. Parameters are replaced by their values (or by input parameters)
    /// when the model is discretised, evaluating an expression that still contains one is an error.
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::from_node(Node::Parameter(name.into()))
    }

    /// A named input parameter, its value is looked up in the [Inputs] at evaluation time.
    pub fn input(name: impl Into<String>) -> Self {
        Self::from_node(Node::Input(name.into()))
    }

    pub fn concatenate(children: impl IntoIterator<Item = Expression<T>>) -> Self {
        Self::from_node(Node::Concatenate(
            children.into_iter().map(|c| c.node).collect(),
        ))
    }

    fn unary(&self, op: UnaryOp) -> Self {
        Self::from_node(Node::Unary(op, self.node.clone()))
    }

    pub(crate) fn binary(&self, op: BinaryOp, rhs: &Expression<T>) -> Self {
        Self::from_node(Node::Binary(op, self.node.clone(), rhs.node.clone()))
    }

    fn reduce(&self, op: Reduction) -> Self {
        Self::from_node(Node::Reduce(op, self.node.clone()))
    }

    pub fn exp(&self) -> Self {
        self.unary(UnaryOp::Exp)
    }

    pub fn ln(&self) -> Self {
        self.unary(UnaryOp::Ln)
    }

    pub fn sqrt(&self) -> Self {
        self.unary(UnaryOp::Sqrt)
    }

    pub fn abs(&self) -> Self {
        self.unary(UnaryOp::Abs)
    }

    pub fn sin(&self) -> Self {
        self.unary(UnaryOp::Sin)
    }

    pub fn cos(&self) -> Self {
        self.unary(UnaryOp::Cos)
    }

    pub fn tanh(&self) -> Self {
        self.unary(UnaryOp::Tanh)
    }

    pub fn powf(&self, exponent: &Expression<T>) -> Self {
        self.binary(BinaryOp::Pow, exponent)
    }

    pub fn minimum(&self, other: &Expression<T>) -> Self {
        self.binary(BinaryOp::Min, other)
    }

    pub fn maximum(&self, other: &Expression<T>) -> Self {
        self.binary(BinaryOp::Max, other)
    }

    /// Matrix-vector product, `self` must evaluate to a matrix.
    pub fn matmul(&self, rhs: &Expression<T>) -> Self {
        self.binary(BinaryOp::MatMul, rhs)
    }

    pub fn sum(&self) -> Self {
        self.reduce(Reduction::Sum)
    }

    pub fn mean(&self) -> Self {
        self.reduce(Reduction::Mean)
    }

    pub fn min_element(&self) -> Self {
        self.reduce(Reduction::Min)
    }

    pub fn max_element(&self) -> Self {
        self.reduce(Reduction::Max)
    }

    pub fn index(&self, i: usize) -> Self {
        Self::from_node(Node::Index(self.node.clone(), i))
    }

    /// Tag this expression to be integrated in time over the solve.
    pub fn time_integral(&self) -> Self {
        self.with_accumulation(Accumulation::TimeIntegral)
    }

    /// Tag this expression to be summed over the recorded steps of the solve.
    pub fn discrete_sum(&self) -> Self {
        self.with_accumulation(Accumulation::DiscreteSum)
    }

    pub fn with_accumulation(&self, accumulation: Accumulation) -> Self {
        Self {
            node: self.node.clone(),
            accumulation,
        }
    }

    pub fn accumulation(&self) -> Accumulation {
        self.accumulation
    }

    pub fn id(&self) -> ExpressionId {
        ExpressionId(Arc::as_ptr(&self.node) as usize, self.accumulation)
    }

    fn visit(&self, f: &mut impl FnMut(&Node<T>)) {
        fn walk<T: Scalar>(node: &Node<T>, f: &mut impl FnMut(&Node<T>)) {
            f(node);
            match node {
                Node::Unary(_, child)
                | Node::Reduce(_, child)
                | Node::Index(child, _) => walk(child, f),
                Node::Binary(_, lhs, rhs) => {
                    walk(lhs, f);
                    walk(rhs, f);
                }
                Node::Concatenate(children) => {
                    for c in children {
                        walk(c, f);
                    }
                }
                Node::Constant(_)
                | Node::StateIndex(_)
                | Node::StateSlice(_)
                | Node::Time
                | Node::Parameter(_)
                | Node::Input(_) => {}
            }
        }
        walk(&self.node, f)
    }

    pub fn depends_on_state(&self) -> bool {
        let mut found = false;
        self.visit(&mut |node: &Node<T>| {
            found |= matches!(node, Node::StateIndex(_) | Node::StateSlice(_));
        });
        found
    }

    pub fn depends_on_time(&self) -> bool {
        let mut found = false;
        self.visit(&mut |node: &Node<T>| found |= matches!(node, Node::Time));
        found
    }

    /// Largest state index referenced plus one, or zero if the state is not used.
    pub fn state_extent(&self) -> usize {
        let mut extent = 0;
        self.visit(&mut |node: &Node<T>| match node {
            Node::StateIndex(i) => extent = extent.max(i + 1),
            Node::StateSlice(range) => extent = extent.max(range.end),
            _ => {}
        });
        extent
    }

    pub fn input_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.visit(&mut |node: &Node<T>| {
            if let Node::Input(name) = node {
                names.insert(name.clone());
            }
        });
        names
    }

    pub fn parameter_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.visit(&mut |node: &Node<T>| {
            if let Node::Parameter(name) = node {
                names.insert(name.clone());
            }
        });
        names
    }

    /// Rebuild the expression, replacing every parameter leaf with the expression returned by `f`.
    /// The accumulation tag is kept.
    pub fn substitute_parameters<F>(&self, f: &mut F) -> Result<Expression<T>, SolrecError>
    where
        F: FnMut(&str) -> Result<Expression<T>, SolrecError>,
    {
        fn rebuild<T: Scalar, F>(node: &Arc<Node<T>>, f: &mut F) -> Result<Arc<Node<T>>, SolrecError>
        where
            F: FnMut(&str) -> Result<Expression<T>, SolrecError>,
        {
            let new = match node.as_ref() {
                Node::Parameter(name) => return Ok(f(name)?.node),
                Node::Constant(_)
                | Node::StateIndex(_)
                | Node::StateSlice(_)
                | Node::Time
                | Node::Input(_) => return Ok(node.clone()),
                Node::Unary(op, child) => Node::Unary(*op, rebuild(child, f)?),
                Node::Reduce(op, child) => Node::Reduce(*op, rebuild(child, f)?),
                Node::Index(child, i) => Node::Index(rebuild(child, f)?, *i),
                Node::Binary(op, lhs, rhs) => Node::Binary(*op, rebuild(lhs, f)?, rebuild(rhs, f)?),
                Node::Concatenate(children) => Node::Concatenate(
                    children
                        .iter()
                        .map(|c| rebuild(c, f))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
            };
            Ok(Arc::new(new))
        }
        Ok(Self {
            node: rebuild(&self.node, f)?,
            accumulation: self.accumulation,
        })
    }
}

impl<T: Scalar> From<T> for Expression<T> {
    fn from(value: T) -> Self {
        Expression::constant(value)
    }
}

impl<T: Scalar> fmt::Display for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Constant(Value::Scalar(x)) => write!(f, "{x}"),
            Node::Constant(value) => write!(f, "<{}>", value.shape()),
            Node::StateIndex(i) => write!(f, "y[{i}]"),
            Node::StateSlice(range) => write!(f, "y[{}..{}]", range.start, range.end),
            Node::Time => write!(f, "t"),
            Node::Parameter(name) => write!(f, "param({name})"),
            Node::Input(name) => write!(f, "input({name})"),
            Node::Unary(UnaryOp::Neg, child) => write!(f, "-{child}"),
            Node::Unary(op, child) => write!(f, "{}({child})", format!("{op:?}").to_lowercase()),
            Node::Binary(op, lhs, rhs) => {
                let symbol = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Pow => "^",
                    BinaryOp::MatMul => "@",
                    BinaryOp::Min => return write!(f, "min({lhs}, {rhs})"),
                    BinaryOp::Max => return write!(f, "max({lhs}, {rhs})"),
                };
                write!(f, "({lhs} {symbol} {rhs})")
            }
            Node::Reduce(op, child) => write!(f, "{}({child})", format!("{op:?}").to_lowercase()),
            Node::Index(child, i) => write!(f, "{child}[{i}]"),
            Node::Concatenate(children) => {
                write!(f, "[")?;
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl<T: Scalar> fmt::Display for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.accumulation {
            Accumulation::Pointwise => write!(f, "{}", self.node),
            Accumulation::TimeIntegral => write!(f, "integral({})", self.node),
            Accumulation::DiscreteSum => write!(f, "discrete_sum({})", self.node),
        }
    }
}

impl<T: Scalar> fmt::Debug for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expression({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_the_tree() {
        let e = (Expression::<f64>::state(0) * 2.0 + Expression::<f64>::input("I")).time_integral();
        insta::assert_snapshot!(e.to_string(), @"integral(((y[0] * 2) + input(I)))");
    }

    #[test]
    fn introspection() {
        let e = Expression::<f64>::state_slice(2..5).sum()
            * Expression::parameter("a")
            * Expression::input("b")
            + Expression::time();
        assert!(e.depends_on_state());
        assert!(e.depends_on_time());
        assert_eq!(e.state_extent(), 5);
        assert_eq!(e.parameter_names().into_iter().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(e.input_names().into_iter().collect::<Vec<_>>(), vec!["b"]);

        let c = Expression::<f64>::input("b") * Expression::time();
        assert!(!c.depends_on_state());
        assert_eq!(c.state_extent(), 0);
    }

    #[test]
    fn clones_share_identity() {
        let e = Expression::<f64>::state(0).exp();
        let tagged = e.discrete_sum();
        assert_eq!(e.id(), e.clone().id());
        assert_ne!(e.id(), tagged.id());
        assert_ne!(tagged.id(), e.time_integral().id());
        assert_eq!(tagged.id(), tagged.clone().id());
        assert_eq!(tagged.id(), e.discrete_sum().id());
        assert_ne!(e.id(), e.exp().id());
        assert_eq!(tagged.accumulation(), Accumulation::DiscreteSum);
    }

    #[test]
    fn substitute_parameters_keeps_accumulation() {
        let e = (Expression::<f64>::parameter("k") * Expression::state(0)).time_integral();
        let s = e
            .substitute_parameters(&mut |name| {
                assert_eq!(name, "k");
                Ok(Expression::constant(3.0))
            })
            .unwrap();
        assert!(s.parameter_names().is_empty());
        assert_eq!(s.accumulation(), Accumulation::TimeIntegral);
        assert_eq!(s.to_string(), "integral((3 * y[0]))");
    }
}
