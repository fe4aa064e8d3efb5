use std::ops::{Add, Div, Mul, Neg, Sub};

use super::{BinaryOp, Expression, Node, UnaryOp};
use crate::Scalar;

macro_rules! impl_bin_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Scalar> $trait<Expression<T>> for Expression<T> {
            type Output = Expression<T>;

            #[inline]
            fn $method(self, rhs: Expression<T>) -> Self::Output {
                self.binary($op, &rhs)
            }
        }

        impl<T: Scalar> $trait<&Expression<T>> for Expression<T> {
            type Output = Expression<T>;

            #[inline]
            fn $method(self, rhs: &Expression<T>) -> Self::Output {
                self.binary($op, rhs)
            }
        }

        impl<T: Scalar> $trait<&Expression<T>> for &Expression<T> {
            type Output = Expression<T>;

            #[inline]
            fn $method(self, rhs: &Expression<T>) -> Self::Output {
                self.binary($op, rhs)
            }
        }

        impl<T: Scalar> $trait<Expression<T>> for &Expression<T> {
            type Output = Expression<T>;

            #[inline]
            fn $method(self, rhs: Expression<T>) -> Self::Output {
                self.binary($op, &rhs)
            }
        }

        impl<T: Scalar> $trait<T> for Expression<T> {
            type Output = Expression<T>;

            #[inline]
            fn $method(self, rhs: T) -> Self::Output {
                self.binary($op, &Expression::constant(rhs))
            }
        }

        impl<T: Scalar> $trait<T> for &Expression<T> {
            type Output = Expression<T>;

            #[inline]
            fn $method(self, rhs: T) -> Self::Output {
                self.binary($op, &Expression::constant(rhs))
            }
        }
    };
}

macro_rules! impl_scalar_lhs_op {
    ($scalar:ty, $trait:ident, $method:ident, $op:expr) => {
        impl $trait<Expression<$scalar>> for $scalar {
            type Output = Expression<$scalar>;

            #[inline]
            fn $method(self, rhs: Expression<$scalar>) -> Self::Output {
                Expression::constant(self).binary($op, &rhs)
            }
        }

        impl $trait<&Expression<$scalar>> for $scalar {
            type Output = Expression<$scalar>;

            #[inline]
            fn $method(self, rhs: &Expression<$scalar>) -> Self::Output {
                Expression::constant(self).binary($op, rhs)
            }
        }
    };
}

impl_bin_op!(Add, add, BinaryOp::Add);
impl_bin_op!(Sub, sub, BinaryOp::Sub);
impl_bin_op!(Mul, mul, BinaryOp::Mul);
impl_bin_op!(Div, div, BinaryOp::Div);

impl_scalar_lhs_op!(f64, Add, add, BinaryOp::Add);
impl_scalar_lhs_op!(f64, Sub, sub, BinaryOp::Sub);
impl_scalar_lhs_op!(f64, Mul, mul, BinaryOp::Mul);
impl_scalar_lhs_op!(f64, Div, div, BinaryOp::Div);
impl_scalar_lhs_op!(f32, Add, add, BinaryOp::Add);
impl_scalar_lhs_op!(f32, Sub, sub, BinaryOp::Sub);
impl_scalar_lhs_op!(f32, Mul, mul, BinaryOp::Mul);
impl_scalar_lhs_op!(f32, Div, div, BinaryOp::Div);

impl<T: Scalar> Neg for Expression<T> {
    type Output = Expression<T>;

    #[inline]
    fn neg(self) -> Self::Output {
        Expression::from_node(Node::Unary(UnaryOp::Neg, self.node().clone()))
    }
}

impl<T: Scalar> Neg for &Expression<T> {
    type Output = Expression<T>;

    #[inline]
    fn neg(self) -> Self::Output {
        Expression::from_node(Node::Unary(UnaryOp::Neg, self.node().clone()))
    }
}
