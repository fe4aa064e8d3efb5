use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{
    error::{OdeSolverError, SolrecError},
    ode_solver_error, Scalar,
};

/// The explicit methods bundled with the crate, used to pick a [Tableau] from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableauKind {
    HeunEuler,
    #[default]
    BogackiShampine,
    DormandPrince,
}

/// A butcher tableau for an explicit Runge-Kutta method.
///
/// The tableau is defined by the matrices `a`, `b`, `c` and `d` and the order of the method.
/// The butchers tableau is often depicted like this example of a 3-stage method:
///
/// ```text
/// c1 | 0   0   0
/// c2 | a21 0   0
/// c3 | a31 a32 0
/// -------------------
///    | b1  b2  b3
///    | be1 be2 be3
/// -------------------
///    | d1  d2  d3
/// ```
///
/// where `be` is the embedded method for error control and `d` is the difference between the main
/// and embedded method.
#[derive(Clone, Debug)]
pub struct Tableau<T: Scalar> {
    a: DMatrix<T>,
    b: DVector<T>,
    c: DVector<T>,
    d: DVector<T>,
    order: usize,
}

fn f<T: Scalar>(x: f64) -> T {
    T::from_f64_const(x)
}

impl<T: Scalar> Tableau<T> {
    pub fn from_kind(kind: TableauKind) -> Self {
        match kind {
            TableauKind::HeunEuler => Self::heun_euler(),
            TableauKind::BogackiShampine => Self::bogacki_shampine(),
            TableauKind::DormandPrince => Self::dormand_prince(),
        }
    }

    /// Heun's method with an embedded Euler step, order 2(1).
    pub fn heun_euler() -> Self {
        let a = DMatrix::from_row_slice(2, 2, &[f(0.0), f(0.0), f(1.0), f(0.0)]);
        let b = DVector::from_vec(vec![f(0.5), f(0.5)]);
        let b_hat = DVector::from_vec(vec![f(1.0), f(0.0)]);
        let c = DVector::from_vec(vec![f(0.0), f(1.0)]);
        Self {
            a,
            d: &b - b_hat,
            b,
            c,
            order: 2,
        }
    }

    /// Bogacki-Shampine 3(2) method
    /// from P. Bogacki and L.F. Shampine. A 3(2) pair of Runge-Kutta formulas. Applied Mathematics Letters, 2(4):321-325, 1989.
    pub fn bogacki_shampine() -> Self {
        #[rustfmt::skip]
        let a = DMatrix::from_row_slice(4, 4, &[
            f(0.0), f(0.0), f(0.0), f(0.0),
            f(1.0 / 2.0), f(0.0), f(0.0), f(0.0),
            f(0.0), f(3.0 / 4.0), f(0.0), f(0.0),
            f(2.0 / 9.0), f(1.0 / 3.0), f(4.0 / 9.0), f(0.0),
        ]);
        let b = DVector::from_vec(vec![f(2.0 / 9.0), f(1.0 / 3.0), f(4.0 / 9.0), f(0.0)]);
        let b_hat = DVector::from_vec(vec![
            f(7.0 / 24.0),
            f(1.0 / 4.0),
            f(1.0 / 3.0),
            f(1.0 / 8.0),
        ]);
        let c = DVector::from_vec(vec![f(0.0), f(1.0 / 2.0), f(3.0 / 4.0), f(1.0)]);
        Self {
            a,
            d: &b - b_hat,
            b,
            c,
            order: 3,
        }
    }

    /// Dormand-Prince 5(4) method
    /// from J.R. Dormand and P.J. Prince. A family of embedded Runge-Kutta formulae. Journal of Computational and Applied Mathematics, 6(1):19-26, 1980.
    pub fn dormand_prince() -> Self {
        #[rustfmt::skip]
        let a = DMatrix::from_row_slice(7, 7, &[
            f(0.0), f(0.0), f(0.0), f(0.0), f(0.0), f(0.0), f(0.0),
            f(1.0 / 5.0), f(0.0), f(0.0), f(0.0), f(0.0), f(0.0), f(0.0),
            f(3.0 / 40.0), f(9.0 / 40.0), f(0.0), f(0.0), f(0.0), f(0.0), f(0.0),
            f(44.0 / 45.0), f(-56.0 / 15.0), f(32.0 / 9.0), f(0.0), f(0.0), f(0.0), f(0.0),
            f(19372.0 / 6561.0), f(-25360.0 / 2187.0), f(64448.0 / 6561.0), f(-212.0 / 729.0), f(0.0), f(0.0), f(0.0),
            f(9017.0 / 3168.0), f(-355.0 / 33.0), f(46732.0 / 5247.0), f(49.0 / 176.0), f(-5103.0 / 18656.0), f(0.0), f(0.0),
            f(35.0 / 384.0), f(0.0), f(500.0 / 1113.0), f(125.0 / 192.0), f(-2187.0 / 6784.0), f(11.0 / 84.0), f(0.0),
        ]);
        let b = DVector::from_vec(vec![
            f(35.0 / 384.0),
            f(0.0),
            f(500.0 / 1113.0),
            f(125.0 / 192.0),
            f(-2187.0 / 6784.0),
            f(11.0 / 84.0),
            f(0.0),
        ]);
        let b_hat = DVector::from_vec(vec![
            f(5179.0 / 57600.0),
            f(0.0),
            f(7571.0 / 16695.0),
            f(393.0 / 640.0),
            f(-92097.0 / 339200.0),
            f(187.0 / 2100.0),
            f(1.0 / 40.0),
        ]);
        let c = DVector::from_vec(vec![
            f(0.0),
            f(1.0 / 5.0),
            f(3.0 / 10.0),
            f(4.0 / 5.0),
            f(8.0 / 9.0),
            f(1.0),
            f(1.0),
        ]);
        Self {
            a,
            d: &b - b_hat,
            b,
            c,
            order: 5,
        }
    }

    /// Create a tableau, checking that it describes an explicit method.
    pub fn new(
        a: DMatrix<T>,
        b: DVector<T>,
        c: DVector<T>,
        d: DVector<T>,
        order: usize,
    ) -> Result<Self, SolrecError> {
        let s = b.len();
        if s == 0 {
            return Err(ode_solver_error!(InvalidTableau, "tableau has no stages"));
        }
        if a.nrows() != s || a.ncols() != s || c.len() != s || d.len() != s {
            return Err(ode_solver_error!(
                InvalidTableau,
                format!(
                    "Invalid tableau, expected a to be {s}x{s} and c, d to have length {s}, found a {}x{}, c {}, d {}",
                    a.nrows(),
                    a.ncols(),
                    c.len(),
                    d.len()
                )
            ));
        }
        for i in 0..s {
            for j in i..s {
                if a[(i, j)] != T::zero() {
                    return Err(ode_solver_error!(
                        InvalidTableau,
                        format!(
                            "Invalid tableau, expected a(i, j) = 0 for i >= j, but found a({}, {}) = {}",
                            i,
                            j,
                            a[(i, j)]
                        )
                    ));
                }
            }
        }
        Ok(Self { a, b, c, d, order })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of stages.
    pub fn s(&self) -> usize {
        self.b.len()
    }

    pub fn a(&self) -> &DMatrix<T> {
        &self.a
    }

    pub fn b(&self) -> &DVector<T> {
        &self.b
    }

    pub fn c(&self) -> &DVector<T> {
        &self.c
    }

    pub fn d(&self) -> &DVector<T> {
        &self.d
    }

    /// True if the last stage is evaluated at the new solution (first same as last), so it can be
    /// reused as the first stage of the next step.
    pub fn is_fsal(&self) -> bool {
        let s = self.s();
        self.c[s - 1] == T::one() && (0..s).all(|j| self.a[(s - 1, j)] == self.b[j])
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use super::*;

    #[test]
    fn bundled_tableaus_are_valid() {
        for kind in [
            TableauKind::HeunEuler,
            TableauKind::BogackiShampine,
            TableauKind::DormandPrince,
        ] {
            let t = Tableau::<f64>::from_kind(kind);
            let checked = Tableau::new(
                t.a().clone(),
                t.b().clone(),
                t.c().clone(),
                t.d().clone(),
                t.order(),
            );
            assert!(checked.is_ok(), "{kind:?}");
            // consistency: row sums of a equal c
            for i in 0..t.s() {
                let row_sum: f64 = t.a().row(i).iter().sum();
                assert!((row_sum - t.c()[i]).abs() < 1e-14, "{kind:?} row {i}");
            }
            // both weights sum to one, so the differences sum to zero
            assert!((t.b().sum() - 1.0).abs() < 1e-14);
            assert!(t.d().sum().abs() < 1e-14);
        }
        assert!(Tableau::<f64>::bogacki_shampine().is_fsal());
        assert!(Tableau::<f64>::dormand_prince().is_fsal());
        assert!(!Tableau::<f64>::heun_euler().is_fsal());
    }

    #[test]
    fn implicit_tableau_is_rejected() {
        let a = DMatrix::from_row_slice(1, 1, &[0.5]);
        let one = DVector::from_vec(vec![1.0]);
        let err = Tableau::new(a, one.clone(), one.clone(), DVector::zeros(1), 1).unwrap_err();
        assert!(matches!(
            err,
            SolrecError::OdeSolverError(OdeSolverError::InvalidTableau(_))
        ));
    }
}
