//! Scalar functions used for demand, cost and power models.
//!
//! Applications describe per-resource demand as a function of offered load;
//! nodes describe cost per allocated amount and power per utilization.

use serde::{Deserialize, Serialize};

/// A real function of one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarFn {
    /// `f(x) = c`.
    Constant(f64),
    /// `f(x) = slope * x + intercept`.
    Linear {
        /// Coefficient of `x`.
        slope: f64,
        /// Value at zero.
        intercept: f64,
    },
    /// `f(x) = c0 + c1 x + c2 x^2 + ...`.
    Polynomial(Vec<f64>),
}

impl ScalarFn {
    /// The zero function.
    pub fn zero() -> Self {
        ScalarFn::Constant(0.0)
    }

    /// `slope * x + intercept`.
    pub fn linear(slope: f64, intercept: f64) -> Self {
        ScalarFn::Linear { slope, intercept }
    }

    /// Evaluates the function at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            ScalarFn::Constant(c) => *c,
            ScalarFn::Linear { slope, intercept } => slope * x + intercept,
            // Horner
            ScalarFn::Polynomial(coeffs) => coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c),
        }
    }

    /// Largest `x >= 0` with `eval(x) <= y`, assuming the function is
    /// non-decreasing on `[0, ∞)`.
    ///
    /// Returns `0.0` when even `eval(0)` exceeds `y`, and `f64::INFINITY`
    /// when the function never exceeds `y`.
    pub fn inverse_max(&self, y: f64) -> f64 {
        if self.eval(0.0) > y {
            return 0.0;
        }
        match self {
            ScalarFn::Constant(_) => f64::INFINITY,
            ScalarFn::Linear { slope, intercept } => {
                if *slope <= 0.0 {
                    f64::INFINITY
                } else {
                    ((y - intercept) / slope).max(0.0)
                }
            }
            ScalarFn::Polynomial(_) => {
                let mut hi = 1.0;
                let mut expansions = 0;
                while self.eval(hi) <= y {
                    hi *= 2.0;
                    expansions += 1;
                    if expansions > 128 {
                        return f64::INFINITY;
                    }
                }
                let mut lo = 0.0;
                for _ in 0..64 {
                    let mid = 0.5 * (lo + hi);
                    if self.eval(mid) <= y {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                lo
            }
        }
    }
}

impl Default for ScalarFn {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_variants() {
        assert_eq!(ScalarFn::Constant(3.0).eval(10.0), 3.0);
        assert_eq!(ScalarFn::linear(2.0, 1.0).eval(3.0), 7.0);
        // 1 + 2x + 3x^2 at x = 2
        assert_eq!(ScalarFn::Polynomial(vec![1.0, 2.0, 3.0]).eval(2.0), 17.0);
        assert_eq!(ScalarFn::Polynomial(vec![]).eval(2.0), 0.0);
    }

    #[test]
    fn test_inverse_linear() {
        let f = ScalarFn::linear(2.0, 1.0);
        assert!((f.inverse_max(9.0) - 4.0).abs() < 1e-12);
        assert_eq!(f.inverse_max(0.5), 0.0);
    }

    #[test]
    fn test_inverse_polynomial() {
        let f = ScalarFn::Polynomial(vec![0.0, 0.0, 1.0]);
        assert!((f.inverse_max(16.0) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_inverse_constant_is_unbounded() {
        assert!(ScalarFn::Constant(1.0).inverse_max(2.0).is_infinite());
        assert_eq!(ScalarFn::Constant(3.0).inverse_max(2.0), 0.0);
    }
}
