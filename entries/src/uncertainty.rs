//! Values with uncertainty
//!
//! [`UFloat`] carries a nominal value and a standard deviation and propagates
//! errors as independent variables. [`Uncertainty`] is what an energy
//! adjustment reports: either a known standard deviation or `Unknown`, which
//! is never the same thing as a zero error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UFloat {
    pub nominal: f64,
    pub std_dev: f64,
}

impl UFloat {
    pub const ZERO: UFloat = UFloat {
        nominal: 0.0,
        std_dev: 0.0,
    };

    pub fn new(nominal: f64, std_dev: f64) -> Self {
        Self {
            nominal,
            std_dev: std_dev.abs(),
        }
    }

    /// A value with no error.
    pub fn exact(nominal: f64) -> Self {
        Self::new(nominal, 0.0)
    }

    /// True only for 0 ± 0.
    pub fn is_zero(&self) -> bool {
        self.nominal == 0.0 && self.std_dev == 0.0
    }
}

impl Add for UFloat {
    type Output = UFloat;

    fn add(self, rhs: UFloat) -> UFloat {
        UFloat {
            nominal: self.nominal + rhs.nominal,
            std_dev: self.std_dev.hypot(rhs.std_dev),
        }
    }
}

impl Sub for UFloat {
    type Output = UFloat;

    fn sub(self, rhs: UFloat) -> UFloat {
        UFloat {
            nominal: self.nominal - rhs.nominal,
            std_dev: self.std_dev.hypot(rhs.std_dev),
        }
    }
}

impl Mul<f64> for UFloat {
    type Output = UFloat;

    fn mul(self, rhs: f64) -> UFloat {
        UFloat {
            nominal: self.nominal * rhs,
            std_dev: self.std_dev * rhs.abs(),
        }
    }
}

impl Neg for UFloat {
    type Output = UFloat;

    fn neg(self) -> UFloat {
        UFloat {
            nominal: -self.nominal,
            std_dev: self.std_dev,
        }
    }
}

impl AddAssign for UFloat {
    fn add_assign(&mut self, rhs: UFloat) {
        *self = *self + rhs;
    }
}

impl SubAssign for UFloat {
    fn sub_assign(&mut self, rhs: UFloat) {
        *self = *self - rhs;
    }
}

impl Sum for UFloat {
    fn sum<I: Iterator<Item = UFloat>>(iter: I) -> UFloat {
        iter.fold(UFloat::ZERO, |acc, value| acc + value)
    }
}

impl fmt::Display for UFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} ± {:.4}", self.nominal, self.std_dev)
    }
}

/// Uncertainty of an energy adjustment, in eV.
///
/// Serialized as a number, or `null` when unknown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Uncertainty {
    Known(f64),
    Unknown,
}

impl Default for Uncertainty {
    fn default() -> Self {
        Uncertainty::Known(0.0)
    }
}

impl From<Option<f64>> for Uncertainty {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Uncertainty::Known(v),
            _ => Uncertainty::Unknown,
        }
    }
}

impl From<Uncertainty> for Option<f64> {
    fn from(value: Uncertainty) -> Self {
        value.known()
    }
}

impl Uncertainty {
    /// Uncertainty for a correction computed as a [`UFloat`]: a nonzero
    /// correction with zero error means no error data was available.
    pub fn of_correction(value: UFloat) -> Self {
        if value.nominal != 0.0 && value.std_dev == 0.0 {
            Uncertainty::Unknown
        } else {
            Uncertainty::Known(value.std_dev)
        }
    }

    pub fn known(self) -> Option<f64> {
        match self {
            Uncertainty::Known(v) => Some(v),
            Uncertainty::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Uncertainty::Unknown)
    }

    pub fn scale(self, factor: f64) -> Self {
        match self {
            Uncertainty::Known(v) => Uncertainty::Known(v * factor),
            Uncertainty::Unknown => Uncertainty::Unknown,
        }
    }
}

impl fmt::Display for Uncertainty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uncertainty::Known(v) => write!(f, "{:.3}", v),
            Uncertainty::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_independent_error_propagation() {
        let sum = UFloat::new(1.0, 0.3) + UFloat::new(-2.0, 0.4);
        assert_relative_eq!(sum.nominal, -1.0, epsilon = 1e-12);
        assert_relative_eq!(sum.std_dev, 0.5, epsilon = 1e-12);

        let diff = UFloat::new(1.0, 0.3) - UFloat::new(-2.0, 0.4);
        assert_relative_eq!(diff.nominal, 3.0, epsilon = 1e-12);
        assert_relative_eq!(diff.std_dev, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_scaling_and_sum() {
        let scaled = UFloat::new(-0.687, 0.002) * 3.0;
        assert_relative_eq!(scaled.nominal, -2.061, epsilon = 1e-12);
        assert_relative_eq!(scaled.std_dev, 0.006, epsilon = 1e-12);

        let total: UFloat = vec![UFloat::new(1.0, 3.0), UFloat::new(1.0, 4.0), UFloat::ZERO]
            .into_iter()
            .sum();
        assert_relative_eq!(total.std_dev, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_is_exact_only_for_exact_inputs() {
        let cancelled = UFloat::exact(1.0) + UFloat::exact(-1.0);
        assert!(cancelled.is_zero());
        assert_eq!(Uncertainty::of_correction(cancelled), Uncertainty::Known(0.0));

        let noisy = UFloat::new(1.0, 0.1) + UFloat::exact(-1.0);
        assert!(!noisy.is_zero());
    }

    #[test]
    fn test_unknown_for_nonzero_without_errors() {
        assert_eq!(
            Uncertainty::of_correction(UFloat::exact(-0.7)),
            Uncertainty::Unknown
        );
        assert_eq!(
            Uncertainty::of_correction(UFloat::new(-0.7, 0.01)),
            Uncertainty::Known(0.01)
        );
    }

    #[test]
    fn test_uncertainty_serde() {
        assert_eq!(serde_json::to_string(&Uncertainty::Unknown).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Uncertainty::Known(0.5)).unwrap(), "0.5");
        let parsed: Uncertainty = serde_json::from_str("null").unwrap();
        assert!(parsed.is_unknown());
    }
}
