use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::format_number;

/// A complex number in rectangular form.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub real: f64,
    pub imaginary: f64,
}

impl Complex {
    pub const I: Complex = Complex {
        real: 0.0,
        imaginary: 1.0,
    };

    pub const fn new(real: f64, imaginary: f64) -> Self {
        Self { real, imaginary }
    }

    pub fn from_polar(modulus: f64, phase: f64) -> Self {
        Self::new(modulus * phase.cos(), modulus * phase.sin())
    }

    pub fn is_real(&self) -> bool {
        self.imaginary == 0.0
    }

    /// Modulus.
    pub fn abs(&self) -> f64 {
        self.real.hypot(self.imaginary)
    }

    /// Phase angle in radians.
    pub fn arg(&self) -> f64 {
        self.imaginary.atan2(self.real)
    }

    pub fn conjugate(&self) -> Self {
        Self::new(self.real, -self.imaginary)
    }

    pub fn add(&self, rhs: &Complex) -> Self {
        Self::new(self.real + rhs.real, self.imaginary + rhs.imaginary)
    }

    pub fn sub(&self, rhs: &Complex) -> Self {
        Self::new(self.real - rhs.real, self.imaginary - rhs.imaginary)
    }

    pub fn mul(&self, rhs: &Complex) -> Self {
        Self::new(
            self.real * rhs.real - self.imaginary * rhs.imaginary,
            self.real * rhs.imaginary + self.imaginary * rhs.real,
        )
    }

    /// `None` when dividing by zero.
    pub fn div(&self, rhs: &Complex) -> Option<Self> {
        let denom = rhs.real * rhs.real + rhs.imaginary * rhs.imaginary;
        if denom == 0.0 {
            return None;
        }
        Some(Self::new(
            (self.real * rhs.real + self.imaginary * rhs.imaginary) / denom,
            (self.imaginary * rhs.real - self.real * rhs.imaginary) / denom,
        ))
    }

    /// Principal natural logarithm.
    pub fn ln(&self) -> Self {
        Self::new(self.abs().ln(), self.arg())
    }

    pub fn exp(&self) -> Self {
        Self::from_polar(self.real.exp(), self.imaginary)
    }

    pub fn powc(&self, exponent: &Complex) -> Self {
        if self.real == 0.0 && self.imaginary == 0.0 {
            return if exponent.real == 0.0 && exponent.imaginary == 0.0 {
                Self::new(1.0, 0.0)
            } else {
                Self::default()
            };
        }
        self.ln().mul(exponent).exp()
    }

    /// Rounds away floating-point noise in both parts, e.g. `6.123e-17` becomes `0`.
    pub fn simplify(&self, digits: i32) -> Self {
        let scale = 10f64.powi(digits);
        let round = |v: f64| {
            let r = (v * scale).round() / scale;
            if r == 0.0 { 0.0 } else { r }
        };
        Self::new(round(self.real), round(self.imaginary))
    }

    /// Renders with an explicit imaginary symbol, e.g. `3-2j`.
    pub fn to_string_with(&self, imaginary_char: char) -> String {
        let sign = if self.imaginary < 0.0 { "" } else { "+" };
        format!(
            "{}{}{}{}",
            format_number(self.real),
            sign,
            format_number(self.imaginary),
            imaginary_char
        )
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with('i'))
    }
}

impl From<f64> for Complex {
    fn from(real: f64) -> Self {
        Self::new(real, 0.0)
    }
}
