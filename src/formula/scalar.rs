use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_complex::Complex64;

/// Numeric type a formula is compiled for.
///
/// Two instantiations exist: `f64` for the palette-coordinate formulas and
/// `Complex64` for the iteration formula. Everything the VM can do to a value
/// goes through this trait, so the compiler and evaluator stay generic.
pub trait Scalar:
    Copy
    + fmt::Debug
    + fmt::Display
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Send
    + Sync
    + 'static
{
    /// Short name used in logs and disassembly headers.
    const NAME: &'static str;

    fn zero() -> Self;
    fn one() -> Self;
    fn from_real(x: f64) -> Self;

    /// Real part, as a value of this type.
    fn re(self) -> Self;
    /// Imaginary part, as a value of this type. Always zero for reals.
    fn im(self) -> Self;
    fn real_part(self) -> f64;
    fn imag_part(self) -> f64;
    /// Squared modulus; this is what the escape test compares against the limit.
    fn norm_sqr(self) -> f64;

    fn abs(self) -> Self;
    fn recip(self) -> Self;
    fn pow(self, exponent: Self) -> Self;

    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn asin(self) -> Self;
    fn acos(self) -> Self;
    fn atan(self) -> Self;
    fn sinh(self) -> Self;
    fn cosh(self) -> Self;
    fn tanh(self) -> Self;
    fn asinh(self) -> Self;
    fn acosh(self) -> Self;
    fn atanh(self) -> Self;

    /// Integer power by repeated squaring. Negative exponents give the
    /// reciprocal of the positive power; `x^0` is one.
    fn powi(self, n: i32) -> Self {
        match n {
            0 => Self::one(),
            n if n > 0 => pow_unsigned(self, n.unsigned_abs()),
            n => Self::one() / pow_unsigned(self, n.unsigned_abs()),
        }
    }
}

fn pow_unsigned<S: Scalar>(x: S, n: u32) -> S {
    if n == 1 {
        return x;
    }
    let half = pow_unsigned(x, n / 2);
    let squared = half * half;
    if n % 2 == 1 {
        squared * x
    } else {
        squared
    }
}

impl Scalar for f64 {
    const NAME: &'static str = "real";

    fn zero() -> Self {
        0.0
    }
    fn one() -> Self {
        1.0
    }
    fn from_real(x: f64) -> Self {
        x
    }
    fn re(self) -> Self {
        self
    }
    fn im(self) -> Self {
        0.0
    }
    fn real_part(self) -> f64 {
        self
    }
    fn imag_part(self) -> f64 {
        0.0
    }
    fn norm_sqr(self) -> f64 {
        self * self
    }
    fn abs(self) -> Self {
        f64::abs(self)
    }
    fn recip(self) -> Self {
        1.0 / self
    }
    fn pow(self, exponent: Self) -> Self {
        self.powf(exponent)
    }
    fn sin(self) -> Self {
        f64::sin(self)
    }
    fn cos(self) -> Self {
        f64::cos(self)
    }
    fn tan(self) -> Self {
        f64::tan(self)
    }
    fn exp(self) -> Self {
        f64::exp(self)
    }
    fn ln(self) -> Self {
        f64::ln(self)
    }
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
    fn asin(self) -> Self {
        f64::asin(self)
    }
    fn acos(self) -> Self {
        f64::acos(self)
    }
    fn atan(self) -> Self {
        f64::atan(self)
    }
    fn sinh(self) -> Self {
        f64::sinh(self)
    }
    fn cosh(self) -> Self {
        f64::cosh(self)
    }
    fn tanh(self) -> Self {
        f64::tanh(self)
    }
    fn asinh(self) -> Self {
        f64::asinh(self)
    }
    fn acosh(self) -> Self {
        f64::acosh(self)
    }
    fn atanh(self) -> Self {
        f64::atanh(self)
    }
}

impl Scalar for Complex64 {
    const NAME: &'static str = "complex";

    fn zero() -> Self {
        Complex64::new(0.0, 0.0)
    }
    fn one() -> Self {
        Complex64::new(1.0, 0.0)
    }
    fn from_real(x: f64) -> Self {
        Complex64::new(x, 0.0)
    }
    fn re(self) -> Self {
        Complex64::new(self.re, 0.0)
    }
    fn im(self) -> Self {
        Complex64::new(self.im, 0.0)
    }
    fn real_part(self) -> f64 {
        self.re
    }
    fn imag_part(self) -> f64 {
        self.im
    }
    fn norm_sqr(self) -> f64 {
        Complex64::norm_sqr(&self)
    }
    fn abs(self) -> Self {
        Complex64::new(self.norm(), 0.0)
    }
    fn recip(self) -> Self {
        self.inv()
    }
    /// `0^0` is one and `0^b` is zero; everything else is the principal value.
    fn pow(self, exponent: Self) -> Self {
        if self.re == 0.0 && self.im == 0.0 {
            if exponent.re == 0.0 && exponent.im == 0.0 {
                return Self::one();
            }
            return Self::zero();
        }
        self.powc(exponent)
    }
    fn sin(self) -> Self {
        Complex64::sin(self)
    }
    fn cos(self) -> Self {
        Complex64::cos(self)
    }
    fn tan(self) -> Self {
        Complex64::tan(self)
    }
    fn exp(self) -> Self {
        Complex64::exp(self)
    }
    fn ln(self) -> Self {
        Complex64::ln(self)
    }
    fn sqrt(self) -> Self {
        Complex64::sqrt(self)
    }
    fn asin(self) -> Self {
        Complex64::asin(self)
    }
    fn acos(self) -> Self {
        Complex64::acos(self)
    }
    fn atan(self) -> Self {
        Complex64::atan(self)
    }
    fn sinh(self) -> Self {
        Complex64::sinh(self)
    }
    fn cosh(self) -> Self {
        Complex64::cosh(self)
    }
    fn tanh(self) -> Self {
        Complex64::tanh(self)
    }
    fn asinh(self) -> Self {
        Complex64::asinh(self)
    }
    fn acosh(self) -> Self {
        Complex64::acosh(self)
    }
    fn atanh(self) -> Self {
        Complex64::atanh(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeated<S: Scalar>(x: S, n: i32) -> S {
        let mut acc = S::one();
        for _ in 0..n.unsigned_abs() {
            acc = acc * x;
        }
        if n < 0 {
            S::one() / acc
        } else {
            acc
        }
    }

    #[test]
    fn powi_matches_repeated_multiplication_real() {
        for &x in &[0.5, 1.1, -1.3, 2.0, -0.9] {
            for n in -20..=20 {
                let fast = Scalar::powi(x, n);
                let slow = repeated(x, n);
                let tol = 1e-9 * slow.abs().max(1.0);
                assert!((fast - slow).abs() <= tol, "{x}^{n}: {fast} vs {slow}");
            }
        }
    }

    #[test]
    fn powi_matches_repeated_multiplication_complex() {
        let samples = [
            Complex64::new(0.5, 0.5),
            Complex64::new(-1.1, 0.3),
            Complex64::new(0.0, 1.0),
            Complex64::new(1.05, -0.2),
        ];
        for &x in &samples {
            for n in -20..=20 {
                let fast = Scalar::powi(x, n);
                let slow = repeated(x, n);
                let tol = 1e-9 * slow.norm().max(1.0);
                assert!((fast - slow).norm() <= tol, "{x}^{n}: {fast} vs {slow}");
            }
        }
    }

    #[test]
    fn negative_power_is_reciprocal() {
        let x = Complex64::new(1.5, -0.5);
        let pos = Scalar::powi(x, 7);
        let neg = Scalar::powi(x, -7);
        assert!((pos * neg - Complex64::new(1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn re_and_im_of_real_scalar() {
        assert_eq!(Scalar::re(3.5_f64), 3.5);
        assert_eq!(Scalar::im(3.5_f64), 0.0);
    }

    #[test]
    fn re_and_im_of_complex_scalar() {
        let c = Complex64::new(2.0, -3.0);
        assert_eq!(Scalar::re(c), Complex64::new(2.0, 0.0));
        assert_eq!(Scalar::im(c), Complex64::new(-3.0, 0.0));
    }

    #[test]
    fn complex_pow_at_zero_base() {
        let zero = Complex64::new(0.0, 0.0);
        assert_eq!(Scalar::pow(zero, zero), Complex64::new(1.0, 0.0));
        assert_eq!(Scalar::pow(zero, Complex64::new(2.0, 1.0)), zero);
    }

    #[test]
    fn complex_pow_agrees_with_integer_power() {
        let base = Complex64::new(0.7, 1.2);
        let general = Scalar::pow(base, Complex64::new(3.0, 0.0));
        let integer = Scalar::powi(base, 3);
        assert!((general - integer).norm() < 1e-12);
    }

    #[test]
    fn complex_abs_is_modulus() {
        let c = Complex64::new(3.0, 4.0);
        assert_eq!(Scalar::abs(c), Complex64::new(5.0, 0.0));
        assert_eq!(Scalar::norm_sqr(c), 25.0);
    }

    #[test]
    fn complex_sqrt_of_negative_real() {
        let r = Scalar::sqrt(Complex64::new(-4.0, 0.0));
        assert!((r - Complex64::new(0.0, 2.0)).norm() < 1e-12);
    }
}
