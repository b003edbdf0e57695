//! Element types that can live in a dense buffer.
//!
//! Floating-point scalars (`f32`, `f64`) support every functor; signed
//! integers (`i32`, `i8`) support the arithmetic subset, with wrapping
//! semantics so the host agrees with the accelerator bit for bit.
//!
//! Accelerator buffers store every element as one 32-bit word. `i8` is widened
//! to `i32` on upload, and device kernels sign-extend the low byte of every
//! value they write, so buffers only ever hold in-range `i8` values and agree
//! with the host's wrapping `i8` arithmetic. `f64` has no device representation.

use core::fmt::Debug;

/// Broad classification of a scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// IEEE-754 binary floating point.
    Float,
    /// Two's complement signed integer.
    SignedInt,
}

/// How an element is represented inside a 32-bit device word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceElem {
    /// WGSL `f32`.
    F32,
    /// WGSL `i32`.
    I32,
    /// WGSL `i32`, sign-extended from the low byte after every write.
    I8,
}

impl DeviceElem {
    /// The WGSL type name.
    #[must_use]
    pub const fn wgsl(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::I32 | Self::I8 => "i32",
        }
    }
}

/// A numeric element of a [`DenseMatrix`](crate::DenseMatrix).
///
/// The arithmetic methods define the exact host semantics of every functor;
/// the WGSL kernels are written to agree with them.
pub trait Scalar: Copy + Default + PartialOrd + Debug + Send + Sync + 'static {
    /// Float or signed integer.
    const KIND: ScalarKind;
    /// Device word representation, `None` if the type is host-only.
    const DEVICE: Option<DeviceElem>;
    /// Type name used in diagnostics.
    const NAME: &'static str;
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;

    /// Lossless widening for accumulation.
    fn to_f64(self) -> f64;
    /// Narrowing from an accumulator (saturating for integers).
    fn from_f64(v: f64) -> Self;
    /// Value of element index `i` for `sequence`.
    fn from_usize(i: usize) -> Self;

    /// Encodes into a device word.
    fn to_word(self) -> u32;
    /// Decodes from a device word.
    fn from_word(w: u32) -> Self;

    /// `self + rhs`.
    fn add(self, rhs: Self) -> Self;
    /// `self - rhs`.
    fn sub(self, rhs: Self) -> Self;
    /// `self * rhs`.
    fn mul(self, rhs: Self) -> Self;
    /// `self / rhs`; integer division by zero yields `self`.
    fn div(self, rhs: Self) -> Self;
    /// `-self`.
    fn neg(self) -> Self;
    /// `|self|`.
    fn abs(self) -> Self;

    /// `e^x` through the fast base-2 path.
    fn exp_fast(self) -> Self;
    /// `e^x` through the library exponential.
    fn exp_exact(self) -> Self;
    /// Natural logarithm.
    fn ln(self) -> Self;
    /// Square root.
    fn sqrt(self) -> Self;
    /// Hyperbolic tangent.
    fn tanh(self) -> Self;

    /// Smaller of two values.
    #[inline]
    fn min_of(self, rhs: Self) -> Self {
        if rhs < self { rhs } else { self }
    }

    /// Larger of two values.
    #[inline]
    fn max_of(self, rhs: Self) -> Self {
        if rhs > self { rhs } else { self }
    }
}

/// Floating-point scalars; required by the training-step primitives.
pub trait Float: Scalar {
    /// Sign as a small integer: `1`, `-1` or `0`.
    fn sign_i8(self) -> i8;
    /// Conversion from an `f32` hyperparameter.
    fn from_f32(v: f32) -> Self;
}

macro_rules! impl_float {
    ($t:ty, $device:expr, $log2e:expr) => {
        impl Scalar for $t {
            const KIND: ScalarKind = ScalarKind::Float;
            const DEVICE: Option<DeviceElem> = $device;
            const NAME: &'static str = stringify!($t);
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            #[allow(clippy::cast_possible_truncation)]
            fn from_f64(v: f64) -> Self {
                v as Self
            }

            #[inline]
            #[allow(clippy::cast_precision_loss)]
            fn from_usize(i: usize) -> Self {
                i as Self
            }

            #[inline]
            #[allow(clippy::cast_possible_truncation)]
            fn to_word(self) -> u32 {
                (self as f32).to_bits()
            }

            #[inline]
            fn from_word(w: u32) -> Self {
                f32::from_bits(w) as Self
            }

            #[inline]
            fn add(self, rhs: Self) -> Self {
                self + rhs
            }

            #[inline]
            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }

            #[inline]
            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }

            #[inline]
            fn div(self, rhs: Self) -> Self {
                self / rhs
            }

            #[inline]
            fn neg(self) -> Self {
                -self
            }

            #[inline]
            fn abs(self) -> Self {
                <$t>::abs(self)
            }

            #[inline]
            fn exp_fast(self) -> Self {
                (self * $log2e).exp2()
            }

            #[inline]
            fn exp_exact(self) -> Self {
                <$t>::exp(self)
            }

            #[inline]
            fn ln(self) -> Self {
                <$t>::ln(self)
            }

            #[inline]
            fn sqrt(self) -> Self {
                <$t>::sqrt(self)
            }

            #[inline]
            fn tanh(self) -> Self {
                <$t>::tanh(self)
            }
        }

        impl Float for $t {
            #[inline]
            fn sign_i8(self) -> i8 {
                if self > 0.0 {
                    1
                } else if self < 0.0 {
                    -1
                } else {
                    0
                }
            }

            #[inline]
            fn from_f32(v: f32) -> Self {
                v as Self
            }
        }
    };
}

// integer transcendental methods are never reached: the functor check rejects
// them before dispatch, and they mirror the identity used by the int WGSL prelude
macro_rules! impl_int {
    ($t:ty, $device:expr) => {
        impl Scalar for $t {
            const KIND: ScalarKind = ScalarKind::SignedInt;
            const DEVICE: Option<DeviceElem> = Some($device);
            const NAME: &'static str = stringify!($t);
            const ZERO: Self = 0;
            const ONE: Self = 1;

            #[inline]
            #[allow(clippy::cast_lossless)]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            #[allow(clippy::cast_possible_truncation)]
            fn from_f64(v: f64) -> Self {
                v as Self
            }

            #[inline]
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            fn from_usize(i: usize) -> Self {
                i as Self
            }

            #[inline]
            #[allow(clippy::cast_sign_loss, clippy::cast_lossless)]
            fn to_word(self) -> u32 {
                (self as i32) as u32
            }

            #[inline]
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            fn from_word(w: u32) -> Self {
                (w as i32) as Self
            }

            #[inline]
            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            #[inline]
            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }

            #[inline]
            fn mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }

            #[inline]
            fn div(self, rhs: Self) -> Self {
                if rhs == 0 { self } else { self.wrapping_div(rhs) }
            }

            #[inline]
            fn neg(self) -> Self {
                self.wrapping_neg()
            }

            #[inline]
            fn abs(self) -> Self {
                self.wrapping_abs()
            }

            #[inline]
            fn exp_fast(self) -> Self {
                self
            }

            #[inline]
            fn exp_exact(self) -> Self {
                self
            }

            #[inline]
            fn ln(self) -> Self {
                self
            }

            #[inline]
            fn sqrt(self) -> Self {
                self
            }

            #[inline]
            fn tanh(self) -> Self {
                self
            }
        }
    };
}

impl_float!(f32, Some(DeviceElem::F32), core::f32::consts::LOG2_E);
impl_float!(f64, None, core::f64::consts::LOG2_E);
impl_int!(i32, DeviceElem::I32);
impl_int!(i8, DeviceElem::I8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i8_round_trips_through_device_words() {
        for v in [i8::MIN, -1, 0, 1, i8::MAX] {
            assert_eq!(i8::from_word(v.to_word()), v);
        }
    }

    #[test]
    fn f32_round_trips_through_device_words() {
        for v in [0.0f32, -0.0, 1.5, -3.25e-7, f32::MAX] {
            assert_eq!(f32::from_word(v.to_word()).to_bits(), v.to_bits());
        }
    }

    #[test]
    fn integer_division_by_zero_keeps_dividend() {
        assert_eq!(Scalar::div(7i32, 0), 7);
        assert_eq!(Scalar::div(i32::MIN, -1), i32::MIN);
        assert_eq!(Scalar::div(-7i8, 2), -3);
    }

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(Scalar::add(i8::MAX, 1), i8::MIN);
        assert_eq!(Scalar::mul(100i8, 3), 44);
        assert_eq!(Scalar::neg(i32::MIN), i32::MIN);
    }

    #[test]
    fn fast_and_exact_exp_agree_closely() {
        for x in [-20.0f32, -1.0, 0.0, 0.5, 3.0, 40.0] {
            let fast = x.exp_fast();
            let exact = x.exp_exact();
            assert!(((fast - exact) / exact).abs() < 1e-5, "x = {x}");
        }
    }

    #[test]
    fn float_sign_is_three_valued() {
        assert_eq!(2.5f32.sign_i8(), 1);
        assert_eq!((-0.1f64).sign_i8(), -1);
        assert_eq!(0.0f32.sign_i8(), 0);
    }
}
