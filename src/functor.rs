//! Element-wise functor descriptors.
//!
//! A functor is a tag plus its 0–2 parameters. Each backend matches on the tag
//! exhaustively, so adding a variant is a compile error until every backend
//! handles it. The numeric opcodes below are shared with the WGSL kernels in
//! `ops/shaders/` and must stay in sync with them.

use crate::error::KernelError;
use crate::scalar::{Scalar, ScalarKind};

/// Functors with no operand, used to initialise buffers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NullaryFunctor<T> {
    /// Every element becomes the value.
    Fill(T),
    /// Physical element `i` becomes `i`.
    Sequence,
}

impl<T: Scalar> NullaryFunctor<T> {
    #[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
    #[must_use]
    pub(crate) fn opcode(self) -> u32 {
        match self {
            Self::Fill(_) => 0,
            Self::Sequence => 1,
        }
    }

    #[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
    #[must_use]
    pub(crate) fn value(self) -> T {
        match self {
            Self::Fill(v) => v,
            Self::Sequence => T::ZERO,
        }
    }

    /// The value of physical element `idx`.
    #[inline]
    #[must_use]
    pub fn eval(self, idx: usize) -> T {
        match self {
            Self::Fill(v) => v,
            Self::Sequence => T::from_usize(idx),
        }
    }
}

/// Functors mapping one element to a new value: `x ← f(x)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarFunctor<T> {
    /// `e^x`, fast path.
    Exp,
    /// `e^x`, range-reduced path; within [`EXP_TOLERANCE`] of [`ScalarFunctor::Exp`].
    ExactExp,
    /// `x · c`.
    Mult(T),
    /// `x + c`.
    Add(T),
    /// `a · x + b`.
    Axpb(T, T),
    /// Logistic sigmoid `1 / (1 + e^-x)`.
    Sigm,
    /// `tanh(x)`.
    Tanh,
    /// `x²`.
    Square,
    /// `√x`.
    Sqrt,
    /// `ln(x)`.
    Log,
    /// `|x|`.
    Abs,
    /// `-x`.
    Negate,
    /// `1 / x`.
    Inv,
}

/// Relative tolerance between [`ScalarFunctor::Exp`] and [`ScalarFunctor::ExactExp`]
/// on the same input, for `f32` arguments in `[-80, 80]`.
pub const EXP_TOLERANCE: f64 = 1e-5;

impl<T: Scalar> ScalarFunctor<T> {
    /// Lower-case tag name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Exp => "exp",
            Self::ExactExp => "exact_exp",
            Self::Mult(_) => "mult",
            Self::Add(_) => "add",
            Self::Axpb(..) => "axpb",
            Self::Sigm => "sigm",
            Self::Tanh => "tanh",
            Self::Square => "square",
            Self::Sqrt => "sqrt",
            Self::Log => "log",
            Self::Abs => "abs",
            Self::Negate => "negate",
            Self::Inv => "inv",
        }
    }

    /// Whether the tag is only defined for floating-point elements.
    #[must_use]
    pub const fn requires_float(&self) -> bool {
        matches!(
            self,
            Self::Exp | Self::ExactExp | Self::Sigm | Self::Tanh | Self::Sqrt | Self::Log | Self::Inv
        )
    }

    /// Rejects tags that are invalid for `T`.
    ///
    /// # Errors
    ///
    /// [`KernelError::UnsupportedOperation`] for float-only tags on integer elements.
    pub fn check(&self) -> Result<(), KernelError> {
        if self.requires_float() && T::KIND == ScalarKind::SignedInt {
            return Err(KernelError::unsupported(
                "apply_scalar",
                format!("`{}` is not defined for {} elements", self.name(), T::NAME),
            ));
        }
        Ok(())
    }

    #[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
    #[must_use]
    pub(crate) const fn opcode(&self) -> u32 {
        match self {
            Self::Exp => 0,
            Self::ExactExp => 1,
            Self::Mult(_) => 2,
            Self::Add(_) => 3,
            Self::Axpb(..) => 4,
            Self::Sigm => 5,
            Self::Tanh => 6,
            Self::Square => 7,
            Self::Sqrt => 8,
            Self::Log => 9,
            Self::Abs => 10,
            Self::Negate => 11,
            Self::Inv => 12,
        }
    }

    #[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
    #[must_use]
    pub(crate) fn params(&self) -> (T, T) {
        match *self {
            Self::Mult(c) | Self::Add(c) => (c, T::ZERO),
            Self::Axpb(a, b) => (a, b),
            _ => (T::ZERO, T::ZERO),
        }
    }

    /// Host evaluation of the functor on one element.
    #[inline]
    #[must_use]
    pub fn eval(&self, x: T) -> T {
        match *self {
            Self::Exp => x.exp_fast(),
            Self::ExactExp => x.exp_exact(),
            Self::Mult(c) => x.mul(c),
            Self::Add(c) => x.add(c),
            Self::Axpb(a, b) => a.mul(x).add(b),
            Self::Sigm => T::ONE.div(T::ONE.add(x.neg().exp_exact())),
            Self::Tanh => x.tanh(),
            Self::Square => x.mul(x),
            Self::Sqrt => x.sqrt(),
            Self::Log => x.ln(),
            Self::Abs => x.abs(),
            Self::Negate => x.neg(),
            Self::Inv => T::ONE.div(x),
        }
    }
}

/// Functors combining a destination and a source element: `dst ← f(dst, src)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryFunctor<T> {
    /// `dst + src`.
    Add,
    /// `dst - src`.
    Subtract,
    /// `dst · src`.
    Mult,
    /// `dst / src`.
    Div,
    /// `min(dst, src)`.
    Min,
    /// `max(dst, src)`.
    Max,
    /// `src`.
    Copy,
    /// `dst + α·src`.
    Axpy(T),
    /// `α·src + β·dst`.
    Axpby(T, T),
    /// `src + β·dst`.
    Xpby(T),
}

impl<T: Scalar> BinaryFunctor<T> {
    /// Lower-case tag name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Mult => "mult",
            Self::Div => "div",
            Self::Min => "min",
            Self::Max => "max",
            Self::Copy => "copy",
            Self::Axpy(_) => "axpy",
            Self::Axpby(..) => "axpby",
            Self::Xpby(_) => "xpby",
        }
    }

    #[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
    #[must_use]
    pub(crate) const fn opcode(&self) -> u32 {
        match self {
            Self::Add => 0,
            Self::Subtract => 1,
            Self::Mult => 2,
            Self::Div => 3,
            Self::Min => 4,
            Self::Max => 5,
            Self::Copy => 6,
            Self::Axpy(_) => 7,
            Self::Axpby(..) => 8,
            Self::Xpby(_) => 9,
        }
    }

    #[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
    #[must_use]
    pub(crate) fn params(&self) -> (T, T) {
        match *self {
            Self::Axpy(a) => (a, T::ZERO),
            Self::Axpby(a, b) => (a, b),
            Self::Xpby(b) => (T::ZERO, b),
            _ => (T::ZERO, T::ZERO),
        }
    }

    /// Host evaluation of the functor on one element pair.
    #[inline]
    #[must_use]
    pub fn eval(&self, dst: T, src: T) -> T {
        match *self {
            Self::Add => dst.add(src),
            Self::Subtract => dst.sub(src),
            Self::Mult => dst.mul(src),
            Self::Div => dst.div(src),
            Self::Min => dst.min_of(src),
            Self::Max => dst.max_of(src),
            Self::Copy => src,
            Self::Axpy(a) => dst.add(a.mul(src)),
            Self::Axpby(a, b) => a.mul(src).add(b.mul(dst)),
            Self::Xpby(b) => src.add(b.mul(dst)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axpby_scales_source_by_alpha() {
        let f = BinaryFunctor::Axpby(2.0f32, 3.0);
        // dst = 2*src + 3*dst
        assert_eq!(f.eval(1.0, 5.0), 13.0);
    }

    #[test]
    fn xpby_and_axpy() {
        assert_eq!(BinaryFunctor::Xpby(1.8f32).eval(2.0, 1.0), 1.0 + 1.8 * 2.0);
        assert_eq!(BinaryFunctor::Axpy(2i32).eval(3, 4), 11);
    }

    #[test]
    fn integer_exp_is_unsupported() {
        let err = ScalarFunctor::<i32>::Exp.check().unwrap_err();
        assert!(matches!(err, KernelError::UnsupportedOperation { op: "apply_scalar", .. }));
        assert!(ScalarFunctor::<i32>::Add(3).check().is_ok());
        assert!(ScalarFunctor::<f32>::Log.check().is_ok());
    }

    #[test]
    fn sigm_is_bounded() {
        let f = ScalarFunctor::<f64>::Sigm;
        assert!((f.eval(0.0) - 0.5).abs() < 1e-12);
        assert!(f.eval(40.0) <= 1.0);
        assert!(f.eval(-40.0) >= 0.0);
    }

    #[test]
    fn sequence_counts_physical_positions() {
        let f = NullaryFunctor::<f32>::Sequence;
        assert_eq!(f.eval(0), 0.0);
        assert_eq!(f.eval(41), 41.0);
        assert_eq!(NullaryFunctor::Fill(7i8).eval(3), 7);
    }

    #[test]
    fn opcodes_are_distinct() {
        let scalar = [
            ScalarFunctor::<f32>::Exp,
            ScalarFunctor::ExactExp,
            ScalarFunctor::Mult(0.0),
            ScalarFunctor::Add(0.0),
            ScalarFunctor::Axpb(0.0, 0.0),
            ScalarFunctor::Sigm,
            ScalarFunctor::Tanh,
            ScalarFunctor::Square,
            ScalarFunctor::Sqrt,
            ScalarFunctor::Log,
            ScalarFunctor::Abs,
            ScalarFunctor::Negate,
            ScalarFunctor::Inv,
        ];
        for (i, f) in scalar.iter().enumerate() {
            assert_eq!(f.opcode() as usize, i, "{}", f.name());
        }
    }
}
