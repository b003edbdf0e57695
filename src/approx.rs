//! Relative closeness of numeric results.
//!
//! Tolerances are percentages of the compared magnitudes, so the same bound
//! works for results near `1e-3` and near `1e6`. Both values must be within
//! the bound relative to each other ("strong" closeness), which keeps the
//! check symmetric.

use crate::scalar::Scalar;

/// Agreement expected between host and accelerator results, in percent.
pub const CROSS_BACKEND_PCT: f64 = 0.01;

/// Relative distance `|a - b| / max(|a|, |b|)`; zero when the values are equal.
#[must_use]
pub fn relative_difference(a: f64, b: f64) -> f64 {
    if a == b {
        return 0.0;
    }
    let diff = (a - b).abs();
    let scale = a.abs().max(b.abs());
    if scale == 0.0 { f64::INFINITY } else { diff / scale }
}

/// Whether `a` and `b` differ by at most `pct` percent of each of them.
#[must_use]
pub fn is_close(a: f64, b: f64, pct: f64) -> bool {
    if a == b {
        return true;
    }
    let bound = pct / 100.0;
    let diff = (a - b).abs();
    diff <= bound * a.abs() && diff <= bound * b.abs()
}

/// Graded agreement of two values or sequences.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Closeness {
    /// Bit-for-bit equal after widening to `f64`.
    Exact = 0,
    /// Within the requested tolerance.
    Close = 1,
    /// Outside the tolerance.
    Far = 2,
}

/// Compares against `Rhs` under a relative percentage tolerance.
pub trait RelativeEq<Rhs: ?Sized = Self> {
    /// The worst agreement between `self` and `rhs`.
    fn closeness(&self, rhs: &Rhs, pct: f64) -> Closeness;
}

macro_rules! impl_relative_eq {
    ($($t:ty),*) => {$(
        impl RelativeEq for $t {
            fn closeness(&self, rhs: &Self, pct: f64) -> Closeness {
                let (a, b) = (self.to_f64(), rhs.to_f64());
                if a == b {
                    Closeness::Exact
                } else if is_close(a, b, pct) {
                    Closeness::Close
                } else {
                    Closeness::Far
                }
            }
        }
    )*};
}

impl_relative_eq!(f32, f64, i32, i8);

impl<T: Scalar + RelativeEq> RelativeEq for [T] {
    fn closeness(&self, rhs: &Self, pct: f64) -> Closeness {
        if self.len() != rhs.len() {
            return Closeness::Far;
        }
        let mut worst = Closeness::Exact;
        for (a, b) in self.iter().zip(rhs) {
            worst = worst.max(a.closeness(b, pct));
            if worst == Closeness::Far {
                break;
            }
        }
        worst
    }
}

/// The first position where two sequences disagree, with both values.
#[must_use]
pub fn first_mismatch<T: Scalar + RelativeEq>(a: &[T], b: &[T], pct: f64) -> Option<(usize, f64, f64)> {
    a.iter()
        .zip(b)
        .enumerate()
        .find(|(_, (x, y))| x.closeness(y, pct) == Closeness::Far)
        .map(|(i, (x, y))| (i, x.to_f64(), y.to_f64()))
}

/// Whether every element pair is within `pct` percent and the lengths match.
#[must_use]
pub fn all_close<T: Scalar + RelativeEq>(a: &[T], b: &[T], pct: f64) -> bool {
    a.closeness(b, pct) != Closeness::Far
}
