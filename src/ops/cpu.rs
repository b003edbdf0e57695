//! Parallel CPU backend
//!
//! # Host Kernels
//!
//! Implements the kernel trait for [`Host`] buffers. Every kernel that writes one
//! independent value per element is parallelised with [`rayon`]; each element
//! is still computed by a single thread in a fixed order, so results do not
//! depend on scheduling.
//!
//! ## Accumulation
//!
//! - Float products and reductions accumulate in `f64` and round once.
//! - Integer products and reductions use the element type's wrapping arithmetic,
//!   which is what the accelerator does with 32-bit words.
//! - Norms run sequentially in `f64`.
//!
//! ## Layouts
//!
//! Kernels address logical `(row, col)` positions through
//! [`Order::offset`](crate::layout::Order::offset); the layout only changes the
//! stride, never the result.

use super::backend::{Checked, Kernels, NormKind, ProductSpec, VectorAxis};
use crate::config::RpropConfig;
use crate::error::KernelError;
use crate::functor::{BinaryFunctor, NullaryFunctor, ScalarFunctor};
use crate::layout::MemoryLayout;
use crate::matrix::DenseMatrix;
use crate::scalar::{Float, Scalar, ScalarKind};
use crate::space::Host;
use rayon::prelude::*;

/// Sums `n` terms, in `f64` for floats and with wrapping arithmetic for integers.
#[inline]
fn sum_terms<T: Scalar>(n: usize, term: impl Fn(usize) -> T) -> T {
    if T::KIND == ScalarKind::Float {
        T::from_f64((0..n).map(|k| term(k).to_f64()).sum())
    } else {
        (0..n).fold(T::ZERO, |acc, k| acc.add(term(k)))
    }
}

impl Kernels for Host {
    fn fill<T: Scalar, L: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, L>,
        f: NullaryFunctor<T>,
    ) -> Result<(), KernelError> {
        dst.data_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, x)| *x = f.eval(i));
        Ok(())
    }

    fn apply_scalar<T: Scalar, L: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, L>,
        f: ScalarFunctor<T>,
    ) -> Result<(), KernelError> {
        dst.data_mut().par_iter_mut().for_each(|x| *x = f.eval(*x));
        Ok(())
    }

    fn apply_binary<T: Scalar, L: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, L>,
        src: &DenseMatrix<T, Self, L>,
        f: BinaryFunctor<T>,
    ) -> Result<(), KernelError> {
        dst.data_mut()
            .par_iter_mut()
            .zip(src.data().par_iter())
            .for_each(|(d, &s)| *d = f.eval(*d, s));
        Ok(())
    }

    /// Computes `dst = α·op(lhs)·op(rhs) + β·dst` one output element per task.
    ///
    /// # Formula
    /// $$ d_{ij} = \alpha \sum_k a_{ik} b_{kj} + \beta d_{ij} $$
    ///
    /// For floats the inner sum and the scaling are evaluated in `f64`.
    fn product<T: Scalar, LD: MemoryLayout, LA: MemoryLayout, LB: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, LD>,
        lhs: &DenseMatrix<T, Self, LA>,
        rhs: &DenseMatrix<T, Self, LB>,
        spec: ProductSpec<T>,
    ) -> Result<(), KernelError> {
        let (dh, dw) = dst.shape();
        let (ah, aw) = lhs.shape();
        let (bh, bw) = rhs.shape();
        let (a, b) = (lhs.data(), rhs.data());
        let keep_dst = spec.beta != T::ZERO;

        let a_at = |r: usize, k: usize| {
            let (row, col) = if spec.transpose_lhs { (k, r) } else { (r, k) };
            a[LA::ORDER.offset(ah, aw, row, col)]
        };
        let b_at = |k: usize, c: usize| {
            let (row, col) = if spec.transpose_rhs { (c, k) } else { (k, c) };
            b[LB::ORDER.offset(bh, bw, row, col)]
        };

        dst.data_mut().par_iter_mut().enumerate().for_each(|(idx, d)| {
            let (r, c) = LD::ORDER.coords(dh, dw, idx);
            *d = if T::KIND == ScalarKind::Float {
                let dot: f64 = (0..spec.inner)
                    .map(|k| a_at(r, k).to_f64() * b_at(k, c).to_f64())
                    .sum();
                let mut v = spec.alpha.to_f64() * dot;
                if keep_dst {
                    v += spec.beta.to_f64() * d.to_f64();
                }
                T::from_f64(v)
            } else {
                let dot = (0..spec.inner).fold(T::ZERO, |acc, k| acc.add(a_at(r, k).mul(b_at(k, c))));
                let v = spec.alpha.mul(dot);
                if keep_dst { v.add(spec.beta.mul(*d)) } else { v }
            };
        });
        Ok(())
    }

    fn broadcast_add<T: Scalar, L: MemoryLayout, LV: MemoryLayout>(
        _: Checked,
        matrix: &mut DenseMatrix<T, Self, L>,
        vector: &DenseMatrix<T, Self, LV>,
        axis: VectorAxis,
    ) -> Result<(), KernelError> {
        let (h, w) = matrix.shape();
        // a vector's physical order is its logical order in either layout
        let v = vector.data();
        matrix.data_mut().par_iter_mut().enumerate().for_each(|(idx, x)| {
            let (r, c) = L::ORDER.coords(h, w, idx);
            let add = match axis {
                VectorAxis::PerRow => v[r],
                VectorAxis::PerColumn => v[c],
            };
            *x = x.add(add);
        });
        Ok(())
    }

    fn reduce_sum<T: Scalar, L: MemoryLayout, LV: MemoryLayout>(
        _: Checked,
        out: &mut DenseMatrix<T, Self, LV>,
        matrix: &DenseMatrix<T, Self, L>,
        axis: VectorAxis,
    ) -> Result<(), KernelError> {
        let (h, w) = matrix.shape();
        let m = matrix.data();
        out.data_mut().par_iter_mut().enumerate().for_each(|(i, o)| {
            *o = match axis {
                VectorAxis::PerRow => sum_terms(w, |c| m[L::ORDER.offset(h, w, i, c)]),
                VectorAxis::PerColumn => sum_terms(h, |r| m[L::ORDER.offset(h, w, r, i)]),
            };
        });
        Ok(())
    }

    fn norm<T: Scalar, L: MemoryLayout>(
        _: Checked,
        v: &DenseMatrix<T, Self, L>,
        kind: NormKind,
    ) -> Result<f64, KernelError> {
        let data = v.data();
        Ok(match kind {
            NormKind::L1 => data.iter().map(|x| x.to_f64().abs()).sum(),
            NormKind::L2 => data.iter().map(|x| x.to_f64().powi(2)).sum::<f64>().sqrt(),
        })
    }

    fn rprop<T: Float, L: MemoryLayout>(
        _: Checked,
        weight: &mut DenseMatrix<T, Self, L>,
        gradient: &DenseMatrix<T, Self, L>,
        prev_sign: &mut DenseMatrix<i8, Self, L>,
        step_size: &mut DenseMatrix<T, Self, L>,
        config: &RpropConfig,
    ) -> Result<(), KernelError> {
        let eta_plus = T::from_f32(config.eta_plus);
        let eta_minus = T::from_f32(config.eta_minus);
        let step_min = T::from_f32(config.step_min);
        let step_max = T::from_f32(config.step_max);

        weight
            .data_mut()
            .par_iter_mut()
            .zip(gradient.data().par_iter())
            .zip(prev_sign.data_mut().par_iter_mut())
            .zip(step_size.data_mut().par_iter_mut())
            .for_each(|(((w, &g), prev), step)| {
                let sign = g.sign_i8();
                let agreement = sign * prev.signum();
                if agreement > 0 {
                    *step = step.mul(eta_plus).min_of(step_max);
                } else if agreement < 0 {
                    *step = step.mul(eta_minus).max_of(step_min);
                }
                if agreement >= 0 {
                    *w = w.sub(T::from_f64(f64::from(sign)).mul(*step));
                }
                *prev = sign;
            });
        Ok(())
    }

    fn weight_decay<T: Float, L: MemoryLayout>(
        _: Checked,
        weight: &mut DenseMatrix<T, Self, L>,
        gradient: &DenseMatrix<T, Self, L>,
        learning_rate: T,
        decay_rate: T,
    ) -> Result<(), KernelError> {
        let keep = T::ONE.sub(decay_rate);
        weight
            .data_mut()
            .par_iter_mut()
            .zip(gradient.data().par_iter())
            .for_each(|(w, &g)| *w = w.sub(learning_rate.mul(g)).mul(keep));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ColumnMajor, RowMajor};
    use crate::matrix::HostMatrix;
    use crate::ops::dispatch::{
        add_column_broadcast, add_row_broadcast, apply_binary, norm1, norm2, product, product_scaled,
        reduce_columns_to_row, reduce_rows_to_column, rprop, sequence, weight_decay,
    };

    #[test]
    fn product_matches_hand_computed_result() {
        let a: HostMatrix<f32, RowMajor> = crate::matrix!([1.0, 2.0], [3.0, 4.0]).unwrap();
        let b: HostMatrix<f32, ColumnMajor> = crate::matrix!([5.0, 6.0], [7.0, 8.0]).unwrap();
        let mut c = HostMatrix::<f32, RowMajor>::new(2, 2).unwrap();
        product(&mut c, &a, &b, false, false).unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);

        product(&mut c, &a, &b, true, false).unwrap();
        assert_eq!(c.to_rows().unwrap(), vec![26.0, 30.0, 38.0, 44.0]);
    }

    #[test]
    fn product_scaled_blends_destination() {
        let a: HostMatrix<i32> = crate::matrix!([1, 2]).unwrap();
        let b: HostMatrix<i32> = crate::matrix!([3], [4]).unwrap();
        let mut c: HostMatrix<i32> = crate::matrix!([10]).unwrap();
        product_scaled(&mut c, &a, &b, false, false, 2, 3).unwrap();
        assert_eq!(c.data(), &[2 * 11 + 3 * 10]);
        product_scaled(&mut c, &a, &b, false, false, 1, 0).unwrap();
        assert_eq!(c.data(), &[11]);
    }

    #[test]
    fn beta_zero_ignores_nan_destination() {
        let a: HostMatrix<f32> = crate::matrix!([1.0]).unwrap();
        let mut c: HostMatrix<f32> = crate::matrix!([f32::NAN]).unwrap();
        product(&mut c, &a, &a, false, false).unwrap();
        assert_eq!(c.data(), &[1.0]);
    }

    #[test]
    fn broadcasts_follow_logical_addressing() {
        let col: HostMatrix<i32> = crate::matrix!([10], [20]).unwrap();
        let row: HostMatrix<i32> = crate::matrix!([1, 2, 3]).unwrap();
        let mut cm = HostMatrix::<i32, ColumnMajor>::new(2, 3).unwrap();
        let mut rm = HostMatrix::<i32, RowMajor>::new(2, 3).unwrap();
        add_column_broadcast(&mut cm, &col).unwrap();
        add_row_broadcast(&mut cm, &row).unwrap();
        add_column_broadcast(&mut rm, &col).unwrap();
        add_row_broadcast(&mut rm, &row).unwrap();
        let expected = vec![11, 12, 13, 21, 22, 23];
        assert_eq!(cm.to_rows().unwrap(), expected);
        assert_eq!(rm.to_rows().unwrap(), expected);
    }

    #[test]
    fn reductions_sum_rows_and_columns() {
        let m: HostMatrix<f64, RowMajor> = crate::matrix!([1.0, 2.0, 3.0], [4.0, 5.0, 6.0]).unwrap();
        let mut col = HostMatrix::<f64>::vector(2).unwrap();
        let mut row = HostMatrix::<f64>::new(1, 3).unwrap();
        reduce_rows_to_column(&mut col, &m).unwrap();
        reduce_columns_to_row(&mut row, &m).unwrap();
        assert_eq!(col.data(), &[6.0, 15.0]);
        assert_eq!(row.data(), &[5.0, 7.0, 9.0]);
    }

    #[test]
    fn norms_of_a_sequence() {
        let mut v = HostMatrix::<f32>::vector(4).unwrap();
        sequence(&mut v).unwrap();
        assert_eq!(norm1(&v).unwrap(), 6.0);
        assert!((norm2(&v).unwrap() - 14.0f64.sqrt()).abs() < 1e-12);
        let empty = HostMatrix::<f32>::vector(0).unwrap();
        assert_eq!(norm2(&empty).unwrap(), 0.0);
    }

    #[test]
    fn rprop_adapts_steps_by_sign_agreement() {
        let mut w: HostMatrix<f32> = crate::matrix!([1.0, 1.0, 1.0, 1.0]).unwrap();
        let g: HostMatrix<f32> = crate::matrix!([0.5, -0.5, 0.5, 0.0]).unwrap();
        let mut prev: HostMatrix<i8> = crate::matrix!([1, 1, 0, 1]).unwrap();
        let mut step: HostMatrix<f32> = crate::matrix!([0.1, 0.1, 0.1, 0.1]).unwrap();
        rprop(&mut w, &g, &mut prev, &mut step).unwrap();

        // agree: grow then move against the gradient
        assert!((step.data()[0] - 0.12).abs() < 1e-7);
        assert!((w.data()[0] - 0.88).abs() < 1e-6);
        // disagree: shrink and hold
        assert!((step.data()[1] - 0.05).abs() < 1e-7);
        assert_eq!(w.data()[1], 1.0);
        // no history: keep step, still move
        assert_eq!(step.data()[2], 0.1);
        assert!((w.data()[2] - 0.9).abs() < 1e-6);
        // zero gradient: nothing moves
        assert_eq!((w.data()[3], step.data()[3]), (1.0, 0.1));

        assert_eq!(prev.data(), &[1, -1, 1, 0]);
    }

    #[test]
    fn rprop_clamps_to_bounds() {
        let mut w = HostMatrix::<f64>::vector(2).unwrap();
        let g: HostMatrix<f64> = crate::matrix!([1.0], [1.0]).unwrap();
        let mut prev: HostMatrix<i8> = crate::matrix!([1], [-1]).unwrap();
        let mut step: HostMatrix<f64> = crate::matrix!([49.0], [1.5e-6]).unwrap();
        rprop(&mut w, &g, &mut prev, &mut step).unwrap();
        assert!((step.data()[0] - 50.0).abs() < 1e-4);
        assert!((step.data()[1] - 1e-6).abs() < 1e-12);
    }

    #[test]
    fn weight_decay_shrinks_after_the_gradient_step() {
        let mut w: HostMatrix<f32> = crate::matrix!([1.0, -2.0]).unwrap();
        let g: HostMatrix<f32> = crate::matrix!([0.5, 0.0]).unwrap();
        weight_decay(&mut w, &g, 0.2, 0.1).unwrap();
        assert!((w.data()[0] - 0.81).abs() < 1e-6);
        assert!((w.data()[1] + 1.8).abs() < 1e-6);
    }

    #[test]
    fn integer_binary_ops_wrap() {
        let mut a: HostMatrix<i8> = crate::matrix!([120, -128]).unwrap();
        let b: HostMatrix<i8> = crate::matrix!([10, 1]).unwrap();
        apply_binary(&mut a, &b, BinaryFunctor::Add).unwrap();
        assert_eq!(a.data(), &[-126, -127]);
    }
}
