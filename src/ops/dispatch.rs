//! Operation Dispatch Layer
//!
//! Backend-agnostic entry points for every kernel. Each function validates its
//! operands (shapes, functor support, memory-space colocation, config) and only
//! then hands them to the kernels of the operands' memory space. A call that returns `Err` has not modified anything.
//!
//! The backend is chosen statically by the memory-space type parameter of the
//! operands, so there is no runtime backend switch and no fallback: a host
//! buffer always runs on [`cpu`](super::cpu), a device buffer always runs on
//! [`wgpu`](super::wgpu).
//!
//! # Example
//! ```rust
//! use briny_linalg::{apply_binary, apply_scalar, sequence, BinaryFunctor, HostMatrix, ScalarFunctor};
//!
//! let mut v = HostMatrix::<f32>::new(4, 4).unwrap();
//! let mut w = HostMatrix::<f32>::new(4, 4).unwrap();
//! sequence(&mut v).unwrap();
//! sequence(&mut w).unwrap();
//! apply_scalar(&mut v, ScalarFunctor::Add(1.0)).unwrap();
//! apply_binary(&mut v, &w, BinaryFunctor::Add).unwrap();
//! assert_eq!(v.data()[3], 3.0 + 3.0 + 1.0);
//! ```

use super::backend::{Checked, Kernels, NormKind, ProductSpec, VectorAxis};
use crate::config::RpropConfig;
use crate::error::{KernelError, Shape, ensure_shape};
use crate::functor::{BinaryFunctor, NullaryFunctor, ScalarFunctor};
use crate::layout::MemoryLayout;
use crate::matrix::DenseMatrix;
use crate::scalar::{Float, Scalar};
use crate::space::MemorySpace;
use tracing::{trace, warn};

/// A memory space whose buffers the entry points in this module accept.
///
/// Sealed: it is implemented for [`Host`](crate::Host) and, with the `wgpu`
/// feature, `Device`. The kernels behind it are only reachable through the
/// validated functions below.
///
/// ```compile_fail
/// use briny_linalg::ops::backend::Kernels;
/// ```
pub trait Backend: Kernels {}

impl<S: Kernels> Backend for S {}

fn ensure_colocated<S: MemorySpace, A: Scalar, B: Scalar>(
    op: &'static str,
    a: &S::Storage<A>,
    b: &S::Storage<B>,
) -> Result<(), KernelError> {
    if S::colocated(a, b) {
        Ok(())
    } else {
        warn!(op, space = ?S::SPACE, "operands belong to different contexts");
        Err(KernelError::unsupported(op, "operands live in different memory spaces"))
    }
}

fn ensure_vector(op: &'static str, len: usize, actual: Shape) -> Result<(), KernelError> {
    if actual == (len, 1) || actual == (1, len) {
        Ok(())
    } else {
        Err(KernelError::ShapeMismatch {
            op,
            expected: (len, 1),
            actual,
        })
    }
}

/// Fills every element with `value`.
///
/// # Errors
///
/// Backend failures only.
pub fn fill<T: Scalar, S: Backend, L: MemoryLayout>(
    dst: &mut DenseMatrix<T, S, L>,
    value: T,
) -> Result<(), KernelError> {
    trace!(op = "fill", space = ?S::SPACE, shape = ?dst.shape());
    S::fill(Checked(()), dst, NullaryFunctor::Fill(value))
}

/// Sets physical element `i` to `i`.
///
/// # Errors
///
/// Backend failures only.
pub fn sequence<T: Scalar, S: Backend, L: MemoryLayout>(
    dst: &mut DenseMatrix<T, S, L>,
) -> Result<(), KernelError> {
    trace!(op = "sequence", space = ?S::SPACE, shape = ?dst.shape());
    S::fill(Checked(()), dst, NullaryFunctor::Sequence)
}

/// Applies a scalar functor to every element, in place.
///
/// # Errors
///
/// [`KernelError::UnsupportedOperation`] if the functor is not defined for `T`.
pub fn apply_scalar<T: Scalar, S: Backend, L: MemoryLayout>(
    dst: &mut DenseMatrix<T, S, L>,
    f: ScalarFunctor<T>,
) -> Result<(), KernelError> {
    f.check()?;
    trace!(op = "apply_scalar", functor = f.name(), space = ?S::SPACE, shape = ?dst.shape());
    S::apply_scalar(Checked(()), dst, f)
}

/// Applies a binary functor element-wise: `dst ← f(dst, src)`.
///
/// # Errors
///
/// [`KernelError::ShapeMismatch`] unless both shapes are equal;
/// [`KernelError::UnsupportedOperation`] if the operands are not colocated.
pub fn apply_binary<T: Scalar, S: Backend, L: MemoryLayout>(
    dst: &mut DenseMatrix<T, S, L>,
    src: &DenseMatrix<T, S, L>,
    f: BinaryFunctor<T>,
) -> Result<(), KernelError> {
    ensure_shape("apply_binary", dst.shape(), src.shape())?;
    ensure_colocated::<S, T, T>("apply_binary", dst.storage(), src.storage())?;
    trace!(op = "apply_binary", functor = f.name(), space = ?S::SPACE, shape = ?dst.shape());
    S::apply_binary(Checked(()), dst, src, f)
}

/// Copies `src` into `dst` (same space, same layout).
///
/// # Errors
///
/// As [`apply_binary`].
pub fn copy<T: Scalar, S: Backend, L: MemoryLayout>(
    dst: &mut DenseMatrix<T, S, L>,
    src: &DenseMatrix<T, S, L>,
) -> Result<(), KernelError> {
    apply_binary(dst, src, BinaryFunctor::Copy)
}

/// `dst = op(lhs) × op(rhs)`, where `op` transposes when its flag is set.
///
/// # Errors
///
/// [`KernelError::ShapeMismatch`] if the inner dimensions differ or `dst` is not
/// `(rows(op(lhs)), cols(op(rhs)))`.
pub fn product<T, S, LD, LA, LB>(
    dst: &mut DenseMatrix<T, S, LD>,
    lhs: &DenseMatrix<T, S, LA>,
    rhs: &DenseMatrix<T, S, LB>,
    transpose_lhs: bool,
    transpose_rhs: bool,
) -> Result<(), KernelError>
where
    T: Scalar,
    S: Backend,
    LD: MemoryLayout,
    LA: MemoryLayout,
    LB: MemoryLayout,
{
    product_scaled(dst, lhs, rhs, transpose_lhs, transpose_rhs, T::ONE, T::ZERO)
}

/// `dst = α·op(lhs)·op(rhs) + β·dst`; with `β == 0` the prior contents of `dst` are ignored.
///
/// # Errors
///
/// As [`product`], plus [`KernelError::UnsupportedOperation`] for operands from
/// different contexts.
#[allow(clippy::too_many_arguments)]
pub fn product_scaled<T, S, LD, LA, LB>(
    dst: &mut DenseMatrix<T, S, LD>,
    lhs: &DenseMatrix<T, S, LA>,
    rhs: &DenseMatrix<T, S, LB>,
    transpose_lhs: bool,
    transpose_rhs: bool,
    alpha: T,
    beta: T,
) -> Result<(), KernelError>
where
    T: Scalar,
    S: Backend,
    LD: MemoryLayout,
    LA: MemoryLayout,
    LB: MemoryLayout,
{
    let (rows, inner) = transposed(lhs.shape(), transpose_lhs);
    let (rhs_inner, cols) = transposed(rhs.shape(), transpose_rhs);
    ensure_shape("product", (inner, cols), (rhs_inner, cols))?;
    ensure_shape("product", (rows, cols), dst.shape())?;
    ensure_colocated::<S, T, T>("product", dst.storage(), lhs.storage())?;
    ensure_colocated::<S, T, T>("product", dst.storage(), rhs.storage())?;
    trace!(op = "product", space = ?S::SPACE, rows, cols, inner, transpose_lhs, transpose_rhs);
    S::product(
        Checked(()),
        dst,
        lhs,
        rhs,
        ProductSpec {
            rows,
            cols,
            inner,
            transpose_lhs,
            transpose_rhs,
            alpha,
            beta,
        },
    )
}

const fn transposed((h, w): Shape, transpose: bool) -> Shape {
    if transpose { (w, h) } else { (h, w) }
}

/// Adds `column[i]` to every element of row `i`, whatever the layout of `matrix`.
///
/// # Errors
///
/// [`KernelError::ShapeMismatch`] unless `column` is a vector of length `matrix.height()`.
pub fn add_column_broadcast<T: Scalar, S: Backend, L: MemoryLayout, LV: MemoryLayout>(
    matrix: &mut DenseMatrix<T, S, L>,
    column: &DenseMatrix<T, S, LV>,
) -> Result<(), KernelError> {
    ensure_vector("add_column_broadcast", matrix.height(), column.shape())?;
    ensure_colocated::<S, T, T>("add_column_broadcast", matrix.storage(), column.storage())?;
    trace!(op = "add_column_broadcast", space = ?S::SPACE, shape = ?matrix.shape());
    S::broadcast_add(Checked(()), matrix, column, VectorAxis::PerRow)
}

/// Adds `row[j]` to every element of column `j`, whatever the layout of `matrix`.
///
/// # Errors
///
/// [`KernelError::ShapeMismatch`] unless `row` is a vector of length `matrix.width()`.
pub fn add_row_broadcast<T: Scalar, S: Backend, L: MemoryLayout, LV: MemoryLayout>(
    matrix: &mut DenseMatrix<T, S, L>,
    row: &DenseMatrix<T, S, LV>,
) -> Result<(), KernelError> {
    ensure_vector("add_row_broadcast", matrix.width(), row.shape())?;
    ensure_colocated::<S, T, T>("add_row_broadcast", matrix.storage(), row.storage())?;
    trace!(op = "add_row_broadcast", space = ?S::SPACE, shape = ?matrix.shape());
    S::broadcast_add(Checked(()), matrix, row, VectorAxis::PerColumn)
}

/// `out_column[i] = Σ_j matrix[i][j]`.
///
/// # Errors
///
/// [`KernelError::ShapeMismatch`] unless `out_column` is a vector of length `matrix.height()`.
pub fn reduce_rows_to_column<T: Scalar, S: Backend, L: MemoryLayout, LV: MemoryLayout>(
    out_column: &mut DenseMatrix<T, S, LV>,
    matrix: &DenseMatrix<T, S, L>,
) -> Result<(), KernelError> {
    ensure_vector("reduce_rows_to_column", matrix.height(), out_column.shape())?;
    ensure_colocated::<S, T, T>("reduce_rows_to_column", out_column.storage(), matrix.storage())?;
    trace!(op = "reduce_rows_to_column", space = ?S::SPACE, shape = ?matrix.shape());
    S::reduce_sum(Checked(()), out_column, matrix, VectorAxis::PerRow)
}

/// `out_row[j] = Σ_i matrix[i][j]`.
///
/// # Errors
///
/// [`KernelError::ShapeMismatch`] unless `out_row` is a vector of length `matrix.width()`.
pub fn reduce_columns_to_row<T: Scalar, S: Backend, L: MemoryLayout, LV: MemoryLayout>(
    out_row: &mut DenseMatrix<T, S, LV>,
    matrix: &DenseMatrix<T, S, L>,
) -> Result<(), KernelError> {
    ensure_vector("reduce_columns_to_row", matrix.width(), out_row.shape())?;
    ensure_colocated::<S, T, T>("reduce_columns_to_row", out_row.storage(), matrix.storage())?;
    trace!(op = "reduce_columns_to_row", space = ?S::SPACE, shape = ?matrix.shape());
    S::reduce_sum(Checked(()), out_row, matrix, VectorAxis::PerColumn)
}

/// `Σ |x_i|` over all elements, accumulated and returned in `f64`.
///
/// Integer buffers are widened, so the norm never wraps or saturates.
///
/// # Errors
///
/// Backend failures only.
pub fn norm1<T: Scalar, S: Backend, L: MemoryLayout>(v: &DenseMatrix<T, S, L>) -> Result<f64, KernelError> {
    trace!(op = "norm1", space = ?S::SPACE, shape = ?v.shape());
    S::norm(Checked(()), v, NormKind::L1)
}

/// `sqrt(Σ x_i²)` over all elements, accumulated and returned in `f64`.
///
/// # Errors
///
/// Backend failures only.
pub fn norm2<T: Scalar, S: Backend, L: MemoryLayout>(v: &DenseMatrix<T, S, L>) -> Result<f64, KernelError> {
    trace!(op = "norm2", space = ?S::SPACE, shape = ?v.shape());
    S::norm(Checked(()), v, NormKind::L2)
}

/// One resilient-propagation step with the default [`RpropConfig`].
///
/// # Errors
///
/// As [`rprop_with`].
pub fn rprop<T: Float, S: Backend, L: MemoryLayout>(
    weight: &mut DenseMatrix<T, S, L>,
    gradient: &DenseMatrix<T, S, L>,
    prev_sign: &mut DenseMatrix<i8, S, L>,
    step_size: &mut DenseMatrix<T, S, L>,
) -> Result<(), KernelError> {
    rprop_with(weight, gradient, prev_sign, step_size, &RpropConfig::default())
}

/// One resilient-propagation step, element-wise over four same-shaped buffers.
///
/// For every position, with `s = sign(gradient)` and `a = s · prev_sign`:
///
/// 1. `a > 0`: `step = min(step · eta_plus, step_max)`, then `weight -= s · step`.
/// 2. `a < 0`: `step = max(step · eta_minus, step_min)`; the weight is left unchanged.
/// 3. `a == 0` (no history, or a zero gradient): step unchanged, `weight -= s · step`.
/// 4. `prev_sign = s`.
///
/// A freshly zeroed `prev_sign` therefore means "no history".
///
/// # Errors
///
/// [`KernelError::ShapeMismatch`] unless all four shapes are equal;
/// [`KernelError::UnsupportedOperation`] for an invalid config or operands from
/// different contexts.
pub fn rprop_with<T: Float, S: Backend, L: MemoryLayout>(
    weight: &mut DenseMatrix<T, S, L>,
    gradient: &DenseMatrix<T, S, L>,
    prev_sign: &mut DenseMatrix<i8, S, L>,
    step_size: &mut DenseMatrix<T, S, L>,
    config: &RpropConfig,
) -> Result<(), KernelError> {
    config.validate()?;
    let shape = weight.shape();
    ensure_shape("rprop", shape, gradient.shape())?;
    ensure_shape("rprop", shape, prev_sign.shape())?;
    ensure_shape("rprop", shape, step_size.shape())?;
    ensure_colocated::<S, T, T>("rprop", weight.storage(), gradient.storage())?;
    ensure_colocated::<S, T, i8>("rprop", weight.storage(), prev_sign.storage())?;
    ensure_colocated::<S, T, T>("rprop", weight.storage(), step_size.storage())?;
    trace!(op = "rprop", space = ?S::SPACE, ?shape);
    S::rprop(Checked(()), weight, gradient, prev_sign, step_size, config)
}

/// Gradient step followed by multiplicative decay: `w ← (w - lr·g) · (1 - decay)`.
///
/// # Errors
///
/// [`KernelError::ShapeMismatch`] unless both shapes are equal;
/// [`KernelError::UnsupportedOperation`] for operands from different contexts.
pub fn weight_decay<T: Float, S: Backend, L: MemoryLayout>(
    weight: &mut DenseMatrix<T, S, L>,
    gradient: &DenseMatrix<T, S, L>,
    learning_rate: T,
    decay_rate: T,
) -> Result<(), KernelError> {
    ensure_shape("weight_decay", weight.shape(), gradient.shape())?;
    ensure_colocated::<S, T, T>("weight_decay", weight.storage(), gradient.storage())?;
    trace!(op = "weight_decay", space = ?S::SPACE, shape = ?weight.shape());
    S::weight_decay(Checked(()), weight, gradient, learning_rate, decay_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ColumnMajor, RowMajor};
    use crate::matrix::HostMatrix;

    #[test]
    fn binary_shape_mismatch_leaves_dst_untouched() {
        let mut a = HostMatrix::<f32>::new(2, 3).unwrap();
        let b = HostMatrix::<f32>::new(3, 2).unwrap();
        fill(&mut a, 4.0).unwrap();
        let err = apply_binary(&mut a, &b, BinaryFunctor::Add).unwrap_err();
        assert!(matches!(err, KernelError::ShapeMismatch { op: "apply_binary", .. }));
        assert!(a.data().iter().all(|&x| x == 4.0));
    }

    #[test]
    fn short_source_is_rejected_before_any_element_changes() {
        let mut dst = HostMatrix::<f32>::new(2, 3).unwrap();
        let mut src = HostMatrix::<f32>::new(1, 2).unwrap();
        fill(&mut dst, 1.0).unwrap();
        fill(&mut src, 5.0).unwrap();
        assert!(apply_binary(&mut dst, &src, BinaryFunctor::Add).is_err());
        assert_eq!(dst.data(), &[1.0; 6]);
    }

    #[test]
    fn short_broadcast_vector_is_an_error_not_a_panic() {
        let mut m = HostMatrix::<f32>::new(4, 4).unwrap();
        let v = HostMatrix::<f32>::vector(2).unwrap();
        let err = add_column_broadcast(&mut m, &v).unwrap_err();
        assert!(matches!(
            err,
            KernelError::ShapeMismatch {
                op: "add_column_broadcast",
                expected: (4, 1),
                actual: (2, 1)
            }
        ));
        let mut out = HostMatrix::<f32>::vector(2).unwrap();
        assert!(reduce_rows_to_column(&mut out, &m).is_err());
    }

    #[test]
    fn product_checks_inner_dimension_after_transpose() {
        let mut dst = HostMatrix::<f32>::new(1, 4).unwrap();
        let lhs = HostMatrix::<f32>::new(1, 4).unwrap();
        let rhs = HostMatrix::<f32>::new(4, 4).unwrap();
        assert!(product(&mut dst, &lhs, &rhs, false, true).is_ok());
        let wide = HostMatrix::<f32>::new(3, 4).unwrap();
        let err = product(&mut dst, &lhs, &wide, false, false).unwrap_err();
        assert!(matches!(err, KernelError::ShapeMismatch { op: "product", .. }));
    }

    #[test]
    fn product_rejects_wrong_destination_shape() {
        let mut dst = HostMatrix::<f32, RowMajor>::new(4, 1).unwrap();
        let lhs = HostMatrix::<f32, ColumnMajor>::new(1, 4).unwrap();
        let rhs = HostMatrix::<f32, ColumnMajor>::new(4, 4).unwrap();
        let err = product(&mut dst, &lhs, &rhs, false, true).unwrap_err();
        assert!(matches!(
            err,
            KernelError::ShapeMismatch {
                expected: (1, 4),
                actual: (4, 1),
                ..
            }
        ));
    }

    #[test]
    fn broadcast_accepts_row_or_column_vectors() {
        let mut m = HostMatrix::<i32>::new(3, 2).unwrap();
        let col = HostMatrix::<i32>::new(3, 1).unwrap();
        let row = HostMatrix::<i32>::new(1, 3).unwrap();
        let short = HostMatrix::<i32>::new(2, 1).unwrap();
        assert!(add_column_broadcast(&mut m, &col).is_ok());
        assert!(add_column_broadcast(&mut m, &row).is_ok());
        assert!(add_column_broadcast(&mut m, &short).is_err());
        assert!(add_row_broadcast(&mut m, &short).is_ok());
    }

    #[test]
    fn integer_transcendentals_are_rejected_before_dispatch() {
        let mut m = HostMatrix::<i32>::new(2, 2).unwrap();
        sequence(&mut m).unwrap();
        let err = apply_scalar(&mut m, ScalarFunctor::Sqrt).unwrap_err();
        assert!(matches!(err, KernelError::UnsupportedOperation { .. }));
        assert_eq!(m.data(), &[0, 1, 2, 3]);
    }

    #[test]
    fn rprop_rejects_invalid_config() {
        let mut w = HostMatrix::<f32>::new(2, 2).unwrap();
        let g = HostMatrix::<f32>::new(2, 2).unwrap();
        let mut s = HostMatrix::<i8>::new(2, 2).unwrap();
        let mut r = HostMatrix::<f32>::new(2, 2).unwrap();
        let cfg = RpropConfig::default().eta_plus(0.9);
        assert!(rprop_with(&mut w, &g, &mut s, &mut r, &cfg).is_err());
    }
}
