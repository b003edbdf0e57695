//! The sealed kernel trait behind [`Backend`](super::dispatch::Backend).
//!
//! This module is private to `ops`: outside the crate neither [`Kernels`] nor
//! [`Checked`] can be named, so unvalidated kernels are unreachable.

use crate::config::RpropConfig;
use crate::error::KernelError;
use crate::functor::{BinaryFunctor, NullaryFunctor, ScalarFunctor};
use crate::layout::MemoryLayout;
use crate::matrix::DenseMatrix;
use crate::scalar::{Float, Scalar};
use crate::space::MemorySpace;

/// Proof that an entry point in [`dispatch`](super::dispatch) validated the operands.
#[derive(Debug, Clone, Copy)]
pub struct Checked(pub(super) ());

/// Which logical index of the matrix a vector operand follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorAxis {
    /// The vector has one entry per matrix row.
    PerRow,
    /// The vector has one entry per matrix column.
    PerColumn,
}

impl VectorAxis {
    #[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
    #[must_use]
    pub(crate) const fn flag(self) -> u32 {
        match self {
            Self::PerRow => 0,
            Self::PerColumn => 1,
        }
    }
}

/// Which norm to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormKind {
    /// `Σ |x|`.
    L1,
    /// `sqrt(Σ x²)`.
    L2,
}

/// Resolved dimensions and scaling of a product `dst = α·op(lhs)·op(rhs) + β·dst`.
#[derive(Debug, Clone, Copy)]
pub struct ProductSpec<T> {
    /// Rows of `op(lhs)` and `dst`.
    pub rows: usize,
    /// Columns of `op(rhs)` and `dst`.
    pub cols: usize,
    /// Shared inner dimension.
    pub inner: usize,
    /// Read `lhs` transposed.
    pub transpose_lhs: bool,
    /// Read `rhs` transposed.
    pub transpose_rhs: bool,
    /// Scale of the product.
    pub alpha: T,
    /// Scale of the prior `dst`; zero means prior contents are ignored.
    pub beta: T,
}

/// The kernels a memory space provides.
///
/// Every method takes a [`Checked`] proof that only the dispatch layer can
/// create, after it validated every shape, functor and config and found all
/// operands colocated. Implementations rely on that and do not re-check.
pub trait Kernels: MemorySpace {
    /// Initialises every element.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn fill<T: Scalar, L: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, L>,
        f: NullaryFunctor<T>,
    ) -> Result<(), KernelError>;

    /// `x ← f(x)` for every element.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn apply_scalar<T: Scalar, L: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, L>,
        f: ScalarFunctor<T>,
    ) -> Result<(), KernelError>;

    /// `dst ← f(dst, src)` for every element position.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn apply_binary<T: Scalar, L: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, L>,
        src: &DenseMatrix<T, Self, L>,
        f: BinaryFunctor<T>,
    ) -> Result<(), KernelError>;

    /// `dst = α·op(lhs)·op(rhs) + β·dst`.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn product<T: Scalar, LD: MemoryLayout, LA: MemoryLayout, LB: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, LD>,
        lhs: &DenseMatrix<T, Self, LA>,
        rhs: &DenseMatrix<T, Self, LB>,
        spec: ProductSpec<T>,
    ) -> Result<(), KernelError>;

    /// Adds `vector` along `axis` to every row or column of `matrix`.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn broadcast_add<T: Scalar, L: MemoryLayout, LV: MemoryLayout>(
        _: Checked,
        matrix: &mut DenseMatrix<T, Self, L>,
        vector: &DenseMatrix<T, Self, LV>,
        axis: VectorAxis,
    ) -> Result<(), KernelError>;

    /// Sums `matrix` into `out` along `axis`.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn reduce_sum<T: Scalar, L: MemoryLayout, LV: MemoryLayout>(
        _: Checked,
        out: &mut DenseMatrix<T, Self, LV>,
        matrix: &DenseMatrix<T, Self, L>,
        axis: VectorAxis,
    ) -> Result<(), KernelError>;

    /// Evaluates a norm over all elements, accumulated in `f64`.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn norm<T: Scalar, L: MemoryLayout>(
        _: Checked,
        v: &DenseMatrix<T, Self, L>,
        kind: NormKind,
    ) -> Result<f64, KernelError>;

    /// One resilient-propagation step.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn rprop<T: Float, L: MemoryLayout>(
        _: Checked,
        weight: &mut DenseMatrix<T, Self, L>,
        gradient: &DenseMatrix<T, Self, L>,
        prev_sign: &mut DenseMatrix<i8, Self, L>,
        step_size: &mut DenseMatrix<T, Self, L>,
        config: &RpropConfig,
    ) -> Result<(), KernelError>;

    /// `w ← (w - lr·g) · (1 - decay)`.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn weight_decay<T: Float, L: MemoryLayout>(
        _: Checked,
        weight: &mut DenseMatrix<T, Self, L>,
        gradient: &DenseMatrix<T, Self, L>,
        learning_rate: T,
        decay_rate: T,
    ) -> Result<(), KernelError>;
}
