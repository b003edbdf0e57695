//! Copies between memory spaces and layouts.
//!
//! Conversion is a verification tool: it moves data so results from two
//! backends can be compared, and is not itself a kernel. Logical element
//! `(i, j)` keeps its exact value.

use crate::error::{KernelError, ensure_shape};
use crate::layout::{MemoryLayout, relayout};
use crate::matrix::DenseMatrix;
use crate::scalar::Scalar;
use crate::space::MemorySpace;
use tracing::trace;

/// Copies `src` into `dst`, whatever their memory spaces and layouts.
///
/// # Errors
///
/// [`KernelError::ShapeMismatch`] unless both shapes are equal; any error of
/// reading `src` back or writing `dst`.
///
/// # Example
/// ```rust
/// use briny_linalg::{convert, matrix, HostMatrix, RowMajor};
///
/// let cm: HostMatrix<i32> = matrix!([1, 2], [3, 4]).unwrap();
/// let mut rm = HostMatrix::<i32, RowMajor>::new(2, 2).unwrap();
/// convert(&mut rm, &cm).unwrap();
/// assert_eq!(rm.data(), &[1, 2, 3, 4]);
/// assert_eq!(cm.data(), &[1, 3, 2, 4]);
/// ```
pub fn convert<T, SD, SS, LD, LS>(
    dst: &mut DenseMatrix<T, SD, LD>,
    src: &DenseMatrix<T, SS, LS>,
) -> Result<(), KernelError>
where
    T: Scalar,
    SD: MemorySpace,
    SS: MemorySpace,
    LD: MemoryLayout,
    LS: MemoryLayout,
{
    ensure_shape("convert", dst.shape(), src.shape())?;
    trace!(op = "convert", from = ?SS::SPACE, to = ?SD::SPACE, shape = ?src.shape());
    let (h, w) = src.shape();
    let data = src.to_vec()?;
    let data = if LS::ORDER == LD::ORDER {
        data
    } else {
        relayout(&data, h, w, LS::ORDER, LD::ORDER)
    };
    SD::upload(dst.storage_mut(), &data)
}
