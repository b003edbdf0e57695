//! Dense 2-D buffers.
//!
//! A [`DenseMatrix`] owns a contiguous region of `height × width` elements in
//! one memory space, stored in one layout. A `n × 1` or `1 × n` matrix is a
//! vector; there is no separate vector type.
//!
//! ## Design Highlights
//! - Element type, memory space and layout are type parameters, so the
//!   backend for every kernel is chosen statically.
//! - The shape is fixed at construction; no kernel resizes a buffer.
//! - Kernels borrow buffers for the duration of a call and never take ownership.
//!
//! ## Example
//!
//! ```rust
//! use briny_linalg::{HostMatrix, RowMajor};
//!
//! let m = HostMatrix::<f32, RowMajor>::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
//! assert_eq!(m.shape(), (2, 3));
//! assert_eq!(m[(1, 0)], 4.0);
//! ```

use crate::error::{KernelError, Shape};
use crate::layout::{ColumnMajor, MemoryLayout, Order, relayout};
use crate::scalar::Scalar;
use crate::space::{Host, MemorySpace, Space, host_alloc};
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};

/// A dense matrix (or vector) of `T` in memory space `S` with layout `L`.
pub struct DenseMatrix<T: Scalar, S: MemorySpace = Host, L: MemoryLayout = ColumnMajor> {
    height: usize,
    width: usize,
    storage: S::Storage<T>,
    layout: PhantomData<L>,
}

/// A host-resident matrix.
pub type HostMatrix<T, L = ColumnMajor> = DenseMatrix<T, Host, L>;

/// Element count of a `height × width` buffer, or an allocation failure on overflow.
pub(crate) fn element_count(height: usize, width: usize) -> Result<usize, KernelError> {
    height
        .checked_mul(width)
        .ok_or_else(|| KernelError::allocation(usize::MAX, format!("{height} x {width} overflows usize")))
}

impl<T: Scalar, S: MemorySpace, L: MemoryLayout> DenseMatrix<T, S, L> {
    pub(crate) const fn from_parts(height: usize, width: usize, storage: S::Storage<T>) -> Self {
        Self {
            height,
            width,
            storage,
            layout: PhantomData,
        }
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// `(height, width)`.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        (self.height, self.width)
    }

    /// Total number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.height * self.width
    }

    /// Whether the buffer holds no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this is a row or column vector.
    #[must_use]
    pub const fn is_vector(&self) -> bool {
        self.height == 1 || self.width == 1
    }

    /// The storage order.
    #[must_use]
    pub const fn order(&self) -> Order {
        L::ORDER
    }

    /// The memory space.
    #[must_use]
    pub const fn space(&self) -> Space {
        S::SPACE
    }

    pub(crate) const fn storage(&self) -> &S::Storage<T> {
        &self.storage
    }

    pub(crate) const fn storage_mut(&mut self) -> &mut S::Storage<T> {
        &mut self.storage
    }

    /// Copies the elements out in physical order.
    ///
    /// # Errors
    ///
    /// Fails if device memory cannot be read back.
    pub fn to_vec(&self) -> Result<Vec<T>, KernelError> {
        S::download(&self.storage)
    }

    /// Copies the buffer into host memory, keeping its layout.
    ///
    /// # Errors
    ///
    /// Fails if device memory cannot be read back.
    pub fn to_host(&self) -> Result<HostMatrix<T, L>, KernelError> {
        Ok(DenseMatrix::from_parts(self.height, self.width, self.to_vec()?))
    }

    /// Copies the elements out in row-major logical order.
    ///
    /// # Errors
    ///
    /// Fails if device memory cannot be read back.
    pub fn to_rows(&self) -> Result<Vec<T>, KernelError> {
        Ok(relayout(&self.to_vec()?, self.height, self.width, L::ORDER, Order::RowMajor))
    }
}

impl<T: Scalar, L: MemoryLayout> DenseMatrix<T, Host, L> {
    /// Allocates a zeroed `height × width` host matrix.
    ///
    /// # Errors
    ///
    /// [`KernelError::AllocationFailure`] if the storage cannot be obtained.
    pub fn new(height: usize, width: usize) -> Result<Self, KernelError> {
        let len = element_count(height, width)?;
        Ok(Self::from_parts(height, width, host_alloc(len)?))
    }

    /// Allocates a zeroed column vector of length `n`.
    ///
    /// # Errors
    ///
    /// [`KernelError::AllocationFailure`] if the storage cannot be obtained.
    pub fn vector(n: usize) -> Result<Self, KernelError> {
        Self::new(n, 1)
    }

    /// Wraps `data`, interpreted in this matrix's physical order.
    ///
    /// # Errors
    ///
    /// [`KernelError::ShapeMismatch`] if `data.len() != height * width`.
    pub fn from_vec(height: usize, width: usize, data: Vec<T>) -> Result<Self, KernelError> {
        let len = element_count(height, width)?;
        if data.len() != len {
            return Err(KernelError::ShapeMismatch {
                op: "from_vec",
                expected: (height, width),
                actual: (data.len(), 1),
            });
        }
        Ok(Self::from_parts(height, width, data))
    }

    /// Builds a matrix from logical rows.
    ///
    /// # Errors
    ///
    /// [`KernelError::ShapeMismatch`] if the rows are ragged.
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> Result<Self, KernelError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        let mut flat = Vec::with_capacity(height * width);
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(KernelError::ShapeMismatch {
                    op: "from_rows",
                    expected: (1, width),
                    actual: (1, row.len()),
                });
            }
            flat.extend_from_slice(row);
        }
        let data = relayout(&flat, height, width, Order::RowMajor, L::ORDER);
        Ok(Self::from_parts(height, width, data))
    }

    /// The elements in physical order.
    #[must_use]
    pub fn data(&self) -> &[T] {
        self.storage()
    }

    /// The elements in physical order, mutably.
    #[must_use]
    pub fn data_mut(&mut self) -> &mut [T] {
        self.storage_mut()
    }

    /// Element `(row, col)`, or `None` if out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        (row < self.height && col < self.width)
            .then(|| self.storage()[L::ORDER.offset(self.height, self.width, row, col)])
    }

    /// Overwrites element `(row, col)`; returns `false` if out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: T) -> bool {
        if row < self.height && col < self.width {
            let idx = L::ORDER.offset(self.height, self.width, row, col);
            self.storage_mut()[idx] = value;
            true
        } else {
            false
        }
    }
}

impl<T: Scalar, L: MemoryLayout> Clone for DenseMatrix<T, Host, L> {
    fn clone(&self) -> Self {
        Self::from_parts(self.height, self.width, self.storage().clone())
    }
}

impl<T: Scalar, L: MemoryLayout> Index<(usize, usize)> for DenseMatrix<T, Host, L> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(row < self.height && col < self.width, "index ({row}, {col}) out of bounds");
        &self.storage()[L::ORDER.offset(self.height, self.width, row, col)]
    }
}

impl<T: Scalar, L: MemoryLayout> IndexMut<(usize, usize)> for DenseMatrix<T, Host, L> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(row < self.height && col < self.width, "index ({row}, {col}) out of bounds");
        let idx = L::ORDER.offset(self.height, self.width, row, col);
        &mut self.storage_mut()[idx]
    }
}

impl<T: Scalar, S: MemorySpace, L: MemoryLayout> fmt::Debug for DenseMatrix<T, S, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseMatrix")
            .field("elem", &T::NAME)
            .field("shape", &self.shape())
            .field("space", &S::SPACE)
            .field("order", &L::ORDER)
            .finish()
    }
}

/// Builds a host matrix from nested row literals.
///
/// Expands to a `Result`, failing on ragged rows.
///
/// # Example
/// ```
/// use briny_linalg::{matrix, HostMatrix};
/// let m: HostMatrix<f32> = matrix!([1.0, 2.0], [3.0, 4.0]).unwrap();
/// assert_eq!(m.shape(), (2, 2));
/// assert_eq!(m[(0, 1)], 2.0);
/// ```
#[macro_export]
macro_rules! matrix {
    ($( [ $( $x:expr ),* $(,)? ] ),+ $(,)?) => {
        $crate::DenseMatrix::from_rows(&[ $( ::std::vec![ $( $x ),* ] ),+ ])
    };
}
