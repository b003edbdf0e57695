//! Mapping from logical `(row, col)` indices to physical storage offsets.

use core::fmt::Debug;

/// Runtime tag of a storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Order {
    /// Rows are contiguous.
    RowMajor = 0,
    /// Columns are contiguous.
    ColumnMajor = 1,
}

impl Order {
    /// Physical offset of logical element `(row, col)` in a `height × width` buffer.
    #[inline]
    #[must_use]
    pub const fn offset(self, height: usize, width: usize, row: usize, col: usize) -> usize {
        match self {
            Self::RowMajor => row * width + col,
            Self::ColumnMajor => col * height + row,
        }
    }

    /// Logical `(row, col)` of physical offset `idx`.
    #[inline]
    #[must_use]
    pub const fn coords(self, height: usize, width: usize, idx: usize) -> (usize, usize) {
        match self {
            Self::RowMajor => (idx / width, idx % width),
            Self::ColumnMajor => (idx % height, idx / height),
        }
    }

    /// `1` for column-major, `0` for row-major; the encoding used by the WGSL kernels.
    #[inline]
    #[must_use]
    pub const fn flag(self) -> u32 {
        match self {
            Self::RowMajor => 0,
            Self::ColumnMajor => 1,
        }
    }
}

/// Compile-time storage order of a [`DenseMatrix`](crate::DenseMatrix).
pub trait MemoryLayout: Copy + Default + Debug + Send + Sync + 'static {
    /// The order this marker stands for.
    const ORDER: Order;
}

/// Row-major marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowMajor;

/// Column-major marker (the default, as in BLAS).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMajor;

impl MemoryLayout for RowMajor {
    const ORDER: Order = Order::RowMajor;
}

impl MemoryLayout for ColumnMajor {
    const ORDER: Order = Order::ColumnMajor;
}

/// Rewrites `data` (physical order `from`) into physical order `to`.
pub(crate) fn relayout<T: Copy>(data: &[T], height: usize, width: usize, from: Order, to: Order) -> Vec<T> {
    if from == to {
        return data.to_vec();
    }
    (0..data.len())
        .map(|idx| {
            let (row, col) = to.coords(height, width, idx);
            data[from.offset(height, width, row, col)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_and_coords_are_inverse() {
        let (h, w) = (3, 5);
        for order in [Order::RowMajor, Order::ColumnMajor] {
            for idx in 0..h * w {
                let (r, c) = order.coords(h, w, idx);
                assert_eq!(order.offset(h, w, r, c), idx);
            }
        }
    }

    #[test]
    fn vectors_share_physical_order() {
        for order in [Order::RowMajor, Order::ColumnMajor] {
            assert_eq!(order.offset(4, 1, 3, 0), 3);
            assert_eq!(order.offset(1, 4, 0, 3), 3);
        }
    }

    #[test]
    fn relayout_transposes_storage() {
        // 2x3, row-major: [[0, 1, 2], [3, 4, 5]]
        let row_major = [0, 1, 2, 3, 4, 5];
        let col_major = relayout(&row_major, 2, 3, Order::RowMajor, Order::ColumnMajor);
        assert_eq!(col_major, vec![0, 3, 1, 4, 2, 5]);
        let back = relayout(&col_major, 2, 3, Order::ColumnMajor, Order::RowMajor);
        assert_eq!(back, row_major.to_vec());
    }
}
