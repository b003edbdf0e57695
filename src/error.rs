//! Error taxonomy shared by every kernel.
//!
//! All conditions are detected before a kernel touches its operands, so an
//! `Err` always means nothing was mutated.

use thiserror::Error;

/// A `(height, width)` pair.
pub type Shape = (usize, usize);

/// Failure of a kernel call or buffer construction.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Operand shapes (or vector lengths) are incompatible.
    #[error("{op}: shape mismatch, expected {expected:?} but got {actual:?}")]
    ShapeMismatch {
        /// The operation that rejected its operands.
        op: &'static str,
        /// The shape the operation required.
        expected: Shape,
        /// The shape it was given.
        actual: Shape,
    },

    /// The functor or operation is invalid for the element type or memory space.
    #[error("{op}: unsupported operation ({reason})")]
    UnsupportedOperation {
        /// The rejected operation.
        op: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Backing storage could not be obtained.
    #[error("allocation of {requested} elements failed: {reason}")]
    AllocationFailure {
        /// Number of elements requested.
        requested: usize,
        /// Why it failed.
        reason: String,
    },

    /// The accelerator could not be acquired or rejected submitted work.
    #[cfg(feature = "wgpu")]
    #[error(transparent)]
    Gpu(#[from] crate::ops::wgpu::GpuError),
}

impl KernelError {
    pub(crate) fn unsupported(op: &'static str, reason: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            op,
            reason: reason.into(),
        }
    }

    pub(crate) fn allocation(requested: usize, reason: impl Into<String>) -> Self {
        Self::AllocationFailure {
            requested,
            reason: reason.into(),
        }
    }
}

/// Fails with [`KernelError::ShapeMismatch`] unless both shapes are equal.
pub(crate) fn ensure_shape(op: &'static str, expected: Shape, actual: Shape) -> Result<(), KernelError> {
    if expected == actual {
        Ok(())
    } else {
        Err(KernelError::ShapeMismatch {
            op,
            expected,
            actual,
        })
    }
}
