//! Memory spaces a buffer can live in.
//!
//! # Supported Spaces
//!
//! - [`Host`] — ordinary process memory; kernels run on the CPU.
//! - `Device` — GPU storage buffers driven through `wgpu` (feature `wgpu`).
//!
//! The space is a type parameter of [`DenseMatrix`](crate::DenseMatrix), so
//! mixing host and device operands in one call does not compile. Device
//! buffers additionally carry the context that created them; operands from two
//! different contexts are rejected at run time.

use crate::error::KernelError;
use crate::scalar::Scalar;

/// Runtime tag of a memory space, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Space {
    /// Local/host memory (default).
    #[default]
    Host,
    /// Accelerator memory.
    Device,
}

/// A place where buffer storage lives.
pub trait MemorySpace: Sized + Send + Sync + 'static {
    /// The runtime tag of this space.
    const SPACE: Space;

    /// Backing storage for `len` elements of `T`.
    type Storage<T: Scalar>: Send + Sync;

    /// Copies the storage out in physical order.
    ///
    /// # Errors
    ///
    /// Fails if the device cannot be read back.
    fn download<T: Scalar>(storage: &Self::Storage<T>) -> Result<Vec<T>, KernelError>;

    /// Overwrites the storage with `data` (physical order, same length).
    ///
    /// # Errors
    ///
    /// Fails if `data` has the wrong length or the device rejects the write.
    fn upload<T: Scalar>(storage: &mut Self::Storage<T>, data: &[T]) -> Result<(), KernelError>;

    /// Whether two storages may be operands of the same kernel call.
    fn colocated<A: Scalar, B: Scalar>(_a: &Self::Storage<A>, _b: &Self::Storage<B>) -> bool {
        true
    }
}

/// Host memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Host;

impl MemorySpace for Host {
    const SPACE: Space = Space::Host;

    type Storage<T: Scalar> = Vec<T>;

    fn download<T: Scalar>(storage: &Vec<T>) -> Result<Vec<T>, KernelError> {
        Ok(storage.clone())
    }

    fn upload<T: Scalar>(storage: &mut Vec<T>, data: &[T]) -> Result<(), KernelError> {
        if storage.len() != data.len() {
            return Err(KernelError::ShapeMismatch {
                op: "upload",
                expected: (storage.len(), 1),
                actual: (data.len(), 1),
            });
        }
        storage.copy_from_slice(data);
        Ok(())
    }
}

/// Allocates a zeroed host vector, reporting exhaustion instead of aborting.
pub(crate) fn host_alloc<T: Scalar>(len: usize) -> Result<Vec<T>, KernelError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|e| KernelError::allocation(len, e.to_string()))?;
    data.resize(len, T::ZERO);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_report_their_tag() {
        assert_eq!(Space::default(), Space::Host);
        assert_eq!(Host::SPACE, Space::Host);
    }

    #[test]
    fn host_alloc_zeroes() {
        let v: Vec<f32> = host_alloc(5).unwrap();
        assert_eq!(v, vec![0.0; 5]);
    }

    #[test]
    fn host_alloc_reports_exhaustion() {
        let err = host_alloc::<f64>(usize::MAX / 2).unwrap_err();
        assert!(matches!(err, KernelError::AllocationFailure { .. }));
    }

    #[test]
    fn host_upload_checks_length() {
        let mut v = vec![0i32; 3];
        assert!(Host::upload(&mut v, &[1, 2]).is_err());
        Host::upload(&mut v, &[1, 2, 3]).unwrap();
        assert_eq!(v, vec![1, 2, 3]);
    }
}
