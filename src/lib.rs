//! briny_linalg: dense linear-algebra kernels with one contract on two backends.
//!
//! Every kernel exists for host memory (rayon-parallel CPU code) and, with the
//! `wgpu` feature, for accelerator memory (WGSL compute shaders). Both
//! implementations follow the same element-wise definitions, so an algorithm
//! can be developed on one backend and checked against the other.
//!
//! # Features
//!
//! - Element-wise scalar and binary functors with 0–2 parameters.
//! - Matrix products with independent transpose flags and operand layouts.
//! - Layout-aware row/column broadcast and summation.
//! - L1/L2 norms.
//! - Resilient propagation and weight decay training steps.
//! - Exact cross-space, cross-layout conversion for verification.
//!
//! # Modules
//!
//! - [`matrix`] — the [`DenseMatrix`] buffer and its constructors.
//! - [`functor`] — scalar, binary and nullary functor descriptors.
//! - [`ops`] — validated entry points and the backends behind them.
//! - [`convert`] — copies between memory spaces and layouts.
//! - [`approx`] — relative closeness checks for comparing backends.
//!
//! # Example
//!
//! ```rust
//! use briny_linalg::{apply_binary, norm1, sequence, BinaryFunctor, HostMatrix};
//!
//! let mut v = HostMatrix::<f32>::vector(4).unwrap();
//! let mut w = HostMatrix::<f32>::vector(4).unwrap();
//! sequence(&mut v).unwrap();
//! sequence(&mut w).unwrap();
//! apply_binary(&mut v, &w, BinaryFunctor::Axpby(2.0, 1.0)).unwrap();
//! assert_eq!(norm1(&v).unwrap(), 3.0 * (0.0 + 1.0 + 2.0 + 3.0));
//! ```

pub mod approx;
pub mod config;
pub mod convert;
pub mod error;
pub mod functor;
pub mod layout;
pub mod matrix;
pub mod ops;
pub mod scalar;
pub mod space;

pub use config::RpropConfig;
pub use convert::convert;
pub use error::{KernelError, Shape};
pub use functor::{BinaryFunctor, EXP_TOLERANCE, NullaryFunctor, ScalarFunctor};
pub use layout::{ColumnMajor, MemoryLayout, Order, RowMajor};
pub use matrix::{DenseMatrix, HostMatrix};
pub use ops::dispatch::{
    Backend, add_column_broadcast, add_row_broadcast, apply_binary, apply_scalar, copy, fill, norm1, norm2,
    product, product_scaled, reduce_columns_to_row, reduce_rows_to_column, rprop, rprop_with, sequence,
    weight_decay,
};
pub use scalar::{Float, Scalar, ScalarKind};
pub use space::{Host, MemorySpace, Space};

#[cfg(feature = "wgpu")]
pub use config::ContextOptions;
#[cfg(feature = "wgpu")]
pub use ops::wgpu::{Device, DeviceBuffer, DeviceMatrix, GpuContext, GpuError};
