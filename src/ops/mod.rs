//! # Kernel Backends
//!
//! Every operation exists once per memory space and is reached through one
//! backend-agnostic entry point.
//!
//! ## Submodules
//!
//! - [`dispatch`] — validated entry points and the sealed [`Backend`](dispatch::Backend) bound
//! - [`cpu`] — rayon-parallel host kernels (always available)
//! - [`wgpu`] *(opt-in)* — compute-shader kernels for accelerator buffers
//!
//! ## Backend Selection
//!
//! The backend is the memory space of the operands, fixed at compile time:
//!
//! ```rust
//! use briny_linalg::{product, sequence, HostMatrix};
//!
//! let mut a = HostMatrix::<f32>::new(1, 8).unwrap();
//! let mut b = HostMatrix::<f32>::new(8, 8).unwrap();
//! let mut c = HostMatrix::<f32>::new(1, 8).unwrap();
//! sequence(&mut a).unwrap();
//! sequence(&mut b).unwrap();
//! product(&mut c, &a, &b, false, true).unwrap(); // runs on the host
//! ```
//!
//! ## Adding an Operation
//!
//! 1. Add a method to the private `Kernels` trait in `backend`.
//! 2. Implement it in `cpu` and in `wgpu` (with a shader under `shaders/`).
//! 3. Add the validated entry point to `dispatch`.
//!
//! ## Feature Flags
//!
//! - `wgpu` — enables the accelerator backend

mod backend;
pub mod cpu;
pub mod dispatch;
#[cfg(feature = "wgpu")]
pub mod wgpu;
