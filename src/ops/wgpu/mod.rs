//! GPU-accelerated kernels using WGPU.
//!
//! This module implements the accelerator memory space on top of `wgpu`
//! storage buffers and WGSL compute shaders. It handles context acquisition,
//! lazy pipeline compilation (cached per kernel and element type inside the
//! context), device buffer allocation, and synchronous dispatch.
//!
//! - [`GpuContext`] — adapter, device and queue plus the pipeline cache
//! - [`Device`] — the memory space; its storage is a [`DeviceBuffer`]
//! - [`DeviceMatrix`] — a [`DenseMatrix`] resident on a device
//!
//! Every element occupies one 32-bit word on the device. Kernels submit their
//! work and block until the device is idle, so a returned `Ok` means the
//! result is visible to the next call.
//!
//! # Example
//! ```rust,no_run
//! use briny_linalg::{apply_scalar, DeviceMatrix, GpuContext, HostMatrix, ScalarFunctor};
//!
//! let ctx = GpuContext::new()?;
//! let host = HostMatrix::<f32>::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0])?;
//! let mut dev = DeviceMatrix::from_host(&ctx, &host)?;
//! apply_scalar(&mut dev, ScalarFunctor::Mult(2.0))?;
//! assert_eq!(dev.to_vec()?, vec![2.0, 4.0, 6.0, 8.0]);
//! # Ok::<(), briny_linalg::KernelError>(())
//! ```

mod kernels;
mod pipeline;

use crate::config::ContextOptions;
use crate::error::KernelError;
use crate::layout::{ColumnMajor, MemoryLayout};
use crate::matrix::{DenseMatrix, HostMatrix, element_count};
use crate::scalar::{DeviceElem, Scalar};
use crate::space::{MemorySpace, Space};
use core::fmt;
use core::marker::PhantomData;
use pipeline::{Kernel, PipelineCache};
use std::sync::{Arc, mpsc};
use thiserror::Error;
use tracing::{info, trace};
use wgpu::util::DeviceExt;

/// Bytes per device element.
const WORD: u64 = 4;

/// Failures reported by the `wgpu` runtime.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No adapter matched the requested options.
    #[error("adapter error: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    /// The adapter refused to open a device.
    #[error("device error: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    /// Waiting for submitted work failed.
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),
    /// A readback buffer could not be mapped.
    #[error("buffer map failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    /// The readback callback was dropped without reporting.
    #[error("readback was abandoned by the device")]
    ReadbackLost,
    /// A kernel failed shader or pipeline validation.
    #[error("pipeline `{kernel}` rejected: {reason}")]
    Pipeline {
        /// The kernel being compiled.
        kernel: &'static str,
        /// The validation message.
        reason: String,
    },
}

/// Holds the WGPU device and queue used for executing compute pipelines.
///
/// Shared through an [`Arc`]: every [`DeviceBuffer`] keeps its context alive,
/// and operands are only colocated when they share the same context.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: wgpu::AdapterInfo,
    pipelines: PipelineCache,
}

impl GpuContext {
    /// Acquires the default adapter and opens a device on it.
    ///
    /// # Errors
    ///
    /// [`KernelError::Gpu`] if no adapter is available or the device cannot be opened.
    pub fn new() -> Result<Arc<Self>, KernelError> {
        Self::with_options(&ContextOptions::default())
    }

    /// Acquires an adapter matching `options` and opens a device on it.
    ///
    /// # Internals
    /// - Uses `pollster::block_on` to synchronously wait for async WGPU calls
    /// - Requests the adapter's own limits, so large buffers are allowed where supported
    ///
    /// # Errors
    ///
    /// [`KernelError::Gpu`] if no adapter is available or the device cannot be opened.
    pub fn with_options(options: &ContextOptions) -> Result<Arc<Self>, KernelError> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power_preference,
            force_fallback_adapter: options.force_fallback_adapter,
            compatible_surface: None,
        }))
        .map_err(GpuError::Adapter)?;
        let info = adapter.get_info();

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: options.label.as_deref(),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(GpuError::Device)?;

        info!(adapter = %info.name, backend = ?info.backend, "acquired accelerator context");
        Ok(Arc::new(Self {
            device,
            queue,
            info,
            pipelines: PipelineCache::default(),
        }))
    }

    /// The adapter this context runs on.
    #[must_use]
    pub const fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.info
    }

    /// Allocates a zeroed storage buffer for `len` words.
    fn alloc(&self, len: usize, label: &'static str) -> Result<wgpu::Buffer, KernelError> {
        let size = u64::try_from(len.max(1))
            .ok()
            .and_then(|n| n.checked_mul(WORD))
            .ok_or_else(|| KernelError::allocation(len, "byte size overflows u64"))?;
        let limits = self.device.limits();
        let limit = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        if size > limit {
            return Err(KernelError::allocation(
                len,
                format!("{size} bytes exceeds the device limit of {limit}"),
            ));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(KernelError::allocation(len, err.to_string()));
        }
        Ok(buffer)
    }

    /// Copies the first `len` words of `buffer` back to the host.
    fn read_words(&self, buffer: &wgpu::Buffer, len: usize) -> Result<Vec<u32>, KernelError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let size = len as u64 * WORD;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::Wait).map_err(GpuError::from)?;
        rx.recv().map_err(|_| GpuError::ReadbackLost)?.map_err(GpuError::from)?;

        let words = {
            let view = slice.get_mapped_range();
            bytemuck::pod_collect_to_vec::<u8, u32>(&view)
        };
        staging.unmap();
        Ok(words)
    }

    /// Runs `kernel` over a `groups.0 × groups.1` grid and waits for it to finish.
    ///
    /// Binding 0 receives `params` as a uniform block; bindings `1..` receive
    /// `buffers` in order.
    fn launch(
        &self,
        kernel: Kernel,
        elem: DeviceElem,
        params: &[u32],
        buffers: &[&wgpu::Buffer],
        groups: (u32, u32),
    ) -> Result<(), KernelError> {
        let pipeline = self.pipelines.get_or_compile(&self.device, kernel, elem)?;

        let mut words = params.to_vec();
        words.resize(params.len().next_multiple_of(4), 0);
        let uniform = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("params"),
            contents: bytemuck::cast_slice(&words),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        }];
        entries.extend(buffers.iter().zip(1u32..).map(|(buffer, binding)| wgpu::BindGroupEntry {
            binding,
            resource: buffer.as_entire_binding(),
        }));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.name()),
            layout: &pipeline.layout,
            entries: &entries,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(kernel.name()),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.name()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups.0, groups.1, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.device.poll(wgpu::PollType::Wait).map_err(GpuError::from)?;
        trace!(kernel = kernel.name(), ?elem, ?groups, "dispatched");
        Ok(())
    }
}

impl fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuContext")
            .field("adapter", &self.info.name)
            .field("backend", &self.info.backend)
            .finish_non_exhaustive()
    }
}

/// Device storage for `len` elements of `T`, one word each.
pub struct DeviceBuffer<T> {
    ctx: Arc<GpuContext>,
    buffer: wgpu::Buffer,
    len: usize,
    elem: PhantomData<T>,
}

impl<T> DeviceBuffer<T> {
    /// The context that owns this buffer.
    #[must_use]
    pub const fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    const fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

/// Accelerator memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Device;

impl MemorySpace for Device {
    const SPACE: Space = Space::Device;

    type Storage<T: Scalar> = DeviceBuffer<T>;

    fn download<T: Scalar>(storage: &DeviceBuffer<T>) -> Result<Vec<T>, KernelError> {
        let words = storage.ctx.read_words(&storage.buffer, storage.len)?;
        Ok(words.into_iter().map(T::from_word).collect())
    }

    fn upload<T: Scalar>(storage: &mut DeviceBuffer<T>, data: &[T]) -> Result<(), KernelError> {
        if storage.len != data.len() {
            return Err(KernelError::ShapeMismatch {
                op: "upload",
                expected: (storage.len, 1),
                actual: (data.len(), 1),
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        let words: Vec<u32> = data.iter().map(|x| x.to_word()).collect();
        storage.ctx.queue.write_buffer(&storage.buffer, 0, bytemuck::cast_slice(&words));
        Ok(())
    }

    fn colocated<A: Scalar, B: Scalar>(a: &DeviceBuffer<A>, b: &DeviceBuffer<B>) -> bool {
        Arc::ptr_eq(&a.ctx, &b.ctx)
    }
}

/// A device-resident matrix.
pub type DeviceMatrix<T, L = ColumnMajor> = DenseMatrix<T, Device, L>;

/// The device word kind of `T`, or an error for host-only types.
pub(crate) fn device_elem<T: Scalar>(op: &'static str) -> Result<DeviceElem, KernelError> {
    T::DEVICE.ok_or_else(|| KernelError::unsupported(op, format!("{} has no device representation", T::NAME)))
}

impl<T: Scalar, L: MemoryLayout> DenseMatrix<T, Device, L> {
    /// Allocates a zeroed `height × width` matrix on `ctx`.
    ///
    /// # Errors
    ///
    /// [`KernelError::UnsupportedOperation`] for element types without a device
    /// representation (`f64`); [`KernelError::AllocationFailure`] if the buffer
    /// exceeds the device limits or memory.
    pub fn new(ctx: &Arc<GpuContext>, height: usize, width: usize) -> Result<Self, KernelError> {
        device_elem::<T>("new")?;
        let len = element_count(height, width)?;
        let buffer = ctx.alloc(len, T::NAME)?;
        Ok(Self::from_parts(
            height,
            width,
            DeviceBuffer {
                ctx: Arc::clone(ctx),
                buffer,
                len,
                elem: PhantomData,
            },
        ))
    }

    /// Allocates a zeroed column vector of length `n` on `ctx`.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new).
    pub fn vector(ctx: &Arc<GpuContext>, n: usize) -> Result<Self, KernelError> {
        Self::new(ctx, n, 1)
    }

    /// Uploads a host matrix of the same layout.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new).
    pub fn from_host(ctx: &Arc<GpuContext>, host: &HostMatrix<T, L>) -> Result<Self, KernelError> {
        let mut dev = Self::new(ctx, host.height(), host.width())?;
        Device::upload(dev.storage_mut(), host.data())?;
        Ok(dev)
    }

    /// The context this matrix lives on.
    #[must_use]
    pub const fn context(&self) -> &Arc<GpuContext> {
        self.storage().context()
    }
}
