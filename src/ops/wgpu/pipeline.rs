//! Kernel catalogue, WGSL assembly and the per-context pipeline cache.

use super::GpuError;
use crate::error::KernelError;
use crate::scalar::DeviceElem;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

const PRELUDE_FLOAT: &str = include_str!("../shaders/prelude_float.wgsl");
const PRELUDE_INT: &str = include_str!("../shaders/prelude_int.wgsl");
const NARROW_I32: &str = include_str!("../shaders/narrow_i32.wgsl");
const NARROW_I8: &str = include_str!("../shaders/narrow_i8.wgsl");
const COMMON: &str = include_str!("../shaders/common.wgsl");

/// Invocations per workgroup; matches `WG` in `common.wgsl`.
pub(crate) const WORKGROUP: usize = 256;
const MAX_GROUPS_PER_DIM: usize = 65_535;

/// Every compute kernel the accelerator backend runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Kernel {
    Fill,
    Scalar,
    Binary,
    Product,
    Broadcast,
    Reduce,
    Norm,
    Rprop,
    WeightDecay,
}

impl Kernel {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::Scalar => "scalar",
            Self::Binary => "binary",
            Self::Product => "product",
            Self::Broadcast => "broadcast",
            Self::Reduce => "reduce",
            Self::Norm => "norm",
            Self::Rprop => "rprop",
            Self::WeightDecay => "weight_decay",
        }
    }

    const fn source(self) -> &'static str {
        match self {
            Self::Fill => include_str!("../shaders/fill.wgsl"),
            Self::Scalar => include_str!("../shaders/scalar.wgsl"),
            Self::Binary => include_str!("../shaders/binary.wgsl"),
            Self::Product => include_str!("../shaders/product.wgsl"),
            Self::Broadcast => include_str!("../shaders/broadcast.wgsl"),
            Self::Reduce => include_str!("../shaders/reduce.wgsl"),
            Self::Norm => include_str!("../shaders/norm.wgsl"),
            Self::Rprop => include_str!("../shaders/rprop.wgsl"),
            Self::WeightDecay => include_str!("../shaders/weight_decay.wgsl"),
        }
    }

    /// `read_only` flag of each storage binding, starting at binding 1.
    const fn storage(self) -> &'static [bool] {
        match self {
            Self::Fill | Self::Scalar => &[false],
            Self::Binary | Self::Broadcast | Self::Reduce | Self::Norm | Self::WeightDecay => &[false, true],
            Self::Product => &[true, true, false],
            Self::Rprop => &[false, true, false, false],
        }
    }
}

/// Full WGSL source of `kernel` specialised for `elem`.
fn assemble(kernel: Kernel, elem: DeviceElem) -> String {
    let prelude = match elem {
        DeviceElem::F32 => PRELUDE_FLOAT.to_owned(),
        DeviceElem::I32 => format!("{NARROW_I32}\n{PRELUDE_INT}"),
        DeviceElem::I8 => format!("{NARROW_I8}\n{PRELUDE_INT}"),
    };
    format!("{prelude}\n{COMMON}\n{}", kernel.source())
}

/// A compiled kernel and the bind group layout it expects.
pub(crate) struct Pipeline {
    pub(crate) layout: wgpu::BindGroupLayout,
    pub(crate) pipeline: wgpu::ComputePipeline,
}

/// Pipelines compiled so far, keyed by kernel and element kind.
#[derive(Default)]
pub(crate) struct PipelineCache {
    entries: Mutex<HashMap<(Kernel, DeviceElem), Arc<Pipeline>>>,
}

impl PipelineCache {
    pub(crate) fn get_or_compile(
        &self,
        device: &wgpu::Device,
        kernel: Kernel,
        elem: DeviceElem,
    ) -> Result<Arc<Pipeline>, KernelError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pipeline) = entries.get(&(kernel, elem)) {
            return Ok(Arc::clone(pipeline));
        }
        let pipeline = Arc::new(compile(device, kernel, elem)?);
        entries.insert((kernel, elem), Arc::clone(&pipeline));
        Ok(pipeline)
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn compile(device: &wgpu::Device, kernel: Kernel, elem: DeviceElem) -> Result<Pipeline, KernelError> {
    let label = Some(kernel.name());
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label,
        source: wgpu::ShaderSource::Wgsl(assemble(kernel, elem).into()),
    });

    let mut entries = vec![uniform_entry(0)];
    entries.extend(
        kernel
            .storage()
            .iter()
            .zip(1u32..)
            .map(|(&read_only, binding)| storage_entry(binding, read_only)),
    );
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label,
        entries: &entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label,
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label,
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(GpuError::Pipeline {
            kernel: kernel.name(),
            reason: err.to_string(),
        }
        .into());
    }
    debug!(kernel = kernel.name(), ?elem, "compiled compute pipeline");
    Ok(Pipeline { layout, pipeline })
}

/// Workgroup grid with at least `threads` invocations, folded into two
/// dimensions once the first one is full.
pub(crate) fn grid(op: &'static str, threads: usize) -> Result<(u32, u32), KernelError> {
    let groups = threads.div_ceil(WORKGROUP);
    let x = groups.clamp(1, MAX_GROUPS_PER_DIM);
    let y = groups.div_ceil(x).max(1);
    match (u32::try_from(x), u32::try_from(y)) {
        (Ok(x), Ok(y)) if y as usize <= MAX_GROUPS_PER_DIM => Ok((x, y)),
        _ => Err(KernelError::unsupported(op, "too many elements for a single dispatch")),
    }
}

/// A dimension or length as a shader word.
pub(crate) fn word(op: &'static str, n: usize) -> Result<u32, KernelError> {
    u32::try_from(n).map_err(|_| KernelError::unsupported(op, "dimension exceeds the device index range"))
}
