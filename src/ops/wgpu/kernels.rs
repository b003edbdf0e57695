//! [`Kernels`] for device buffers: parameter packing and dispatch.
//!
//! Each method packs its scalars into the uniform block of the matching
//! shader, binds the operand buffers in shader order and launches one
//! invocation per written element. Empty buffers never reach the device.

use super::pipeline::{Kernel, WORKGROUP, grid, word};
use super::{Device, device_elem};
use crate::config::RpropConfig;
use crate::error::KernelError;
use crate::functor::{BinaryFunctor, NullaryFunctor, ScalarFunctor};
use crate::layout::MemoryLayout;
use crate::matrix::DenseMatrix;
use crate::ops::backend::{Checked, Kernels, NormKind, ProductSpec, VectorAxis};
use crate::scalar::{Float, Scalar};

/// Upper bound on workgroups producing norm partials; the host adds them up.
const MAX_NORM_GROUPS: usize = 1024;

impl Kernels for Device {
    fn fill<T: Scalar, L: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, L>,
        f: NullaryFunctor<T>,
    ) -> Result<(), KernelError> {
        let elem = device_elem::<T>("fill")?;
        let len = dst.len();
        if len == 0 {
            return Ok(());
        }
        let buf = dst.storage();
        buf.context().launch(
            Kernel::Fill,
            elem,
            &[word("fill", len)?, f.opcode(), f.value().to_word()],
            &[buf.raw()],
            grid("fill", len)?,
        )
    }

    fn apply_scalar<T: Scalar, L: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, L>,
        f: ScalarFunctor<T>,
    ) -> Result<(), KernelError> {
        let elem = device_elem::<T>("apply_scalar")?;
        let len = dst.len();
        if len == 0 {
            return Ok(());
        }
        let (a, b) = f.params();
        let buf = dst.storage();
        buf.context().launch(
            Kernel::Scalar,
            elem,
            &[word("apply_scalar", len)?, f.opcode(), a.to_word(), b.to_word()],
            &[buf.raw()],
            grid("apply_scalar", len)?,
        )
    }

    fn apply_binary<T: Scalar, L: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, L>,
        src: &DenseMatrix<T, Self, L>,
        f: BinaryFunctor<T>,
    ) -> Result<(), KernelError> {
        let elem = device_elem::<T>("apply_binary")?;
        let len = dst.len();
        if len == 0 {
            return Ok(());
        }
        let (a, b) = f.params();
        let buf = dst.storage();
        buf.context().launch(
            Kernel::Binary,
            elem,
            &[word("apply_binary", len)?, f.opcode(), a.to_word(), b.to_word()],
            &[buf.raw(), src.storage().raw()],
            grid("apply_binary", len)?,
        )
    }

    fn product<T: Scalar, LD: MemoryLayout, LA: MemoryLayout, LB: MemoryLayout>(
        _: Checked,
        dst: &mut DenseMatrix<T, Self, LD>,
        lhs: &DenseMatrix<T, Self, LA>,
        rhs: &DenseMatrix<T, Self, LB>,
        spec: ProductSpec<T>,
    ) -> Result<(), KernelError> {
        let elem = device_elem::<T>("product")?;
        let threads = dst.len();
        if threads == 0 {
            return Ok(());
        }
        let flags = u32::from(spec.transpose_lhs)
            | u32::from(spec.transpose_rhs) << 1
            | LA::ORDER.flag() << 2
            | LB::ORDER.flag() << 3
            | LD::ORDER.flag() << 4
            | u32::from(spec.beta != T::ZERO) << 5;
        let (a_h, a_w) = lhs.shape();
        let (b_h, b_w) = rhs.shape();
        let params = [
            word("product", spec.rows)?,
            word("product", spec.cols)?,
            word("product", spec.inner)?,
            flags,
            word("product", a_h)?,
            word("product", a_w)?,
            word("product", b_h)?,
            word("product", b_w)?,
            spec.alpha.to_word(),
            spec.beta.to_word(),
        ];
        let buf = dst.storage();
        buf.context().launch(
            Kernel::Product,
            elem,
            &params,
            &[lhs.storage().raw(), rhs.storage().raw(), buf.raw()],
            grid("product", threads)?,
        )
    }

    fn broadcast_add<T: Scalar, L: MemoryLayout, LV: MemoryLayout>(
        _: Checked,
        matrix: &mut DenseMatrix<T, Self, L>,
        vector: &DenseMatrix<T, Self, LV>,
        axis: VectorAxis,
    ) -> Result<(), KernelError> {
        let op = match axis {
            VectorAxis::PerRow => "add_column_broadcast",
            VectorAxis::PerColumn => "add_row_broadcast",
        };
        let elem = device_elem::<T>(op)?;
        let len = matrix.len();
        if len == 0 {
            return Ok(());
        }
        let (h, w) = matrix.shape();
        let flags = L::ORDER.flag() | axis.flag() << 1;
        let buf = matrix.storage();
        buf.context().launch(
            Kernel::Broadcast,
            elem,
            &[word(op, h)?, word(op, w)?, flags, word(op, len)?],
            &[buf.raw(), vector.storage().raw()],
            grid(op, len)?,
        )
    }

    fn reduce_sum<T: Scalar, L: MemoryLayout, LV: MemoryLayout>(
        _: Checked,
        out: &mut DenseMatrix<T, Self, LV>,
        matrix: &DenseMatrix<T, Self, L>,
        axis: VectorAxis,
    ) -> Result<(), KernelError> {
        let op = match axis {
            VectorAxis::PerRow => "reduce_rows_to_column",
            VectorAxis::PerColumn => "reduce_columns_to_row",
        };
        let elem = device_elem::<T>(op)?;
        let len = out.len();
        if len == 0 {
            return Ok(());
        }
        let (h, w) = matrix.shape();
        let flags = L::ORDER.flag() | axis.flag() << 1;
        let buf = out.storage();
        buf.context().launch(
            Kernel::Reduce,
            elem,
            &[word(op, h)?, word(op, w)?, flags, word(op, len)?],
            &[buf.raw(), matrix.storage().raw()],
            grid(op, len)?,
        )
    }

    /// Each workgroup folds a strided slice into one `f32` partial; the
    /// partials are summed on the host in `f64`.
    fn norm<T: Scalar, L: MemoryLayout>(
        _: Checked,
        v: &DenseMatrix<T, Self, L>,
        kind: NormKind,
    ) -> Result<f64, KernelError> {
        let op = match kind {
            NormKind::L1 => "norm1",
            NormKind::L2 => "norm2",
        };
        let elem = device_elem::<T>(op)?;
        let len = v.len();
        if len == 0 {
            return Ok(0.0);
        }
        let groups = len.div_ceil(WORKGROUP).min(MAX_NORM_GROUPS);
        let ctx = v.context();
        let partials = ctx.alloc(groups, "norm_partials")?;
        let kind_word = match kind {
            NormKind::L1 => 0,
            NormKind::L2 => 1,
        };
        ctx.launch(
            Kernel::Norm,
            elem,
            &[word(op, len)?, kind_word, word(op, groups * WORKGROUP)?],
            &[&partials, v.storage().raw()],
            (word(op, groups)?, 1),
        )?;
        let total: f64 = ctx
            .read_words(&partials, groups)?
            .into_iter()
            .map(|w| f64::from(f32::from_bits(w)))
            .sum();
        Ok(match kind {
            NormKind::L1 => total,
            NormKind::L2 => total.sqrt(),
        })
    }

    fn rprop<T: Float, L: MemoryLayout>(
        _: Checked,
        weight: &mut DenseMatrix<T, Self, L>,
        gradient: &DenseMatrix<T, Self, L>,
        prev_sign: &mut DenseMatrix<i8, Self, L>,
        step_size: &mut DenseMatrix<T, Self, L>,
        config: &RpropConfig,
    ) -> Result<(), KernelError> {
        let elem = device_elem::<T>("rprop")?;
        let len = weight.len();
        if len == 0 {
            return Ok(());
        }
        let params = [
            word("rprop", len)?,
            config.eta_plus.to_bits(),
            config.eta_minus.to_bits(),
            config.step_min.to_bits(),
            config.step_max.to_bits(),
        ];
        let buf = weight.storage();
        buf.context().launch(
            Kernel::Rprop,
            elem,
            &params,
            &[
                buf.raw(),
                gradient.storage().raw(),
                prev_sign.storage().raw(),
                step_size.storage().raw(),
            ],
            grid("rprop", len)?,
        )
    }

    fn weight_decay<T: Float, L: MemoryLayout>(
        _: Checked,
        weight: &mut DenseMatrix<T, Self, L>,
        gradient: &DenseMatrix<T, Self, L>,
        learning_rate: T,
        decay_rate: T,
    ) -> Result<(), KernelError> {
        let elem = device_elem::<T>("weight_decay")?;
        let len = weight.len();
        if len == 0 {
            return Ok(());
        }
        let buf = weight.storage();
        buf.context().launch(
            Kernel::WeightDecay,
            elem,
            &[word("weight_decay", len)?, learning_rate.to_word(), decay_rate.to_word()],
            &[buf.raw(), gradient.storage().raw()],
            grid("weight_decay", len)?,
        )
    }
}
