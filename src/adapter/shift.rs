//! Shift-application policy: where and how a latent direction is applied

use candle_core::Tensor;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::GeneratorAdapter;
use crate::error::{Error, Result};
use crate::latent::LatentShape;

/// Space in which shifts are added to a base code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPolicy {
    /// `synthesize(z + shift)`
    #[default]
    RawSpace,
    /// `synthesize(to_intermediate(z) + shift, is_intermediate = true)`
    IntermediateSpace,
}

impl ShiftPolicy {
    /// Policy selected by the `shift_in_intermediate_space` option
    pub fn from_flag(shift_in_intermediate_space: bool) -> Self {
        if shift_in_intermediate_space {
            ShiftPolicy::IntermediateSpace
        } else {
            ShiftPolicy::RawSpace
        }
    }

    /// Whether shifts live in the intermediate space
    pub fn is_intermediate(self) -> bool {
        self == ShiftPolicy::IntermediateSpace
    }

    /// Shape of the shift space under this policy
    pub fn shift_shape<'a>(
        self,
        dim_z: &'a LatentShape,
        intermediate: Option<&'a LatentShape>,
    ) -> Result<&'a LatentShape> {
        match (self, intermediate) {
            (ShiftPolicy::RawSpace, _) => Ok(dim_z),
            (ShiftPolicy::IntermediateSpace, Some(shape)) => Ok(shape),
            (ShiftPolicy::IntermediateSpace, None) => Err(Error::unsupported(
                "intermediate-space shifts need a generator with an intermediate space",
            )),
        }
    }

    /// Combine `latent` with `shift` and synthesize through `adapter`.
    ///
    /// `shift` must match the policy's shift shape; its batch is either the
    /// latent's batch or 1 (one direction for the whole batch).
    pub fn apply<A: GeneratorAdapter + ?Sized>(
        self,
        adapter: &A,
        latent: &Tensor,
        shift: &Tensor,
    ) -> Result<Tensor> {
        let shape = self.shift_shape(adapter.dim_z(), adapter.intermediate_shape())?;
        adapter.dim_z().check(latent)?;
        check_shift(shape, latent.dim(0)?, shift)?;
        trace!(policy = ?self, family = %adapter.family(), "Applying shift");

        match self {
            ShiftPolicy::RawSpace => {
                let shifted = latent.broadcast_add(shift)?;
                adapter.synthesize(&shifted, false)
            }
            ShiftPolicy::IntermediateSpace => {
                let w = adapter.to_intermediate(latent)?;
                let shifted = w.broadcast_add(shift)?;
                adapter.synthesize(&shifted, true)
            }
        }
    }
}

fn check_shift(shape: &LatentShape, batch_size: usize, shift: &Tensor) -> Result<()> {
    let dims = shift.dims();
    let batch_ok = dims.first().is_some_and(|&b| b == batch_size || b == 1);
    if !batch_ok || dims.len() != shape.dims().len() + 1 || dims[1..] != *shape.dims() {
        return Err(Error::shape_mismatch(shape.dims(), dims));
    }
    Ok(())
}
