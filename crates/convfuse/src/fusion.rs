//! Ordered list of primitive ops folded into a fused convolution epilogue.

use std::fmt;
use std::str::FromStr;

use crate::error::{KernelError, KernelResult};
use crate::ops::Activation;

/// One primitive folded into the kernel after the convolution sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FusedOp {
    /// Adds the next auxiliary tensor (shape `[out_depth]`) along the channel axis.
    BiasAdd,
    Activation(Activation),
}

impl FusedOp {
    pub fn name(self) -> &'static str {
        match self {
            FusedOp::BiasAdd => "BiasAdd",
            FusedOp::Activation(act) => act.name(),
        }
    }
}

impl fmt::Display for FusedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FusedOp {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BiasAdd" => Ok(FusedOp::BiasAdd),
            "Relu" => Ok(FusedOp::Activation(Activation::Relu)),
            "Relu6" => Ok(FusedOp::Activation(Activation::Relu6)),
            "Elu" => Ok(FusedOp::Activation(Activation::Elu)),
            other => Err(KernelError::invalid_attribute(
                "fused_ops",
                format!("unsupported fused op `{other}`"),
            )),
        }
    }
}

/// Non-empty, ordered fusion list. Ops are applied in list order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FusionSpec {
    ops: Vec<FusedOp>,
}

impl FusionSpec {
    pub fn new(ops: Vec<FusedOp>) -> KernelResult<Self> {
        if ops.is_empty() {
            return Err(KernelError::invalid_attribute(
                "fused_ops",
                "fusion spec must name at least one op",
            ));
        }
        Ok(FusionSpec { ops })
    }

    /// Parses op names such as `["BiasAdd", "Relu"]`.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> KernelResult<Self> {
        let ops = names
            .iter()
            .map(|name| name.as_ref().parse::<FusedOp>())
            .collect::<KernelResult<Vec<_>>>()?;
        Self::new(ops)
    }

    /// `BiasAdd` alone.
    pub fn bias_add() -> Self {
        FusionSpec {
            ops: vec![FusedOp::BiasAdd],
        }
    }

    /// `BiasAdd` followed by `activation`.
    pub fn bias_add_then(activation: Activation) -> Self {
        FusionSpec {
            ops: vec![FusedOp::BiasAdd, FusedOp::Activation(activation)],
        }
    }

    pub fn ops(&self) -> &[FusedOp] {
        &self.ops
    }

    pub fn names(&self) -> Vec<String> {
        self.ops.iter().map(|op| op.name().to_string()).collect()
    }

    /// Number of auxiliary tensors the fused kernel consumes.
    pub fn num_args(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, FusedOp::BiasAdd))
            .count()
    }
}

impl fmt::Display for FusionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.ops.iter().map(|op| op.name()).collect();
        f.write_str(&names.join("+"))
    }
}
