//! Enumerates the floating-point element types the kernels accept.

use std::fmt;
use std::str::FromStr;

use crate::error::KernelError;

/// Logical dtype identifier shared by host tensors and kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 16-bit IEEE-754 half precision.
    F16,
    /// 32-bit IEEE-754 single precision.
    F32,
    /// 64-bit IEEE-754 double precision.
    F64,
}

impl DType {
    pub const ALL: [DType; 3] = [DType::F16, DType::F32, DType::F64];

    /// Returns the number of bytes required per scalar element.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::F16 => 2,
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    /// Short lowercase name used in trial summaries and tolerance rules.
    pub fn name(self) -> &'static str {
        match self {
            DType::F16 => "half",
            DType::F32 => "float",
            DType::F64 => "double",
        }
    }

    /// Machine epsilon of the element type, widened to f64.
    pub fn epsilon(self) -> f64 {
        match self {
            DType::F16 => half::f16::EPSILON.to_f64(),
            DType::F32 => f32::EPSILON as f64,
            DType::F64 => f64::EPSILON,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f16" | "half" => Ok(DType::F16),
            "f32" | "float" => Ok(DType::F32),
            "f64" | "double" => Ok(DType::F64),
            other => Err(KernelError::invalid_argument(format!(
                "unknown dtype `{other}`"
            ))),
        }
    }
}
