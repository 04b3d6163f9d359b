//! Tensor buffer contract consumed by the sampler.
//!
//! The runtime's real buffers may live on an accelerator; the sampler only
//! needs shape introspection, a host-readable view (when one exists), a
//! download path, and write-back. All of these are fallible.

mod host;

pub use host::HostTensor;

use thiserror::Error;

/// Element type of a tensor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    I32,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            Self::F32 | Self::I32 => 4,
        }
    }
}

/// Element type plus dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorType {
    pub element_type: ElementType,
    pub dims: Vec<usize>,
}

impl TensorType {
    pub fn new(element_type: ElementType, dims: Vec<usize>) -> Self {
        Self { element_type, dims }
    }

    /// Total element count (product of dimensions).
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Number of dimensions larger than one.
    pub fn num_significant_dims(&self) -> usize {
        self.dims.iter().filter(|&&d| d > 1).count()
    }
}

/// Errors raised by tensor buffer access.
#[derive(Debug, Error)]
pub enum TensorError {
    #[error("Tensor is not host resident")]
    NotHostResident,

    #[error("Element type mismatch: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        expected: ElementType,
        actual: ElementType,
    },

    #[error("Size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Tensor access failed: {0}")]
    Access(String),
}

/// A typed, shaped buffer that may or may not be host resident.
pub trait TensorBuffer: Send {
    /// Element type and dimensions.
    fn tensor_type(&self) -> Result<TensorType, TensorError>;

    /// Borrow the data as a contiguous host `f32` slice without copying.
    ///
    /// Returns `TensorError::NotHostResident` when the data must be downloaded
    /// with [`TensorBuffer::read_f32`] first.
    fn host_f32(&self) -> Result<&[f32], TensorError>;

    /// Copy the data into `out`, which must hold exactly `num_elements` values.
    fn read_f32(&self, out: &mut [f32]) -> Result<(), TensorError>;

    /// Overwrite the buffer with `i32` values.
    fn write_i32(&mut self, data: &[i32]) -> Result<(), TensorError>;

    /// Overwrite the buffer with `f32` values.
    fn write_f32(&mut self, data: &[f32]) -> Result<(), TensorError>;

    /// Packed size in bytes.
    fn packed_size(&self) -> Result<usize, TensorError> {
        let ty = self.tensor_type()?;
        Ok(ty.num_elements() * ty.element_type.size_bytes())
    }
}

/// Number of dimensions larger than one for any buffer.
pub fn num_significant_dims(tensor: &dyn TensorBuffer) -> Result<usize, TensorError> {
    Ok(tensor.tensor_type()?.num_significant_dims())
}
