//! Host-memory tensor buffer.

use super::{ElementType, TensorBuffer, TensorError, TensorType};

#[derive(Debug, Clone, PartialEq)]
enum HostData {
    F32(Vec<f32>),
    I32(Vec<i32>),
}

/// A tensor whose data lives in a `Vec` on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    dims: Vec<usize>,
    data: HostData,
}

impl HostTensor {
    /// Create an `f32` tensor. Fails if `data` does not fill `dims`.
    pub fn from_f32(data: Vec<f32>, dims: Vec<usize>) -> Result<Self, TensorError> {
        check_len(data.len(), &dims)?;
        Ok(Self { dims, data: HostData::F32(data) })
    }

    /// Create an `i32` tensor. Fails if `data` does not fill `dims`.
    pub fn from_i32(data: Vec<i32>, dims: Vec<usize>) -> Result<Self, TensorError> {
        check_len(data.len(), &dims)?;
        Ok(Self { dims, data: HostData::I32(data) })
    }

    /// Zero-filled tensor of the given type and shape.
    pub fn zeros(element_type: ElementType, dims: Vec<usize>) -> Self {
        let n = dims.iter().product();
        let data = match element_type {
            ElementType::F32 => HostData::F32(vec![0.0; n]),
            ElementType::I32 => HostData::I32(vec![0; n]),
        };
        Self { dims, data }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            HostData::F32(v) => Some(v),
            HostData::I32(_) => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            HostData::I32(v) => Some(v),
            HostData::F32(_) => None,
        }
    }

    fn element_type(&self) -> ElementType {
        match self.data {
            HostData::F32(_) => ElementType::F32,
            HostData::I32(_) => ElementType::I32,
        }
    }

    fn len(&self) -> usize {
        match &self.data {
            HostData::F32(v) => v.len(),
            HostData::I32(v) => v.len(),
        }
    }
}

fn check_len(len: usize, dims: &[usize]) -> Result<(), TensorError> {
    let expected: usize = dims.iter().product();
    if len != expected {
        return Err(TensorError::SizeMismatch { expected, actual: len });
    }
    Ok(())
}

impl TensorBuffer for HostTensor {
    fn tensor_type(&self) -> Result<TensorType, TensorError> {
        Ok(TensorType::new(self.element_type(), self.dims.clone()))
    }

    fn host_f32(&self) -> Result<&[f32], TensorError> {
        match &self.data {
            HostData::F32(v) => Ok(v),
            HostData::I32(_) => Err(TensorError::TypeMismatch {
                expected: ElementType::F32,
                actual: ElementType::I32,
            }),
        }
    }

    fn read_f32(&self, out: &mut [f32]) -> Result<(), TensorError> {
        let src = self.host_f32()?;
        if out.len() != src.len() {
            return Err(TensorError::SizeMismatch { expected: src.len(), actual: out.len() });
        }
        out.copy_from_slice(src);
        Ok(())
    }

    fn write_i32(&mut self, data: &[i32]) -> Result<(), TensorError> {
        let len = self.len();
        match &mut self.data {
            HostData::I32(v) if data.len() == len => {
                v.copy_from_slice(data);
                Ok(())
            }
            HostData::I32(_) => Err(TensorError::SizeMismatch { expected: len, actual: data.len() }),
            HostData::F32(_) => Err(TensorError::TypeMismatch {
                expected: ElementType::I32,
                actual: ElementType::F32,
            }),
        }
    }

    fn write_f32(&mut self, data: &[f32]) -> Result<(), TensorError> {
        let len = self.len();
        match &mut self.data {
            HostData::F32(v) if data.len() == len => {
                v.copy_from_slice(data);
                Ok(())
            }
            HostData::F32(_) => Err(TensorError::SizeMismatch { expected: len, actual: data.len() }),
            HostData::I32(_) => Err(TensorError::TypeMismatch {
                expected: ElementType::F32,
                actual: ElementType::I32,
            }),
        }
    }
}
