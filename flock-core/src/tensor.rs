//! Numeric arrays carried in steps, transitions and parameters.
//!
//! A [`Tensor`] is an n-dimensional array tagged with a [`DType`]. Elements are held
//! as `f64` and rounded to the precision of the tag after every operation, so that
//! `F32` tensors behave like single precision arrays and integer tensors stay
//! integral. Binary operations broadcast the way numpy does.
use crate::error::FlockError;
use anyhow::Result;
use ndarray::{Array1, ArrayD, Axis, IxDyn, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a [`Tensor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 32-bit signed integer.
    I32,

    /// 64-bit signed integer.
    ///
    /// Elements are held as `f64`, so values beyond 2^53 in magnitude are not exact.
    I64,

    /// Single precision float.
    F32,

    /// Double precision float.
    F64,
}

impl DType {
    /// Returns `true` for floating point types.
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Type of the result of a binary operation on `self` and `other`.
    ///
    /// Single precision floats combined with integers are promoted to `F64`.
    pub fn promote(self, other: DType) -> DType {
        use DType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (F64, _) | (_, F64) => F64,
            (F32, I32) | (F32, I64) | (I32, F32) | (I64, F32) => F64,
            _ => I64,
        }
    }

    /// Rounds `v` to a value representable in this type.
    #[inline]
    fn round(self, v: f64) -> f64 {
        match self {
            DType::I32 => v as i32 as f64,
            DType::I64 => v as i64 as f64,
            DType::F32 => v as f32 as f64,
            DType::F64 => v,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::F32 => "float32",
            DType::F64 => "float64",
        };
        write!(f, "{}", s)
    }
}

/// Returns the shape obtained by broadcasting `a` and `b` together.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let n = a.len().max(b.len());
    let mut shape = vec![0; n];
    for i in 0..n {
        let da = if i < n - a.len() { 1 } else { a[i - (n - a.len())] };
        let db = if i < n - b.len() { 1 } else { b[i - (n - b.len())] };
        shape[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return Err(FlockError::ShapeMismatch(a.to_vec(), b.to_vec()).into()),
        };
    }
    Ok(shape)
}

/// An n-dimensional numeric array with an element type.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    dtype: DType,
    data: ArrayD<f64>,
}

impl Tensor {
    /// Creates a tensor, rounding the elements of `data` to `dtype`.
    pub fn new(data: ArrayD<f64>, dtype: DType) -> Self {
        let mut data = data;
        if dtype != DType::F64 {
            data.mapv_inplace(|v| dtype.round(v));
        }
        Self { dtype, data }
    }

    /// Creates a zero-dimensional tensor.
    pub fn scalar(value: f64, dtype: DType) -> Self {
        Self::new(ArrayD::from_elem(IxDyn(&[]), value), dtype)
    }

    /// Creates a tensor from a flat vector in row-major order.
    pub fn from_shape_vec(shape: &[usize], values: Vec<f64>, dtype: DType) -> Result<Self> {
        let n = values.len();
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|_| FlockError::InvalidShape(shape.to_vec(), n))?;
        Ok(Self::new(data, dtype))
    }

    /// Creates a tensor filled with zeros.
    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        Self {
            dtype,
            data: ArrayD::zeros(IxDyn(shape)),
        }
    }

    /// Creates a tensor of zeros with the shape and type of `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape(), self.dtype)
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Shape of the array.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Underlying array.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Elements in row-major order.
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().cloned().collect()
    }

    /// Returns the element of a tensor holding exactly one element.
    pub fn item(&self) -> Option<f64> {
        match self.data.len() {
            1 => self.data.iter().next().cloned(),
            _ => None,
        }
    }

    /// Returns a copy converted to `dtype`.
    pub fn cast(&self, dtype: DType) -> Self {
        Self::new(self.data.clone(), dtype)
    }

    /// Returns a copy broadcast to `shape`.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Self> {
        let view = self
            .data
            .broadcast(IxDyn(shape))
            .ok_or_else(|| FlockError::ShapeMismatch(self.shape().to_vec(), shape.to_vec()))?;
        Ok(Self {
            dtype: self.dtype,
            data: view.to_owned(),
        })
    }

    /// Returns `true` if the tensor can be broadcast to `shape`.
    pub fn broadcasts_to(&self, shape: &[usize]) -> bool {
        self.data.broadcast(IxDyn(shape)).is_some()
    }

    /// Drops leading axes of length 1 until at most `ndim` axes are left.
    pub fn squeeze_leading(&self, ndim: usize) -> Self {
        let mut data = self.data.clone();
        while data.ndim() > ndim && data.shape()[0] == 1 {
            data = data.index_axis_move(Axis(0), 0);
        }
        Self {
            dtype: self.dtype,
            data,
        }
    }

    /// Elementwise product with broadcasting and type promotion.
    pub fn mul(&self, other: &Tensor) -> Result<Self> {
        let shape = broadcast_shape(self.shape(), other.shape())?;
        let dtype = self.dtype.promote(other.dtype);
        let mut out = self.broadcast_to(&shape)?.cast(dtype);
        out.zip_with(other, |a, b| a * b)?;
        Ok(out)
    }

    /// In-place elementwise product; `other` must broadcast into the shape of `self`.
    pub fn mul_assign(&mut self, other: &Tensor) -> Result<()> {
        self.zip_with(other, |a, b| a * b)
    }

    /// In-place elementwise sum; `other` must broadcast into the shape of `self`.
    pub fn add_assign(&mut self, other: &Tensor) -> Result<()> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Overwrites the elements of `self` with those of `other`, keeping the shape and
    /// type of `self`.
    ///
    /// Unlike the arithmetic operations, floats are truncated when assigned into an
    /// integer tensor.
    pub fn assign(&mut self, other: &Tensor) -> Result<()> {
        self.broadcast_apply(other, |_, b| b)
    }

    fn zip_with<F>(&mut self, other: &Tensor, op: F) -> Result<()>
    where
        F: Fn(f64, f64) -> f64,
    {
        if !self.dtype.is_float() && other.dtype.is_float() {
            return Err(FlockError::UnsafeCast {
                from: other.dtype.to_string(),
                to: self.dtype.to_string(),
            }
            .into());
        }
        self.broadcast_apply(other, op)
    }

    fn broadcast_apply<F>(&mut self, other: &Tensor, op: F) -> Result<()>
    where
        F: Fn(f64, f64) -> f64,
    {
        let rhs = other
            .data
            .broadcast(self.data.raw_dim())
            .ok_or_else(|| FlockError::ShapeMismatch(other.shape().to_vec(), self.shape().to_vec()))?;
        let dtype = self.dtype;
        Zip::from(&mut self.data)
            .and(&rhs)
            .for_each(|x, &y| *x = dtype.round(op(*x, y)));
        Ok(())
    }
}

impl From<f32> for Tensor {
    fn from(v: f32) -> Self {
        Self::scalar(v as f64, DType::F32)
    }
}

impl From<f64> for Tensor {
    fn from(v: f64) -> Self {
        Self::scalar(v, DType::F64)
    }
}

impl From<i32> for Tensor {
    fn from(v: i32) -> Self {
        Self::scalar(v as f64, DType::I32)
    }
}

impl From<i64> for Tensor {
    fn from(v: i64) -> Self {
        Self::scalar(v as f64, DType::I64)
    }
}

impl From<Vec<f32>> for Tensor {
    fn from(v: Vec<f32>) -> Self {
        let data = Array1::from(v.into_iter().map(|e| e as f64).collect::<Vec<_>>()).into_dyn();
        Self::new(data, DType::F32)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_promote() {
        use DType::*;
        assert_eq!(F32.promote(F32), F32);
        assert_eq!(F32.promote(F64), F64);
        assert_eq!(I32.promote(F32), F64);
        assert_eq!(I32.promote(I64), I64);
        assert_eq!(I32.promote(I32), I32);
    }

    #[test]
    fn test_broadcast_shape() {
        assert_eq!(broadcast_shape(&[], &[3]).unwrap(), vec![3]);
        assert_eq!(broadcast_shape(&[2, 1], &[3]).unwrap(), vec![2, 3]);
        assert!(broadcast_shape(&[2], &[3]).is_err());
    }

    #[test]
    fn test_f32_rounding() {
        let t = Tensor::from(0.1f32);
        assert_eq!(t.item(), Some(0.1f32 as f64));

        let mut a = Tensor::from(1f32);
        a.mul_assign(&Tensor::from(0.1f64)).unwrap();
        assert_eq!(a.dtype(), DType::F32);
        assert_eq!(a.item(), Some(0.1f32 as f64));
    }

    #[test]
    fn test_mul_broadcasts() {
        let a = Tensor::from(vec![1f32, 2., 3.]);
        let b = Tensor::from(2f64);
        let c = a.mul(&b).unwrap();
        assert_eq!(c.dtype(), DType::F64);
        assert_eq!(c.shape(), &[3]);
        assert_eq!(c.to_vec(), vec![2., 4., 6.]);
    }

    #[test]
    fn test_in_place_ops_keep_shape() {
        let mut a = Tensor::from(1f32);
        let b = Tensor::from(vec![1f32, 2.]);
        let err = a.add_assign(&b).unwrap_err();
        assert_eq!(
            err.downcast_ref::<FlockError>(),
            Some(&FlockError::ShapeMismatch(vec![2], vec![]))
        );

        let mut a = Tensor::from(3i32);
        assert!(a.add_assign(&Tensor::from(1.5f32)).is_err());
        a.add_assign(&Tensor::from(2i32)).unwrap();
        assert_eq!(a.item(), Some(5.));
    }

    #[test]
    fn test_squeeze_leading() {
        let t = Tensor::from_shape_vec(&[1, 1, 2], vec![1., 2.], DType::F32).unwrap();
        assert_eq!(t.squeeze_leading(1).shape(), &[2]);
        assert_eq!(t.squeeze_leading(0).shape(), &[2]);
        assert_eq!(t.squeeze_leading(2).shape(), &[1, 2]);
        assert_eq!(Tensor::from(vec![40f32]).squeeze_leading(0).shape(), &[] as &[usize]);
        assert!(Tensor::from(3f32).broadcasts_to(&[2]));
        assert!(!Tensor::from(vec![1f32, 2., 3.]).broadcasts_to(&[2]));
    }

    #[test]
    fn test_i64_exact_up_to_2_pow_53() {
        let max = 1i64 << 53;
        assert_eq!(Tensor::from(max).item(), Some(max as f64));
        assert_eq!(Tensor::from(-max).item(), Some(-max as f64));
        // The next integer has no f64 representation.
        assert_eq!(Tensor::from(max + 1).item(), Some(max as f64));
    }

    #[test]
    fn test_from_shape_vec() {
        let t = Tensor::from_shape_vec(&[2, 2], vec![1., 2., 3., 4.], DType::I32).unwrap();
        assert_eq!(t.shape(), &[2, 2]);
        assert!(Tensor::from_shape_vec(&[3], vec![1.], DType::F32).is_err());
    }
}
