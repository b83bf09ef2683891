//! Native-owned strided arrays.
//!
//! [`NdArray`] is what native functions hold and return. Cloning an `NdArray` aliases its
//! storage, the way a reference-counted array shares its buffer.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::{LayoutError, Result};
use crate::dtype::{DType, Element};
use crate::host::Storage;
use crate::layout::{self, Indices, LayoutDescriptor};

/// Strided array whose storage is owned on the native side.
pub struct NdArray<T: Element> {
    storage: Arc<Storage>,
    offset: isize,
    shape: Vec<usize>,
    /// Element strides.
    strides: Vec<isize>,
    _marker: PhantomData<T>,
}

impl<T: Element> Clone for NdArray<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            offset: self.offset,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Element> NdArray<T> {
    fn with_strides(data: Vec<T>, shape: &[usize], strides: Vec<isize>) -> std::result::Result<Self, LayoutError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(LayoutError::SizeMismatch { expected, found: data.len() });
        }
        Ok(Self {
            storage: Arc::new(Storage::from_elements(&data)),
            offset: 0,
            shape: shape.to_vec(),
            strides,
            _marker: PhantomData,
        })
    }

    /// Row-major array over `data`.
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> std::result::Result<Self, LayoutError> {
        Self::with_strides(data, shape, layout::row_major_strides(shape, 1))
    }

    /// Column-major array over `data`, as linear-algebra matrices are stored.
    pub fn from_vec_column_major(data: Vec<T>, shape: &[usize]) -> std::result::Result<Self, LayoutError> {
        Self::with_strides(data, shape, layout::column_major_strides(shape, 1))
    }

    pub fn zeros(shape: &[usize]) -> Self {
        let n: usize = shape.iter().product();
        Self {
            storage: Arc::new(Storage::zeroed(n * std::mem::size_of::<T>())),
            offset: 0,
            shape: shape.to_vec(),
            strides: layout::row_major_strides(shape, 1),
            _marker: PhantomData,
        }
    }

    /// Row-major array filled by calling `f` on every index.
    pub fn from_fn<F: FnMut(&[usize]) -> T>(shape: &[usize], mut f: F) -> Self {
        let data: Vec<T> = Indices::new(shape).map(|i| f(&i)).collect();
        Self {
            storage: Arc::new(Storage::from_elements(&data)),
            offset: 0,
            shape: shape.to_vec(),
            strides: layout::row_major_strides(shape, 1),
            _marker: PhantomData,
        }
    }

    pub fn shape(&self) -> &[usize] { &self.shape }
    /// Strides in elements.
    pub fn strides(&self) -> &[isize] { &self.strides }
    pub fn ndim(&self) -> usize { self.shape.len() }
    pub fn len(&self) -> usize { self.shape.iter().product() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub(crate) fn storage(&self) -> &Arc<Storage> { &self.storage }
    /// Byte offset of the first element.
    pub(crate) fn offset(&self) -> isize { self.offset }

    /// Strides in bytes.
    pub fn byte_strides(&self) -> Vec<isize> {
        let itemsize = std::mem::size_of::<T>() as isize;
        self.strides.iter().map(|s| s * itemsize).collect()
    }

    /// Layout as the host would see it.
    pub fn layout(&self, writeable: bool) -> LayoutDescriptor {
        LayoutDescriptor::new(DType::of::<T>(), self.shape.clone(), self.byte_strides(), writeable)
            .expect("native arrays keep shape and strides the same length")
    }

    fn byte_offset(&self, index: &[usize]) -> Result<isize> {
        layout::check_index(index, &self.shape)?;
        let itemsize = std::mem::size_of::<T>() as isize;
        Ok(self.offset + layout::offset_of(index, &self.strides) * itemsize)
    }

    pub fn get(&self, index: &[usize]) -> Result<T> {
        let at = self.byte_offset(index)?;
        self.storage.read(at)
    }

    /// Store `value` at `index`. Aliases of this array observe the write.
    pub fn set(&mut self, index: &[usize], value: T) -> Result<()> {
        let at = self.byte_offset(index)?;
        self.storage.write(at, value)
    }

    /// Elements in logical row-major order.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        Indices::new(&self.shape).map(|i| self.get(&i)).collect()
    }

    /// Reverse the axes, sharing storage.
    pub fn transpose(&self) -> Self {
        let mut t = self.clone();
        t.shape.reverse();
        t.strides.reverse();
        t
    }

    /// Whether both arrays alias the same storage.
    pub fn shares_storage(&self, other: &NdArray<T>) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }
}

impl<T: Element> fmt::Debug for NdArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("dtype", &T::ELEMENT)
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_major_matrix_reads_logically() {
        // 5x3 filled in memory order: m[i, j] = i + 5 * j
        let m = NdArray::from_vec_column_major((0..15).map(|v| v as f64).collect(), &[5, 3]).unwrap();
        assert_eq!(m.strides(), &[1, 5]);
        assert_eq!(m.get(&[1, 2]).unwrap(), 11.0);
        assert_eq!(m.byte_strides(), vec![8, 40]);
        assert!(m.layout(true).is_column_major());
    }

    #[test]
    fn clones_alias_storage() {
        let mut a = NdArray::<f64>::zeros(&[2, 2]);
        let b = a.clone();
        a.set(&[1, 0], 4.0).unwrap();
        assert!(a.shares_storage(&b));
        assert_eq!(b.get(&[1, 0]).unwrap(), 4.0);
    }

    #[test]
    fn from_fn_and_transpose() {
        let a = NdArray::from_fn(&[2, 3], |i| (10 * i[0] + i[1]) as i64);
        assert_eq!(a.to_vec().unwrap(), vec![0, 1, 2, 10, 11, 12]);
        assert_eq!(a.transpose().to_vec().unwrap(), vec![0, 10, 1, 11, 2, 12]);
        assert!(a.get(&[2, 0]).is_err());
    }

    #[test]
    fn zeros_of_any_rank() {
        let a = NdArray::<i32>::zeros(&[3, 0, 2]);
        assert!(a.to_vec().unwrap().is_empty());
        let s = NdArray::<u8>::zeros(&[]);
        assert_eq!(s.to_vec().unwrap(), vec![0]);
        assert_eq!(NdArray::<f32>::zeros(&[2, 3]).strides(), &[3, 1]);
    }
}
