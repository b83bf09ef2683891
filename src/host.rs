//! In-process model of the dynamically-typed host side.
//!
//! [`HostValue`] is what a host caller passes across the boundary; [`HostArray`] is the host's
//! array object: a dtype, a shape, byte strides, a writeable flag and a window onto shared
//! [`Storage`]. Host arrays never copy when sliced, transposed or reinterpreted.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::{BindError, LayoutError, Rejection, Result};
use crate::dtype::{DType, Element, ElementType};
use crate::layout::{self, Indices, LayoutDescriptor};
use crate::owner::{Owned, OwnerHandle};

/// Shared byte storage made of atomic 64-bit words.
///
/// Every array or view aliasing the storage may read, and writeable ones may write, from any
/// thread. Element accesses are relaxed atomic word operations: an element that sits inside
/// one word is never torn, and one that straddles two words may be observed half-written by
/// a concurrent reader.
pub struct Storage {
    words: Box<[AtomicU64]>,
    len: usize,
}

impl Storage {
    /// `len` zero bytes.
    pub fn zeroed(len: usize) -> Self {
        let words = (0..len.div_ceil(8)).map(|_| AtomicU64::new(0)).collect();
        Self { words, len }
    }

    /// Copy the bytes of `data` into fresh storage.
    pub fn from_elements<T: Element>(data: &[T]) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let words = bytes
            .chunks(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word[..chunk.len()].copy_from_slice(chunk);
                AtomicU64::new(u64::from_ne_bytes(word))
            })
            .collect();
        Self { words, len: bytes.len() }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    fn in_bounds<T>(&self, at: isize) -> bool {
        at >= 0 && (at as usize).saturating_add(std::mem::size_of::<T>()) <= self.len
    }

    /// Read one element at byte offset `at`. Unaligned offsets are allowed.
    pub(crate) fn read<T: Element>(&self, at: isize) -> Result<T> {
        if !self.in_bounds::<T>(at) {
            return Err(self.overrun::<T>(at).into());
        }
        let mut value = <T as bytemuck::Zeroable>::zeroed();
        let out = bytemuck::bytes_of_mut(&mut value);
        for (byte, start, take, pos) in word_spans(at as usize, out.len()) {
            let word = self.words[byte / 8].load(Ordering::Relaxed).to_ne_bytes();
            out[pos..pos + take].copy_from_slice(&word[start..start + take]);
        }
        Ok(value)
    }

    /// Write one element at byte offset `at`.
    pub(crate) fn write<T: Element>(&self, at: isize, value: T) -> Result<()> {
        if !self.in_bounds::<T>(at) {
            return Err(self.overrun::<T>(at).into());
        }
        let src = bytemuck::bytes_of(&value);
        for (byte, start, take, pos) in word_spans(at as usize, src.len()) {
            let cell = &self.words[byte / 8];
            let chunk = &src[pos..pos + take];
            let mut current = cell.load(Ordering::Relaxed);
            loop {
                let mut bytes = current.to_ne_bytes();
                bytes[start..start + take].copy_from_slice(chunk);
                match cell.compare_exchange_weak(
                    current,
                    u64::from_ne_bytes(bytes),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break,
                    Err(actual) => current = actual,
                }
            }
        }
        Ok(())
    }

    fn overrun<T>(&self, at: isize) -> LayoutError {
        LayoutError::BufferOverrun {
            low: at,
            high: at.saturating_add(std::mem::size_of::<T>() as isize),
            available: self.len,
        }
    }
}

/// Split the byte range `[at, at + len)` into per-word pieces:
/// `(absolute byte, offset in word, piece length, offset in element)`.
fn word_spans(at: usize, len: usize) -> impl Iterator<Item = (usize, usize, usize, usize)> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos >= len {
            return None;
        }
        let byte = at + pos;
        let start = byte % 8;
        let take = (8 - start).min(len - pos);
        let piece = (byte, start, take, pos);
        pos += take;
        Some(piece)
    })
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage").field("len", &self.len).finish()
    }
}

/// The host's dynamic array object.
#[derive(Clone)]
pub struct HostArray {
    dtype: DType,
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: isize,
    writeable: bool,
    frozen: bool,
    storage: Arc<Storage>,
    base: Option<OwnerHandle>,
}

impl HostArray {
    /// Wrap existing storage with an explicit layout. The layout must stay inside the storage.
    pub fn from_storage(
        storage: Arc<Storage>,
        dtype: DType,
        shape: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> std::result::Result<Self, LayoutError> {
        Self::from_storage_with_access(storage, dtype, shape, strides, offset, true)
    }

    /// Like [`HostArray::from_storage`]; a read-only result is frozen and cannot be made
    /// writeable again.
    pub(crate) fn from_storage_with_access(
        storage: Arc<Storage>,
        dtype: DType,
        shape: &[usize],
        strides: &[isize],
        offset: isize,
        writeable: bool,
    ) -> std::result::Result<Self, LayoutError> {
        if let Some((low, high)) = layout::byte_extent(shape, strides, dtype.itemsize(), offset)? {
            if low < 0 || high as usize > storage.len() {
                return Err(LayoutError::BufferOverrun { low, high, available: storage.len() });
            }
        }
        Ok(Self {
            dtype,
            shape: shape.to_vec(),
            strides: strides.to_vec(),
            offset,
            writeable,
            frozen: !writeable,
            storage,
            base: None,
        })
    }

    /// Row-major array holding `data`.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: &[usize]) -> std::result::Result<Self, LayoutError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(LayoutError::SizeMismatch { expected, found: data.len() });
        }
        let storage = Arc::new(Storage::from_elements(&data));
        let strides = layout::row_major_strides(shape, T::ELEMENT.itemsize());
        Self::from_storage(storage, DType::of::<T>(), shape, &strides, 0)
    }

    /// Zero-filled row-major array of any dtype, including non-native byte orders.
    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        let len = shape.iter().product::<usize>() * dtype.itemsize();
        let strides = layout::row_major_strides(shape, dtype.itemsize());
        Self {
            dtype,
            shape: shape.to_vec(),
            strides,
            offset: 0,
            writeable: true,
            frozen: false,
            storage: Arc::new(Storage::zeroed(len)),
            base: None,
        }
    }

    /// Alias of native storage, used by the view constructor's output direction.
    pub(crate) fn alias(
        storage: Arc<Storage>,
        dtype: DType,
        shape: Vec<usize>,
        strides: Vec<isize>,
        offset: isize,
        read_only: bool,
    ) -> Self {
        Self {
            dtype,
            shape,
            strides,
            offset,
            writeable: !read_only,
            frozen: read_only,
            storage,
            base: None,
        }
    }

    pub fn dtype(&self) -> DType { self.dtype }
    pub fn shape(&self) -> &[usize] { &self.shape }
    /// Byte strides.
    pub fn strides(&self) -> &[isize] { &self.strides }
    /// Byte offset of the first element inside the storage.
    pub fn offset(&self) -> isize { self.offset }
    pub fn ndim(&self) -> usize { self.shape.len() }
    pub fn itemsize(&self) -> usize { self.dtype.itemsize() }
    pub fn len(&self) -> usize { self.shape.iter().product() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn storage(&self) -> &Arc<Storage> { &self.storage }
    pub fn base(&self) -> Option<&OwnerHandle> { self.base.as_ref() }

    /// The host's "writeable" flag.
    pub fn is_writeable(&self) -> bool { self.writeable }

    /// Change the writeable flag. Arrays exported read-only by native code cannot be made
    /// writeable again.
    pub fn set_writeable(&mut self, writeable: bool) -> std::result::Result<(), BindError> {
        if writeable && self.frozen {
            return Err(BindError::ReadOnlyView);
        }
        self.writeable = writeable;
        Ok(())
    }

    /// Resolve this array into a layout descriptor.
    pub fn descriptor(&self) -> LayoutDescriptor {
        LayoutDescriptor::new(self.dtype, self.shape.clone(), self.strides.clone(), self.writeable)
            .expect("host arrays keep shape and strides the same length")
    }

    /// Whether both arrays alias the same storage.
    pub fn shares_storage(&self, other: &HostArray) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Reverse the axes without copying.
    pub fn transpose(&self) -> Self {
        let mut t = self.clone();
        t.shape.reverse();
        t.strides.reverse();
        t
    }

    /// Every `step`-th element along `axis`, without copying.
    pub fn step(&self, axis: usize, step: usize) -> std::result::Result<Self, LayoutError> {
        if axis >= self.ndim() || step == 0 {
            return Err(LayoutError::OutOfBounds { index: vec![axis, step], shape: self.shape.clone() });
        }
        let mut s = self.clone();
        s.shape[axis] = self.shape[axis].div_ceil(step);
        s.strides[axis] = self.strides[axis] * step as isize;
        Ok(s)
    }

    /// Reinterpret the same bytes with a different shape and strides (no copy).
    pub fn as_strided(&self, shape: &[usize], strides: &[isize]) -> std::result::Result<Self, LayoutError> {
        let mut out = Self::from_storage(self.storage.clone(), self.dtype, shape, strides, self.offset)?;
        out.writeable = self.writeable;
        out.frozen = self.frozen;
        out.base = self.base.clone();
        Ok(out)
    }

    /// Row-major reshape of a row-major array (no copy).
    pub fn reshape(&self, shape: &[usize]) -> std::result::Result<Self, BindError> {
        let found: usize = shape.iter().product();
        if found != self.len() {
            return Err(LayoutError::SizeMismatch { expected: self.len(), found }.into());
        }
        if !self.descriptor().is_row_major() {
            return Err(Rejection::NotContiguous { required: crate::signature::Contiguity::RowMajor }.into());
        }
        let strides = layout::row_major_strides(shape, self.itemsize());
        self.as_strided(shape, &strides).map_err(Into::into)
    }

    /// Same bytes viewed with another dtype of equal width, e.g. its byte-swapped counterpart.
    pub fn view_as(&self, dtype: DType) -> std::result::Result<Self, LayoutError> {
        if dtype.itemsize() != self.itemsize() {
            return Err(LayoutError::SizeMismatch { expected: self.itemsize(), found: dtype.itemsize() });
        }
        let mut out = self.clone();
        out.dtype = dtype;
        Ok(out)
    }

    fn typed<T: Element>(&self) -> Result<()> {
        if self.dtype.element() != T::ELEMENT {
            return Err(Rejection::ElementTypeMismatch { expected: T::ELEMENT, found: self.dtype.element() }.into());
        }
        if !self.dtype.is_native_order() {
            return Err(Rejection::NonNativeByteOrder(self.dtype.byte_order()).into());
        }
        Ok(())
    }

    fn byte_offset(&self, index: &[usize]) -> Result<isize> {
        layout::check_index(index, &self.shape)?;
        Ok(self.offset + layout::offset_of(index, &self.strides))
    }

    /// Element at `index`.
    pub fn get<T: Element>(&self, index: &[usize]) -> Result<T> {
        self.typed::<T>()?;
        let at = self.byte_offset(index)?;
        self.storage.read(at)
    }

    /// Store `value` at `index`; fails on non-writeable arrays.
    pub fn set<T: Element>(&self, index: &[usize], value: T) -> Result<()> {
        self.typed::<T>()?;
        if !self.writeable {
            return Err(BindError::ReadOnlyView);
        }
        let at = self.byte_offset(index)?;
        self.storage.write(at, value)
    }

    /// Elements in logical row-major order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.typed::<T>()?;
        Indices::new(&self.shape)
            .map(|i| self.storage.read(self.offset + layout::offset_of(&i, &self.strides)))
            .collect()
    }
}

impl Owned for HostArray {
    fn owner(&self) -> Option<&OwnerHandle> { self.base.as_ref() }
    fn set_owner(&mut self, owner: OwnerHandle) { self.base = Some(owner); }
}

impl fmt::Debug for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostArray")
            .field("dtype", &self.dtype.to_string())
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("writeable", &self.writeable)
            .field("has_base", &self.base.is_some())
            .finish()
    }
}

/// A value passed across the boundary by the host.
#[derive(Clone, Debug)]
pub enum HostValue {
    /// The host's absent sentinel.
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Array(HostArray),
}

impl HostValue {
    pub fn is_none(&self) -> bool { matches!(self, HostValue::None) }

    /// Layout of the value, with scalars as rank-0 layouts. `None` has no layout.
    pub fn descriptor(&self) -> Option<LayoutDescriptor> {
        match self {
            HostValue::None => None,
            HostValue::Bool(_) => Some(LayoutDescriptor::scalar(DType::native(ElementType::Bool))),
            HostValue::Int(_) => Some(LayoutDescriptor::scalar(DType::of::<i64>())),
            HostValue::Float(_) => Some(LayoutDescriptor::scalar(DType::of::<f64>())),
            HostValue::Array(a) => Some(a.descriptor()),
        }
    }

    pub fn as_array(&self) -> Option<&HostArray> {
        match self {
            HostValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            HostValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            HostValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::None => "None",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Array(_) => "ndarray",
        }
    }
}

impl From<bool> for HostValue { fn from(v: bool) -> Self { HostValue::Bool(v) } }
impl From<i64> for HostValue { fn from(v: i64) -> Self { HostValue::Int(v) } }
impl From<i32> for HostValue { fn from(v: i32) -> Self { HostValue::Int(v as i64) } }
impl From<f64> for HostValue { fn from(v: f64) -> Self { HostValue::Float(v) } }
impl From<HostArray> for HostValue { fn from(v: HostArray) -> Self { HostValue::Array(v) } }

#[cfg(test)]
mod tests {
    use super::*;

    fn arange(n: usize) -> Vec<f64> { (0..n).map(|i| i as f64).collect() }

    #[test]
    fn from_vec_is_row_major() {
        let a = HostArray::from_vec(arange(24), &[4, 3, 2]).unwrap();
        assert_eq!(a.strides(), &[48, 16, 8]);
        assert_eq!(a.get::<f64>(&[1, 2, 1]).unwrap(), 11.0);
        assert!(a.is_writeable());
    }

    #[test]
    fn from_vec_checks_size() {
        let err = HostArray::from_vec(arange(5), &[2, 3]).unwrap_err();
        assert_eq!(err, LayoutError::SizeMismatch { expected: 6, found: 5 });
    }

    #[test]
    fn transpose_and_step_alias_storage() {
        let a = HostArray::from_vec(arange(6), &[2, 3]).unwrap();
        let t = a.transpose();
        assert!(t.shares_storage(&a));
        assert_eq!(t.to_vec::<f64>().unwrap(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
        let s = a.step(1, 2).unwrap();
        assert_eq!(s.shape(), &[2, 2]);
        assert_eq!(s.to_vec::<f64>().unwrap(), vec![0.0, 2.0, 3.0, 5.0]);
        a.set(&[0, 2], 9.0f64).unwrap();
        assert_eq!(s.get::<f64>(&[0, 1]).unwrap(), 9.0);
    }

    #[test]
    fn from_storage_rejects_overruns() {
        let storage = Arc::new(Storage::zeroed(24));
        let err = HostArray::from_storage(storage.clone(), DType::of::<f64>(), &[4], &[8], 0).unwrap_err();
        assert!(matches!(err, LayoutError::BufferOverrun { .. }));
        // Size-1 and size-0 dimensions may carry any stride.
        assert!(HostArray::from_storage(storage.clone(), DType::of::<f64>(), &[1], &[1 << 30], 0).is_ok());
        assert!(HostArray::from_storage(storage, DType::of::<f64>(), &[0], &[-3], 0).is_ok());
    }

    #[test]
    fn read_only_arrays_reject_writes() {
        let mut a = HostArray::from_vec(arange(3), &[3]).unwrap();
        a.set_writeable(false).unwrap();
        assert_eq!(a.set(&[0], 1.0f64).unwrap_err(), BindError::ReadOnlyView);
        a.set_writeable(true).unwrap();
        assert!(a.set(&[0], 1.0f64).is_ok());
    }

    #[test]
    fn typed_access_checks_dtype() {
        let a = HostArray::zeros(DType::of::<f64>().swapped(), &[5]);
        assert!(matches!(
            a.get::<f64>(&[0]).unwrap_err(),
            BindError::Rejected(Rejection::NonNativeByteOrder(_))
        ));
        let b = HostArray::from_vec(vec![1i16, 2], &[2]).unwrap();
        assert!(b.get::<f64>(&[0]).is_err());
        assert_eq!(b.view_as("<i2".parse().unwrap()).unwrap().len(), 2);
        assert!(b.view_as(DType::of::<f64>()).is_err());
    }

    #[test]
    fn reshape_requires_row_major() {
        let a = HostArray::from_vec(arange(6), &[2, 3]).unwrap();
        assert_eq!(a.reshape(&[3, 2]).unwrap().get::<f64>(&[2, 1]).unwrap(), 5.0);
        assert!(a.transpose().reshape(&[6]).is_err());
        assert!(a.reshape(&[4]).is_err());
    }

    #[test]
    fn scalars_are_rank_zero() {
        let d = HostValue::from(1).descriptor().unwrap();
        assert_eq!(d.rank(), 0);
        assert_eq!(d.dtype(), DType::of::<i64>());
        assert!(HostValue::None.descriptor().is_none());
        assert_eq!(HostValue::from(2.5).type_name(), "float");
    }

    #[test]
    fn unaligned_elements_straddle_words() {
        let storage = Storage::zeroed(24);
        storage.write::<u64>(5, 0x0102_0304_0506_0708).unwrap();
        storage.write::<i16>(15, -2).unwrap();
        assert_eq!(storage.read::<u64>(5).unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(storage.read::<i16>(15).unwrap(), -2);
        assert_eq!(storage.read::<u8>(4).unwrap(), 0);
        assert_eq!(storage.read::<u8>(17).unwrap(), 0);
        assert!(storage.read::<u64>(17).is_err());
    }

    #[test]
    fn storage_is_shareable() {
        fn shareable<T: Send + Sync>() {}
        shareable::<Storage>();
        shareable::<HostArray>();
    }

    #[test]
    fn clones_write_and_read_across_threads() {
        let a = HostArray::from_vec(vec![0.0f64; 4], &[4]).unwrap();
        let b = a.clone();
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..1000usize {
                    a.set::<f64>(&[i % 4], i as f64).unwrap();
                }
            });
            s.spawn(|| {
                for i in 0..1000usize {
                    let v = b.get::<f64>(&[i % 4]).unwrap();
                    assert!((0.0..1000.0).contains(&v) && v.fract() == 0.0, "torn read {v}");
                }
            });
        });
        assert_eq!(b.get::<f64>(&[3]).unwrap(), 999.0);
    }
}
