//! View construction in both directions across the boundary.
//!
//! - Input: [`bind_input`] turns a host array into an [`ArrayView`] over the host's storage,
//!   after the compatibility check accepts it.
//! - Output: [`wrap`] turns a native [`NdArray`] into a [`HostArray`] that aliases native
//!   storage and keeps its owner alive.
//!
//! Neither direction copies, except for the explicitly opted-in copy-on-mismatch mode.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, warn};

use crate::check::{self, Accepted};
use crate::config::BindOptions;
use crate::core::{BindError, Result};
use crate::dtype::{DType, Element};
use crate::host::{HostArray, Storage};
use crate::layout::{self, Indices};
use crate::native::NdArray;
use crate::owner::{Owned, OwnerHandle};
use crate::signature::{Contiguity, ViewSpec};

/// Typed native view over storage owned elsewhere.
///
/// Reading is always allowed. Writing requires [`ArrayView::as_mut`], which fails for views
/// over non-writeable host arrays.
pub struct ArrayView<T: Element> {
    storage: Arc<Storage>,
    offset: isize,
    shape: Vec<usize>,
    strides: Vec<isize>,
    read_only: bool,
    owner: OwnerHandle,
    _marker: PhantomData<T>,
}

impl<T: Element> Clone for ArrayView<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            offset: self.offset,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            read_only: self.read_only,
            owner: self.owner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Element> ArrayView<T> {
    pub fn shape(&self) -> &[usize] { &self.shape }
    /// Strides in elements.
    pub fn strides(&self) -> &[isize] { &self.strides }
    pub fn ndim(&self) -> usize { self.shape.len() }
    pub fn len(&self) -> usize { self.shape.iter().product() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn is_read_only(&self) -> bool { self.read_only }

    /// Whatever keeps the viewed storage alive.
    pub fn owner_handle(&self) -> &OwnerHandle { &self.owner }

    fn byte_offset(&self, index: &[usize]) -> Result<isize> {
        layout::check_index(index, &self.shape)?;
        let itemsize = std::mem::size_of::<T>() as isize;
        Ok(self.offset + layout::offset_of(index, &self.strides) * itemsize)
    }

    pub fn get(&self, index: &[usize]) -> Result<T> {
        let at = self.byte_offset(index)?;
        self.storage.read(at)
    }

    /// Elements in logical row-major order.
    pub fn iter(&self) -> impl Iterator<Item = Result<T>> + '_ {
        Indices::new(&self.shape).map(move |i| self.get(&i))
    }

    /// Copy of the elements in logical row-major order; fails on the first unreadable element.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.iter().collect()
    }

    /// Mutable access; `ReadOnlyView` when the source was not writeable.
    pub fn as_mut(&mut self) -> Result<ArrayViewMut<'_, T>> {
        if self.read_only {
            return Err(BindError::ReadOnlyView);
        }
        Ok(ArrayViewMut { view: self })
    }

    /// Hand this view back to the host as an array aliasing the same storage.
    pub fn to_host(&self) -> HostArray {
        let itemsize = std::mem::size_of::<T>() as isize;
        let strides = self.strides.iter().map(|s| s * itemsize).collect();
        let mut out = HostArray::alias(
            self.storage.clone(),
            DType::of::<T>(),
            self.shape.clone(),
            strides,
            self.offset,
            self.read_only,
        );
        out.set_owner(self.owner.clone());
        out
    }
}

impl<T: Element> Owned for ArrayView<T> {
    fn owner(&self) -> Option<&OwnerHandle> { Some(&self.owner) }
    fn set_owner(&mut self, owner: OwnerHandle) { self.owner = owner; }
}

impl<T: Element> fmt::Debug for ArrayView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayView")
            .field("dtype", &T::ELEMENT)
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// Write access to a writeable [`ArrayView`].
pub struct ArrayViewMut<'a, T: Element> {
    view: &'a mut ArrayView<T>,
}

impl<T: Element> ArrayViewMut<'_, T> {
    pub fn get(&self, index: &[usize]) -> Result<T> {
        self.view.get(index)
    }

    pub fn set(&mut self, index: &[usize], value: T) -> Result<()> {
        let at = self.view.byte_offset(index)?;
        self.view.storage.write(at, value)
    }

    pub fn fill(&mut self, value: T) -> Result<()> {
        for i in Indices::new(&self.view.shape) {
            self.set(&i, value)?;
        }
        Ok(())
    }
}

/// Check `array` against `spec` and view it in place.
pub fn bind_input<T: Element>(array: &HostArray, spec: &ViewSpec) -> Result<ArrayView<T>> {
    bind_input_with(array, spec, &BindOptions::strict())
}

/// Like [`bind_input`], honoring the copy-on-mismatch option.
pub fn bind_input_with<T: Element>(
    array: &HostArray,
    spec: &ViewSpec,
    options: &BindOptions,
) -> Result<ArrayView<T>> {
    let accepted = check::check_with(&array.descriptor(), spec, options)?;
    bind_accepted(array, &accepted)
}

/// Build a view from a prior acceptance. The token must have been issued for this array's
/// layout and for `T`; otherwise `InvalidLayout`.
pub fn bind_accepted<T: Element>(array: &HostArray, accepted: &Accepted) -> Result<ArrayView<T>> {
    let layout = accepted.layout();
    if layout.dtype() != DType::of::<T>() {
        return Err(BindError::InvalidLayout(format!(
            "accepted for {}, requested {}",
            layout.dtype(),
            DType::of::<T>()
        )));
    }
    if *layout != array.descriptor() {
        return Err(BindError::InvalidLayout(format!(
            "accepted shape {:?} strides {:?}, array has shape {:?} strides {:?}",
            layout.shape(),
            layout.strides(),
            array.shape(),
            array.strides()
        )));
    }
    if accepted.requires_copy() {
        return densify(array, accepted.contiguity());
    }

    let owner = match array.base() {
        Some(base) => base.clone(),
        None => OwnerHandle::from_arc(array.storage().clone()),
    };
    debug!(
        "bound {} view shape {:?} element strides {:?} (read_only={})",
        T::ELEMENT,
        array.shape(),
        accepted.element_strides(),
        !array.is_writeable()
    );
    Ok(ArrayView {
        storage: array.storage().clone(),
        offset: array.offset(),
        shape: array.shape().to_vec(),
        strides: accepted.element_strides().to_vec(),
        read_only: !array.is_writeable(),
        owner,
        _marker: PhantomData,
    })
}

fn densify<T: Element>(array: &HostArray, contiguity: Contiguity) -> Result<ArrayView<T>> {
    warn!(
        "copying {} array of shape {:?} with strides {:?} into dense storage",
        T::ELEMENT,
        array.shape(),
        array.strides()
    );
    let data = array.to_vec::<T>()?;
    let shape = array.shape().to_vec();
    let column_major = matches!(contiguity, Contiguity::ColumnMajor | Contiguity::InnerColumnMajor(_));
    let (storage, strides) = if column_major {
        let strides = layout::column_major_strides(&shape, 1);
        let mut dense = vec![<T as bytemuck::Zeroable>::zeroed(); data.len()];
        for (value, index) in data.into_iter().zip(Indices::new(&shape)) {
            dense[layout::offset_of(&index, &strides) as usize] = value;
        }
        (Storage::from_elements(&dense), strides)
    } else {
        (Storage::from_elements(&data), layout::row_major_strides(&shape, 1))
    };
    let storage = Arc::new(storage);
    Ok(ArrayView {
        owner: OwnerHandle::from_arc(storage.clone()),
        storage,
        offset: 0,
        shape,
        strides,
        read_only: true,
        _marker: PhantomData,
    })
}

/// Export a native array to the host without copying.
///
/// The host array reports the native shape and strides, is writeable unless `read_only`, and
/// holds `owner` for as long as it (or anything derived from it) lives.
pub fn wrap<T: Element>(native: &NdArray<T>, owner: &OwnerHandle, read_only: bool) -> HostArray {
    let mut out = HostArray::alias(
        native.storage().clone(),
        DType::of::<T>(),
        native.shape().to_vec(),
        native.byte_strides(),
        native.offset(),
        read_only,
    );
    crate::owner::bind(&mut out, owner);
    out
}

/// Export a native array that owns itself: the storage is the owner.
pub fn wrap_owned<T: Element>(native: NdArray<T>, read_only: bool) -> HostArray {
    let owner = OwnerHandle::from_arc(native.storage().clone());
    wrap(&native, &owner, read_only)
}
