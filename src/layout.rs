//! Layout descriptors: shape, byte strides, dtype and writeability.
//!
//! Every host argument is resolved once into a [`LayoutDescriptor`]; all validation works on
//! the descriptor and never on the host object itself.

use crate::core::LayoutError;
use crate::dtype::DType;

/// Canonical description of how an array maps indices onto bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutDescriptor {
    dtype: DType,
    shape: Vec<usize>,
    strides: Vec<isize>,
    writeable: bool,
}

impl LayoutDescriptor {
    /// Build a descriptor from byte strides. `shape` and `strides` must have equal length.
    pub fn new(
        dtype: DType,
        shape: Vec<usize>,
        strides: Vec<isize>,
        writeable: bool,
    ) -> Result<Self, LayoutError> {
        if shape.len() != strides.len() {
            return Err(LayoutError::StrideLengthMismatch {
                shape: shape.len(),
                strides: strides.len(),
            });
        }
        Ok(Self { dtype, shape, strides, writeable })
    }

    /// Row-major layout for `shape`.
    pub fn contiguous(dtype: DType, shape: &[usize]) -> Self {
        let strides = row_major_strides(shape, dtype.itemsize());
        Self { dtype, shape: shape.to_vec(), strides, writeable: true }
    }

    /// Rank-0 layout, used for scalar arguments.
    pub fn scalar(dtype: DType) -> Self {
        Self { dtype, shape: Vec::new(), strides: Vec::new(), writeable: false }
    }

    pub fn dtype(&self) -> DType { self.dtype }
    pub fn shape(&self) -> &[usize] { &self.shape }
    /// Byte strides.
    pub fn strides(&self) -> &[isize] { &self.strides }
    pub fn is_writeable(&self) -> bool { self.writeable }
    pub fn rank(&self) -> usize { self.shape.len() }
    pub fn itemsize(&self) -> usize { self.dtype.itemsize() }

    /// Number of elements, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        self.shape.iter().fold(1usize, |acc, &n| acc.saturating_mul(n))
    }

    /// Whether any dimension has size zero.
    pub fn is_empty(&self) -> bool { self.shape.contains(&0) }

    pub fn with_writeable(mut self, writeable: bool) -> Self {
        self.writeable = writeable;
        self
    }

    /// Row-major over all dimensions, ignoring strides of size-1 dimensions.
    pub fn is_row_major(&self) -> bool {
        self.is_row_major_inner(self.rank())
    }

    /// Column-major over all dimensions, ignoring strides of size-1 dimensions.
    pub fn is_column_major(&self) -> bool {
        self.is_column_major_leading(self.rank())
    }

    /// The innermost `k` dimensions are packed in row-major order.
    pub fn is_row_major_inner(&self, k: usize) -> bool {
        if self.is_empty() {
            return true;
        }
        let k = k.min(self.rank());
        let start = self.rank() - k;
        self.packed((start..self.rank()).rev())
    }

    /// The leading `k` dimensions are packed in column-major order.
    pub fn is_column_major_leading(&self, k: usize) -> bool {
        if self.is_empty() {
            return true;
        }
        let k = k.min(self.rank());
        self.packed(0..k)
    }

    /// Whether `dims`, walked from fastest to slowest, are packed back to back. Once the
    /// running extent leaves `isize`, no further non-degenerate dimension can match it.
    fn packed<I: Iterator<Item = usize>>(&self, dims: I) -> bool {
        let mut expected = Some(self.itemsize() as isize);
        for d in dims {
            let n = self.shape[d];
            if n == 1 {
                continue;
            }
            match expected {
                Some(e) if self.strides[d] == e => {
                    expected = isize::try_from(n).ok().and_then(|n| e.checked_mul(n));
                }
                _ => return false,
            }
        }
        true
    }

    /// Strides in elements, or `None` if a dimension of size > 1 has a stride that is not a
    /// multiple of the itemsize. Degenerate dimensions (and every dimension of an empty array)
    /// get their canonical row-major element stride, since no traversal uses them.
    pub fn element_strides(&self) -> Option<Vec<isize>> {
        let itemsize = self.itemsize() as isize;
        let canonical = row_major_strides(&self.shape, 1);
        let empty = self.is_empty();
        let mut out = Vec::with_capacity(self.rank());
        for (d, (&n, &s)) in self.shape.iter().zip(self.strides.iter()).enumerate() {
            if empty || n <= 1 {
                out.push(canonical[d]);
            } else if s % itemsize == 0 {
                out.push(s / itemsize);
            } else {
                return None;
            }
        }
        Some(out)
    }
}

/// Row-major (C order) strides for `shape`, scaled by `itemsize`.
///
/// Strides of shapes too large to address saturate at `isize::MAX`.
pub fn row_major_strides(shape: &[usize], itemsize: usize) -> Vec<isize> {
    let rank = shape.len();
    let mut strides = vec![saturating_isize(itemsize); rank];
    for i in (0..rank.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1].saturating_mul(saturating_isize(shape[i + 1]));
    }
    strides
}

/// Column-major (Fortran order) strides for `shape`, scaled by `itemsize`.
///
/// Strides of shapes too large to address saturate at `isize::MAX`.
pub fn column_major_strides(shape: &[usize], itemsize: usize) -> Vec<isize> {
    let rank = shape.len();
    let mut strides = vec![saturating_isize(itemsize); rank];
    for i in 1..rank {
        strides[i] = strides[i - 1].saturating_mul(saturating_isize(shape[i - 1]));
    }
    strides
}

fn saturating_isize(n: usize) -> isize {
    isize::try_from(n).unwrap_or(isize::MAX)
}

/// Half-open byte range `[low, high)` touched by a layout starting at `offset`.
/// Returns `None` for empty layouts, which touch nothing.
pub(crate) fn byte_extent(
    shape: &[usize],
    strides: &[isize],
    itemsize: usize,
    offset: isize,
) -> Result<Option<(isize, isize)>, LayoutError> {
    if shape.len() != strides.len() {
        return Err(LayoutError::StrideLengthMismatch {
            shape: shape.len(),
            strides: strides.len(),
        });
    }
    if shape.contains(&0) {
        return Ok(None);
    }
    let mut low = offset;
    let mut high = offset;
    for (&n, &s) in shape.iter().zip(strides.iter()) {
        if n > 1 {
            let end = s
                .checked_mul(n as isize - 1)
                .ok_or(LayoutError::OffsetOverflow)?;
            if end >= 0 {
                high = high.checked_add(end).ok_or(LayoutError::OffsetOverflow)?;
            } else {
                low = low.checked_add(end).ok_or(LayoutError::OffsetOverflow)?;
            }
        }
    }
    let high = high
        .checked_add(itemsize as isize)
        .ok_or(LayoutError::OffsetOverflow)?;
    Ok(Some((low, high)))
}

/// Byte offset of `index` relative to the first element. Size-1 dimensions contribute nothing.
pub(crate) fn offset_of(index: &[usize], strides: &[isize]) -> isize {
    index
        .iter()
        .zip(strides.iter())
        .map(|(&i, &s)| if i == 0 { 0 } else { i as isize * s })
        .sum()
}

pub(crate) fn check_index(index: &[usize], shape: &[usize]) -> Result<(), LayoutError> {
    if index.len() != shape.len() || index.iter().zip(shape.iter()).any(|(&i, &n)| i >= n) {
        return Err(LayoutError::OutOfBounds {
            index: index.to_vec(),
            shape: shape.to_vec(),
        });
    }
    Ok(())
}

/// Row-major odometer over every index of a shape.
#[derive(Clone, Debug)]
pub struct Indices {
    shape: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl Indices {
    pub fn new(shape: &[usize]) -> Self {
        let next = if shape.contains(&0) { None } else { Some(vec![0; shape.len()]) };
        Self { shape: shape.to_vec(), next }
    }
}

impl Iterator for Indices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut following = current.clone();
        let mut d = self.shape.len();
        loop {
            if d == 0 {
                // Rolled over the outermost dimension (or rank 0): done after this one.
                break;
            }
            d -= 1;
            following[d] += 1;
            if following[d] < self.shape[d] {
                self.next = Some(following);
                break;
            }
            following[d] = 0;
        }
        Some(current)
    }
}
