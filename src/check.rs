//! Compatibility checking: can a layout be viewed through a `ViewSpec`?
//!
//! Rules are applied in a fixed order, so the reported reason is always the first one that
//! fails: element type, byte order, rank, fixed extents, stride alignment, contiguity.
//! Checking is pure and never touches array storage.

use log::debug;

use crate::config::BindOptions;
use crate::core::Rejection;
use crate::layout::LayoutDescriptor;
use crate::signature::{Contiguity, ViewSpec};

/// Proof that a layout satisfied a `ViewSpec`.
///
/// Carries the layout it was issued for, so a view constructor can refuse a token presented
/// with a different array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accepted {
    layout: LayoutDescriptor,
    element_strides: Vec<isize>,
    contiguity: Contiguity,
    requires_copy: bool,
}

impl Accepted {
    pub fn layout(&self) -> &LayoutDescriptor { &self.layout }

    /// Strides in units of elements. Meaningless (but canonical) when `requires_copy`.
    pub fn element_strides(&self) -> &[isize] { &self.element_strides }

    pub fn contiguity(&self) -> Contiguity { self.contiguity }

    /// Accepted only by densifying into fresh storage.
    pub fn requires_copy(&self) -> bool { self.requires_copy }
}

/// Check `layout` against `spec` with zero-copy semantics.
pub fn check(layout: &LayoutDescriptor, spec: &ViewSpec) -> Result<Accepted, Rejection> {
    check_with(layout, spec, &BindOptions::strict())
}

/// Check `layout` against `spec`; layout-only failures are accepted as copies when `options`
/// opt in to it.
pub fn check_with(
    layout: &LayoutDescriptor,
    spec: &ViewSpec,
    options: &BindOptions,
) -> Result<Accepted, Rejection> {
    match check_in_place(layout, spec) {
        Ok(element_strides) => Ok(Accepted {
            layout: layout.clone(),
            element_strides,
            contiguity: spec.contiguity(),
            requires_copy: false,
        }),
        Err(why) if why.is_layout_only() && options.allows_copy() => {
            debug!("accepting {:?} as a copy: {}", layout.shape(), why);
            Ok(Accepted {
                layout: layout.clone(),
                element_strides: crate::layout::row_major_strides(layout.shape(), 1),
                contiguity: spec.contiguity(),
                requires_copy: true,
            })
        }
        Err(why) => {
            debug!("rejecting {:?} for {}: {}", layout.shape(), spec, why);
            Err(why)
        }
    }
}

fn check_in_place(layout: &LayoutDescriptor, spec: &ViewSpec) -> Result<Vec<isize>, Rejection> {
    let dtype = layout.dtype();
    if dtype.element() != spec.element() {
        return Err(Rejection::ElementTypeMismatch {
            expected: spec.element(),
            found: dtype.element(),
        });
    }
    if !dtype.is_native_order() {
        return Err(Rejection::NonNativeByteOrder(dtype.byte_order()));
    }
    if !spec.rank().admits(layout.rank()) {
        return Err(Rejection::RankMismatch {
            expected: spec.rank(),
            found: layout.rank(),
        });
    }
    for (dim, (expected, &found)) in spec.extents().iter().zip(layout.shape()).enumerate() {
        if let Some(expected) = *expected {
            if expected != found {
                return Err(Rejection::ShapeMismatch { dim, expected, found });
            }
        }
    }

    let element_strides = match layout.element_strides() {
        Some(s) => s,
        None => return Err(first_misaligned(layout)),
    };

    let contiguous = match spec.contiguity() {
        Contiguity::Any => true,
        Contiguity::RowMajor => layout.is_row_major(),
        Contiguity::ColumnMajor => layout.is_column_major(),
        Contiguity::InnerRowMajor(k) => layout.is_row_major_inner(k),
        Contiguity::InnerColumnMajor(k) => layout.is_column_major_leading(k),
    };
    if !contiguous {
        return Err(Rejection::NotContiguous { required: spec.contiguity() });
    }
    Ok(element_strides)
}

fn first_misaligned(layout: &LayoutDescriptor) -> Rejection {
    let itemsize = layout.itemsize();
    let (dim, stride) = layout
        .shape()
        .iter()
        .zip(layout.strides())
        .enumerate()
        .find(|(_, (n, s))| **n > 1 && **s % itemsize as isize != 0)
        .map(|(d, (_, s))| (d, *s))
        .unwrap_or((0, 0));
    Rejection::MisalignedStride { dim, stride, itemsize }
}
