//! Element types and byte orders.
//!
//! A [`DType`] is what the host reports for an array: an [`ElementType`] tag plus the
//! [`ByteOrder`] its bytes are stored in. Only native-order dtypes can be viewed in place.

use std::fmt;
use std::str::FromStr;

use crate::core::LayoutError;

/// Fixed-width element tags understood by the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl ElementType {
    /// Width of one element in bytes.
    pub const fn itemsize(self) -> usize {
        match self {
            ElementType::Bool | ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::UInt64 | ElementType::Float64 => 8,
        }
    }

    /// Kind character as used in array type strings (`b`, `i`, `u`, `f`).
    pub const fn kind(self) -> char {
        match self {
            ElementType::Bool => 'b',
            ElementType::Int8 | ElementType::Int16 | ElementType::Int32 | ElementType::Int64 => 'i',
            ElementType::UInt8
            | ElementType::UInt16
            | ElementType::UInt32
            | ElementType::UInt64 => 'u',
            ElementType::Float32 | ElementType::Float64 => 'f',
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ElementType::Bool => "bool",
            ElementType::Int8 => "int8",
            ElementType::Int16 => "int16",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::UInt8 => "uint8",
            ElementType::UInt16 => "uint16",
            ElementType::UInt32 => "uint32",
            ElementType::UInt64 => "uint64",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
        }
    }

    /// Look up a tag from its kind character and width.
    pub fn from_kind(kind: char, itemsize: usize) -> Option<Self> {
        let t = match (kind, itemsize) {
            ('b', 1) => ElementType::Bool,
            ('i', 1) => ElementType::Int8,
            ('i', 2) => ElementType::Int16,
            ('i', 4) => ElementType::Int32,
            ('i', 8) => ElementType::Int64,
            ('u', 1) => ElementType::UInt8,
            ('u', 2) => ElementType::UInt16,
            ('u', 4) => ElementType::UInt32,
            ('u', 8) => ElementType::UInt64,
            ('f', 4) => ElementType::Float32,
            ('f', 8) => ElementType::Float64,
            _ => return None,
        };
        Some(t)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte ordering of multi-byte elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteOrder {
    Little,
    Big,
    /// Single-byte elements have no byte order.
    NotApplicable,
}

impl ByteOrder {
    /// Byte order of the executing machine.
    #[cfg(target_endian = "little")]
    pub const NATIVE: ByteOrder = ByteOrder::Little;
    #[cfg(target_endian = "big")]
    pub const NATIVE: ByteOrder = ByteOrder::Big;

    pub fn is_native(self) -> bool {
        self == ByteOrder::NATIVE || self == ByteOrder::NotApplicable
    }

    /// The opposite order; `NotApplicable` stays as is.
    pub fn swapped(self) -> Self {
        match self {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
            ByteOrder::NotApplicable => ByteOrder::NotApplicable,
        }
    }

    pub const fn symbol(self) -> char {
        match self {
            ByteOrder::Little => '<',
            ByteOrder::Big => '>',
            ByteOrder::NotApplicable => '|',
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::Little => f.write_str("little-endian"),
            ByteOrder::Big => f.write_str("big-endian"),
            ByteOrder::NotApplicable => f.write_str("not applicable"),
        }
    }
}

/// Element type plus byte order, as reported by a host array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DType {
    element: ElementType,
    byte_order: ByteOrder,
}

impl DType {
    /// The native-order dtype for an element type.
    pub fn native(element: ElementType) -> Self {
        let byte_order = if element.itemsize() == 1 {
            ByteOrder::NotApplicable
        } else {
            ByteOrder::NATIVE
        };
        Self { element, byte_order }
    }

    /// The native-order dtype for a Rust element type.
    pub fn of<T: Element>() -> Self {
        Self::native(T::ELEMENT)
    }

    /// Same element type, explicit byte order. Single-byte types ignore the request.
    pub fn with_byte_order(self, byte_order: ByteOrder) -> Self {
        if self.element.itemsize() == 1 {
            return self;
        }
        Self { byte_order, ..self }
    }

    /// The byte-swapped counterpart of this dtype.
    pub fn swapped(self) -> Self {
        self.with_byte_order(self.byte_order.swapped())
    }

    pub fn element(&self) -> ElementType {
        self.element
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn itemsize(&self) -> usize {
        self.element.itemsize()
    }

    pub fn is_native_order(&self) -> bool {
        self.byte_order.is_native()
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.byte_order.symbol(),
            self.element.kind(),
            self.element.itemsize()
        )
    }
}

/// Parses array type strings such as `<f8`, `>i2`, `|u1` or `f8` (native order).
impl FromStr for DType {
    type Err = LayoutError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || LayoutError::InvalidDType(s.to_string());
        let mut chars = s.chars().peekable();
        let order = match chars.peek() {
            Some('<') => Some(ByteOrder::Little),
            Some('>') => Some(ByteOrder::Big),
            Some('=') => Some(ByteOrder::NATIVE),
            Some('|') => Some(ByteOrder::NotApplicable),
            _ => None,
        };
        if order.is_some() {
            chars.next();
        }
        let kind = chars.next().ok_or_else(invalid)?;
        let width: String = chars.collect();
        let itemsize: usize = width.parse().map_err(|_| invalid())?;
        let element = ElementType::from_kind(kind, itemsize).ok_or_else(invalid)?;
        let dtype = DType::native(element);
        Ok(match order {
            Some(ByteOrder::NotApplicable) | None => dtype,
            Some(o) => dtype.with_byte_order(o),
        })
    }
}

/// Rust scalar types that can be viewed directly in host storage.
///
/// `bytemuck::Pod` guarantees every bit pattern read from host memory is a valid value.
pub trait Element: bytemuck::Pod + PartialEq + fmt::Debug + Send + Sync + 'static {
    const ELEMENT: ElementType;
}

macro_rules! impl_element {
    ($($t:ty => $tag:ident),* $(,)?) => {
        $(impl Element for $t { const ELEMENT: ElementType = ElementType::$tag; })*
    };
}

impl_element!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn itemsizes_match_rust_types() {
        assert_eq!(ElementType::Float64.itemsize(), std::mem::size_of::<f64>());
        assert_eq!(ElementType::Int16.itemsize(), std::mem::size_of::<i16>());
        assert_eq!(<i64 as Element>::ELEMENT, ElementType::Int64);
    }

    #[test]
    fn parse_type_strings() {
        let le: DType = "<f8".parse().unwrap();
        let be: DType = ">f8".parse().unwrap();
        assert_eq!(le.element(), ElementType::Float64);
        assert_eq!(be.byte_order(), ByteOrder::Big);
        assert_ne!(le.is_native_order(), be.is_native_order());
        assert_eq!("f8".parse::<DType>().unwrap(), DType::of::<f64>());
        assert_eq!("|u1".parse::<DType>().unwrap(), DType::of::<u8>());
        assert!("<x3".parse::<DType>().is_err());
        assert!("".parse::<DType>().is_err());
    }

    #[test]
    fn single_byte_types_are_always_native() {
        let d = DType::of::<i8>().with_byte_order(ByteOrder::NATIVE.swapped());
        assert!(d.is_native_order());
        assert_eq!(d.to_string(), "|i1");
    }

    #[test]
    fn swapped_dtype_is_not_native() {
        let d = DType::of::<f64>().swapped();
        assert!(!d.is_native_order());
        assert_eq!(d.swapped(), DType::of::<f64>());
    }
}
