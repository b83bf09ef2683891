//! Structured records and strided field projections.
//!
//! A [`Schema`] packs named fields back to back, so a record's itemsize is the sum of its
//! field sizes. Projecting one field out of a [`RecordArray`] yields a host array whose byte
//! stride is the record itemsize. That stride is often not a multiple of the field's own
//! itemsize, which is exactly the case the compatibility checker must refuse.

use std::sync::Arc;

use crate::core::LayoutError;
use crate::dtype::DType;
use crate::host::{HostArray, Storage};
use crate::layout;

/// One named field of a record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchemaField {
    name: String,
    dtype: DType,
    offset: usize,
    doc: String,
    unit: String,
}

impl SchemaField {
    pub fn name(&self) -> &str { &self.name }
    pub fn dtype(&self) -> DType { self.dtype }
    /// Byte offset within the record.
    pub fn offset(&self) -> usize { self.offset }
    pub fn doc(&self) -> &str { &self.doc }
    pub fn unit(&self) -> &str { &self.unit }
}

/// Ordered, packed record layout.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schema {
    fields: Vec<SchemaField>,
    itemsize: usize,
}

impl Schema {
    pub fn new() -> Self { Self::default() }

    /// Append a field after the last one.
    pub fn append(&mut self, name: &str, dtype: DType) -> Result<&SchemaField, LayoutError> {
        self.append_with_docs(name, dtype, "", "")
    }

    pub fn append_with_docs(
        &mut self,
        name: &str,
        dtype: DType,
        doc: &str,
        unit: &str,
    ) -> Result<&SchemaField, LayoutError> {
        if self.contains(name) {
            return Err(LayoutError::DuplicateField(name.to_string()));
        }
        let offset = self.itemsize;
        self.itemsize += dtype.itemsize();
        self.fields.push(SchemaField {
            name: name.to_string(),
            dtype,
            offset,
            doc: doc.to_string(),
            unit: unit.to_string(),
        });
        Ok(&self.fields[self.fields.len() - 1])
    }

    /// Builder form of [`Schema::append`].
    pub fn with_field(mut self, name: &str, dtype: DType) -> Result<Self, LayoutError> {
        self.append(name, dtype)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool { self.get(name).is_some() }

    /// Rename a field in place; its offset and type are unchanged.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), LayoutError> {
        if old != new && self.contains(new) {
            return Err(LayoutError::DuplicateField(new.to_string()));
        }
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name == old)
            .ok_or_else(|| LayoutError::UnknownField(old.to_string()))?;
        field.name = new.to_string();
        Ok(())
    }

    /// Replace the doc and unit of an existing field; its name, type and offset are unchanged.
    pub fn set(&mut self, name: &str, doc: &str, unit: &str) -> Result<&SchemaField, LayoutError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| LayoutError::UnknownField(name.to_string()))?;
        field.doc = doc.to_string();
        field.unit = unit.to_string();
        Ok(field)
    }

    /// Same field names, types and offsets in the same order. Docs and units are ignored.
    pub fn equal_keys(&self, other: &Schema) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.name == b.name && a.dtype == b.dtype && a.offset == b.offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaField> { self.fields.iter() }
    pub fn len(&self) -> usize { self.fields.len() }
    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    /// Bytes per record.
    pub fn itemsize(&self) -> usize { self.itemsize }
}

/// An array of packed records sharing one storage buffer.
#[derive(Clone, Debug)]
pub struct RecordArray {
    schema: Arc<Schema>,
    shape: Vec<usize>,
    storage: Arc<Storage>,
    writeable: bool,
}

impl RecordArray {
    /// Zero-filled records in row-major order.
    pub fn zeros(schema: Schema, shape: &[usize]) -> Self {
        let n: usize = shape.iter().product();
        Self {
            storage: Arc::new(Storage::zeroed(n * schema.itemsize())),
            schema: Arc::new(schema),
            shape: shape.to_vec(),
            writeable: true,
        }
    }

    pub fn schema(&self) -> &Schema { &self.schema }
    pub fn shape(&self) -> &[usize] { &self.shape }
    pub fn len(&self) -> usize { self.shape.iter().product() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn set_writeable(&mut self, writeable: bool) { self.writeable = writeable; }

    /// Project one field as a host array aliasing the record storage.
    pub fn field(&self, name: &str) -> Result<HostArray, LayoutError> {
        let field = self
            .schema
            .get(name)
            .ok_or_else(|| LayoutError::UnknownField(name.to_string()))?;
        let strides = layout::row_major_strides(&self.shape, self.schema.itemsize());
        HostArray::from_storage_with_access(
            self.storage.clone(),
            field.dtype(),
            &self.shape,
            &strides,
            field.offset() as isize,
            self.writeable,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BindError, Rejection};
    use crate::signature::ViewSpec;
    use crate::view;

    fn packed() -> Schema {
        Schema::new()
            .with_field("f1", DType::of::<f64>())
            .and_then(|s| s.with_field("f2", DType::of::<i16>()))
            .unwrap()
    }

    #[test]
    fn fields_are_packed() {
        let s = packed();
        assert_eq!(s.itemsize(), 10);
        assert_eq!(s.get("f2").unwrap().offset(), 8);
        assert_eq!(s.iter().map(|f| f.name()).collect::<Vec<_>>(), vec!["f1", "f2"]);
    }

    #[test]
    fn duplicate_and_unknown_names() {
        let mut s = packed();
        assert_eq!(s.append("f1", DType::of::<u8>()).unwrap_err(), LayoutError::DuplicateField("f1".into()));
        assert_eq!(s.rename("nope", "x"), Err(LayoutError::UnknownField("nope".into())));
        assert_eq!(s.rename("f1", "f2"), Err(LayoutError::DuplicateField("f2".into())));
        s.rename("f1", "x").unwrap();
        assert_eq!(s.get("x").unwrap().offset(), 0);
        assert!(!s.contains("f1"));
    }

    #[test]
    fn docs_are_kept() {
        let mut s = Schema::new();
        let f = s.append_with_docs("t", DType::of::<f32>(), "temperature", "K").unwrap();
        assert_eq!((f.doc(), f.unit()), ("temperature", "K"));
    }

    #[test]
    fn misaligned_field_is_refused() {
        let records = RecordArray::zeros(packed(), &[3]);
        let f1 = records.field("f1").unwrap();
        assert_eq!(f1.strides(), &[10]);
        let err = view::bind_input::<f64>(&f1, &ViewSpec::of::<f64>(1)).unwrap_err();
        assert!(matches!(err, BindError::Rejected(Rejection::MisalignedStride { stride: 10, .. })));
    }

    #[test]
    fn aligned_field_aliases_records() {
        let s = Schema::new()
            .with_field("a", DType::of::<f64>())
            .and_then(|s| s.with_field("b", DType::of::<f64>()))
            .unwrap();
        let records = RecordArray::zeros(s, &[2]);
        let b = records.field("b").unwrap();
        b.set::<f64>(&[1], 7.5).unwrap();
        let view = view::bind_input::<f64>(&b, &ViewSpec::of::<f64>(1)).unwrap();
        assert_eq!(view.strides(), &[2]);
        assert_eq!(view.to_vec().unwrap(), vec![0.0, 7.5]);
        assert_eq!(records.field("a").unwrap().to_vec::<f64>().unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn set_replaces_docs_only() {
        let mut s = packed();
        let f = s.set("f2", "count", "1").unwrap();
        assert_eq!((f.doc(), f.unit(), f.offset()), ("count", "1", 8));
        assert_eq!(s.set("nope", "", "").unwrap_err(), LayoutError::UnknownField("nope".into()));
        assert_eq!(s.itemsize(), 10);
    }

    #[test]
    fn equal_keys_ignores_docs() {
        let mut documented = packed();
        documented.set("f1", "first", "m").unwrap();
        assert!(documented.equal_keys(&packed()));
        assert_ne!(documented, packed());

        let mut renamed = packed();
        renamed.rename("f2", "g").unwrap();
        assert!(!renamed.equal_keys(&packed()));

        let retyped = Schema::new()
            .with_field("f1", DType::of::<f64>())
            .and_then(|s| s.with_field("f2", DType::of::<i32>()))
            .unwrap();
        assert!(!retyped.equal_keys(&packed()));

        let shorter = Schema::new().with_field("f1", DType::of::<f64>()).unwrap();
        assert!(!shorter.equal_keys(&packed()));
    }

    #[test]
    fn read_only_records_project_read_only_fields() {
        let mut records = RecordArray::zeros(packed(), &[2]);
        records.set_writeable(false);
        let f2 = records.field("f2").unwrap();
        assert!(!f2.is_writeable());
        assert_eq!(f2.set::<i16>(&[0], 3), Err(BindError::ReadOnlyView));
        assert_eq!(f2.get::<i16>(&[0]).unwrap(), 0);
        let mut f2 = f2;
        assert_eq!(f2.set_writeable(true), Err(BindError::ReadOnlyView));

        records.set_writeable(true);
        let f2 = records.field("f2").unwrap();
        assert!(f2.is_writeable());
        f2.set::<i16>(&[1], 3).unwrap();
        assert_eq!(f2.get::<i16>(&[1]).unwrap(), 3);
    }
}
